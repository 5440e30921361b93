use super::{announce, load_dataset};
use crate::cli::BuildArgs;
use crate::config::build_build_config;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use atoml::{engine::progress::ProgressReporter, workflows};
use tokio::sync::mpsc;
use tracing::info;

const REPORT_FILE: &str = "build-report.toml";

pub async fn run(args: BuildArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let settings = build_build_config(&args)?;
    let dataset = load_dataset(&settings.data)?;

    if let Some(store) = &settings.core_config.builder.store {
        std::fs::create_dir_all(store)?;
    }

    let progress_handler = CliProgressHandler::new(ui_sender.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    announce(
        &ui_sender,
        format!("Building a reduced feature space from {} record(s)...", dataset.len()),
    )
    .await;
    let output = tokio::task::block_in_place(|| {
        workflows::build::run(&dataset, &settings.core_config, &reporter)
    })?;
    let report = &output.report;

    match report.expanded_features {
        Some(expanded) => println!(
            "Features: {} original, {} expanded, {} after cleaning",
            report.original_features, expanded, report.cleaned_features
        ),
        None => println!(
            "Features: {} original, {} after cleaning",
            report.original_features, report.cleaned_features
        ),
    }
    if let Some(screened) = report.screened_features {
        println!("Screening kept {} feature(s)", screened);
    }
    println!("Ridge RMSE: {:.4}", report.ridge_rmse);
    if let Some(search) = &report.size_search {
        println!(
            "Best size: {} feature(s), RMSE {:.4}",
            search.best_size, search.best_rmse
        );
        if let Some(pca) = &search.pca {
            println!(
                "Best PCA: {} component(s) of {} feature(s), RMSE {:.4}",
                pca.components, pca.features, pca.rmse
            );
        }
    }
    println!("Selected {} feature(s):", report.selected_features);
    for name in output.train.names() {
        println!("  {}", name);
    }

    if let Some(store) = &settings.core_config.builder.store {
        let path = store.join(REPORT_FILE);
        let text = toml::to_string(report).map_err(|e| CliError::FileWriting {
            path: path.clone(),
            source: e.into(),
        })?;
        std::fs::write(&path, text)?;
        info!(
            "Stored {} feature table(s) and the build report in {:?}",
            report.stored_tables.len(),
            store
        );
        println!("Feature tables and report written to: {}", store.display());
    }
    Ok(())
}

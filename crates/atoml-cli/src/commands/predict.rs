use super::{announce, load_dataset, write_rows};
use crate::cli::PredictArgs;
use crate::config::build_predict_config;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use atoml::{engine::progress::ProgressReporter, workflows};
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: PredictArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let settings = build_predict_config(&args)?;
    let dataset = load_dataset(&settings.data)?;

    let progress_handler = CliProgressHandler::new(ui_sender.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    announce(
        &ui_sender,
        format!(
            "Training a {} model on {} record(s)...",
            settings.core_config.model.name(),
            dataset.len()
        ),
    )
    .await;
    info!("Invoking the core prediction workflow...");
    let result = tokio::task::block_in_place(|| {
        workflows::predict::run(&dataset, &settings.core_config, &reporter)
    })?;

    println!(
        "Train: RMSE {:.4}, MAE {:.4} over {} record(s)",
        result.train_error.rmse, result.train_error.mae, result.train_error.count
    );
    println!(
        "Test:  RMSE {:.4}, MAE {:.4}, max |error| {:.4} over {} record(s)",
        result.test_error.rmse,
        result.test_error.mae,
        result.test_error.max_abs,
        result.test_error.count
    );
    println!(
        "Regularization: {:.6} ({} feature(s))",
        result.hyperparameters.regularization,
        result.feature_names.len()
    );

    if let Some(output) = &settings.output {
        info!("Writing {} prediction(s) to {:?}", result.predictions.len(), output);
        write_rows(output, &result.predictions)?;
        println!("Predictions written to: {}", output.display());
    }
    Ok(())
}

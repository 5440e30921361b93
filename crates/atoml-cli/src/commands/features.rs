use super::{announce, load_dataset};
use crate::cli::FeaturesArgs;
use crate::config::build_features_config;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use atoml::{
    core::io::feature_store::write_csv, engine::progress::ProgressReporter, workflows,
};
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: FeaturesArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let settings = build_features_config(&args)?;
    let dataset = load_dataset(&settings.data)?;

    let progress_handler = CliProgressHandler::new(ui_sender.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    announce(
        &ui_sender,
        format!("Generating features for {} record(s)...", dataset.len()),
    )
    .await;
    let table = tokio::task::block_in_place(|| {
        workflows::features::run(&dataset, &settings.features.kinds, &reporter)
    })?;
    info!(
        "Generated {} feature(s) for {} record(s).",
        table.features.ncols(),
        table.features.nrows()
    );

    write_csv(
        &settings.output,
        &table.ids,
        &table.features,
        Some(&table.targets),
    )
    .map_err(|e| CliError::FileWriting {
        path: settings.output.clone(),
        source: e.into(),
    })?;
    println!(
        "{} x {} feature table written to: {}",
        table.features.nrows(),
        table.features.ncols(),
        settings.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DataArgs;
    use std::fs;
    use tempfile::tempdir;

    const DIATOMICS: &str = "\
2
energy=-1.0 unique_id=h2
H 0.0 0.0 0.0
H 0.0 0.0 0.74
2
energy=-2.0 unique_id=co
C 0.0 0.0 0.0
O 0.0 0.0 1.13
";

    #[tokio::test(flavor = "multi_thread")]
    async fn writes_one_row_per_record() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("data.xyz");
        let output = dir.path().join("features.csv");
        fs::write(&input, DIATOMICS).unwrap();

        let args = FeaturesArgs {
            data: DataArgs {
                input,
                ..DataArgs::default()
            },
            output: output.clone(),
        };
        let (sender, _receiver) = mpsc::channel(64);
        run(args, sender).await.unwrap();

        let content = fs::read_to_string(output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("h2,"));
        assert!(lines[2].starts_with("co,"));
    }
}

use super::{announce, load_dataset, write_rows};
use crate::cli::LearningCurveArgs;
use crate::config::build_learning_curve_config;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use atoml::{engine::progress::ProgressReporter, workflows};
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: LearningCurveArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let settings = build_learning_curve_config(&args)?;
    let dataset = load_dataset(&settings.data)?;

    let progress_handler = CliProgressHandler::new(ui_sender.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    announce(
        &ui_sender,
        format!("Running hierarchical validation on {} record(s)...", dataset.len()),
    )
    .await;
    let result = tokio::task::block_in_place(|| {
        workflows::learning_curve::run(&dataset, &settings.core_config, &reporter)
    })?;
    info!(
        "Workflow finished with {} validation record(s).",
        result.records.len()
    );

    println!("{:>10}  {:>12}  {:>12}  {:>12}  {:>5}", "train", "mean RMSE", "std RMSE", "mean MAE", "n");
    for point in &result.curve {
        println!(
            "{:>10}  {:>12.5}  {:>12.5}  {:>12.5}  {:>5}",
            point.train_size, point.mean_rmse, point.std_rmse, point.mean_mae, point.count
        );
    }

    if let Some(output) = &settings.output {
        write_rows(output, &result.curve)?;
        println!("Learning curve written to: {}", output.display());
    }
    Ok(())
}

use super::{announce, read_structures};
use crate::cli::NebArgs;
use crate::config::build_neb_config;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use atoml::{
    core::io::{traits::StructureFile, xyz::XyzFile},
    core::models::structure::Structure,
    core::potentials::PotentialParams,
    engine::progress::ProgressReporter,
    workflows,
};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn first_structure(path: &Path) -> Result<Structure> {
    let mut structures = read_structures(path)?;
    if structures.len() > 1 {
        warn!(
            "{:?} holds {} structures; using the first.",
            path,
            structures.len()
        );
    }
    if structures.is_empty() {
        return Err(CliError::Argument(format!("{:?} contains no structure.", path)));
    }
    Ok(structures.swap_remove(0))
}

pub async fn run(args: NebArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let settings = build_neb_config(&args)?;
    let initial = first_structure(&settings.initial)?;
    let final_state = first_structure(&settings.final_state)?;

    info!("Loading potential parameters from {:?}", &settings.potential);
    let calculator = PotentialParams::load(&settings.potential)
        .map_err(|e| CliError::FileParsing {
            path: settings.potential.clone(),
            source: e.into(),
        })?
        .into_calculator();

    let progress_handler = CliProgressHandler::new(ui_sender.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    announce(
        &ui_sender,
        format!(
            "Relaxing a band of {} movable image(s)...",
            settings.core_config.images
        ),
    )
    .await;
    let result = tokio::task::block_in_place(|| {
        workflows::neb::run(
            &initial,
            &final_state,
            calculator.as_ref(),
            &settings.core_config,
            &reporter,
        )
    })?;

    if result.converged {
        println!(
            "Converged after {} iteration(s) (max force {:.4}).",
            result.iterations, result.max_force
        );
    } else {
        warn!("Band did not converge within the step limit.");
        println!(
            "Warning: not converged after {} iteration(s) (max force {:.4}).",
            result.iterations, result.max_force
        );
    }
    for (i, energy) in result.energies.iter().enumerate() {
        let marker = if result.climbing_index == Some(i) { " *" } else { "" };
        println!("  image {:>3}: {:.6}{}", i, energy, marker);
    }
    println!(
        "Forward barrier: {:.6}  Reverse barrier: {:.6}",
        result.forward_barrier, result.reverse_barrier
    );

    XyzFile::write_to_path(&result.images, &settings.output).map_err(|e| {
        CliError::FileWriting {
            path: settings.output.clone(),
            source: e.into(),
        }
    })?;
    println!("Band written to: {}", settings.output.display());
    Ok(())
}

pub mod build;
pub mod features;
pub mod learning_curve;
pub mod neb;
pub mod predict;

use crate::config::DataSettings;
use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use atoml::core::io::traits::StructureFile;
use atoml::core::io::xyz::XyzFile;
use atoml::core::models::dataset::Dataset;
use atoml::core::models::structure::Structure;
use serde::Serialize;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub(crate) fn read_structures(path: &Path) -> Result<Vec<Structure>> {
    info!("Loading structures from {:?}", path);
    XyzFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// Loads the structures and pairs them with the configured target property.
pub(crate) fn load_dataset(data: &DataSettings) -> Result<Dataset> {
    let structures = read_structures(&data.input)?;
    let (dataset, summary) = Dataset::from_structures(structures, &data.target);
    if summary.skipped > 0 {
        warn!(
            "{} structure(s) have no finite numeric '{}' value and were skipped.",
            summary.skipped, data.target
        );
        println!(
            "Warning: skipped {} structure(s) without a '{}' value.",
            summary.skipped, data.target
        );
    }
    if dataset.is_empty() {
        return Err(CliError::Argument(format!(
            "No structure in {:?} carries a numeric '{}' value.",
            data.input, data.target
        )));
    }
    info!("Loaded {} record(s).", dataset.len());
    Ok(dataset)
}

/// Prints a line through the UI task so it stays ordered with the progress bars.
pub(crate) async fn announce(ui_sender: &mpsc::Sender<UiEvent>, message: String) {
    if ui_sender.send(UiEvent::Log(message)).await.is_err() {
        warn!("UI channel closed; status line dropped.");
    }
}

/// Writes serializable rows as CSV with a header row.
pub(crate) fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let wrap = |e: csv::Error| CliError::FileWriting {
        path: path.to_path_buf(),
        source: e.into(),
    };
    let mut writer = csv::Writer::from_path(path).map_err(wrap)?;
    for row in rows {
        writer.serialize(row).map_err(wrap)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const TWO_FRAMES: &str = "\
2
energy=-1.5 unique_id=a
H 0.0 0.0 0.0
H 0.0 0.0 0.74
2
unique_id=b
H 0.0 0.0 0.0
H 0.0 0.0 0.80
";

    #[test]
    fn dataset_skips_records_without_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.xyz");
        fs::write(&path, TWO_FRAMES).unwrap();

        let dataset = load_dataset(&DataSettings {
            input: path,
            target: "energy".to_string(),
        })
        .unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.targets(), &[-1.5]);
    }

    #[test]
    fn dataset_without_any_target_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.xyz");
        fs::write(&path, TWO_FRAMES).unwrap();

        let result = load_dataset(&DataSettings {
            input: path,
            target: "gap".to_string(),
        });
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn missing_input_is_a_parsing_error() {
        let result = read_structures(&PathBuf::from("/nonexistent/data.xyz"));
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        value: Option<f64>,
    }

    #[test]
    fn rows_are_written_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_rows(
            &path,
            &[
                Row {
                    name: "x",
                    value: Some(1.5),
                },
                Row {
                    name: "y",
                    value: None,
                },
            ],
        )
        .unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "name,value\nx,1.5\ny,\n");
    }
}

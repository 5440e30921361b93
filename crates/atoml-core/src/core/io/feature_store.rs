use crate::core::models::matrix::FeatureMatrix;
use nalgebra::DMatrix;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const ID_COLUMN: &str = "id";
const TARGET_COLUMN: &str = "target";

#[derive(Debug, Error)]
pub enum FeatureStoreError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Inconsistent table '{path}': {message}")]
    Inconsistent { path: String, message: String },
}

/// Which part of a train/test split a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataRole {
    Train,
    Test,
}

/// Which feature space a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureSpace {
    Original,
    Expanded,
    /// The reduced space a model builder settled on.
    Selected,
}

impl fmt::Display for DataRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataRole::Train => "train",
            DataRole::Test => "test",
        })
    }
}

impl fmt::Display for FeatureSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeatureSpace::Original => "original",
            FeatureSpace::Expanded => "expanded",
            FeatureSpace::Selected => "selected",
        })
    }
}

/// A feature table read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub ids: Vec<String>,
    pub features: FeatureMatrix,
    pub targets: Vec<Option<f64>>,
}

/// A directory of CSV feature tables, one file per role and feature space.
///
/// Each table has the header `id,<feature names...>,target`. Missing targets are
/// written as empty cells.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    root: PathBuf,
}

impl FeatureStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, FeatureStoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| FeatureStoreError::Io {
            path: root.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, role: DataRole, space: FeatureSpace) -> PathBuf {
        self.root.join(format!("{}_{}.csv", role, space))
    }

    /// Writes (overwriting) a table.
    pub fn write_table(
        &self,
        role: DataRole,
        space: FeatureSpace,
        ids: &[String],
        features: &FeatureMatrix,
        targets: Option<&[f64]>,
    ) -> Result<PathBuf, FeatureStoreError> {
        let path = self.table_path(role, space);
        write_csv(&path, ids, features, targets)?;
        Ok(path)
    }

    /// Reads a table previously written with [`FeatureStore::write_table`].
    pub fn read_table(
        &self,
        role: DataRole,
        space: FeatureSpace,
    ) -> Result<StoredTable, FeatureStoreError> {
        let path = self.table_path(role, space);
        let path_str = path.to_string_lossy().to_string();
        let csv_err = |e: csv::Error| FeatureStoreError::Csv {
            path: path_str.clone(),
            source: e,
        };
        let inconsistent = |message: String| FeatureStoreError::Inconsistent {
            path: path_str.clone(),
            message,
        };

        let mut reader = csv::Reader::from_path(&path).map_err(csv_err)?;
        let header: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();
        if header.len() < 2
            || header[0] != ID_COLUMN
            || header[header.len() - 1] != TARGET_COLUMN
        {
            return Err(inconsistent(format!(
                "expected '{}' and '{}' columns",
                ID_COLUMN, TARGET_COLUMN
            )));
        }
        let names = header[1..header.len() - 1].to_vec();
        let width = names.len();

        let mut ids = Vec::new();
        let mut values = Vec::new();
        let mut targets = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            ids.push(record[0].to_string());
            for col in 1..=width {
                let cell = &record[col];
                values.push(cell.parse::<f64>().map_err(|_| {
                    inconsistent(format!("row {}: invalid number '{}'", row + 1, cell))
                })?);
            }
            let target = &record[width + 1];
            targets.push(if target.is_empty() {
                None
            } else {
                Some(target.parse::<f64>().map_err(|_| {
                    inconsistent(format!("row {}: invalid target '{}'", row + 1, target))
                })?)
            });
        }

        let data = DMatrix::from_row_slice(ids.len(), width, &values);
        let features = FeatureMatrix::new(data, names)
            .ok_or_else(|| inconsistent("feature names do not match columns".to_string()))?;
        Ok(StoredTable {
            ids,
            features,
            targets,
        })
    }
}

/// Writes a feature table to `path`: an `id` column, one column per feature and a
/// `target` column that is left empty when no targets are given.
pub fn write_csv(
    path: &Path,
    ids: &[String],
    features: &FeatureMatrix,
    targets: Option<&[f64]>,
) -> Result<(), FeatureStoreError> {
    let path_str = path.to_string_lossy().to_string();

    if ids.len() != features.nrows() || targets.is_some_and(|t| t.len() != ids.len()) {
        return Err(FeatureStoreError::Inconsistent {
            path: path_str,
            message: format!(
                "{} ids, {} feature rows, {} targets",
                ids.len(),
                features.nrows(),
                targets.map_or(0, |t| t.len())
            ),
        });
    }

    let csv_err = |e: csv::Error| FeatureStoreError::Csv {
        path: path_str.clone(),
        source: e,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

    let mut header = Vec::with_capacity(features.ncols() + 2);
    header.push(ID_COLUMN.to_string());
    header.extend(features.names().iter().cloned());
    header.push(TARGET_COLUMN.to_string());
    writer.write_record(&header).map_err(csv_err)?;

    for (row, id) in ids.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(id.clone());
        record.extend(features.data().row(row).iter().map(|v| v.to_string()));
        record.push(targets.map(|t| t[row].to_string()).unwrap_or_default());
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| FeatureStoreError::Io {
        path: path_str.clone(),
        source: e,
    })?;

    debug!(path = %path.display(), rows = ids.len(), "Feature table written.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_features() -> FeatureMatrix {
        FeatureMatrix::new(
            DMatrix::from_row_slice(2, 2, &[1.5, 0.0, -2.0, 3.25]),
            vec!["comp_H".into(), "eig_0".into()],
        )
        .unwrap()
    }

    #[test]
    fn table_path_combines_role_and_space() {
        let dir = tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();
        assert_eq!(
            store.table_path(DataRole::Train, FeatureSpace::Expanded),
            dir.path().join("train_expanded.csv")
        );
    }

    #[test]
    fn write_then_read_restores_table() {
        let dir = tempdir().unwrap();
        let store = FeatureStore::open(dir.path().join("nested")).unwrap();
        let ids = vec!["a".to_string(), "b".to_string()];

        store
            .write_table(
                DataRole::Train,
                FeatureSpace::Original,
                &ids,
                &sample_features(),
                Some(&[0.5, -1.0]),
            )
            .unwrap();
        let table = store
            .read_table(DataRole::Train, FeatureSpace::Original)
            .unwrap();

        assert_eq!(table.ids, ids);
        assert_eq!(table.features, sample_features());
        assert_eq!(table.targets, vec![Some(0.5), Some(-1.0)]);
    }

    #[test]
    fn missing_targets_are_stored_as_empty_cells() {
        let dir = tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();
        let ids = vec!["a".to_string(), "b".to_string()];

        let path = store
            .write_table(
                DataRole::Test,
                FeatureSpace::Original,
                &ids,
                &sample_features(),
                None,
            )
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("id,comp_H,eig_0,target\n"));
        assert!(content.contains("a,1.5,0,\n"));

        let table = store
            .read_table(DataRole::Test, FeatureSpace::Original)
            .unwrap();
        assert_eq!(table.targets, vec![None, None]);
    }

    #[test]
    fn write_table_rejects_row_mismatch() {
        let dir = tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();
        let result = store.write_table(
            DataRole::Train,
            FeatureSpace::Original,
            &["only".to_string()],
            &sample_features(),
            None,
        );
        assert!(matches!(result, Err(FeatureStoreError::Inconsistent { .. })));
    }
}

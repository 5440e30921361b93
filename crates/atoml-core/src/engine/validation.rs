use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::regression::metrics::ErrorSummary;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Error statistics of one fit on a subset, evaluated on its sibling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationRecord {
    pub level: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub rmse: f64,
    pub mae: f64,
}

/// Aggregated validation error for one training-set size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LearningCurvePoint {
    pub train_size: usize,
    pub mean_rmse: f64,
    pub std_rmse: f64,
    pub mean_mae: f64,
    pub count: usize,
}

/// Nested halvings of a shuffled index set.
///
/// Level `k` holds `2^k` disjoint subsets; subsets `2i` and `2i + 1` are siblings that
/// together make up subset `i` of level `k - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchySplit {
    levels: Vec<Vec<Vec<usize>>>,
    max_split: Option<usize>,
}

struct Task<'a> {
    level: usize,
    train: &'a [usize],
    test: &'a [usize],
}

impl HierarchySplit {
    /// Shuffles `0..n` and halves it recursively until a half would hold fewer than
    /// `min_split` records. Levels whose subsets exceed `max_split` are not evaluated.
    pub fn new(
        n: usize,
        min_split: usize,
        max_split: Option<usize>,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let min_split = min_split.max(1);
        if n / 2 < min_split {
            return Err(EngineError::InsufficientData {
                context: "hierarchical validation",
                required: 2 * min_split,
                available: n,
            });
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut levels = vec![vec![indices]];
        while let Some(last) = levels.last() {
            if last.iter().any(|subset| subset.len() / 2 < min_split) {
                break;
            }
            let next = last
                .iter()
                .flat_map(|subset| {
                    let (a, b) = subset.split_at(subset.len() / 2);
                    [a.to_vec(), b.to_vec()]
                })
                .collect();
            levels.push(next);
        }
        debug!(levels = levels.len() - 1, n, "Hierarchy built.");
        Ok(Self { levels, max_split })
    }

    /// Number of halving levels below the full set.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn subsets(&self, level: usize) -> &[Vec<usize>] {
        self.levels.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_evaluated(&self, level: usize) -> bool {
        let largest = self.subsets(level).iter().map(Vec::len).max().unwrap_or(0);
        level > 0 && self.max_split.is_none_or(|max| largest <= max)
    }

    fn tasks(&self) -> Vec<Task<'_>> {
        let mut tasks = Vec::new();
        for level in 1..self.levels.len() {
            if !self.is_evaluated(level) {
                continue;
            }
            for pair in self.levels[level].chunks(2) {
                if let [a, b] = pair {
                    tasks.push(Task {
                        level,
                        train: a,
                        test: b,
                    });
                    tasks.push(Task {
                        level,
                        train: b,
                        test: a,
                    });
                }
            }
        }
        tasks
    }

    /// Fits on every evaluated subset and scores on its sibling, in both directions.
    ///
    /// `score` receives the training and test indices and returns the test error.
    pub fn evaluate<F>(
        &self,
        score: F,
        reporter: &ProgressReporter,
    ) -> Result<Vec<ValidationRecord>, EngineError>
    where
        F: Fn(&[usize], &[usize]) -> Result<ErrorSummary, EngineError> + Sync,
    {
        let tasks = self.tasks();
        if tasks.is_empty() {
            return Err(EngineError::InsufficientData {
                context: "hierarchical validation (no level within max-split)",
                required: 1,
                available: 0,
            });
        }
        info!(tasks = tasks.len(), "Running hierarchical validation.");
        reporter.report(Progress::TaskStart {
            total_steps: tasks.len() as u64,
        });

        let run = |task: &Task| -> Result<ValidationRecord, EngineError> {
            let summary = score(task.train, task.test)?;
            reporter.report(Progress::TaskIncrement);
            Ok(ValidationRecord {
                level: task.level,
                train_size: task.train.len(),
                test_size: task.test.len(),
                rmse: summary.rmse,
                mae: summary.mae,
            })
        };

        #[cfg(feature = "parallel")]
        let records = tasks.par_iter().map(run).collect::<Result<Vec<_>, _>>();

        #[cfg(not(feature = "parallel"))]
        let records = tasks.iter().map(run).collect::<Result<Vec<_>, _>>();

        reporter.report(Progress::TaskFinish);
        records
    }
}

/// Averages records per training-set size, smallest size first.
pub fn learning_curve(records: &[ValidationRecord]) -> Vec<LearningCurvePoint> {
    let mut groups: BTreeMap<usize, Vec<&ValidationRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.train_size).or_default().push(record);
    }
    groups
        .into_iter()
        .map(|(train_size, group)| {
            let count = group.len();
            let n = count as f64;
            let mean_rmse = group.iter().map(|r| r.rmse).sum::<f64>() / n;
            let var = group
                .iter()
                .map(|r| (r.rmse - mean_rmse).powi(2))
                .sum::<f64>()
                / n;
            LearningCurvePoint {
                train_size,
                mean_rmse,
                std_rmse: var.sqrt(),
                mean_mae: group.iter().map(|r| r.mae).sum::<f64>() / n,
                count,
            }
        })
        .collect()
}

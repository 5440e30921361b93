use super::config::SplitConfig;
use super::error::EngineError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partitions `0..n` into train and test indices.
///
/// The test side receives `round(n * test_fraction)` records, clamped so that neither
/// side is empty. Without shuffling the first records train and the rest test.
pub fn train_test_split(n: usize, config: &SplitConfig) -> Result<TrainTestSplit, EngineError> {
    config.validate()?;
    if n < 2 {
        return Err(EngineError::InsufficientData {
            context: "train/test split",
            required: 2,
            available: n,
        });
    }
    let n_test = ((n as f64 * config.test_fraction).round() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    if config.shuffle {
        let mut rng = StdRng::seed_from_u64(config.seed);
        indices.shuffle(&mut rng);
    }
    let test = indices.split_off(n - n_test);
    Ok(TrainTestSplit {
        train: indices,
        test,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(test_fraction: f64, shuffle: bool) -> SplitConfig {
        SplitConfig {
            test_fraction,
            seed: 42,
            shuffle,
        }
    }

    #[test]
    fn unshuffled_split_keeps_order() {
        let split = train_test_split(10, &config(0.3, false)).unwrap();
        assert_eq!(split.train, (0..7).collect::<Vec<_>>());
        assert_eq!(split.test, vec![7, 8, 9]);
    }

    #[test]
    fn shuffled_split_is_a_seeded_partition() {
        let a = train_test_split(20, &config(0.25, true)).unwrap();
        let b = train_test_split(20, &config(0.25, true)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 5);

        let mut all: Vec<usize> = a.train.iter().chain(&a.test).copied().collect();
        all.sort();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn both_sides_are_never_empty() {
        let tiny = train_test_split(2, &config(0.01, false)).unwrap();
        assert_eq!((tiny.train.len(), tiny.test.len()), (1, 1));
        let large = train_test_split(3, &config(0.99, false)).unwrap();
        assert_eq!((large.train.len(), large.test.len()), (1, 2));
        assert!(matches!(
            train_test_split(1, &config(0.5, false)),
            Err(EngineError::InsufficientData { available: 1, .. })
        ));
    }
}

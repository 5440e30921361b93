use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalculatorError {
    #[error("Got {numbers} atomic numbers but {positions} positions")]
    LengthMismatch { numbers: usize, positions: usize },
    #[error("Atoms {i} and {j} overlap")]
    AtomOverlap { i: usize, j: usize },
}

/// Energies and forces for a configuration of atoms.
pub trait Calculator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Total energy and the force on every atom.
    fn energy_and_forces(
        &self,
        numbers: &[u8],
        positions: &[Point3<f64>],
    ) -> Result<(f64, Vec<Vector3<f64>>), CalculatorError>;

    fn energy(&self, numbers: &[u8], positions: &[Point3<f64>]) -> Result<f64, CalculatorError> {
        self.energy_and_forces(numbers, positions).map(|(e, _)| e)
    }
}

/// Sums a radial pair potential `(energy(r), dE/dr)` over all pairs within `cutoff`.
fn pair_sum<F>(
    numbers: &[u8],
    positions: &[Point3<f64>],
    cutoff: Option<f64>,
    pair: F,
) -> Result<(f64, Vec<Vector3<f64>>), CalculatorError>
where
    F: Fn(f64) -> (f64, f64),
{
    if numbers.len() != positions.len() {
        return Err(CalculatorError::LengthMismatch {
            numbers: numbers.len(),
            positions: positions.len(),
        });
    }
    let shift = cutoff.map(|rc| pair(rc).0).unwrap_or(0.0);
    let mut energy = 0.0;
    let mut forces = vec![Vector3::zeros(); positions.len()];
    for i in 0..positions.len() {
        for j in i + 1..positions.len() {
            let rij = positions[i] - positions[j];
            let r = rij.norm();
            if r < 1e-6 {
                return Err(CalculatorError::AtomOverlap { i, j });
            }
            if cutoff.is_some_and(|rc| r >= rc) {
                continue;
            }
            let (e, de_dr) = pair(r);
            energy += e - shift;
            let f = rij * (-de_dr / r);
            forces[i] += f;
            forces[j] -= f;
        }
    }
    Ok((energy, forces))
}

/// 12-6 Lennard-Jones pair potential, shifted to zero at the cutoff when one is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: Option<f64>,
}

impl LennardJones {
    fn pair(&self, r: f64) -> (f64, f64) {
        let sr6 = (self.sigma / r).powi(6);
        let sr12 = sr6 * sr6;
        let energy = 4.0 * self.epsilon * (sr12 - sr6);
        let de_dr = 4.0 * self.epsilon * (-12.0 * sr12 + 6.0 * sr6) / r;
        (energy, de_dr)
    }
}

impl Calculator for LennardJones {
    fn name(&self) -> &'static str {
        "lennard-jones"
    }

    fn energy_and_forces(
        &self,
        numbers: &[u8],
        positions: &[Point3<f64>],
    ) -> Result<(f64, Vec<Vector3<f64>>), CalculatorError> {
        pair_sum(numbers, positions, self.cutoff, |r| self.pair(r))
    }
}

/// Morse pair potential `D (exp(-2a(r - r0)) - 2 exp(-a(r - r0)))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Morse {
    pub depth: f64,
    pub alpha: f64,
    pub r0: f64,
    pub cutoff: Option<f64>,
}

impl Morse {
    fn pair(&self, r: f64) -> (f64, f64) {
        let x = (-self.alpha * (r - self.r0)).exp();
        let energy = self.depth * (x * x - 2.0 * x);
        let de_dr = 2.0 * self.alpha * self.depth * (x - x * x);
        (energy, de_dr)
    }
}

impl Calculator for Morse {
    fn name(&self) -> &'static str {
        "morse"
    }

    fn energy_and_forces(
        &self,
        numbers: &[u8],
        positions: &[Point3<f64>],
    ) -> Result<(f64, Vec<Vector3<f64>>), CalculatorError> {
        pair_sum(numbers, positions, self.cutoff, |r| self.pair(r))
    }
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid potential parameters in '{path}': {message}")]
    Invalid { path: String, message: String },
}

/// Potential selection as read from a parameter file, e.g.
///
/// ```toml
/// potential = "morse"
/// depth = 0.35
/// alpha = 1.4
/// r0 = 2.9
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "potential", rename_all = "kebab-case")]
pub enum PotentialParams {
    LennardJones {
        epsilon: f64,
        sigma: f64,
        cutoff: Option<f64>,
    },
    Morse {
        depth: f64,
        alpha: f64,
        r0: f64,
        cutoff: Option<f64>,
    },
}

impl PotentialParams {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let display = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: display.clone(),
            source: e,
        })?;
        let params: Self = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: display.clone(),
            source: e,
        })?;
        params.validate().map_err(|message| ParamLoadError::Invalid {
            path: display,
            message,
        })?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), String> {
        let (named, cutoff): (Vec<(&str, f64)>, Option<f64>) = match self {
            PotentialParams::LennardJones {
                epsilon,
                sigma,
                cutoff,
            } => (vec![("epsilon", *epsilon), ("sigma", *sigma)], *cutoff),
            PotentialParams::Morse {
                depth,
                alpha,
                r0,
                cutoff,
            } => (
                vec![("depth", *depth), ("alpha", *alpha), ("r0", *r0)],
                *cutoff,
            ),
        };
        for (name, value) in named.into_iter().chain(cutoff.map(|c| ("cutoff", c))) {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("'{}' must be positive, got {}", name, value));
            }
        }
        Ok(())
    }

    pub fn into_calculator(self) -> Box<dyn Calculator> {
        match self {
            PotentialParams::LennardJones {
                epsilon,
                sigma,
                cutoff,
            } => Box::new(LennardJones {
                epsilon,
                sigma,
                cutoff,
            }),
            PotentialParams::Morse {
                depth,
                alpha,
                r0,
                cutoff,
            } => Box::new(Morse {
                depth,
                alpha,
                r0,
                cutoff,
            }),
        }
    }
}

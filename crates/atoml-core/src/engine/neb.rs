use super::config::NebConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::structure::{Atom, InfoValue, Structure};
use crate::core::potentials::{Calculator, CalculatorError};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// FIRE parameters; the time step is unitless since every atom has unit mass.
const FIRE_DT: f64 = 0.1;
const FIRE_DT_MAX: f64 = 1.0;
const FIRE_N_MIN: usize = 5;
const FIRE_F_INC: f64 = 1.1;
const FIRE_F_DEC: f64 = 0.5;
const FIRE_ALPHA_START: f64 = 0.1;
const FIRE_F_ALPHA: f64 = 0.99;

type Configuration = Vec<Point3<f64>>;
type Forces = Vec<Vector3<f64>>;

#[derive(Debug, Clone, PartialEq)]
pub struct NebResult {
    /// The full band, end points included. Each image carries its `energy` in the info map.
    pub images: Vec<Structure>,
    pub energies: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// Largest per-atom NEB force on the final band.
    pub max_force: f64,
    pub forward_barrier: f64,
    pub reverse_barrier: f64,
    /// Index into `images` of the climbing image, if one was used.
    pub climbing_index: Option<usize>,
}

/// Linearly interpolates `images` intermediate structures between two end points.
///
/// The returned band has `images + 2` entries with the end points cloned at either side.
pub fn interpolate(
    initial: &Structure,
    final_state: &Structure,
    images: usize,
) -> Result<Vec<Structure>, EngineError> {
    if initial.len() != final_state.len() {
        return Err(EngineError::Neb(format!(
            "end points have {} and {} atoms",
            initial.len(),
            final_state.len()
        )));
    }
    if initial.numbers() != final_state.numbers() {
        return Err(EngineError::Neb(
            "end points have different atomic numbers".to_string(),
        ));
    }
    if initial.is_empty() {
        return Err(EngineError::Neb("end points contain no atoms".to_string()));
    }

    let start = initial.positions();
    let end = final_state.positions();
    let mut band = Vec::with_capacity(images + 2);
    band.push(initial.clone());
    for k in 1..=images {
        let t = k as f64 / (images + 1) as f64;
        let positions: Configuration = start
            .iter()
            .zip(&end)
            .map(|(a, b)| a + (b - a) * t)
            .collect();
        band.push(rebuild(initial, &format!("image-{}", k), &positions));
    }
    band.push(final_state.clone());
    Ok(band)
}

fn rebuild(template: &Structure, unique_id: &str, positions: &[Point3<f64>]) -> Structure {
    let atoms = template
        .atoms()
        .iter()
        .zip(positions)
        .map(|(atom, p)| Atom::new(atom.number, *p))
        .collect();
    Structure::with_atoms(unique_id, atoms)
}

fn dot(a: &[Vector3<f64>], b: &[Vector3<f64>]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x.dot(y)).sum()
}

fn norm(a: &[Vector3<f64>]) -> f64 {
    dot(a, a).sqrt()
}

fn difference(a: &[Point3<f64>], b: &[Point3<f64>]) -> Vec<Vector3<f64>> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Improved tangent estimate at an image from its neighbours' energies.
fn tangent(
    previous: (&[Point3<f64>], f64),
    current: (&[Point3<f64>], f64),
    next: (&[Point3<f64>], f64),
) -> (Forces, f64, f64) {
    let tau_plus = difference(next.0, current.0);
    let tau_minus = difference(current.0, previous.0);
    let (e_prev, e, e_next) = (previous.1, current.1, next.1);

    let (w_plus, w_minus) = if e_next > e && e > e_prev {
        (1.0, 0.0)
    } else if e_next < e && e < e_prev {
        (0.0, 1.0)
    } else {
        let d_max = (e_next - e).abs().max((e_prev - e).abs());
        let d_min = (e_next - e).abs().min((e_prev - e).abs());
        if e_next > e_prev {
            (d_max, d_min)
        } else {
            (d_min, d_max)
        }
    };

    let mut tau: Forces = tau_plus
        .iter()
        .zip(&tau_minus)
        .map(|(p, m)| p * w_plus + m * w_minus)
        .collect();
    let length = norm(&tau);
    if length > 0.0 {
        tau.iter_mut().for_each(|t| *t /= length);
    } else {
        // Degenerate weights (flat energies): fall back to the central difference.
        tau = difference(next.0, previous.0);
        let length = norm(&tau);
        if length > 0.0 {
            tau.iter_mut().for_each(|t| *t /= length);
        }
    }
    (tau, norm(&tau_plus), norm(&tau_minus))
}

struct Fire {
    velocity: Vec<Forces>,
    dt: f64,
    alpha: f64,
    positive_steps: usize,
}

impl Fire {
    fn new(images: usize, atoms: usize) -> Self {
        Self {
            velocity: vec![vec![Vector3::zeros(); atoms]; images],
            dt: FIRE_DT,
            alpha: FIRE_ALPHA_START,
            positive_steps: 0,
        }
    }

    fn total_dot(a: &[Forces], b: &[Forces]) -> f64 {
        a.iter().zip(b).map(|(x, y)| dot(x, y)).sum()
    }

    /// Returns the displacement for every movable image, capped in total length.
    fn step(&mut self, forces: &[Forces], max_step: f64) -> Vec<Forces> {
        let power = Self::total_dot(&self.velocity, forces);
        if power > 0.0 {
            let v_norm = Self::total_dot(&self.velocity, &self.velocity).sqrt();
            let f_norm = Self::total_dot(forces, forces).sqrt();
            if f_norm > 0.0 {
                for (v_img, f_img) in self.velocity.iter_mut().zip(forces) {
                    for (v, f) in v_img.iter_mut().zip(f_img) {
                        *v = *v * (1.0 - self.alpha) + f * (self.alpha * v_norm / f_norm);
                    }
                }
            }
            if self.positive_steps > FIRE_N_MIN {
                self.dt = (self.dt * FIRE_F_INC).min(FIRE_DT_MAX);
                self.alpha *= FIRE_F_ALPHA;
            }
            self.positive_steps += 1;
        } else {
            self.velocity
                .iter_mut()
                .for_each(|img| img.iter_mut().for_each(|v| *v = Vector3::zeros()));
            self.alpha = FIRE_ALPHA_START;
            self.dt *= FIRE_F_DEC;
            self.positive_steps = 0;
        }

        for (v_img, f_img) in self.velocity.iter_mut().zip(forces) {
            for (v, f) in v_img.iter_mut().zip(f_img) {
                *v += f * self.dt;
            }
        }
        let mut displacement: Vec<Forces> = self
            .velocity
            .iter()
            .map(|img| img.iter().map(|v| v * self.dt).collect())
            .collect();
        let length = Self::total_dot(&displacement, &displacement).sqrt();
        if length > max_step {
            let scale = max_step / length;
            displacement
                .iter_mut()
                .for_each(|img| img.iter_mut().for_each(|d| *d *= scale));
        }
        displacement
    }
}

/// Nudged elastic band relaxation of a band of images under a calculator.
pub struct Neb<'a> {
    config: &'a NebConfig,
    calculator: &'a dyn Calculator,
}

impl<'a> Neb<'a> {
    pub fn new(config: &'a NebConfig, calculator: &'a dyn Calculator) -> Self {
        Self { config, calculator }
    }

    /// Interpolates a band between the end points and relaxes it.
    pub fn run(
        &self,
        initial: &Structure,
        final_state: &Structure,
        reporter: &ProgressReporter,
    ) -> Result<NebResult, EngineError> {
        let band = interpolate(initial, final_state, self.config.images)?;
        self.relax(band, reporter)
    }

    fn evaluate(
        &self,
        numbers: &[u8],
        movable: &[Configuration],
    ) -> Result<Vec<(f64, Forces)>, CalculatorError> {
        #[cfg(feature = "parallel")]
        let evaluated = movable
            .par_iter()
            .map(|positions| self.calculator.energy_and_forces(numbers, positions))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let evaluated = movable
            .iter()
            .map(|positions| self.calculator.energy_and_forces(numbers, positions))
            .collect();
        evaluated
    }

    /// Relaxes an existing band; the first and last images stay fixed.
    #[instrument(skip_all, name = "neb_relax")]
    pub fn relax(
        &self,
        band: Vec<Structure>,
        reporter: &ProgressReporter,
    ) -> Result<NebResult, EngineError> {
        if band.len() < 3 {
            return Err(EngineError::InsufficientData {
                context: "nudged elastic band images",
                required: 3,
                available: band.len(),
            });
        }
        let template = band[0].clone();
        let numbers = template.numbers();
        if band.iter().any(|s| s.numbers() != numbers) {
            return Err(EngineError::Neb(
                "images have different atomic numbers".to_string(),
            ));
        }

        let last = band.len() - 1;
        let mut path: Vec<Configuration> = band.iter().map(Structure::positions).collect();
        let e_start = self.calculator.energy(&numbers, &path[0])?;
        let e_end = self.calculator.energy(&numbers, &path[last])?;
        let k = self.config.spring_constant;

        info!(
            images = last - 1,
            atoms = numbers.len(),
            calculator = self.calculator.name(),
            climb = self.config.climbing_image,
            "Starting NEB relaxation."
        );
        reporter.report(Progress::TaskStart {
            total_steps: self.config.max_steps as u64,
        });

        let mut fire = Fire::new(last - 1, numbers.len());
        let mut iterations = 0;
        let (energies, max_force, climbing_index, converged) = loop {
            let evaluated = self.evaluate(&numbers, &path[1..last])?;
            let mut energies = Vec::with_capacity(band.len());
            energies.push(e_start);
            energies.extend(evaluated.iter().map(|(e, _)| *e));
            energies.push(e_end);

            let climbing_index = if self.config.climbing_image {
                (1..last).max_by(|&a, &b| energies[a].total_cmp(&energies[b]))
            } else {
                None
            };

            let neb_forces: Vec<Forces> = (1..last)
                .map(|i| {
                    let (tau, d_plus, d_minus) = tangent(
                        (&path[i - 1], energies[i - 1]),
                        (&path[i], energies[i]),
                        (&path[i + 1], energies[i + 1]),
                    );
                    let true_force = &evaluated[i - 1].1;
                    let parallel = dot(true_force, &tau);
                    if Some(i) == climbing_index {
                        true_force
                            .iter()
                            .zip(&tau)
                            .map(|(f, t)| f - t * (2.0 * parallel))
                            .collect()
                    } else {
                        let spring = k * (d_plus - d_minus);
                        true_force
                            .iter()
                            .zip(&tau)
                            .map(|(f, t)| f - t * parallel + t * spring)
                            .collect()
                    }
                })
                .collect();

            let max_force = neb_forces
                .iter()
                .flat_map(|img| img.iter().map(|f| f.norm()))
                .fold(0.0, f64::max);
            if !max_force.is_finite() {
                return Err(EngineError::Neb(format!(
                    "non-finite forces at step {}",
                    iterations
                )));
            }
            debug!(step = iterations, fmax = max_force, "NEB step.");

            if max_force <= self.config.fmax {
                break (energies, max_force, climbing_index, true);
            }
            if iterations == self.config.max_steps {
                break (energies, max_force, climbing_index, false);
            }

            let displacement = fire.step(&neb_forces, self.config.max_step_length);
            for (positions, delta) in path[1..last].iter_mut().zip(&displacement) {
                for (p, d) in positions.iter_mut().zip(delta) {
                    *p += d;
                }
            }
            iterations += 1;
            reporter.report(Progress::TaskIncrement);
            reporter.report(Progress::StatusUpdate {
                text: format!("step {} fmax {:.4}", iterations, max_force),
            });
        };
        reporter.report(Progress::TaskFinish);

        let peak = energies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let forward_barrier = peak - e_start;
        let reverse_barrier = peak - e_end;
        if converged {
            info!(iterations, forward_barrier, reverse_barrier, "NEB converged.");
        } else {
            warn!(
                iterations,
                fmax = max_force,
                "NEB did not converge within the step limit."
            );
        }

        let images = path
            .iter()
            .zip(&energies)
            .enumerate()
            .map(|(i, (positions, energy))| {
                let id = match i {
                    0 => band[0].unique_id().to_string(),
                    i if i == last => band[last].unique_id().to_string(),
                    i => format!("image-{}", i),
                };
                let mut image = rebuild(&template, &id, positions);
                image.set_info("energy", InfoValue::Float(*energy));
                image
            })
            .collect();

        Ok(NebResult {
            images,
            energies,
            converged,
            iterations,
            max_force,
            forward_barrier,
            reverse_barrier,
            climbing_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::potentials::LennardJones;

    /// Single particle in `(x^2 - 1)^2 + y^2 + z^2`: minima at x = ±1, saddle of height 1 at
    /// the origin.
    struct DoubleWell;

    impl Calculator for DoubleWell {
        fn name(&self) -> &'static str {
            "double-well"
        }

        fn energy_and_forces(
            &self,
            _numbers: &[u8],
            positions: &[Point3<f64>],
        ) -> Result<(f64, Vec<Vector3<f64>>), CalculatorError> {
            let p = positions[0];
            let energy = (p.x * p.x - 1.0).powi(2) + p.y * p.y + p.z * p.z;
            let force = Vector3::new(-4.0 * p.x * (p.x * p.x - 1.0), -2.0 * p.y, -2.0 * p.z);
            Ok((energy, vec![force]))
        }
    }

    fn single(id: &str, x: f64, y: f64) -> Structure {
        Structure::with_atoms(id, vec![Atom::new(1, Point3::new(x, y, 0.0))])
    }

    fn config(climb: bool) -> NebConfig {
        NebConfig {
            images: 5,
            spring_constant: 1.0,
            climbing_image: climb,
            fmax: 1e-3,
            max_steps: 5000,
            max_step_length: 0.2,
        }
    }

    #[test]
    fn interpolation_places_images_evenly() {
        let a = single("a", -1.0, 0.0);
        let b = single("b", 1.0, 0.0);
        let band = interpolate(&a, &b, 3).unwrap();
        assert_eq!(band.len(), 5);
        assert_eq!(band[0].unique_id(), "a");
        assert_eq!(band[4].unique_id(), "b");
        let xs: Vec<f64> = band.iter().map(|s| s.positions()[0].x).collect();
        for (x, expected) in xs.iter().zip([-1.0, -0.5, 0.0, 0.5, 1.0]) {
            assert!((x - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn interpolation_rejects_mismatched_end_points() {
        let a = single("a", 0.0, 0.0);
        let b = Structure::with_atoms("b", vec![Atom::new(6, Point3::origin())]);
        assert!(matches!(interpolate(&a, &b, 2), Err(EngineError::Neb(_))));

        let c = Structure::with_atoms(
            "c",
            vec![Atom::new(1, Point3::origin()), Atom::new(1, Point3::new(1.0, 0.0, 0.0))],
        );
        assert!(matches!(interpolate(&a, &c, 2), Err(EngineError::Neb(_))));
    }

    #[test]
    fn climbing_image_finds_saddle_from_bent_path() {
        let config = config(true);
        let a = single("a", -1.0, 0.0);
        let b = single("b", 1.0, 0.0);
        let mut band = interpolate(&a, &b, config.images).unwrap();
        for (i, image) in band.iter_mut().enumerate().take(6).skip(1) {
            let p = image.positions()[0];
            let id = image.unique_id().to_string();
            *image = single(&id, p.x, 0.1 * i as f64);
        }

        let calculator = DoubleWell;
        let result = Neb::new(&config, &calculator)
            .relax(band, &ProgressReporter::new())
            .unwrap();

        assert!(result.converged);
        assert!(result.max_force <= 1e-3);
        assert_eq!(result.climbing_index, Some(3));
        assert!((result.forward_barrier - 1.0).abs() < 1e-2);
        assert!((result.reverse_barrier - 1.0).abs() < 1e-2);
        let saddle = result.images[3].positions()[0];
        assert!(saddle.x.abs() < 1e-2 && saddle.y.abs() < 1e-2);
        assert_eq!(result.images.len(), 7);
        assert_eq!(
            result.images[3].target("energy"),
            Some(result.energies[3])
        );
    }

    #[test]
    fn straight_symmetric_path_is_already_converged() {
        let config = config(true);
        let calculator = DoubleWell;
        let result = Neb::new(&config, &calculator)
            .run(&single("a", -1.0, 0.0), &single("b", 1.0, 0.0), &ProgressReporter::new())
            .unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
        assert!((result.forward_barrier - 1.0).abs() < 1e-12);
    }

    #[test]
    fn step_limit_reports_non_convergence() {
        let config = NebConfig {
            max_steps: 2,
            ..config(false)
        };
        let a = Structure::with_atoms(
            "a",
            vec![Atom::new(18, Point3::origin()), Atom::new(18, Point3::new(3.8, 0.0, 0.0))],
        );
        let b = Structure::with_atoms(
            "b",
            vec![Atom::new(18, Point3::origin()), Atom::new(18, Point3::new(3.8, 3.0, 0.0))],
        );
        let lj = LennardJones {
            epsilon: 0.0104,
            sigma: 3.4,
            cutoff: None,
        };
        let result = Neb::new(&config, &lj)
            .run(&a, &b, &ProgressReporter::new())
            .unwrap();
        assert_eq!(result.iterations, 2);
        assert!(!result.converged);
        assert_eq!(result.climbing_index, None);
    }

    #[test]
    fn short_band_is_rejected() {
        let config = config(false);
        let calculator = DoubleWell;
        let band = vec![single("a", -1.0, 0.0), single("b", 1.0, 0.0)];
        assert!(matches!(
            Neb::new(&config, &calculator).relax(band, &ProgressReporter::new()),
            Err(EngineError::InsufficientData { .. })
        ));
    }
}

use crate::core::models::structure::Structure;
use crate::core::potentials::Calculator;
use crate::engine::config::NebConfig;
use crate::engine::error::EngineError;
use crate::engine::neb::{Neb, NebResult};
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

#[instrument(skip_all, name = "neb_workflow")]
pub fn run(
    initial: &Structure,
    final_state: &Structure,
    calculator: &dyn Calculator,
    config: &NebConfig,
    reporter: &ProgressReporter,
) -> Result<NebResult, EngineError> {
    config.validate()?;
    reporter.report(Progress::PhaseStart {
        name: "Path Search",
    });
    let result = Neb::new(config, calculator).run(initial, final_state, reporter)?;
    reporter.report(Progress::PhaseFinish);

    info!(
        forward_barrier = result.forward_barrier,
        reverse_barrier = result.reverse_barrier,
        converged = result.converged,
        iterations = result.iterations,
        "Minimum-energy path found."
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::Atom;
    use crate::core::potentials::Morse;
    use crate::engine::config::NebConfigBuilder;
    use nalgebra::Point3;

    fn trimer(x: f64) -> Structure {
        Structure::with_atoms(
            "trimer",
            vec![
                Atom::new(29, Point3::new(0.0, 0.0, 0.0)),
                Atom::new(29, Point3::new(2.5, 0.0, 0.0)),
                Atom::new(29, Point3::new(x, 2.2, 0.0)),
            ],
        )
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let config = NebConfig {
            images: 0,
            spring_constant: 1.0,
            climbing_image: false,
            fmax: 0.05,
            max_steps: 10,
            max_step_length: 0.2,
        };
        let morse = Morse {
            depth: 0.34,
            alpha: 1.36,
            r0: 2.5,
            cutoff: None,
        };
        assert!(matches!(
            run(&trimer(0.0), &trimer(2.5), &morse, &config, &ProgressReporter::new()),
            Err(EngineError::Config { .. })
        ));
    }

    #[test]
    fn morse_hop_has_symmetric_barrier() {
        let config = NebConfigBuilder::new()
            .images(3)
            .spring_constant(0.5)
            .climbing_image(true)
            .fmax(0.05)
            .max_steps(500)
            .max_step_length(0.1)
            .build()
            .unwrap();
        let morse = Morse {
            depth: 0.34,
            alpha: 1.36,
            r0: 2.5,
            cutoff: None,
        };
        let result = run(
            &trimer(0.0),
            &trimer(2.5),
            &morse,
            &config,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.images.len(), 5);
        assert_eq!(result.energies.len(), 5);
        assert!((result.energies[0] - result.energies[4]).abs() < 1e-9);
        assert!((result.forward_barrier - result.reverse_barrier).abs() < 1e-9);
        assert!(result.forward_barrier >= 0.0);
    }
}

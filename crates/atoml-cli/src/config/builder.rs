use super::defaults::DefaultsConfig;
use super::file::{
    FileBuilderConfig, FileConfig, FileFeaturesConfig, FileModelConfig, FileModelType,
    FileNebConfig, FileSplitConfig, FileValidationConfig,
};
use super::models::{
    BuildSettings, DataSettings, FeatureSettings, LearningCurveSettings, NebSettings,
    PredictSettings,
};
use crate::cli::{BuildArgs, DataArgs, FeaturesArgs, LearningCurveArgs, ModelKind, NebArgs, PredictArgs};
use crate::error::{CliError, Result};
use atoml::core::features::generator::{DEFAULT_BOND_BUFFER, FeatureKind};
use atoml::core::models::element::AtomicProperty;
use atoml::core::regression::gp::GpOptions;
use atoml::core::regression::kernel::Kernel;
use atoml::core::regression::ridge::RidgeOptions;
use atoml::engine::config::{self as core_config, DEFAULT_GP_REGULARIZATION};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub fn build_predict_config(args: &PredictArgs) -> Result<PredictSettings> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file(args.data.config.as_deref(), &args.data.set_values)?;
    let data = merge_data(&args.data, &mut file_config, &defaults);

    let features = merge_features(file_config.features.take(), &defaults)?;
    let model_file = file_config.model.take().unwrap_or_default();
    let uncertainty = model_file.uncertainty.unwrap_or(defaults.uncertainty);
    let model = merge_model(args.model, model_file)?;

    let mut split_file = file_config.split.take().unwrap_or_default();
    split_file.test_fraction = args.test_fraction.or(split_file.test_fraction);
    split_file.seed = args.seed.or(split_file.seed);
    let split = merge_split(split_file, &defaults);

    let core_config = core_config::PredictConfigBuilder::new()
        .features(features)
        .model(model)
        .split(split)
        .uncertainty(uncertainty)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(PredictSettings {
        data,
        output: args.output.clone(),
        core_config,
    })
}

pub fn build_learning_curve_config(args: &LearningCurveArgs) -> Result<LearningCurveSettings> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file(args.data.config.as_deref(), &args.data.set_values)?;
    let data = merge_data(&args.data, &mut file_config, &defaults);

    let features = merge_features(file_config.features.take(), &defaults)?;
    let model = merge_model(args.model, file_config.model.take().unwrap_or_default())?;

    let mut validation_file = file_config.validation.take().unwrap_or_default();
    validation_file.min_split = args.min_split.or(validation_file.min_split);
    validation_file.max_split = args.max_split.or(validation_file.max_split);
    let validation = merge_validation(validation_file, &defaults);

    let core_config = core_config::LearningCurveConfigBuilder::new()
        .features(features)
        .model(model)
        .validation(validation)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(LearningCurveSettings {
        data,
        output: args.output.clone(),
        core_config,
    })
}

pub fn build_build_config(args: &BuildArgs) -> Result<BuildSettings> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file(args.data.config.as_deref(), &args.data.set_values)?;
    let data = merge_data(&args.data, &mut file_config, &defaults);

    let features = merge_features(file_config.features.take(), &defaults)?;
    let split = merge_split(file_config.split.take().unwrap_or_default(), &defaults);

    let mut builder_file = file_config.builder.take().unwrap_or_default();
    builder_file.store = args.store.clone().or(builder_file.store);
    builder_file.size = args.size.or(builder_file.size);
    if args.no_expand {
        builder_file.expand = Some(false);
    }
    if args.no_optimize {
        builder_file.optimize = Some(false);
    }
    let builder = merge_builder(builder_file);

    let core_config = core_config::BuildConfigBuilder::new()
        .features(features)
        .split(split)
        .builder(builder)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(BuildSettings { data, core_config })
}

pub fn build_features_config(args: &FeaturesArgs) -> Result<FeatureSettings> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file(args.data.config.as_deref(), &args.data.set_values)?;
    let data = merge_data(&args.data, &mut file_config, &defaults);
    let features = merge_features(file_config.features.take(), &defaults)?;
    features
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(FeatureSettings {
        data,
        output: args.output.clone(),
        features,
    })
}

pub fn build_neb_config(args: &NebArgs) -> Result<NebSettings> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file(args.config.as_deref(), &args.set_values)?;
    let neb_file = file_config.neb.take().unwrap_or_default();

    let core_config = merge_neb(args, neb_file, &defaults)?;
    Ok(NebSettings {
        initial: args.initial.clone(),
        final_state: args.final_state.clone(),
        potential: args.potential.clone(),
        output: args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&defaults.neb_output)),
        core_config,
    })
}

fn load_file(path: Option<&Path>, set_values: &[String]) -> Result<FileConfig> {
    let file_config = match path {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    apply_set_values(file_config, set_values)
}

fn merge_data(args: &DataArgs, file: &mut FileConfig, defaults: &DefaultsConfig) -> DataSettings {
    let file_target = file.data.take().and_then(|d| d.target);
    DataSettings {
        input: args.input.clone(),
        target: args
            .target
            .clone()
            .or(file_target)
            .unwrap_or_else(|| defaults.target.clone()),
    }
}

fn merge_features(
    file: Option<FileFeaturesConfig>,
    defaults: &DefaultsConfig,
) -> Result<core_config::FeatureConfig> {
    let file = file.unwrap_or_default();
    let properties = file
        .graph_properties
        .unwrap_or_default()
        .iter()
        .map(|name| {
            AtomicProperty::from_str(name).map_err(|e| CliError::Config(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    let bond_buffer = file.bond_buffer.unwrap_or(DEFAULT_BOND_BUFFER);

    let kinds = file
        .kinds
        .unwrap_or_else(|| defaults.feature_kinds.clone())
        .iter()
        .map(|name| {
            let kind =
                FeatureKind::from_str(name).map_err(|e| CliError::Config(e.to_string()))?;
            Ok(match kind {
                FeatureKind::Graph { .. } => FeatureKind::Graph {
                    properties: properties.clone(),
                    bond_buffer,
                },
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(core_config::FeatureConfig {
        kinds,
        clean_zero: file.clean_zero.unwrap_or(defaults.clean_zero),
        standardize: file.standardize.unwrap_or(defaults.standardize),
    })
}

fn merge_model(cli: Option<ModelKind>, file: FileModelConfig) -> Result<core_config::ModelConfig> {
    let kind = match (cli, file.model_type) {
        (Some(ModelKind::Ridge), _) => FileModelType::Ridge,
        (Some(ModelKind::Gp), _) => FileModelType::GaussianProcess,
        (None, Some(kind)) => kind,
        (None, None) => FileModelType::GaussianProcess,
    };

    match kind {
        FileModelType::Ridge => {
            let defaults = RidgeOptions::default();
            Ok(core_config::ModelConfig::Ridge {
                grid_points: file.grid_points.unwrap_or(defaults.grid_points),
                refinements: file.refinements.unwrap_or(defaults.refinements),
                fit_intercept: file.fit_intercept.unwrap_or(defaults.fit_intercept),
            })
        }
        FileModelType::GaussianProcess => {
            let defaults = GpOptions::default();
            let kernel = match file.kernel {
                Some(terms) => Kernel::new(terms).map_err(|e| CliError::Config(e.to_string()))?,
                None => Kernel::default(),
            };
            Ok(core_config::ModelConfig::GaussianProcess {
                kernel,
                regularization: file
                    .regularization
                    .unwrap_or(DEFAULT_GP_REGULARIZATION),
                optimize_hyperparameters: file
                    .optimize_hyperparameters
                    .unwrap_or(defaults.optimize_hyperparameters),
                standardize_target: file
                    .standardize_target
                    .unwrap_or(defaults.standardize_target),
                max_iterations: file.max_iterations.unwrap_or(defaults.max_iterations),
            })
        }
    }
}

fn merge_split(file: FileSplitConfig, defaults: &DefaultsConfig) -> core_config::SplitConfig {
    core_config::SplitConfig {
        test_fraction: file.test_fraction.unwrap_or(defaults.test_fraction),
        seed: file.seed.unwrap_or(defaults.seed),
        shuffle: file.shuffle.unwrap_or(defaults.shuffle),
    }
}

fn merge_validation(
    file: FileValidationConfig,
    defaults: &DefaultsConfig,
) -> core_config::ValidationConfig {
    core_config::ValidationConfig {
        min_split: file.min_split.unwrap_or(defaults.min_split),
        max_split: file.max_split,
        seed: file.seed.unwrap_or(defaults.seed),
    }
}

fn merge_builder(file: FileBuilderConfig) -> core_config::BuilderConfig {
    let defaults = core_config::BuilderConfig::default();
    core_config::BuilderConfig {
        store: file.store,
        screening_method: file.screening_method.unwrap_or(defaults.screening_method),
        screening_correlation: file
            .screening_correlation
            .unwrap_or(defaults.screening_correlation),
        initial_prediction: file.initial_prediction.unwrap_or(defaults.initial_prediction),
        clean_features: file.clean_features.unwrap_or(defaults.clean_features),
        expand: file.expand.unwrap_or(defaults.expand),
        exponents: file
            .exponents
            .map(|[a, b]| (a, b))
            .unwrap_or(defaults.exponents),
        optimize: file.optimize.unwrap_or(defaults.optimize),
        size: file.size,
        width: file.width.unwrap_or(defaults.width),
        regularization: file.regularization.unwrap_or(defaults.regularization),
        lasso_alpha: file.lasso_alpha.unwrap_or(defaults.lasso_alpha),
        lasso_steps: file.lasso_steps.unwrap_or(defaults.lasso_steps),
    }
}

fn merge_neb(
    args: &NebArgs,
    file: FileNebConfig,
    defaults: &DefaultsConfig,
) -> Result<core_config::NebConfig> {
    let climbing_image = args.climb || file.climbing_image.unwrap_or(defaults.climbing_image);
    core_config::NebConfigBuilder::new()
        .images(args.images.or(file.images).unwrap_or(defaults.neb_images))
        .spring_constant(file.spring_constant.unwrap_or(defaults.spring_constant))
        .climbing_image(climbing_image)
        .fmax(file.fmax.unwrap_or(defaults.fmax))
        .max_steps(file.max_steps.unwrap_or(defaults.max_steps))
        .max_step_length(file.max_step_length.unwrap_or(defaults.max_step_length))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        match key {
            "data.target" => {
                config.data.get_or_insert_with(Default::default).target =
                    Some(value.trim().to_string());
            }
            "features.kinds" => {
                config.features.get_or_insert_with(Default::default).kinds = Some(
                    value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                );
            }
            "features.bond-buffer" => {
                config.features.get_or_insert_with(Default::default).bond_buffer =
                    Some(parse_value(key, value, "float")?);
            }
            "features.clean-zero" => {
                config.features.get_or_insert_with(Default::default).clean_zero =
                    Some(parse_value(key, value, "boolean")?);
            }
            "features.standardize" => {
                config.features.get_or_insert_with(Default::default).standardize =
                    Some(parse_value(key, value, "boolean")?);
            }
            "model.type" => {
                let model_type = match value.trim() {
                    "ridge" => FileModelType::Ridge,
                    "gp" | "gaussian-process" => FileModelType::GaussianProcess,
                    other => {
                        return Err(CliError::Config(format!("Unknown model type: '{}'", other)));
                    }
                };
                config.model.get_or_insert_with(Default::default).model_type = Some(model_type);
            }
            "model.regularization" => {
                config.model.get_or_insert_with(Default::default).regularization =
                    Some(parse_value(key, value, "float")?);
            }
            "model.optimize-hyperparameters" => {
                config
                    .model
                    .get_or_insert_with(Default::default)
                    .optimize_hyperparameters = Some(parse_value(key, value, "boolean")?);
            }
            "model.max-iterations" => {
                config.model.get_or_insert_with(Default::default).max_iterations =
                    Some(parse_value(key, value, "integer")?);
            }
            "model.uncertainty" => {
                config.model.get_or_insert_with(Default::default).uncertainty =
                    Some(parse_value(key, value, "boolean")?);
            }
            "split.test-fraction" => {
                config.split.get_or_insert_with(Default::default).test_fraction =
                    Some(parse_value(key, value, "float")?);
            }
            "split.seed" => {
                config.split.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value, "integer")?);
            }
            "split.shuffle" => {
                config.split.get_or_insert_with(Default::default).shuffle =
                    Some(parse_value(key, value, "boolean")?);
            }
            "validation.min-split" => {
                config.validation.get_or_insert_with(Default::default).min_split =
                    Some(parse_value(key, value, "integer")?);
            }
            "validation.max-split" => {
                config.validation.get_or_insert_with(Default::default).max_split =
                    Some(parse_value(key, value, "integer")?);
            }
            "validation.seed" => {
                config.validation.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value, "integer")?);
            }
            "builder.size" => {
                config.builder.get_or_insert_with(Default::default).size =
                    Some(parse_value(key, value, "integer")?);
            }
            "builder.width" => {
                config.builder.get_or_insert_with(Default::default).width =
                    Some(parse_value(key, value, "float")?);
            }
            "builder.regularization" => {
                config.builder.get_or_insert_with(Default::default).regularization =
                    Some(parse_value(key, value, "float")?);
            }
            "builder.expand" => {
                config.builder.get_or_insert_with(Default::default).expand =
                    Some(parse_value(key, value, "boolean")?);
            }
            "builder.optimize" => {
                config.builder.get_or_insert_with(Default::default).optimize =
                    Some(parse_value(key, value, "boolean")?);
            }
            "builder.screening-method" => {
                config.builder.get_or_insert_with(Default::default).screening_method =
                    Some(value.parse().map_err(|e| CliError::Config(format!("{}", e)))?);
            }
            "builder.screening-correlation" => {
                config
                    .builder
                    .get_or_insert_with(Default::default)
                    .screening_correlation =
                    Some(value.parse().map_err(|e| CliError::Config(format!("{}", e)))?);
            }
            "builder.lasso-alpha" => {
                config.builder.get_or_insert_with(Default::default).lasso_alpha =
                    Some(parse_value(key, value, "float")?);
            }
            "builder.lasso-steps" => {
                config.builder.get_or_insert_with(Default::default).lasso_steps =
                    Some(parse_value(key, value, "integer")?);
            }
            "neb.images" => {
                config.neb.get_or_insert_with(Default::default).images =
                    Some(parse_value(key, value, "integer")?);
            }
            "neb.spring-constant" => {
                config.neb.get_or_insert_with(Default::default).spring_constant =
                    Some(parse_value(key, value, "float")?);
            }
            "neb.climbing-image" => {
                config.neb.get_or_insert_with(Default::default).climbing_image =
                    Some(parse_value(key, value, "boolean")?);
            }
            "neb.fmax" => {
                config.neb.get_or_insert_with(Default::default).fmax =
                    Some(parse_value(key, value, "float")?);
            }
            "neb.max-steps" => {
                config.neb.get_or_insert_with(Default::default).max_steps =
                    Some(parse_value(key, value, "integer")?);
            }
            "neb.max-step-length" => {
                config.neb.get_or_insert_with(Default::default).max_step_length =
                    Some(parse_value(key, value, "float")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn data_args(config: Option<PathBuf>, set_values: &[&str]) -> DataArgs {
        DataArgs {
            input: PathBuf::from("data.xyz"),
            config,
            target: None,
            set_values: set_values.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn predict_args(data: DataArgs) -> PredictArgs {
        PredictArgs {
            data,
            model: None,
            test_fraction: None,
            seed: None,
            output: None,
        }
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults_fill_everything_without_a_file() {
        let settings = build_predict_config(&predict_args(data_args(None, &[]))).unwrap();
        let defaults = DefaultsConfig::default();
        let cfg = settings.core_config;

        assert_eq!(settings.data.target, "energy");
        assert_eq!(cfg.features.kinds, vec![FeatureKind::EigenSpectrum]);
        assert_eq!(cfg.model.name(), "gaussian-process");
        assert_eq!(cfg.split.test_fraction, defaults.test_fraction);
        assert_eq!(cfg.split.seed, defaults.seed);
        assert!(cfg.uncertainty);
    }

    #[test]
    fn file_values_are_merged() {
        let (_dir, path) = write_config(
            r#"
            [data]
            target = "gap"

            [features]
            kinds = ["composition", "graph"]
            graph-properties = ["electronegativity"]
            bond-buffer = 0.4

            [model]
            type = "ridge"
            grid-points = 50

            [split]
            test-fraction = 0.5
            shuffle = false
            "#,
        );
        let settings = build_predict_config(&predict_args(data_args(Some(path), &[]))).unwrap();
        let cfg = settings.core_config;

        assert_eq!(settings.data.target, "gap");
        assert_eq!(
            cfg.features.kinds[1],
            FeatureKind::Graph {
                properties: vec![AtomicProperty::Electronegativity],
                bond_buffer: 0.4,
            }
        );
        assert!(matches!(
            cfg.model,
            core_config::ModelConfig::Ridge { grid_points: 50, .. }
        ));
        assert_eq!(cfg.split.test_fraction, 0.5);
        assert!(!cfg.split.shuffle);
    }

    #[test]
    fn cli_overrides_file_and_set_overrides_file() {
        let (_dir, path) = write_config(
            r#"
            [model]
            type = "ridge"

            [split]
            test-fraction = 0.5
            seed = 1
            "#,
        );
        let mut args = predict_args(data_args(
            Some(path),
            &["split.seed=9", "model.regularization=0.05", "data.target=homo"],
        ));
        args.model = Some(ModelKind::Gp);
        args.test_fraction = Some(0.25);

        let settings = build_predict_config(&args).unwrap();
        let cfg = settings.core_config;
        assert_eq!(settings.data.target, "homo");
        assert_eq!(cfg.split.test_fraction, 0.25);
        assert_eq!(cfg.split.seed, 9);
        assert!(matches!(
            cfg.model,
            core_config::ModelConfig::GaussianProcess { regularization, .. } if regularization == 0.05
        ));
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        for bad in ["split.seed", "split.seed=abc", "unknown.key=1", "model.type=svm"] {
            let args = predict_args(data_args(None, &[bad]));
            assert!(
                matches!(build_predict_config(&args), Err(CliError::Config(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn out_of_range_values_surface_as_config_errors() {
        let args = predict_args(data_args(None, &["split.test-fraction=1.5"]));
        assert!(matches!(
            build_predict_config(&args),
            Err(CliError::Config(msg)) if msg.contains("test-fraction")
        ));
    }

    #[test]
    fn unknown_feature_kind_is_rejected() {
        let args = predict_args(data_args(None, &["features.kinds=eigenspectrum,bogus"]));
        assert!(matches!(
            build_predict_config(&args),
            Err(CliError::Config(msg)) if msg.contains("'bogus'")
        ));
    }

    #[test]
    fn learning_curve_flags_override_validation() {
        let args = LearningCurveArgs {
            data: data_args(None, &["validation.seed=3"]),
            model: Some(ModelKind::Ridge),
            min_split: Some(10),
            max_split: Some(40),
            output: None,
        };
        let cfg = build_learning_curve_config(&args).unwrap().core_config;
        assert_eq!(cfg.validation.min_split, 10);
        assert_eq!(cfg.validation.max_split, Some(40));
        assert_eq!(cfg.validation.seed, 3);
        assert_eq!(cfg.model.name(), "ridge");
    }

    #[test]
    fn build_flags_override_builder_section() {
        let (_dir, path) = write_config(
            r#"
            [builder]
            expand = true
            size = 8
            screening-method = "sis"
            exponents = [1, 3]
            "#,
        );
        let args = BuildArgs {
            data: data_args(Some(path), &["builder.lasso-steps=5"]),
            store: Some(PathBuf::from("tables")),
            size: Some(4),
            no_expand: true,
            no_optimize: false,
        };
        let cfg = build_build_config(&args).unwrap().core_config;
        assert!(!cfg.builder.expand);
        assert_eq!(cfg.builder.size, Some(4));
        assert_eq!(cfg.builder.store, Some(PathBuf::from("tables")));
        assert_eq!(cfg.builder.exponents, (1, 3));
        assert_eq!(cfg.builder.lasso_steps, 5);
        assert_eq!(
            cfg.builder.screening_method,
            atoml::core::selection::screening::ScreeningMethod::Sis
        );
    }

    #[test]
    fn neb_merges_flags_file_and_defaults() {
        let (_dir, path) = write_config("[neb]\nimages = 9\nfmax = 0.01\n");
        let args = NebArgs {
            initial: PathBuf::from("a.xyz"),
            final_state: PathBuf::from("b.xyz"),
            potential: PathBuf::from("lj.toml"),
            config: Some(path),
            images: None,
            climb: true,
            output: None,
            set_values: vec!["neb.max-steps=50".to_string()],
        };
        let settings = build_neb_config(&args).unwrap();
        let cfg = settings.core_config;
        assert_eq!(cfg.images, 9);
        assert_eq!(cfg.fmax, 0.01);
        assert_eq!(cfg.max_steps, 50);
        assert!(cfg.climbing_image);
        assert_eq!(settings.output, PathBuf::from("neb-path.xyz"));
    }
}

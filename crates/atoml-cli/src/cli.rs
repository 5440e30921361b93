use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "ATOML Developers",
    version,
    about = "ATOML CLI - Fingerprints, regression models, learning curves and nudged elastic band path search for atomistic structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit a model on a train/test split and predict every record.
    Predict(PredictArgs),
    /// Estimate the learning curve by hierarchical cross-validation.
    LearningCurve(LearningCurveArgs),
    /// Expand, screen and reduce the feature space for a Gaussian process.
    Build(BuildArgs),
    /// Write the feature table of a dataset.
    Features(FeaturesArgs),
    /// Find a minimum-energy path between two structures.
    Neb(NebArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Ridge,
    #[value(alias = "gaussian-process")]
    Gp,
}

/// Options shared by every command that reads a dataset.
#[derive(Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// Path to the extended XYZ file holding the structures and their targets.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Key of the target property in each structure's comment line.
    #[arg(long, value_name = "KEY")]
    pub target: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S model.regularization=0.01
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `predict` subcommand.
#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Override the regression model from the config file.
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,

    /// Override the fraction of records held out for testing.
    #[arg(long, value_name = "FLOAT")]
    pub test_fraction: Option<f64>,

    /// Override the seed of the train/test shuffle.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Write per-record predictions to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `learning-curve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct LearningCurveArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Override the regression model from the config file.
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,

    /// Override the smallest subset size that may still be halved into.
    #[arg(long, value_name = "INT")]
    pub min_split: Option<usize>,

    /// Override the largest subset size that is evaluated.
    #[arg(long, value_name = "INT")]
    pub max_split: Option<usize>,

    /// Write the aggregated learning curve to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Directory receiving the original, expanded and selected feature tables.
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Number of features to keep. Must be below the cleaned feature count.
    #[arg(long, value_name = "INT")]
    pub size: Option<usize>,

    /// Skip the pairwise feature expansion.
    #[arg(long)]
    pub no_expand: bool,

    /// Keep the requested size instead of searching for the best one.
    #[arg(long)]
    pub no_optimize: bool,
}

/// Arguments for the `features` subcommand.
#[derive(Args, Debug, Clone)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Path of the CSV feature table to write.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}

/// Arguments for the `neb` subcommand.
#[derive(Args, Debug, Clone)]
pub struct NebArgs {
    /// Extended XYZ file whose first structure is the initial state.
    #[arg(long, required = true, value_name = "PATH")]
    pub initial: PathBuf,

    /// Extended XYZ file whose first structure is the final state.
    #[arg(long = "final", required = true, value_name = "PATH")]
    pub final_state: PathBuf,

    /// TOML file selecting the potential and its parameters.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub potential: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the number of movable images.
    #[arg(long, value_name = "INT")]
    pub images: Option<usize>,

    /// Enable the climbing image, overriding the config file.
    #[arg(long)]
    pub climb: bool,

    /// Path of the extended XYZ file receiving the relaxed band.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S neb.fmax=0.01
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_parses_with_overrides() {
        let cli = Cli::try_parse_from([
            "atoml", "-vv", "predict", "-i", "data.xyz", "--model", "gp", "--test-fraction",
            "0.3", "-S", "model.regularization=0.1", "-o", "out.csv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.data.input, PathBuf::from("data.xyz"));
        assert_eq!(args.model, Some(ModelKind::Gp));
        assert_eq!(args.test_fraction, Some(0.3));
        assert_eq!(args.data.set_values, vec!["model.regularization=0.1"]);
    }

    #[test]
    fn neb_requires_end_points_and_potential() {
        assert!(Cli::try_parse_from(["atoml", "neb", "--initial", "a.xyz"]).is_err());
        let cli = Cli::try_parse_from([
            "atoml", "neb", "--initial", "a.xyz", "--final", "b.xyz", "-p", "lj.toml", "--climb",
        ])
        .unwrap();
        let Commands::Neb(args) = cli.command else {
            panic!("expected neb");
        };
        assert!(args.climb);
        assert_eq!(args.final_state, PathBuf::from("b.xyz"));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["atoml", "-q", "-v", "features", "-i", "a", "-o", "b"]).is_err());
    }
}

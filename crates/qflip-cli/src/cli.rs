use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "qflip - Optimal sign flipping of diffusion MRI q-space sampling schemes.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO and solver progress, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to build the model.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flip the signs of scheme directions to optimize their spread on the sphere.
    Flip(FlipArgs),
    /// Print the spread metrics of one or more schemes without modifying them.
    Evaluate(EvaluateArgs),
}

/// Arguments for the `flip` subcommand.
#[derive(Args, Debug)]
pub struct FlipArgs {
    /// Input bvec file(s). Several files (repeated or comma-separated) are flipped
    /// jointly as concentric shells, in the given order.
    #[arg(short, long, required = true, value_name = "PATH", value_delimiter = ',')]
    pub input: Vec<PathBuf>,

    /// Output bvec file. With several shells, `_shell{i}` is inserted before the extension.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Optimization Overrides ---
    /// Optimization criterion: DISTANCE or ELECTROSTATIC.
    #[arg(short, long, value_name = "CRITERIA")]
    pub criteria: Option<String>,

    /// Solver time limit in seconds.
    #[arg(short, long, value_name = "SECONDS")]
    pub time_limit: Option<f64>,

    /// Weight of the per-shell terms against the pooled term (required with several shells).
    #[arg(short, long, value_name = "FLOAT")]
    pub weight: Option<f64>,

    /// Exponent of the electrostatic repulsion term.
    #[arg(long, value_name = "INT")]
    pub order: Option<i32>,

    // --- I/O ---
    /// Read and write the FSL layout (three rows of x, y and z coordinates).
    /// Without it, output has one direction per line; three-row inputs with other
    /// than three columns are still read column by column.
    #[arg(long)]
    pub fslgrad: bool,

    /// Also write the MILP formulation of the problem in LP format.
    #[arg(long, value_name = "PATH")]
    pub export_lp: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S flip.time-limit=30
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Input bvec file(s), one per shell.
    #[arg(short, long, required = true, value_name = "PATH", value_delimiter = ',')]
    pub input: Vec<PathBuf>,

    /// Read the FSL layout (three rows of x, y and z coordinates). Needed only for
    /// three-direction files; other three-row tables are detected.
    #[arg(long)]
    pub fslgrad: bool,

    /// Weight used to report the combined multi-shell costs.
    #[arg(short, long, value_name = "FLOAT")]
    pub weight: Option<f64>,

    /// Exponent of the electrostatic repulsion term.
    #[arg(long, value_name = "INT", default_value_t = 2)]
    pub order: i32,
}

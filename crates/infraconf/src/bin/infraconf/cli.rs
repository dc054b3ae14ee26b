//! infraconf cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; infraconf ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a config and print it
    Resolve(ResolveCommand),

    /// Resolve and validate a config
    ///
    /// Exits with a non-zero status when any error-severity issue is found
    Validate(ValidateCommand),

    /// Print a single resolved value
    Get(GetCommand),

    /// Expand `${...}` templates in a text against a resolved config
    #[command(alias = "eval")]
    Evaluate(EvaluateCommand),
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Also validate the resolved config before printing it
    #[clap(long)]
    pub validate: bool,
}

#[derive(Parser, Debug)]
pub struct ValidateCommand {
    #[clap(flatten)]
    pub input: InputArgs,
}

#[derive(Parser, Debug)]
pub struct GetCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Dotted key, e.g. `project` or `variables.machine_type`
    pub key: String,
}

#[derive(Parser, Debug)]
pub struct EvaluateCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Text to expand, e.g. "${project}-state"
    pub text: String,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Config document to load
    ///
    /// The extension selects the format (json, yaml, yml, hcl, tf, tfvars). A path without a
    /// known extension (e.g. `env`) reads the config from TERRAGRUNT_* environment variables.
    pub file: PathBuf,

    /// Secrets available to `secret:` references and the secret functions
    ///
    /// A JSON or YAML object of key to secret value.
    #[clap(short = 's', long = "secrets-file")]
    pub secrets: Option<PathBuf>,

    /// Abort resolution after this many seconds
    #[clap(long = "timeout")]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

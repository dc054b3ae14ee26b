mod cli;

use anyhow::Context as _;
use indexmap::IndexMap;
use infraconf::{Context, EnvResolver, Loader, MemorySecrets, Validator};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("INFRACONF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli),
        cli::Command::Validate(validate_cli) => validate(validate_cli),
        cli::Command::Get(get_cli) => get(get_cli),
        cli::Command::Evaluate(evaluate_cli) => evaluate(evaluate_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn resolve(cli: cli::ResolveCommand) -> anyhow::Result<()> {
    let resolver = load(&cli.input)?;
    let config = resolver.config().snapshot();

    if cli.validate {
        config.validate()?;
    }

    output(&cli.output, &config)
}

pub fn validate(cli: cli::ValidateCommand) -> anyhow::Result<()> {
    let resolver = load(&cli.input)?;

    let mut validator = Validator::new();
    let result = validator.validate(&resolver.config().read());

    if validator.has_warnings() && !validator.has_errors() {
        eprintln!("{}", validator.report());
    }
    result?;

    println!("config is valid");
    Ok(())
}

pub fn get(cli: cli::GetCommand) -> anyhow::Result<()> {
    let resolver = load(&cli.input)?;
    let value = resolver.get_resolved_value(&cli.key)?;

    output(&cli.output, &value)
}

pub fn evaluate(cli: cli::EvaluateCommand) -> anyhow::Result<()> {
    let resolver = load(&cli.input)?;
    println!("{}", resolver.expand_variables(&cli.text)?);
    Ok(())
}

/// Loads and resolves the config the input arguments point at
fn load(input: &cli::InputArgs) -> anyhow::Result<EnvResolver> {
    let config = Loader::default().load_config(&input.file)?;

    let mut builder = EnvResolver::builder(config);
    if let Some(secrets) = &input.secrets {
        builder = builder.secrets(Arc::new(load_secrets(secrets)?));
    }
    let resolver = builder.build();

    let mut cx = Context::background();
    if let Some(timeout) = input.timeout {
        cx = cx.with_timeout(Duration::from_secs(timeout));
    }
    resolver.resolve(&cx)?;

    Ok(resolver)
}

fn load_secrets(path: &Path) -> anyhow::Result<MemorySecrets> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read secrets file {}", path.display()))?;
    let secrets: IndexMap<String, String> = serde_yaml::from_str(&source)
        .with_context(|| format!("unable to parse secrets file {}", path.display()))?;

    Ok(secrets.into_iter().collect())
}

fn output(output: &cli::OutputArgs, value: &impl Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildOptions, cmd_build, cmd_info, cmd_locate};
use output::OutputFormat;

/// carbox - package distribution units into a container image
#[derive(Parser)]
#[command(name = "carbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Export the requested units and build the image
  Build(BuildArgs),

  /// List the distribution units in a workspace
  Locate {
    /// Workspace root
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Only show these units
    #[arg(short, long = "unit", value_name = "NAME")]
    units: Vec<String>,

    /// Config file (default: resolved from the environment)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show host and daemon information
  Info {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

#[derive(Args)]
struct BuildArgs {
  /// Request file (TOML); flags override its values
  #[arg(short, long)]
  request: Option<PathBuf>,

  /// Unit to include in the image (repeatable)
  #[arg(short, long = "unit", value_name = "NAME")]
  units: Vec<String>,

  /// Directory the archives are staged into
  #[arg(long)]
  staging: Option<PathBuf>,

  /// Build context handed to the daemon
  #[arg(long)]
  context: Option<PathBuf>,

  /// Image repository
  #[arg(long)]
  repository: Option<String>,

  /// Image tag
  #[arg(long)]
  tag: Option<String>,

  /// Abort on the first export failure
  #[arg(long)]
  strict_exports: bool,

  /// Abort when the daemon health check fails
  #[arg(long)]
  strict_health_check: bool,

  /// Cancel the run after this long, e.g. "10m"
  #[arg(long, value_parser = humantime::parse_duration)]
  timeout: Option<Duration>,

  /// Workspace root
  #[arg(short, long, default_value = ".")]
  workspace: PathBuf,

  /// Config file (default: resolved from the environment)
  #[arg(long)]
  config: Option<PathBuf>,

  #[arg(short, long, value_enum, default_value_t)]
  output: OutputFormat,
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build(args) => {
      let options = BuildOptions {
        request: args.request,
        units: args.units,
        staging: args.staging,
        context: args.context,
        repository: args.repository,
        tag: args.tag,
        strict_exports: args.strict_exports,
        strict_health_check: args.strict_health_check,
        timeout: args.timeout,
        workspace: args.workspace,
        config: args.config,
        verbose: cli.verbose,
      };
      cmd_build(options, args.output)
    }
    Commands::Locate {
      workspace,
      units,
      config,
      output,
    } => {
      cmd_locate(&workspace, &units, config.as_deref(), output)?;
      Ok(ExitCode::SUCCESS)
    }
    Commands::Info { output } => {
      cmd_info(output)?;
      Ok(ExitCode::SUCCESS)
    }
  }
}

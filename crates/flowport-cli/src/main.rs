mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use flowport_core::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flowport",
    about = "Convert Nintex workflow exports into Power Automate actions with a local model",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file
    #[arg(long, global = true, env = "FLOWPORT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate every action in a workflow and write the result
    Convert {
        /// Workflow XML (default: `input` from the config)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
        /// Result JSON (default: `output` from the config)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Use a canned completion instead of the configured backend
        #[arg(long)]
        dry_run: bool,
    },

    /// List the actions of a workflow with their parents, without translating
    Inspect {
        /// Workflow XML
        input: PathBuf,
    },

    /// Create, check, or print the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Convert { .. } | Commands::Inspect { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            dry_run,
        } => cmd::convert::run(
            &cli.config,
            cmd::convert::ConvertArgs {
                input,
                output,
                dry_run,
            },
            cli.json,
        ),
        Commands::Inspect { input } => cmd::inspect::run(&cli.config, &input, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

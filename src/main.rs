mod categorizer;
mod cli;
mod db;
mod derivation;
mod detector;
mod error;
mod fmt;
mod freeform;
mod importer;
mod models;
mod reviewer;
mod settings;
mod validator;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{AssetsCommands, Cli, Commands, SalesCommands};

/// Log filter, e.g. `ESTATE_LOG=estate=debug`.
const LOG_ENV: &str = "ESTATE_LOG";

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { file, kind, yes } => cli::import::run(&file, &kind, yes),
        Commands::Check { file, kind, json } => cli::check::run(&file, &kind, json),
        Commands::Template { kind, output } => cli::template::run(&kind, output.as_deref()),
        Commands::Sales { command } => match command {
            SalesCommands::List { limit } => cli::sales::list(limit),
        },
        Commands::Assets { command } => match command {
            AssetsCommands::List => cli::assets::list(),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

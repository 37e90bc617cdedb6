pub mod assets;
pub mod check;
pub mod import;
pub mod init;
pub mod preview;
pub mod sales;
pub mod status;
pub mod template;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::db_path;

/// Open the database, creating the data directory and schema on first use.
pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = get_connection(&path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Read an input file, `-` meaning stdin.
pub(crate) fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut text = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(file)?)
    }
}

#[derive(Parser)]
#[command(
    name = "estate",
    version,
    about = "Bulk data entry for estate sales and asset records."
)]
pub struct Cli {
    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for estate data (default: ~/Documents/estate)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Parse, review and import a CSV file or pasted daily log.
    Import {
        /// Input file, or `-` to read stdin
        file: String,
        /// What the rows describe: sales or assets
        #[arg(long, default_value = "sales")]
        kind: String,
        /// Import without the review prompts when there are no errors
        #[arg(short, long)]
        yes: bool,
    },
    /// Parse and validate without importing.
    Check {
        /// Input file, or `-` to read stdin
        file: String,
        #[arg(long, default_value = "sales")]
        kind: String,
        /// Print the parsed batch as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a CSV template with the expected columns.
    Template {
        #[arg(long, default_value = "sales")]
        kind: String,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
    /// Stored sales.
    Sales {
        #[command(subcommand)]
        command: SalesCommands,
    },
    /// Stored assets.
    Assets {
        #[command(subcommand)]
        command: AssetsCommands,
    },
    /// Show the current database and record counts.
    Status,
}

#[derive(Subcommand)]
pub enum SalesCommands {
    /// List recent sales.
    List {
        /// Maximum rows to show
        #[arg(long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum AssetsCommands {
    /// List all assets.
    List,
}

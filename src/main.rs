use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shelfdb::session::Session;
use shelfdb::repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "shelfdb",
    version = VERSION,
    about = "Single-table embedded relational database with a line-oriented SQL shell."
)]
struct Cli {
    /// Path to the database file. Created if it doesn't exist.
    db_file_path: PathBuf,

    /// Append-mode log file (defaults to shelfdb.log next to the database).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("shelfdb.log"));

    let log_file = match OpenOptions::new().append(true).create(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("failed to open log file {}: {}", log_path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let mut session = match Session::open(&cli.db_file_path) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}.", e.class());
            tracing::error!("failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match repl::run(&mut session) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}.", e.class());
            tracing::error!("session terminated: {}", e);
            ExitCode::FAILURE
        }
    }
}

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stillpoint-cli", version, about = "Stillpoint meditation timer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a meditation session
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Check values against the duration policy
    Check {
        #[command(subcommand)]
        action: commands::check::CheckAction,
    },
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Check { action } => commands::check::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("STILLPOINT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

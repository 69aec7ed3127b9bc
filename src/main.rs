use clap::Parser;
use cubesweep::config::Config;
use cubesweep::sweep::SweepSummary;
use tracing::{debug, error};

/// Detect modified cubes in a knowledge graph and purge stale cache entries
#[derive(Parser)]
#[command(name = "cubesweep")]
#[command(about = "Purge cached responses for datasets modified since the last run", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("Cubesweep started with verbosity level: {}", cli.verbose);

    match run_sweep().await {
        Ok(summary) if summary.all_succeeded() => {
            debug!(
                "Sweep complete: {} purge requests, all succeeded",
                summary.purges_attempted
            );
        }
        Ok(summary) => {
            eprintln!("Failed to clear {} cache entries", summary.purges_failed);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_sweep() -> anyhow::Result<SweepSummary> {
    let config = Config::from_env()?;
    Ok(cubesweep::sweep::run(&config).await?)
}

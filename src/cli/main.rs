//! Command-line front end for a configured provider chain.
//!
//! Prints the resulting address collection as JSON on stdout; logs and
//! per-provider diagnostics go to stderr.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geochain::Config;

#[derive(Parser, Debug)]
#[command(name = "geochain")]
#[command(about = "Geocode through an ordered chain of providers")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Print every provider attempt to stderr
    #[arg(long)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a street address or an IP address
    Geocode {
        query: String,
    },
    /// Look up the addresses at a coordinate
    Reverse {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = Config::load_from_file(&args.config)?;
    let chain = config.build_chain(config.http_adapter()?)?;
    info!(
        "Loaded {} providers: {}",
        chain.len(),
        chain.provider_names().join(", ")
    );

    let outcome = match args.command {
        Command::Geocode { query } => chain.geocode_traced(&query).await,
        Command::Reverse {
            latitude,
            longitude,
        } => chain.reverse_traced(latitude, longitude).await,
    };

    if args.trace {
        for attempt in outcome.attempts() {
            eprintln!("  {}", attempt);
        }
    }
    if let Some(winner) = &outcome.winner {
        info!("Answered by {}", winner);
    }

    let collection = outcome.into_result()?;
    println!("{}", serde_json::to_string_pretty(&collection)?);

    Ok(())
}

//! Command-line front end for the provider cascade.
//!
//! Reads the completion API key from the environment variable named in the
//! config (`OPENROUTER_KEY` by default). Without a key the completion
//! provider still runs but fails with `NotConfigured`, and the cascade
//! moves on to the next provider.
//!
//! # Examples
//!
//! ```sh
//! cascade --query "live music in Austin tonight"
//!
//! # Providers from a config file, JSON output
//! cascade --config cascade.json --json --query "museums near Seattle"
//!
//! # Local corpus only
//! echo "tacos in Austin" | cascade --stdin --offline --config cascade.json
//! ```

use std::io::Read;
use std::path::PathBuf;

use cascade_rs::prelude::*;
use clap::Parser;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Answer a question through an ordered cascade of information providers.
#[derive(Parser)]
#[command(name = "cascade")]
struct Cli {
    /// The question to answer.
    #[arg(long, conflicts_with = "stdin")]
    query: Option<String>,

    /// Read the question from standard input.
    #[arg(long)]
    stdin: bool,

    /// JSON config file. Built-in providers are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum answer length accepted by the quality gate.
    #[arg(long)]
    threshold: Option<usize>,

    /// Skip every network-backed provider.
    #[arg(long)]
    offline: bool,

    /// Print the full cascade result as JSON.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(level);
    tracing_subscriber::registry().with(layer).init();
}

fn read_query(cli: &Cli) -> Result<String, String> {
    let raw = match (&cli.query, cli.stdin) {
        (Some(q), _) => q.clone(),
        (None, true) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            buf
        }
        (None, false) => return Err("either --query or --stdin is required".into()),
    };
    Ok(raw.trim().to_string())
}

fn load_config(cli: &Cli) -> Result<CascadeConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => CascadeConfig::load(path)?,
        None => CascadeConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config = config.with_threshold(threshold);
    }
    if cli.offline {
        config = config.offline();
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let query = match read_query(&cli) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let orchestrator = match load_config(&cli).and_then(|config| {
        config
            .orchestrator_builder(|name| std::env::var(name).ok())
            .map(|builder| builder.with_observer(LoggingObserver).build())
    }) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = orchestrator.resolve(&query).await;

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: failed to serialize result: {e}");
                std::process::exit(1);
            }
        }
    } else {
        println!("{}", result.text);
    }
}

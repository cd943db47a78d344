use clap::Parser;
use tracing_subscriber::EnvFilter;

use diffbot_runtime::config::{Cli, RuntimeConfig};

#[tokio::main]
async fn main() {
    let config = RuntimeConfig::from(Cli::parse());

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = diffbot_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

use std::path::PathBuf;

use clap::Parser;

use aodv_node::{Node, NodeConfig};

#[derive(Parser)]
#[command(name = "aodv-node", about = "Reactive multi-hop routing daemon")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/aodv/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        aodv_node::logging::init_json(&config.logging.level);
    } else {
        aodv_node::logging::init(&config.logging.level);
    }

    let mut node = match Node::new(config) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    let handle = node.shutdown_handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    if let Err(e) = node.start().await {
        tracing::error!("failed to start node: {e}");
        std::process::exit(1);
    }

    node.run().await;
    node.shutdown().await;
}

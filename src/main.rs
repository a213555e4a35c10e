//! CLI for subcast
//!
//! Subcommands:
//! - `server`: run the TCP broker
//! - `client`: run the interactive console client

use clap::Parser;
use std::sync::Arc;
use subcast::broker::Broker;
use subcast::client::console;
use subcast::config::load_config;
use subcast::protocol::Topic;
use subcast::transport::start_tcp_server;
use subcast::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "subcast")]
enum Command {
    /// Start the TCP broker
    Server,
    /// Subscribe to a topic and publish stdin lines to it
    Client {
        /// Broker address to connect to
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
        #[arg(long, default_value_t = 1)]
        topic: Topic,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Client { addr, topic } => {
            logging::init("warn");
            if let Err(e) = console::run(&addr, topic).await {
                error!("Client failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run_server() -> subcast::utils::error::Result<()> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&config.logging.level);

    let broker = Arc::new(Broker::start(&config.broker)?);

    let result = tokio::select! {
        result = start_tcp_server(config.clone(), Arc::clone(&broker)) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            Ok(())
        }
    };

    broker.shutdown().await;
    result
}

use clap::Parser;
use leurre::configuration::config::Config;
use leurre::services;
use leurre::sink::AttackEventSink;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "leurre")]
#[command(version = "0.1.0")]
#[command(about = "A decoy SSH/FTP/HTTP endpoint set that captures intrusion attempts")]
struct Args {
    /// Path to the TOML configuration file; defaults apply when it is absent
    #[arg(default_value = "leurre.toml")]
    config_file: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
██╗     ███████╗██╗   ██╗██████╗ ██████╗ ███████╗
██║     ██╔════╝██║   ██║██╔══██╗██╔══██╗██╔════╝
██║     █████╗  ██║   ██║██████╔╝██████╔╝█████╗
██║     ██╔══╝  ██║   ██║██╔══██╗██╔══██╗██╔══╝
███████╗███████╗╚██████╔╝██║  ██║██║  ██║███████╗
╚══════╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝
==================================================
    A decoy network endpoint set v0.1.0
==================================================
"
    );

    info!("Importing configuration");

    let args = Args::parse();

    let config = match Config::from_file(&args.config_file) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Unable to import configuration from file: {:?}", e);
            std::process::exit(1);
        }
    };

    let sink = match AttackEventSink::new(&config.general.log_dir) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            error!("Unable to initialize the attack event sink: {:?}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = services::spawn_enabled(config.clone(), sink, shutdown_rx);
    if running.is_empty() {
        error!("No services enabled, exiting...");
        std::process::exit(1);
    }

    let names: Vec<&str> = running.iter().map(|(name, _)| *name).collect();
    info!("All services started: {}", names.join(", "));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down honeypot"),
        Err(e) => error!("Unable to listen for the shutdown signal: {}", e),
    }
    let _ = shutdown_tx.send(true);

    // the acceptors stop; in-flight sessions are abandoned to process exit
    for (name, handle) in running {
        if let Err(e) = handle.await {
            error!("Error joining the {} service: {}", name, e);
        }
    }
}

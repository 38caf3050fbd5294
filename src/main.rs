#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use cluster_bridge::config::{self, Config};
use cluster_bridge::control::{ControlError, ServerHost};
use cluster_bridge::coordination::host_context;
use cluster_bridge::logging;
use cluster_bridge::CoordinationNode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Interval at which the standalone binary drains the host context.
const HOST_TICK: Duration = Duration::from_millis(50);

/// Cluster Bridge -- cross-process coordination node for a game server cluster
#[derive(Parser, Debug)]
#[command(name = "cluster-bridge")]
#[command(about = "Cross-process coordination node for a proxy/backend game server cluster")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without connecting to the broker.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,

    /// Override `server_name` from the loaded configuration.
    #[arg(long, env = "CLUSTER_BRIDGE_SERVER_NAME")]
    server_name: Option<String>,
}

/// Stand-in for an embedding game server: logs what players would see and
/// exits the process on shutdown.
struct ConsoleHost {
    shutdown: Arc<Notify>,
}

impl ServerHost for ConsoleHost {
    fn broadcast(&self, message: &str) {
        tracing::info!(target: "cluster_bridge::console", "{message}");
    }

    fn disconnect_all(&self, message: &str) {
        tracing::info!(target: "cluster_bridge::console", reason = message, "Disconnecting all players");
    }

    fn restart(&self) -> Result<(), ControlError> {
        Err(ControlError::RestartUnavailable)
    }

    fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

fn apply_cli(mut cfg: Config, cli: &Cli) -> Config {
    if let Some(name) = &cli.server_name {
        cfg.server_name.clone_from(name);
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = apply_cli(config::load(), &cli);

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Server name: {}", cfg.server_name);
                println!("  Broker backend: {:?}", cfg.broker.backend);
                println!("  Publish pool max: {}", cfg.broker.publish_pool.max_size);
                println!("  Subscribe pool max: {}", cfg.broker.subscribe_pool.max_size);
                println!("  Countdown checkpoints: {:?}", cfg.control.checkpoints);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    let _log_guard = logging::init_with_config(&cfg.logging);

    let (host, queue) = host_context();
    let ticker = queue.spawn_ticker(HOST_TICK);

    let shutdown = Arc::new(Notify::new());
    let server = Arc::new(ConsoleHost {
        shutdown: Arc::clone(&shutdown),
    });

    let node = CoordinationNode::from_config(&cfg, host, server)?;
    tracing::info!(server = %cfg.server_name, backend = ?cfg.broker.backend, "Starting cluster bridge");

    if !node.start().await {
        tracing::warn!("Running without broker; waiting for Ctrl+C");
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Interrupted");
        }
        () = shutdown.notified() => {
            tracing::info!("Shutdown requested by server control");
        }
    }

    node.stop().await;
    ticker.abort();

    let snapshot = node.metrics().snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => tracing::info!(metrics = %json, "Final coordination metrics"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize metrics snapshot"),
    }

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["cluster-bridge"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["cluster-bridge", "-c"]).unwrap();
        assert!(cli.validate_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        let result = Cli::try_parse_from(["cluster-bridge", "--validate-config", "--print-config"]);
        assert!(result.unwrap_err().to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_server_name_override() {
        let cli = Cli::try_parse_from(["cluster-bridge", "--server-name", "survival"]).unwrap();
        let cfg = apply_cli(Config::default(), &cli);
        assert_eq!(cfg.server_name, "survival");
    }

    #[test]
    fn test_console_host_shutdown_notifies() {
        let shutdown = Arc::new(Notify::new());
        let host = ConsoleHost {
            shutdown: Arc::clone(&shutdown),
        };
        assert!(matches!(host.restart(), Err(ControlError::RestartUnavailable)));
        host.shutdown();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            tokio::time::timeout(Duration::from_secs(1), shutdown.notified())
                .await
                .unwrap();
        });
    }
}

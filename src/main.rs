//! f3 -- operator tool for the file transfer to S3 bridge.
//!
//! Loads the same configuration the protocol front end uses and drives the
//! bridge directly: `check` probes the bucket, `ls` lists a prefix the way a
//! protocol client would see it.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use f3::config::{Config, LoggingConfig};
use f3::driver::factory::{BridgeConfig, S3DriverFactory};
use f3::driver::{Connection, DriverFactory};
use f3::metrics::{MetricsSender, NopSender, PrometheusSender};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "f3", version, about = "File transfer protocol to S3 bridge")]
struct Cli {
    /// Path to the YAML configuration file.  Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Log at debug level regardless of configuration.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate configuration and check that the bucket is reachable.
    Check,
    /// List a prefix as a protocol client would see it.
    Ls {
        /// Prefix to list.
        #[arg(default_value = "/")]
        prefix: String,
    },
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the file configuration, install logging from it, then apply
/// environment overrides so their warnings reach the installed subscriber.
fn load_settings<L, I>(cli: &Cli, lookup: L, install: I) -> anyhow::Result<Config>
where
    L: Fn(&str) -> Option<String>,
    I: FnOnce(&LoggingConfig, bool),
{
    let mut config = match &cli.config {
        Some(path) => f3::config::load_config(path)?,
        None => Config::default(),
    };

    install(&config.logging, cli.verbose);
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {path}");
    }

    config.apply_env_overrides(lookup);
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_settings(&cli, |name| std::env::var(name).ok(), init_tracing)?;

    let bridge = BridgeConfig::from_config(&config)?;

    let metrics: Arc<dyn MetricsSender> = if config.metrics.enabled {
        let listen: SocketAddr = config
            .metrics
            .listen
            .parse()
            .with_context(|| format!("invalid metrics listen address {:?}", config.metrics.listen))?;
        f3::metrics::init_metrics(listen)?;
        info!("Prometheus metrics exported on {listen}");
        Arc::new(PrometheusSender::new())
    } else {
        Arc::new(NopSender)
    };

    let factory = S3DriverFactory::connect(bridge, metrics).await;

    match cli.command {
        Command::Check => {
            factory.new_s3_driver().bucket_check().await?;
            println!(
                "bucket {:?} is accessible at {}",
                factory.config().bucket_name,
                factory.config().endpoint
            );
        }
        Command::Ls { prefix } => {
            let mut driver = factory.new_driver();
            driver.init(&Connection {
                peer_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                user: "f3".to_string(),
            });
            driver
                .list(&prefix, &mut |info| {
                    let marker = if info.is_dir() { 'd' } else { '-' };
                    println!("{marker} {:>12} {}", info.size, info.name);
                    Ok(())
                })
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_logging_installed_before_env_overrides() {
        let cli = Cli::parse_from(["f3", "check"]);
        let installed = Cell::new(false);
        let lookups = Cell::new(0);

        let config = load_settings(
            &cli,
            |name| {
                assert!(installed.get(), "{name} read before logging was installed");
                lookups.set(lookups.get() + 1);
                (name == "S3_PATHSTYLE").then(|| "true".to_string())
            },
            |logging, verbose| {
                assert_eq!(logging.level, "info");
                assert!(!verbose);
                installed.set(true);
            },
        )
        .unwrap();

        assert!(installed.get());
        assert!(lookups.get() > 0);
        assert!(config.s3.path_style);
    }

    #[test]
    fn test_load_settings_missing_file_skips_logging() {
        let cli = Cli::parse_from(["f3", "--config", "/nonexistent/f3.yaml", "check"]);
        let installed = Cell::new(false);
        let result = load_settings(&cli, |_| None, |_, _| installed.set(true));
        assert!(result.is_err());
        assert!(!installed.get());
    }
}

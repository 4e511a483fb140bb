//! Structured logging setup.
//!
//! One stdout layer plus an optional daily-rotated file. Component log
//! targets allow per-module filtering:
//!
//! ```bash
//! # Debug only the risk classifier
//! RUST_LOG=warn,maker_bot::risk=debug maker_bot run
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format (default for development)
    #[default]
    Pretty,
    /// JSON format (best for log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Directory for rotated log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Write a daily-rotated JSON log file in addition to stdout
    #[serde(default)]
    pub enable_file: bool,

    /// Enable stdout logging (default: true)
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,

    /// Format for stdout logging
    #[serde(default)]
    pub stdout_format: LogFormat,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_enable_stdout() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            enable_file: false,
            enable_stdout: default_enable_stdout(),
            stdout_format: LogFormat::default(),
        }
    }
}

/// Initialize logging. The returned guards must stay alive for the life of
/// the process or buffered file output is lost.
pub fn init_logging(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<Vec<WorkerGuard>, Box<dyn std::error::Error>> {
    let mut guards = Vec::new();

    let base_filter = if let Some(filter) = env_filter_override {
        EnvFilter::new(filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info")
                .add_directive("hyper=warn".parse().unwrap())
                .add_directive("reqwest=warn".parse().unwrap())
                .add_directive("tokio_tungstenite=warn".parse().unwrap())
        })
    };

    if config.enable_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "maker-bot.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .with_filter(EnvFilter::new("info"));

        if config.enable_stdout {
            match config.stdout_format {
                LogFormat::Json => {
                    tracing_subscriber::registry()
                        .with(file_layer)
                        .with(fmt::layer().json().with_filter(base_filter))
                        .init();
                }
                LogFormat::Compact => {
                    tracing_subscriber::registry()
                        .with(file_layer)
                        .with(fmt::layer().compact().with_filter(base_filter))
                        .init();
                }
                LogFormat::Pretty => {
                    tracing_subscriber::registry()
                        .with(file_layer)
                        .with(fmt::layer().with_target(false).with_filter(base_filter))
                        .init();
                }
            }
        } else {
            tracing_subscriber::registry().with(file_layer).init();
        }
    } else {
        match config.stdout_format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .json()
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .compact()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .with_target(false)
                    .init();
            }
        }
    }

    Ok(guards)
}

/// Log target constants for component-specific filtering.
pub mod targets {
    /// Execution loop cycles and shutdown
    pub const ENGINE: &str = "maker_bot::engine";
    /// Order placement, fills, closes
    pub const LIFECYCLE: &str = "maker_bot::lifecycle";
    /// Inventory tiers and direction overrides
    pub const RISK: &str = "maker_bot::risk";
    /// Price window and volatility gate
    pub const MARKET_DATA: &str = "maker_bot::market_data";
    /// Exposure reconciliation and status lines
    pub const RECONCILE: &str = "maker_bot::reconcile";
    /// Connections, feeds, retries
    pub const INFRA: &str = "maker_bot::infra";
}

//! CLI entry point for the PRF dashboard data core.
//!
//! Provides subcommands for running one render pass into a directory of JSON
//! payloads and for listing the configured sources.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prf_dashboard::config::DashboardConfig;
use prf_dashboard::fetch::BasicClient;
use prf_dashboard::output::{JsonDirSink, LogSink};
use prf_dashboard::pipeline::{Dashboard, PassOutcome};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "prf_dashboard")]
#[command(about = "Builds the forest reserve dashboard payloads", long_about = None)]
struct Cli {
    /// JSON config file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every source and write the KPI, table and chart payloads
    Render {
        /// Directory to write one JSON file per panel into
        #[arg(short, long, default_value = "dist")]
        output_dir: String,

        /// Log payloads instead of writing them
        #[arg(long, default_value_t = false)]
        log_only: bool,
    },
    /// List the configured sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/prf_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("prf_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };

    match cli.command {
        Commands::Render {
            output_dir,
            log_only,
        } => {
            let dashboard = Dashboard::new(config, BasicClient::new())
                .context("Invalid dashboard configuration")?;

            let outcome = if log_only {
                dashboard.render_pass(&mut LogSink).await
            } else {
                let mut sink = JsonDirSink::new(&output_dir, panel_targets(dashboard.config()))?;
                dashboard.render_pass(&mut sink).await
            };

            match outcome {
                PassOutcome::Rendered(frame) => {
                    for failed in frame.report.failed() {
                        warn!(source = %failed.name, error = ?failed.error, "Panel rendered without source");
                    }
                    for rejected in &frame.rejected_joins {
                        warn!(error = %rejected, "Join skipped");
                    }
                    info!(
                        output_dir = %output_dir,
                        rendered_at = %frame.rendered_at.to_rfc3339(),
                        records = frame.records.len(),
                        "Dashboard rendered"
                    );
                }
                PassOutcome::Superseded => info!("Render pass superseded"),
            }
        }
        Commands::Sources => {
            for (name, location) in config.source_list() {
                info!(source = name, location, "Source");
            }
            for chart in &config.charts.0 {
                info!(
                    target_panel = %chart.target,
                    dataset = %chart.dataset,
                    spec = %chart.spec,
                    "Chart"
                );
            }
            info!(aliases = config.aliases.len(), top_n = config.table.top_n, "Config summary");
        }
    }

    Ok(())
}

/// Every panel target named by `config`.
fn panel_targets(config: &DashboardConfig) -> Vec<String> {
    let mut targets = vec![
        config.status.target.clone(),
        config.kpis.target.clone(),
        config.table.target.clone(),
    ];
    targets.extend(config.charts.0.iter().map(|c| c.target.clone()));
    targets
}

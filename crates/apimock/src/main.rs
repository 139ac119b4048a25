//! apimock: serve fake, schema-conforming responses for an OpenAPI document.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use tokio::net::TcpListener;

use apimock::{MockServer, ServerConfig, DEFAULT_MAX_BODY_SIZE, DEFAULT_PORT};
use apimock_faker::FakerOptions;
use apimock_telemetry::{log_shutdown, log_startup, LogFormat, Telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(
    name = "apimock",
    about = "Mock HTTP server for OpenAPI 3.x documents",
    version
)]
struct Cli {
    /// OpenAPI document (YAML or JSON).
    #[arg(env = "APIMOCK_DOCUMENT")]
    document: PathBuf,

    /// Listen host.
    #[arg(long, env = "APIMOCK_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Listen port.
    #[arg(long, env = "APIMOCK_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable development mode (error stacks, generated-response checks).
    #[arg(long, env = "APIMOCK_DEV")]
    dev: bool,

    /// Log level, or any `tracing` filter directive.
    #[arg(long, env = "APIMOCK_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format (json or pretty).
    #[arg(long, env = "APIMOCK_LOG_FORMAT", default_value = "json")]
    log_format: String,

    /// Fail at startup when two operations share an identifier.
    #[arg(long, env = "APIMOCK_STRICT_OPERATION_IDS")]
    strict_operation_ids: bool,

    /// Directory served under /__apimock/docs/assets/.
    #[arg(long, env = "APIMOCK_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    /// Per-request budget for generating a response body, in milliseconds.
    #[arg(long, env = "APIMOCK_GENERATION_TIMEOUT_MS", default_value_t = 5000)]
    generation_timeout_ms: u64,

    /// Maximum request body size in bytes.
    #[arg(long, env = "APIMOCK_MAX_BODY_SIZE", default_value_t = DEFAULT_MAX_BODY_SIZE)]
    max_body_size: usize,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            dev_mode: self.dev,
            strict_operation_ids: self.strict_operation_ids,
            assets_dir: self.assets_dir.clone(),
            generation_timeout: Duration::from_millis(self.generation_timeout_ms),
            max_body_size: self.max_body_size,
            faker: FakerOptions::default(),
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let log_format = LogFormat::parse(&cli.log_format)
        .ok_or_else(|| anyhow!("invalid log format '{}' (expected json or pretty)", cli.log_format))?;
    let telemetry = Telemetry::init(
        TelemetryConfig::new()
            .with_log_level(cli.log_level.clone())
            .with_log_format(log_format),
    )
    .context("failed to initialize logging")?;

    log_startup!(
        service = %telemetry.config().service_name,
        version = env!("CARGO_PKG_VERSION"),
        document = %cli.document.display(),
        dev_mode = cli.dev
    );

    let config = cli.server_config();
    let server = MockServer::load(&cli.document, config.clone())
        .with_context(|| format!("failed to start from '{}'", cli.document.display()))?;

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind to {}:{}", config.host, config.port))?;

    server
        .serve(listener, shutdown_signal())
        .await
        .context("server error")?;

    log_shutdown!(reason = "signal");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

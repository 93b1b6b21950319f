//! SQL Query MCP Server - Main entry point.
//!
//! This server exposes a single read-only `query` tool over MCP, backed by a
//! pooled connection to one database (MySQL, PostgreSQL or SQLite).

use sql_query_mcp::config::{Config, TransportMode};
use sql_query_mcp::db::PoolManager;
use sql_query_mcp::mcp::{QueryWorkers, ToolGateway};
use sql_query_mcp::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr: stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; real environment variables still apply
    let dotenv_path = dotenvy::dotenv().ok();

    let config = Config::parse_args();

    init_tracing(&config);

    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "Loaded environment from file");
    }

    info!(
        transport = %config.transport,
        "Starting SQL Query MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool_config = match config.pool_config() {
        Ok(pool_config) => pool_config,
        Err(e) => {
            error!(error = %e, "Invalid database configuration");
            return Err(e.into());
        }
    };
    info!(
        engine = %pool_config.engine(),
        default_timeout_secs = pool_config.default_timeout_seconds(),
        pool_size = pool_config.pool_size(),
        "Database configured (pool is created on first use)"
    );

    let pool = Arc::new(PoolManager::new(pool_config));

    if config.eager_connect {
        if let Err(e) = pool.connect().await {
            error!(error = %e, "Database unreachable at startup");
            return Err(e.into());
        }
    }

    let gateway = ToolGateway::new(Arc::clone(&pool), QueryWorkers::new(config.max_workers));

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(gateway).run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                gateway,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    // Transports close the pool themselves; this covers early exits
    pool.shutdown().await;

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

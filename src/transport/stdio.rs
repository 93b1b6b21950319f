//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations. Logs go to
//! stderr so stdout carries protocol messages only.

use crate::mcp::ToolGateway;
use crate::transport::{Transport, TransportError, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

/// Stdio transport implementation.
///
/// This transport reads JSON-RPC messages from stdin and writes
/// responses to stdout, following the MCP protocol specification.
pub struct StdioTransport {
    gateway: ToolGateway,
}

impl StdioTransport {
    /// Create a new stdio transport serving the given gateway.
    pub fn new(gateway: ToolGateway) -> Self {
        Self { gateway }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> Result<(), TransportError> {
        info!("Starting MCP server with stdio transport");

        let running_service =
            self.gateway
                .clone()
                .serve(stdio())
                .await
                .map_err(|e| TransportError::Start {
                    transport: self.name(),
                    message: e.to_string(),
                })?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                if let Err(e) = result {
                    warn!(error = %e, "Stdio transport error");
                    self.gateway.pool().shutdown().await;
                    return Err(TransportError::Serve {
                        transport: self.name(),
                        message: e.to_string(),
                    });
                }
                info!("Stdio transport completed normally");
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            // Spawn a task to listen for second signal and force exit
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        self.gateway.pool().shutdown().await;

        if shutdown_requested {
            // tokio::select! cannot interrupt blocking stdin reads
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PoolManager;
    use crate::mcp::QueryWorkers;
    use crate::models::{DatabaseType, PoolConfig};
    use std::sync::Arc;

    #[test]
    fn test_stdio_transport_creation() {
        let config = PoolConfig::builder(DatabaseType::MySQL).build().unwrap();
        let gateway = ToolGateway::new(Arc::new(PoolManager::new(config)), QueryWorkers::new(1));
        let transport = StdioTransport::new(gateway);
        assert_eq!(transport.name(), "stdio");
    }
}

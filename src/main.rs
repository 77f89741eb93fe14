//! graphkv-mcp server entry point.
//!
//! Composition root: load config, wire the logger and error policy,
//! initialize both stores, then run the MCP stdio loop until EOF or a
//! termination signal. Startup failures are classified before the process
//! decides how to exit; shutdown always attempts to close both stores.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use graphkv_mcp::logging::Logger;
use graphkv_mcp::mcp::McpServer;
use graphkv_mcp::policy::ErrorHandler;
use graphkv_mcp::store::{GraphStore, KvStore};
use graphkv_mcp::{Config, Result};

#[tokio::main]
async fn main() {
    graphkv_mcp::observability::init_tracing();
    let config = Config::from_env();

    let logger = Logger::new(&config.logging);
    let errors = ErrorHandler::new(logger.clone());

    let graph = Arc::new(GraphStore::new(
        &config.graph,
        &config.connection,
        logger.clone(),
    ));
    let kv = Arc::new(KvStore::new(&config.kv, &config.connection, logger.clone()));

    logger
        .info(
            "Starting graphkv-mcp server",
            Some(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
        )
        .await;

    if let Err(err) = startup(&graph, &kv).await {
        errors.handle_error(&err).await;
        // Close whatever did come up; startup failure exits cleanly.
        graceful_shutdown(&graph, &kv, &logger).await;
        return;
    }

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(64);
    logger.attach_notifier(tx);

    let server = McpServer::new(graph.clone(), kv.clone(), logger.clone(), shutdown.clone());

    tokio::select! {
        result = server.run(rx) => {
            if let Err(err) = result {
                errors.handle_error(&err).await;
                errors.crash_if_untrusted(&err);
            }
        }
        _ = shutdown_signal() => {
            logger.info("Termination signal received", None).await;
            shutdown.cancel();
        }
    }

    graceful_shutdown(&graph, &kv, &logger).await;
}

async fn startup(graph: &GraphStore, kv: &KvStore) -> Result<()> {
    graph.initialize().await?;
    kv.initialize().await?;
    Ok(())
}

/// Close both stores. Teardown failures are absorbed and logged by the
/// connection managers, so shutdown itself always completes cleanly; only
/// the crash policy exits non-zero.
async fn graceful_shutdown(graph: &GraphStore, kv: &KvStore, logger: &Logger) {
    logger.info("Shutting down", None).await;
    graph.close().await;
    kv.close().await;
    logger.info("Shutdown complete", None).await;
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!("SIGTERM handler unavailable: {err}");
            let _ = ctrl_c.await;
        }
    }
}

//! wardrobe-sw server entry point.
//!
//! Boots the worker runtime and the host-side controller, then serves
//! platform events as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use wardrobe_sw_client::{ConnectivityGate, FetchConfig, HttpFetcher, NoticeLevel, PwaController};
use wardrobe_sw_core::{AppConfig, CacheDb};

mod handler;
mod runtime;
mod tools;
mod worker;

use runtime::Runtime;
use worker::bridge::LogSyncHook;
use worker::platform::LocalPlatform;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let worker_config = config.worker_config()?;
    tracing::info!(
        version = %worker_config.version,
        scope = %worker_config.scope,
        "Starting wardrobe-sw server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache database at {}", config.db_path.display()))?;

    let fetcher = HttpFetcher::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        origin: Some(worker_config.scope.clone()),
        ..Default::default()
    })?;
    let network = Arc::new(ConnectivityGate::new(Arc::new(fetcher)));

    let runtime = Arc::new(Runtime::new(
        worker_config,
        Arc::new(db.clone()),
        network,
        Arc::new(LocalPlatform::new()),
        Arc::new(LogSyncHook),
    ));

    let (pwa, mut notices) = PwaController::new(runtime.clone(), config.host_config());
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice.level {
                NoticeLevel::Error => tracing::warn!(notice = %notice.message, "host notice"),
                NoticeLevel::Info | NoticeLevel::Success => tracing::info!(notice = %notice.message, "host notice"),
            }
        }
    });
    pwa.mount().await;

    let handler = handler::WardrobeSwServer::new(runtime, Arc::new(pwa), db);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

mod api;
mod auth;
mod config;
mod detector;
mod error;
mod metrics;
mod pipeline;
mod provider;
mod state;
mod validate;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::auth::Credentials;
use crate::detector::IpDetector;
use crate::metrics::Metrics;
use crate::pipeline::UpdatePipeline;
use crate::provider::cloudflare::CloudflareClient;
use crate::state::IpCache;

#[derive(Parser, Debug)]
#[command(name = "cloudflare-ddns-bridge")]
#[command(about = "A DynDNS-compatible bridge that forwards record updates to Cloudflare")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logger init)
    let config = config::Config::load(&args.config)?;

    // env var takes precedence over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level),
    )
    .init();

    info!(
        "Cloudflare ddns bridge version {} using {}",
        env!("CARGO_PKG_VERSION"),
        args.config
    );

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let provider = Arc::new(
        CloudflareClient::new(&config.cloudflare).context("Failed to build Cloudflare client")?,
    );

    let token = CancellationToken::new();

    let detector = if config.detector.enabled {
        let detector = IpDetector::new(
            &config.detector,
            &config.cloudflare,
            provider.clone(),
            Arc::new(IpCache::new()),
            metrics.clone(),
        )
        .context("Failed to build IP detector")?;
        Some(detector.spawn(token.clone()))
    } else {
        info!("IP detector disabled");
        None
    };

    let pipeline = UpdatePipeline::new(
        provider,
        &config.cloudflare,
        Arc::new(IpCache::new()),
        metrics.clone(),
    );
    let state = Arc::new(api::AppState { pipeline, metrics });
    let app = api::create_router(
        state,
        Credentials::from(&config.auth),
        config.auth.secured_metrics,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server listening on http://{}", addr);
    info!("DDNS endpoints: GET /nic/update, GET /nic/bulk/update");

    tokio::spawn(shutdown_on_signal(token.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(token.clone().cancelled_owned())
        .await?;

    token.cancel();
    if let Some(handle) = detector {
        if let Err(e) = handle.await {
            warn!("IP detector task ended abnormally: {}", e);
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_on_signal(token: CancellationToken) {
    let signal = wait_for_signal().await;
    info!("Received {}, shutting down", signal);
    token.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        name = wait_for_ctrl_c() => name,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to wait for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

//! tfstated: Terraform/OpenTofu remote state server.
//!
//! Serves the `http` state backend protocol and stores every state file
//! in a Gitea repository, one commit per save. Locks are held in memory.
//!
//! # Usage
//!
//! ```text
//! GITEA_URL=https://gitea.example.com GITEA_TOKEN=... \
//! GITEA_OWNER=infra GITEA_REPO=tfstate AUTH_TOKEN=... tfstated
//! ```

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tfstate_api::{AppState, RouterOptions, build_router};
use tfstate_gitea::GiteaClient;

use crate::config::{Config, LogFormat};

/// Time outstanding requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

const DEFAULT_LOG_FILTER: &str = "info,tfstated=debug,tfstate=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);
    run(config).await
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("tfstated starting");

    // ── Storage ────────────────────────────────────────────────

    let gitea = GiteaClient::new(config.gitea_config()).context("failed to create gitea client")?;
    info!(
        url = %config.gitea_url,
        owner = %config.gitea_owner,
        repo = %config.gitea_repo,
        branch = %config.gitea_branch,
        "gitea backend configured"
    );

    let state = AppState::new(Arc::new(gitea));

    // ── Router ─────────────────────────────────────────────────

    let auth_token = config.auth_token().map(str::to_string);
    if auth_token.is_some() {
        info!("authentication enabled");
    } else {
        warn!("authentication disabled, AUTH_TOKEN not set");
    }

    let router = build_router(
        state,
        RouterOptions {
            auth_token,
            max_body_bytes: config.max_body_bytes(),
        },
    );

    // ── Serve ──────────────────────────────────────────────────

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %listener.local_addr()?, "server listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            joined.context("server task panicked")?.context("server failed")?;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    info!("shutdown signal received, draining requests");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(joined) => joined.context("server task panicked")?.context("server failed")?,
        Err(_) => {
            warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "requests still in flight, forcing shutdown");
            server.abort();
        }
    }

    info!("tfstated stopped");
    Ok(())
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

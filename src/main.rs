// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meeting_notes_relay::{
    api::router,
    config::{AppConfig, LOG_FORMAT_ENV},
    providers::GitHubClient,
    state::AppState,
};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

/// Log whether the issue tracker token can see the configured repository.
async fn check_issue_tracker(config: &AppConfig) {
    if !config.github.is_configured() {
        return;
    }
    match GitHubClient::from_config(&config.github, config.enrichment_timeout) {
        Ok(client) if client.validate_credentials().await => {
            info!(repo = client.repo(), "Issue tracker credentials valid");
        }
        Ok(client) => warn!(repo = client.repo(), "Issue tracker rejected the configured token"),
        Err(e) => warn!(error = %e, "Issue tracker misconfigured"),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = AppConfig::from_env();
    info!(
        container = %config.certificate.container_path.display(),
        password_candidates = config.certificate.passwords.len(),
        enrichment = config.graph.is_configured(),
        issue_tracker = config.github.is_configured(),
        history_capacity = config.history_capacity,
        "Configuration loaded"
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let tls = config.tls.clone();

    check_issue_tracker(&config).await;

    let (state, reporter) = AppState::from_config(config);
    let key_material = state.resolve_key_material().await;
    info!(?key_material, "Notification key material resolved");
    let shutdown = CancellationToken::new();
    let reporter_task = tokio::spawn(reporter.run(shutdown.clone()));

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        }
    });

    let app = router(state);
    match tls {
        Some(paths) => {
            let tls_config = RustlsConfig::from_pem_file(&paths.cert_path, &paths.key_path)
                .await
                .expect("Failed to load TLS certificate and key");
            info!(%addr, "Meeting notes relay listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            info!(%addr, "Meeting notes relay listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    shutdown.cancel();
    if let Err(e) = reporter_task.await {
        warn!(error = %e, "Outcome reporter task failed");
    }
    info!("Server stopped");
}

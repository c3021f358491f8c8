/*
 * Responsibility
 * - Config loading -> dependency wiring -> Router assembly
 * - Middleware application (auth filter / security headers / CORS / HTTP)
 * - axum::serve() with graceful shutdown
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::auth::{InMemoryUserStore, SystemClock};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins; e.g. RUST_LOG=info,token_gate=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting token gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(auth = ?config.auth, "auth policy");

    let state = build_state(&config)?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

fn build_state(config: &Config) -> Result<AppState> {
    let users = Arc::new(InMemoryUserStore::parse(&config.users).context("invalid AUTH_USERS")?);
    if users.is_empty() {
        tracing::warn!("AUTH_USERS is empty; every login will be rejected");
    } else {
        tracing::info!(users = users.len(), "user store loaded");
    }

    AppState::new(
        config.auth.clone(),
        Arc::new(SystemClock),
        users.clone(),
        users,
    )
    .context("invalid authorization policy")
}

/// Full application router. The auth filter is skipped entirely when
/// authentication is disabled.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let mut router = api::routes(&state.config);
    if state.policy.is_enabled() {
        router = middleware::auth::access::apply(router, state.clone());
    } else {
        tracing::warn!("authentication disabled; all paths are open");
    }

    let router = router.with_state(state);
    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Read-only status endpoint
//!
//! | Route       | Body                                          |
//! |-------------|-----------------------------------------------|
//! | `/ipv4`     | last persisted IPv4 as text, 404 when unknown |
//! | `/ipv6`     | last persisted IPv6 as text, 404 when unknown |
//! | `/hostname` | host name of the daemon                       |
//! | `/status`   | JSON [`StatusSnapshot`]                        |
//!
//! Handlers only read the store; they never start an update cycle.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use ddns_core::{ConfigStore, StatusSnapshot};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::ServerHandle;

#[derive(Clone)]
pub(crate) struct StatusState {
    store: Arc<ConfigStore>,
    hostname: Arc<str>,
}

impl StatusState {
    pub(crate) fn new(store: Arc<ConfigStore>, hostname: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            hostname: hostname.into(),
        }
    }

    async fn snapshot(&self) -> StatusSnapshot {
        self.store.status(&self.hostname).await
    }
}

pub(crate) fn router(state: StatusState) -> Router {
    Router::new()
        .route("/ipv4", get(get_ipv4))
        .route("/ipv6", get(get_ipv6))
        .route("/hostname", get(get_hostname))
        .route("/status", get(get_status))
        .with_state(state)
}

fn text_or_not_found(value: Option<String>) -> Response {
    match value {
        Some(text) => text.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_ipv4(State(state): State<StatusState>) -> Response {
    text_or_not_found(state.snapshot().await.ipv4.map(|ip| ip.to_string()))
}

async fn get_ipv6(State(state): State<StatusState>) -> Response {
    text_or_not_found(state.snapshot().await.ipv6.map(|ip| ip.to_string()))
}

async fn get_hostname(State(state): State<StatusState>) -> String {
    state.hostname.to_string()
}

async fn get_status(State(state): State<StatusState>) -> Json<StatusSnapshot> {
    Json(state.snapshot().await)
}

/// Bind the listener and serve until the returned handle is stopped
pub(crate) async fn spawn(
    addr: SocketAddr,
    store: Arc<ConfigStore>,
    hostname: String,
) -> Result<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding status endpoint on {}", addr))?;
    tracing::info!(address = %listener.local_addr()?, "Status endpoint listening");

    Ok(serve_on(listener, StatusState::new(store, hostname)))
}

fn serve_on(listener: TcpListener, state: StatusState) -> ServerHandle {
    let app = router(state);
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await
    });

    ServerHandle { stop, task }
}

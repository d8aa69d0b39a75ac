use axum::{
    Router,
    routing::{get, post},
};
use engine::{CatalogMap, Ledger};

use std::sync::Arc;

use crate::{batches, views};

#[derive(Clone)]
pub struct ServerState {
    pub ledger: Arc<Ledger>,
    pub catalog: Arc<CatalogMap>,
    /// Roles allowed to soft-delete batches, compared case-insensitively.
    pub delete_roles: Arc<Vec<String>>,
}

impl ServerState {
    pub fn new(ledger: Ledger, catalog: CatalogMap, delete_roles: Vec<String>) -> Self {
        Self {
            ledger: Arc::new(ledger),
            catalog: Arc::new(catalog),
            delete_roles: Arc::new(delete_roles),
        }
    }

    pub(crate) fn may_delete(&self, role: &str) -> bool {
        let role = role.trim();
        !role.is_empty()
            && self
                .delete_roles
                .iter()
                .any(|allowed| allowed.trim().eq_ignore_ascii_case(role))
    }
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/batches", post(batches::commit))
        .route("/batches/{batch_id}/delete", post(batches::delete))
        .route("/view", get(views::active))
        .route("/archive", get(views::archive))
        .route("/refresh", post(views::refresh))
        .with_state(state)
}

pub async fn run(state: ServerState, addr: &str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(state, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

//! Read endpoints

use api_types::view::{RefreshResponse, ViewQuery};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use engine::{LedgerView, ReconciliationSummary, ViewFilter};
use serde::Serialize;

use crate::{ServerError, batches::map_type, server::ServerState};

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    #[serde(flatten)]
    pub view: LedgerView,
    pub summary: ReconciliationSummary,
}

impl From<LedgerView> for ViewResponse {
    fn from(view: LedgerView) -> Self {
        let summary = view.summary();
        Self { view, summary }
    }
}

fn filter(query: ViewQuery) -> ViewFilter {
    ViewFilter {
        kind: query.kind.map(map_type),
        branch_id: query.branch_id.filter(|id| !id.trim().is_empty()),
    }
}

pub async fn active(
    State(state): State<ServerState>,
    query: Result<Query<ViewQuery>, QueryRejection>,
) -> Result<Json<ViewResponse>, ServerError> {
    let Query(query) = query?;
    let view = state
        .ledger
        .active_view(&filter(query), state.catalog.as_ref())
        .await;
    Ok(Json(view.into()))
}

pub async fn archive(
    State(state): State<ServerState>,
    query: Result<Query<ViewQuery>, QueryRejection>,
) -> Result<Json<ViewResponse>, ServerError> {
    let Query(query) = query?;
    let view = state
        .ledger
        .archive_view(&filter(query), state.catalog.as_ref())
        .await;
    Ok(Json(view.into()))
}

/// Reload the snapshot from the store.
pub async fn refresh(State(state): State<ServerState>) -> Result<Json<RefreshResponse>, ServerError> {
    let records = state.ledger.refresh().await?;
    Ok(Json(RefreshResponse { records }))
}

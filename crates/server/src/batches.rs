//! Batch write endpoints: commit and soft delete.

use api_types::{
    ActorView, TransactionType as ApiType,
    batch::{BatchCommitted, BatchDeleted, CommitBatch, DeleteBatch, LineItemNew},
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use engine::{Actor, CommitBatchCmd, LineItem, TransactionType};

use crate::{ServerError, server::ServerState};

pub(crate) fn map_type(kind: ApiType) -> TransactionType {
    match kind {
        ApiType::Restock => TransactionType::Restock,
        ApiType::CheckOut => TransactionType::CheckOut,
        ApiType::CheckIn => TransactionType::CheckIn,
        ApiType::Waste => TransactionType::Waste,
        ApiType::Adjustment => TransactionType::Adjustment,
    }
}

fn map_actor(actor: ActorView) -> Actor {
    Actor::new(actor.id, actor.name, actor.role)
}

fn map_line(line: LineItemNew) -> LineItem {
    let item = LineItem::new(
        line.branch_id,
        line.sku_id,
        map_type(line.kind),
        line.quantity_pieces,
        line.date,
    )
    .image_urls(line.image_urls);
    match line.image_url {
        Some(url) => item.legacy_image_url(url),
        None => item,
    }
}

/// Handle requests for committing a new batch.
pub async fn commit(
    State(state): State<ServerState>,
    payload: Result<Json<CommitBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchCommitted>), ServerError> {
    let Json(payload) = payload?;
    let cmd = CommitBatchCmd::new(map_actor(payload.actor))
        .lines(payload.lines.into_iter().map(map_line));
    let receipt = state.ledger.commit_batch(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(BatchCommitted {
            batch_id: receipt.batch_id,
            timestamp: receipt.timestamp,
            transaction_ids: receipt.transaction_ids,
            warning: receipt.warning.map(|err| err.to_string()),
        }),
    ))
}

/// Handle requests for soft-deleting a batch.
///
/// `batch_id` also accepts the `legacy:` key of batches written before batch
/// ids existed.
pub async fn delete(
    State(state): State<ServerState>,
    Path(batch_id): Path<String>,
    payload: Result<Json<DeleteBatch>, JsonRejection>,
) -> Result<Json<BatchDeleted>, ServerError> {
    let Json(payload) = payload?;
    let actor = payload.actor;
    if !state.may_delete(&actor.role) {
        tracing::warn!(batch_id = %batch_id, actor = %actor.name, role = %actor.role, "delete refused");
        return Err(ServerError::Forbidden(format!(
            "role \"{}\" may not delete batches",
            actor.role
        )));
    }

    let receipt = state.ledger.delete_batch_id(&batch_id, &actor.name).await?;

    Ok(Json(BatchDeleted {
        batch_id,
        stamped: receipt.stamped,
        warning: receipt.warning.map(|err| err.to_string()),
    }))
}

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::{QueryFilter, TransactionTrait, prelude::*, sea_query::Expr};

use crate::{
    DeleteReceipt, EngineError, ResultEngine,
    reconcile::{GroupKey, LEGACY_PREFIX, derive_group_key},
    transactions, util::normalize_required_id,
};

use super::{Ledger, with_tx};

impl Ledger {
    /// Soft-deletes every line of a batch.
    ///
    /// Records are stamped with `deleted_at`/`deleted_by` and stay in the
    /// store forever; they move from the active view to the archive view.
    /// Deleting an already-deleted batch is a no-op (`stamped == 0`) and keeps
    /// the original stamps. A key that matches nothing is `KeyNotFound`.
    ///
    /// Authorization is the caller's job: `actor_name` is recorded for audit
    /// only.
    pub async fn delete_batch(
        &self,
        key: &GroupKey,
        actor_name: &str,
    ) -> ResultEngine<DeleteReceipt> {
        let actor_name = normalize_required_id(actor_name, "actor name")?;

        let (stamped, stamp) = {
            let mut state = self.state.write().await;
            // The store keeps milliseconds.
            let now = Utc::now().trunc_subsecs(3);
            let mut matched = 0usize;
            let mut stamped = 0usize;
            let mut stamp: Option<(DateTime<Utc>, String)> = None;
            for tx in state
                .records
                .iter_mut()
                .filter(|tx| derive_group_key(tx) == *key)
            {
                matched += 1;
                if tx.stamp_deleted(now, &actor_name) {
                    stamped += 1;
                }
                if stamp.is_none() {
                    stamp = tx.deleted_at.zip(tx.deleted_by.clone());
                }
            }
            if matched == 0 {
                return Err(EngineError::KeyNotFound(key.to_string()));
            }
            (stamped, stamp)
        };

        if stamped == 0 {
            tracing::debug!(key = %key, "batch already deleted");
        } else {
            tracing::info!(key = %key, stamped, by = %actor_name, "batch soft-deleted");
        }

        // Re-sent even for an already-deleted batch so a store that missed the
        // first stamp catches up; rows already stamped are left alone.
        let warning = match stamp {
            Some((at, by)) => match self
                .with_store_timeout("delete", self.stamp_rows(key, at, &by))
                .await
            {
                Ok(rows) => {
                    tracing::debug!(key = %key, rows, "store rows stamped");
                    None
                }
                Err(err) => {
                    tracing::warn!(key = %key, "deletion kept locally, store write failed: {err}");
                    Some(err)
                }
            },
            None => None,
        };

        Ok(DeleteReceipt { stamped, warning })
    }

    /// Convenience over [`Ledger::delete_batch`] taking the key's string form.
    ///
    /// A `legacy:` string that matches no legacy batch is retried as a plain
    /// batch id, so stored ids sharing the prefix stay deletable.
    pub async fn delete_batch_id(
        &self,
        batch_id: &str,
        actor_name: &str,
    ) -> ResultEngine<DeleteReceipt> {
        let raw = batch_id.trim();
        let plain = || GroupKey::Batch(raw.to_string());
        match raw.parse::<GroupKey>() {
            Ok(key @ GroupKey::Legacy { .. }) => match self.delete_batch(&key, actor_name).await {
                Err(EngineError::KeyNotFound(_)) => self.delete_batch(&plain(), actor_name).await,
                other => other,
            },
            Ok(key) => self.delete_batch(&key, actor_name).await,
            Err(_) if raw.starts_with(LEGACY_PREFIX) => {
                self.delete_batch(&plain(), actor_name).await
            }
            Err(err) => Err(err),
        }
    }

    async fn stamp_rows(
        &self,
        key: &GroupKey,
        deleted_at: DateTime<Utc>,
        deleted_by: &str,
    ) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            let mut update = transactions::Entity::update_many()
                .col_expr(
                    transactions::Column::DeletedAt,
                    Expr::value(deleted_at.timestamp_millis()),
                )
                .col_expr(
                    transactions::Column::DeletedBy,
                    Expr::value(deleted_by.to_string()),
                )
                .filter(transactions::Column::DeletedAt.is_null());

            update = match key {
                GroupKey::Batch(batch_id) => {
                    update.filter(transactions::Column::BatchId.eq(batch_id.clone()))
                }
                GroupKey::Legacy {
                    timestamp_ms,
                    branch_id,
                    kind,
                } => update
                    .filter(transactions::Column::BatchId.is_null())
                    .filter(transactions::Column::Timestamp.eq(*timestamp_ms))
                    .filter(transactions::Column::BranchId.eq(branch_id.clone()))
                    .filter(transactions::Column::Kind.eq(kind.as_str())),
            };

            let result = update.exec(&db_tx).await?;
            Ok(result.rows_affected)
        })
    }
}

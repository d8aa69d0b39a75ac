use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Actor, CommitBatchCmd, CommitReceipt, EngineError, LineItem, MAX_QUANTITY_PIECES,
    OperationalDate, ResultEngine, Transaction, TransactionType, evidence::merge_evidence,
    transactions, util::normalize_required_id,
};

use super::{Ledger, with_tx};

/// A line that passed validation, with canonical ids and evidence.
struct PreparedLine {
    branch_id: String,
    sku_id: String,
    kind: TransactionType,
    quantity_pieces: i64,
    date: OperationalDate,
    image_urls: Vec<String>,
}

fn at_line(number: usize, err: EngineError) -> EngineError {
    match err {
        EngineError::Validation(msg) => EngineError::Validation(format!("line {number}: {msg}")),
        other => other,
    }
}

fn prepare_line(line: &LineItem) -> ResultEngine<PreparedLine> {
    let branch_id = normalize_required_id(&line.branch_id, "branch_id")?;
    let sku_id = normalize_required_id(&line.sku_id, "sku_id")?;
    let date = OperationalDate::parse(&line.date)?;

    if line.quantity_pieces == 0 {
        return Err(EngineError::Validation(
            "quantity_pieces must not be 0".to_string(),
        ));
    }
    if line.quantity_pieces.unsigned_abs() > MAX_QUANTITY_PIECES.unsigned_abs() {
        return Err(EngineError::Validation(format!(
            "quantity_pieces must not exceed {MAX_QUANTITY_PIECES} in absolute value"
        )));
    }
    if line.quantity_pieces < 0 && !line.kind.is_signed() {
        return Err(EngineError::Validation(format!(
            "quantity_pieces must be > 0 for {}",
            line.kind
        )));
    }

    Ok(PreparedLine {
        branch_id,
        sku_id,
        kind: line.kind,
        quantity_pieces: line.quantity_pieces,
        date,
        image_urls: merge_evidence([line]),
    })
}

/// Validate a whole batch before anything is written.
fn prepare_batch(lines: &[LineItem]) -> ResultEngine<Vec<PreparedLine>> {
    if lines.is_empty() {
        return Err(EngineError::Validation(
            "batch must contain at least one line".to_string(),
        ));
    }

    let prepared = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| prepare_line(line).map_err(|err| at_line(idx + 1, err)))
        .collect::<ResultEngine<Vec<_>>>()?;

    // Every line of a batch shares date, branch and type.
    if let Some((head, rest)) = prepared.split_first() {
        for (idx, line) in rest.iter().enumerate() {
            if line.date != head.date || line.branch_id != head.branch_id || line.kind != head.kind
            {
                return Err(at_line(
                    idx + 2,
                    EngineError::Validation(
                        "date, branch_id and type must match the first line".to_string(),
                    ),
                ));
            }
        }
    }

    Ok(prepared)
}

fn prepare_actor(actor: &Actor) -> ResultEngine<(String, String)> {
    Ok((
        normalize_required_id(&actor.id, "actor id")?,
        normalize_required_id(&actor.name, "actor name")?,
    ))
}

impl Ledger {
    /// Commits one user action as a batch.
    ///
    /// Every record gets the same fresh batch id and commit timestamp. The
    /// records are added to the snapshot before the store is written, and
    /// stay there even if the write fails: the failure is returned in
    /// [`CommitReceipt::warning`]. Validation errors are returned before any
    /// state changes.
    pub async fn commit_batch(&self, cmd: CommitBatchCmd) -> ResultEngine<CommitReceipt> {
        let CommitBatchCmd { lines, actor } = cmd;
        let prepared = prepare_batch(&lines)?;
        let (user_id, user_name) = prepare_actor(&actor)?;
        let batch_id = Uuid::new_v4().to_string();

        let (timestamp, records) = {
            let mut state = self.state.write().await;
            let timestamp = state.next_timestamp(Utc::now());
            let records: Vec<Transaction> = prepared
                .into_iter()
                .map(|line| Transaction {
                    id: Uuid::new_v4(),
                    batch_id: Some(batch_id.clone()),
                    timestamp,
                    date: line.date,
                    branch_id: line.branch_id,
                    sku_id: line.sku_id,
                    kind: line.kind,
                    quantity_pieces: line.quantity_pieces,
                    image_urls: line.image_urls,
                    user_id: user_id.clone(),
                    user_name: user_name.clone(),
                    deleted_at: None,
                    deleted_by: None,
                })
                .collect();
            state.prepend(records.clone());
            (timestamp, records)
        };

        tracing::info!(
            batch_id = %batch_id,
            lines = records.len(),
            user = %user_name,
            "batch committed to snapshot"
        );

        let warning = match self
            .with_store_timeout("commit", self.insert_records(&records))
            .await
        {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(batch_id = %batch_id, "batch kept locally, store write failed: {err}");
                Some(err)
            }
        };

        Ok(CommitReceipt {
            batch_id,
            timestamp,
            transaction_ids: records.iter().map(|tx| tx.id).collect(),
            warning,
        })
    }

    /// All lines of a batch go to the store as one multi-row write.
    async fn insert_records(&self, records: &[Transaction]) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let models = records.iter().map(transactions::ActiveModel::from);
            transactions::Entity::insert_many(models)
                .exec_without_returning(&db_tx)
                .await?;
            Ok(())
        })
    }
}

use sea_orm::{QueryOrder, prelude::*};

use crate::{
    Catalog, LedgerView, ResultEngine, Transaction, ViewFilter, reconcile::build_view,
    transactions,
};

use super::Ledger;

impl Ledger {
    /// Copy of every record in the snapshot, deleted ones included, newest
    /// commit first.
    pub async fn snapshot(&self) -> Vec<Transaction> {
        self.state.read().await.records.clone()
    }

    /// Batches and reconciliation groups over records that are not deleted.
    pub async fn active_view(&self, filter: &ViewFilter, catalog: &impl Catalog) -> LedgerView {
        let records = self.select(|tx| !tx.is_deleted()).await;
        build_view(&records, filter, catalog)
    }

    /// Same shape as [`Ledger::active_view`], over soft-deleted records only.
    pub async fn archive_view(&self, filter: &ViewFilter, catalog: &impl Catalog) -> LedgerView {
        let records = self.select(Transaction::is_deleted).await;
        build_view(&records, filter, catalog)
    }

    async fn select(&self, keep: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let state = self.state.read().await;
        state.records.iter().filter(|tx| keep(tx)).cloned().collect()
    }

    /// Replaces the snapshot with the durable store's content.
    ///
    /// Local records that never reached the store are dropped. Rows that
    /// cannot be decoded are logged and skipped. Returns the number of records
    /// loaded; on a store failure the snapshot is left as it was.
    pub async fn refresh(&self) -> ResultEngine<usize> {
        let models = self
            .with_store_timeout("refresh", self.load_models())
            .await?;

        let total = models.len();
        let records: Vec<Transaction> = models
            .into_iter()
            .filter_map(|model| {
                let id = model.id.clone();
                match Transaction::try_from(model) {
                    Ok(tx) => Some(tx),
                    Err(err) => {
                        tracing::error!("skipping stored transaction {id}: {err}");
                        None
                    }
                }
            })
            .collect();

        let loaded = records.len();
        self.state.write().await.replace(records);
        tracing::info!(loaded, skipped = total - loaded, "snapshot refreshed");
        Ok(loaded)
    }

    async fn load_models(&self) -> ResultEngine<Vec<transactions::Model>> {
        Ok(transactions::Entity::find()
            .order_by_desc(transactions::Column::Timestamp)
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await?)
    }
}

//! Stock transaction ledger and reconciliation engine.
//!
//! - [`Ledger`] owns the transaction snapshot and the durable store: it
//!   commits batches ([`Ledger::commit_batch`]), soft-deletes them
//!   ([`Ledger::delete_batch`]) and serves the active and archive views.
//! - [`reconcile`] turns any snapshot into ordered [`BatchSummary`]s and
//!   per-(date, branch) [`ReconciliationGroup`]s.
//! - [`evidence`] folds and deduplicates evidence URLs.

pub use catalog::{Catalog, CatalogMap, NoCatalog};
pub use commands::{Actor, CommitBatchCmd, CommitReceipt, DeleteReceipt, LineItem};
pub use error::EngineError;
pub use ops::{DEFAULT_STORE_TIMEOUT, Ledger, LedgerBuilder};
pub use reconcile::{
    BatchItem, BatchSummary, GroupKey, LedgerView, ReconciliationGroup, ReconciliationStatus,
    ReconciliationSummary, ViewFilter, build_view, derive_group_key,
};
pub use transactions::{MAX_QUANTITY_PIECES, OperationalDate, Transaction, TransactionType};

mod catalog;
mod commands;
mod error;
pub mod evidence;
mod ops;
pub mod reconcile;
pub mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;

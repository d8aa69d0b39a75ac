//! Command and receipt structs for ledger operations.
//!
//! These types group parameters for write operations (commit/delete),
//! keeping call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, TransactionType, evidence::EvidenceSource};

/// Identity of whoever performs a write, denormalized into every record.
///
/// `role` is informational for the ledger: authorization happens in the
/// caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: String,
}

impl Actor {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
        }
    }
}

/// One stock movement as entered by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub branch_id: String,
    pub sku_id: String,
    pub kind: TransactionType,
    pub quantity_pieces: i64,
    /// Operational date, `YYYY-MM-DD`.
    pub date: String,
    pub image_urls: Vec<String>,
    /// Deprecated single evidence URL, still sent by older clients.
    pub image_url: Option<String>,
}

impl LineItem {
    #[must_use]
    pub fn new(
        branch_id: impl Into<String>,
        sku_id: impl Into<String>,
        kind: TransactionType,
        quantity_pieces: i64,
        date: impl Into<String>,
    ) -> Self {
        Self {
            branch_id: branch_id.into(),
            sku_id: sku_id.into(),
            kind,
            quantity_pieces,
            date: date.into(),
            image_urls: Vec::new(),
            image_url: None,
        }
    }

    #[must_use]
    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_urls.push(url.into());
        self
    }

    #[must_use]
    pub fn image_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn legacy_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

impl EvidenceSource for LineItem {
    fn image_urls(&self) -> &[String] {
        &self.image_urls
    }

    fn legacy_image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

/// Commit one user action as a batch of line items.
#[derive(Clone, Debug)]
pub struct CommitBatchCmd {
    pub lines: Vec<LineItem>,
    pub actor: Actor,
}

impl CommitBatchCmd {
    #[must_use]
    pub fn new(actor: Actor) -> Self {
        Self {
            lines: Vec::new(),
            actor,
        }
    }

    #[must_use]
    pub fn line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    #[must_use]
    pub fn lines(mut self, lines: impl IntoIterator<Item = LineItem>) -> Self {
        self.lines.extend(lines);
        self
    }
}

/// Result of a commit.
///
/// The batch is always applied to the local snapshot; `warning` carries the
/// persistence failure, if any.
#[derive(Debug)]
pub struct CommitReceipt {
    pub batch_id: String,
    pub timestamp: DateTime<Utc>,
    pub transaction_ids: Vec<Uuid>,
    pub warning: Option<EngineError>,
}

impl CommitReceipt {
    pub fn is_persisted(&self) -> bool {
        self.warning.is_none()
    }
}

/// Result of a soft delete.
#[derive(Debug)]
pub struct DeleteReceipt {
    /// Records stamped by this call; `0` when the batch was already deleted.
    pub stamped: usize,
    pub warning: Option<EngineError>,
}

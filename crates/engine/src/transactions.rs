//! Stock transaction primitives.
//!
//! A [`Transaction`] is one line item of a batch: a single stock movement of
//! one SKU for one branch. Records are immutable once written; the only
//! mutation ever applied is the soft-delete stamp (`deleted_at` /
//! `deleted_by`).

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evidence::normalize_evidence;
use crate::util::{from_millis, parse_uuid};
use crate::{EngineError, ResultEngine};

/// Kind of stock movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Stock entering the central store.
    Restock,
    /// Stock issued from the central store to a branch.
    CheckOut,
    /// Unused stock returned from a branch.
    CheckIn,
    Waste,
    /// Manual correction; the only kind with a signed quantity.
    Adjustment,
}

impl TransactionType {
    pub const ALL: [Self; 5] = [
        Self::Restock,
        Self::CheckOut,
        Self::CheckIn,
        Self::Waste,
        Self::Adjustment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restock => "RESTOCK",
            Self::CheckOut => "CHECK_OUT",
            Self::CheckIn => "CHECK_IN",
            Self::Waste => "WASTE",
            Self::Adjustment => "ADJUSTMENT",
        }
    }

    /// Kinds whose quantity carries a sign (positive = increase).
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Adjustment)
    }

    /// Kinds that take part in the date×branch checkout/return matching.
    pub fn is_reconciled(self) -> bool {
        matches!(self, Self::CheckOut | Self::CheckIn)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RESTOCK" => Ok(Self::Restock),
            "CHECK_OUT" => Ok(Self::CheckOut),
            "CHECK_IN" => Ok(Self::CheckIn),
            "WASTE" => Ok(Self::Waste),
            "ADJUSTMENT" => Ok(Self::Adjustment),
            other => Err(EngineError::Validation(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// Operational (business) date, kept as its canonical `YYYY-MM-DD` string.
///
/// Ordering is plain string ordering, which for canonical dates is calendar
/// ordering. Values read back from storage are kept verbatim even when they
/// do not parse, so legacy rows are never dropped from a view.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationalDate(String);

impl OperationalDate {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    /// Parses and canonicalizes a calendar date.
    pub fn parse(value: &str) -> ResultEngine<Self> {
        let trimmed = value.trim();
        let date = NaiveDate::parse_from_str(trimmed, Self::FORMAT).map_err(|_| {
            EngineError::Validation(format!("invalid date \"{trimmed}\": expected YYYY-MM-DD"))
        })?;
        Ok(Self::from(date))
    }

    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<NaiveDate> for OperationalDate {
    fn from(date: NaiveDate) -> Self {
        Self(date.format(Self::FORMAT).to_string())
    }
}

impl fmt::Display for OperationalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Largest absolute `quantity_pieces` a line may carry.
///
/// Keeps every batch and group total far from `i64` overflow.
pub const MAX_QUANTITY_PIECES: i64 = 1_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    /// Shared by every line of one commit; `None` only on legacy rows.
    pub batch_id: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub date: OperationalDate,
    pub branch_id: String,
    pub sku_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity_pieces: i64,
    pub image_urls: Vec<String>,
    pub user_id: String,
    pub user_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl Transaction {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Stamps the soft-delete fields. Existing stamps are never overwritten;
    /// returns whether the record changed.
    pub(crate) fn stamp_deleted(&mut self, at: DateTime<Utc>, by: &str) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.deleted_at = Some(at);
        self.deleted_by = Some(by.to_string());
        true
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stock_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub batch_id: Option<String>,
    /// Commit instant in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub date: String,
    pub branch_id: String,
    pub sku_id: String,
    #[sea_orm(column_name = "type")]
    pub kind: String,
    pub quantity_pieces: i64,
    /// JSON array of evidence URLs.
    pub image_urls: Option<String>,
    /// Deprecated single evidence URL written by older clients.
    pub image_url: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub deleted_at: Option<i64>,
    pub deleted_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        let image_urls = if tx.image_urls.is_empty() {
            None
        } else {
            serde_json::to_string(&tx.image_urls).ok()
        };
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            batch_id: ActiveValue::Set(tx.batch_id.clone()),
            timestamp: ActiveValue::Set(tx.timestamp.timestamp_millis()),
            date: ActiveValue::Set(tx.date.as_str().to_string()),
            branch_id: ActiveValue::Set(tx.branch_id.clone()),
            sku_id: ActiveValue::Set(tx.sku_id.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            quantity_pieces: ActiveValue::Set(tx.quantity_pieces),
            image_urls: ActiveValue::Set(image_urls),
            image_url: ActiveValue::Set(None),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            user_name: ActiveValue::Set(tx.user_name.clone()),
            deleted_at: ActiveValue::Set(tx.deleted_at.map(|at| at.timestamp_millis())),
            deleted_by: ActiveValue::Set(tx.deleted_by.clone()),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let stored_urls = match model.image_urls.as_deref() {
            Some(raw) => match serde_json::from_str::<Vec<String>>(raw) {
                Ok(urls) => urls,
                Err(err) => {
                    tracing::warn!("transaction {}: unreadable image_urls: {err}", model.id);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            batch_id: model.batch_id.filter(|id| !id.trim().is_empty()),
            timestamp: from_millis(model.timestamp, "timestamp")?,
            date: OperationalDate::from_stored(model.date),
            branch_id: model.branch_id,
            sku_id: model.sku_id,
            kind: TransactionType::try_from(model.kind.as_str())
                .map_err(|_| EngineError::InvalidRecord(format!("unknown type {}", model.kind)))?,
            quantity_pieces: model.quantity_pieces,
            image_urls: normalize_evidence(stored_urls, model.image_url),
            user_id: model.user_id,
            user_name: model.user_name,
            deleted_at: model
                .deleted_at
                .map(|ms| from_millis(ms, "deleted_at"))
                .transpose()?,
            deleted_by: model.deleted_by,
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stock movement, as it travels over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Restock,
    CheckOut,
    CheckIn,
    Waste,
    Adjustment,
}

/// Who is performing a write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorView {
    pub id: String,
    pub name: String,
    /// Checked by the server against the roles allowed to delete.
    #[serde(default)]
    pub role: String,
}

pub mod batch {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LineItemNew {
        pub branch_id: String,
        pub sku_id: String,
        #[serde(rename = "type")]
        pub kind: TransactionType,
        pub quantity_pieces: i64,
        /// Operational date, `YYYY-MM-DD`.
        pub date: String,
        #[serde(default)]
        pub image_urls: Vec<String>,
        /// Single evidence URL sent by older clients.
        pub image_url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CommitBatch {
        pub lines: Vec<LineItemNew>,
        pub actor: ActorView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BatchCommitted {
        pub batch_id: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        pub timestamp: DateTime<Utc>,
        pub transaction_ids: Vec<Uuid>,
        /// Set when the batch is only held locally.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub warning: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DeleteBatch {
        pub actor: ActorView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BatchDeleted {
        pub batch_id: String,
        /// Lines stamped by this call, `0` when the batch was already deleted.
        pub stamped: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub warning: Option<String>,
    }
}

pub mod view {
    use super::*;

    /// Query string of `/view` and `/archive`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ViewQuery {
        #[serde(rename = "type")]
        pub kind: Option<TransactionType>,
        pub branch_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RefreshResponse {
        pub records: usize,
    }
}

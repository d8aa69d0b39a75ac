//! Batch aggregation and checkout/return reconciliation.
//!
//! Everything here is a pure function of a transaction snapshot: views are
//! recomputed on every read and are never stored.
//!
//! The pipeline is:
//!
//! 1. partition line items by [`GroupKey`] into [`BatchSummary`]s,
//! 2. sort summaries by operational date, then commit timestamp (newest
//!    first),
//! 3. bucket `CHECK_OUT` / `CHECK_IN` summaries by `(date, branch)` and
//!    classify each bucket into a [`ReconciliationStatus`].
//!
//! Matching is presence-only: quantities are summed for display but never
//! compared.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{
    Catalog, EngineError, OperationalDate, Transaction, TransactionType,
    evidence::merge_evidence, util::normalize_id,
};

pub(crate) const LEGACY_PREFIX: &str = "legacy:";

/// Identity of a batch.
///
/// Rows written before batch ids existed are grouped by their commit
/// timestamp, branch and type instead.
///
/// The string form of a legacy key starts with `legacy:`. A stored batch id
/// that happens to start with the same prefix parses as a legacy key; use
/// [`crate::Ledger::delete_batch_id`], which falls back to the plain id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Batch(String),
    Legacy {
        timestamp_ms: i64,
        branch_id: String,
        kind: TransactionType,
    },
}

/// The single place where a record's batch identity is decided.
pub fn derive_group_key(tx: &Transaction) -> GroupKey {
    match &tx.batch_id {
        Some(batch_id) => GroupKey::Batch(batch_id.clone()),
        None => GroupKey::Legacy {
            timestamp_ms: tx.timestamp.timestamp_millis(),
            branch_id: tx.branch_id.clone(),
            kind: tx.kind,
        },
    }
}

impl GroupKey {
    pub fn batch_id(&self) -> Option<&str> {
        match self {
            Self::Batch(id) => Some(id),
            Self::Legacy { .. } => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch(id) => f.pad(id),
            Self::Legacy {
                timestamp_ms,
                branch_id,
                kind,
            } => write!(f, "{LEGACY_PREFIX}{timestamp_ms}:{branch_id}:{kind}"),
        }
    }
}

impl FromStr for GroupKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EngineError::Validation(
                "batch id must not be empty".to_string(),
            ));
        }
        let Some(rest) = s.strip_prefix(LEGACY_PREFIX) else {
            return Ok(Self::Batch(s.to_string()));
        };

        let invalid = || EngineError::Validation(format!("invalid legacy batch key: {s}"));
        let (timestamp, rest) = rest.split_once(':').ok_or_else(invalid)?;
        let (branch_id, kind) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if branch_id.is_empty() {
            return Err(invalid());
        }
        Ok(Self::Legacy {
            timestamp_ms: timestamp.parse().map_err(|_| invalid())?,
            branch_id: branch_id.to_string(),
            kind: TransactionType::try_from(kind).map_err(|_| invalid())?,
        })
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub transaction_id: Uuid,
    pub sku_id: String,
    pub sku_name: String,
    pub qty: i64,
}

/// One batch as presented to readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub group_key: GroupKey,
    pub date: OperationalDate,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub branch_id: String,
    pub branch_name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub items: Vec<BatchItem>,
    /// Signed sum of the line quantities.
    pub total_qty: i64,
    pub evidence: Vec<String>,
    pub user_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// At least one checkout and at least one return.
    Complete,
    /// Stock went out and nothing came back.
    MissingReturn,
    /// A return without any checkout on record.
    OnlyReturn,
}

impl ReconciliationStatus {
    /// `None` for an empty bucket, which never materializes as a group.
    pub fn classify(check_outs: usize, check_ins: usize) -> Option<Self> {
        match (check_outs > 0, check_ins > 0) {
            (true, true) => Some(Self::Complete),
            (true, false) => Some(Self::MissingReturn),
            (false, true) => Some(Self::OnlyReturn),
            (false, false) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::MissingReturn => "missing_return",
            Self::OnlyReturn => "only_return",
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// All checkout and return activity for one `(date, branch)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationGroup {
    pub date: OperationalDate,
    pub branch_id: String,
    pub branch_name: String,
    pub check_outs: Vec<BatchSummary>,
    pub check_ins: Vec<BatchSummary>,
    pub status: ReconciliationStatus,
    /// Informational only, never compared against `checked_in_qty`.
    pub checked_out_qty: i64,
    pub checked_in_qty: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub total: usize,
    pub complete: usize,
    pub missing_return: usize,
    pub only_return: usize,
}

impl ReconciliationSummary {
    pub fn from_groups(groups: &[ReconciliationGroup]) -> Self {
        groups.iter().fold(Self::default(), |mut acc, group| {
            acc.total += 1;
            match group.status {
                ReconciliationStatus::Complete => acc.complete += 1,
                ReconciliationStatus::MissingReturn => acc.missing_return += 1,
                ReconciliationStatus::OnlyReturn => acc.only_return += 1,
            }
            acc
        })
    }
}

/// Narrowing options for a view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewFilter {
    /// Keep only batches of this type.
    pub kind: Option<TransactionType>,
    /// Keep only this branch.
    pub branch_id: Option<String>,
}

impl ViewFilter {
    #[must_use]
    pub fn kind(mut self, kind: TransactionType) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn branch_id(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerView {
    pub batches: Vec<BatchSummary>,
    pub groups: Vec<ReconciliationGroup>,
}

impl LedgerView {
    pub fn summary(&self) -> ReconciliationSummary {
        ReconciliationSummary::from_groups(&self.groups)
    }
}

/// Build the ordered batch list and reconciliation groups for a snapshot.
///
/// With a `RESTOCK`/`WASTE`/`ADJUSTMENT` filter no grouping is attempted.
/// With a `CHECK_OUT`/`CHECK_IN` filter only that side is listed in
/// `batches`, but groups are still classified from both sides so a status
/// never depends on what is being displayed.
pub fn build_view(
    snapshot: &[Transaction],
    filter: &ViewFilter,
    catalog: &impl Catalog,
) -> LedgerView {
    let branch = filter
        .branch_id
        .as_deref()
        .map(normalize_id)
        .filter(|id| !id.is_empty());
    let in_scope = snapshot.iter().filter(|tx| {
        branch
            .as_deref()
            .is_none_or(|branch_id| tx.branch_id == branch_id)
    });

    let mut all = aggregate_batches(in_scope, catalog);
    sort_batches(&mut all);

    let groups = match filter.kind {
        Some(kind) if !kind.is_reconciled() => Vec::new(),
        _ => match_groups(&all, catalog),
    };

    let batches = match filter.kind {
        Some(kind) => all.into_iter().filter(|b| b.kind == kind).collect(),
        None => all,
    };

    LedgerView { batches, groups }
}

/// Partition line items by group key, keeping first-seen order of the keys
/// and of the lines inside each batch.
pub fn aggregate_batches<'a>(
    lines: impl IntoIterator<Item = &'a Transaction>,
    catalog: &impl Catalog,
) -> Vec<BatchSummary> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut partitions: Vec<(GroupKey, Vec<&Transaction>)> = Vec::new();

    for tx in lines {
        let key = derive_group_key(tx);
        match index.get(&key) {
            Some(&pos) => partitions[pos].1.push(tx),
            None => {
                index.insert(key.clone(), partitions.len());
                partitions.push((key, vec![tx]));
            }
        }
    }

    partitions
        .into_iter()
        .filter_map(|(key, lines)| summarize(key, &lines, catalog))
        .collect()
}

fn summarize(
    group_key: GroupKey,
    lines: &[&Transaction],
    catalog: &impl Catalog,
) -> Option<BatchSummary> {
    let head = lines.first()?;

    let items: Vec<BatchItem> = lines
        .iter()
        .map(|tx| BatchItem {
            transaction_id: tx.id,
            sku_id: tx.sku_id.clone(),
            sku_name: catalog.resolve_sku_name(&tx.sku_id),
            qty: tx.quantity_pieces,
        })
        .collect();
    let total_qty = saturating_total(items.iter().map(|item| item.qty));

    Some(BatchSummary {
        group_key,
        date: head.date.clone(),
        timestamp: head.timestamp,
        branch_id: head.branch_id.clone(),
        branch_name: catalog.resolve_branch_name(&head.branch_id),
        kind: head.kind,
        items,
        total_qty,
        evidence: merge_evidence(lines.iter().copied()),
        user_name: head.user_name.clone(),
        deleted_at: head.deleted_at,
        deleted_by: head.deleted_by.clone(),
    })
}

/// Display totals clamp at the `i64` bounds; stored rows are not bounded.
fn saturating_total(quantities: impl IntoIterator<Item = i64>) -> i64 {
    quantities.into_iter().fold(0, i64::saturating_add)
}

/// Newest operational date first, then newest commit first.
///
/// The final tie-break on the group key makes the order independent of the
/// snapshot order, so repeated recomputations render identically.
pub fn sort_batches(batches: &mut [BatchSummary]) {
    batches.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| b.group_key.cmp(&a.group_key))
    });
}

/// Bucket `CHECK_OUT`/`CHECK_IN` summaries by `(date, branch)` and classify.
///
/// `batches` should already be sorted; each side keeps that order.
pub fn match_groups(
    batches: &[BatchSummary],
    catalog: &impl Catalog,
) -> Vec<ReconciliationGroup> {
    type Sides = (Vec<BatchSummary>, Vec<BatchSummary>);
    let mut buckets: BTreeMap<(OperationalDate, String), Sides> = BTreeMap::new();

    for batch in batches.iter().filter(|b| b.kind.is_reconciled()) {
        let (outs, ins) = buckets
            .entry((batch.date.clone(), batch.branch_id.clone()))
            .or_default();
        match batch.kind {
            TransactionType::CheckOut => outs.push(batch.clone()),
            _ => ins.push(batch.clone()),
        }
    }

    let mut groups: Vec<ReconciliationGroup> = buckets
        .into_iter()
        .filter_map(|((date, branch_id), (check_outs, check_ins))| {
            let status = ReconciliationStatus::classify(check_outs.len(), check_ins.len())?;
            Some(ReconciliationGroup {
                branch_name: catalog.resolve_branch_name(&branch_id),
                checked_out_qty: saturating_total(check_outs.iter().map(|b| b.total_qty)),
                checked_in_qty: saturating_total(check_ins.iter().map(|b| b.total_qty)),
                date,
                branch_id,
                check_outs,
                check_ins,
                status,
            })
        })
        .collect();

    // BTreeMap yields branches ascending within a date; the stable sort keeps
    // that as the tie-break.
    groups.sort_by(|a, b| b.date.cmp(&a.date));
    groups
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{CatalogMap, NoCatalog};

    fn tx(
        batch: Option<&str>,
        ts: i64,
        date: &str,
        branch: &str,
        kind: TransactionType,
        qty: i64,
    ) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            batch_id: batch.map(ToString::to_string),
            timestamp: Utc.timestamp_millis_opt(ts).unwrap(),
            date: OperationalDate::parse(date).unwrap(),
            branch_id: branch.to_string(),
            sku_id: "s1".to_string(),
            kind,
            quantity_pieces: qty,
            image_urls: Vec::new(),
            user_id: "u1".to_string(),
            user_name: "Ada".to_string(),
            deleted_at: None,
            deleted_by: None,
        }
    }

    #[test]
    fn group_key_prefers_batch_id() {
        let with_batch = tx(Some("B1"), 10, "2024-01-01", "b1", TransactionType::Waste, 1);
        assert_eq!(derive_group_key(&with_batch), GroupKey::Batch("B1".into()));

        let legacy = tx(None, 10, "2024-01-01", "b1", TransactionType::Waste, 1);
        assert_eq!(
            derive_group_key(&legacy),
            GroupKey::Legacy {
                timestamp_ms: 10,
                branch_id: "b1".into(),
                kind: TransactionType::Waste
            }
        );
    }

    #[test]
    fn group_key_string_form_parses_back() {
        let legacy = GroupKey::Legacy {
            timestamp_ms: 1_700_000_000_000,
            branch_id: "north:2".into(),
            kind: TransactionType::CheckOut,
        };
        let rendered = legacy.to_string();
        assert_eq!(rendered, "legacy:1700000000000:north:2:CHECK_OUT");
        assert_eq!(rendered.parse::<GroupKey>().unwrap(), legacy);
        assert_eq!(
            "abc-123".parse::<GroupKey>().unwrap(),
            GroupKey::Batch("abc-123".into())
        );
        assert!("legacy:notanumber:b1:WASTE".parse::<GroupKey>().is_err());
        assert!("".parse::<GroupKey>().is_err());
    }

    #[test]
    fn aggregation_sums_signed_quantities() {
        let lines = vec![
            tx(Some("A"), 5, "2024-01-01", "b1", TransactionType::Adjustment, 7),
            tx(Some("A"), 5, "2024-01-01", "b1", TransactionType::Adjustment, -10),
        ];
        let batches = aggregate_batches(&lines, &NoCatalog);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].total_qty, -3);
        assert_eq!(batches[0].items.len(), 2);
    }

    #[test]
    fn oversized_stored_quantities_saturate() {
        let lines = vec![
            tx(Some("B"), 5, "2024-01-01", "b1", TransactionType::CheckOut, i64::MAX),
            tx(Some("B"), 5, "2024-01-01", "b1", TransactionType::CheckOut, 1),
            tx(Some("C"), 6, "2024-01-01", "b1", TransactionType::CheckOut, 1),
        ];
        let view = build_view(&lines, &ViewFilter::default(), &NoCatalog);
        assert_eq!(view.batches.len(), 2);
        let big = view
            .batches
            .iter()
            .find(|b| b.group_key == GroupKey::Batch("B".into()))
            .unwrap();
        assert_eq!(big.total_qty, i64::MAX);
        assert_eq!(view.groups[0].checked_out_qty, i64::MAX);
    }

    #[test]
    fn legacy_rows_group_by_composite_key() {
        let lines = vec![
            tx(None, 5, "2024-01-01", "b1", TransactionType::Restock, 1),
            tx(None, 5, "2024-01-01", "b1", TransactionType::Restock, 2),
            tx(None, 5, "2024-01-01", "b2", TransactionType::Restock, 3),
            tx(None, 6, "2024-01-01", "b1", TransactionType::Restock, 4),
        ];
        let batches = aggregate_batches(&lines, &NoCatalog);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].total_qty, 3);
    }

    #[test]
    fn sort_is_date_then_timestamp_descending() {
        let lines = vec![
            tx(Some("old-day-late"), 900, "2024-01-01", "b1", TransactionType::Waste, 1),
            tx(Some("new-day-early"), 100, "2024-01-02", "b1", TransactionType::Waste, 1),
            tx(Some("old-day-early"), 200, "2024-01-01", "b1", TransactionType::Waste, 1),
        ];
        let view = build_view(&lines, &ViewFilter::default(), &NoCatalog);
        let keys: Vec<String> = view.batches.iter().map(|b| b.group_key.to_string()).collect();
        assert_eq!(keys, vec!["new-day-early", "old-day-late", "old-day-early"]);
    }

    #[test]
    fn order_does_not_depend_on_snapshot_order() {
        let mut lines = vec![
            tx(Some("x"), 100, "2024-01-01", "b1", TransactionType::Waste, 1),
            tx(Some("y"), 100, "2024-01-01", "b1", TransactionType::Waste, 1),
            tx(Some("z"), 100, "2024-01-01", "b2", TransactionType::CheckOut, 1),
        ];
        let first = build_view(&lines, &ViewFilter::default(), &NoCatalog);
        lines.reverse();
        let second = build_view(&lines, &ViewFilter::default(), &NoCatalog);
        assert_eq!(first, second);
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            ReconciliationStatus::classify(2, 1),
            Some(ReconciliationStatus::Complete)
        );
        assert_eq!(
            ReconciliationStatus::classify(1, 0),
            Some(ReconciliationStatus::MissingReturn)
        );
        assert_eq!(
            ReconciliationStatus::classify(0, 3),
            Some(ReconciliationStatus::OnlyReturn)
        );
        assert_eq!(ReconciliationStatus::classify(0, 0), None);
    }

    #[test]
    fn groups_match_on_date_and_branch_only() {
        let lines = vec![
            tx(Some("o1"), 1, "2024-05-01", "b1", TransactionType::CheckOut, 10),
            tx(Some("o2"), 2, "2024-05-01", "b1", TransactionType::CheckOut, 4),
            tx(Some("i1"), 3, "2024-05-01", "b1", TransactionType::CheckIn, 8),
            tx(Some("o3"), 4, "2024-05-01", "b2", TransactionType::CheckOut, 5),
            tx(Some("i2"), 5, "2024-05-02", "b2", TransactionType::CheckIn, 5),
            tx(Some("r1"), 6, "2024-05-02", "b2", TransactionType::Restock, 50),
        ];
        let catalog = CatalogMap::default().branch("b1", "Downtown");
        let view = build_view(&lines, &ViewFilter::default(), &catalog);

        assert_eq!(view.batches.len(), 6);
        assert_eq!(view.groups.len(), 3);

        let g = &view.groups[0];
        assert_eq!((g.date.as_str(), g.branch_id.as_str()), ("2024-05-02", "b2"));
        assert_eq!(g.status, ReconciliationStatus::OnlyReturn);

        let g = &view.groups[1];
        assert_eq!((g.date.as_str(), g.branch_id.as_str()), ("2024-05-01", "b1"));
        assert_eq!(g.status, ReconciliationStatus::Complete);
        assert_eq!(g.branch_name, "Downtown");
        assert_eq!(g.check_outs.len(), 2);
        assert_eq!((g.checked_out_qty, g.checked_in_qty), (14, 8));

        let g = &view.groups[2];
        assert_eq!(g.status, ReconciliationStatus::MissingReturn);
        assert_eq!(g.branch_name, "b2");

        let summary = view.summary();
        assert_eq!(
            summary,
            ReconciliationSummary {
                total: 3,
                complete: 1,
                missing_return: 1,
                only_return: 1
            }
        );
    }

    #[test]
    fn ungrouped_type_filter_skips_grouping() {
        let lines = vec![
            tx(Some("o1"), 1, "2024-05-01", "b1", TransactionType::CheckOut, 10),
            tx(Some("w1"), 2, "2024-05-01", "b1", TransactionType::Waste, 2),
            tx(Some("w2"), 3, "2024-05-02", "b1", TransactionType::Waste, 1),
        ];
        let view = build_view(
            &lines,
            &ViewFilter::default().kind(TransactionType::Waste),
            &NoCatalog,
        );
        assert!(view.groups.is_empty());
        let keys: Vec<String> = view.batches.iter().map(|b| b.group_key.to_string()).collect();
        assert_eq!(keys, vec!["w2", "w1"]);
    }

    #[test]
    fn checkout_filter_keeps_truthful_status() {
        let lines = vec![
            tx(Some("o1"), 1, "2024-05-01", "b1", TransactionType::CheckOut, 10),
            tx(Some("i1"), 2, "2024-05-01", "b1", TransactionType::CheckIn, 3),
        ];
        let view = build_view(
            &lines,
            &ViewFilter::default().kind(TransactionType::CheckOut),
            &NoCatalog,
        );
        assert_eq!(view.batches.len(), 1);
        assert_eq!(view.batches[0].kind, TransactionType::CheckOut);
        assert_eq!(view.groups[0].status, ReconciliationStatus::Complete);
    }

    #[test]
    fn branch_filter_narrows_everything() {
        let lines = vec![
            tx(Some("o1"), 1, "2024-05-01", "b1", TransactionType::CheckOut, 10),
            tx(Some("o2"), 2, "2024-05-01", "b2", TransactionType::CheckOut, 3),
        ];
        let view = build_view(&lines, &ViewFilter::default().branch_id("b2"), &NoCatalog);
        assert_eq!(view.batches.len(), 1);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].branch_id, "b2");
    }

    #[test]
    fn branch_filter_is_normalized_like_stored_ids() {
        let lines = vec![
            tx(Some("o1"), 1, "2024-05-01", "caf\u{00e9}", TransactionType::CheckOut, 10),
            tx(Some("o2"), 2, "2024-05-01", "b2", TransactionType::CheckOut, 3),
        ];
        let decomposed = ViewFilter::default().branch_id(" caf\u{0065}\u{0301} ");
        let view = build_view(&lines, &decomposed, &NoCatalog);
        assert_eq!(view.batches.len(), 1);
        assert_eq!(view.batches[0].branch_id, "caf\u{00e9}");

        let blank = build_view(&lines, &ViewFilter::default().branch_id("  "), &NoCatalog);
        assert_eq!(blank.batches.len(), 2);
    }
}

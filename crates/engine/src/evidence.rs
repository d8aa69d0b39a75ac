//! Photographic evidence attached to line items.
//!
//! Older clients wrote a single `imageUrl` per line, newer ones an ordered
//! `imageUrls` list. Both shapes are folded into one list at the ingestion
//! boundary ([`normalize_evidence`]); everything downstream only ever sees
//! `Vec<String>`.

use std::collections::HashSet;

/// Anything carrying evidence URLs: stored transactions and incoming lines.
pub trait EvidenceSource {
    fn image_urls(&self) -> &[String];

    /// Deprecated single-URL field, if the source still has one.
    fn legacy_image_url(&self) -> Option<&str> {
        None
    }
}

impl EvidenceSource for crate::Transaction {
    fn image_urls(&self) -> &[String] {
        &self.image_urls
    }
}

/// Fold the list and legacy shapes of a single line into one canonical list.
pub fn normalize_evidence(image_urls: Vec<String>, legacy: Option<String>) -> Vec<String> {
    dedup_in_order(image_urls.into_iter().chain(legacy))
}

/// Union the evidence of every line of one batch, in first-appearance order
/// without exact-string duplicates.
pub fn merge_evidence<'a, T, I>(lines: I) -> Vec<String>
where
    T: EvidenceSource + 'a,
    I: IntoIterator<Item = &'a T>,
{
    dedup_in_order(lines.into_iter().flat_map(|line| {
        line.image_urls()
            .iter()
            .map(String::as_str)
            .chain(line.legacy_image_url())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    }))
}

fn dedup_in_order(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| !url.trim().is_empty())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line {
        urls: Vec<String>,
        legacy: Option<String>,
    }

    impl EvidenceSource for Line {
        fn image_urls(&self) -> &[String] {
            &self.urls
        }

        fn legacy_image_url(&self) -> Option<&str> {
            self.legacy.as_deref()
        }
    }

    fn line(urls: &[&str], legacy: Option<&str>) -> Line {
        Line {
            urls: urls.iter().map(ToString::to_string).collect(),
            legacy: legacy.map(ToString::to_string),
        }
    }

    #[test]
    fn merge_keeps_first_appearance_order() {
        let lines = [line(&["A", "B"], None), line(&["B", "C"], None)];
        assert_eq!(merge_evidence(&lines), vec!["A", "B", "C"]);
    }

    #[test]
    fn merge_folds_legacy_field() {
        let lines = [line(&["A"], Some("L")), line(&[], Some("A"))];
        assert_eq!(merge_evidence(&lines), vec!["A", "L"]);
    }

    #[test]
    fn merge_drops_blank_urls_and_keeps_case_sensitive_duplicates() {
        let lines = [line(&["", "a", "A", "  "], None)];
        assert_eq!(merge_evidence(&lines), vec!["a", "A"]);
    }

    #[test]
    fn merge_reads_incoming_line_items() {
        use crate::{LineItem, TransactionType};

        let lines = [
            LineItem::new("b1", "s1", TransactionType::CheckIn, 1, "2024-05-01")
                .image_urls(["A", "B"]),
            LineItem::new("b1", "s2", TransactionType::CheckIn, 1, "2024-05-01")
                .image_url("C")
                .legacy_image_url("B"),
            LineItem::new("b1", "s3", TransactionType::CheckIn, 1, "2024-05-01")
                .legacy_image_url("D"),
        ];
        assert_eq!(merge_evidence(&lines), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn normalize_appends_legacy_once() {
        assert_eq!(
            normalize_evidence(vec!["x".into(), "y".into()], Some("x".into())),
            vec!["x", "y"]
        );
        assert!(normalize_evidence(Vec::new(), None).is_empty());
    }
}

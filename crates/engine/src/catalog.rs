//! Reference data supplied by the catalog collaborators.
//!
//! The ledger only needs display names. A miss never fails: the raw id is
//! used as the label.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub trait Catalog {
    fn sku_name(&self, sku_id: &str) -> Option<String>;

    fn branch_name(&self, branch_id: &str) -> Option<String>;

    fn resolve_sku_name(&self, sku_id: &str) -> String {
        self.sku_name(sku_id).unwrap_or_else(|| sku_id.to_string())
    }

    fn resolve_branch_name(&self, branch_id: &str) -> String {
        self.branch_name(branch_id)
            .unwrap_or_else(|| branch_id.to_string())
    }
}

/// A catalog that knows nothing; every label falls back to the raw id.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCatalog;

impl Catalog for NoCatalog {
    fn sku_name(&self, _sku_id: &str) -> Option<String> {
        None
    }

    fn branch_name(&self, _branch_id: &str) -> Option<String> {
        None
    }
}

/// In-memory catalog, usually loaded from settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogMap {
    pub skus: HashMap<String, String>,
    pub branches: HashMap<String, String>,
}

impl CatalogMap {
    #[must_use]
    pub fn sku(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.skus.insert(id.into(), name.into());
        self
    }

    #[must_use]
    pub fn branch(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.branches.insert(id.into(), name.into());
        self
    }
}

impl Catalog for CatalogMap {
    fn sku_name(&self, sku_id: &str) -> Option<String> {
        self.skus.get(sku_id).cloned()
    }

    fn branch_name(&self, branch_id: &str) -> Option<String> {
        self.branches.get(branch_id).cloned()
    }
}

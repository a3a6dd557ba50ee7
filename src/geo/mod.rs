mod catalog;
pub mod dat;
pub mod updater;

pub use catalog::{DatCatalog, GeoCatalog, MemoryCatalog, NilCatalog};
pub use updater::{refresh_catalog_file, CatalogUpdater, DEFAULT_UPDATE_INTERVAL};

use crate::types::MatchKind;

/// One decoded geosite entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    pub kind: MatchKind,
    pub value: String,
}

impl DomainRule {
    pub fn new(kind: MatchKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

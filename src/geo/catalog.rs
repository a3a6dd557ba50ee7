use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ipnet::IpNet;

use super::{dat, DomainRule};
use crate::error::{CatalogErrorKind, HubError, Result};
use crate::types::normalize_tag;

/// Source of geographic CIDR and domain entries keyed by country/region code.
///
/// Returned maps are keyed by uppercased code. An empty `tags` slice selects
/// every code in the catalog.
pub trait GeoCatalog: Send + Sync {
    fn load_cidrs(&self, tags: &[String]) -> Result<HashMap<String, Vec<IpNet>>>;

    fn load_domains(&self, tags: &[String]) -> Result<HashMap<String, Vec<DomainRule>>>;
}

/// Catalog backed by V2Ray DAT files on disk.
///
/// Files are decoded on every call so a refreshed file is picked up by the
/// next reload.
#[derive(Debug, Clone, Default)]
pub struct DatCatalog {
    geoip_path: Option<PathBuf>,
    geosite_path: Option<PathBuf>,
}

impl DatCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the geoip.dat path
    pub fn with_geoip_path(mut self, path: impl AsRef<Path>) -> Self {
        self.geoip_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the geosite.dat path
    pub fn with_geosite_path(mut self, path: impl AsRef<Path>) -> Self {
        self.geosite_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn geoip_path(&self) -> Option<&Path> {
        self.geoip_path.as_deref()
    }

    pub fn geosite_path(&self) -> Option<&Path> {
        self.geosite_path.as_deref()
    }
}

impl GeoCatalog for DatCatalog {
    fn load_cidrs(&self, tags: &[String]) -> Result<HashMap<String, Vec<IpNet>>> {
        let path = self.geoip_path.as_ref().ok_or_else(|| {
            HubError::catalog(CatalogErrorKind::NotConfigured, "GeoIP path not configured")
        })?;
        dat::load_geoip(path, tags)
    }

    fn load_domains(&self, tags: &[String]) -> Result<HashMap<String, Vec<DomainRule>>> {
        let path = self.geosite_path.as_ref().ok_or_else(|| {
            HubError::catalog(CatalogErrorKind::NotConfigured, "GeoSite path not configured")
        })?;
        dat::load_geosite(path, tags)
    }
}

/// Catalog with nothing configured; every load fails with `NotConfigured`
#[derive(Debug, Clone, Copy, Default)]
pub struct NilCatalog;

impl GeoCatalog for NilCatalog {
    fn load_cidrs(&self, tags: &[String]) -> Result<HashMap<String, Vec<IpNet>>> {
        Err(HubError::catalog(
            CatalogErrorKind::NotConfigured,
            format!("GeoIP not available (requested: {:?})", tags),
        ))
    }

    fn load_domains(&self, tags: &[String]) -> Result<HashMap<String, Vec<DomainRule>>> {
        Err(HubError::catalog(
            CatalogErrorKind::NotConfigured,
            format!("GeoSite not available (requested: {:?})", tags),
        ))
    }
}

/// In-memory catalog for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    cidrs: HashMap<String, Vec<IpNet>>,
    domains: HashMap<String, Vec<DomainRule>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geoip(&mut self, code: &str, cidrs: Vec<IpNet>) {
        self.cidrs.insert(normalize_tag(code), cidrs);
    }

    pub fn add_geosite(&mut self, code: &str, rules: Vec<DomainRule>) {
        self.domains.insert(normalize_tag(code), rules);
    }
}

fn select<T: Clone>(map: &HashMap<String, Vec<T>>, tags: &[String]) -> HashMap<String, Vec<T>> {
    if tags.is_empty() {
        return map.clone();
    }
    tags.iter()
        .map(|t| normalize_tag(t))
        .filter_map(|code| map.get(&code).map(|v| (code, v.clone())))
        .collect()
}

impl GeoCatalog for MemoryCatalog {
    fn load_cidrs(&self, tags: &[String]) -> Result<HashMap<String, Vec<IpNet>>> {
        Ok(select(&self.cidrs, tags))
    }

    fn load_domains(&self, tags: &[String]) -> Result<HashMap<String, Vec<DomainRule>>> {
        Ok(select(&self.domains, tags))
    }
}

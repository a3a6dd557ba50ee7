//! DataHub - tag-based rule tables and geographic sets for DNS pipelines
//!
//! This library classifies DNS query names and client addresses against
//! named rule sets ("tags"):
//! - Keyword tables (substring match)
//! - Domain tables (full, suffix and regex rules)
//! - Netlist tables (CIDR sets with binary search)
//! - ECS tables (client address or range to substitute address)
//! - GeoIP/GeoSite sets decoded from V2Ray `geoip.dat` / `geosite.dat`
//! - Hot reload from files and URLs with change detection
//! - TTL + LRU memoization of mixed matches
//!
//! # Example
//!
//! ```rust
//! use datahub_r::{DataHub, MatchKind, TableKind, TableSpec};
//!
//! let hub = DataHub::new();
//! hub.add_table(&TableSpec {
//!     kind: TableKind::Netlist,
//!     tags: vec!["lan".to_string()],
//!     from: "LAN 10.0.0.0/24 192.168.0.0/16".to_string(),
//! });
//! hub.add_table(&TableSpec {
//!     kind: TableKind::Domain,
//!     tags: vec!["ads".to_string()],
//!     from: "ADS:domain:doubleclick.net ADS:regex:^ads\\.".to_string(),
//! });
//!
//! assert!(hub.match_custom_net_str("lan", "10.0.0.5"));
//! assert!(!hub.match_custom_net_str("lan", "10.0.1.5"));
//! assert!(hub.match_mixed("ads", "ad.doubleclick.net"));
//! assert!(hub.match_mixed("ADS", "ads.example.com"));
//! assert!(!hub.match_geosite(MatchKind::Regex, "ads", "ads.example.com"));
//! ```
//!
//! # Table sources
//!
//! A table's `from` is classified as:
//!
//! | Form | Example | Source |
//! |------|---------|--------|
//! | URL | `https://example.com/ads.txt` | fetched, change detected by SHA-256 |
//! | File | `/etc/datahub/ads.txt` | read, change detected by mtime + size |
//! | Inline | `ADS:domain:doubleclick.net`, `ADS doubleclick tracker` | whitespace separated rule lines, must open with the tag |
//!
//! Anything else is taken as a file path; a missing file is reported by the
//! first load and picked up by a later reload.
//!
//! ## Rule lines
//!
//! - keyword: `word` or `TAG word`
//! - domain: `example.com` or `TAG:full|domain|regex:value`
//! - netlist: `10.0.0.0/8`, `10.0.0.1`, `TAG:10.0.0.0/8`, `TAG:2001:db8::/32`
//! - ecs: `TAG:ip:<addr>:<ecs-ip>` or `TAG:cidr:<cidr>[,<cidr>...]:<ecs-ip>`
//!
//! Text after `#` is a comment. Lines for another tag are ignored.

pub mod config;
pub mod error;
pub mod geo;
pub mod hub;
pub mod matcher;
#[cfg(feature = "async")]
pub mod reload;
pub mod stats;
pub mod table;
pub mod types;

// Re-export commonly used items
pub use config::{parse_manifest, parse_manifest_lenient, HubOptions, TableSpec};
pub use error::{CatalogErrorKind, HubError, Result};
pub use geo::{
    CatalogUpdater, DatCatalog, DomainRule, GeoCatalog, MemoryCatalog, NilCatalog,
    DEFAULT_UPDATE_INTERVAL,
};
pub use hub::{
    DataHub, MatchCache, ReloadSummary, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL,
    DEFAULT_LIST_LIMIT,
};
pub use matcher::{DomainList, EcsData, KeywordList, NetList};
pub use stats::{
    Counter, CounterStats, StatsSink, METRIC_DNS_QUERY, METRIC_ECS_HITS,
    METRIC_NXDOMAIN,
};
pub use table::{
    DataTable, Fetcher, HttpFetcher, NilFetcher, ReloadOutcome, RuleData, Source,
    DEFAULT_FETCH_TIMEOUT,
};
pub use types::{
    normalize_tag, parse_net, Classification, ListKind, MatchKind, ReloadRequest, TableKind,
};

#[cfg(feature = "async")]
pub use reload::ReloadDriver;

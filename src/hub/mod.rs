//! Match orchestrator.
//!
//! [`DataHub`] owns one [`TableRegistry`] per rule kind, the geographic
//! CIDR and domain sets, the match cache and the counters. Every query
//! method is infallible: an unknown tag or an unparsable address is a
//! plain "no match".

mod cache;
mod registry;

pub use cache::{MatchCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
pub use registry::{GeoSets, TableRegistry};

use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ipnet::IpNet;
use serde::Serialize;

use crate::config::{is_url, parse_manifest_lenient, HubOptions, TableSpec};
use crate::error::{HubError, Result};
use crate::geo::{CatalogUpdater, DatCatalog, GeoCatalog, NilCatalog};
use crate::matcher::{DomainList, NetList};
use crate::stats::{Counter, CounterStats, StatsSink, METRIC_DNS_QUERY, METRIC_ECS_HITS};
use crate::table::{DataTable, Fetcher, HttpFetcher, ReloadOutcome, RuleData, DEFAULT_FETCH_TIMEOUT};
use crate::types::{
    normalize_tag, parse_net, Classification, ListKind, MatchKind, ReloadRequest, TableKind,
};

/// Entries returned by [`DataHub::list_entries`] when no limit is given
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// Tally of one reload pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub reloaded: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ReloadSummary {
    pub fn record(&mut self, result: &Result<ReloadOutcome>) {
        match result {
            Ok(ReloadOutcome::Reloaded { .. }) => self.reloaded += 1,
            Ok(ReloadOutcome::Unchanged) | Ok(ReloadOutcome::Static) => self.unchanged += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: ReloadSummary) {
        self.reloaded += other.reloaded;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// Tag-based matching engine over custom rule tables and geographic sets.
pub struct DataHub {
    keyword: TableRegistry,
    domain: TableRegistry,
    netlist: TableRegistry,
    ecs: TableRegistry,
    geoip: GeoSets<NetList>,
    geosite: GeoSets<DomainList>,
    cache: MatchCache,
    stats: CounterStats,
    sink: Option<Arc<dyn StatsSink>>,
    catalog: Arc<dyn GeoCatalog>,
    fetcher: Arc<dyn Fetcher>,
    updater: Option<CatalogUpdater>,
    geoip_tags: Vec<String>,
    geosite_tags: Vec<String>,
    fetch_timeout: Duration,
}

impl DataHub {
    /// Empty hub: no tables, no catalog, HTTP fetcher, default cache.
    pub fn new() -> Self {
        Self {
            keyword: TableRegistry::new(TableKind::Keyword),
            domain: TableRegistry::new(TableKind::Domain),
            netlist: TableRegistry::new(TableKind::Netlist),
            ecs: TableRegistry::new(TableKind::Ecs),
            geoip: GeoSets::new(),
            geosite: GeoSets::new(),
            cache: MatchCache::default(),
            stats: CounterStats::new(),
            sink: None,
            catalog: Arc::new(NilCatalog),
            fetcher: Arc::new(HttpFetcher::new()),
            updater: None,
            geoip_tags: Vec::new(),
            geosite_tags: Vec::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Build a hub from validated options.
    ///
    /// Tables are registered and loaded; a table that fails to load stays
    /// registered and empty. Failing to load the configured geographic
    /// caches is fatal.
    pub fn from_options(options: &HubOptions) -> Result<Self> {
        Self::from_options_with_fetcher(options, Arc::new(HttpFetcher::new()))
    }

    /// [`DataHub::from_options`] with a caller-supplied fetcher
    pub fn from_options_with_fetcher(options: &HubOptions, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        options.validate()?;

        let mut catalog = DatCatalog::new();
        if let Some(path) = &options.geoip_path {
            catalog = catalog.with_geoip_path(path);
        }
        if let Some(path) = &options.geosite_path {
            catalog = catalog.with_geosite_path(path);
        }

        let mut updater = CatalogUpdater::new();
        match (&options.geoip_upgrade_url, &options.geoip_path) {
            (Some(url), Some(path)) => updater = updater.with_geoip(path, url),
            (Some(_), None) => {
                return Err(HubError::Config("geoip_upgrade_url requires geoip_path".into()))
            }
            _ => {}
        }
        match (&options.geosite_upgrade_url, &options.geosite_path) {
            (Some(url), Some(path)) => updater = updater.with_geosite(path, url),
            (Some(_), None) => {
                return Err(HubError::Config("geosite_upgrade_url requires geosite_path".into()))
            }
            _ => {}
        }

        let mut hub = Self::new()
            .with_catalog(Arc::new(catalog))
            .with_fetcher(fetcher)
            .with_cache(options.cache_capacity, options.cache_ttl())
            .with_fetch_timeout(options.fetch_timeout())
            .with_geo_tags(options.geoip_cache.clone(), options.geosite_cache.clone());
        if updater.is_configured() {
            hub = hub.with_updater(updater);
        }

        if let Some(updater) = &hub.updater {
            if let Err(e) = updater.refresh(hub.fetcher.as_ref(), hub.fetch_timeout, false) {
                log::error!("geo catalog refresh failed: {}", e);
            }
        }
        if !hub.geoip_tags.is_empty() {
            hub.load_geoip_sets()?;
        }
        if !hub.geosite_tags.is_empty() {
            hub.load_geosite_sets()?;
        }

        for spec in &options.tables {
            hub.add_table(spec);
        }
        if let Some(manifest) = &options.datatables {
            for spec in hub.read_manifest(manifest)? {
                hub.add_table(&spec);
            }
        }

        Ok(hub)
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn GeoCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Forward every counter increment to `sink` as well
    pub fn with_stats_sink(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.cache = MatchCache::new(capacity, ttl);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Codes kept in memory by [`DataHub::reload_geo`]
    pub fn with_geo_tags(mut self, geoip: Vec<String>, geosite: Vec<String>) -> Self {
        self.geoip_tags = geoip.iter().map(|t| normalize_tag(t)).collect();
        self.geosite_tags = geosite.iter().map(|t| normalize_tag(t)).collect();
        self
    }

    pub fn with_updater(mut self, updater: CatalogUpdater) -> Self {
        self.updater = Some(updater);
        self
    }

    fn read_manifest(&self, from: &str) -> Result<Vec<TableSpec>> {
        let text = if is_url(from) {
            let body = self.fetcher.fetch(from, self.fetch_timeout)?;
            String::from_utf8_lossy(&body).into_owned()
        } else if Path::new(from).is_file() {
            fs::read_to_string(from)?
        } else {
            log::info!("datatables {} is neither a url nor a file, skipped", from);
            return Ok(Vec::new());
        };
        Ok(parse_manifest_lenient(&text))
    }

    // ---- registries ----

    pub fn registry(&self, kind: TableKind) -> &TableRegistry {
        match kind {
            TableKind::Keyword => &self.keyword,
            TableKind::Domain => &self.domain,
            TableKind::Netlist => &self.netlist,
            TableKind::Ecs => &self.ecs,
        }
    }

    pub fn table(&self, kind: TableKind, tag: &str) -> Option<Arc<DataTable>> {
        self.registry(kind).get(&normalize_tag(tag))
    }

    /// Register one table per tag of `spec` and run its first load.
    ///
    /// A failed load is logged; the table stays registered, empty, and is
    /// retried by the next reload.
    pub fn add_table(&self, spec: &TableSpec) -> Vec<Arc<DataTable>> {
        let mut added = Vec::new();
        for tag in spec.tags.iter().filter(|t| !t.trim().is_empty()) {
            let table = Arc::new(DataTable::from_args(spec.kind, tag, &spec.from));
            if let Err(e) = table.load(self.fetcher.as_ref(), self.fetch_timeout) {
                log::error!("{} {}: initial load failed: {}", spec.kind, table.tag(), e);
            }
            log::info!("{} {} total {}", spec.kind, table.tag(), table.len());
            self.registry(spec.kind).insert(Arc::clone(&table));
            added.push(table);
        }
        added
    }

    /// Register an already built table
    pub fn insert_table(&self, table: Arc<DataTable>) {
        self.registry(table.kind()).insert(table);
    }

    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    pub fn stats(&self) -> &CounterStats {
        &self.stats
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    fn count(&self, classification: Classification, name: &str) {
        self.stats.increment(classification, name, 1);
        if let Some(sink) = &self.sink {
            sink.increment(classification, name, 1);
        }
    }

    // ---- network matching ----

    /// Geographic CIDR set of `tag` covers `ip`
    pub fn match_geoip(&self, tag: &str, ip: IpAddr) -> bool {
        self.match_geo_net(tag, &IpNet::from(ip))
    }

    /// Geographic CIDR set of `tag` covers `net`
    pub fn match_geo_net(&self, tag: &str, net: &IpNet) -> bool {
        let tag = normalize_tag(tag);
        if self.geoip.get(&tag).is_some_and(|set| set.contains(net)) {
            self.count(Classification::Network, &tag);
            return true;
        }
        false
    }

    /// Custom netlist table of `tag` covers `net`
    pub fn match_custom_net(&self, tag: &str, net: &IpNet) -> bool {
        let tag = normalize_tag(tag);
        if self.custom_net(&tag, net) {
            self.count(Classification::Network, &tag);
            return true;
        }
        false
    }

    pub fn match_custom_net_str(&self, tag: &str, net: &str) -> bool {
        parse_net(net).is_some_and(|net| self.match_custom_net(tag, &net))
    }

    /// Custom netlist table first, then the geographic CIDR set
    pub fn match_mixed_net(&self, tag: &str, net: &IpNet) -> bool {
        let tag = normalize_tag(tag);
        let hit = self.custom_net(&tag, net)
            || self.geoip.get(&tag).is_some_and(|set| set.contains(net));
        if hit {
            self.count(Classification::Network, &tag);
        }
        hit
    }

    pub fn match_mixed_net_str(&self, tag: &str, net: &str) -> bool {
        parse_net(net).is_some_and(|net| self.match_mixed_net(tag, &net))
    }

    fn custom_net(&self, tag: &str, net: &IpNet) -> bool {
        self.netlist.get(tag).is_some_and(|table| table.match_net(net))
    }

    // ---- name matching ----

    /// Geographic domain set of `tag` with an explicit match kind
    pub fn match_geosite(&self, kind: MatchKind, tag: &str, name: &str) -> bool {
        let tag = normalize_tag(tag);
        if self.geosite.get(&tag).is_some_and(|set| set.match_kind(kind, name)) {
            self.count(Classification::Domain, &tag);
            return true;
        }
        false
    }

    /// Keyword table of `tag` has a word contained in `name`
    pub fn match_keyword(&self, tag: &str, name: &str) -> bool {
        let tag = normalize_tag(tag);
        if self.keyword.get(&tag).is_some_and(|table| table.match_name(name)) {
            self.count(Classification::Keyword, &tag);
            return true;
        }
        false
    }

    /// Substitute address bound to `client` in the ECS table of `tag`
    pub fn match_ecs(&self, tag: &str, client: &str) -> Option<IpAddr> {
        let table = self.ecs.get(&normalize_tag(tag))?;
        let ip = match table.data().as_ref() {
            RuleData::Ecs(data) => data.resolve(client)?,
            _ => return None,
        };
        self.count(Classification::Metrics, METRIC_ECS_HITS);
        Some(ip)
    }

    /// Domain table, then keyword table, then geographic domain set.
    ///
    /// A hit is memoized per (tag, name) with the classification that
    /// fired; a memoized hit counts against that same classification.
    pub fn match_mixed(&self, tag: &str, name: &str) -> bool {
        self.mixed(&normalize_tag(tag), name)
    }

    /// [`DataHub::match_mixed`] over `tags` in order, stopping at the first
    /// match. With `reverse` the decision is negated and every tag that did
    /// not match counts against the domain counter `!TAG`.
    pub fn match_mixed_tags<S: AsRef<str>>(&self, tags: &[S], name: &str, reverse: bool) -> bool {
        if tags.is_empty() {
            return false;
        }
        let start = Instant::now();
        let mut matched = false;
        for tag in tags {
            let tag = normalize_tag(tag.as_ref());
            if self.mixed(&tag, name) {
                matched = true;
                break;
            }
            if reverse {
                self.count(Classification::Domain, &format!("!{}", tag));
            }
        }
        log::debug!("Match {} cost {} ns", name, start.elapsed().as_nanos());
        matched != reverse
    }

    fn mixed(&self, tag: &str, name: &str) -> bool {
        if let Some(classification) = self.cache.get(tag, name) {
            self.count(classification, tag);
            return true;
        }

        let classification = if self.domain.get(tag).is_some_and(|t| t.match_name(name)) {
            Classification::Domain
        } else if self.keyword.get(tag).is_some_and(|t| t.match_name(name)) {
            Classification::Keyword
        } else if self.geosite.get(tag).is_some_and(|set| set.match_mixed(name)) {
            Classification::Domain
        } else {
            return false;
        };

        self.cache.insert(tag, name, classification);
        self.count(classification, tag);
        true
    }

    // ---- geographic sets ----

    /// Rebuild the cached geoip sets from the catalog
    pub fn load_geoip_sets(&self) -> Result<usize> {
        let entries = self.catalog.load_cidrs(&self.geoip_tags)?;
        let sets: HashMap<String, NetList> = entries
            .into_iter()
            .map(|(code, nets)| (code, NetList::from_nets(nets)))
            .collect();
        for (code, set) in &sets {
            log::info!("geoip_cache {} total {}", code, set.len());
        }
        Ok(self.geoip.replace_many(sets))
    }

    /// Rebuild the cached geosite sets from the catalog
    pub fn load_geosite_sets(&self) -> Result<usize> {
        let entries = self.catalog.load_domains(&self.geosite_tags)?;
        let mut sets = HashMap::with_capacity(entries.len());
        for (code, rules) in entries {
            let mut list = DomainList::new();
            for rule in &rules {
                if let Err(e) = list.add(rule.kind, &rule.value) {
                    log::warn!("geosite {}: skipped rule {}: {}", code, rule.value, e);
                }
            }
            log::info!(
                "geosite_cache {} full_domain:{} regex_domain:{}",
                code,
                list.full_len(),
                list.regex_len()
            );
            sets.insert(code, list);
        }
        Ok(self.geosite.replace_many(sets))
    }

    /// Refresh the catalog files (when an updater is configured) and
    /// rebuild both geographic caches.
    ///
    /// Both caches are attempted; the first error is returned.
    pub fn reload_geo(&self, force_download: bool) -> Result<()> {
        if let Some(updater) = &self.updater {
            if let Err(e) = updater.refresh(self.fetcher.as_ref(), self.fetch_timeout, force_download) {
                log::error!("geo catalog refresh failed: {}", e);
            }
        }

        let mut first_err = None;
        if !self.geoip_tags.is_empty() {
            if let Err(e) = self.load_geoip_sets() {
                log::error!("geoip reload failed: {}", e);
                first_err.get_or_insert(e);
            }
        }
        if !self.geosite_tags.is_empty() {
            if let Err(e) = self.load_geosite_sets() {
                log::error!("geosite reload failed: {}", e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn geoip_codes(&self) -> Vec<String> {
        self.geoip.codes()
    }

    pub fn geosite_codes(&self) -> Vec<String> {
        self.geosite.codes()
    }

    // ---- reload ----

    /// Every registered table of the requested kinds
    pub fn tables_for(&self, request: &ReloadRequest) -> Vec<Arc<DataTable>> {
        request
            .kinds()
            .into_iter()
            .flat_map(|kind| self.registry(kind).tables())
            .collect()
    }

    /// Reload one table if its source changed; failures are logged
    pub fn reload_table(&self, table: &DataTable) -> Result<ReloadOutcome> {
        let result = table.reload_if_changed(self.fetcher.as_ref(), self.fetch_timeout);
        if let Err(e) = &result {
            log::error!("{} {}: reload failed, keeping previous data: {}", table.kind(), table.tag(), e);
        }
        result
    }

    /// Reload every table of the requested kinds, one after another
    pub fn reload_kinds(&self, request: &ReloadRequest) -> ReloadSummary {
        let mut summary = ReloadSummary::default();
        for table in self.tables_for(request) {
            summary.record(&self.reload_table(&table));
        }
        log::info!(
            "reload {:?}: {} reloaded, {} unchanged, {} failed",
            request.kinds(),
            summary.reloaded,
            summary.unchanged,
            summary.failed
        );
        summary
    }

    // ---- administration ----

    /// Entries of one table or geographic set, at most `limit`
    /// ([`DEFAULT_LIST_LIMIT`] when `None`). Unknown tags list nothing.
    pub fn list_entries(&self, kind: ListKind, tag: &str, limit: Option<usize>) -> Vec<String> {
        let tag = normalize_tag(tag);
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let mut out = Vec::new();
        match kind {
            ListKind::Table(kind) => {
                if let Some(table) = self.registry(kind).get(&tag) {
                    table.for_each(limit, |entry| out.push(entry));
                }
            }
            ListKind::GeoIp => {
                if let Some(set) = self.geoip.get(&tag) {
                    set.for_each(limit, |net| out.push(net.to_string()));
                }
            }
            ListKind::GeoSite => {
                if let Some(set) = self.geosite.get(&tag) {
                    set.for_each(limit, |entry| out.push(entry.to_string()));
                }
            }
        }
        out
    }

    /// One summary line per registered table
    pub fn describe_tables(&self) -> Vec<String> {
        TableKind::ALL
            .iter()
            .flat_map(|kind| self.registry(*kind).tables())
            .map(|table| table.describe())
            .collect()
    }

    /// Counter snapshot of one classification, largest first
    pub fn matcher_stats(&self, classification: Classification) -> Vec<Counter> {
        self.stats.values(classification)
    }

    /// Count one served DNS query
    pub fn record_query(&self) {
        self.incr_metric(METRIC_DNS_QUERY);
    }

    pub fn incr_metric(&self, name: &str) {
        self.count(Classification::Metrics, name);
    }

    pub fn metric_value(&self, name: &str) -> u64 {
        self.stats.value(Classification::Metrics, name)
    }

    pub fn query_total(&self) -> u64 {
        self.metric_value(METRIC_DNS_QUERY)
    }
}

impl Default for DataHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{DomainRule, MemoryCatalog};
    use crate::stats::METRIC_NXDOMAIN;
    use crate::table::NilFetcher;

    fn spec(kind: TableKind, tag: &str, from: &str) -> TableSpec {
        TableSpec {
            kind,
            tags: vec![tag.to_string()],
            from: from.to_string(),
        }
    }

    fn geo_hub() -> DataHub {
        let mut catalog = MemoryCatalog::new();
        catalog.add_geoip(
            "cn",
            vec!["1.0.1.0/24".parse().unwrap(), "223.0.0.0/8".parse().unwrap()],
        );
        catalog.add_geosite(
            "cn",
            vec![
                DomainRule::new(MatchKind::Domain, "baidu.com"),
                DomainRule::new(MatchKind::Regex, r"^qq\.[a-z]+$"),
            ],
        );
        let hub = DataHub::new()
            .with_catalog(Arc::new(catalog))
            .with_fetcher(Arc::new(NilFetcher))
            .with_geo_tags(vec!["cn".into()], vec!["cn".into()]);
        hub.reload_geo(false).unwrap();
        hub
    }

    #[test]
    fn test_unknown_tag_is_no_match() {
        let hub = DataHub::new();
        assert!(!hub.match_mixed("nothing", "example.com"));
        assert!(!hub.match_keyword("nothing", "example.com"));
        assert!(!hub.match_geoip("nothing", "1.1.1.1".parse().unwrap()));
        assert!(!hub.match_custom_net_str("nothing", "10.0.0.1"));
        assert_eq!(hub.match_ecs("nothing", "10.0.0.1"), None);
        assert!(hub.list_entries(ListKind::GeoSite, "nothing", None).is_empty());
    }

    #[test]
    fn test_geo_matching() {
        let hub = geo_hub();
        assert!(hub.match_geoip("cn", "223.5.5.5".parse().unwrap()));
        assert!(!hub.match_geoip("cn", "8.8.8.8".parse().unwrap()));
        assert!(hub.match_geo_net("CN", &"1.0.1.128/25".parse().unwrap()));
        assert!(hub.match_geosite(MatchKind::Domain, "cn", "www.baidu.com"));
        assert!(!hub.match_geosite(MatchKind::Full, "cn", "www.baidu.com"));
        assert!(hub.match_geosite(MatchKind::Regex, "cn", "qq.com"));
        assert_eq!(hub.stats().value(Classification::Network, "CN"), 2);
        assert_eq!(hub.stats().value(Classification::Domain, "CN"), 2);
        assert_eq!(hub.geoip_codes(), vec!["CN"]);
    }

    #[test]
    fn test_mixed_net_precedence() {
        let hub = geo_hub();
        hub.add_table(&spec(TableKind::Netlist, "cn", "CN 10.0.0.0/8"));

        assert!(hub.match_custom_net_str("cn", "10.1.2.3"));
        assert!(!hub.match_custom_net_str("cn", "223.5.5.5"));
        assert!(hub.match_mixed_net_str("cn", "223.5.5.5"));
        assert!(hub.match_mixed_net_str("cn", "10.1.2.3"));
        assert!(!hub.match_mixed_net_str("cn", "not-an-address"));
    }

    #[test]
    fn test_match_mixed_order_and_counters() {
        let hub = geo_hub();
        hub.add_table(&spec(TableKind::Domain, "cn", "CN:domain:example.cn"));
        hub.add_table(&spec(TableKind::Keyword, "cn", "CN taobao"));

        assert!(hub.match_mixed("cn", "a.example.cn"));
        assert!(hub.match_mixed("cn", "world.taobao.com"));
        assert!(hub.match_mixed("cn", "map.baidu.com"));
        assert!(!hub.match_mixed("cn", "google.com"));

        assert_eq!(hub.stats().value(Classification::Domain, "CN"), 2);
        assert_eq!(hub.stats().value(Classification::Keyword, "CN"), 1);
        assert_eq!(hub.cache().len(), 3);
    }

    #[test]
    fn test_match_mixed_tags_reverse() {
        let hub = DataHub::new().with_fetcher(Arc::new(NilFetcher));
        hub.add_table(&spec(TableKind::Keyword, "a", "A alpha"));
        hub.add_table(&spec(TableKind::Keyword, "b", "B beta"));

        let empty: [&str; 0] = [];
        assert!(!hub.match_mixed_tags(&empty, "alpha.com", true));

        assert!(hub.match_mixed_tags(&["a", "b"], "beta.com", false));
        assert!(!hub.match_mixed_tags(&["a", "b"], "beta.com", true));
        assert!(hub.match_mixed_tags(&["a", "b"], "gamma.com", true));

        assert_eq!(hub.stats().value(Classification::Domain, "!A"), 2);
        assert_eq!(hub.stats().value(Classification::Domain, "!B"), 1);
    }

    #[test]
    fn test_match_ecs_counts_hits() {
        let hub = DataHub::new().with_fetcher(Arc::new(NilFetcher));
        hub.add_table(&spec(
            TableKind::Ecs,
            "edge",
            "EDGE:ip:192.168.1.10:1.2.3.4 EDGE:cidr:10.0.0.0/8:5.6.7.8",
        ));

        assert_eq!(hub.match_ecs("edge", "192.168.1.10"), Some("1.2.3.4".parse().unwrap()));
        assert_eq!(hub.match_ecs("EDGE", "10.20.30.40"), Some("5.6.7.8".parse().unwrap()));
        assert_eq!(hub.match_ecs("edge", "172.16.0.1"), None);
        assert_eq!(hub.metric_value(METRIC_ECS_HITS), 2);
    }

    #[test]
    fn test_list_and_describe() {
        let hub = geo_hub();
        hub.add_table(&spec(TableKind::Keyword, "ads", "ADS one two three"));

        let words = hub.list_entries(ListKind::Table(TableKind::Keyword), "ads", Some(2));
        assert_eq!(words.len(), 2);
        let nets = hub.list_entries(ListKind::GeoIp, "cn", None);
        assert_eq!(nets, vec!["1.0.1.0/24", "223.0.0.0/8"]);

        let described = hub.describe_tables();
        assert_eq!(described.len(), 1);
        assert!(described[0].starts_with("DataTable{tag:ADS, source:inline"));
    }

    #[test]
    fn test_stats_sink_receives_hits() {
        let sink = Arc::new(CounterStats::new());
        let hub = DataHub::new().with_stats_sink(sink.clone());
        hub.add_table(&spec(TableKind::Keyword, "ads", "ADS tracker"));

        assert!(hub.match_mixed("ads", "tracker.net"));
        assert!(hub.match_mixed_tags(&["ads"], "other.net", true));
        assert_eq!(sink.value(Classification::Keyword, "ADS"), 1);
        assert_eq!(sink.value(Classification::Domain, "!ADS"), 1);
        assert_eq!(hub.stats().value(Classification::Keyword, "ADS"), 1);
    }

    #[test]
    fn test_metrics() {
        let hub = DataHub::new();
        hub.record_query();
        hub.record_query();
        hub.incr_metric(METRIC_NXDOMAIN);
        assert_eq!(hub.query_total(), 2);
        assert_eq!(hub.metric_value(METRIC_NXDOMAIN), 1);
        assert_eq!(hub.matcher_stats(Classification::Metrics)[0].value, 2);
    }

    #[test]
    fn test_geo_reload_without_catalog_fails() {
        let hub = DataHub::new().with_geo_tags(vec!["cn".into()], Vec::new());
        assert!(hub.reload_geo(false).is_err());
        assert!(!hub.match_geoip("cn", "1.0.1.1".parse().unwrap()));
    }

    #[test]
    fn test_reload_kinds_inline_tables_unchanged() {
        let hub = DataHub::new().with_fetcher(Arc::new(NilFetcher));
        hub.add_table(&spec(TableKind::Keyword, "a", "A alpha"));
        hub.add_table(&spec(TableKind::Netlist, "lan", "LAN 10.0.0.0/8"));

        let summary = hub.reload_kinds(&ReloadRequest::all());
        assert_eq!(summary, ReloadSummary { reloaded: 0, unchanged: 2, failed: 0 });
        assert_eq!(hub.reload_kinds(&ReloadRequest::default()), ReloadSummary::default());
    }
}

//! Hub configuration and the data table manifest.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};
use crate::table::parser::strip_comment;
use crate::types::TableKind;

/// One data table declaration: a kind, the tags it serves and its source.
///
/// Each tag gets its own table built from the same source; lines carrying a
/// different tag are ignored by that table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub kind: TableKind,
    pub tags: Vec<String>,
    pub from: String,
}

/// Hub options.
///
/// Every field has a default, so `{}` is a valid (empty) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubOptions {
    /// Path of geoip.dat
    pub geoip_path: Option<PathBuf>,
    /// Path of geosite.dat
    pub geosite_path: Option<PathBuf>,
    /// Geoip country codes kept in memory
    pub geoip_cache: Vec<String>,
    /// Geosite codes kept in memory
    pub geosite_cache: Vec<String>,
    /// Where a fresh geoip.dat is downloaded from
    pub geoip_upgrade_url: Option<String>,
    /// Where a fresh geosite.dat is downloaded from
    pub geosite_upgrade_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub fetch_timeout_secs: u64,
    /// Cadence of data table reload checks
    pub reload_interval_secs: u64,
    /// Cadence of catalog refresh and geographic set rebuild
    pub geo_reload_interval_secs: u64,
    /// Upper bound on concurrently running reload jobs
    pub reload_workers: usize,
    /// Optional manifest (file path or URL) listing more tables
    pub datatables: Option<String>,
    pub tables: Vec<TableSpec>,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            geoip_path: None,
            geosite_path: None,
            geoip_cache: Vec::new(),
            geosite_cache: Vec::new(),
            geoip_upgrade_url: None,
            geosite_upgrade_url: None,
            cache_ttl_secs: 300,
            cache_capacity: 4096,
            fetch_timeout_secs: 30,
            reload_interval_secs: 300,
            geo_reload_interval_secs: 24 * 60 * 60,
            reload_workers: 4,
            datatables: None,
            tables: Vec::new(),
        }
    }
}

impl HubOptions {
    /// Parse and validate options from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        let options: HubOptions = serde_json::from_str(text)
            .map_err(|e| HubError::Config(format!("invalid options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Read, parse and validate a JSON options file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            HubError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Reject settings the hub cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.reload_interval_secs == 0 {
            return Err(HubError::Config("reload_interval_secs must be > 0".into()));
        }
        if self.geo_reload_interval_secs == 0 {
            return Err(HubError::Config("geo_reload_interval_secs must be > 0".into()));
        }
        if self.reload_workers == 0 {
            return Err(HubError::Config("reload_workers must be > 0".into()));
        }
        if self.cache_capacity == 0 {
            return Err(HubError::Config("cache_capacity must be > 0".into()));
        }
        for url in [&self.geoip_upgrade_url, &self.geosite_upgrade_url]
            .into_iter()
            .flatten()
        {
            if !is_url(url) {
                return Err(HubError::Config(format!("upgrade url must be http(s): {}", url)));
            }
        }
        for spec in &self.tables {
            if spec.tags.iter().all(|t| t.trim().is_empty()) {
                return Err(HubError::Config(format!("{} declared without tags", spec.kind)));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs)
    }

    pub fn geo_reload_interval(&self) -> Duration {
        Duration::from_secs(self.geo_reload_interval_secs)
    }
}

pub(crate) fn is_url(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Parse one manifest line: `<kind> <TAG1,TAG2,...> <from>`.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_manifest_line(line_num: usize, line: &str) -> Result<Option<TableSpec>> {
    let line = strip_comment(line);
    if line.is_empty() {
        return Ok(None);
    }

    let (kind, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();
    let (tags, from) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let from = from.trim();
    if from.is_empty() {
        return Err(HubError::ParseErrorAtLine {
            line: line_num,
            message: format!("expected `<kind> <tags> <from>`: {}", line),
        });
    }

    let kind = kind.parse::<TableKind>().map_err(|e| HubError::ParseErrorAtLine {
        line: line_num,
        message: e.to_string(),
    })?;

    let tags: Vec<String> = tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if tags.is_empty() {
        return Err(HubError::ParseErrorAtLine {
            line: line_num,
            message: "no tags".to_string(),
        });
    }

    Ok(Some(TableSpec {
        kind,
        tags,
        from: from.to_string(),
    }))
}

/// Parse a whole manifest, failing on the first malformed line
pub fn parse_manifest(text: &str) -> Result<Vec<TableSpec>> {
    let mut specs = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(spec) = parse_manifest_line(idx + 1, line)? {
            specs.push(spec);
        }
    }
    Ok(specs)
}

/// Parse a whole manifest, logging and skipping malformed lines
pub fn parse_manifest_lenient(text: &str) -> Vec<TableSpec> {
    let mut specs = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_manifest_line(idx + 1, line) {
            Ok(Some(spec)) => specs.push(spec),
            Ok(None) => {}
            Err(e) => log::error!("datatables manifest: {}", e),
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = HubOptions::from_json("{}").unwrap();
        assert_eq!(options.cache_ttl(), Duration::from_secs(300));
        assert_eq!(options.cache_capacity, 4096);
        assert_eq!(options.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(options.reload_workers, 4);
        assert!(options.tables.is_empty());
    }

    #[test]
    fn test_from_json_with_tables() {
        let options = HubOptions::from_json(
            r#"{
                "geoip_path": "/data/geoip.dat",
                "geoip_cache": ["cn", "private"],
                "reload_interval_secs": 3,
                "tables": [
                    {"kind": "netlist_table", "tags": ["lan"], "from": "LAN:10.0.0.0/8"},
                    {"kind": "keyword", "tags": ["ads"], "from": "https://example.com/kw.txt"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(options.geoip_path, Some(PathBuf::from("/data/geoip.dat")));
        assert_eq!(options.reload_interval(), Duration::from_secs(3));
        assert_eq!(options.tables.len(), 2);
        assert_eq!(options.tables[1].kind, TableKind::Keyword);
    }

    #[test]
    fn test_validation_is_fatal() {
        for bad in [
            r#"{"reload_interval_secs": 0}"#,
            r#"{"reload_workers": 0}"#,
            r#"{"cache_capacity": 0}"#,
            r#"{"geoip_upgrade_url": "ftp://example.com/geoip.dat"}"#,
            r#"{"tables": [{"kind": "ecs_table", "tags": [], "from": "x"}]}"#,
            r#"{"tables": [{"kind": "bogus_table", "tags": ["a"], "from": "x"}]}"#,
            "not json",
        ] {
            let err = HubOptions::from_json(bad).unwrap_err();
            assert!(matches!(err, HubError::Config(_)), "{} -> {:?}", bad, err);
        }
    }

    #[test]
    fn test_manifest_parsing() {
        let text = "\
# kind tags from
keyword_table cn,ads /etc/datahub/keyword.txt
netlist_table LAN   LAN:10.0.0.0/8   # trailing comment
ecs_table global https://example.com/ecs.txt
";
        let specs = parse_manifest(text).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].kind, TableKind::Keyword);
        assert_eq!(specs[0].tags, vec!["cn", "ads"]);
        assert_eq!(specs[1].from, "LAN:10.0.0.0/8");
        assert_eq!(specs[2].kind, TableKind::Ecs);
    }

    #[test]
    fn test_manifest_errors_carry_line_numbers() {
        let text = "keyword_table cn a.txt\nbogus_table cn b.txt\n";
        match parse_manifest(text).unwrap_err() {
            HubError::ParseErrorAtLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }

        let err = parse_manifest_line(7, "domain_table cn").unwrap_err();
        assert!(matches!(err, HubError::ParseErrorAtLine { line: 7, .. }));

        let specs = parse_manifest_lenient(text);
        assert_eq!(specs.len(), 1);
    }
}

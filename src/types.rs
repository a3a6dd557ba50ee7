use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Canonical form of a tag: trimmed and uppercased.
///
/// Every public entry point runs tags through this before touching a
/// registry, so `"cn"`, `" CN "` and `"Cn"` all name the same rule set.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_uppercase()
}

/// Parse a network or a bare address.
///
/// Bare addresses become host networks (`/32` or `/128`); networks are
/// truncated so their string form is canonical.
pub fn parse_net(s: &str) -> Option<IpNet> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(net) = s.parse::<IpNet>() {
        return Some(net.trunc());
    }
    s.parse::<IpAddr>().ok().map(IpNet::from)
}

/// Rule table kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    #[serde(rename = "keyword_table", alias = "keyword")]
    Keyword,
    #[serde(rename = "domain_table", alias = "domain")]
    Domain,
    #[serde(rename = "netlist_table", alias = "netlist")]
    Netlist,
    #[serde(rename = "ecs_table", alias = "ecs")]
    Ecs,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Keyword,
        TableKind::Domain,
        TableKind::Netlist,
        TableKind::Ecs,
    ];

    /// Manifest name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Keyword => "keyword_table",
            TableKind::Domain => "domain_table",
            TableKind::Netlist => "netlist_table",
            TableKind::Ecs => "ecs_table",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyword_table" | "keyword" => Ok(TableKind::Keyword),
            "domain_table" | "domain" => Ok(TableKind::Domain),
            "netlist_table" | "netlist" => Ok(TableKind::Netlist),
            "ecs_table" | "ecs" => Ok(TableKind::Ecs),
            _ => Err(HubError::InvalidTableKind(s.to_string())),
        }
    }
}

/// Domain rule kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Exact match: "example.com" matches only "example.com"
    Full,
    /// Suffix match: "example.com" matches "example.com" and "foo.example.com"
    Domain,
    /// Regex match against the whole name
    Regex,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Full => "full",
            MatchKind::Domain => "domain",
            MatchKind::Regex => "regex",
        }
    }
}

impl FromStr for MatchKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(MatchKind::Full),
            "domain" | "suffix" => Ok(MatchKind::Domain),
            "regex" => Ok(MatchKind::Regex),
            _ => Err(HubError::InvalidMatchKind(s.to_string())),
        }
    }
}

/// Statistics classification of a match decision.
///
/// `Domain` and `Keyword` double as the matcher kind memoized in the
/// match cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Domain,
    Keyword,
    Network,
    Metrics,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Domain => "domain",
            Classification::Keyword => "keyword",
            Classification::Network => "network",
            Classification::Metrics => "metrics",
        }
    }
}

/// Entry listing target for administrative reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Table(TableKind),
    GeoIp,
    GeoSite,
}

impl FromStr for ListKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "geoip" => Ok(ListKind::GeoIp),
            "geosite" => Ok(ListKind::GeoSite),
            other => other.parse::<TableKind>().map(ListKind::Table),
        }
    }
}

/// Administrative reload selection, one flag per table kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadRequest {
    pub domain: bool,
    pub network: bool,
    pub ecs: bool,
    pub keyword: bool,
}

impl ReloadRequest {
    /// Every table kind
    pub fn all() -> Self {
        Self {
            domain: true,
            network: true,
            ecs: true,
            keyword: true,
        }
    }

    /// Selected table kinds
    pub fn kinds(&self) -> Vec<TableKind> {
        let mut kinds = Vec::with_capacity(4);
        if self.keyword {
            kinds.push(TableKind::Keyword);
        }
        if self.domain {
            kinds.push(TableKind::Domain);
        }
        if self.network {
            kinds.push(TableKind::Netlist);
        }
        if self.ecs {
            kinds.push(TableKind::Ecs);
        }
        kinds
    }
}

use std::fmt::Write as _;

use ipnet::IpNet;

use super::parser;
use crate::matcher::{DomainList, EcsData, KeywordList, NetList};
use crate::types::{parse_net, TableKind};

/// Backing set of a rule table, one variant per table kind.
#[derive(Debug, Clone)]
pub enum RuleData {
    Keyword(KeywordList),
    Domain(DomainList),
    Netlist(NetList),
    Ecs(EcsData),
}

impl RuleData {
    /// Empty set of the given kind
    pub fn empty(kind: TableKind) -> Self {
        match kind {
            TableKind::Keyword => RuleData::Keyword(KeywordList::new()),
            TableKind::Domain => RuleData::Domain(DomainList::new()),
            TableKind::Netlist => RuleData::Netlist(NetList::new()),
            TableKind::Ecs => RuleData::Ecs(EcsData::new()),
        }
    }

    /// Build a fresh set from rule lines. Returns the set and the number of
    /// malformed lines that were skipped.
    pub fn parse<'a, I>(kind: TableKind, tag: &str, lines: I) -> (Self, usize)
    where
        I: IntoIterator<Item = &'a str>,
    {
        match kind {
            TableKind::Keyword => {
                let (list, skipped) = parser::parse_keywords(tag, lines);
                (RuleData::Keyword(list), skipped)
            }
            TableKind::Domain => {
                let (list, skipped) = parser::parse_domains(tag, lines);
                (RuleData::Domain(list), skipped)
            }
            TableKind::Netlist => {
                let (list, skipped) = parser::parse_netlist(tag, lines);
                (RuleData::Netlist(list), skipped)
            }
            TableKind::Ecs => {
                let (data, skipped) = parser::parse_ecs(tag, lines);
                (RuleData::Ecs(data), skipped)
            }
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            RuleData::Keyword(_) => TableKind::Keyword,
            RuleData::Domain(_) => TableKind::Domain,
            RuleData::Netlist(_) => TableKind::Netlist,
            RuleData::Ecs(_) => TableKind::Ecs,
        }
    }

    /// Name-level match.
    ///
    /// Keywords test substring containment, domains use the mixed match,
    /// netlists parse the name as an address or network, ECS tables report
    /// whether the key resolves.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            RuleData::Keyword(list) => list.matches(name),
            RuleData::Domain(list) => list.match_mixed(name),
            RuleData::Netlist(list) => parse_net(name).is_some_and(|net| list.contains(&net)),
            RuleData::Ecs(data) => data.resolve(name).is_some(),
        }
    }

    /// Network-level match; only netlist and ECS range sets answer
    pub fn match_net(&self, net: &IpNet) -> bool {
        match self {
            RuleData::Netlist(list) => list.contains(net),
            RuleData::Ecs(data) => data.match_net(net),
            RuleData::Keyword(_) | RuleData::Domain(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RuleData::Keyword(list) => list.len(),
            RuleData::Domain(list) => list.len(),
            RuleData::Netlist(list) => list.len(),
            RuleData::Ecs(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit at most `limit` entries (0 means all) in display form
    pub fn for_each<F>(&self, limit: usize, mut f: F)
    where
        F: FnMut(String),
    {
        match self {
            RuleData::Keyword(list) => list.for_each(limit, |w| f(w.to_string())),
            RuleData::Domain(list) => list.for_each(limit, |d| f(d.to_string())),
            RuleData::Netlist(list) => list.for_each(limit, |n| f(n.to_string())),
            RuleData::Ecs(data) => data.for_each(limit, |client, target| {
                f(format!("{} -> {}", client, target))
            }),
        }
    }

    /// Short summary with the first ten entries
    pub fn summary(&self) -> String {
        let mut items = Vec::with_capacity(10);
        self.for_each(10, |entry| items.push(entry));

        let mut out = String::new();
        let _ = write!(
            out,
            "{}({}):{{{}",
            self.kind(),
            self.len(),
            items.join(",")
        );
        if self.len() > items.len() {
            out.push_str(",...");
        }
        out.push('}');
        out
    }
}

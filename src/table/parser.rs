//! Rule line parsers, one per table kind.
//!
//! Every parser is lenient: a malformed line is counted and skipped, the rest
//! of the source still applies. Lines carrying a different tag are ignored
//! without being counted, so one file can feed several tables.

use std::net::IpAddr;

use crate::matcher::{DomainList, EcsData, KeywordList, NetList};
use crate::types::{normalize_tag, parse_net, MatchKind};

/// Drop everything from the first `#` and trim
pub(crate) fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

/// Lowercase, trim and drop a trailing root dot
pub(crate) fn normalize_domain(value: &str) -> String {
    let value = value.trim().to_lowercase();
    match value.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => value,
    }
}

fn tag_matches(tag: &str, candidate: &str) -> bool {
    normalize_tag(candidate) == tag
}

enum Line {
    Entry,
    Foreign,
    Invalid,
}

fn parse_all<'a, I, F>(lines: I, mut f: F) -> usize
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> Line,
{
    let mut skipped = 0;
    for raw in lines {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        match f(line) {
            Line::Entry | Line::Foreign => {}
            Line::Invalid => {
                log::debug!("skipping malformed rule line: {}", line);
                skipped += 1;
            }
        }
    }
    skipped
}

/// `word` or `TAG word`
pub fn parse_keywords<'a, I>(tag: &str, lines: I) -> (KeywordList, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut list = KeywordList::new();
    let skipped = parse_all(lines, |line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [word] => {
                list.add(&word.to_lowercase());
                Line::Entry
            }
            [owner, word, ..] if tag_matches(tag, owner) => {
                list.add(&word.to_lowercase());
                Line::Entry
            }
            [_, _, ..] => Line::Foreign,
            [] => Line::Invalid,
        }
    });
    (list, skipped)
}

/// `name` (full rule) or `TAG:kind:value` with kind one of full, domain, regex
pub fn parse_domains<'a, I>(tag: &str, lines: I) -> (DomainList, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut list = DomainList::new();
    let skipped = parse_all(lines, |line| {
        if !line.contains(':') {
            return match list.add(MatchKind::Full, &normalize_domain(line)) {
                Ok(()) => Line::Entry,
                Err(_) => Line::Invalid,
            };
        }

        let mut parts = line.splitn(3, ':');
        let (owner, kind, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(o), Some(k), Some(v)) => (o, k, v),
            _ => return Line::Invalid,
        };
        let kind = match kind.parse::<MatchKind>() {
            Ok(kind) => kind,
            Err(_) => return Line::Invalid,
        };
        if !tag_matches(tag, owner) {
            return Line::Foreign;
        }
        let value = match kind {
            MatchKind::Regex => value.trim().to_string(),
            MatchKind::Full | MatchKind::Domain => normalize_domain(value),
        };
        if value.is_empty() {
            return Line::Invalid;
        }
        match list.add(kind, &value) {
            Ok(()) => Line::Entry,
            Err(e) => {
                log::warn!("tag {}: invalid regex {:?}: {}", tag, value, e);
                Line::Invalid
            }
        }
    });
    (list, skipped)
}

/// `cidr`, bare address, or `TAG:cidr`.
///
/// The whole line is tried as a network first so IPv6 values are never
/// mistaken for a tag prefix.
pub fn parse_netlist<'a, I>(tag: &str, lines: I) -> (NetList, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut list = NetList::new();
    let skipped = parse_all(lines, |line| {
        if let Some(net) = parse_net(line) {
            list.add(net);
            return Line::Entry;
        }
        let Some((owner, rest)) = line.split_once(':') else {
            return Line::Invalid;
        };
        match parse_net(rest) {
            Some(net) if tag_matches(tag, owner) => {
                list.add(net);
                Line::Entry
            }
            Some(_) => Line::Foreign,
            None => Line::Invalid,
        }
    });
    list.sort();
    (list, skipped)
}

/// `TAG:ip:<addr>:<ecs-ip>` or `TAG:cidr:<cidr>[,<cidr>...]:<ecs-ip>`.
///
/// A range nested in a broader bound range is dropped and counted as
/// skipped, see [`EcsData::finish`].
pub fn parse_ecs<'a, I>(tag: &str, lines: I) -> (EcsData, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut data = EcsData::new();
    let skipped = parse_all(lines, |line| {
        let mut parts = line.splitn(3, ':');
        let (owner, kind, rest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(o), Some(k), Some(r)) => (o, k.trim().to_lowercase(), r),
            _ => return Line::Invalid,
        };
        if kind != "ip" && kind != "cidr" {
            return Line::Invalid;
        }
        let Some((clients, target)) = split_binding(&kind, rest) else {
            return Line::Invalid;
        };
        if !tag_matches(tag, owner) {
            return Line::Foreign;
        }
        if kind == "ip" {
            data.bind_ip(&clients[0].addr().to_string(), target);
        } else {
            for net in clients {
                data.bind_net(net, target);
            }
        }
        Line::Entry
    });
    let nested = data.finish();
    (data, skipped + nested)
}

/// Find the `:` that separates the client field from the target address.
///
/// Both halves may be IPv6, so every split point is tried left to right and
/// the first one where both sides parse wins.
fn split_binding(kind: &str, rest: &str) -> Option<(Vec<ipnet::IpNet>, IpAddr)> {
    for (idx, _) in rest.match_indices(':') {
        let (left, right) = (rest[..idx].trim(), rest[idx + 1..].trim());
        let Ok(target) = right.parse::<IpAddr>() else {
            continue;
        };
        let clients: Option<Vec<_>> = if kind == "ip" {
            left.parse::<IpAddr>().ok().map(|ip| vec![ipnet::IpNet::from(ip)])
        } else {
            left.split(',').map(parse_net).collect()
        };
        if let Some(clients) = clients {
            if !clients.is_empty() {
                return Some((clients, target));
            }
        }
    }
    None
}

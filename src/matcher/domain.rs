use std::collections::HashSet;

use regex::Regex;

use crate::types::MatchKind;

/// Domain rule set for one tag.
///
/// Full and domain (suffix) rules share one exact-match set: a full match is a
/// single lookup, a suffix match probes every label suffix of the name. Regex
/// rules are compiled once and scanned in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DomainList {
    exact: HashSet<String>,
    regexes: Vec<Regex>,
}

impl DomainList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one rule. Values are expected to be normalized already
    /// (lowercase, trimmed, no trailing dot). Returns an error only for an
    /// invalid regex.
    pub fn add(&mut self, kind: MatchKind, value: &str) -> Result<(), regex::Error> {
        match kind {
            MatchKind::Full | MatchKind::Domain => {
                self.exact.insert(value.to_string());
            }
            MatchKind::Regex => {
                self.regexes.push(Regex::new(value)?);
            }
        }
        Ok(())
    }

    /// Exact lookup of the name
    pub fn match_full(&self, name: &str) -> bool {
        self.exact.contains(trim_root(name))
    }

    /// Probe each label suffix from the root label down to the full name.
    ///
    /// For `a.b.example.com` the probes are `com`, `example.com`,
    /// `b.example.com`, `a.b.example.com`; the first hit wins.
    pub fn match_suffix(&self, name: &str) -> bool {
        if self.exact.is_empty() || name.is_empty() {
            return false;
        }
        let name = trim_root(name);

        for (idx, _) in name.rmatch_indices('.') {
            if self.exact.contains(&name[idx + 1..]) {
                return true;
            }
        }
        self.exact.contains(name)
    }

    /// Linear scan over compiled patterns, first match wins
    pub fn match_regex(&self, name: &str) -> bool {
        let name = trim_root(name);
        self.regexes.iter().any(|re| re.is_match(name))
    }

    /// Full, then suffix, then regex
    pub fn match_mixed(&self, name: &str) -> bool {
        self.match_full(name) || self.match_suffix(name) || self.match_regex(name)
    }

    /// Dispatch on an explicit rule kind
    pub fn match_kind(&self, kind: MatchKind, name: &str) -> bool {
        match kind {
            MatchKind::Full => self.match_full(name),
            MatchKind::Domain => self.match_suffix(name),
            MatchKind::Regex => self.match_regex(name),
        }
    }

    pub fn full_len(&self) -> usize {
        self.exact.len()
    }

    pub fn regex_len(&self) -> usize {
        self.regexes.len()
    }

    pub fn len(&self) -> usize {
        self.full_len() + self.regex_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit at most `limit` entries (0 means all): exact names first, then
    /// regex sources in insertion order.
    pub fn for_each<F>(&self, limit: usize, mut f: F)
    where
        F: FnMut(&str),
    {
        let limit = if limit == 0 { usize::MAX } else { limit };
        let names = self.exact.iter().map(String::as_str);
        let patterns = self.regexes.iter().map(Regex::as_str);
        for entry in names.chain(patterns).take(limit) {
            f(entry);
        }
    }
}

/// Queries may carry the DNS root dot; rules never do.
fn trim_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

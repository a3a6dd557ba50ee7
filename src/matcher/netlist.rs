use std::cmp::Ordering;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::types::parse_net;

/// Total order over networks: base address first (IPv4 before IPv6), then
/// prefix length, so a covering network sorts before the networks it covers.
pub fn compare_nets(a: &IpNet, b: &IpNet) -> Ordering {
    a.network()
        .cmp(&b.network())
        .then_with(|| a.prefix_len().cmp(&b.prefix_len()))
}

/// Sorted CIDR collection for one tag.
///
/// Lookups bisect on [`compare_nets`] and stop at the first stored network
/// that covers the query. That is only exact when the stored networks are
/// disjoint, so [`NetList::sort`] also drops every network already covered
/// by an earlier, broader one. A list is built off to the side, sorted once
/// and then shared read-only.
#[derive(Debug, Clone)]
pub struct NetList {
    nets: Vec<IpNet>,
    sorted: bool,
}

impl Default for NetList {
    fn default() -> Self {
        Self::new()
    }
}

impl NetList {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            nets: Vec::new(),
            sorted: true,
        }
    }

    /// Build a sorted list from arbitrary networks
    pub fn from_nets(nets: Vec<IpNet>) -> Self {
        let mut list = Self {
            nets: nets.into_iter().map(|n| n.trunc()).collect(),
            sorted: false,
        };
        list.sort();
        list
    }

    /// Append a network. The list must be re-sorted before the next lookup.
    pub fn add(&mut self, net: IpNet) {
        self.nets.push(net.trunc());
        self.sorted = false;
    }

    /// Parse and append a network or bare address. Returns false if the
    /// input does not parse.
    pub fn add_str(&mut self, s: &str) -> bool {
        match parse_net(s) {
            Some(net) => {
                self.add(net);
                true
            }
            None => false,
        }
    }

    /// Sort by [`compare_nets`] and drop networks nested in an earlier one.
    ///
    /// Returns the number of dropped entries.
    pub fn sort(&mut self) -> usize {
        if self.sorted {
            return 0;
        }
        self.nets.sort_by(compare_nets);

        let before = self.nets.len();
        let mut kept: Vec<IpNet> = Vec::with_capacity(before);
        for net in self.nets.drain(..) {
            if let Some(last) = kept.last() {
                if last.contains(&net) {
                    continue;
                }
            }
            kept.push(net);
        }
        self.nets = kept;
        self.sorted = true;

        let dropped = before - self.nets.len();
        if dropped > 0 {
            log::debug!("netlist: dropped {} covered or duplicate networks", dropped);
        }
        dropped
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// True if some stored network fully covers `query`
    pub fn contains(&self, query: &IpNet) -> bool {
        self.find_containing(query).is_some()
    }

    /// True if some stored network covers `ip`
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        self.contains(&IpNet::from(ip))
    }

    /// Return the stored network covering `query`, if any
    pub fn find_containing(&self, query: &IpNet) -> Option<&IpNet> {
        debug_assert!(self.sorted, "netlist searched before sort()");

        let mut low = 0usize;
        let mut high = self.nets.len();
        while low < high {
            let mid = low + (high - low) / 2;
            let candidate = &self.nets[mid];
            if candidate.contains(query) {
                return Some(candidate);
            }
            match compare_nets(candidate, query) {
                Ordering::Greater => high = mid,
                _ => low = mid + 1,
            }
        }
        None
    }

    /// Iterate over stored networks in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &IpNet> {
        self.nets.iter()
    }

    /// Visit at most `limit` networks (0 means all)
    pub fn for_each<F>(&self, limit: usize, mut f: F)
    where
        F: FnMut(&IpNet),
    {
        let limit = if limit == 0 { usize::MAX } else { limit };
        for net in self.nets.iter().take(limit) {
            f(net);
        }
    }
}

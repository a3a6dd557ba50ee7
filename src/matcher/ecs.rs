use std::collections::HashMap;
use std::net::IpAddr;

use ipnet::IpNet;

use super::NetList;
use crate::types::parse_net;

/// ECS binding table: client address or range -> substitute address.
///
/// Bare-address bindings live only in the direct index. Range bindings are
/// keyed by the canonical network string in the same index and also stored
/// in a [`NetList`] so a client address can be mapped to its range.
///
/// Ranges are kept disjoint: a range nested in a broader bound range is
/// dropped from both indices by [`EcsData::finish`].
#[derive(Debug, Clone, Default)]
pub struct EcsData {
    direct: HashMap<String, IpAddr>,
    ranges: NetList,
}

impl EcsData {
    pub fn new() -> Self {
        Self {
            direct: HashMap::new(),
            ranges: NetList::new(),
        }
    }

    /// Bind a bare address (exact key)
    pub fn bind_ip(&mut self, client: &str, target: IpAddr) {
        self.direct.insert(client.trim().to_string(), target);
    }

    /// Bind a network. Call [`EcsData::finish`] before sharing.
    pub fn bind_net(&mut self, net: IpNet, target: IpAddr) {
        let net = net.trunc();
        self.direct.insert(net.to_string(), target);
        self.ranges.add(net);
    }

    /// Bind either form; a key containing `/` is treated as a network.
    /// Returns false if a network key does not parse.
    pub fn bind(&mut self, client: &str, target: IpAddr) -> bool {
        let client = client.trim();
        if client.contains('/') {
            match parse_net(client) {
                Some(net) => {
                    self.bind_net(net, target);
                    true
                }
                None => false,
            }
        } else {
            self.bind_ip(client, target);
            true
        }
    }

    /// Sort the range index and drop nested range bindings.
    ///
    /// Returns the number of range bindings dropped.
    pub fn finish(&mut self) -> usize {
        let bound: Vec<IpNet> = self.ranges.iter().copied().collect();
        if self.ranges.sort() == 0 {
            return 0;
        }
        let mut dropped = 0;
        for net in bound {
            if self.ranges.find_containing(&net) == Some(&net) {
                continue;
            }
            if let Some(target) = self.direct.remove(&net.to_string()) {
                log::warn!("ecs range {} -> {} is covered by a broader range, dropped", net, target);
                dropped += 1;
            }
        }
        dropped
    }

    /// Resolve a client key to its substitute address.
    ///
    /// Exact lookup of the raw key first; otherwise the key is parsed as a
    /// network, its covering range is found and looked up by canonical form.
    pub fn resolve(&self, client: &str) -> Option<IpAddr> {
        if let Some(ip) = self.direct.get(client) {
            return Some(*ip);
        }
        let query = parse_net(client)?;
        if query.prefix_len() == query.max_prefix_len() {
            if let Some(ip) = self.direct.get(&query.addr().to_string()) {
                return Some(*ip);
            }
        }
        let range = self.ranges.find_containing(&query)?;
        self.direct.get(&range.to_string()).copied()
    }

    /// True if `net` falls in a bound range
    pub fn match_net(&self, net: &IpNet) -> bool {
        self.ranges.contains(net)
    }

    /// Number of bindings (direct and range keys)
    pub fn len(&self) -> usize {
        self.direct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }

    /// Visit at most `limit` bindings (0 means all) as `client -> target`
    pub fn for_each<F>(&self, limit: usize, mut f: F)
    where
        F: FnMut(&str, &IpAddr),
    {
        let limit = if limit == 0 { usize::MAX } else { limit };
        for (client, target) in self.direct.iter().take(limit) {
            f(client, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_direct_binding() {
        let mut e = EcsData::new();
        e.bind_ip("192.168.1.10", ip("1.2.3.4"));
        e.finish();
        assert_eq!(e.resolve("192.168.1.10"), Some(ip("1.2.3.4")));
        assert_eq!(e.resolve("192.168.1.11"), None);
    }

    #[test]
    fn test_range_binding() {
        let mut e = EcsData::new();
        e.bind_net("10.0.0.0/24".parse().unwrap(), ip("5.6.7.8"));
        e.bind_net("10.1.0.0/16".parse().unwrap(), ip("9.9.9.9"));
        e.finish();

        assert_eq!(e.resolve("10.0.0.77"), Some(ip("5.6.7.8")));
        assert_eq!(e.resolve("10.1.200.3"), Some(ip("9.9.9.9")));
        assert_eq!(e.resolve("10.0.0.0/24"), Some(ip("5.6.7.8")));
        assert_eq!(e.resolve("10.2.0.1"), None);
        assert!(e.match_net(&"10.0.0.9/32".parse().unwrap()));
    }

    #[test]
    fn test_nested_range_dropped_from_both_indices() {
        let mut e = EcsData::new();
        e.bind_net("10.1.0.0/16".parse().unwrap(), ip("2.2.2.2"));
        e.bind_net("10.0.0.0/8".parse().unwrap(), ip("1.1.1.1"));
        assert_eq!(e.finish(), 1);

        assert_eq!(e.len(), 1);
        assert_eq!(e.resolve("10.1.2.3"), Some(ip("1.1.1.1")));
        assert_eq!(e.resolve("10.1.0.0/16"), Some(ip("1.1.1.1")));
        let mut keys = Vec::new();
        e.for_each(0, |client, _| keys.push(client.to_string()));
        assert_eq!(keys, vec!["10.0.0.0/8"]);
    }

    #[test]
    fn test_rebinding_same_range_keeps_last() {
        let mut e = EcsData::new();
        e.bind_net("10.0.0.0/8".parse().unwrap(), ip("1.1.1.1"));
        e.bind_net("10.0.0.0/8".parse().unwrap(), ip("3.3.3.3"));
        assert_eq!(e.finish(), 0);
        assert_eq!(e.resolve("10.9.9.9"), Some(ip("3.3.3.3")));
    }

    #[test]
    fn test_direct_takes_precedence() {
        let mut e = EcsData::new();
        e.bind_net("10.0.0.0/24".parse().unwrap(), ip("5.6.7.8"));
        e.bind_ip("10.0.0.1", ip("1.1.1.1"));
        e.finish();
        assert_eq!(e.resolve("10.0.0.1"), Some(ip("1.1.1.1")));
        assert_eq!(e.resolve("10.0.0.2"), Some(ip("5.6.7.8")));
    }

    #[test]
    fn test_non_canonical_client_key() {
        let mut e = EcsData::new();
        e.bind_ip("2001:db8::1", ip("1.1.1.1"));
        e.finish();
        assert_eq!(e.resolve("2001:0db8:0:0::1"), Some(ip("1.1.1.1")));
    }

    #[test]
    fn test_ipv6_range() {
        let mut e = EcsData::new();
        assert!(e.bind("2001:db8::/32", ip("2001:4860::1")));
        e.finish();
        assert_eq!(e.resolve("2001:db8::42"), Some(ip("2001:4860::1")));
    }

    #[test]
    fn test_malformed_client() {
        let mut e = EcsData::new();
        assert!(!e.bind("10.0.0.0/99", ip("1.1.1.1")));
        e.finish();
        assert_eq!(e.resolve("not-an-ip"), None);
    }
}

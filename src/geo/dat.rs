//! V2Ray `geoip.dat` / `geosite.dat` decoding.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use ipnet::IpNet;
use prost::Message;

use super::DomainRule;
use crate::error::{CatalogErrorKind, HubError, Result};
use crate::types::{normalize_tag, MatchKind};

/// Protobuf schema of the V2Ray geo data files
pub mod geodat {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Domain {
        #[prost(enumeration = "domain::Type", tag = "1")]
        pub r#type: i32,
        #[prost(string, tag = "2")]
        pub value: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "3")]
        pub attribute: ::prost::alloc::vec::Vec<domain::Attribute>,
    }

    pub mod domain {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Attribute {
            #[prost(string, tag = "1")]
            pub key: ::prost::alloc::string::String,
            #[prost(oneof = "attribute::TypedValue", tags = "2, 3")]
            pub typed_value: ::core::option::Option<attribute::TypedValue>,
        }

        pub mod attribute {
            #[derive(Clone, PartialEq, ::prost::Oneof)]
            pub enum TypedValue {
                #[prost(bool, tag = "2")]
                BoolValue(bool),
                #[prost(int64, tag = "3")]
                IntValue(i64),
            }
        }

        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum Type {
            /// Keyword match; not representable in a domain set
            Plain = 0,
            Regex = 1,
            RootDomain = 2,
            Full = 3,
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Cidr {
        #[prost(bytes = "vec", tag = "1")]
        pub ip: ::prost::alloc::vec::Vec<u8>,
        #[prost(uint32, tag = "2")]
        pub prefix: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GeoIp {
        #[prost(string, tag = "1")]
        pub country_code: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "2")]
        pub cidr: ::prost::alloc::vec::Vec<Cidr>,
        #[prost(bool, tag = "3")]
        pub reverse_match: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GeoIpList {
        #[prost(message, repeated, tag = "1")]
        pub entry: ::prost::alloc::vec::Vec<GeoIp>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GeoSite {
        #[prost(string, tag = "1")]
        pub country_code: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "2")]
        pub domain: ::prost::alloc::vec::Vec<Domain>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GeoSiteList {
        #[prost(message, repeated, tag = "1")]
        pub entry: ::prost::alloc::vec::Vec<GeoSite>,
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        HubError::catalog(
            CatalogErrorKind::FileError,
            format!("Failed to read {}: {}", path.display(), e),
        )
    })
}

/// Uppercased tag filter; an empty filter selects every entry
fn wanted(tags: &[String]) -> HashSet<String> {
    tags.iter().map(|t| normalize_tag(t)).collect()
}

/// Decode a geoip file, keeping only the requested country codes
pub fn load_geoip(path: impl AsRef<Path>, tags: &[String]) -> Result<HashMap<String, Vec<IpNet>>> {
    let data = read_file(path.as_ref())?;
    decode_geoip(&data, tags)
}

pub fn decode_geoip(data: &[u8], tags: &[String]) -> Result<HashMap<String, Vec<IpNet>>> {
    let list = geodat::GeoIpList::decode(data).map_err(|e| {
        HubError::catalog(
            CatalogErrorKind::InvalidData,
            format!("Failed to decode GeoIP DAT: {}", e),
        )
    })?;

    let wanted = wanted(tags);
    let mut result = HashMap::new();

    for entry in list.entry {
        let code = normalize_tag(&entry.country_code);
        if !wanted.is_empty() && !wanted.contains(&code) {
            continue;
        }
        let cidrs: Vec<IpNet> = entry.cidr.iter().filter_map(cidr_to_ipnet).collect();
        result.insert(code, cidrs);
    }

    Ok(result)
}

/// Decode a geosite file, keeping only the requested codes
pub fn load_geosite(
    path: impl AsRef<Path>,
    tags: &[String],
) -> Result<HashMap<String, Vec<DomainRule>>> {
    let data = read_file(path.as_ref())?;
    decode_geosite(&data, tags)
}

pub fn decode_geosite(data: &[u8], tags: &[String]) -> Result<HashMap<String, Vec<DomainRule>>> {
    let list = geodat::GeoSiteList::decode(data).map_err(|e| {
        HubError::catalog(
            CatalogErrorKind::InvalidData,
            format!("Failed to decode GeoSite DAT: {}", e),
        )
    })?;

    let wanted = wanted(tags);
    let mut result = HashMap::new();

    for entry in list.entry {
        let code = normalize_tag(&entry.country_code);
        if !wanted.is_empty() && !wanted.contains(&code) {
            continue;
        }
        let rules: Vec<DomainRule> = entry.domain.iter().filter_map(domain_to_rule).collect();
        result.insert(code, rules);
    }

    Ok(result)
}

fn cidr_to_ipnet(cidr: &geodat::Cidr) -> Option<IpNet> {
    let ip = &cidr.ip;
    let prefix = u8::try_from(cidr.prefix).ok()?;

    let addr = match ip.len() {
        4 => IpAddr::V4(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3])),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(ip);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    IpNet::new(addr, prefix).ok().map(|n| n.trunc())
}

fn domain_to_rule(domain: &geodat::Domain) -> Option<DomainRule> {
    use geodat::domain::Type;

    let kind = match Type::try_from(domain.r#type) {
        Ok(Type::Full) => MatchKind::Full,
        Ok(Type::RootDomain) => MatchKind::Domain,
        Ok(Type::Regex) => MatchKind::Regex,
        Ok(Type::Plain) | Err(_) => return None,
    };
    let value = match kind {
        MatchKind::Regex => domain.value.clone(),
        MatchKind::Full | MatchKind::Domain => domain.value.to_lowercase(),
    };
    Some(DomainRule { kind, value })
}

/// Verify geoip file integrity by decoding it
pub fn verify_geoip(path: impl AsRef<Path>) -> Result<()> {
    load_geoip(path, &[])?;
    Ok(())
}

/// Verify geosite file integrity by decoding it
pub fn verify_geosite(path: impl AsRef<Path>) -> Result<()> {
    load_geosite(path, &[])?;
    Ok(())
}

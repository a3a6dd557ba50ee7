//! Integration tests for geographic sets built from DAT files.

use std::fs;
use std::net::{IpAddr, Ipv6Addr};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use datahub_r::geo::dat::geodat::{domain::Type, Cidr, Domain, GeoIp, GeoIpList, GeoSite, GeoSiteList};
use datahub_r::geo::dat;
use datahub_r::{
    CatalogErrorKind, Classification, DataHub, Fetcher, HubError, HubOptions, ListKind, MatchKind,
    Result,
};
use prost::Message;

fn geoip_dat() -> Vec<u8> {
    GeoIpList {
        entry: vec![
            GeoIp {
                country_code: "cn".to_string(),
                cidr: vec![
                    Cidr { ip: vec![1, 0, 1, 0], prefix: 24 },
                    Cidr { ip: vec![223, 0, 0, 0], prefix: 8 },
                    Cidr {
                        ip: "2400:da00::".parse::<Ipv6Addr>().unwrap().octets().to_vec(),
                        prefix: 32,
                    },
                ],
                reverse_match: false,
            },
            GeoIp {
                country_code: "us".to_string(),
                cidr: vec![Cidr { ip: vec![8, 8, 8, 0], prefix: 24 }],
                reverse_match: false,
            },
        ],
    }
    .encode_to_vec()
}

fn geosite_dat() -> Vec<u8> {
    let domain = |t: Type, v: &str| Domain {
        r#type: t as i32,
        value: v.to_string(),
        attribute: vec![],
    };
    GeoSiteList {
        entry: vec![
            GeoSite {
                country_code: "ads".to_string(),
                domain: vec![
                    domain(Type::Regex, r"^ads\."),
                    domain(Type::Full, "tracker.example.net"),
                    domain(Type::Plain, "banner"),
                ],
            },
            GeoSite {
                country_code: "cn".to_string(),
                domain: vec![domain(Type::RootDomain, "baidu.com"), domain(Type::RootDomain, "cn")],
            },
        ],
    }
    .encode_to_vec()
}

fn write(path: &Path, bytes: &[u8]) {
    fs::write(path, bytes).unwrap();
}

struct CountingFetcher {
    body: Vec<u8>,
    calls: AtomicUsize,
}

impl Fetcher for CountingFetcher {
    fn fetch(&self, _url: &str, _timeout: Duration) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

#[test]
fn test_geosite_regex_and_full() {
    let dir = tempfile::tempdir().unwrap();
    let geosite = dir.path().join("geosite.dat");
    write(&geosite, &geosite_dat());

    let options = HubOptions {
        geosite_path: Some(geosite),
        geosite_cache: vec!["ads".to_string()],
        ..Default::default()
    };
    let hub = DataHub::from_options(&options).unwrap();

    assert!(hub.match_geosite(MatchKind::Regex, "ads", "ads.example.com"));
    assert!(!hub.match_geosite(MatchKind::Full, "ads", "ads.example.com"));
    assert!(hub.match_geosite(MatchKind::Full, "ADS", "tracker.example.net"));
    // plain (keyword) entries are not loaded
    assert!(!hub.match_mixed("ads", "banner.example.com"));
    assert_eq!(hub.geosite_codes(), vec!["ADS"]);
}

#[test]
fn test_geoip_cache_tags() {
    let dir = tempfile::tempdir().unwrap();
    let geoip = dir.path().join("geoip.dat");
    write(&geoip, &geoip_dat());

    let options = HubOptions {
        geoip_path: Some(geoip),
        geoip_cache: vec!["cn".to_string()],
        ..Default::default()
    };
    let hub = DataHub::from_options(&options).unwrap();

    let ip = |s: &str| s.parse::<IpAddr>().unwrap();
    assert!(hub.match_geoip("cn", ip("1.0.1.1")));
    assert!(hub.match_geoip("cn", ip("2400:da00::6666")));
    assert!(!hub.match_geoip("cn", ip("1.0.2.1")));
    // only cached codes are in memory
    assert!(!hub.match_geoip("us", ip("8.8.8.8")));
    assert_eq!(hub.stats().value(Classification::Network, "CN"), 2);

    let listed = hub.list_entries(ListKind::GeoIp, "cn", Some(2));
    assert_eq!(listed, vec!["1.0.1.0/24", "223.0.0.0/8"]);
}

#[test]
fn test_missing_geo_cache_is_fatal() {
    let options = HubOptions {
        geoip_path: Some("/nonexistent/geoip.dat".into()),
        geoip_cache: vec!["cn".to_string()],
        ..Default::default()
    };
    let err = DataHub::from_options(&options).err().unwrap();
    assert!(matches!(
        err,
        HubError::Catalog { kind: CatalogErrorKind::FileError, .. }
    ));

    let options = HubOptions {
        geosite_cache: vec!["cn".to_string()],
        ..Default::default()
    };
    let err = DataHub::from_options(&options).err().unwrap();
    assert!(matches!(
        err,
        HubError::Catalog { kind: CatalogErrorKind::NotConfigured, .. }
    ));
}

#[test]
fn test_missing_catalog_downloaded_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let geoip = dir.path().join("data").join("geoip.dat");

    let fetcher = Arc::new(CountingFetcher {
        body: geoip_dat(),
        calls: AtomicUsize::new(0),
    });
    let options = HubOptions {
        geoip_path: Some(geoip.clone()),
        geoip_upgrade_url: Some("https://mirror.example.com/geoip.dat".to_string()),
        geoip_cache: vec!["us".to_string()],
        ..Default::default()
    };
    let hub = DataHub::from_options_with_fetcher(&options, fetcher.clone()).unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert!(geoip.exists());
    assert!(hub.match_geoip("us", "8.8.8.8".parse().unwrap()));

    // file is fresh: no download unless forced
    hub.reload_geo(false).unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    hub.reload_geo(true).unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_geo_reload_picks_up_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let geosite = dir.path().join("geosite.dat");
    write(&geosite, &geosite_dat());

    let options = HubOptions {
        geosite_path: Some(geosite.clone()),
        geosite_cache: vec!["cn".to_string()],
        ..Default::default()
    };
    let hub = DataHub::from_options(&options).unwrap();
    assert!(hub.match_mixed("cn", "www.baidu.com"));
    assert!(!hub.match_mixed("cn", "www.qq.com"));

    let updated = GeoSiteList {
        entry: vec![GeoSite {
            country_code: "cn".to_string(),
            domain: vec![Domain {
                r#type: Type::RootDomain as i32,
                value: "qq.com".to_string(),
                attribute: vec![],
            }],
        }],
    }
    .encode_to_vec();
    write(&geosite, &updated);
    hub.reload_geo(false).unwrap();

    assert!(hub.match_mixed("cn", "www.qq.com"));
    // an earlier hit may still be served from the match cache
    assert!(hub.match_mixed("cn", "www.baidu.com"));
    assert!(!hub.match_geosite(MatchKind::Domain, "cn", "www.baidu.com"));
}

#[test]
fn test_verify_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geoip.dat");
    write(&path, &[0xff, 0xfe, 0xfd]);
    assert!(dat::verify_geoip(&path).is_err());

    write(&path, &geoip_dat());
    assert!(dat::verify_geoip(&path).is_ok());
}

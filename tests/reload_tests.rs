//! Integration tests for the background reload driver.

#![cfg(feature = "async")]

use std::sync::Arc;
use std::time::Duration;

use datahub_r::{
    DataHub, Fetcher, HubError, HubOptions, MemoryCatalog, DomainRule, MatchKind, ReloadDriver,
    ReloadRequest, Result, TableKind, TableSpec,
};
use parking_lot::Mutex;

struct SwappableFetcher {
    body: Mutex<Option<String>>,
}

impl SwappableFetcher {
    fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Some(body.to_string())),
        })
    }

    fn set(&self, body: Option<&str>) {
        *self.body.lock() = body.map(str::to_string);
    }
}

impl Fetcher for SwappableFetcher {
    fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>> {
        match self.body.lock().as_ref() {
            Some(body) => Ok(body.as_bytes().to_vec()),
            None => Err(HubError::Fetch {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

fn keyword_hub(fetcher: Arc<SwappableFetcher>, tags: &[&str]) -> Arc<DataHub> {
    let hub = DataHub::new().with_fetcher(fetcher);
    hub.add_table(&TableSpec {
        kind: TableKind::Keyword,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        from: "https://rules.example.com/kw.txt".to_string(),
    });
    Arc::new(hub)
}

#[tokio::test]
async fn test_spawn_reload_applies_new_content() {
    let fetcher = SwappableFetcher::new("alpha\n");
    let hub = keyword_hub(fetcher.clone(), &["a", "b", "c"]);
    let driver = ReloadDriver::new(Arc::clone(&hub), 2, Duration::from_secs(60), Duration::from_secs(60));

    assert!(hub.match_keyword("b", "alpha.com"));
    fetcher.set(Some("beta\n"));

    let summary = driver.spawn_reload(ReloadRequest::all()).await.unwrap();
    assert_eq!(summary.reloaded, 3);
    assert!(!hub.match_keyword("b", "alpha.com"));
    assert!(hub.match_keyword("c", "beta.com"));

    // unrelated kinds are untouched
    let summary = driver
        .spawn_reload(ReloadRequest { domain: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(summary.reloaded + summary.unchanged + summary.failed, 0);
}

#[tokio::test]
async fn test_failed_jobs_are_counted_and_data_kept() {
    let fetcher = SwappableFetcher::new("alpha\n");
    let hub = keyword_hub(fetcher.clone(), &["a", "b"]);
    let driver = ReloadDriver::new(Arc::clone(&hub), 1, Duration::from_secs(60), Duration::from_secs(60));

    fetcher.set(None);
    let summary = driver.spawn_reload(ReloadRequest::all()).await.unwrap();
    assert_eq!(summary.failed, 2);
    assert!(hub.match_keyword("a", "alpha.com"));

    // the driver keeps working after failures
    fetcher.set(Some("gamma\n"));
    let summary = driver.spawn_reload(ReloadRequest::all()).await.unwrap();
    assert_eq!(summary.reloaded, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_periodic_reload() {
    let fetcher = SwappableFetcher::new("alpha\n");
    let hub = keyword_hub(fetcher.clone(), &["a"]);

    let options = HubOptions {
        reload_interval_secs: 1,
        ..Default::default()
    };
    let driver = ReloadDriver::from_options(Arc::clone(&hub), &options);
    let handles = driver.start();

    fetcher.set(Some("delta\n"));
    let mut applied = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if hub.match_keyword("a", "delta.com") {
            applied = true;
            break;
        }
    }
    assert!(applied, "scheduled reload did not run");

    driver.shutdown();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_spawn_geo_reload() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_geosite("ads", vec![DomainRule::new(MatchKind::Regex, r"^ads\.")]);
    let hub = Arc::new(
        DataHub::new()
            .with_catalog(Arc::new(catalog))
            .with_geo_tags(Vec::new(), vec!["ads".to_string()]),
    );
    assert!(!hub.match_geosite(MatchKind::Regex, "ads", "ads.example.com"));

    let driver = ReloadDriver::new(Arc::clone(&hub), 1, Duration::from_secs(60), Duration::from_secs(60));
    driver.spawn_geo_reload(false).await.unwrap();
    assert!(hub.match_geosite(MatchKind::Regex, "ads", "ads.example.com"));
}

use std::io::Read;
use std::time::Duration;

use crate::error::{HubError, Result};

/// Default timeout for remote table and catalog downloads
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote body fetcher used by URL-backed tables and catalog refresh.
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`, failing after `timeout`
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher built on `ureq`
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let response = agent
            .get(url)
            .call()
            .map_err(|e| HubError::fetch(url, e))?;

        let (_, body) = response.into_parts();
        let mut reader = body.into_reader();
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| HubError::fetch(url, e))?;

        log::debug!("fetched {} bytes from {}", buf.len(), url);
        Ok(buf)
    }
}

/// Fetcher that refuses every request, for hubs with no network access
#[derive(Debug, Default, Clone)]
pub struct NilFetcher;

impl Fetcher for NilFetcher {
    fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>> {
        Err(HubError::fetch(url, "remote fetch not available"))
    }
}

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use super::dat;
use crate::error::{CatalogErrorKind, HubError, Result};
use crate::table::Fetcher;

/// Default catalog freshness window: 7 days
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Download `url` into `path` through a `<path>.tmp` staging file.
///
/// The staged file must pass `verify` before it replaces `path`; on any
/// failure the existing file is left untouched.
pub fn refresh_catalog_file(
    path: &Path,
    url: &str,
    fetcher: &dyn Fetcher,
    timeout: Duration,
    verify: impl Fn(&Path) -> Result<()>,
) -> Result<()> {
    log::info!("Downloading {} from {}", path.display(), url);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let body = fetcher.fetch(url, timeout).map_err(|e| {
        HubError::catalog(CatalogErrorKind::DownloadFailed, format!("Download failed: {}", e))
    })?;

    let tmp = tmp_path(path);
    fs::write(&tmp, &body)?;

    if let Err(e) = verify(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(HubError::catalog(
            CatalogErrorKind::DownloadFailed,
            format!("Verification failed: {}", e),
        ));
    }

    fs::rename(&tmp, path)?;
    log::info!("Downloaded {} successfully ({} bytes)", path.display(), body.len());
    Ok(())
}

/// Keeps the on-disk geoip/geosite files fresh from their upgrade URLs.
pub struct CatalogUpdater {
    geoip: Option<(PathBuf, String)>,
    geosite: Option<(PathBuf, String)>,
    update_interval: Duration,
    download_lock: Mutex<()>,
}

impl CatalogUpdater {
    pub fn new() -> Self {
        Self {
            geoip: None,
            geosite: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            download_lock: Mutex::new(()),
        }
    }

    /// Refresh `path` (a geoip.dat) from `url`
    pub fn with_geoip(mut self, path: impl AsRef<Path>, url: impl Into<String>) -> Self {
        self.geoip = Some((path.as_ref().to_path_buf(), url.into()));
        self
    }

    /// Refresh `path` (a geosite.dat) from `url`
    pub fn with_geosite(mut self, path: impl AsRef<Path>, url: impl Into<String>) -> Self {
        self.geosite = Some((path.as_ref().to_path_buf(), url.into()));
        self
    }

    /// Files older than this are downloaded again by [`CatalogUpdater::refresh`]
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.geoip.is_some() || self.geosite.is_some()
    }

    /// Missing, empty or stale files need a download
    pub fn should_download(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(meta) => {
                if meta.len() == 0 {
                    return true;
                }
                match meta.modified() {
                    Ok(mtime) => SystemTime::now()
                        .duration_since(mtime)
                        .map(|d| d > self.update_interval)
                        .unwrap_or(true),
                    Err(_) => true,
                }
            }
            Err(_) => true,
        }
    }

    /// Download every configured file that is stale (or all of them when
    /// `force` is set). Returns true if at least one file was replaced.
    ///
    /// A failed download is tolerated while an older file exists.
    pub fn refresh(&self, fetcher: &dyn Fetcher, timeout: Duration, force: bool) -> Result<bool> {
        let _lock = self.download_lock.lock();
        let mut replaced = false;

        let targets: [(&Option<(PathBuf, String)>, fn(&Path) -> Result<()>); 2] = [
            (&self.geoip, |p: &Path| dat::verify_geoip(p)),
            (&self.geosite, |p: &Path| dat::verify_geosite(p)),
        ];

        for (target, verify) in targets {
            let Some((path, url)) = target else {
                continue;
            };
            if !force && !self.should_download(path) {
                continue;
            }
            match refresh_catalog_file(path, url, fetcher, timeout, verify) {
                Ok(()) => replaced = true,
                Err(e) if path.exists() => {
                    log::warn!("Download failed, using existing file {}: {}", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(replaced)
    }
}

impl Default for CatalogUpdater {
    fn default() -> Self {
        Self::new()
    }
}

//! Reloadable, tag-scoped rule tables.

mod data;
mod fetch;
pub mod parser;

pub use data::RuleData;
pub use fetch::{Fetcher, HttpFetcher, NilFetcher, DEFAULT_FETCH_TIMEOUT};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::{normalize_tag, TableKind};

/// Where a table's rule lines come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(String),
    Inline(String),
}

impl Source {
    /// `http(s)://` is a URL and an existing path is a file. Text that opens
    /// with `tag` (as a bare word or a `TAG:` prefix) is inline rule text.
    /// Anything else is a file path that is not there yet: the first load
    /// reports it and later reloads pick the file up once it appears.
    pub fn classify(tag: &str, from: &str) -> Self {
        let from = from.trim();
        let lower = from.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Source::Url(from.to_string());
        }
        if Path::new(from).is_file() {
            return Source::File(PathBuf::from(from));
        }
        if opens_with_tag(tag, from) {
            return Source::Inline(from.to_string());
        }
        log::warn!("{}: source {} not found", normalize_tag(tag), from);
        Source::File(PathBuf::from(from))
    }
}

fn opens_with_tag(tag: &str, text: &str) -> bool {
    let head = text
        .split(|c: char| c == ':' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    !head.is_empty() && normalize_tag(head) == normalize_tag(tag)
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "file:{}", path.display()),
            Source::Url(url) => write!(f, "url:{}", url),
            Source::Inline(_) => f.write_str("inline"),
        }
    }
}

/// Result of a reload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Source unchanged since the last successful load
    Unchanged,
    /// Backing set replaced
    Reloaded { entries: usize, skipped: usize },
    /// Inline tables are parsed once at construction
    Static,
}

#[derive(Debug, Default)]
struct LoadState {
    loaded: bool,
    mtime: Option<SystemTime>,
    size: u64,
    digest: Option<[u8; 32]>,
    loaded_at: Option<SystemTime>,
}

/// One named, typed rule table.
///
/// Readers load the current backing set without locking; a reload builds a
/// complete replacement off to the side and publishes it with one atomic
/// store. A failed reload leaves the previous set in place.
pub struct DataTable {
    tag: String,
    kind: TableKind,
    source: Source,
    data: ArcSwap<RuleData>,
    state: Mutex<LoadState>,
    // serializes reloads of this table; never held by readers
    reload_lock: Mutex<()>,
}

impl DataTable {
    /// Create a table. Inline sources are parsed immediately; file and URL
    /// sources start empty until [`DataTable::load`] runs.
    pub fn new(kind: TableKind, tag: &str, source: Source) -> Self {
        let tag = normalize_tag(tag);
        let mut state = LoadState::default();

        let data = match &source {
            Source::Inline(text) => {
                // `TAG word word` form: the leading bare tag is not a rule
                let mut words = text.split_whitespace().peekable();
                words.next_if(|w| normalize_tag(w) == tag);
                let (data, skipped) = RuleData::parse(kind, &tag, words);
                if skipped > 0 {
                    log::warn!("{} {}: skipped {} inline entries", kind, tag, skipped);
                }
                state.loaded = true;
                state.loaded_at = Some(SystemTime::now());
                data
            }
            Source::File(_) | Source::Url(_) => RuleData::empty(kind),
        };

        Self {
            tag,
            kind,
            source,
            data: ArcSwap::from_pointee(data),
            state: Mutex::new(state),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create a table from a raw `from` string, see [`Source::classify`]
    pub fn from_args(kind: TableKind, tag: &str, from: &str) -> Self {
        Self::new(kind, tag, Source::classify(tag, from))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Current backing set
    pub fn data(&self) -> Arc<RuleData> {
        self.data.load_full()
    }

    /// Force a parse of the source regardless of change metadata
    pub fn load(&self, fetcher: &dyn Fetcher, timeout: Duration) -> Result<ReloadOutcome> {
        self.reload(fetcher, timeout, true)
    }

    /// Re-parse the source only if it changed since the last load.
    ///
    /// Files compare modification time and size, URLs compare a SHA-256 of
    /// the fetched body.
    pub fn reload_if_changed(
        &self,
        fetcher: &dyn Fetcher,
        timeout: Duration,
    ) -> Result<ReloadOutcome> {
        self.reload(fetcher, timeout, false)
    }

    fn reload(&self, fetcher: &dyn Fetcher, timeout: Duration, force: bool) -> Result<ReloadOutcome> {
        let _guard = self.reload_lock.lock();
        match &self.source {
            Source::Inline(_) => Ok(ReloadOutcome::Static),
            Source::File(path) => self.reload_file(path, force),
            Source::Url(url) => self.reload_url(url, fetcher, timeout, force),
        }
    }

    fn reload_file(&self, path: &Path, force: bool) -> Result<ReloadOutcome> {
        let meta = fs::metadata(path)?;
        let mtime = meta.modified().ok();
        let size = meta.len();

        {
            let state = self.state.lock();
            if !force && state.loaded && mtime.is_some() && state.mtime == mtime && state.size == size
            {
                return Ok(ReloadOutcome::Unchanged);
            }
        }

        let bytes = fs::read(path)?;
        let outcome = self.publish(&bytes);

        let mut state = self.state.lock();
        state.loaded = true;
        state.mtime = mtime;
        state.size = size;
        state.loaded_at = Some(SystemTime::now());
        Ok(outcome)
    }

    fn reload_url(
        &self,
        url: &str,
        fetcher: &dyn Fetcher,
        timeout: Duration,
        force: bool,
    ) -> Result<ReloadOutcome> {
        let bytes = fetcher.fetch(url, timeout)?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();

        {
            let state = self.state.lock();
            if !force && state.loaded && state.digest == Some(digest) {
                return Ok(ReloadOutcome::Unchanged);
            }
        }

        let outcome = self.publish(&bytes);

        let mut state = self.state.lock();
        state.loaded = true;
        state.digest = Some(digest);
        state.size = bytes.len() as u64;
        state.loaded_at = Some(SystemTime::now());
        Ok(outcome)
    }

    fn publish(&self, bytes: &[u8]) -> ReloadOutcome {
        let text = String::from_utf8_lossy(bytes);
        let (data, skipped) = RuleData::parse(self.kind, &self.tag, text.lines());
        let entries = data.len();
        self.data.store(Arc::new(data));

        if skipped > 0 {
            log::warn!(
                "{} {}: skipped {} malformed lines from {}",
                self.kind,
                self.tag,
                skipped,
                self.source
            );
        }
        log::info!(
            "{} {}: loaded {} entries from {}",
            self.kind,
            self.tag,
            entries,
            self.source
        );
        ReloadOutcome::Reloaded { entries, skipped }
    }

    /// Name-level match against the current backing set
    pub fn match_name(&self, name: &str) -> bool {
        self.data.load().matches(name)
    }

    /// Network-level match against the current backing set
    pub fn match_net(&self, net: &ipnet::IpNet) -> bool {
        self.data.load().match_net(net)
    }

    pub fn len(&self) -> usize {
        self.data.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit at most `limit` entries (0 means all)
    pub fn for_each<F>(&self, limit: usize, f: F)
    where
        F: FnMut(String),
    {
        self.data.load().for_each(limit, f);
    }

    /// One-line summary: tag, source and the first entries
    pub fn describe(&self) -> String {
        format!(
            "DataTable{{tag:{}, source:{}, {}}}",
            self.tag,
            self.source,
            self.data.load().summary()
        )
    }
}

impl fmt::Debug for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTable")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("len", &self.len())
            .finish()
    }
}

//! Host subordinate id lookup

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use quadlet_core::IdRanges;

/// Default location of the subordinate uid database
pub const SUBUID_PATH: &str = "/etc/subuid";
/// Default location of the subordinate gid database
pub const SUBGID_PATH: &str = "/etc/subgid";

/// Source of subordinate id ranges delegated to host accounts
///
/// This allows for different implementations:
/// - [`HostSubIds`] - Production lookup in `/etc/subuid` and `/etc/subgid`
/// - [`StaticSubIds`] - In-memory table for tests and embedding
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one source serves concurrent
/// conversions.
pub trait SubIdSource: Send + Sync {
    /// Subordinate uids of `name`, or `None` if it has none
    fn subuids(&self, name: &str) -> Option<IdRanges>;

    /// Subordinate gids of `name`, or `None` if it has none
    fn subgids(&self, name: &str) -> Option<IdRanges>;
}

/// Collect the ranges of `name` from a `name:start:count` database
///
/// Blank lines, comments, malformed and zero-length entries are skipped.
#[must_use]
pub fn parse_subid_file(contents: &str, name: &str) -> Option<IdRanges> {
    let mut ranges = IdRanges::empty();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.splitn(3, ':');
        let (Some(owner), Some(start), Some(count)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if owner != name {
            continue;
        }

        match (start.trim().parse::<u32>(), count.trim().parse::<u32>()) {
            (Ok(start), Ok(count)) if count > 0 => ranges.add(start, count),
            _ => tracing::debug!(line, "Skipping malformed subordinate id entry"),
        }
    }

    (!ranges.is_empty()).then_some(ranges)
}

/// Subordinate ids from the host's `/etc/subuid` and `/etc/subgid`
///
/// Each database is read at most once per instance.
#[derive(Debug)]
pub struct HostSubIds {
    subuid_path: PathBuf,
    subgid_path: PathBuf,
    subuid: OnceLock<String>,
    subgid: OnceLock<String>,
}

impl HostSubIds {
    /// Use the standard database locations
    #[must_use]
    pub fn new() -> Self {
        Self::with_paths(SUBUID_PATH, SUBGID_PATH)
    }

    /// Use custom database locations
    #[must_use]
    pub fn with_paths(subuid: impl Into<PathBuf>, subgid: impl Into<PathBuf>) -> Self {
        Self {
            subuid_path: subuid.into(),
            subgid_path: subgid.into(),
            subuid: OnceLock::new(),
            subgid: OnceLock::new(),
        }
    }

    fn contents<'a>(cell: &'a OnceLock<String>, path: &Path) -> &'a str {
        cell.get_or_init(|| match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Subordinate id database unavailable");
                String::new()
            }
        })
    }
}

impl Default for HostSubIds {
    fn default() -> Self {
        Self::new()
    }
}

impl SubIdSource for HostSubIds {
    fn subuids(&self, name: &str) -> Option<IdRanges> {
        parse_subid_file(Self::contents(&self.subuid, &self.subuid_path), name)
    }

    fn subgids(&self, name: &str) -> Option<IdRanges> {
        parse_subid_file(Self::contents(&self.subgid, &self.subgid_path), name)
    }
}

/// In-memory subordinate id table
///
/// # Example
/// ```
/// use quadlet_userns::{IdRanges, StaticSubIds, SubIdSource};
///
/// let source = StaticSubIds::new().with_uids("app", IdRanges::of(100_000, 65_536));
/// assert_eq!(source.subuids("app").unwrap().total_len(), 65_536);
/// assert!(source.subgids("app").is_none());
/// assert_eq!(source.lookup_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct StaticSubIds {
    uids: HashMap<String, IdRanges>,
    gids: HashMap<String, IdRanges>,
    lookups: AtomicUsize,
}

impl StaticSubIds {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register subordinate uids for `name`
    #[must_use]
    pub fn with_uids(mut self, name: impl Into<String>, ranges: IdRanges) -> Self {
        self.uids.insert(name.into(), ranges);
        self
    }

    /// Register subordinate gids for `name`
    #[must_use]
    pub fn with_gids(mut self, name: impl Into<String>, ranges: IdRanges) -> Self {
        self.gids.insert(name.into(), ranges);
        self
    }

    /// Number of lookups served (for testing)
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl SubIdSource for StaticSubIds {
    fn subuids(&self, name: &str) -> Option<IdRanges> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(name, "Static: subuid lookup");
        self.uids.get(name).cloned()
    }

    fn subgids(&self, name: &str) -> Option<IdRanges> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(name, "Static: subgid lookup");
        self.gids.get(name).cloned()
    }
}

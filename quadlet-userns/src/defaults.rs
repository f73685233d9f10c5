//! Default remapping pools

use std::fmt;
use std::sync::{Arc, OnceLock};

use quadlet_core::IdRanges;

use crate::subid::{HostSubIds, SubIdSource};

/// Account whose subordinate ids back the default pools
pub const DEFAULT_REMAP_USER: &str = "quadlet";
/// First id of the fallback pool
pub const FALLBACK_REMAP_START: u32 = 1_879_048_192;
/// Size of the fallback pool
pub const FALLBACK_REMAP_LENGTH: u32 = 165_536;

/// Default uid and gid pools for `RemapUsers=yes` containers
///
/// Each pool comes from the subordinate ids of [`DEFAULT_REMAP_USER`], or
/// the fixed fallback pool if that account has none. Each is resolved at most
/// once per instance, even under concurrent first use; share one instance
/// behind an [`Arc`].
pub struct RemapDefaults {
    source: Arc<dyn SubIdSource>,
    uids: OnceLock<IdRanges>,
    gids: OnceLock<IdRanges>,
}

impl RemapDefaults {
    /// Resolve defaults from the given source
    #[must_use]
    pub fn new(source: Arc<dyn SubIdSource>) -> Self {
        Self {
            source,
            uids: OnceLock::new(),
            gids: OnceLock::new(),
        }
    }

    /// Resolve defaults from the host databases
    #[must_use]
    pub fn host() -> Self {
        Self::new(Arc::new(HostSubIds::new()))
    }

    /// The subordinate id source, also used for per-unit name lookups
    #[must_use]
    pub fn source(&self) -> &dyn SubIdSource {
        self.source.as_ref()
    }

    /// Default uid pool
    pub fn uids(&self) -> &IdRanges {
        self.uids
            .get_or_init(|| resolve("uid", self.source.subuids(DEFAULT_REMAP_USER)))
    }

    /// Default gid pool
    pub fn gids(&self) -> &IdRanges {
        self.gids
            .get_or_init(|| resolve("gid", self.source.subgids(DEFAULT_REMAP_USER)))
    }
}

fn resolve(axis: &str, configured: Option<IdRanges>) -> IdRanges {
    match configured {
        Some(ranges) => {
            tracing::debug!(axis, ranges = %ranges, user = DEFAULT_REMAP_USER, "Using subordinate ids for default remap pool");
            ranges
        }
        None => {
            tracing::debug!(axis, "Using fallback default remap pool");
            IdRanges::of(FALLBACK_REMAP_START, FALLBACK_REMAP_LENGTH)
        }
    }
}

impl Default for RemapDefaults {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Debug for RemapDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemapDefaults")
            .field("uids", &self.uids.get())
            .field("gids", &self.gids.get())
            .finish_non_exhaustive()
    }
}

//! Conversion options

use std::sync::Arc;

use quadlet_core::{CallerIdentity, UnitScope};
use quadlet_userns::{RemapDefaults, SubIdSource};

/// Options shared by all conversions of one generator run
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Scope of the service manager the units are generated for
    pub scope: UnitScope,

    /// Identity used for `KeepId=yes` in the user scope
    pub caller: CallerIdentity,

    /// Default pools for `RemapUsers=yes`, resolved once and shared
    pub remap_defaults: Arc<RemapDefaults>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            scope: UnitScope::System,
            caller: CallerIdentity::current(),
            remap_defaults: Arc::new(RemapDefaults::host()),
        }
    }
}

impl ConvertOptions {
    /// Create options for the given scope
    #[must_use]
    pub fn new(scope: UnitScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    /// Set the scope
    #[must_use]
    pub fn with_scope(mut self, scope: UnitScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the caller identity
    #[must_use]
    pub fn with_caller(mut self, caller: CallerIdentity) -> Self {
        self.caller = caller;
        self
    }

    /// Share an existing set of default remap pools
    #[must_use]
    pub fn with_remap_defaults(mut self, defaults: Arc<RemapDefaults>) -> Self {
        self.remap_defaults = defaults;
        self
    }

    /// Resolve default pools and account lookups from `source`
    #[must_use]
    pub fn with_subid_source(self, source: Arc<dyn SubIdSource>) -> Self {
        self.with_remap_defaults(Arc::new(RemapDefaults::new(source)))
    }
}

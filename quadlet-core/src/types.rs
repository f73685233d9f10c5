//! Unit naming and scope types with validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Kind of quadlet source unit, derived from its file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// `.container` unit, converted to a `podman run` service
    Container,
    /// `.volume` unit, converted to a `podman volume create` oneshot
    Volume,
}

impl UnitKind {
    /// All supported kinds
    pub const ALL: [Self; 2] = [Self::Container, Self::Volume];

    /// Source file extension, including the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Container => ".container",
            Self::Volume => ".volume",
        }
    }

    /// Primary group of the source unit
    #[must_use]
    pub const fn source_group(self) -> &'static str {
        match self {
            Self::Container => "Container",
            Self::Volume => "Volume",
        }
    }

    /// Name the primary group is renamed to in the generated unit
    #[must_use]
    pub const fn generated_group(self) -> &'static str {
        match self {
            Self::Container => "X-Container",
            Self::Volume => "X-Volume",
        }
    }

    /// Kind matching the extension of `file_name`, if supported
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| file_name.ends_with(kind.extension()))
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::Volume => write!(f, "volume"),
        }
    }
}

/// Execution scope the generator runs for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitScope {
    /// Privileged, system-wide service manager
    #[default]
    System,
    /// Unprivileged per-user service manager
    User,
}

impl UnitScope {
    /// Whether this is the per-user scope
    #[must_use]
    pub const fn is_user(self) -> bool {
        matches!(self, Self::User)
    }
}

impl fmt::Display for UnitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Validated quadlet source file name, such as `web.container`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitName(String);

impl UnitName {
    /// Create a new `UnitName` with validation
    ///
    /// # Errors
    /// Returns error if the name is empty, contains a path separator, has an
    /// unsupported extension or an empty base name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidConfig {
                message: "Unit name cannot be empty".to_string(),
            });
        }

        if name.contains('/') {
            return Err(Error::InvalidConfig {
                message: format!("Unit name '{name}' cannot contain '/'"),
            });
        }

        let Some(kind) = UnitKind::from_file_name(name) else {
            return Err(Error::InvalidConfig {
                message: format!("Unit name '{name}' must end in .container or .volume"),
            });
        };

        if name.len() == kind.extension().len() {
            return Err(Error::InvalidConfig {
                message: format!("Unit name '{name}' has an empty base name"),
            });
        }

        Ok(())
    }

    /// Kind selected by the extension
    #[must_use]
    pub fn kind(&self) -> UnitKind {
        // Validated in `new`.
        UnitKind::from_file_name(&self.0).unwrap_or(UnitKind::Container)
    }

    /// File name without its extension
    #[must_use]
    pub fn base(&self) -> &str {
        &self.0[..self.0.len() - self.kind().extension().len()]
    }

    /// Name of the generated service unit
    #[must_use]
    pub fn service_name(&self) -> String {
        match self.kind() {
            UnitKind::Container => replace_extension(&self.0, ".service", "", ""),
            UnitKind::Volume => replace_extension(&self.0, ".service", "", "-volume"),
        }
    }

    /// Runtime podman volume name for `.volume` units
    #[must_use]
    pub fn volume_name(&self) -> String {
        format!("systemd-{}", self.base())
    }

    /// Get the unit name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Swap the extension of `name`, optionally decorating the base name
///
/// # Example
/// ```
/// use quadlet_core::types::replace_extension;
///
/// assert_eq!(replace_extension("db.volume", ".service", "", "-volume"), "db-volume.service");
/// assert_eq!(replace_extension("noext", ".service", "x-", ""), "x-noext.service");
/// ```
#[must_use]
pub fn replace_extension(name: &str, extension: &str, prefix: &str, suffix: &str) -> String {
    let base = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    format!("{prefix}{base}{suffix}{extension}")
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnitName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for UnitName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<UnitName> for String {
    fn from(name: UnitName) -> Self {
        name.0
    }
}

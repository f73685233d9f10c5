//! Host identity resolution

use nix::unistd::{Group, User, getgid, getuid};
use serde::{Deserialize, Serialize};

use crate::ConversionError;

/// Uid and gid of the process running the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Real user id
    pub uid: u32,
    /// Real group id
    pub gid: u32,
}

impl CallerIdentity {
    /// Create from raw ids
    #[must_use]
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Identity of the current process
    #[must_use]
    pub fn current() -> Self {
        Self {
            uid: getuid().as_raw(),
            gid: getgid().as_raw(),
        }
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConversionError {
    ConversionError::InvalidNumericField {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parse a strictly numeric u32 field
pub fn parse_u32(key: &str, value: &str) -> Result<u32, ConversionError> {
    let digits = value.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(key, value, "not a decimal number"));
    }
    digits
        .parse::<u32>()
        .map_err(|e| invalid(key, value, e.to_string()))
}

/// Parse a numeric id, rejecting the reserved `u32::MAX`
///
/// Returns `Ok(None)` when the value is not numeric at all.
fn parse_numeric_id(key: &str, value: &str) -> Result<Option<u32>, ConversionError> {
    if !value.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(None);
    }
    match value.parse::<u32>() {
        Ok(u32::MAX) => Err(invalid(key, value, "id is reserved")),
        Ok(id) => Ok(Some(id)),
        Err(e) => Err(invalid(key, value, e.to_string())),
    }
}

/// Resolve a numeric uid or a host user name
pub fn resolve_uid(key: &str, value: &str) -> Result<u32, ConversionError> {
    let value = value.trim();
    if let Some(uid) = parse_numeric_id(key, value)? {
        return Ok(uid);
    }

    match User::from_name(value) {
        Ok(Some(user)) => {
            tracing::debug!(user = value, uid = user.uid.as_raw(), "Resolved host user");
            Ok(user.uid.as_raw())
        }
        Ok(None) => Err(invalid(key, value, "unknown user")),
        Err(e) => Err(invalid(key, value, e.to_string())),
    }
}

/// Resolve a numeric gid or a host group name
pub fn resolve_gid(key: &str, value: &str) -> Result<u32, ConversionError> {
    let value = value.trim();
    if let Some(gid) = parse_numeric_id(key, value)? {
        return Ok(gid);
    }

    match Group::from_name(value) {
        Ok(Some(group)) => {
            tracing::debug!(group = value, gid = group.gid.as_raw(), "Resolved host group");
            Ok(group.gid.as_raw())
        }
        Ok(None) => Err(invalid(key, value, "unknown group")),
        Err(e) => Err(invalid(key, value, e.to_string())),
    }
}

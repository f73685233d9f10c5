//! Error types for quadlet

use thiserror::Error;

/// A single, precise reason why a source unit could not be converted
///
/// Every conversion either yields a complete generated unit or exactly one of
/// these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// A key outside the group's allow-list
    #[error("unsupported key '{key}' in group '{group}' in {unit}")]
    UnsupportedKey {
        /// Group the key was found in
        group: String,
        /// Offending key
        key: String,
        /// Path or name of the source unit
        unit: String,
    },

    /// A mandatory key is absent or empty
    #[error("no {key} key specified in group '{group}'")]
    MissingRequiredKey {
        /// Group that should contain the key
        group: String,
        /// Missing key
        key: String,
    },

    /// A key holds a value outside its allowed set
    #[error("invalid {key} '{value}' in group '{group}', expected one of: {}", expected.join(", "))]
    InvalidEnumValue {
        /// Group the key was found in
        group: String,
        /// Key name
        key: String,
        /// Rejected value
        value: String,
        /// Accepted values
        expected: Vec<String>,
    },

    /// A key is only meaningful in the other execution scope
    #[error("key '{key}' in group '{group}' is not supported for {scope} units")]
    UnsupportedForMode {
        /// Group the key was found in
        group: String,
        /// Key name
        key: String,
        /// Scope the conversion ran in
        scope: String,
    },

    /// A numeric or identity field could not be resolved
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidNumericField {
        /// Key name
        key: String,
        /// Rejected value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// A port specification does not follow `digits[-digits][/tcp|/udp]`
    #[error("invalid port format '{value}'")]
    InvalidPort {
        /// Rejected port specification
        value: String,
    },

    /// Malformed id range text
    #[error("invalid id range '{text}': {reason}")]
    ParseError {
        /// Input text
        text: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Quadlet error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unit file syntax error
    #[error("{path}:{line}: {message}")]
    UnitSyntax {
        /// Source path, or a placeholder for in-memory data
        path: String,
        /// One-based line number
        line: usize,
        /// Error message
        message: String,
    },

    /// Conversion failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },
}

/// Result type alias for quadlet operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_value_message_lists_choices() {
        let err = ConversionError::InvalidEnumValue {
            group: "Service".to_string(),
            key: "KillMode".to_string(),
            value: "process".to_string(),
            expected: vec!["mixed".to_string(), "control-group".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "invalid KillMode 'process' in group 'Service', expected one of: mixed, control-group"
        );
    }

    #[test]
    fn test_conversion_error_is_transparent() {
        let err: Error = ConversionError::InvalidPort {
            value: "http".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "invalid port format 'http'");
        assert!(matches!(err, Error::Conversion(_)));
    }
}

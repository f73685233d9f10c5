//! systemd unit file model for the quadlet generator
//!
//! This crate parses unit files into an ordered, comment-preserving model,
//! offers typed lookups and mutations, and prints the model back out. It also
//! provides the systemd-style word splitting and quoting used for command
//! lines stored in unit keys.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod parser;
pub mod unitfile;
pub mod words;

pub use unitfile::UnitFile;
pub use words::{apply_line_continuation, escape_words, split_words, split_words_unescaped};

/// Group holding generic unit metadata and dependencies
pub const UNIT_GROUP: &str = "Unit";
/// Group holding the service execution settings
pub const SERVICE_GROUP: &str = "Service";
/// Group holding installation targets
pub const INSTALL_GROUP: &str = "Install";

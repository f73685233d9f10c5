//! Quadlet Core - Foundation types shared by the quadlet generator
//!
//! This crate provides the error taxonomy, the identity-range algebra used for
//! uid/gid remapping, the podman command-line builder and unit naming.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod cmdline;
pub mod error;
pub mod identity;
pub mod ranges;
pub mod types;

pub use cmdline::PodmanCommand;
pub use error::{ConversionError, Error, Result};
pub use identity::CallerIdentity;
pub use ranges::{IdRanges, Interval};
pub use types::{UnitKind, UnitName, UnitScope};

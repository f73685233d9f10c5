//! User namespace id remapping
//!
//! This crate decides how container uids and gids map onto host ids:
//! - [`compute_id_maps`] - the remapping algorithm behind `--uidmap`/`--gidmap`
//! - [`SubIdSource`] - host subordinate id lookup (`/etc/subuid`, `/etc/subgid`)
//! - [`RemapDefaults`] - lazily resolved default pools shared by all conversions

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod defaults;
pub mod remap;
pub mod subid;

pub use defaults::RemapDefaults;
pub use remap::{IdMapping, add_id_maps, compute_id_maps};
pub use subid::{HostSubIds, StaticSubIds, SubIdSource};

// Re-export commonly used types
pub use quadlet_core::{IdRanges, Interval};

//! Conversion of quadlet units into systemd services
//!
//! A [`Converter`] turns a parsed `.container` unit into a service whose
//! `ExecStart` runs `podman run`, and a `.volume` unit into a oneshot service
//! running `podman volume create`. Each conversion yields either a complete
//! unit or exactly one [`ConversionError`].

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

mod container;
pub mod keys;
pub mod options;
pub mod ports;
mod volume;

pub use options::ConvertOptions;

// Re-export commonly used types
pub use quadlet_core::{ConversionError, UnitKind, UnitName, UnitScope};
pub use quadlet_unitfile::UnitFile;

/// Converts quadlet source units into generated service units
///
/// The converter is `Send + Sync` and is meant to be shared across worker
/// threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    /// Create a converter with the given options
    #[must_use]
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Options this converter runs with
    #[must_use]
    pub const fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert a source unit, dispatching on the kind implied by `name`
    ///
    /// # Example
    /// ```
    /// use quadlet_convert::{Converter, UnitFile, UnitName};
    ///
    /// let converter = Converter::default();
    /// let name = UnitName::new("data.volume").unwrap();
    /// let unit = UnitFile::parse("[Volume]\nLabel=app=web\n").unwrap();
    ///
    /// let service = converter.convert(&name, &unit).unwrap();
    /// assert_eq!(service.file_name(), Some("data-volume.service"));
    /// assert_eq!(service.lookup("Service", "Type").as_deref(), Some("oneshot"));
    /// ```
    pub fn convert(&self, name: &UnitName, unit: &UnitFile) -> Result<UnitFile, ConversionError> {
        let mut service = match name.kind() {
            UnitKind::Container => self.convert_container(unit)?,
            UnitKind::Volume => self.convert_volume(unit, name)?,
        };
        service.set_file_name(name.service_name());
        Ok(service)
    }
}

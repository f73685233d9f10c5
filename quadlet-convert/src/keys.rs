//! Group names and supported keys of quadlet source units

use quadlet_core::{ConversionError, UnitKind};
use quadlet_unitfile::UnitFile;

/// Primary group of `.container` units
pub const CONTAINER_GROUP: &str = UnitKind::Container.source_group();
/// Name of the container group in generated units
pub const X_CONTAINER_GROUP: &str = UnitKind::Container.generated_group();
/// Primary group of `.volume` units
pub const VOLUME_GROUP: &str = UnitKind::Volume.source_group();
/// Name of the volume group in generated units
pub const X_VOLUME_GROUP: &str = UnitKind::Volume.generated_group();

/// Keys accepted in `[Container]`
pub const SUPPORTED_CONTAINER_KEYS: &[&str] = &[
    "ContainerName",
    "Image",
    "Environment",
    "Exec",
    "NoNewPrivileges",
    "DropCapability",
    "AddCapability",
    "ReadOnly",
    "RemapUsers",
    "RemapUidStart",
    "RemapGidStart",
    "RemapUidRanges",
    "RemapGidRanges",
    "Notify",
    "SocketActivated",
    "ExposeHostPort",
    "PublishPort",
    "KeepId",
    "User",
    "Group",
    "HostUser",
    "HostGroup",
    "Volume",
    "PodmanArgs",
    "Label",
    "Annotation",
    "RunInit",
    "VolatileTmp",
    "Timezone",
];

/// Keys accepted in `[Volume]`
pub const SUPPORTED_VOLUME_KEYS: &[&str] = &["User", "Group", "Label"];

/// Fail on the first key of `group` that is not in `supported`
pub fn check_for_unknown_keys(
    unit: &UnitFile,
    group: &str,
    supported: &[&str],
) -> Result<(), ConversionError> {
    match unit
        .list_keys(group)
        .into_iter()
        .find(|key| !supported.contains(key))
    {
        Some(key) => Err(ConversionError::UnsupportedKey {
            group: group.to_string(),
            key: key.to_string(),
            unit: unit.display_name(),
        }),
        None => Ok(()),
    }
}

//! `.volume` to `podman volume create` service conversion

use quadlet_core::cmdline::PODMAN_BINARY;
use quadlet_core::{ConversionError, PodmanCommand, UnitName};
use quadlet_unitfile::{SERVICE_GROUP, UNIT_GROUP, UnitFile};

use crate::Converter;
use crate::keys::{SUPPORTED_VOLUME_KEYS, VOLUME_GROUP, X_VOLUME_GROUP, check_for_unknown_keys};

impl Converter {
    /// Convert a `.volume` unit into a oneshot `podman volume create` service
    ///
    /// The podman volume is named `systemd-<base>` after the unit name and is
    /// only created if it does not exist yet.
    pub fn convert_volume(
        &self,
        volume: &UnitFile,
        name: &UnitName,
    ) -> Result<UnitFile, ConversionError> {
        let mut service = volume.clone();
        service.set_file_name(name.service_name());
        if let Some(path) = volume.path() {
            service.add(UNIT_GROUP, "SourcePath", &path.display().to_string());
        }

        check_for_unknown_keys(volume, VOLUME_GROUP, SUPPORTED_VOLUME_KEYS)?;

        service.rename_group(VOLUME_GROUP, X_VOLUME_GROUP);

        let volume_name = name.volume_name();

        // Need the containers filesystem mounted to start podman
        service.add(UNIT_GROUP, "RequiresMountsFor", "%t/containers");

        let exec_condition =
            format!("/usr/bin/bash -c \"! {PODMAN_BINARY} volume exists {volume_name}\"");

        let labels = volume.lookup_all_key_val(VOLUME_GROUP, "Label");

        let mut podman = PodmanCommand::new(["volume", "create"]);

        let mut options = Vec::new();
        if let Some(uid) = volume.lookup_u32(VOLUME_GROUP, "User")? {
            options.push(format!("uid={uid}"));
        }
        if let Some(gid) = volume.lookup_u32(VOLUME_GROUP, "Group")? {
            options.push(format!("gid={gid}"));
        }
        if !options.is_empty() {
            podman.add("--opt");
            podman.add(format!("o={}", options.join(",")));
        }

        podman.add_labels(&labels);
        podman.add(volume_name.clone());

        tracing::debug!(unit = %volume.display_name(), volume = %volume_name, "Converted volume");

        service.add_cmdline(SERVICE_GROUP, "ExecStart", podman.args());
        service.setv(
            SERVICE_GROUP,
            &[
                ("Type", "oneshot"),
                ("RemainAfterExit", "yes"),
                ("ExecCondition", exec_condition.as_str()),
                // podman, the default, says nothing about which volume this is
                ("SyslogIdentifier", "%N"),
            ],
        );

        Ok(service)
    }
}

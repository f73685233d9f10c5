//! `.container` to `podman run` service conversion

use quadlet_core::cmdline::PODMAN_BINARY;
use quadlet_core::types::replace_extension;
use quadlet_core::{ConversionError, IdRanges, PodmanCommand};
use quadlet_unitfile::{SERVICE_GROUP, UNIT_GROUP, UnitFile};
use quadlet_userns::add_id_maps;

use crate::Converter;
use crate::keys::{CONTAINER_GROUP, SUPPORTED_CONTAINER_KEYS, X_CONTAINER_GROUP, check_for_unknown_keys};
use crate::ports::{PublishedPort, expose_flag};

/// Container name used when `ContainerName=` is not set
pub const DEFAULT_CONTAINER_NAME: &str = "systemd-%N";

const KILL_MODES: [&str; 2] = ["mixed", "control-group"];

/// Container id file, unique per service instance
const CID_FILE: &str = "%t/%N.cid";

fn lookup_nonempty(unit: &UnitFile, key: &str) -> Option<String> {
    unit.lookup(CONTAINER_GROUP, key).filter(|v| !v.is_empty())
}

/// Resolve a remap pool key: absent keys use `default`, an empty value means
/// no ids, a leading non-digit names a host account.
fn lookup_ranges(
    unit: &UnitFile,
    key: &str,
    by_name: impl Fn(&str) -> Option<IdRanges>,
    default: &IdRanges,
) -> Result<IdRanges, ConversionError> {
    match unit.lookup(CONTAINER_GROUP, key) {
        None => Ok(default.clone()),
        Some(value) if value.is_empty() => Ok(IdRanges::empty()),
        Some(value) if !value.starts_with(|c: char| c.is_ascii_digit()) => {
            Ok(by_name(&value).unwrap_or_default())
        }
        Some(value) => IdRanges::parse(&value),
    }
}

impl Converter {
    /// Convert a `.container` unit into a `podman run` service
    pub fn convert_container(&self, container: &UnitFile) -> Result<UnitFile, ConversionError> {
        let mut service = container.clone();
        if let Some(name) = container.file_name() {
            service.set_file_name(replace_extension(name, ".service", "", ""));
        }
        if let Some(path) = container.path() {
            service.add(UNIT_GROUP, "SourcePath", &path.display().to_string());
        }

        check_for_unknown_keys(container, CONTAINER_GROUP, SUPPORTED_CONTAINER_KEYS)?;

        // Keep the source settings around, but out of systemd's way.
        service.rename_group(CONTAINER_GROUP, X_CONTAINER_GROUP);

        let Some(image) = lookup_nonempty(container, "Image") else {
            return Err(ConversionError::MissingRequiredKey {
                group: CONTAINER_GROUP.to_string(),
                key: "Image".to_string(),
            });
        };

        let container_name = lookup_nonempty(container, "ContainerName")
            .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string());

        service.add(SERVICE_GROUP, "Environment", "PODMAN_SYSTEMD_UNIT=%n");

        match container.lookup(SERVICE_GROUP, "KillMode") {
            None => service.set(SERVICE_GROUP, "KillMode", "mixed"),
            Some(mode) if mode.is_empty() => service.set(SERVICE_GROUP, "KillMode", "mixed"),
            Some(mode) if KILL_MODES.contains(&mode.as_str()) => {}
            Some(mode) => {
                return Err(ConversionError::InvalidEnumValue {
                    group: SERVICE_GROUP.to_string(),
                    key: "KillMode".to_string(),
                    value: mode,
                    expected: KILL_MODES.iter().map(ToString::to_string).collect(),
                });
            }
        }

        let mut env = container.lookup_all_key_val(CONTAINER_GROUP, "Environment");

        service.add(UNIT_GROUP, "RequiresMountsFor", "%t/containers");
        service.add(SERVICE_GROUP, "ExecStartPre", &format!("-rm -f {CID_FILE}"));
        service.add(
            SERVICE_GROUP,
            "ExecStopPost",
            &format!("-{PODMAN_BINARY} rm -f -i --cidfile={CID_FILE}"),
        );
        service.add(SERVICE_GROUP, "ExecStopPost", &format!("-rm -f {CID_FILE}"));

        let mut podman = PodmanCommand::new(["run"]);
        podman.add(format!("--name={container_name}"));
        podman.add(format!("--cidfile={CID_FILE}"));
        podman.add_all(["--replace", "--rm", "-d"]);
        podman.add_all(["--log-driver", "journald"]);
        podman.add("--pull=never");

        // conmon and the container share the service cgroup, split by podman.
        service.set(SERVICE_GROUP, "Delegate", "yes");
        podman.add_all(["--runtime", "/usr/bin/crun", "--cgroups=split"]);

        if let Some(timezone) = lookup_nonempty(container, "Timezone") {
            podman.add(format!("--tz={timezone}"));
        }

        if container.lookup_bool(CONTAINER_GROUP, "RunInit", true) {
            podman.add("--init");
        }

        if container.lookup_bool(CONTAINER_GROUP, "Notify", false) {
            podman.add("--sdnotify=container");
        } else {
            podman.add("--sdnotify=conmon");
        }
        service.setv(SERVICE_GROUP, &[("Type", "notify"), ("NotifyAccess", "all")]);

        if !container.has_key(SERVICE_GROUP, "SyslogIdentifier") {
            service.set(SERVICE_GROUP, "SyslogIdentifier", "%N");
        }

        add_security_flags(container, &mut podman);

        if container.lookup_bool(CONTAINER_GROUP, "SocketActivated", false) {
            podman.add("--preserve-fds=1");
            env.insert("LISTEN_FDS".to_string(), "1".to_string());
            env.insert("LISTEN_PID".to_string(), "2".to_string());
        }

        self.add_identity_flags(container, &mut podman)?;

        add_volumes(container, &mut service, &mut podman);

        for port in container.lookup_all(CONTAINER_GROUP, "ExposeHostPort") {
            podman.add(expose_flag(&port)?);
        }
        for port in container.lookup_all(CONTAINER_GROUP, "PublishPort") {
            podman.add(PublishedPort::parse(&port)?.to_flag());
        }

        podman.add_env(&env);
        podman.add_labels(&container.lookup_all_key_val(CONTAINER_GROUP, "Label"));
        podman.add_annotations(&container.lookup_all_key_val(CONTAINER_GROUP, "Annotation"));

        podman.add_all(container.lookup_all_args(CONTAINER_GROUP, "PodmanArgs"));
        podman.add(image);
        if let Some(exec) = container.lookup_last_args(CONTAINER_GROUP, "Exec") {
            podman.add_all(exec);
        }

        tracing::debug!(
            unit = %container.display_name(),
            name = %container_name,
            args = podman.args().len(),
            "Converted container"
        );

        service.add_cmdline(SERVICE_GROUP, "ExecStart", podman.args());
        Ok(service)
    }

    fn add_identity_flags(
        &self,
        container: &UnitFile,
        podman: &mut PodmanCommand,
    ) -> Result<(), ConversionError> {
        let scope = self.options().scope;
        let mut default_uid = 0;
        let mut default_gid = 0;

        if container.lookup_bool(CONTAINER_GROUP, "KeepId", false) {
            if !scope.is_user() {
                return Err(ConversionError::UnsupportedForMode {
                    group: CONTAINER_GROUP.to_string(),
                    key: "KeepId".to_string(),
                    scope: scope.to_string(),
                });
            }
            default_uid = self.options().caller.uid;
            default_gid = self.options().caller.gid;
            podman.add_all(["--userns", "keep-id"]);
        }

        let uid = container
            .lookup_u32(CONTAINER_GROUP, "User")?
            .unwrap_or(default_uid);
        let gid = container
            .lookup_u32(CONTAINER_GROUP, "Group")?
            .unwrap_or(default_gid);
        let host_uid = container
            .lookup_uid(CONTAINER_GROUP, "HostUser")?
            .unwrap_or(uid);
        let host_gid = container
            .lookup_gid(CONTAINER_GROUP, "HostGroup")?
            .unwrap_or(gid);

        if uid != default_uid || gid != default_gid {
            podman.add("--user");
            if gid == default_gid {
                podman.add(uid.to_string());
            } else {
                podman.add(format!("{uid}:{gid}"));
            }
        }

        let remap_users = !scope.is_user() && container.lookup_bool(CONTAINER_GROUP, "RemapUsers", false);

        if !remap_users {
            if uid != host_uid {
                add_id_maps(podman, "--uidmap", uid, host_uid, u32::MAX, None);
            }
            if gid != host_gid {
                add_id_maps(podman, "--gidmap", gid, host_gid, u32::MAX, None);
            }
            return Ok(());
        }

        let defaults = &self.options().remap_defaults;
        let uid_pool = lookup_ranges(
            container,
            "RemapUidRanges",
            |name| defaults.source().subuids(name),
            defaults.uids(),
        )?;
        let gid_pool = lookup_ranges(
            container,
            "RemapGidRanges",
            |name| defaults.source().subgids(name),
            defaults.gids(),
        )?;
        let uid_remap_start = container
            .lookup_u32(CONTAINER_GROUP, "RemapUidStart")?
            .unwrap_or(1);
        let gid_remap_start = container
            .lookup_u32(CONTAINER_GROUP, "RemapGidStart")?
            .unwrap_or(1);

        add_id_maps(podman, "--uidmap", uid, host_uid, uid_remap_start, Some(&uid_pool));
        add_id_maps(podman, "--gidmap", gid, host_gid, gid_remap_start, Some(&gid_pool));

        Ok(())
    }
}

fn add_security_flags(container: &UnitFile, podman: &mut PodmanCommand) {
    if container.lookup_bool(CONTAINER_GROUP, "NoNewPrivileges", true) {
        podman.add("--security-opt=no-new-privileges");
    }

    let drop_caps = if container.has_key(CONTAINER_GROUP, "DropCapability") {
        container.lookup_all(CONTAINER_GROUP, "DropCapability")
    } else {
        vec!["all".to_string()]
    };
    for cap in drop_caps {
        podman.add(format!("--cap-drop={}", cap.trim().to_ascii_lowercase()));
    }

    for cap in container.lookup_all(CONTAINER_GROUP, "AddCapability") {
        podman.add(format!("--cap-add={}", cap.trim().to_ascii_lowercase()));
    }

    let read_only = container.lookup_bool(CONTAINER_GROUP, "ReadOnly", false);
    if read_only {
        podman.add("--read-only");
    }

    let volatile_tmp = container.lookup_bool(CONTAINER_GROUP, "VolatileTmp", true);
    if volatile_tmp && !read_only {
        podman.add_all(["--tmpfs", "/tmp:rw,size=512M,mode=1777"]);
    } else if read_only && !volatile_tmp {
        // A read-only root gets a tmpfs /tmp by default; honour the opt-out.
        podman.add("--read-only-tmpfs=false");
    }
}

fn add_volumes(container: &UnitFile, service: &mut UnitFile, podman: &mut PodmanCommand) {
    for volume in container.lookup_all(CONTAINER_GROUP, "Volume") {
        let mut fields = volume.splitn(3, ':');
        let first = fields.next().unwrap_or_default();
        let (source, dest, options) = match fields.next() {
            None => ("", first, None),
            Some(dest) => (first, dest, fields.next()),
        };

        let mut source = source.to_string();
        if source.starts_with('/') {
            service.add(UNIT_GROUP, "RequiresMountsFor", &source);
        } else if source.ends_with(".volume") {
            // Reference to a quadlet volume unit in the same directory.
            let volume_service = replace_extension(&source, ".service", "", "-volume");
            service.add(UNIT_GROUP, "Requires", &volume_service);
            service.add(UNIT_GROUP, "After", &volume_service);
            source = replace_extension(&source, "", "systemd-", "");
        }

        podman.add("-v");
        match (source.is_empty(), options) {
            (true, _) => podman.add(dest),
            (false, None) => podman.add(format!("{source}:{dest}")),
            (false, Some(options)) => podman.add(format!("{source}:{dest}:{options}")),
        }
    }
}

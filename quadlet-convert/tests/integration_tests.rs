use quadlet_convert::*;
use quadlet_core::CallerIdentity;
use quadlet_unitfile::split_words_unescaped;
use quadlet_userns::{IdRanges, StaticSubIds};
use std::sync::Arc;

const BASE_ARGS: &[&str] = &[
    "/usr/bin/podman",
    "run",
    "--name=systemd-%N",
    "--cidfile=%t/%N.cid",
    "--replace",
    "--rm",
    "-d",
    "--log-driver",
    "journald",
    "--pull=never",
    "--runtime",
    "/usr/bin/crun",
    "--cgroups=split",
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn converter(scope: UnitScope) -> Converter {
    init_tracing();
    let source = StaticSubIds::new()
        .with_uids("quadlet", IdRanges::of(100_000, 65_536))
        .with_uids("app", IdRanges::of(300_000, 1000))
        .with_gids("app", IdRanges::of(400_000, 1000));
    Converter::new(
        ConvertOptions::new(scope)
            .with_caller(CallerIdentity::new(1000, 1000))
            .with_subid_source(Arc::new(source)),
    )
}

fn convert(scope: UnitScope, text: &str) -> Result<UnitFile, ConversionError> {
    let unit = UnitFile::parse(text).unwrap();
    converter(scope).convert_container(&unit)
}

fn exec_args(service: &UnitFile) -> Vec<String> {
    split_words_unescaped(&service.lookup("Service", "ExecStart").unwrap())
}

/// Arguments between the fixed prefix and the image
fn flags(service: &UnitFile, image: &str) -> Vec<String> {
    let args = exec_args(service);
    assert_eq!(&args[..BASE_ARGS.len()], BASE_ARGS);
    let image_pos = args.iter().rposition(|a| a == image).unwrap();
    args[BASE_ARGS.len()..image_pos].to_vec()
}

fn has_sequence(args: &[String], sequence: &[&str]) -> bool {
    args.windows(sequence.len())
        .any(|window| window.iter().zip(sequence).all(|(a, b)| a == b))
}

#[test]
fn test_minimal_container_generated_unit() {
    let source = UnitFile::from_source(
        "/etc/containers/systemd/web.container",
        "[Unit]\nDescription=Web\n\n[Container]\nImage=alpine\n\n[Install]\nWantedBy=default.target\n",
    )
    .unwrap();
    let name = UnitName::new("web.container").unwrap();

    let service = converter(UnitScope::System).convert(&name, &source).unwrap();

    assert_eq!(service.file_name(), Some("web.service"));
    assert_eq!(
        service.to_string(),
        "[Unit]
Description=Web
SourcePath=/etc/containers/systemd/web.container
RequiresMountsFor=%t/containers

[X-Container]
Image=alpine

[Install]
WantedBy=default.target

[Service]
Environment=PODMAN_SYSTEMD_UNIT=%n
KillMode=mixed
ExecStartPre=-rm -f %t/%N.cid
ExecStopPost=-/usr/bin/podman rm -f -i --cidfile=%t/%N.cid
ExecStopPost=-rm -f %t/%N.cid
Delegate=yes
Type=notify
NotifyAccess=all
SyslogIdentifier=%N
ExecStart=/usr/bin/podman run --name=systemd-%N --cidfile=%t/%N.cid --replace --rm -d --log-driver journald --pull=never --runtime /usr/bin/crun --cgroups=split --init --sdnotify=conmon --security-opt=no-new-privileges --cap-drop=all --tmpfs /tmp:rw,size=512M,mode=1777 alpine
"
    );
}

#[test]
fn test_missing_image_rejected() {
    for text in ["[Container]\nExec=/bin/true\n", "[Container]\nImage=\n", "[Service]\nRestart=always\n"] {
        assert_eq!(
            convert(UnitScope::System, text).unwrap_err(),
            ConversionError::MissingRequiredKey {
                group: "Container".to_string(),
                key: "Image".to_string(),
            }
        );
    }
}

#[test]
fn test_unknown_key_rejected() {
    let source =
        UnitFile::from_source("/srv/web.container", "[Container]\nImage=a\nNetwork=host\n").unwrap();
    let err = converter(UnitScope::System)
        .convert_container(&source)
        .unwrap_err();
    assert_eq!(
        err,
        ConversionError::UnsupportedKey {
            group: "Container".to_string(),
            key: "Network".to_string(),
            unit: "/srv/web.container".to_string(),
        }
    );
}

#[test]
fn test_kill_mode() {
    let service = convert(UnitScope::System, "[Container]\nImage=a\n").unwrap();
    assert_eq!(service.lookup("Service", "KillMode").as_deref(), Some("mixed"));

    let service = convert(
        UnitScope::System,
        "[Container]\nImage=a\n[Service]\nKillMode=control-group\n",
    )
    .unwrap();
    assert_eq!(service.lookup_all("Service", "KillMode"), vec!["control-group"]);

    let err = convert(UnitScope::System, "[Container]\nImage=a\n[Service]\nKillMode=process\n")
        .unwrap_err();
    assert!(matches!(
        err,
        ConversionError::InvalidEnumValue { ref key, ref value, .. } if key == "KillMode" && value == "process"
    ));
}

#[test]
fn test_service_settings_preserved() {
    let service = convert(
        UnitScope::System,
        "[Container]\nImage=a\n[Service]\nSyslogIdentifier=web\nRestart=always\n",
    )
    .unwrap();
    assert_eq!(service.lookup("Service", "SyslogIdentifier").as_deref(), Some("web"));
    assert_eq!(service.lookup("Service", "Restart").as_deref(), Some("always"));
    assert!(!service.has_group("Container"));
    assert_eq!(service.lookup("X-Container", "Image").as_deref(), Some("a"));
}

#[test]
fn test_runtime_options() {
    let service = convert(
        UnitScope::System,
        "[Container]\nImage=a\nContainerName=web\nTimezone=UTC\nRunInit=no\nNotify=yes\n",
    )
    .unwrap();
    let args = exec_args(&service);
    assert!(args.contains(&"--name=web".to_string()));
    assert!(args.contains(&"--tz=UTC".to_string()));
    assert!(!args.contains(&"--init".to_string()));
    assert!(args.contains(&"--sdnotify=container".to_string()));
    assert_eq!(service.lookup("Service", "Type").as_deref(), Some("notify"));
}

#[test]
fn test_keep_id_requires_user_scope() {
    let err = convert(UnitScope::System, "[Container]\nImage=a\nKeepId=yes\n").unwrap_err();
    assert_eq!(
        err,
        ConversionError::UnsupportedForMode {
            group: "Container".to_string(),
            key: "KeepId".to_string(),
            scope: "system".to_string(),
        }
    );

    let service = convert(UnitScope::User, "[Container]\nImage=a\nKeepId=yes\n").unwrap();
    let flags = flags(&service, "a");
    assert!(has_sequence(&flags, &["--userns", "keep-id"]));
    assert!(!flags.contains(&"--user".to_string()));
    assert!(!flags.iter().any(|f| f.starts_with("--uidmap")));
}

#[test]
fn test_keep_id_with_explicit_user() {
    let service = convert(UnitScope::User, "[Container]\nImage=a\nKeepId=yes\nUser=0\n").unwrap();
    assert!(has_sequence(&flags(&service, "a"), &["--user", "0"]));
}

#[test]
fn test_user_flag_forms() {
    let service = convert(UnitScope::System, "[Container]\nImage=a\nUser=1000\n").unwrap();
    let flags_uid = flags(&service, "a");
    assert!(has_sequence(&flags_uid, &["--user", "1000"]));
    // Host ids default to the container ids, so nothing to map.
    assert!(!flags_uid.iter().any(|f| f == "--uidmap" || f == "--gidmap"));

    let service = convert(UnitScope::System, "[Container]\nImage=a\nUser=1000\nGroup=1000\n").unwrap();
    assert!(has_sequence(&flags(&service, "a"), &["--user", "1000:1000"]));

    let service = convert(UnitScope::System, "[Container]\nImage=a\nGroup=5\n").unwrap();
    assert!(has_sequence(&flags(&service, "a"), &["--user", "0:5"]));

    let service = convert(UnitScope::System, "[Container]\nImage=a\nUser=0\nGroup=0\n").unwrap();
    assert!(!flags(&service, "a").contains(&"--user".to_string()));
}

#[test]
fn test_invalid_numeric_identity() {
    for text in [
        "[Container]\nImage=a\nUser=nobody\n",
        "[Container]\nImage=a\nGroup=-1\n",
        "[Container]\nImage=a\nUser=+5\n",
        "[Container]\nImage=a\nRemapUsers=yes\nRemapGidStart=+1\n",
        "[Container]\nImage=a\nHostUser=no-such-user-for-quadlet\n",
        "[Container]\nImage=a\nRemapUsers=yes\nRemapUidStart=x\n",
    ] {
        assert!(
            matches!(
                convert(UnitScope::System, text),
                Err(ConversionError::InvalidNumericField { .. })
            ),
            "{text}"
        );
    }
}

#[test]
fn test_host_user_without_remap_maps_identity() {
    let service = convert(UnitScope::System, "[Container]\nImage=a\nHostUser=1000\n").unwrap();
    let flags = flags(&service, "a");
    assert!(has_sequence(
        &flags,
        &[
            "--uidmap",
            "0:1000:1",
            "--uidmap",
            "1:1:999",
            "--uidmap",
            "1001:1001:4294966294",
        ]
    ));
    assert!(!flags.contains(&"--gidmap".to_string()));
    assert!(!flags.contains(&"--user".to_string()));
}

#[test]
fn test_remap_users_with_default_pools() {
    let service = convert(UnitScope::System, "[Container]\nImage=a\nRemapUsers=yes\n").unwrap();
    let flags = flags(&service, "a");
    assert!(has_sequence(
        &flags,
        &[
            "--uidmap",
            "0:0:1",
            "--uidmap",
            "1:100000:65536",
            "--gidmap",
            "0:0:1",
            "--gidmap",
            "1:1879048192:165536",
        ]
    ));
}

#[test]
fn test_remap_users_with_named_and_literal_ranges() {
    let service = convert(
        UnitScope::System,
        "[Container]\nImage=a\nRemapUsers=yes\nRemapUidRanges=app\nRemapGidRanges=500000-500009\nRemapGidStart=0\n",
    )
    .unwrap();
    let flags = flags(&service, "a");
    assert!(has_sequence(&flags, &["--uidmap", "0:0:1", "--uidmap", "1:300000:1000"]));
    assert!(has_sequence(&flags, &["--gidmap", "0:0:1", "--gidmap", "1:500000:10"]));
}

#[test]
fn test_remap_users_ignored_in_user_scope() {
    let service = convert(UnitScope::User, "[Container]\nImage=a\nRemapUsers=yes\n").unwrap();
    assert!(!flags(&service, "a").iter().any(|f| f == "--uidmap" || f == "--gidmap"));
}

#[test]
fn test_invalid_remap_range() {
    let err = convert(
        UnitScope::System,
        "[Container]\nImage=a\nRemapUsers=yes\nRemapUidRanges=10-5\n",
    )
    .unwrap_err();
    assert!(matches!(err, ConversionError::ParseError { .. }));
}

#[test]
fn test_volumes_add_dependencies() {
    let service = convert(
        UnitScope::System,
        "[Container]\nImage=a\nVolume=/srv/web:/web:ro\nVolume=data.volume:/data\n",
    )
    .unwrap();
    assert!(has_sequence(
        &flags(&service, "a"),
        &["-v", "/srv/web:/web:ro", "-v", "systemd-data:/data"]
    ));
    assert_eq!(
        service.lookup_all("Unit", "RequiresMountsFor"),
        vec!["%t/containers", "/srv/web"]
    );
    assert_eq!(service.lookup("Unit", "Requires").as_deref(), Some("data-volume.service"));
    assert_eq!(service.lookup("Unit", "After").as_deref(), Some("data-volume.service"));
}

#[test]
fn test_ports() {
    let service = convert(
        UnitScope::System,
        "[Container]\nImage=a\nExposeHostPort=9000-9010\nPublishPort=8080:80\nPublishPort=127.0.0.1::443/tcp\n",
    )
    .unwrap();
    assert!(has_sequence(
        &flags(&service, "a"),
        &["--expose=9000-9010", "-p=8080:80", "-p=127.0.0.1::443/tcp"]
    ));

    for text in [
        "[Container]\nImage=a\nExposeHostPort=http\n",
        "[Container]\nImage=a\nPublishPort=1:2:3:4\n",
        "[Container]\nImage=a\nPublishPort=web:80\n",
        "[Container]\nImage=a\nExposeHostPort=\u{668}\u{660}\n",
        "[Container]\nImage=a\nPublishPort=\u{ff18}\u{ff10}\u{ff18}\u{ff10}:\u{ff18}\u{ff10}\n",
    ] {
        assert!(
            matches!(convert(UnitScope::System, text), Err(ConversionError::InvalidPort { .. })),
            "{text}"
        );
    }
}

#[test]
fn test_key_value_flags_sorted() {
    let service = convert(
        UnitScope::System,
        "[Container]\nImage=a\nEnvironment=ZED=1 ALPHA=\"two words\"\nLabel=z=1\nLabel=a=2\nAnnotation=k=v\nSocketActivated=yes\n",
    )
    .unwrap();
    let flags = flags(&service, "a");
    assert!(flags.contains(&"--preserve-fds=1".to_string()));
    assert!(has_sequence(
        &flags,
        &[
            "--env",
            "ALPHA=two words",
            "--env",
            "LISTEN_FDS=1",
            "--env",
            "LISTEN_PID=2",
            "--env",
            "ZED=1",
            "--label",
            "a=2",
            "--label",
            "z=1",
            "--annotation",
            "k=v",
        ]
    ));
}

#[test]
fn test_podman_args_image_and_exec_order() {
    let service = convert(
        UnitScope::System,
        "[Container]\nImage=quay.io/a/b\nPodmanArgs=--network host\nPodmanArgs=--privileged\nExec=/bin/ignored\nExec=/bin/sh -c \"echo hi\"\n",
    )
    .unwrap();
    let args = exec_args(&service);
    assert_eq!(
        &args[args.len() - 7..],
        &["--network", "host", "--privileged", "quay.io/a/b", "/bin/sh", "-c", "echo hi"]
    );
}

#[test]
fn test_minimal_volume() {
    let name = UnitName::new("data.volume").unwrap();
    let unit = UnitFile::parse("[Volume]\n").unwrap();
    let service = converter(UnitScope::System).convert_volume(&unit, &name).unwrap();

    assert_eq!(service.file_name(), Some("data-volume.service"));
    assert!(service.has_group("X-Volume"));
    assert!(!service.has_group("Volume"));
    assert_eq!(service.lookup("Service", "Type").as_deref(), Some("oneshot"));
    assert_eq!(service.lookup("Service", "RemainAfterExit").as_deref(), Some("yes"));
    assert_eq!(service.lookup("Service", "SyslogIdentifier").as_deref(), Some("%N"));
    assert_eq!(
        service.lookup("Service", "ExecCondition").as_deref(),
        Some("/usr/bin/bash -c \"! /usr/bin/podman volume exists systemd-data\"")
    );
    assert_eq!(
        service.lookup("Service", "ExecStart").as_deref(),
        Some("/usr/bin/podman volume create systemd-data")
    );
    assert_eq!(
        service.lookup("Unit", "RequiresMountsFor").as_deref(),
        Some("%t/containers")
    );
}

#[test]
fn test_volume_options_and_labels() {
    let name = UnitName::new("data.volume").unwrap();
    let unit = UnitFile::parse("[Volume]\nUser=1000\nLabel=b=2 a=1\n").unwrap();
    let service = converter(UnitScope::System).convert_volume(&unit, &name).unwrap();
    assert_eq!(
        service.lookup("Service", "ExecStart").as_deref(),
        Some("/usr/bin/podman volume create --opt o=uid=1000 --label a=1 --label b=2 systemd-data")
    );

    let unit = UnitFile::parse("[Volume]\nUser=1000\nGroup=1001\n").unwrap();
    let service = converter(UnitScope::System).convert_volume(&unit, &name).unwrap();
    assert_eq!(
        exec_args(&service)[3..5],
        ["--opt".to_string(), "o=uid=1000,gid=1001".to_string()]
    );
}

#[test]
fn test_volume_errors() {
    let name = UnitName::new("data.volume").unwrap();
    let unit = UnitFile::parse("[Volume]\nDriver=local\n").unwrap();
    assert!(matches!(
        converter(UnitScope::System).convert_volume(&unit, &name),
        Err(ConversionError::UnsupportedKey { .. })
    ));

    for text in ["[Volume]\nGroup=wheel\n", "[Volume]\nUser=+5\n"] {
        let unit = UnitFile::parse(text).unwrap();
        assert!(
            matches!(
                converter(UnitScope::System).convert_volume(&unit, &name),
                Err(ConversionError::InvalidNumericField { .. })
            ),
            "{text}"
        );
    }
}

#[test]
fn test_shared_converter_is_deterministic_across_threads() {
    let converter = Arc::new(converter(UnitScope::System));
    let unit = Arc::new(
        UnitFile::parse("[Container]\nImage=a\nRemapUsers=yes\nEnvironment=B=2 A=1 C=3\n").unwrap(),
    );

    let outputs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let converter = Arc::clone(&converter);
                let unit = Arc::clone(&unit);
                scope.spawn(move || converter.convert_container(&unit).unwrap().to_string())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

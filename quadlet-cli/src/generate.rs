//! Unit discovery, conversion and output

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use quadlet_convert::{ConvertOptions, Converter, UnitFile, UnitKind, UnitName, UnitScope};
use quadlet_core::CallerIdentity;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cli::Cli;

/// Search path for system units, highest priority first
const SYSTEM_UNIT_DIRS: [&str; 2] = ["/etc/containers/systemd", "/usr/share/containers/systemd"];

const HEADER: &str = "# Automatically generated by quadlet-generator\n";

struct SourceUnit {
    name: UnitName,
    unit: UnitFile,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let scope = cli.scope();
    let search_dirs = unit_search_dirs(&cli, scope)?;
    debug!(?search_dirs, %scope, "Searching for units");

    let (sources, load_failures) = load_sources(&search_dirs).await?;
    if sources.is_empty() && load_failures == 0 {
        info!("No units found");
    }

    let options = ConvertOptions::new(scope).with_caller(CallerIdentity::current());
    let converter = Arc::new(Converter::new(options));

    let mut tasks = JoinSet::new();
    for source in sources {
        let converter = Arc::clone(&converter);
        tasks.spawn_blocking(move || {
            let result = converter.convert(&source.name, &source.unit);
            (source.name, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("Conversion task failed")?);
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let output_dir = match (&cli.output_dir, cli.dry_run) {
        (_, true) => None,
        (Some(dir), false) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
            Some(dir.as_path())
        }
        (None, false) => anyhow::bail!("An output directory is required"),
    };

    let mut failures = load_failures;
    for (name, result) in results {
        match result {
            Ok(service) => write_service(output_dir, &name, &service).await?,
            Err(e) => {
                failures += 1;
                warn!(unit = %name, error = %e, "Failed to convert unit, skipping");
            }
        }
    }

    if cli.dry_run && failures > 0 {
        anyhow::bail!("{failures} unit(s) could not be generated");
    }

    Ok(())
}

fn unit_search_dirs(cli: &Cli, scope: UnitScope) -> Result<Vec<PathBuf>> {
    if !cli.unit_dirs.is_empty() {
        return Ok(cli.unit_dirs.clone());
    }

    match scope {
        UnitScope::System => Ok(SYSTEM_UNIT_DIRS.iter().map(PathBuf::from).collect()),
        UnitScope::User => {
            let config = dirs::config_dir().context("Cannot determine the user configuration directory")?;
            Ok(vec![config.join("containers").join("systemd")])
        }
    }
}

/// Load every unit in `dirs`; a name found in an earlier directory shadows
/// later ones. Returns the units, sorted by name, and the number of files
/// that failed to load.
async fn load_sources(dirs: &[PathBuf]) -> Result<(Vec<SourceUnit>, usize)> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    let mut failures = 0;

    for dir in dirs {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Unit directory does not exist");
                continue;
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read unit directory");
                continue;
            }
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?
        {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if UnitKind::from_file_name(&file_name).is_some() {
                found.push(file_name);
            }
        }
        found.sort();

        for file_name in found {
            if seen.contains(&file_name) {
                debug!(unit = %file_name, dir = %dir.display(), "Shadowed by an earlier directory");
                continue;
            }
            seen.insert(file_name.clone());

            match load_source(&dir.join(&file_name), file_name).await {
                Ok(source) => sources.push(source),
                Err(e) => {
                    failures += 1;
                    warn!(error = %format!("{e:#}"), "Failed to load unit, skipping");
                }
            }
        }
    }

    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((sources, failures))
}

async fn load_source(path: &Path, file_name: String) -> Result<SourceUnit> {
    let name = UnitName::new(file_name)?;
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let unit = UnitFile::from_source(path, &data)?;

    debug!(unit = %name, path = %path.display(), "Loaded unit");
    Ok(SourceUnit { name, unit })
}

async fn write_service(output_dir: Option<&Path>, name: &UnitName, service: &UnitFile) -> Result<()> {
    let service_name = name.service_name();
    let text = format!("{HEADER}{service}");

    let Some(dir) = output_dir else {
        println!("---{service_name}---");
        print!("{text}");
        return Ok(());
    };

    let path = dir.join(&service_name);
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(unit = %name, service = %service_name, "Generated service");
    Ok(())
}

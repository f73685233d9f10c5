//! CLI argument definitions

use std::path::PathBuf;

use clap::Parser;
use quadlet_convert::UnitScope;

#[derive(Parser, Debug)]
#[command(name = "quadlet-generator")]
#[command(about = "Generate systemd services from podman quadlet units", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory to write the generated units to
    #[arg(required_unless_present = "dry_run")]
    pub output_dir: Option<PathBuf>,

    /// Early and late generator directories, unused
    #[arg(hide = true)]
    pub extra_dirs: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Generate user services from the user configuration directory
    #[arg(long)]
    pub user: bool,

    /// Print the generated units instead of writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Directories to search for units, overriding the defaults
    #[arg(long, env = "QUADLET_UNIT_DIRS", value_delimiter = ':')]
    pub unit_dirs: Vec<PathBuf>,
}

impl Cli {
    /// Scope of the generated services
    ///
    /// systemd runs user generators from `user-generators/`, so a binary
    /// installed as `*-user-generator` implies `--user`.
    pub fn scope(&self) -> UnitScope {
        let invoked_as_user = std::env::args_os()
            .next()
            .and_then(|arg0| {
                PathBuf::from(arg0)
                    .file_name()
                    .map(|name| name.to_string_lossy().ends_with("-user-generator"))
            })
            .unwrap_or(false);

        if self.user || invoked_as_user {
            UnitScope::User
        } else {
            UnitScope::System
        }
    }
}

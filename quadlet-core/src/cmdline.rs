//! Podman command-line assembly

use std::collections::HashMap;
use std::fmt;

/// Absolute path of the podman binary invoked by generated units
pub const PODMAN_BINARY: &str = "/usr/bin/podman";

/// Ordered, append-only podman argument vector
///
/// The first element is always [`PODMAN_BINARY`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodmanCommand {
    args: Vec<String>,
}

impl PodmanCommand {
    /// Start a command line for the given podman subcommand words
    ///
    /// # Example
    /// ```
    /// use quadlet_core::PodmanCommand;
    ///
    /// let mut cmd = PodmanCommand::new(["volume", "create"]);
    /// cmd.add("data");
    /// assert_eq!(cmd.args(), &["/usr/bin/podman", "volume", "create", "data"]);
    /// ```
    #[must_use]
    pub fn new<I, S>(subcommand: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = vec![PODMAN_BINARY.to_string()];
        args.extend(subcommand.into_iter().map(Into::into));
        Self { args }
    }

    /// Append one argument
    pub fn add(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    /// Append several arguments in order
    pub fn add_all<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// Append `flag k=v` for every entry, sorted by key
    pub fn add_keys(&mut self, flag: &str, entries: &HashMap<String, String>) {
        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (key, value) in sorted {
            self.add(flag);
            self.add(format!("{key}={value}"));
        }
    }

    /// Append `--env k=v` pairs sorted by key
    pub fn add_env(&mut self, env: &HashMap<String, String>) {
        self.add_keys("--env", env);
    }

    /// Append `--label k=v` pairs sorted by key
    pub fn add_labels(&mut self, labels: &HashMap<String, String>) {
        self.add_keys("--label", labels);
    }

    /// Append `--annotation k=v` pairs sorted by key
    pub fn add_annotations(&mut self, annotations: &HashMap<String, String>) {
        self.add_keys("--annotation", annotations);
    }

    /// Append `flag container:host:length`; zero-length mappings are skipped
    pub fn add_id_map(&mut self, flag: &str, container_start: u32, host_start: u32, length: u32) {
        if length == 0 {
            return;
        }
        self.add(flag);
        self.add(format!("{container_start}:{host_start}:{length}"));
    }

    /// The arguments, binary first
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Consume the builder and return the arguments
    #[must_use]
    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

impl fmt::Display for PodmanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}

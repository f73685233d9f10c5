//! Ordered, comment-preserving unit file model

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use quadlet_core::{ConversionError, Result, identity};

use crate::parser;
use crate::words::{apply_line_continuation, escape_words, split_words, split_words_unescaped};

/// One line of a group: a `key=value` entry or a verbatim comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnitLine {
    key: Option<String>,
    value: String,
}

impl UnitLine {
    pub(crate) fn comment(text: &str) -> Self {
        Self {
            key: None,
            value: text.to_string(),
        }
    }

    pub(crate) fn entry(key: &str, value: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            value: value.to_string(),
        }
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.key.is_none() && self.value.trim().is_empty()
    }

    fn is(&self, key: &str) -> bool {
        self.key.as_deref() == Some(key)
    }
}

impl fmt::Display for UnitLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => writeln!(f, "{key}={}", self.value),
            None => writeln!(f, "{}", self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnitGroup {
    name: String,
    /// Comments printed above the group header
    pub(crate) comments: Vec<UnitLine>,
    pub(crate) lines: Vec<UnitLine>,
}

impl UnitGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            comments: Vec::new(),
            lines: Vec::new(),
        }
    }

    fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.lines
            .iter()
            .filter(move |line| line.is(key))
            .map(|line| line.value.as_str())
    }
}

/// A parsed systemd unit file
///
/// Groups keep their file order, keys keep their order within a group, and
/// comments are preserved, so printing a parsed file reproduces it.
///
/// # Example
/// ```
/// use quadlet_unitfile::UnitFile;
///
/// let mut unit = UnitFile::parse("[Container]\nImage=alpine\n").unwrap();
/// unit.add("Service", "Restart", "always");
/// assert_eq!(unit.lookup("Container", "Image").as_deref(), Some("alpine"));
/// assert_eq!(unit.to_string(), "[Container]\nImage=alpine\n\n[Service]\nRestart=always\n");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFile {
    groups: Vec<UnitGroup>,
    path: Option<PathBuf>,
    file_name: Option<String>,
}

impl UnitFile {
    /// Create an empty unit
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse unit file text held in memory
    pub fn parse(data: &str) -> Result<Self> {
        parser::parse(data, "<input>")
    }

    /// Parse text that was read from `path`, remembering the path
    pub fn from_source(path: impl AsRef<Path>, data: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut unit = parser::parse(data, &path.display().to_string())?;
        unit.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        unit.path = Some(path.to_path_buf());
        Ok(unit)
    }

    /// Read and parse a unit file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loading unit file");
        Self::from_source(path, &data)
    }

    /// Path the unit was loaded from, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File name of the unit, if known
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Set the file name, e.g. of a generated unit
    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = Some(name.into());
    }

    /// Path, or file name, or a placeholder; for diagnostics
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.path, &self.file_name) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => "<unnamed unit>".to_string(),
        }
    }

    fn group(&self, name: &str) -> Option<&UnitGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    pub(crate) fn ensure_group(&mut self, name: &str) -> usize {
        if let Some(index) = self.group_index(name) {
            return index;
        }
        self.groups.push(UnitGroup::new(name));
        self.groups.len() - 1
    }

    pub(crate) fn group_at_mut(&mut self, index: usize) -> &mut UnitGroup {
        &mut self.groups[index]
    }

    /// Whether the group exists
    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.group(group).is_some()
    }

    /// Group names in file order
    #[must_use]
    pub fn list_groups(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Distinct keys of a group, in order of first appearance
    #[must_use]
    pub fn list_keys(&self, group: &str) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        if let Some(group) = self.group(group) {
            for key in group.lines.iter().filter_map(|l| l.key.as_deref()) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Whether the group contains the key at least once
    #[must_use]
    pub fn has_key(&self, group: &str, key: &str) -> bool {
        self.group(group)
            .is_some_and(|g| g.lines.iter().any(|l| l.is(key)))
    }

    /// Last value of a key with line continuations applied
    #[must_use]
    pub fn lookup_last(&self, group: &str, key: &str) -> Option<String> {
        self.group(group)?
            .values(key)
            .last()
            .map(|raw| apply_line_continuation(raw).into_owned())
    }

    /// Last value of a key with trailing whitespace removed
    #[must_use]
    pub fn lookup(&self, group: &str, key: &str) -> Option<String> {
        self.lookup_last(group, key)
            .map(|value| value.trim_end().to_string())
    }

    /// Boolean value; absent or empty keys yield `default`
    ///
    /// `1`, `yes`, `true` and `on` (any case) are true, anything else false.
    #[must_use]
    pub fn lookup_bool(&self, group: &str, key: &str, default: bool) -> bool {
        match self.lookup(group, key) {
            Some(value) if !value.is_empty() => ["1", "yes", "true", "on"]
                .iter()
                .any(|t| value.eq_ignore_ascii_case(t)),
            _ => default,
        }
    }

    /// Strict unsigned value; `Ok(None)` when absent or empty
    pub fn lookup_u32(&self, group: &str, key: &str) -> std::result::Result<Option<u32>, ConversionError> {
        match self.lookup(group, key) {
            Some(value) if !value.is_empty() => identity::parse_u32(key, &value).map(Some),
            _ => Ok(None),
        }
    }

    /// Host uid given numerically or as a user name
    pub fn lookup_uid(&self, group: &str, key: &str) -> std::result::Result<Option<u32>, ConversionError> {
        match self.lookup(group, key) {
            Some(value) if !value.is_empty() => identity::resolve_uid(key, &value).map(Some),
            _ => Ok(None),
        }
    }

    /// Host gid given numerically or as a group name
    pub fn lookup_gid(&self, group: &str, key: &str) -> std::result::Result<Option<u32>, ConversionError> {
        match self.lookup(group, key) {
            Some(value) if !value.is_empty() => identity::resolve_gid(key, &value).map(Some),
            _ => Ok(None),
        }
    }

    /// All values of a key in order; an empty value discards earlier ones
    #[must_use]
    pub fn lookup_all(&self, group: &str, key: &str) -> Vec<String> {
        let mut values = Vec::new();
        if let Some(group) = self.group(group) {
            for raw in group.values(key) {
                if raw.is_empty() {
                    values.clear();
                } else {
                    values.push(apply_line_continuation(raw).into_owned());
                }
            }
        }
        values
    }

    /// Words of all values of a key, concatenated
    #[must_use]
    pub fn lookup_all_args(&self, group: &str, key: &str) -> Vec<String> {
        self.lookup_all(group, key)
            .iter()
            .flat_map(|value| split_words(value))
            .collect()
    }

    /// Words of the last value of a key
    #[must_use]
    pub fn lookup_last_args(&self, group: &str, key: &str) -> Option<Vec<String>> {
        self.lookup_last(group, key).map(|value| split_words(&value))
    }

    /// `key=value` assignments from all values of a key
    ///
    /// Each value holds whitespace separated, optionally quoted and C-escaped
    /// assignments. Later assignments override earlier ones; words without
    /// `=` are logged and skipped.
    #[must_use]
    pub fn lookup_all_key_val(&self, group: &str, key: &str) -> HashMap<String, String> {
        let mut assignments = HashMap::new();
        for value in self.lookup_all(group, key) {
            for word in split_words_unescaped(&value) {
                match word.split_once('=') {
                    Some((k, v)) => {
                        assignments.insert(k.to_string(), v.to_string());
                    }
                    None => tracing::warn!(
                        unit = %self.display_name(),
                        key,
                        assignment = %word,
                        "Invalid key=value assignment, ignoring"
                    ),
                }
            }
        }
        assignments
    }

    /// Append a key, creating the group if needed
    pub fn add(&mut self, group: &str, key: &str, value: &str) {
        let index = self.ensure_group(group);
        self.groups[index].lines.push(UnitLine::entry(key, value));
    }

    /// Replace the last value of a key, or append it
    pub fn set(&mut self, group: &str, key: &str, value: &str) {
        let index = self.ensure_group(group);
        let group = &mut self.groups[index];
        match group.lines.iter_mut().rev().find(|l| l.is(key)) {
            Some(line) => line.value = value.to_string(),
            None => group.lines.push(UnitLine::entry(key, value)),
        }
    }

    /// [`set`](Self::set) several keys in order
    pub fn setv(&mut self, group: &str, entries: &[(&str, &str)]) {
        for (key, value) in entries {
            self.set(group, key, value);
        }
    }

    /// Remove every occurrence of a key
    pub fn unset(&mut self, group: &str, key: &str) {
        if let Some(index) = self.group_index(group) {
            self.groups[index].lines.retain(|l| !l.is(key));
        }
    }

    /// Append a key holding an escaped command line
    pub fn add_cmdline<S: AsRef<str>>(&mut self, group: &str, key: &str, args: &[S]) {
        self.add(group, key, &escape_words(args));
    }

    /// Remove a group with all its lines
    pub fn remove_group(&mut self, group: &str) {
        self.groups.retain(|g| g.name != group);
    }

    /// Rename a group, merging it into `new_name` if that group exists
    pub fn rename_group(&mut self, group: &str, new_name: &str) {
        let Some(index) = self.group_index(group) else {
            return;
        };
        if group == new_name {
            return;
        }

        match self.group_index(new_name) {
            None => self.groups[index].name = new_name.to_string(),
            Some(target) => {
                let source = self.groups.remove(index);
                let target = if target > index { target - 1 } else { target };
                let merged = &mut self.groups[target];
                merged.comments.extend(source.comments);
                merged.lines.extend(source.lines);
            }
        }
    }
}

impl fmt::Display for UnitFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, group) in self.groups.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            for comment in &group.comments {
                write!(f, "{comment}")?;
            }
            writeln!(f, "[{}]", group.name)?;
            for line in &group.lines {
                write!(f, "{line}")?;
            }
        }
        Ok(())
    }
}

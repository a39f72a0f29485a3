//! Project-level configuration: `drupdate.toml` settings and the pinned-package list.

use crate::error::{Result, UpdateError};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const SETTINGS_FILE: &str = "drupdate.toml";
pub const DEFAULT_IGNORE_FILE: &str = ".drupdate-ignore";

/// Settings read from `drupdate.toml`; every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Remote the update branch is pushed to.
    pub remote: String,
    /// Pinned-package list, relative to the project root.
    pub ignore_file: PathBuf,
    /// Declaration/lock files that decide whether an update changed anything.
    pub tracked_files: Vec<PathBuf>,
    pub include_dev: bool,
    /// Also commit the package's own install directory when it is tracked.
    pub stage_install_paths: bool,
    /// Offer to delete an update branch that ended up without commits.
    pub offer_branch_delete: bool,
    /// Ask composer why a package did not move when nothing changed.
    pub why_not: bool,
    /// Upper bound for every external command; 0 disables the limit.
    pub command_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            ignore_file: PathBuf::from(DEFAULT_IGNORE_FILE),
            tracked_files: vec![
                PathBuf::from("composer.json"),
                PathBuf::from("composer.lock"),
            ],
            include_dev: false,
            stage_install_paths: true,
            offer_branch_delete: true,
            why_not: true,
            command_timeout_secs: 900,
        }
    }
}

impl Settings {
    /// Loads `drupdate.toml` from the project root, falling back to defaults.
    pub fn load(project_path: &Path) -> Result<Self> {
        let path = project_path.join(SETTINGS_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "loading settings");
                Self::parse(&content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(UpdateError::Config("remote must not be empty".into()));
        }
        if self.tracked_files.is_empty() {
            return Err(UpdateError::Config(
                "tracked_files needs at least one entry".into(),
            ));
        }
        if let Some(bad) = self.tracked_files.iter().find(|p| p.is_absolute()) {
            return Err(UpdateError::Config(format!(
                "tracked file '{}' must be relative to the project root",
                bad.display()
            )));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}

/// Package names that are never offered for update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedSet {
    names: BTreeSet<String>,
}

impl PinnedSet {
    /// Reads the ignore list; a missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let set = Self::parse(&content);
                debug!(path = %path.display(), pinned = set.len(), "loaded pinned packages");
                Ok(set)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// One name per line; blank lines and `#` comments are ignored.
    pub fn parse(content: &str) -> Self {
        let names = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PinnedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

use crate::error::{Result, UpdateError};
use crate::utils::path_validator::PathValidator;
use crate::utils::process::{self, CommandOutput};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

/// composer's own package-name rule, `vendor/package`.
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([_.-]?[a-z0-9]+)*/[a-z0-9](([_.]|-{1,2})?[a-z0-9]+)*$")
        .expect("package name pattern is valid")
});

/// One outdated direct dependency, in the order the source reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCandidate {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
    pub latest_status: Option<String>,
    pub description: Option<String>,
}

impl PackageCandidate {
    pub fn new(
        name: impl Into<String>,
        current_version: impl Into<String>,
        latest_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            current_version: current_version.into(),
            latest_version: latest_version.into(),
            latest_status: None,
            description: None,
        }
    }

    /// The `vendor` half of `vendor/package`.
    pub fn vendor(&self) -> &str {
        self.name.split('/').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for PackageCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.name, self.current_version, self.latest_version
        )
    }
}

/// Where outdated packages come from and how one of them gets upgraded.
pub trait PackageSource {
    fn list_outdated_direct(&self, include_dev: bool) -> Result<Vec<PackageCandidate>>;

    /// Upgrades one package. Side effects on declaration/lock files and the
    /// install tree are expected; failure carries the tool's diagnostic.
    fn upgrade(&self, name: &str) -> Result<()>;

    /// Human-readable explanation of why `name` cannot reach `version`.
    fn why_not(&self, name: &str, version: &str) -> Result<String>;

    /// Install directory of `name`, relative to the project root.
    fn install_path(&self, name: &str) -> Result<Option<PathBuf>>;

    /// Declaration and lock files whose change means an update happened.
    fn tracked_files(&self) -> &[PathBuf];
}

/// [`PackageSource`] backed by the `composer` CLI.
pub struct ComposerAgent {
    project_path: PathBuf,
    tracked_files: Vec<PathBuf>,
    timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct OutdatedReport {
    #[serde(default)]
    installed: Vec<OutdatedEntry>,
}

#[derive(Debug, Deserialize)]
struct OutdatedEntry {
    name: String,
    version: String,
    latest: Option<String>,
    #[serde(rename = "latest-status")]
    latest_status: Option<String>,
    description: Option<String>,
}

impl ComposerAgent {
    pub fn new<P: AsRef<Path>>(
        project_path: P,
        tracked_files: Vec<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
            tracked_files,
            timeout,
        }
    }

    fn run_composer(&self, args: &[&str]) -> Result<CommandOutput> {
        process::run("composer", args, &self.project_path, self.timeout)
    }

    /// Runs a long composer command behind a spinner.
    fn run_with_spinner(&self, message: String, args: &[&str]) -> Result<CommandOutput> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(120));
        let result = self.run_composer(args);
        spinner.finish_and_clear();
        result
    }

    fn validate_package_name(name: &str) -> Result<()> {
        if PACKAGE_NAME.is_match(name) {
            return Ok(());
        }
        Err(UpdateError::UpgradeFailed {
            package: name.to_string(),
            diagnostic: "not a valid composer package name".to_string(),
        })
    }

    fn parse_outdated(json: &str) -> Result<Vec<PackageCandidate>> {
        let report: OutdatedReport = serde_json::from_str(json)
            .map_err(|e| UpdateError::SourceQueryFailed(format!("unparsable output: {e}")))?;

        let mut candidates = Vec::with_capacity(report.installed.len());
        for entry in report.installed {
            if !PACKAGE_NAME.is_match(&entry.name) {
                warn!(package = %entry.name, "ignoring entry with an invalid package name");
                continue;
            }
            let Some(latest) = entry.latest else {
                continue;
            };
            if entry.latest_status.as_deref() == Some("up-to-date") || latest == entry.version {
                continue;
            }
            candidates.push(PackageCandidate {
                latest_status: entry.latest_status,
                description: entry.description.filter(|d| !d.trim().is_empty()),
                ..PackageCandidate::new(entry.name, entry.version, latest)
            });
        }
        Ok(candidates)
    }

    /// `composer show --path` prints `<name> <path>`; a missing path means
    /// the package has no install directory (metapackages).
    fn parse_show_path(stdout: &str, name: &str) -> Option<PathBuf> {
        stdout.lines().find_map(|line| {
            let (package, path) = line.trim().split_once(char::is_whitespace)?;
            let path = path.trim();
            (package == name && !path.is_empty() && path != "null").then(|| PathBuf::from(path))
        })
    }
}

impl PackageSource for ComposerAgent {
    fn list_outdated_direct(&self, include_dev: bool) -> Result<Vec<PackageCandidate>> {
        let mut args = vec!["outdated", "--direct", "--format=json", "--no-interaction"];
        if !include_dev {
            args.push("--no-dev");
        }

        let output = self
            .run_with_spinner("Asking composer for outdated packages...".to_string(), &args)
            .map_err(|e| match e {
                UpdateError::MissingTool(_) => e,
                other => UpdateError::SourceQueryFailed(other.to_string()),
            })?;
        if !output.success() {
            return Err(UpdateError::SourceQueryFailed(output.diagnostic()));
        }

        let candidates = Self::parse_outdated(&output.stdout)?;
        debug!(count = candidates.len(), "composer reported outdated packages");
        Ok(candidates)
    }

    fn upgrade(&self, name: &str) -> Result<()> {
        Self::validate_package_name(name)?;
        let output = self.run_with_spinner(
            format!("composer update {name}"),
            &["update", name, "--with-dependencies", "--no-interaction"],
        )?;
        if output.success() {
            return Ok(());
        }
        Err(UpdateError::UpgradeFailed {
            package: name.to_string(),
            diagnostic: output.diagnostic(),
        })
    }

    fn why_not(&self, name: &str, version: &str) -> Result<String> {
        Self::validate_package_name(name)?;
        // why-not exits non-zero whenever it finds a blocker, so the status carries no error.
        let output = self.run_composer(&["why-not", name, version, "--no-interaction"])?;
        let text = output.stdout.trim();
        if text.is_empty() {
            Ok(output.stderr.trim().to_string())
        } else {
            Ok(text.to_string())
        }
    }

    fn install_path(&self, name: &str) -> Result<Option<PathBuf>> {
        Self::validate_package_name(name)?;
        let output = self.run_composer(&["show", "--path", name, "--no-interaction"])?;
        if !output.success() {
            debug!(package = %name, "composer show --path failed: {}", output.diagnostic());
            return Ok(None);
        }

        let Some(path) = Self::parse_show_path(&output.stdout, name) else {
            return Ok(None);
        };
        match PathValidator::relative_to(&path, &self.project_path) {
            Ok(relative) if relative.as_os_str().is_empty() => Ok(None),
            Ok(relative) => Ok(Some(relative)),
            Err(e) => {
                debug!(package = %name, "install path not usable: {e}");
                Ok(None)
            }
        }
    }

    fn tracked_files(&self) -> &[PathBuf] {
        &self.tracked_files
    }
}

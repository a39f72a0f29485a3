use crate::error::{Result, UpdateError};
use crate::utils::path_validator::PathValidator;
use crate::utils::process;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Tools every run shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["git", "composer"];

/// ProjectScannerAgent validates the project structure
pub struct ProjectScannerAgent {
    project_path: PathBuf,
}

impl ProjectScannerAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    /// Validates the project structure
    pub fn validate(&self) -> Result<ProjectInfo> {
        let project_path = PathValidator::validate_project_path(&self.project_path)?;

        if !project_path.join("composer.json").is_file() {
            return Err(UpdateError::ProjectValidation(
                "composer.json not found in the project directory".to_string(),
            ));
        }

        // .git is a file inside worktrees and submodules
        if !project_path.join(".git").exists() {
            return Err(UpdateError::ProjectValidation(
                "not a git repository (no .git found)".to_string(),
            ));
        }

        Ok(ProjectInfo {
            has_lock_file: project_path.join("composer.lock").is_file(),
            project_path,
        })
    }

    /// Fails with [`UpdateError::MissingTool`] for the first tool that does not run.
    pub fn ensure_tools(&self, tools: &[&str]) -> Result<()> {
        for tool in tools {
            let output = process::run(
                tool,
                &["--version"],
                &self.project_path,
                Some(Duration::from_secs(30)),
            )?;
            if !output.success() {
                return Err(UpdateError::MissingTool(tool.to_string()));
            }
            debug!(tool = %tool, version = %output.stdout.lines().next().unwrap_or_default(), "found tool");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProjectInfo {
    /// Canonical project root.
    pub project_path: PathBuf,
    pub has_lock_file: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn accepts_composer_git_project() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("composer.json"), "{}").unwrap();
        fs::write(dir.path().join("composer.lock"), "{}").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let info = ProjectScannerAgent::new(dir.path()).validate().unwrap();
        assert!(info.has_lock_file);
        assert_eq!(info.project_path, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn rejects_project_without_composer_json() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let err = ProjectScannerAgent::new(dir.path()).validate().unwrap_err();
        assert!(matches!(err, UpdateError::ProjectValidation(_)));
    }

    #[test]
    fn rejects_project_outside_git() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("composer.json"), "{}").unwrap();
        let err = ProjectScannerAgent::new(dir.path()).validate().unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
    }

    #[test]
    fn reports_missing_tools() {
        let dir = tempdir().unwrap();
        let err = ProjectScannerAgent::new(dir.path())
            .ensure_tools(&["drupdate-missing-tool"])
            .unwrap_err();
        assert!(matches!(err, UpdateError::MissingTool(tool) if tool == "drupdate-missing-tool"));
    }
}

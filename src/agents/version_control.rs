use crate::error::{Result, UpdateError};
use crate::utils::path_validator::PathValidator;
use crate::utils::process::{self, CommandOutput};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Version-control operations the update workflow relies on.
///
/// Paths are relative to the repository root.
pub trait VersionControl {
    fn has_uncommitted_changes(&self) -> Result<bool>;
    fn current_branch(&self) -> Result<String>;
    fn branch_exists(&self, name: &str) -> Result<bool>;
    fn create_and_checkout(&self, name: &str) -> Result<()>;
    fn checkout(&self, name: &str) -> Result<()>;
    /// Whether the working tree differs from the last commit for exactly `paths`.
    fn paths_differ(&self, paths: &[PathBuf]) -> Result<bool>;
    fn stage(&self, paths: &[PathBuf]) -> Result<()>;
    fn commit(&self, message: &str) -> Result<()>;
    fn unstage(&self, paths: &[PathBuf]) -> Result<()>;
    /// Restores `paths` to their committed content. Safe to repeat.
    fn revert_paths(&self, paths: &[PathBuf]) -> Result<()>;
    fn push(&self, remote: &str, branch: &str) -> Result<()>;
    fn delete_branch(&self, name: &str) -> Result<()>;
}

/// [`VersionControl`] backed by the `git` CLI, with hardened input validation.
pub struct VersionControlAgent {
    project_path: PathBuf,
    timeout: Option<Duration>,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(project_path: P, timeout: Option<Duration>) -> Result<Self> {
        let project_path = Self::validate_git_path(project_path.as_ref())?;
        Ok(Self {
            project_path,
            timeout,
        })
    }

    fn run_git(&self, args: &[&str]) -> Result<CommandOutput> {
        process::run("git", args, &self.project_path, self.timeout)
    }

    fn run_git_with_paths(&self, args: &[&str], paths: &[PathBuf]) -> Result<CommandOutput> {
        let rendered = path_args(paths);
        let mut full: Vec<&str> = args.to_vec();
        full.push("--");
        full.extend(rendered.iter().map(String::as_str));
        self.run_git(&full)
    }

    fn ensure_success(output: &CommandOutput, command: &str) -> Result<()> {
        if output.success() {
            return Ok(());
        }

        Err(UpdateError::GitOperation(format!(
            "{} failed: {}",
            command,
            output.diagnostic()
        )))
    }

    /// Paths that hold at least one tracked file.
    fn tracked(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut tracked = Vec::new();
        for path in paths {
            let output = self.run_git_with_paths(&["ls-files"], std::slice::from_ref(path))?;
            Self::ensure_success(&output, "git ls-files")?;
            if !output.stdout.trim().is_empty() {
                tracked.push(path.clone());
            }
        }
        Ok(tracked)
    }

    /// Drops paths matched by an ignore rule; `git add` refuses them.
    fn not_ignored(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut kept = Vec::new();
        for path in paths {
            let output =
                self.run_git_with_paths(&["check-ignore", "-q"], std::slice::from_ref(path))?;
            match output.status.code() {
                Some(0) => debug!(path = %path.display(), "skipping ignored path"),
                Some(1) => kept.push(path.clone()),
                _ => Self::ensure_success(&output, "git check-ignore")?,
            }
        }
        Ok(kept)
    }

    fn validate_git_path(path: &Path) -> Result<PathBuf> {
        let dangerous = [';', '|', '&', '$', '`', '\n', '\r'];
        let path_str = path.to_string_lossy();
        if let Some(ch) = dangerous.iter().find(|c| path_str.contains(**c)) {
            return Err(UpdateError::GitOperation(format!(
                "Path contains dangerous character: '{}'",
                ch
            )));
        }

        if !path.is_absolute() {
            return Err(UpdateError::GitOperation(
                "Only absolute paths are allowed for Git operations".to_string(),
            ));
        }

        PathValidator::validate_project_path(path)
            .map_err(|err| UpdateError::GitOperation(format!("Invalid Git path: {}", err)))
    }

    fn validate_branch_name(name: &str) -> Result<()> {
        if name.is_empty()
            || name.starts_with('-')
            || name.contains("..")
            || name.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(UpdateError::GitOperation(format!(
                "Invalid branch name: {:?}",
                name
            )));
        }
        Ok(())
    }
}

impl VersionControl for VersionControlAgent {
    fn has_uncommitted_changes(&self) -> Result<bool> {
        let output = self.run_git(&["status", "--porcelain", "--untracked-files=no"])?;
        Self::ensure_success(&output, "git status")?;
        Ok(!output.stdout.trim().is_empty())
    }

    fn current_branch(&self) -> Result<String> {
        let output = self.run_git(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        let branch = output.stdout.trim();
        if !output.success() || branch.is_empty() {
            return Err(UpdateError::UnknownBranch(
                "HEAD is detached or the repository has no branch".to_string(),
            ));
        }
        Ok(branch.to_string())
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        Self::validate_branch_name(name)?;
        let reference = format!("refs/heads/{name}");
        let output = self.run_git(&["rev-parse", "--verify", "--quiet", &reference])?;
        Ok(output.success())
    }

    fn create_and_checkout(&self, name: &str) -> Result<()> {
        Self::validate_branch_name(name)?;
        let output = self.run_git(&["checkout", "-b", name])?;
        Self::ensure_success(&output, "git checkout -b")
    }

    fn checkout(&self, name: &str) -> Result<()> {
        Self::validate_branch_name(name)?;
        let output = self.run_git(&["checkout", name])?;
        Self::ensure_success(&output, "git checkout")
    }

    fn paths_differ(&self, paths: &[PathBuf]) -> Result<bool> {
        let output = self.run_git_with_paths(&["diff", "--quiet", "HEAD"], paths)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(UpdateError::GitOperation(format!(
                "git diff failed: {}",
                output.diagnostic()
            ))),
        }
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let paths = self.not_ignored(paths)?;
        if paths.is_empty() {
            return Ok(());
        }
        let output = self.run_git_with_paths(&["add", "--all"], &paths)?;
        Self::ensure_success(&output, "git add")
    }

    fn commit(&self, message: &str) -> Result<()> {
        let output = self.run_git(&["commit", "-m", message])?;
        if output.success() {
            return Ok(());
        }
        Err(UpdateError::CommitFailed(output.diagnostic()))
    }

    fn unstage(&self, paths: &[PathBuf]) -> Result<()> {
        let output = self.run_git_with_paths(&["reset", "-q", "HEAD"], paths)?;
        if output.success() {
            return Ok(());
        }
        Err(UpdateError::UnstageFailed(format!(
            "{}: {}",
            path_args(paths).join(", "),
            output.diagnostic()
        )))
    }

    fn revert_paths(&self, paths: &[PathBuf]) -> Result<()> {
        let tracked = self.tracked(paths)?;
        if tracked.is_empty() {
            return Ok(());
        }

        let restore = self.run_git_with_paths(&["checkout", "HEAD"], &tracked)?;
        let clean = if restore.success() {
            self.run_git_with_paths(&["clean", "-fdq"], &tracked)?
        } else {
            restore
        };
        if clean.success() {
            return Ok(());
        }
        Err(UpdateError::RevertFailed(format!(
            "{}: {}",
            path_args(&tracked).join(", "),
            clean.diagnostic()
        )))
    }

    fn push(&self, remote: &str, branch: &str) -> Result<()> {
        Self::validate_branch_name(remote)?;
        Self::validate_branch_name(branch)?;
        let output = self.run_git(&["push", "--set-upstream", remote, branch])?;
        if output.success() {
            return Ok(());
        }
        Err(UpdateError::PushFailed(output.diagnostic()))
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        Self::validate_branch_name(name)?;
        let output = self.run_git(&["branch", "-D", name])?;
        Self::ensure_success(&output, "git branch -D")
    }
}

fn path_args(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir, tempdir_in};

    fn git(dir: &Path, args: &[&str]) {
        let output = process::run("git", args, dir, None).unwrap();
        assert!(output.success(), "git {:?} failed: {}", args, output.diagnostic());
    }

    /// Repository on `main` with composer.json/composer.lock committed.
    fn test_repo() -> (TempDir, VersionControlAgent) {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap();
        git(&path, &["init", "-q"]);
        git(&path, &["checkout", "-q", "-b", "main"]);
        git(&path, &["config", "user.email", "test@example.com"]);
        git(&path, &["config", "user.name", "Test User"]);
        git(&path, &["config", "commit.gpgsign", "false"]);
        fs::write(path.join("composer.json"), "{\"require\": {}}\n").unwrap();
        fs::write(path.join("composer.lock"), "{\"packages\": []}\n").unwrap();
        git(&path, &["add", "composer.json", "composer.lock"]);
        git(&path, &["commit", "-q", "-m", "Initial commit"]);
        let agent = VersionControlAgent::new(&path, None).unwrap();
        (dir, agent)
    }

    fn composer_files() -> Vec<PathBuf> {
        vec![PathBuf::from("composer.json"), PathBuf::from("composer.lock")]
    }

    #[test]
    fn rejects_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        let temp = tempdir_in(&cwd).unwrap();
        let relative = PathBuf::from(temp.path().file_name().unwrap());
        assert!(VersionControlAgent::new(&relative, None).is_err());
    }

    #[test]
    fn rejects_dangerous_paths() {
        let dir = tempdir().unwrap();
        let dangerous = dir.path().join("sub;dir");
        fs::create_dir_all(&dangerous).unwrap();
        assert!(VersionControlAgent::new(dangerous, None).is_err());
    }

    #[test]
    fn rejects_option_like_branch_names() {
        assert!(VersionControlAgent::validate_branch_name("--force").is_err());
        assert!(VersionControlAgent::validate_branch_name("update/a b").is_err());
        assert!(VersionControlAgent::validate_branch_name("update/2026-10-18").is_ok());
    }

    #[test]
    fn detects_dirty_tree_but_ignores_untracked_files() {
        let (dir, agent) = test_repo();
        fs::write(dir.path().join("notes.txt"), "scratch").unwrap();
        assert!(!agent.has_uncommitted_changes().unwrap());

        fs::write(dir.path().join("composer.json"), "{\"require\": {\"a/b\": \"^1\"}}\n").unwrap();
        assert!(agent.has_uncommitted_changes().unwrap());
    }

    #[test]
    fn creates_and_detects_branches() {
        let (_dir, agent) = test_repo();
        assert_eq!(agent.current_branch().unwrap(), "main");
        assert!(!agent.branch_exists("update/2026-10-18").unwrap());

        agent.create_and_checkout("update/2026-10-18").unwrap();
        assert_eq!(agent.current_branch().unwrap(), "update/2026-10-18");
        assert!(agent.branch_exists("update/2026-10-18").unwrap());

        agent.checkout("main").unwrap();
        agent.delete_branch("update/2026-10-18").unwrap();
        assert!(!agent.branch_exists("update/2026-10-18").unwrap());
    }

    #[test]
    fn detached_head_is_unknown_branch() {
        let (dir, agent) = test_repo();
        git(dir.path(), &["checkout", "-q", "--detach"]);
        assert!(matches!(
            agent.current_branch(),
            Err(UpdateError::UnknownBranch(_))
        ));
    }

    #[test]
    fn paths_differ_only_looks_at_given_paths() {
        let (dir, agent) = test_repo();
        fs::write(dir.path().join("README.md"), "changed").unwrap();
        assert!(!agent.paths_differ(&composer_files()).unwrap());

        fs::write(dir.path().join("composer.lock"), "{\"packages\": [1]}\n").unwrap();
        assert!(agent.paths_differ(&composer_files()).unwrap());
    }

    #[test]
    fn stages_and_commits_changes() {
        let (dir, agent) = test_repo();
        fs::write(dir.path().join("composer.lock"), "{\"packages\": [1]}\n").unwrap();
        agent.stage(&composer_files()).unwrap();
        agent.commit("Update a/b to 1.1").unwrap();

        assert!(!agent.has_uncommitted_changes().unwrap());
        let log = process::run("git", &["log", "-1", "--format=%s"], dir.path(), None).unwrap();
        assert_eq!(log.stdout.trim(), "Update a/b to 1.1");
    }

    #[test]
    fn commit_without_staged_changes_fails() {
        let (_dir, agent) = test_repo();
        assert!(matches!(
            agent.commit("Update a/b to 1.1"),
            Err(UpdateError::CommitFailed(_))
        ));
    }

    #[test]
    fn stage_skips_ignored_directories() {
        let (dir, agent) = test_repo();
        fs::write(dir.path().join(".gitignore"), "vendor/\n").unwrap();
        fs::create_dir_all(dir.path().join("vendor/a/b")).unwrap();
        fs::write(dir.path().join("vendor/a/b/file.php"), "<?php").unwrap();

        agent.stage(&[PathBuf::from("vendor/a/b")]).unwrap();
        let status = process::run("git", &["diff", "--cached", "--name-only"], dir.path(), None)
            .unwrap();
        assert!(status.stdout.trim().is_empty());
    }

    #[test]
    fn unstage_keeps_content() {
        let (dir, agent) = test_repo();
        fs::write(dir.path().join("composer.lock"), "{\"packages\": [1]}\n").unwrap();
        agent.stage(&composer_files()).unwrap();
        agent.unstage(&composer_files()).unwrap();

        let staged = process::run("git", &["diff", "--cached", "--name-only"], dir.path(), None)
            .unwrap();
        assert!(staged.stdout.trim().is_empty());
        assert!(agent.paths_differ(&composer_files()).unwrap());
    }

    #[test]
    fn revert_is_idempotent() {
        let (dir, agent) = test_repo();
        fs::write(dir.path().join("composer.lock"), "{\"packages\": [1]}\n").unwrap();

        agent.revert_paths(&composer_files()).unwrap();
        let once = fs::read_to_string(dir.path().join("composer.lock")).unwrap();
        agent.revert_paths(&composer_files()).unwrap();
        let twice = fs::read_to_string(dir.path().join("composer.lock")).unwrap();

        assert_eq!(once, "{\"packages\": []}\n");
        assert_eq!(once, twice);
        assert!(!agent.has_uncommitted_changes().unwrap());
    }

    #[test]
    fn revert_ignores_untracked_paths() {
        let (dir, agent) = test_repo();
        fs::create_dir_all(dir.path().join("web/modules/contrib/token")).unwrap();
        agent
            .revert_paths(&[PathBuf::from("web/modules/contrib/token")])
            .unwrap();
    }

    #[test]
    fn push_to_missing_remote_is_push_failed() {
        let (_dir, agent) = test_repo();
        assert!(matches!(
            agent.push("origin", "main"),
            Err(UpdateError::PushFailed(_))
        ));
    }
}

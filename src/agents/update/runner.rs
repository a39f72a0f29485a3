use crate::agents::package_source::{PackageCandidate, PackageSource};
use crate::agents::update::context::{
    Classifier, PushStatus, RunState, UpdateOutcome, UpdateReport,
};
use crate::agents::update::interaction::Prompter;
use crate::agents::version_control::VersionControl;
use crate::config::{PinnedSet, Settings};
use crate::error::{Result, UpdateError};
use colored::Colorize;
use jiff::civil::Date;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BRANCH_PREFIX: &str = "update/";

/// Knobs of the update workflow, usually taken from [`Settings`].
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub include_dev: bool,
    pub remote: String,
    pub stage_install_paths: bool,
    pub offer_branch_delete: bool,
    pub why_not: bool,
}

impl From<&Settings> for WorkflowOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            include_dev: settings.include_dev,
            remote: settings.remote.clone(),
            stage_install_paths: settings.stage_install_paths,
            offer_branch_delete: settings.offer_branch_delete,
            why_not: settings.why_not,
        }
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Branch a run dated `today` works on.
pub fn branch_name(today: Date) -> String {
    format!("{BRANCH_PREFIX}{today}")
}

/// Commit message for one updated package.
pub fn commit_message(candidate: &PackageCandidate) -> String {
    format!("Update {} to {}", candidate.name, candidate.latest_version)
}

/// Drives one update run: discover, branch, process each candidate, finalize.
///
/// Candidates are processed strictly one after another because each of them
/// mutates the same working tree and branch HEAD. A failure on one candidate
/// is recorded as its outcome and never stops the loop.
pub struct UpdateWorkflow<'a> {
    source: &'a dyn PackageSource,
    vcs: &'a dyn VersionControl,
    prompter: &'a mut dyn Prompter,
    options: WorkflowOptions,
    pinned: PinnedSet,
    state: RunState,
}

impl<'a> UpdateWorkflow<'a> {
    /// Checks the preconditions and captures the current branch.
    ///
    /// Fails with [`UpdateError::DirtyWorkingTree`] or
    /// [`UpdateError::UnknownBranch`] before any state exists.
    pub fn initialize(
        source: &'a dyn PackageSource,
        vcs: &'a dyn VersionControl,
        prompter: &'a mut dyn Prompter,
        options: WorkflowOptions,
        pinned: PinnedSet,
    ) -> Result<Self> {
        if vcs.has_uncommitted_changes()? {
            return Err(UpdateError::DirtyWorkingTree);
        }

        let original_branch = vcs.current_branch().map_err(|e| match e {
            UpdateError::UnknownBranch(_) => e,
            other => UpdateError::UnknownBranch(other.to_string()),
        })?;
        info!(branch = %original_branch, pinned = pinned.len(), "update run initialized");

        Ok(Self {
            source,
            vcs,
            prompter,
            options,
            pinned,
            state: RunState::new(original_branch),
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Full run. An empty candidate list ends the run before any branch or prompt.
    pub fn run(&mut self, today: Date, classify: Classifier) -> Result<UpdateReport> {
        let candidates = self.discover_candidates()?;
        if candidates.is_empty() {
            println!("{}", "✓ Nothing to update".green());
            return Ok(UpdateReport::nothing_to_do(&self.state.original_branch));
        }
        println!(
            "   Found {} outdated direct {}",
            candidates.len(),
            if candidates.len() == 1 {
                "dependency"
            } else {
                "dependencies"
            }
        );

        let branch = self.open_update_branch(today)?;
        println!("{}", format!("✓ Working on branch {branch}").green());

        for candidate in &candidates {
            self.process_candidate(candidate);
        }

        self.finalize(classify)
    }

    pub fn discover_candidates(&self) -> Result<Vec<PackageCandidate>> {
        self.source
            .list_outdated_direct(self.options.include_dev)
            .map_err(|e| match e {
                UpdateError::SourceQueryFailed(_) | UpdateError::MissingTool(_) => e,
                other => UpdateError::SourceQueryFailed(other.to_string()),
            })
    }

    /// Creates `update/<today>` or, with the operator's consent, reuses it.
    pub fn open_update_branch(&mut self, today: Date) -> Result<String> {
        let branch = branch_name(today);

        let exists = match self.vcs.branch_exists(&branch) {
            Ok(exists) => exists,
            Err(e) => return Err(self.abort_to_original(&branch, e)),
        };

        if exists {
            println!(
                "{}",
                format!("⚠ Branch '{branch}' already exists").yellow()
            );
            let question = format!("Continue on existing branch '{branch}'?");
            if !self.prompter.confirm(&question, true)? {
                return Err(UpdateError::BranchCreateFailed {
                    branch,
                    reason: "branch already exists and reuse was declined".to_string(),
                });
            }
            if let Err(e) = self.vcs.checkout(&branch) {
                return Err(self.abort_to_original(&branch, e));
            }
            self.state.created_branch = false;
        } else {
            if let Err(e) = self.vcs.create_and_checkout(&branch) {
                return Err(self.abort_to_original(&branch, e));
            }
            self.state.created_branch = true;
        }

        info!(branch = %branch, created = self.state.created_branch, "update branch ready");
        self.state.target_branch = Some(branch.clone());
        Ok(branch)
    }

    /// Leaves the repository on the original branch if possible and turns
    /// `cause` into the fatal branch error.
    fn abort_to_original(&mut self, branch: &str, cause: UpdateError) -> UpdateError {
        let original = self.state.original_branch.clone();
        let on_original = self
            .vcs
            .current_branch()
            .map(|current| current == original)
            .unwrap_or(false);
        if !on_original {
            if let Err(e) = self.vcs.checkout(&original) {
                self.warn(UpdateError::GitOperation(format!(
                    "could not switch back to '{original}': {e}"
                )));
            }
        }

        UpdateError::BranchCreateFailed {
            branch: branch.to_string(),
            reason: cause.to_string(),
        }
    }

    /// Runs one candidate through pinned check, decision, upgrade, change
    /// detection and commit, and records the outcome.
    pub fn process_candidate(&mut self, candidate: &PackageCandidate) -> UpdateOutcome {
        let outcome = self.evaluate(candidate);
        debug!(candidate = %candidate, outcome = ?outcome, "candidate processed");
        self.state.record(candidate, outcome.clone());
        outcome
    }

    fn evaluate(&mut self, candidate: &PackageCandidate) -> UpdateOutcome {
        if self.pinned.contains(&candidate.name) {
            println!(
                "\n{} {}",
                "[pinned]".dimmed(),
                format!("{} stays at {}", candidate.name, candidate.current_version).dimmed()
            );
            return UpdateOutcome::SkippedPinned;
        }

        let decision = match self.prompter.decide(candidate) {
            Ok(decision) => decision,
            Err(e) => {
                self.warn(e);
                return UpdateOutcome::SkippedByUser;
            }
        };
        if !decision.is_yes() {
            return UpdateOutcome::SkippedByUser;
        }

        let tracked = self.source.tracked_files().to_vec();

        if let Err(e) = self.source.upgrade(&candidate.name) {
            let reason = match e {
                UpdateError::UpgradeFailed { diagnostic, .. } => diagnostic,
                other => other.to_string(),
            };
            eprintln!(
                "{}",
                format!("✗ Updating {} failed:\n{}", candidate.name, reason).red()
            );
            self.revert(&tracked);
            return UpdateOutcome::UpdateFailed(summarize(&reason));
        }

        // Looked up even when staging is off: reverts must cover the directory too.
        let install_path = self.install_path(&candidate.name);
        let touched = with_install_path(&tracked, install_path.as_deref());

        let changed = match self.vcs.paths_differ(&tracked) {
            Ok(changed) => changed,
            Err(e) => {
                self.revert(&touched);
                return UpdateOutcome::UpdateFailed(format!("could not inspect changes: {e}"));
            }
        };

        if !changed {
            println!(
                "{}",
                format!(
                    "• {} did not change composer files; nothing to commit",
                    candidate.name
                )
                .yellow()
            );
            self.revert(&touched);
            let why_not = self.why_not(candidate);
            return UpdateOutcome::NoEffectiveChange { why_not };
        }

        let paths = if self.options.stage_install_paths {
            touched
        } else {
            tracked
        };
        let message = commit_message(candidate);
        match self
            .vcs
            .stage(&paths)
            .and_then(|()| self.vcs.commit(&message))
        {
            Ok(()) => {
                println!("{}", format!("✓ Committed: {message}").green());
                UpdateOutcome::Updated(candidate.latest_version.clone())
            }
            Err(e) => {
                let reason = match e {
                    UpdateError::CommitFailed(reason) => reason,
                    other => other.to_string(),
                };
                eprintln!(
                    "{}",
                    format!("✗ Committing {} failed: {}", candidate.name, reason).red()
                );
                if let Err(e) = self.vcs.unstage(&paths) {
                    self.warn(match e {
                        UpdateError::UnstageFailed(_) => e,
                        other => UpdateError::UnstageFailed(other.to_string()),
                    });
                }
                UpdateOutcome::CommitFailed(summarize(&reason))
            }
        }
    }

    fn install_path(&self, name: &str) -> Option<PathBuf> {
        match self.source.install_path(name) {
            Ok(path) => path,
            Err(e) => {
                debug!(package = %name, "no install path: {e}");
                None
            }
        }
    }

    fn why_not(&self, candidate: &PackageCandidate) -> Option<String> {
        if !self.options.why_not {
            return None;
        }
        match self
            .source
            .why_not(&candidate.name, &candidate.latest_version)
        {
            Ok(text) if !text.trim().is_empty() => {
                println!(
                    "{}",
                    format!("  Why not {}:", candidate.latest_version).dimmed()
                );
                for line in text.lines() {
                    println!("    {}", line.dimmed());
                }
                Some(text)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(package = %candidate.name, "why-not unavailable: {e}");
                None
            }
        }
    }

    /// Best-effort restore; failure is only a warning.
    fn revert(&mut self, paths: &[PathBuf]) {
        if let Err(e) = self.vcs.revert_paths(paths) {
            self.warn(match e {
                UpdateError::RevertFailed(_) => e,
                other => UpdateError::RevertFailed(other.to_string()),
            });
        }
    }

    fn warn(&mut self, warning: UpdateError) {
        warn!("{warning}");
        self.state.warn(warning);
    }

    /// Yes/no question whose failure falls back to `default`.
    fn ask(&mut self, question: &str, default: bool) -> bool {
        match self.prompter.confirm(question, default) {
            Ok(answer) => answer,
            Err(e) => {
                self.warn(e);
                default
            }
        }
    }

    /// Offers branch cleanup or a push, then builds the report.
    pub fn finalize(&mut self, classify: Classifier) -> Result<UpdateReport> {
        let mut push = PushStatus::NotOffered;
        let mut returned_to_original = false;
        let mut branch_deleted = false;

        if let Some(branch) = self.state.target_branch.clone() {
            let original = self.state.original_branch.clone();

            if self.state.commits == 0 {
                if branch != original {
                    let question = format!("No commits were made. Switch back to '{original}'?");
                    if self.ask(&question, true) {
                        match self.vcs.checkout(&original) {
                            Ok(()) => returned_to_original = true,
                            Err(e) => self.warn(UpdateError::GitOperation(format!(
                                "could not switch back to '{original}': {e}"
                            ))),
                        }
                    }
                }

                if returned_to_original && self.state.created_branch && self.options.offer_branch_delete
                {
                    let question = format!("Delete the empty branch '{branch}'?");
                    if self.ask(&question, false) {
                        match self.vcs.delete_branch(&branch) {
                            Ok(()) => branch_deleted = true,
                            Err(e) => self.warn(e),
                        }
                    }
                }
            } else {
                let remote = self.options.remote.clone();
                let question = format!("Push '{branch}' to '{remote}'?");
                push = if self.ask(&question, false) {
                    match self.vcs.push(&remote, &branch) {
                        Ok(()) => PushStatus::Pushed,
                        Err(e) => {
                            let reason = e.to_string();
                            self.warn(match e {
                                UpdateError::PushFailed(_) => e,
                                other => UpdateError::PushFailed(other.to_string()),
                            });
                            PushStatus::Failed(reason)
                        }
                    }
                } else {
                    PushStatus::Declined
                };
            }
        }

        let mut report = UpdateReport::from_state(&self.state, classify);
        report.push = push;
        report.returned_to_original = returned_to_original;
        report.branch_deleted = branch_deleted;
        Ok(report)
    }
}

fn with_install_path(tracked: &[PathBuf], install_path: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = tracked.to_vec();
    if let Some(path) = install_path {
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_path_buf());
        }
    }
    paths
}

/// First meaningful line of a multi-line tool diagnostic.
fn summarize(reason: &str) -> String {
    reason
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no diagnostic")
        .to_string()
}

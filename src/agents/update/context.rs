use crate::agents::package_source::PackageCandidate;
use crate::error::UpdateError;
use std::collections::BTreeMap;
use std::fmt;

/// What happened to one candidate. Exactly one is recorded per candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Committed; carries the version it was updated to.
    Updated(String),
    SkippedPinned,
    SkippedByUser,
    UpdateFailed(String),
    /// The resolver left declaration/lock files untouched. Carries composer's
    /// `why-not` explanation when one was collected.
    NoEffectiveChange { why_not: Option<String> },
    CommitFailed(String),
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated(_))
    }

    /// Single report line for `name`.
    pub fn describe(&self, name: &str) -> String {
        match self {
            UpdateOutcome::Updated(version) => format!("{name} -> {version}"),
            UpdateOutcome::SkippedPinned => format!("{name} (pinned)"),
            UpdateOutcome::SkippedByUser => format!("{name} (skipped)"),
            UpdateOutcome::UpdateFailed(reason) => format!("{name} (update failed: {reason})"),
            UpdateOutcome::NoEffectiveChange { .. } => format!("{name} (no effective change)"),
            UpdateOutcome::CommitFailed(reason) => format!("{name} (commit failed: {reason})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub candidate: PackageCandidate,
    pub outcome: UpdateOutcome,
}

/// Mutable state of one run, owned by the workflow.
#[derive(Debug)]
pub struct RunState {
    /// Branch checked out when the run started.
    pub original_branch: String,
    pub target_branch: Option<String>,
    /// Whether this run created `target_branch` rather than reusing it.
    pub created_branch: bool,
    pub commits: usize,
    pub results: Vec<CandidateResult>,
    /// Non-fatal failures, kept so they can be reported and asserted on.
    pub warnings: Vec<UpdateError>,
}

impl RunState {
    pub fn new(original_branch: impl Into<String>) -> Self {
        Self {
            original_branch: original_branch.into(),
            target_branch: None,
            created_branch: false,
            commits: 0,
            results: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record(&mut self, candidate: &PackageCandidate, outcome: UpdateOutcome) {
        if outcome.is_updated() {
            self.commits += 1;
        }
        self.results.push(CandidateResult {
            candidate: candidate.clone(),
            outcome,
        });
    }

    pub fn warn(&mut self, warning: UpdateError) {
        self.warnings.push(warning);
    }
}

/// Groups candidates for display, e.g. by ecosystem namespace.
pub type Classifier = fn(&PackageCandidate) -> String;

/// Drupal core, Drupal contrib, everything else.
pub fn drupal_classifier(candidate: &PackageCandidate) -> String {
    if candidate.name.starts_with("drupal/core") {
        "Drupal core".to_string()
    } else if candidate.vendor() == "drupal" {
        "Drupal contrib".to_string()
    } else {
        "Third-party".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub name: String,
    pub line: String,
    pub detail: Option<String>,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PushStatus {
    #[default]
    NotOffered,
    Declined,
    Pushed,
    Failed(String),
}

/// Final summary of a run.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub branch: Option<String>,
    pub original_branch: String,
    pub commits: usize,
    /// Classifier group -> entries sorted by package name.
    pub updated: BTreeMap<String, Vec<ReportEntry>>,
    pub not_updated: BTreeMap<String, Vec<ReportEntry>>,
    pub push: PushStatus,
    pub returned_to_original: bool,
    pub branch_deleted: bool,
    pub warnings: Vec<String>,
}

impl UpdateReport {
    /// Report for a run that found nothing to update.
    pub fn nothing_to_do(original_branch: impl Into<String>) -> Self {
        Self {
            original_branch: original_branch.into(),
            ..Self::default()
        }
    }

    /// Partitions results into updated/not updated, grouped and sorted.
    pub fn from_state(state: &RunState, classify: Classifier) -> Self {
        let mut report = Self {
            branch: state.target_branch.clone(),
            original_branch: state.original_branch.clone(),
            commits: state.commits,
            warnings: state.warnings.iter().map(ToString::to_string).collect(),
            ..Self::default()
        };

        for result in &state.results {
            let entry = ReportEntry {
                name: result.candidate.name.clone(),
                line: result.outcome.describe(&result.candidate.name),
                detail: match &result.outcome {
                    UpdateOutcome::NoEffectiveChange { why_not } => why_not.clone(),
                    _ => None,
                },
            };
            let target = if result.outcome.is_updated() {
                &mut report.updated
            } else {
                &mut report.not_updated
            };
            target
                .entry(classify(&result.candidate))
                .or_default()
                .push(entry);
        }

        for entries in report
            .updated
            .values_mut()
            .chain(report.not_updated.values_mut())
        {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }

        report
    }

    /// Check if the report is empty (no candidates at all)
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.not_updated.is_empty()
    }

    pub fn total_updates(&self) -> usize {
        self.updated.values().map(Vec::len).sum()
    }

    pub fn total_not_updated(&self) -> usize {
        self.not_updated.values().map(Vec::len).sum()
    }

    /// All updated lines in group order, for callers that don't care about groups.
    #[cfg(test)]
    pub fn updated_lines(&self) -> Vec<String> {
        self.updated
            .values()
            .flatten()
            .map(|e| e.line.clone())
            .collect()
    }

    #[cfg(test)]
    pub fn not_updated_lines(&self) -> Vec<String> {
        self.not_updated
            .values()
            .flatten()
            .map(|e| e.line.clone())
            .collect()
    }
}

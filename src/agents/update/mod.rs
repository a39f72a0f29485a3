// Update module - the per-package update workflow
//
// - context: outcomes, run state and the final report
// - interaction: operator decisions (terminal or unattended)
// - runner: the state machine tying package source and version control together
pub mod context;
pub mod interaction;
pub mod runner;

pub use context::{PushStatus, UpdateReport, drupal_classifier};
pub use interaction::{AutoApprove, Prompter, TerminalPrompter};
pub use runner::{UpdateWorkflow, WorkflowOptions};

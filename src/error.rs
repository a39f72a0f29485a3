use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Working tree has uncommitted changes; commit or stash them first")]
    DirtyWorkingTree,

    #[error("Unable to resolve the current branch: {0}")]
    UnknownBranch(String),

    #[error("Querying outdated packages failed: {0}")]
    SourceQueryFailed(String),

    #[error("Could not open branch '{branch}': {reason}")]
    BranchCreateFailed { branch: String, reason: String },

    #[error("Updating {package} failed: {diagnostic}")]
    UpgradeFailed { package: String, diagnostic: String },

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Reverting {0}")]
    RevertFailed(String),

    #[error("Unstaging {0}")]
    UnstageFailed(String),

    #[error("'{command}' did not finish within {seconds}s")]
    ExternalTimeout { command: String, seconds: u64 },

    #[error("Push failed: {0}")]
    PushFailed(String),

    #[error("Required tool '{0}' is not installed or not on PATH")]
    MissingTool(String),

    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, UpdateError>;

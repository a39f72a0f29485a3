pub mod package_source;
pub mod project_scanner;
pub mod version_control;

pub mod update;
pub use update::UpdateReport;

pub use package_source::{ComposerAgent, PackageCandidate, PackageSource};
pub use project_scanner::ProjectScannerAgent;
pub use version_control::VersionControlAgent;

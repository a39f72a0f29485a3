use crate::error::{Result, UpdateError};
use std::path::{Path, PathBuf};

/// Path checks shared by the project scanner and the package adapters.
pub struct PathValidator;

impl PathValidator {
    /// Canonicalises a project directory and refuses system locations.
    pub fn validate_project_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            UpdateError::ProjectValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(UpdateError::ProjectValidation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);
            let canonical_forbidden = forbidden_path
                .canonicalize()
                .unwrap_or_else(|_| forbidden_path.to_path_buf());

            if canonical.starts_with(forbidden_path) || canonical.starts_with(&canonical_forbidden)
            {
                return Err(UpdateError::ProjectValidation(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Expresses `path` relative to `base`, failing when it escapes `base`.
    ///
    /// Relative inputs are resolved against `base`. Both sides are
    /// canonicalised, so the path must exist.
    pub fn relative_to(path: impl AsRef<Path>, base: impl AsRef<Path>) -> Result<PathBuf> {
        let base = base.as_ref();
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        };

        let canonical_path = joined.canonicalize().map_err(|e| {
            UpdateError::ProjectValidation(format!("Invalid path '{}': {e}", joined.display()))
        })?;
        let canonical_base = base.canonicalize().map_err(|e| {
            UpdateError::ProjectValidation(format!(
                "Invalid base directory '{}': {e}",
                base.display()
            ))
        })?;

        canonical_path
            .strip_prefix(&canonical_base)
            .map(Path::to_path_buf)
            .map_err(|_| {
                UpdateError::ProjectValidation(format!(
                    "'{}' is outside the project directory",
                    canonical_path.display()
                ))
            })
    }
}

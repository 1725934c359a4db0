//! Kiln package manifest (`kiln.json`) parsing and validation.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when working with manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("'playable' requires 'uses-compiled-language' to be true")]
    PlayableRequiresCompiled,

    #[error("'header-only' is only accepted when 'uses-compiled-language' is true")]
    HeaderOnlyRequiresCompiled,

    #[error("invalid dependency name '{0}': {1}")]
    InvalidDependency(String, &'static str),

    #[error("dependency '{0}' is not a directory under the packages root")]
    MissingDependency(String),
}

/// The complete `kiln.json` manifest.
///
/// `author` and `version` are free-form display strings; neither is
/// interpreted beyond being recorded on the package.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Manifest {
    /// Package author (required).
    pub author: String,

    /// Package version (required).
    pub version: String,

    /// Whether the package provides a `Run` entry point (required).
    pub playable: bool,

    /// Whether the package carries sources for the native toolchain (required).
    pub uses_compiled_language: bool,

    /// Declares an include-only package with nothing to compile or link.
    ///
    /// The key may only appear when `uses-compiled-language` is true.
    #[serde(default)]
    pub header_only: Option<bool>,

    /// Extra arguments appended verbatim to the link step.
    #[serde(default)]
    pub link_options: String,

    /// Names of directly required packages, in declaration order.
    #[serde(default)]
    pub depend: Vec<String>,
}

impl Manifest {
    /// Load a manifest from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_path(
        path: impl AsRef<Path>,
        packages_root: &Path,
    ) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, packages_root)
    }

    /// Parse a manifest from a JSON string.
    ///
    /// Missing or wrong-typed required fields and unknown keys are parse
    /// errors; the cross-field rules and the dependency directory check run
    /// afterwards. A rejected manifest yields no partial result.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or a validation rule fails.
    pub fn parse(content: &str, packages_root: &Path) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(content)?;
        manifest.validate(packages_root)?;
        Ok(manifest)
    }

    /// Validate the cross-field rules and dependency references.
    fn validate(&self, packages_root: &Path) -> Result<(), ManifestError> {
        if self.playable && !self.uses_compiled_language {
            return Err(ManifestError::PlayableRequiresCompiled);
        }

        if self.header_only.is_some() && !self.uses_compiled_language {
            return Err(ManifestError::HeaderOnlyRequiresCompiled);
        }

        for dep in &self.depend {
            validate_dependency_name(dep)?;
            if !packages_root.join(dep).is_dir() {
                return Err(ManifestError::MissingDependency(dep.clone()));
            }
        }

        Ok(())
    }

    /// Returns true if the package declares itself include-only.
    #[must_use]
    pub fn is_header_only(&self) -> bool {
        self.header_only.unwrap_or(false)
    }
}

/// Validate a single `depend` entry.
///
/// Entries name sibling directories under the packages root, so anything
/// that could escape that directory is rejected.
fn validate_dependency_name(name: &str) -> Result<(), ManifestError> {
    if name.is_empty() {
        return Err(ManifestError::InvalidDependency(
            name.to_string(),
            "name cannot be empty",
        ));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(ManifestError::InvalidDependency(
            name.to_string(),
            "name cannot contain path separators",
        ));
    }

    if name.starts_with('.') {
        return Err(ManifestError::InvalidDependency(
            name.to_string(),
            "name cannot start with '.'",
        ));
    }

    Ok(())
}

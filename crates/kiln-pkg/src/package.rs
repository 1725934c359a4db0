//! Package directory layout and the in-memory package record.
//!
//! Every package occupies one directory under the packages root:
//! ```text
//! packages/
//! └── json-load/
//!     ├── kiln.json             # Package manifest
//!     ├── include/              # Headers exported to dependents
//!     ├── src/                  # Native sources
//!     └── lib/
//!         └── libjson-load.so   # Compiled artifact (platform extension)
//! ```

use crate::context::RestartRequest;
use crate::manifest::Manifest;
use crate::symbols::HookNames;
use std::path::PathBuf;

/// The manifest filename.
pub const MANIFEST_FILE: &str = "kiln.json";

/// Header directory, exported to dependents.
pub const INCLUDE_DIR: &str = "include";

/// Native source directory.
pub const SOURCE_DIR: &str = "src";

/// Compiled artifact directory.
pub const LIB_DIR: &str = "lib";

/// The host-built runtime package.
///
/// Playable packages ultimately link against it, but its artifact is
/// produced by the engine's own build, so the package compiler treats it as
/// already built.
pub const HOST_BUILT_PACKAGE: &str = "kiln-runtime";

/// Shared library extension for the current platform.
#[cfg(target_os = "windows")]
#[must_use]
pub const fn shared_library_ext() -> &'static str {
    "dll"
}

/// Shared library extension for the current platform.
#[cfg(target_os = "macos")]
#[must_use]
pub const fn shared_library_ext() -> &'static str {
    "dylib"
}

/// Shared library extension for the current platform.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
#[must_use]
pub const fn shared_library_ext() -> &'static str {
    "so"
}

/// Handle into the [`PackageStore`](crate::store::PackageStore) arena.
///
/// Cheap to copy; only the store that issued it can resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackageId(pub(crate) usize);

impl PackageId {
    /// Position of the package in the store's arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle of a package within one process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    /// Manifest parsed and validated; nothing built or loaded yet.
    ManifestLoaded,
    /// The compile step produced the artifact.
    Compiled,
    /// The compile step had nothing to do (host-built, header-only, or no
    /// compiled sources).
    CompileSkipped,
    /// The external toolchain reported failure.
    CompileFailed,
    /// The artifact is open in this process.
    Loaded,
    /// The `Run` hook owns the thread.
    Running,
    /// The run completed and the artifact was closed.
    Finished,
    /// The artifact could not be opened, or a required symbol was absent.
    LoadFailed,
    /// A hook reported failure.
    RunFailed,
}

/// A package known to the store.
///
/// One record exists per unique name for the lifetime of the store;
/// dependencies are non-owning [`PackageId`] back-references filled in
/// during resolution.
#[derive(Debug)]
pub struct Package {
    /// Directory (and registry) name.
    pub name: String,

    /// Author recorded in the manifest.
    pub author: String,

    /// Version recorded in the manifest; free-form, never interpreted.
    pub version: String,

    /// Whether the package provides a `Run` entry point.
    pub playable: bool,

    /// Whether the package carries sources for the native toolchain.
    pub uses_compiled_language: bool,

    /// Include-only package: exports headers, produces no artifact.
    pub header_only: bool,

    /// Extra link arguments from the manifest, verbatim.
    pub link_options: String,

    /// Direct dependency names in declaration order.
    pub dependency_names: Vec<String>,

    /// Resolved direct dependencies, same order as `dependency_names`.
    pub dependencies: Vec<PackageId>,

    /// Package directory under the packages root.
    pub path: PathBuf,

    /// Entry-point symbol names derived from the package name.
    pub hooks: HookNames,

    /// Current lifecycle state.
    pub state: PackageState,

    /// Restart request observed after the most recent run, if any.
    pub last_restart: RestartRequest,
}

impl Package {
    /// Build the record from a validated manifest.
    pub(crate) fn from_manifest(name: &str, path: PathBuf, manifest: Manifest) -> Self {
        let header_only = manifest.is_header_only();
        Self {
            hooks: HookNames::for_package(name),
            name: name.to_string(),
            author: manifest.author,
            version: manifest.version,
            playable: manifest.playable,
            uses_compiled_language: manifest.uses_compiled_language,
            header_only,
            link_options: manifest.link_options,
            dependency_names: manifest.depend,
            dependencies: Vec::new(),
            path,
            state: PackageState::ManifestLoaded,
            last_restart: RestartRequest::default(),
        }
    }

    /// The package's exported header directory.
    #[must_use]
    pub fn include_dir(&self) -> PathBuf {
        self.path.join(INCLUDE_DIR)
    }

    /// The package's native source directory.
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.path.join(SOURCE_DIR)
    }

    /// The directory holding the compiled artifact.
    #[must_use]
    pub fn lib_dir(&self) -> PathBuf {
        self.path.join(LIB_DIR)
    }

    /// Full path of the compiled artifact.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.lib_dir()
            .join(format!("lib{}.{}", self.name, shared_library_ext()))
    }

    /// Whether this is the host-built runtime package.
    #[must_use]
    pub fn is_host_built(&self) -> bool {
        self.name == HOST_BUILT_PACKAGE
    }

    /// Whether an artifact exists (or will exist) for this package, i.e.
    /// whether dependents link against it.
    #[must_use]
    pub fn has_artifact(&self) -> bool {
        self.uses_compiled_language && !self.header_only
    }

    /// Whether the compile step must build this package itself.
    #[must_use]
    pub fn needs_compile(&self) -> bool {
        self.has_artifact() && !self.is_host_built()
    }
}

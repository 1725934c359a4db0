//! Package management and module loading for the Kiln engine.
//!
//! This crate provides:
//! - Parsing and validation of `kiln.json` manifests
//! - The process-wide package registry and dependency resolution
//! - Compilation of package sources into per-package shared libraries
//! - Dynamic loading of the root package and its entry-point hooks
//! - The restart protocol and the C ABI running packages call back into

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod compile;
mod context;
mod manifest;
mod package;
mod report;
mod resolve;
mod store;
mod symbols;

/// Host ABI exported to running packages
/// Requires unsafe code for C string and pointer handling
#[allow(unsafe_code, clippy::missing_safety_doc)]
pub mod hostabi;

/// Dynamic loading requires unsafe code for dlopen and hook calls
#[allow(unsafe_code, clippy::missing_safety_doc)]
mod loader;

pub use compile::{compile_all, toolchain_available, BuildPlan, CompileError, CompileOptions};
pub use context::{HostContext, RestartRequest};
pub use loader::{load_and_run, HookError, LoadError, LoadOptions, LoaderError};
pub use manifest::{Manifest, ManifestError};
pub use package::{
    shared_library_ext, Package, PackageId, PackageState, HOST_BUILT_PACKAGE, INCLUDE_DIR,
    LIB_DIR, MANIFEST_FILE, SOURCE_DIR,
};
pub use report::Reporter;
pub use resolve::{dependency_chain, resolve, CompilationOrder, GraphError};
pub use store::{PackageStore, StoreError};
pub use symbols::{pascal_prefix, HookNames, INITIALIZE_SUFFIX, RUN_SUFFIX, RUN_TESTS_SUFFIX};

//! Compilation of packages into shared libraries.
//!
//! Each package with native sources becomes `lib/lib<name>.<ext>` inside
//! its own directory, built by the platform C++ toolchain. The compilation
//! order guarantees dependencies are built before their dependents, so a
//! dependent can link against artifacts that already exist.

use crate::package::{Package, PackageId, PackageState, LIB_DIR};
use crate::report::Reporter;
use crate::resolve::{dependency_chain, CompilationOrder};
use crate::store::PackageStore;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use thiserror::Error;

/// Errors from the compile step.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("package '{name}' declares compiled sources but src/ has none")]
    NoSources { name: String },

    #[error("bad source pattern for '{name}': {source}")]
    SourcePattern {
        name: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to create lib directory for '{name}': {source}")]
    LibDir {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to invoke '{tool}' for '{name}': {source}")]
    ToolSpawn {
        name: String,
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("toolchain failed for '{name}' ({status}):\n{stderr}")]
    ToolFailed {
        name: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Options for the compile step.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Suppress per-package progress lines.
    pub quiet: bool,
}

/// Everything one toolchain invocation needs, computed up front.
///
/// Building the plan is pure: nothing is spawned and nothing is written, so
/// the argument computation is testable without a toolchain installed.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Package being built.
    pub name: String,

    /// Source files in deterministic order.
    pub sources: Vec<PathBuf>,

    /// Include directories: the package's own, then every compiled package
    /// on its dependency chain, visited once.
    pub include_dirs: Vec<PathBuf>,

    /// Library directories of direct dependencies with artifacts.
    pub lib_dirs: Vec<PathBuf>,

    /// Library names of direct dependencies with artifacts.
    pub libs: Vec<String>,

    /// Run-path entries embedded in the artifact so the dynamic loader
    /// finds dependency artifacts relative to the consuming package.
    pub rpaths: Vec<String>,

    /// Verbatim arguments from the manifest's `link-options`.
    pub extra_args: Vec<String>,

    /// Artifact output path.
    pub output: PathBuf,
}

impl BuildPlan {
    /// Compute the plan for one package.
    ///
    /// # Errors
    ///
    /// Returns an error if source discovery fails or finds nothing.
    pub fn for_package(store: &PackageStore, id: PackageId) -> Result<Self, CompileError> {
        let pkg = store.get(id);

        let mut include_dirs = vec![pkg.include_dir()];
        for member in dependency_chain(store, id) {
            if member == id {
                continue;
            }
            let dep = store.get(member);
            if dep.uses_compiled_language {
                let dir = dep.include_dir();
                if !include_dirs.contains(&dir) {
                    include_dirs.push(dir);
                }
            }
        }

        // Host-built packages contribute headers only; their symbols live in
        // the host executable and resolve when the artifact is opened.
        let mut lib_dirs = Vec::new();
        let mut libs = Vec::new();
        let mut rpaths = Vec::new();
        for dep_id in &pkg.dependencies {
            let dep = store.get(*dep_id);
            if dep.has_artifact() && !dep.is_host_built() && !libs.contains(&dep.name) {
                lib_dirs.push(dep.lib_dir());
                rpaths.push(rpath_entry(&dep.name));
                libs.push(dep.name.clone());
            }
        }

        Ok(Self {
            name: pkg.name.clone(),
            sources: discover_sources(pkg)?,
            include_dirs,
            lib_dirs,
            libs,
            rpaths,
            extra_args: pkg.link_options.split_whitespace().map(String::from).collect(),
            output: pkg.artifact_path(),
        })
    }

    /// Arguments passed to the toolchain driver, in order.
    #[must_use]
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-std=c++17".into(),
            "-O2".into(),
            "-shared".into(),
            "-fPIC".into(),
        ];
        for dir in &self.include_dirs {
            args.push(format!("-I{}", dir.display()).into());
        }
        for source in &self.sources {
            args.push(source.clone().into_os_string());
        }
        for dir in &self.lib_dirs {
            args.push(format!("-L{}", dir.display()).into());
        }
        for lib in &self.libs {
            args.push(format!("-l{lib}").into());
        }
        for rpath in &self.rpaths {
            args.push(format!("-Wl,-rpath,{rpath}").into());
        }
        for extra in &self.extra_args {
            args.push(extra.into());
        }
        args.push("-o".into());
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// Compile every package in the order.
///
/// Host-built, header-only, and data-only packages are recorded as skipped
/// successes. The first toolchain failure aborts the remaining order, which
/// also short-circuits every dependent of the failed package.
///
/// # Errors
///
/// Returns the failure of the first package that could not be built.
pub fn compile_all(
    store: &mut PackageStore,
    order: &CompilationOrder,
    options: &CompileOptions,
) -> Result<(), CompileError> {
    let reporter = Reporter::new(options.quiet);
    for id in order {
        compile_one(store, id, &reporter)?;
    }
    Ok(())
}

fn compile_one(
    store: &mut PackageStore,
    id: PackageId,
    reporter: &Reporter,
) -> Result<(), CompileError> {
    if !store.get(id).needs_compile() {
        let pkg = store.get_mut(id);
        pkg.state = PackageState::CompileSkipped;
        log::debug!("compile: nothing to build for '{}'", pkg.name);
        return Ok(());
    }

    let plan = BuildPlan::for_package(store, id)?;
    reporter.say(&format!("building {}", plan.name));

    match run_tool(&plan) {
        Ok(()) => {
            store.get_mut(id).state = PackageState::Compiled;
            Ok(())
        }
        Err(err) => {
            store.get_mut(id).state = PackageState::CompileFailed;
            Err(err)
        }
    }
}

fn run_tool(plan: &BuildPlan) -> Result<(), CompileError> {
    if let Some(lib_dir) = plan.output.parent() {
        std::fs::create_dir_all(lib_dir).map_err(|source| CompileError::LibDir {
            name: plan.name.clone(),
            source,
        })?;
    }

    let tool = driver();
    log::debug!("compile: {tool} for '{}'", plan.name);
    let output = Command::new(tool)
        .args(plan.arguments())
        .output()
        .map_err(|source| CompileError::ToolSpawn {
            name: plan.name.clone(),
            tool: tool.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(CompileError::ToolFailed {
            name: plan.name.clone(),
            status: output.status,
            stderr,
        });
    }

    Ok(())
}

/// Collect `src/**/*.cpp` and `src/**/*.cc` for a package.
fn discover_sources(pkg: &Package) -> Result<Vec<PathBuf>, CompileError> {
    let mut sources = Vec::new();
    for ext in ["cpp", "cc"] {
        let pattern = format!("{}/**/*.{ext}", pkg.source_dir().display());
        let entries = glob::glob(&pattern).map_err(|source| CompileError::SourcePattern {
            name: pkg.name.clone(),
            source,
        })?;
        sources.extend(entries.filter_map(Result::ok));
    }
    sources.sort();

    if sources.is_empty() {
        return Err(CompileError::NoSources {
            name: pkg.name.clone(),
        });
    }
    Ok(sources)
}

/// Pick the toolchain driver. clang++ is preferred; `c++` is the alias
/// every unix toolchain installs.
fn driver() -> &'static str {
    if Command::new("clang++").arg("--version").output().is_ok() {
        "clang++"
    } else {
        "c++"
    }
}

/// Whether a usable toolchain driver is on PATH.
#[must_use]
pub fn toolchain_available() -> bool {
    Command::new(driver()).arg("--version").output().is_ok()
}

fn rpath_entry(dep_name: &str) -> String {
    format!("{}/../../{dep_name}/{LIB_DIR}", rpath_origin())
}

#[cfg(target_os = "macos")]
const fn rpath_origin() -> &'static str {
    "@loader_path"
}

#[cfg(not(target_os = "macos"))]
const fn rpath_origin() -> &'static str {
    "$ORIGIN"
}

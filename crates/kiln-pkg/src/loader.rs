//! Dynamic loading and hook driving.
//!
//! Only the root package's artifact is opened; dependency code is reachable
//! through the root's link closure, so one `dlopen` handle serves every
//! hook lookup of a run. The handle lives in the scope of a single run
//! attempt: it is closed on clean completion, on every failure, and before
//! each restart reopens the artifact.

use crate::context::{HostContext, RestartRequest};
use crate::package::{PackageId, PackageState};
use crate::report::Reporter;
use crate::resolve::dependency_chain;
use crate::store::PackageStore;
use libloading::{Library, Symbol};
use std::path::PathBuf;
use thiserror::Error;

/// Hook ABI: no arguments, boolean success.
type HookFn = unsafe extern "C" fn() -> bool;

/// Errors opening an artifact or resolving a required symbol.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open artifact for '{name}' at {}: {source}", .path.display())]
    Open {
        name: String,
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("package '{name}' is playable but does not export {symbol}")]
    MissingRunHook { name: String, symbol: String },
}

/// A hook ran and reported failure.
#[derive(Error, Debug)]
#[error("package '{package}': {symbol} reported failure")]
pub struct HookError {
    /// Package whose hook failed.
    pub package: String,

    /// The exact symbol that returned false.
    pub symbol: String,
}

/// Errors from [`load_and_run`].
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Options for a load-and-run invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Suppress progress lines; test-hook failures become best-effort.
    pub quiet: bool,

    /// Invoke the test hooks instead of the run hook.
    pub run_tests: bool,
}

/// Load the root package's artifact and drive its hooks.
///
/// One iteration opens the artifact, initializes the dependency chain in
/// dependency-first order, then either runs the test hooks or the root's
/// `Run` hook. Afterwards the restart record the package wrote through the
/// host ABI decides whether the artifact is reopened for another round;
/// the loop is unbounded by design. Test invocations never restart.
///
/// # Errors
///
/// Fails when the artifact cannot be opened, a playable root lacks its
/// `Run` hook, or a hook reports failure that no restart request recovers.
pub fn load_and_run(
    store: &mut PackageStore,
    ctx: &HostContext,
    root: PackageId,
    options: &LoadOptions,
) -> Result<(), LoaderError> {
    let chain = dependency_chain(store, root);
    let reporter = Reporter::new(options.quiet);
    let root_name = store.get(root).name.clone();

    loop {
        ctx.reset_restart();
        let request = run_once(store, ctx, root, &chain, options, &reporter)?;
        store.get_mut(root).last_restart = request.clone();

        if options.run_tests || !request.should_restart {
            store.get_mut(root).state = PackageState::Finished;
            return Ok(());
        }

        if let Some(args) = request.replacement_args {
            ctx.replace_args(args);
        }
        reporter.say(&format!("restarting {root_name}"));
    }
}

/// One open-initialize-run-close round.
fn run_once(
    store: &mut PackageStore,
    ctx: &HostContext,
    root: PackageId,
    chain: &[PackageId],
    options: &LoadOptions,
    reporter: &Reporter,
) -> Result<RestartRequest, LoaderError> {
    let lib = open_library(store, root)?;
    let root_name = store.get(root).name.clone();
    let _active = ActiveGuard::mark(ctx, &root_name);

    initialize_chain(store, &lib, chain, root, reporter)?;

    if options.run_tests {
        run_test_chain(store, &lib, chain, root, options.quiet, reporter)?;
        return Ok(ctx.take_restart());
    }

    let run_symbol = store.get(root).hooks.run.clone();
    let Some(hook) = optional_hook(&lib, &run_symbol) else {
        store.get_mut(root).state = PackageState::LoadFailed;
        return Err(LoadError::MissingRunHook {
            name: root_name,
            symbol: run_symbol,
        }
        .into());
    };

    store.get_mut(root).state = PackageState::Running;
    reporter.say(&format!("running {root_name}"));
    let succeeded = unsafe { hook() };
    let request = ctx.take_restart();

    if !succeeded {
        if let Some(message) = &request.failure_message {
            reporter.problem(message);
        }
        if !request.should_restart {
            store.get_mut(root).state = PackageState::RunFailed;
            return Err(HookError {
                package: root_name,
                symbol: run_symbol,
            }
            .into());
        }
        // A failed run may still ask for a restart; the failure message has
        // been shown and the reload proceeds.
        log::warn!("loader: '{root_name}' run failed, restart requested");
    }

    Ok(request)
    // `lib` drops here: the artifact is closed before any reopen or return.
}

fn open_library(store: &mut PackageStore, root: PackageId) -> Result<Library, LoadError> {
    let path = store.get(root).artifact_path();
    log::debug!("loader: opening '{}'", path.display());
    match unsafe { Library::new(&path) } {
        Ok(lib) => {
            store.get_mut(root).state = PackageState::Loaded;
            Ok(lib)
        }
        Err(source) => {
            let pkg = store.get_mut(root);
            pkg.state = PackageState::LoadFailed;
            Err(LoadError::Open {
                name: pkg.name.clone(),
                path,
                source,
            })
        }
    }
}

/// Look up a hook in the root's handle. Absence is not an error; the
/// convention makes every hook optional at the symbol level and the caller
/// decides which ones are required.
fn optional_hook<'lib>(lib: &'lib Library, symbol: &str) -> Option<Symbol<'lib, HookFn>> {
    unsafe { lib.get(symbol.as_bytes()) }.ok()
}

fn initialize_chain(
    store: &mut PackageStore,
    lib: &Library,
    chain: &[PackageId],
    root: PackageId,
    reporter: &Reporter,
) -> Result<(), HookError> {
    for &id in chain {
        let (name, symbol) = {
            let pkg = store.get(id);
            (pkg.name.clone(), pkg.hooks.initialize.clone())
        };
        let Some(hook) = optional_hook(lib, &symbol) else {
            log::debug!("loader: '{name}' exports no {symbol}");
            continue;
        };

        reporter.say(&format!("initializing {name}"));
        if !unsafe { hook() } {
            store.get_mut(id).state = PackageState::RunFailed;
            store.get_mut(root).state = PackageState::RunFailed;
            return Err(HookError {
                package: name,
                symbol,
            });
        }
    }
    Ok(())
}

fn run_test_chain(
    store: &mut PackageStore,
    lib: &Library,
    chain: &[PackageId],
    root: PackageId,
    best_effort: bool,
    reporter: &Reporter,
) -> Result<(), HookError> {
    for &id in chain {
        let (name, symbol) = {
            let pkg = store.get(id);
            (pkg.name.clone(), pkg.hooks.run_tests.clone())
        };
        let Some(hook) = optional_hook(lib, &symbol) else {
            continue;
        };

        reporter.say(&format!("testing {name}"));
        if unsafe { hook() } {
            continue;
        }

        if best_effort {
            reporter.problem(&format!("tests failed for {name}"));
            continue;
        }

        store.get_mut(id).state = PackageState::RunFailed;
        store.get_mut(root).state = PackageState::RunFailed;
        return Err(HookError {
            package: name,
            symbol,
        });
    }
    Ok(())
}

/// Clears the context's active-package slot when the scope exits, on both
/// the success and the error paths.
struct ActiveGuard<'a> {
    ctx: &'a HostContext,
}

impl<'a> ActiveGuard<'a> {
    fn mark(ctx: &'a HostContext, name: &str) -> Self {
        ctx.set_active(name);
        Self { ctx }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.ctx.clear_active();
    }
}

//! Kiln CLI - command-line host for Kiln engine packages
//!
//! Resolves a package's dependency tree, compiles every package into its
//! shared-library artifact, loads the root artifact, and drives its hooks.

use anyhow::{bail, Context, Result};
use clap::Parser;
use kiln_pkg::{
    compile_all, load_and_run, resolve, CompileOptions, HostContext, LoadOptions, PackageStore,
    Reporter,
};
use std::sync::Arc;

/// Default packages root, relative to the working directory.
const DEFAULT_PACKAGES_ROOT: &str = "packages";

/// Environment variable overriding the packages root.
const PACKAGES_ROOT_ENV: &str = "KILN_PACKAGES_ROOT";

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version = kiln_pkg::VERSION)]
#[command(about = "Host for Kiln engine packages", long_about = None)]
struct Cli {
    /// Compile the package and its dependencies, then exit
    #[arg(long, conflicts_with = "no_compile")]
    compile: bool,

    /// Skip compilation and load the existing artifacts (implies --quiet)
    #[arg(long)]
    no_compile: bool,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,

    /// Run the packages' test hooks instead of the run hook
    #[arg(long)]
    runtests: bool,

    /// Package to compile and/or run
    package: String,

    /// Arguments forwarded verbatim to the running package
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    package_args: Vec<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run(&Cli::parse()) {
        eprintln!("> error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let packages_root = std::env::var(PACKAGES_ROOT_ENV)
        .unwrap_or_else(|_| DEFAULT_PACKAGES_ROOT.to_string());
    log::debug!("packages root: {packages_root}");

    // The registry is emptied on success and failure alike.
    let mut store = PackageStore::new(&packages_root);
    let outcome = drive(cli, &mut store);
    store.clear();
    outcome
}

fn drive(cli: &Cli, store: &mut PackageStore) -> Result<()> {
    let quiet = cli.quiet || cli.no_compile;
    let reporter = Reporter::new(quiet);

    let order = resolve(store, &cli.package)
        .with_context(|| format!("failed to resolve '{}'", cli.package))?;

    if !cli.no_compile {
        compile_all(store, &order, &CompileOptions { quiet }).context("compilation aborted")?;
    }

    if cli.compile {
        reporter.say(&format!("compiled {}", cli.package));
        return Ok(());
    }

    let root = store
        .lookup(&cli.package)
        .context("root package missing after resolution")?;

    if !store.get(root).playable {
        bail!(
            "package '{}' is not playable; use --compile to build it",
            cli.package
        );
    }

    let ctx = kiln_pkg::hostabi::install(Arc::new(HostContext::new(cli.package_args.clone())));
    load_and_run(
        store,
        &ctx,
        root,
        &LoadOptions {
            quiet,
            run_tests: cli.runtests,
        },
    )
    .with_context(|| format!("package '{}' did not complete", cli.package))?;
    Ok(())
}

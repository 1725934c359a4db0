//! End-to-end pipeline tests: manifest -> resolve -> compile -> load -> hooks.
//!
//! These build real shared libraries with the system C++ toolchain and rely
//! on the dynamic loader resolving dependency symbols through the root
//! artifact's link closure, which is glibc behavior.

#![cfg(target_os = "linux")]

use kiln_pkg::{
    compile_all, load_and_run, resolve, toolchain_available, CompileError, CompileOptions,
    HostContext, LoadError, LoadOptions, LoaderError, PackageState, PackageStore, INCLUDE_DIR,
    MANIFEST_FILE, SOURCE_DIR,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn require_toolchain() -> bool {
    if toolchain_available() {
        return true;
    }
    eprintln!("skipping: no C++ toolchain on PATH");
    false
}

fn write_package(root: &Path, name: &str, manifest: &str) {
    let dir = root.join(name);
    fs::create_dir_all(dir.join(INCLUDE_DIR)).unwrap();
    fs::create_dir_all(dir.join(SOURCE_DIR)).unwrap();
    fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
}

fn write_source(root: &Path, name: &str, code: &str) {
    fs::write(root.join(name).join(SOURCE_DIR).join("hooks.cpp"), code).unwrap();
}

fn write_header(root: &Path, name: &str, file: &str, code: &str) {
    fs::write(root.join(name).join(INCLUDE_DIR).join(file), code).unwrap();
}

/// C++ hook source: `@LOG@` is the absolute log path, `@BODY@` the hooks.
fn hook_source(log: &Path, body: &str) -> String {
    r#"#include <cstdio>

static void note(const char* line) {
    std::FILE* out = std::fopen("@LOG@", "a");
    if (out) {
        std::fputs(line, out);
        std::fputc('\n', out);
        std::fclose(out);
    }
}

@BODY@
"#
    .replace("@LOG@", &log.display().to_string())
    .replace("@BODY@", body)
}

fn log_lines(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

/// A playable `demo` package over a compiled `core-lib` dependency. The demo
/// calls into core-lib so the artifact carries a real library dependency.
fn demo_fixture(root: &Path, log: &Path) {
    write_package(
        root,
        "core-lib",
        r#"{"author": "t", "version": "1", "playable": false, "uses-compiled-language": true}"#,
    );
    write_header(
        root,
        "core-lib",
        "core_lib.h",
        "#pragma once\nextern \"C\" int core_lib_value();\n",
    );
    write_source(
        root,
        "core-lib",
        &hook_source(
            log,
            r#"extern "C" int core_lib_value() { return 7; }
extern "C" bool CoreLib_Initialize() { note("CoreLib_Initialize"); return true; }"#,
        ),
    );

    write_package(
        root,
        "demo",
        r#"{"author": "t", "version": "1", "playable": true, "uses-compiled-language": true,
            "depend": ["core-lib"]}"#,
    );
    write_source(
        root,
        "demo",
        &hook_source(
            log,
            r#"#include <core_lib.h>

extern "C" bool Demo_Initialize() { note("Demo_Initialize"); return true; }
extern "C" bool Demo_RunTests() { note("Demo_RunTests"); return true; }
extern "C" bool Demo_Run() {
    if (core_lib_value() != 7) {
        return false;
    }
    note("Demo_Run");
    return true;
}"#,
        ),
    );
}

#[test]
fn test_compile_load_and_hook_order() {
    if !require_toolchain() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("hooks.log");
    demo_fixture(tmp.path(), &log);

    let mut store = PackageStore::new(tmp.path());
    let order = resolve(&mut store, "demo").unwrap();
    let names: Vec<&str> = order.ids().iter().map(|&id| store.get(id).name.as_str()).collect();
    assert_eq!(names, vec!["core-lib", "demo"]);

    compile_all(&mut store, &order, &CompileOptions { quiet: true }).unwrap();
    for id in &order {
        let pkg = store.get(id);
        assert_eq!(pkg.state, PackageState::Compiled, "{}", pkg.name);
        assert!(pkg.artifact_path().exists(), "{}", pkg.name);
    }

    let ctx = HostContext::new(vec![]);
    let demo = store.lookup("demo").unwrap();
    load_and_run(
        &mut store,
        &ctx,
        demo,
        &LoadOptions {
            quiet: true,
            run_tests: false,
        },
    )
    .unwrap();

    // Dependency-first initialization, then the root's run hook. core-lib
    // exports no test or run hooks and that is not an error.
    assert_eq!(
        log_lines(&log),
        vec!["CoreLib_Initialize", "Demo_Initialize", "Demo_Run"]
    );
    assert_eq!(store.get(demo).state, PackageState::Finished);
    assert_eq!(ctx.active_package(), None);

    // The artifact was closed after the first run, so a second invocation
    // reopens it. Test mode drives the test hooks and never calls Run.
    fs::write(&log, "").unwrap();
    load_and_run(
        &mut store,
        &ctx,
        demo,
        &LoadOptions {
            quiet: true,
            run_tests: true,
        },
    )
    .unwrap();
    assert_eq!(
        log_lines(&log),
        vec!["CoreLib_Initialize", "Demo_Initialize", "Demo_RunTests"]
    );

    // A completed run leaves no handle on the artifact: the package can be
    // rebuilt in place and the next run executes the fresh code. A leaked
    // library handle would hand the stale mapping back to dlopen instead.
    write_source(
        tmp.path(),
        "demo",
        &hook_source(
            &log,
            r#"#include <core_lib.h>

extern "C" bool Demo_Initialize() { note("Demo_Initialize"); return true; }
extern "C" bool Demo_Run() {
    if (core_lib_value() != 7) {
        return false;
    }
    note("Demo_Run rebuilt");
    return true;
}"#,
        ),
    );
    compile_all(&mut store, &order, &CompileOptions { quiet: true }).unwrap();
    assert_eq!(store.get(demo).state, PackageState::Compiled);

    fs::write(&log, "").unwrap();
    load_and_run(
        &mut store,
        &ctx,
        demo,
        &LoadOptions {
            quiet: true,
            run_tests: false,
        },
    )
    .unwrap();
    assert_eq!(
        log_lines(&log),
        vec!["CoreLib_Initialize", "Demo_Initialize", "Demo_Run rebuilt"]
    );
    assert_eq!(store.get(demo).state, PackageState::Finished);
}

#[test]
fn test_initialize_failure_aborts_run() {
    if !require_toolchain() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("hooks.log");
    write_package(
        tmp.path(),
        "flaky",
        r#"{"author": "t", "version": "1", "playable": true, "uses-compiled-language": true}"#,
    );
    write_source(
        tmp.path(),
        "flaky",
        &hook_source(
            &log,
            r#"extern "C" bool Flaky_Initialize() { note("Flaky_Initialize"); return false; }
extern "C" bool Flaky_Run() { note("Flaky_Run"); return true; }"#,
        ),
    );

    let mut store = PackageStore::new(tmp.path());
    let order = resolve(&mut store, "flaky").unwrap();
    compile_all(&mut store, &order, &CompileOptions { quiet: true }).unwrap();

    let ctx = HostContext::new(vec![]);
    let flaky = store.lookup("flaky").unwrap();
    let err = load_and_run(&mut store, &ctx, flaky, &LoadOptions::default()).unwrap_err();
    match err {
        LoaderError::Hook(hook) => {
            assert_eq!(hook.package, "flaky");
            assert_eq!(hook.symbol, "Flaky_Initialize");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(log_lines(&log), vec!["Flaky_Initialize"]);
    assert_eq!(store.get(flaky).state, PackageState::RunFailed);
    assert_eq!(ctx.active_package(), None);
}

#[test]
fn test_playable_without_run_hook_fails_to_load() {
    if !require_toolchain() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("hooks.log");
    write_package(
        tmp.path(),
        "no-run",
        r#"{"author": "t", "version": "1", "playable": true, "uses-compiled-language": true}"#,
    );
    write_source(
        tmp.path(),
        "no-run",
        &hook_source(
            &log,
            r#"extern "C" bool NoRun_Initialize() { note("NoRun_Initialize"); return true; }"#,
        ),
    );

    let mut store = PackageStore::new(tmp.path());
    let order = resolve(&mut store, "no-run").unwrap();
    compile_all(&mut store, &order, &CompileOptions { quiet: true }).unwrap();

    let ctx = HostContext::new(vec![]);
    let no_run = store.lookup("no-run").unwrap();
    let err = load_and_run(&mut store, &ctx, no_run, &LoadOptions::default()).unwrap_err();
    match err {
        LoaderError::Load(LoadError::MissingRunHook { name, symbol }) => {
            assert_eq!(name, "no-run");
            assert_eq!(symbol, "NoRun_Run");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.get(no_run).state, PackageState::LoadFailed);
}

#[test]
fn test_run_failure_without_restart_is_an_error() {
    if !require_toolchain() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("hooks.log");
    write_package(
        tmp.path(),
        "sad",
        r#"{"author": "t", "version": "1", "playable": true, "uses-compiled-language": true}"#,
    );
    write_source(
        tmp.path(),
        "sad",
        &hook_source(&log, r#"extern "C" bool Sad_Run() { note("Sad_Run"); return false; }"#),
    );

    let mut store = PackageStore::new(tmp.path());
    let order = resolve(&mut store, "sad").unwrap();
    compile_all(&mut store, &order, &CompileOptions { quiet: true }).unwrap();

    let ctx = HostContext::new(vec![]);
    let sad = store.lookup("sad").unwrap();
    let err = load_and_run(&mut store, &ctx, sad, &LoadOptions::default()).unwrap_err();
    match err {
        LoaderError::Hook(hook) => {
            assert_eq!(hook.package, "sad");
            assert_eq!(hook.symbol, "Sad_Run");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.get(sad).state, PackageState::RunFailed);
}

#[test]
fn test_compile_failure_short_circuits_dependents() {
    if !require_toolchain() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    write_package(
        tmp.path(),
        "broken",
        r#"{"author": "t", "version": "1", "playable": false, "uses-compiled-language": true}"#,
    );
    write_source(tmp.path(), "broken", "this is not C++\n");
    write_package(
        tmp.path(),
        "app",
        r#"{"author": "t", "version": "1", "playable": true, "uses-compiled-language": true,
            "depend": ["broken"]}"#,
    );
    write_source(tmp.path(), "app", "extern \"C\" bool App_Run() { return true; }\n");

    let mut store = PackageStore::new(tmp.path());
    let order = resolve(&mut store, "app").unwrap();
    let err = compile_all(&mut store, &order, &CompileOptions { quiet: true }).unwrap_err();
    assert!(matches!(err, CompileError::ToolFailed { ref name, .. } if name == "broken"));

    // The dependent was never reached.
    let broken = store.lookup("broken").unwrap();
    let app = store.lookup("app").unwrap();
    assert_eq!(store.get(broken).state, PackageState::CompileFailed);
    assert_eq!(store.get(app).state, PackageState::ManifestLoaded);
}

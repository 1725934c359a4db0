//! Entry-point symbol naming.
//!
//! Package directory names are kebab-case; the hooks a package exports use
//! the PascalCase form of the name joined to a fixed suffix. The package
//! `json-load` exports `JsonLoad_Initialize`, `JsonLoad_RunTests`, and
//! `JsonLoad_Run`.

/// Suffix of the optional initialize hook.
pub const INITIALIZE_SUFFIX: &str = "_Initialize";

/// Suffix of the optional test hook.
pub const RUN_TESTS_SUFFIX: &str = "_RunTests";

/// Suffix of the run hook, required for playable packages.
pub const RUN_SUFFIX: &str = "_Run";

/// Convert a kebab-case package name to its PascalCase symbol prefix.
///
/// Each `-`-separated segment contributes its first character uppercased
/// followed by the rest of the segment unchanged. Empty segments are
/// skipped, so stray or doubled hyphens cannot produce odd symbols.
#[must_use]
pub fn pascal_prefix(name: &str) -> String {
    let mut prefix = String::with_capacity(name.len());
    for segment in name.split('-') {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            prefix.push(first.to_ascii_uppercase());
            prefix.push_str(chars.as_str());
        }
    }
    prefix
}

/// The entry-point symbol names of one package, computed once at
/// registration and reused for every lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookNames {
    /// PascalCase prefix shared by the three symbols.
    pub prefix: String,

    /// `<Prefix>_Initialize` (optional).
    pub initialize: String,

    /// `<Prefix>_RunTests` (optional).
    pub run_tests: String,

    /// `<Prefix>_Run` (required when the package is playable).
    pub run: String,
}

impl HookNames {
    /// Derive the symbol table for a package name.
    #[must_use]
    pub fn for_package(name: &str) -> Self {
        let prefix = pascal_prefix(name);
        Self {
            initialize: format!("{prefix}{INITIALIZE_SUFFIX}"),
            run_tests: format!("{prefix}{RUN_TESTS_SUFFIX}"),
            run: format!("{prefix}{RUN_SUFFIX}"),
            prefix,
        }
    }
}

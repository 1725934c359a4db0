//! User-facing progress and diagnostic lines.
//!
//! Host activity is printed with a leading `> ` so engine output stays
//! distinguishable from whatever the running package prints on the same
//! terminal. Everything goes to stderr; stdout belongs to packages.

/// Writes `> `-prefixed lines to stderr.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    /// Create a reporter; `quiet` suppresses progress lines.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Whether progress lines are suppressed.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Print a progress line unless quiet.
    pub fn say(&self, message: &str) {
        if !self.quiet {
            eprintln!("> {message}");
        }
    }

    /// Print a diagnostic line. Diagnostics are never suppressed.
    pub fn problem(&self, message: &str) {
        eprintln!("> {message}");
    }
}

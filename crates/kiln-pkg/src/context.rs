//! State shared between the host and running package code.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// A restart request written by running package code.
///
/// The default value is the clean state: no restart, no message, keep the
/// current argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartRequest {
    /// Reload the root artifact and run again after `Run` returns.
    pub should_restart: bool,

    /// Shown when the run reports failure.
    pub failure_message: Option<String>,

    /// Replaces the forwarded argument list before the next run.
    pub replacement_args: Option<Vec<String>>,
}

/// The host-side state a running package can observe and mutate.
///
/// One instance lives for the whole process run; the restart loop reuses it
/// across reloads. The loader owns the handoff points: it resets the
/// restart record before each run attempt and takes it after `Run` returns,
/// while package code writes through the exported `Kiln_*` symbols in
/// between. The record must stay usable even if a hook panicked mid-update,
/// so lock poisoning is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct HostContext {
    active: Mutex<Option<String>>,
    args: Mutex<Vec<String>>,
    restart: Mutex<RestartRequest>,
}

impl HostContext {
    /// Create a context carrying the forwarded package arguments.
    #[must_use]
    pub fn new(args: Vec<String>) -> Self {
        Self {
            active: Mutex::new(None),
            args: Mutex::new(args),
            restart: Mutex::default(),
        }
    }

    /// Name of the package currently marked active, if any.
    #[must_use]
    pub fn active_package(&self) -> Option<String> {
        lock(&self.active).clone()
    }

    pub(crate) fn set_active(&self, name: &str) {
        *lock(&self.active) = Some(name.to_string());
    }

    pub(crate) fn clear_active(&self) {
        *lock(&self.active) = None;
    }

    /// The forwarded argument list as the running package sees it.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        lock(&self.args).clone()
    }

    /// Replace the forwarded argument list.
    pub fn replace_args(&self, args: Vec<String>) {
        *lock(&self.args) = args;
    }

    /// Record a restart request, optionally with a replacement argument
    /// list for the next run.
    pub fn request_restart(&self, replacement_args: Option<Vec<String>>) {
        let mut restart = lock(&self.restart);
        restart.should_restart = true;
        if replacement_args.is_some() {
            restart.replacement_args = replacement_args;
        }
    }

    /// Record the message to show if the current run reports failure.
    pub fn set_failure_message(&self, message: impl Into<String>) {
        lock(&self.restart).failure_message = Some(message.into());
    }

    /// Clear the restart record ahead of a run attempt.
    pub fn reset_restart(&self) {
        *lock(&self.restart) = RestartRequest::default();
    }

    /// Take the restart record, leaving the clean state behind.
    #[must_use]
    pub fn take_restart(&self) -> RestartRequest {
        std::mem::take(&mut *lock(&self.restart))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_clean() {
        let ctx = HostContext::new(vec!["one".into()]);
        let req = ctx.take_restart();
        assert!(!req.should_restart);
        assert!(req.failure_message.is_none());
        assert!(req.replacement_args.is_none());
    }

    #[test]
    fn restart_request_round_trip() {
        let ctx = HostContext::default();
        ctx.request_restart(None);
        let req = ctx.take_restart();
        assert!(req.should_restart);
        assert!(req.replacement_args.is_none());

        // Taking leaves the clean state behind.
        assert!(!ctx.take_restart().should_restart);
    }

    #[test]
    fn restart_with_replacement_args() {
        let ctx = HostContext::default();
        ctx.request_restart(Some(vec!["fast".into(), "windowed".into()]));
        let req = ctx.take_restart();
        assert!(req.should_restart);
        assert_eq!(
            req.replacement_args,
            Some(vec!["fast".to_string(), "windowed".to_string()])
        );
    }

    #[test]
    fn failure_message_is_recorded() {
        let ctx = HostContext::default();
        ctx.set_failure_message("asset pack missing");
        assert_eq!(
            ctx.take_restart().failure_message.as_deref(),
            Some("asset pack missing")
        );
    }

    #[test]
    fn reset_discards_pending_request() {
        let ctx = HostContext::default();
        ctx.request_restart(Some(vec!["x".into()]));
        ctx.reset_restart();
        assert_eq!(ctx.take_restart(), RestartRequest::default());
    }

    #[test]
    fn args_are_replaceable() {
        let ctx = HostContext::new(vec!["a".into()]);
        assert_eq!(ctx.args(), vec!["a".to_string()]);
        ctx.replace_args(vec!["b".into(), "c".into()]);
        assert_eq!(ctx.args(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn active_package_slot() {
        let ctx = HostContext::default();
        assert!(ctx.active_package().is_none());
        ctx.set_active("demo");
        assert_eq!(ctx.active_package().as_deref(), Some("demo"));
        ctx.clear_active();
        assert!(ctx.active_package().is_none());
    }
}

//! C symbols exported to running package code.
//!
//! Hook entry points take no arguments, so a package reaches host state by
//! calling back into symbols the host executable exports (the `kiln` binary
//! links with `-rdynamic` on linux so dlopened artifacts can resolve them):
//!
//! ```c
//! void   Kiln_RequestRestart(void);
//! void   Kiln_RequestRestartWith(const char *const *argv, size_t argc);
//! void   Kiln_SetFailureMessage(const char *message);
//! size_t Kiln_ArgumentCount(void);
//! size_t Kiln_CopyArgument(size_t index, char *buf, size_t cap);
//! ```
//!
//! Every function is a no-op (or returns zero) until [`install`] binds a
//! context, and all of them tolerate null pointers.

use crate::context::HostContext;
use std::ffi::{c_char, CStr};
use std::sync::{Arc, OnceLock};

static HOST: OnceLock<Arc<HostContext>> = OnceLock::new();

/// Bind the context consulted by the exported symbols.
///
/// The first installation wins and later calls return the context already
/// installed; the restart loop reuses one context across reloads.
pub fn install(ctx: Arc<HostContext>) -> Arc<HostContext> {
    // Taking the addresses of the exported functions keeps their object
    // file in the final link even though no Rust code calls them.
    let _exports: [*const (); 5] = [
        kiln_request_restart as *const (),
        kiln_request_restart_with as *const (),
        kiln_set_failure_message as *const (),
        kiln_argument_count as *const (),
        kiln_copy_argument as *const (),
    ];
    HOST.get_or_init(|| ctx).clone()
}

/// The context bound by [`install`], if any.
#[must_use]
pub fn installed() -> Option<Arc<HostContext>> {
    HOST.get().cloned()
}

/// Ask for a full reload of the root package after `Run` returns.
#[export_name = "Kiln_RequestRestart"]
extern "C" fn kiln_request_restart() {
    if let Some(ctx) = HOST.get() {
        log::debug!("hostabi: restart requested");
        ctx.request_restart(None);
    }
}

/// Ask for a reload and replace the forwarded argument list.
///
/// `argv` holds `argc` NUL-terminated strings; a null `argv` keeps the
/// current arguments and a null entry ends the list early.
#[export_name = "Kiln_RequestRestartWith"]
unsafe extern "C" fn kiln_request_restart_with(argv: *const *const c_char, argc: usize) {
    let Some(ctx) = HOST.get() else { return };
    if argv.is_null() {
        ctx.request_restart(None);
        return;
    }

    let mut args = Vec::with_capacity(argc);
    for i in 0..argc {
        let ptr = unsafe { *argv.add(i) };
        if ptr.is_null() {
            break;
        }
        let arg = unsafe { CStr::from_ptr(ptr) };
        args.push(arg.to_string_lossy().into_owned());
    }
    log::debug!("hostabi: restart requested with {} arg(s)", args.len());
    ctx.request_restart(Some(args));
}

/// Record the message shown if the current run reports failure.
#[export_name = "Kiln_SetFailureMessage"]
unsafe extern "C" fn kiln_set_failure_message(message: *const c_char) {
    let Some(ctx) = HOST.get() else { return };
    if message.is_null() {
        return;
    }
    let message = unsafe { CStr::from_ptr(message) };
    ctx.set_failure_message(message.to_string_lossy().into_owned());
}

/// Number of forwarded arguments.
#[export_name = "Kiln_ArgumentCount"]
extern "C" fn kiln_argument_count() -> usize {
    HOST.get().map_or(0, |ctx| ctx.args().len())
}

/// Copy the argument at `index` into `buf`, NUL-terminated.
///
/// Returns the argument's full byte length (excluding the NUL), or 0 when
/// the index is out of range. A too-small buffer truncates the copy but
/// still terminates it, so callers can compare the return value against
/// `cap` to detect truncation.
#[export_name = "Kiln_CopyArgument"]
unsafe extern "C" fn kiln_copy_argument(index: usize, buf: *mut c_char, cap: usize) -> usize {
    let Some(ctx) = HOST.get() else { return 0 };
    let args = ctx.args();
    let Some(arg) = args.get(index) else { return 0 };

    let bytes = arg.as_bytes();
    if !buf.is_null() && cap > 0 {
        let copied = bytes.len().min(cap - 1);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buf, copied);
            *buf.add(copied) = 0;
        }
    }
    bytes.len()
}

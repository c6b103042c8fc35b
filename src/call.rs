//! Thin shim between the safe wrappers and raw engine entry points
//!
//! Every raw call is made through one of the helpers here. They translate
//! the engine's status-code convention into `Result`, capturing the
//! thread-local error detail before anything else can overwrite it, and
//! they own the boundary chores around C strings and out-pointers. Code
//! outside this module never inspects a raw status itself.

use std::ffi::CString;
use std::mem;
use std::path::Path;
use std::ptr;

use libc::c_int;
use libgit2_sys as raw;

use crate::error::{GitError, GitResult};
use crate::handle::{Handle, Resource};
use crate::types::Oid;

/// Run a call that only reports a status.
pub(crate) fn unit(operation: &'static str, invoke: impl FnOnce() -> c_int) -> GitResult<()> {
    let status = invoke();
    if status == raw::GIT_OK {
        Ok(())
    } else {
        Err(GitError::from_last(status, operation))
    }
}

/// Run a call whose non-negative status answers a yes/no question.
pub(crate) fn boolean(operation: &'static str, invoke: impl FnOnce() -> c_int) -> GitResult<bool> {
    let status = invoke();
    if status < 0 {
        return Err(GitError::from_last(status, operation));
    }
    Ok(status > 0)
}

/// Run a call that returns an owned handle through an out-pointer.
///
/// A null handle next to an OK status still counts as a failure; the
/// ownership layer is never handed a null pointer.
pub(crate) fn out_handle<T, F>(operation: &'static str, fill: F) -> GitResult<Handle<T>>
where
    T: Resource,
    F: FnOnce(*mut *mut T) -> c_int,
{
    let mut out: *mut T = ptr::null_mut();
    let status = fill(&mut out);
    if status != raw::GIT_OK {
        return Err(GitError::from_last(status, operation));
    }
    Handle::from_raw(out).ok_or_else(|| {
        GitError::with_message(
            raw::GIT_ERROR,
            operation,
            format!("engine reported success but produced no {}", T::KIND),
        )
    })
}

/// Run a call that writes an object id through an out-pointer.
pub(crate) fn out_oid(
    operation: &'static str,
    fill: impl FnOnce(*mut raw::git_oid) -> c_int,
) -> GitResult<Oid> {
    let mut out: raw::git_oid = unsafe { mem::zeroed() };
    let status = fill(&mut out);
    if status != raw::GIT_OK {
        return Err(GitError::from_last(status, operation));
    }
    Ok(Oid::from_raw(out))
}

/// convert text crossing the boundary into a C string
pub(crate) fn text_to_cstring(text: &str, operation: &'static str) -> GitResult<CString> {
    CString::new(text).map_err(|_| interior_nul(operation))
}

/// convert a path crossing the boundary into a C string, byte-wise on unix
#[cfg(unix)]
pub(crate) fn path_to_cstring(path: &Path, operation: &'static str) -> GitResult<CString> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| interior_nul(operation))
}

#[cfg(not(unix))]
pub(crate) fn path_to_cstring(path: &Path, operation: &'static str) -> GitResult<CString> {
    let text = path.to_str().ok_or_else(|| {
        GitError::with_message(raw::GIT_EINVALID, operation, "path is not valid unicode")
    })?;
    CString::new(text).map_err(|_| interior_nul(operation))
}

fn interior_nul(operation: &'static str) -> GitError {
    GitError::with_message(
        raw::GIT_EINVALID,
        operation,
        "string contains an interior NUL byte",
    )
}

//! Branch handles and lookup.
//!
//! A [`Branch`] owns an engine reference handle that was duplicated out of
//! the lookup call, plus the short name decoded at lookup time. The
//! duplicate is pinned by the engine's own reference counting, so a branch
//! stays usable after the repository wrapper that produced it is gone.

use std::ffi::CStr;
use std::fmt;
use std::ptr;
use std::str;

use libgit2_sys as raw;
use tracing::warn;

use crate::call;
use crate::error::GitResult;
use crate::handle::Handle;
use crate::repository::Repository;
use crate::types::Oid;

/// A local branch.
///
/// Carries its own engine handle and the name decoded when it was looked
/// up; renames performed afterwards do not change what [`Branch::name`]
/// returns.
pub struct Branch {
    handle: Handle<raw::git_reference>,
    name: String,
}

// Confined to one thread at a time, same as Repository.
unsafe impl Send for Branch {}

impl Branch {
    /// short name of the branch, as decoded at lookup time
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Commit id the branch points at, if it points at one directly.
    pub fn target(&self) -> Option<Oid> {
        let id = unsafe { raw::git_reference_target(self.handle.as_ptr()) };
        if id.is_null() {
            return None;
        }
        Some(Oid::from_raw(unsafe { *id }))
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch").field("name", &self.name).finish()
    }
}

/// Look up a local branch by short name.
///
/// A branch that does not exist is an ordinary outcome and comes back as
/// `None`. Duplication failing after a successful lookup is not: that is a
/// systemic error and propagates, never folded into absence.
pub(crate) fn lookup(repo: &Repository, name: &str) -> GitResult<Option<Branch>> {
    let name_c = call::text_to_cstring(name, "git_branch_lookup")?;
    let found = match call::out_handle("git_branch_lookup", |out| unsafe {
        raw::git_branch_lookup(out, repo.raw(), name_c.as_ptr(), raw::GIT_BRANCH_LOCAL)
    }) {
        Ok(handle) => handle,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };

    let owned = found.duplicate()?;
    // The lookup handle has served its purpose; only the duplicate lives on.
    drop(found);

    match decode_name(&owned) {
        Some(decoded) => Ok(Some(Branch {
            handle: owned,
            name: decoded,
        })),
        None => {
            warn!(branch = name, "branch name did not decode, treating as not found");
            Ok(None)
        }
    }
}

/// Decode the short branch name, or `None` when the engine has no valid
/// text for it.
fn decode_name(reference: &Handle<raw::git_reference>) -> Option<String> {
    let mut out = ptr::null();
    call::unit("git_branch_name", || unsafe {
        raw::git_branch_name(&mut out, reference.as_ptr())
    })
    .ok()?;
    if out.is_null() {
        return None;
    }
    let text = str::from_utf8(unsafe { CStr::from_ptr(out) }.to_bytes()).ok()?;
    if text.is_empty() {
        return None;
    }
    Some(text.to_owned())
}

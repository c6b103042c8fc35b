//! Owned handles for engine-allocated resources
//!
//! The engine hands out raw pointers that must be released exactly once.
//! [`Handle`] pairs such a pointer with the release routine for its kind so
//! ownership is enforced by the type system: construction takes the pointer
//! in, drop gives it back, and the pointer never leaves the crate.
//!
//! Handles are deliberately not `Clone`. For resource kinds the engine can
//! copy, [`Handle::duplicate`] asks it for an independent second handle,
//! and that duplication is fallible like any other engine call.

use std::fmt;
use std::ptr::NonNull;

use libc::c_int;
use libgit2_sys as raw;

use crate::call;
use crate::error::{GitError, GitResult};

/// An engine resource kind that knows how to release itself.
///
/// # Safety
///
/// `release` must be the engine's free routine for the pointed-to kind and
/// must be safe to call exactly once on a pointer the engine handed out.
pub(crate) unsafe trait Resource {
    /// short kind name used in diagnostics
    const KIND: &'static str;

    /// Release a resource the engine allocated. Called at most once.
    unsafe fn release(this: *mut Self);
}

unsafe impl Resource for raw::git_repository {
    const KIND: &'static str = "repository";

    unsafe fn release(this: *mut Self) {
        raw::git_repository_free(this);
    }
}

unsafe impl Resource for raw::git_reference {
    const KIND: &'static str = "reference";

    unsafe fn release(this: *mut Self) {
        raw::git_reference_free(this);
    }
}

unsafe impl Resource for raw::git_treebuilder {
    const KIND: &'static str = "tree builder";

    unsafe fn release(this: *mut Self) {
        raw::git_treebuilder_free(this);
    }
}

unsafe impl Resource for raw::git_tree {
    const KIND: &'static str = "tree";

    unsafe fn release(this: *mut Self) {
        raw::git_tree_free(this);
    }
}

unsafe impl Resource for raw::git_signature {
    const KIND: &'static str = "signature";

    unsafe fn release(this: *mut Self) {
        raw::git_signature_free(this);
    }
}

/// A resource kind the engine can duplicate into an independent copy.
///
/// # Safety
///
/// `duplicate` must be the engine's duplication routine for this kind, and
/// the handle it writes must be releasable independently of the source.
pub(crate) unsafe trait Duplicate: Resource {
    /// native operation name recorded on duplication failures
    const OPERATION: &'static str;

    unsafe fn duplicate(out: *mut *mut Self, source: *mut Self) -> c_int;
}

// Engine routine bound directly; everything else comes through libgit2-sys.
extern "C" {
    fn git_reference_dup(
        dest: *mut *mut raw::git_reference,
        source: *mut raw::git_reference,
    ) -> c_int;
}

unsafe impl Duplicate for raw::git_reference {
    const OPERATION: &'static str = "git_reference_dup";

    unsafe fn duplicate(out: *mut *mut Self, source: *mut Self) -> c_int {
        git_reference_dup(out, source)
    }
}

/// Sole owner of one engine-allocated resource.
pub(crate) struct Handle<T: Resource> {
    ptr: NonNull<T>,
}

impl<T: Resource> Handle<T> {
    /// Take ownership of a pointer the engine handed out. Null yields `None`.
    pub(crate) fn from_raw(ptr: *mut T) -> Option<Handle<T>> {
        NonNull::new(ptr).map(|ptr| Handle { ptr })
    }

    /// the raw pointer, for passing back into engine calls
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T: Duplicate> Handle<T> {
    /// Ask the engine for an independent copy of this resource.
    pub(crate) fn duplicate(&self) -> GitResult<Handle<T>> {
        self.duplicate_with(|err| err)
    }

    /// Duplicate, mapping a failure into the caller's own error type.
    ///
    /// A failed duplication is a systemic problem, not a missing resource.
    /// Callers that fold lookups into `Option` must keep it as an error,
    /// and the mapper lets them shape it without touching the raw status.
    pub(crate) fn duplicate_with<E>(
        &self,
        map_err: impl FnOnce(GitError) -> E,
    ) -> Result<Handle<T>, E> {
        call::out_handle(T::OPERATION, |out| unsafe { T::duplicate(out, self.as_ptr()) })
            .map_err(map_err)
    }
}

impl<T: Resource> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &T::KIND)
            .field("ptr", &self.ptr)
            .finish()
    }
}

impl<T: Resource> Drop for Handle<T> {
    fn drop(&mut self) {
        // Sole release point; from_raw guarantees the pointer is non-null.
        unsafe { T::release(self.ptr.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;
    use std::ptr;

    use tempfile::TempDir;

    use super::*;
    use crate::{Repository, DEFAULT_BRANCH};

    fn setup() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    fn lookup_default(repo: &Repository) -> Handle<raw::git_reference> {
        let name = call::text_to_cstring(DEFAULT_BRANCH, "git_branch_lookup").unwrap();
        call::out_handle("git_branch_lookup", |out| unsafe {
            raw::git_branch_lookup(out, repo.raw(), name.as_ptr(), raw::GIT_BRANCH_LOCAL)
        })
        .unwrap()
    }

    fn short_name(reference: &Handle<raw::git_reference>) -> String {
        let mut out = ptr::null();
        let status = unsafe { raw::git_branch_name(&mut out, reference.as_ptr()) };
        assert_eq!(status, 0);
        unsafe { CStr::from_ptr(out) }.to_str().unwrap().to_owned()
    }

    #[test]
    fn test_duplicate_is_independent_of_the_original() {
        let (_dir, repo) = setup();
        let original = lookup_default(&repo);
        let copy = original.duplicate().unwrap();

        drop(original);

        assert_eq!(short_name(&copy), DEFAULT_BRANCH);
    }

    #[test]
    fn test_both_handles_release_cleanly() {
        let (_dir, repo) = setup();
        let original = lookup_default(&repo);
        let copy = original.duplicate().unwrap();

        drop(copy);

        // the original still resolves after the copy is gone
        assert_eq!(short_name(&original), DEFAULT_BRANCH);
    }

    #[test]
    fn test_duplicate_with_maps_into_caller_error() {
        let (_dir, repo) = setup();
        let original = lookup_default(&repo);

        let copy: Result<_, String> = original.duplicate_with(|err| format!("dup failed: {err}"));
        assert!(copy.is_ok());
    }

    #[test]
    fn test_from_raw_rejects_null() {
        assert!(Handle::<raw::git_repository>::from_raw(ptr::null_mut()).is_none());
    }

    #[test]
    fn test_debug_names_the_kind() {
        let (_dir, repo) = setup();
        let reference = lookup_default(&repo);

        assert!(format!("{reference:?}").contains("reference"));
    }
}

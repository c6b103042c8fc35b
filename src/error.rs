//! Error types for engine calls
//!
//! Every fallible native call funnels its status through [`GitError`]. The
//! engine reports failure detail through a thread-local "last error" slot
//! that is only valid until the next call on the same thread, so the message
//! is resolved eagerly at construction time and copied into owned storage.
//! We use `thiserror` for the `Display`/`Error` plumbing.

use std::ffi::CStr;

use libc::c_int;
use libgit2_sys as raw;
use thiserror::Error;

/// result type alias for engine operations
pub type GitResult<T> = Result<T, GitError>;

/// An error returned by a native engine call.
///
/// Carries the raw signed status code, the name of the native operation that
/// failed (when one was recorded), and a message resolved once, when the
/// error was built. Resolution order: an explicit caller-supplied text wins,
/// then the fixed text for the few codes the engine never describes, then
/// whatever the engine left in its thread-local error slot. A message can
/// still end up absent; `Display` substitutes placeholders so the output
/// always names an operation and a message.
#[derive(Debug, Error)]
#[error("{} (code {code}): {}", .operation.unwrap_or("unspecified operation"), .message.as_deref().unwrap_or("no message available"))]
pub struct GitError {
    code: i32,
    operation: Option<&'static str>,
    message: Option<String>,
}

impl GitError {
    /// Build an error for a failed call to `operation`, reading the engine's
    /// thread-local error slot before anything else can overwrite it.
    pub(crate) fn from_last(code: i32, operation: &'static str) -> Self {
        GitError {
            code,
            operation: Some(operation),
            message: resolve_message(code),
        }
    }

    /// Build an error with an explicit message. The thread-local slot is not
    /// consulted; use this when the failure happened on our side of the
    /// boundary and the engine has nothing to say about it.
    pub(crate) fn with_message(
        code: i32,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        GitError {
            code,
            operation: Some(operation),
            message: Some(message.into()),
        }
    }

    /// Build an error from a bare status code, with no operation context.
    pub fn from_raw_code(code: i32) -> Self {
        GitError {
            code,
            operation: None,
            message: resolve_message(code),
        }
    }

    /// the classified status code
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_raw(self.code)
    }

    /// the raw signed status as the engine returned it
    pub fn raw_code(&self) -> i32 {
        self.code
    }

    /// name of the native operation that failed, if recorded
    pub fn operation(&self) -> Option<&'static str> {
        self.operation
    }

    /// the message resolved at construction, if any was available
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// check if this error means the requested item does not exist
    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }

    /// check if this error means the target already exists
    pub fn is_exists(&self) -> bool {
        self.code() == ErrorCode::Exists
    }
}

/// pick the message for `code` per the resolution order
fn resolve_message(code: i32) -> Option<String> {
    if let Some(text) = ErrorCode::from_raw(code).canned_message() {
        return Some(text.to_owned());
    }
    last_error_message()
}

/// Copy the engine's thread-local error text, if there is one.
///
/// Null slot, empty text, and the "no error" sentinel the engine uses after
/// a clean call all count as no message.
fn last_error_message() -> Option<String> {
    unsafe {
        let last = raw::git_error_last();
        if last.is_null() {
            return None;
        }
        if (*last).klass == raw::GIT_ERROR_NONE as c_int {
            return None;
        }
        let text = (*last).message;
        if text.is_null() {
            return None;
        }
        let bytes = CStr::from_ptr(text).to_bytes();
        if bytes.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Classified engine status codes.
///
/// Mirrors the engine's negative status values one for one; statuses from
/// engine versions we don't know about land in [`ErrorCode::Other`] with the
/// raw value preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// generic failure
    GenericError,
    /// requested object was not found
    NotFound,
    /// object already exists
    Exists,
    /// more than one object matched
    Ambiguous,
    /// output buffer was too short
    BufSize,
    /// a user-supplied callback cancelled the operation
    User,
    /// operation is not allowed on a bare repository
    BareRepo,
    /// HEAD refers to a branch with no commits
    UnbornBranch,
    /// merge in progress prevented the operation
    Unmerged,
    /// reference was not fast-forwardable
    NotFastForward,
    /// name or spec was not in a valid format
    InvalidSpec,
    /// checkout conflicts prevented the operation
    Conflict,
    /// lock file prevented the operation
    Locked,
    /// reference value does not match expected
    Modified,
    /// authentication failed
    Auth,
    /// server certificate is invalid
    Certificate,
    /// patch or merge has already been applied
    Applied,
    /// the requested peel operation is not possible
    Peel,
    /// unexpected end of file
    Eof,
    /// invalid operation or input
    Invalid,
    /// uncommitted changes prevented the operation
    Uncommitted,
    /// operation was not valid for a directory
    Directory,
    /// a merge conflict exists, cannot continue
    MergeConflict,
    /// a callback asked for the default behavior to run instead
    Passthrough,
    /// iteration has no more items
    IterOver,
    /// hashsum mismatch in object
    HashsumMismatch,
    /// unsaved changes in the index would be overwritten
    IndexDirty,
    /// patch application failed
    ApplyFail,
    /// the object is not owned by the current user
    Owner,
    /// timeout
    Timeout,
    /// a status this build does not know by name
    Other(i32),
}

impl ErrorCode {
    /// classify a raw signed status
    pub fn from_raw(code: i32) -> ErrorCode {
        match code {
            raw::GIT_ERROR => ErrorCode::GenericError,
            raw::GIT_ENOTFOUND => ErrorCode::NotFound,
            raw::GIT_EEXISTS => ErrorCode::Exists,
            raw::GIT_EAMBIGUOUS => ErrorCode::Ambiguous,
            raw::GIT_EBUFS => ErrorCode::BufSize,
            raw::GIT_EUSER => ErrorCode::User,
            raw::GIT_EBAREREPO => ErrorCode::BareRepo,
            raw::GIT_EUNBORNBRANCH => ErrorCode::UnbornBranch,
            raw::GIT_EUNMERGED => ErrorCode::Unmerged,
            raw::GIT_ENONFASTFORWARD => ErrorCode::NotFastForward,
            raw::GIT_EINVALIDSPEC => ErrorCode::InvalidSpec,
            raw::GIT_ECONFLICT => ErrorCode::Conflict,
            raw::GIT_ELOCKED => ErrorCode::Locked,
            raw::GIT_EMODIFIED => ErrorCode::Modified,
            raw::GIT_EAUTH => ErrorCode::Auth,
            raw::GIT_ECERTIFICATE => ErrorCode::Certificate,
            raw::GIT_EAPPLIED => ErrorCode::Applied,
            raw::GIT_EPEEL => ErrorCode::Peel,
            raw::GIT_EEOF => ErrorCode::Eof,
            raw::GIT_EINVALID => ErrorCode::Invalid,
            raw::GIT_EUNCOMMITTED => ErrorCode::Uncommitted,
            raw::GIT_EDIRECTORY => ErrorCode::Directory,
            raw::GIT_EMERGECONFLICT => ErrorCode::MergeConflict,
            raw::GIT_PASSTHROUGH => ErrorCode::Passthrough,
            raw::GIT_ITEROVER => ErrorCode::IterOver,
            raw::GIT_EMISMATCH => ErrorCode::HashsumMismatch,
            raw::GIT_EINDEXDIRTY => ErrorCode::IndexDirty,
            raw::GIT_EAPPLYFAIL => ErrorCode::ApplyFail,
            raw::GIT_EOWNER => ErrorCode::Owner,
            raw::GIT_TIMEOUT => ErrorCode::Timeout,
            other => ErrorCode::Other(other),
        }
    }

    /// Fixed text for the codes the engine reports without ever filling its
    /// thread-local slot. Everything else resolves from the slot instead, so
    /// failures keep their specific engine-provided detail.
    pub fn canned_message(self) -> Option<&'static str> {
        match self {
            ErrorCode::User => Some("operation cancelled by a user-supplied callback"),
            ErrorCode::Passthrough => Some("callback deferred to the default behavior"),
            ErrorCode::IterOver => Some("iteration has no more items"),
            _ => None,
        }
    }
}

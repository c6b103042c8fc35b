//! gitgrip - safe repository and branch handles over libgit2
//!
//! This crate wraps the raw C engine in a small, owned API: create or open
//! a repository, look branches up by name, and let every native resource
//! release itself exactly once. Status decoding and handle ownership are
//! concentrated in two internal modules; everything public is safe.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │           Repository        Branch            │
//! │     (safe API: create, open, find_branch)     │
//! └───────────────────────────────────────────────┘
//!                        │
//!            ┌───────────┴───────────┐
//!            ▼                       ▼
//!     ┌─────────────┐         ┌─────────────┐
//!     │    call     │         │   handle    │
//!     │  (statuses) │         │ (ownership) │
//!     └─────────────┘         └─────────────┘
//!            │                       │
//!            └───────────┬───────────┘
//!                        ▼
//!                 ┌─────────────┐
//!                 │   libgit2   │
//!                 └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gitgrip::{Repository, DEFAULT_BRANCH};
//!
//! let repo = Repository::open_or_create("./deploys").unwrap();
//! if let Some(branch) = repo.find_branch(DEFAULT_BRANCH).unwrap() {
//!     println!("on branch {}", branch.name());
//! }
//! ```

use std::sync::Once;

use libgit2_sys as raw;

mod branch;
mod call;
mod error;
mod handle;
mod repository;
mod types;

// Re-export public API
pub use branch::Branch;
pub use error::{ErrorCode, GitError, GitResult};
pub use repository::{InitOptions, Repository, DEFAULT_BRANCH};
pub use types::{Extensible, InitMode, KnownValues, Oid, ShareMode};

/// Bring the engine's global state up exactly once per process.
///
/// Every entry point that can be reached without an existing handle calls
/// this first. The engine is never shut back down; handles may still be
/// dropped during process teardown.
pub(crate) fn ensure_initialized() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let status = unsafe { raw::git_libgit2_init() };
        // A failed bootstrap leaves no engine to report errors through.
        assert!(status >= 0, "libgit2 failed to initialize (status {status})");
    });
}

//! Core repository wrapper.
//!
//! This is the central component of the crate. It owns the engine-side
//! repository handle and provides the lifecycle operations everything else
//! builds on: create, open, and branch lookup.
//!
//! All other modules reach the engine through the handle owned here.

use std::ffi::CStr;
use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};
use std::ptr;
use std::str;

use libc::{c_int, c_uint};
use libgit2_sys as raw;
use tracing::{debug, warn};

use crate::branch::{self, Branch};
use crate::call;
use crate::error::GitResult;
use crate::handle::Handle;
use crate::types::{InitMode, Oid};

/// name of the branch new repositories start on
pub const DEFAULT_BRANCH: &str = "production";

/// identity and message recorded on the seed commit
const SEED_NAME: &CStr = c"gitgrip";
const SEED_EMAIL: &CStr = c"gitgrip@localhost";
const SEED_MESSAGE: &CStr = c"[gitgrip] initialize repository";

/// The main repository wrapper.
///
/// Owns the engine-side repository handle and releases it on drop. Branch
/// lookups hand out [`Branch`] values that stand on their own, so a
/// `Repository` may be dropped before the branches it produced.
pub struct Repository {
    handle: Handle<raw::git_repository>,
    workdir: Option<PathBuf>,
}

// The handle is confined to whichever thread currently owns the wrapper;
// the engine forbids unsynchronized sharing, not moves.
unsafe impl Send for Repository {}

impl Repository {
    /// Create a new repository at `path` on the default branch.
    ///
    /// Missing directories along the path are created, and a repository
    /// without commits comes out seeded so the default branch exists and
    /// resolves immediately.
    pub fn create(path: impl AsRef<Path>) -> GitResult<Self> {
        Self::create_with(path, DEFAULT_BRANCH, &InitOptions::new())
    }

    /// Create a new repository with an explicit starting branch and options.
    pub fn create_with(
        path: impl AsRef<Path>,
        default_branch: &str,
        options: &InitOptions,
    ) -> GitResult<Self> {
        crate::ensure_initialized();

        let path = path.as_ref();
        let path_c = call::path_to_cstring(path, "git_repository_init")?;
        let handle = options.with_raw(default_branch, |opts| {
            call::out_handle("git_repository_init", |out| unsafe {
                raw::git_repository_init_ext(out, path_c.as_ptr(), opts)
            })
        })?;

        // A repository whose HEAD is still unborn gets the seed commit that
        // makes the default branch resolvable; reinitializing over existing
        // history leaves it untouched.
        if head_is_unborn(&handle)? {
            let seed = seed_initial_commit(&handle, default_branch)?;
            debug!(branch = default_branch, seed = %seed.short(), "seeded repository");
        }

        let workdir = detect_workdir(&handle);
        debug!(path = %path.display(), "created repository");

        Ok(Repository { handle, workdir })
    }

    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> GitResult<Self> {
        crate::ensure_initialized();

        let path = path.as_ref();
        let path_c = call::path_to_cstring(path, "git_repository_open")?;
        let handle = call::out_handle("git_repository_open", |out| unsafe {
            raw::git_repository_open(out, path_c.as_ptr())
        })?;

        let workdir = detect_workdir(&handle);
        debug!(path = %path.display(), "opened repository");

        Ok(Repository { handle, workdir })
    }

    /// Open the repository at `path`, creating it first if nothing is there.
    pub fn open_or_create(path: impl AsRef<Path>) -> GitResult<Self> {
        let path = path.as_ref();
        if Self::exists(path)? {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Check whether `path` holds a repository, without opening it.
    pub fn exists(path: impl AsRef<Path>) -> GitResult<bool> {
        crate::ensure_initialized();

        let path_c = call::path_to_cstring(path.as_ref(), "git_repository_open_ext")?;
        // Passing no out-pointer asks the engine for a pure existence check.
        let status = call::unit("git_repository_open_ext", || unsafe {
            raw::git_repository_open_ext(
                ptr::null_mut(),
                path_c.as_ptr(),
                raw::GIT_REPOSITORY_OPEN_NO_SEARCH as c_uint,
                ptr::null(),
            )
        });
        match status {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// The working directory, if the repository has one.
    ///
    /// Absent exactly when the repository is bare. A working directory the
    /// engine reports with non-Unicode bytes is logged and treated as
    /// absent rather than failing the open.
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// check if the repository has no working directory
    pub fn is_bare(&self) -> bool {
        self.workdir.is_none()
    }

    /// Look up a local branch by its short name.
    ///
    /// Returns `Ok(None)` when no branch has that name; every other engine
    /// failure surfaces as an error.
    pub fn find_branch(&self, name: &str) -> GitResult<Option<Branch>> {
        branch::lookup(self, name)
    }

    /// raw repository handle (for internal use only)
    pub(crate) fn raw(&self) -> *mut raw::git_repository {
        self.handle.as_ptr()
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("workdir", &self.workdir)
            .field("bare", &self.is_bare())
            .finish()
    }
}

// ==================== Creation Options ====================

/// Options applied when creating a repository.
///
/// Mirrors the engine's init options: boolean switches are OR'd into the
/// native flag bits at call time, optional fields are wired into the native
/// struct only when actually set, and everything left unset keeps the
/// engine's own default.
#[derive(Debug, Clone)]
pub struct InitOptions {
    bare: bool,
    no_reinit: bool,
    mkdir: bool,
    mkpath: bool,
    relative_gitlink: bool,
    mode: Option<InitMode>,
    workdir_path: Option<PathBuf>,
    description: Option<String>,
    template_path: Option<PathBuf>,
    origin_url: Option<String>,
}

impl Default for InitOptions {
    fn default() -> Self {
        InitOptions {
            bare: false,
            no_reinit: false,
            mkdir: false,
            mkpath: true,
            relative_gitlink: false,
            mode: None,
            workdir_path: None,
            description: None,
            template_path: None,
            origin_url: None,
        }
    }
}

impl InitOptions {
    /// Options with create-missing-directories enabled and everything else
    /// at the engine default.
    pub fn new() -> Self {
        Self::default()
    }

    /// create a bare repository, with no working directory
    pub fn bare(mut self, enabled: bool) -> Self {
        self.bare = enabled;
        self
    }

    /// fail instead of reinitializing when a repository already exists
    pub fn no_reinit(mut self, enabled: bool) -> Self {
        self.no_reinit = enabled;
        self
    }

    /// create the leaf directory if it is missing
    pub fn mkdir(mut self, enabled: bool) -> Self {
        self.mkdir = enabled;
        self
    }

    /// create every missing directory along the path (on by default)
    pub fn mkpath(mut self, enabled: bool) -> Self {
        self.mkpath = enabled;
        self
    }

    /// record a relative path in the gitlink from workdir to git directory
    pub fn relative_gitlink(mut self, enabled: bool) -> Self {
        self.relative_gitlink = enabled;
        self
    }

    /// permission mode for the created directories
    pub fn mode(mut self, mode: InitMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// working directory to attach, when it is not the parent of `.git`
    pub fn workdir_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir_path = Some(path.into());
        self
    }

    /// repository description text
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Template directory to copy instead of the engine's default. Setting
    /// one also raises the external-template flag.
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// remote URL to record as `origin`
    pub fn origin_url(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }

    /// the native flag bits for the current settings
    fn flag_bits(&self) -> u32 {
        let mut flags = 0;
        if self.bare {
            flags |= raw::GIT_REPOSITORY_INIT_BARE as u32;
        }
        if self.no_reinit {
            flags |= raw::GIT_REPOSITORY_INIT_NO_REINIT as u32;
        }
        if self.mkdir {
            flags |= raw::GIT_REPOSITORY_INIT_MKDIR as u32;
        }
        if self.mkpath {
            flags |= raw::GIT_REPOSITORY_INIT_MKPATH as u32;
        }
        if self.relative_gitlink {
            flags |= raw::GIT_REPOSITORY_INIT_RELATIVE_GITLINK as u32;
        }
        if self.template_path.is_some() {
            flags |= raw::GIT_REPOSITORY_INIT_EXTERNAL_TEMPLATE as u32;
        }
        flags
    }

    /// Build the native option struct and hand it to `body`.
    ///
    /// The C strings backing the native struct live on this frame, so the
    /// struct must not escape the closure.
    fn with_raw<T>(
        &self,
        initial_head: &str,
        body: impl FnOnce(&mut raw::git_repository_init_options) -> GitResult<T>,
    ) -> GitResult<T> {
        let initial_head = call::text_to_cstring(initial_head, "git_repository_init")?;
        let workdir_path = self
            .workdir_path
            .as_deref()
            .map(|p| call::path_to_cstring(p, "git_repository_init"))
            .transpose()?;
        let description = self
            .description
            .as_deref()
            .map(|t| call::text_to_cstring(t, "git_repository_init"))
            .transpose()?;
        let template_path = self
            .template_path
            .as_deref()
            .map(|p| call::path_to_cstring(p, "git_repository_init"))
            .transpose()?;
        let origin_url = self
            .origin_url
            .as_deref()
            .map(|t| call::text_to_cstring(t, "git_repository_init"))
            .transpose()?;

        let mut opts: raw::git_repository_init_options = unsafe { mem::zeroed() };
        opts.version = raw::GIT_REPOSITORY_INIT_OPTIONS_VERSION;
        opts.flags = self.flag_bits();
        if let Some(mode) = self.mode {
            opts.mode = mode.to_raw();
        }
        opts.initial_head = initial_head.as_ptr();
        if let Some(s) = &workdir_path {
            opts.workdir_path = s.as_ptr();
        }
        if let Some(s) = &description {
            opts.description = s.as_ptr();
        }
        if let Some(s) = &template_path {
            opts.template_path = s.as_ptr();
        }
        if let Some(s) = &origin_url {
            opts.origin_url = s.as_ptr();
        }

        body(&mut opts)
    }
}

// ==================== Engine Helpers ====================

// Bound directly; the sys crate does not declare this predicate.
extern "C" {
    fn git_repository_head_unborn(repo: *mut raw::git_repository) -> c_int;
}

/// check whether HEAD names a branch with no commit yet
fn head_is_unborn(handle: &Handle<raw::git_repository>) -> GitResult<bool> {
    call::boolean("git_repository_head_unborn", || unsafe {
        git_repository_head_unborn(handle.as_ptr())
    })
}

/// Read the engine's idea of the working directory.
fn detect_workdir(handle: &Handle<raw::git_repository>) -> Option<PathBuf> {
    let dir = unsafe { raw::git_repository_workdir(handle.as_ptr()) };
    if dir.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(dir) }.to_bytes();
    match str::from_utf8(bytes) {
        Ok(text) => Some(PathBuf::from(text)),
        Err(_) => {
            warn!("working directory path is not valid utf-8, treating repository as bare");
            None
        }
    }
}

/// Write the seed commit for a repository without one.
///
/// An empty tree committed to the branch ref by name gives `branch` its
/// first commit without any checkout or index involvement, and HEAD is
/// pointed at the branch afterwards. Committing by name rather than
/// through HEAD keeps the outcome independent of whatever unborn branch
/// an earlier initialization may have left HEAD on.
fn seed_initial_commit(handle: &Handle<raw::git_repository>, branch: &str) -> GitResult<Oid> {
    let refname = call::text_to_cstring(&format!("refs/heads/{branch}"), "git_commit_create")?;

    let builder = call::out_handle("git_treebuilder_new", |out| unsafe {
        raw::git_treebuilder_new(out, handle.as_ptr(), ptr::null())
    })?;
    let tree_id = call::out_oid("git_treebuilder_write", |out| unsafe {
        raw::git_treebuilder_write(out, builder.as_ptr())
    })?;
    let tree = call::out_handle("git_tree_lookup", |out| unsafe {
        raw::git_tree_lookup(out, handle.as_ptr(), tree_id.as_raw())
    })?;
    let signature = call::out_handle("git_signature_now", |out| unsafe {
        raw::git_signature_now(out, SEED_NAME.as_ptr(), SEED_EMAIL.as_ptr())
    })?;

    let seed = call::out_oid("git_commit_create", |out| unsafe {
        raw::git_commit_create(
            out,
            handle.as_ptr(),
            refname.as_ptr(),
            signature.as_ptr(),
            signature.as_ptr(),
            ptr::null(),
            SEED_MESSAGE.as_ptr(),
            tree.as_ptr(),
            0,
            ptr::null_mut(),
        )
    })?;

    call::unit("git_repository_set_head", || unsafe {
        raw::git_repository_set_head(handle.as_ptr(), refname.as_ptr())
    })?;

    Ok(seed)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorCode;
    use crate::types::ShareMode;

    fn setup() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create(dir.path().join("repo")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_create_and_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo");

        let created = Repository::create(&path).unwrap();
        assert!(!created.is_bare());
        assert!(created.workdir().is_some());
        drop(created);

        let opened = Repository::open(&path).unwrap();
        assert!(opened.find_branch(DEFAULT_BRANCH).unwrap().is_some());
    }

    #[test]
    fn test_create_seeds_default_branch() {
        let (_dir, repo) = setup();

        let branch = repo.find_branch(DEFAULT_BRANCH).unwrap().unwrap();
        assert_eq!(branch.name(), DEFAULT_BRANCH);
    }

    #[test]
    fn test_create_with_custom_branch() {
        let dir = TempDir::new().unwrap();
        let repo =
            Repository::create_with(dir.path().join("repo"), "trunk", &InitOptions::new()).unwrap();

        // the seed commit must land on the requested branch even though the
        // engine's own configured default is a different name
        let branch = repo.find_branch("trunk").unwrap().unwrap();
        assert_eq!(branch.name(), "trunk");
        assert!(branch.target().is_some());
        assert!(repo.find_branch(DEFAULT_BRANCH).unwrap().is_none());
    }

    #[test]
    fn test_create_nested_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("repo");

        let repo = Repository::create(&path).unwrap();
        assert!(repo.workdir().is_some());
    }

    #[test]
    fn test_create_bare() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::create_with(
            dir.path().join("bare.git"),
            DEFAULT_BRANCH,
            &InitOptions::new().bare(true),
        )
        .unwrap();

        assert!(repo.is_bare());
        assert!(repo.workdir().is_none());
        assert!(repo.find_branch(DEFAULT_BRANCH).unwrap().is_some());
    }

    #[test]
    fn test_workdir_override() {
        let dir = TempDir::new().unwrap();
        let gitdir = dir.path().join("store");
        let worktree = dir.path().join("checkout");
        fs::create_dir_all(&worktree).unwrap();

        let repo = Repository::create_with(
            &gitdir,
            DEFAULT_BRANCH,
            &InitOptions::new().workdir_path(&worktree),
        )
        .unwrap();

        assert!(!repo.is_bare());
        // the engine may report the directory through symlinks
        let reported = fs::canonicalize(repo.workdir().unwrap()).unwrap();
        assert_eq!(reported, fs::canonicalize(&worktree).unwrap());
    }

    #[test]
    fn test_no_reinit_refuses_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo");
        Repository::create(&path).unwrap();

        let err =
            Repository::create_with(&path, DEFAULT_BRANCH, &InitOptions::new().no_reinit(true))
                .unwrap_err();
        assert!(err.is_exists());
        assert_eq!(err.operation(), Some("git_repository_init"));
    }

    #[test]
    fn test_reinit_keeps_existing_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo");
        Repository::create_with(&path, "trunk", &InitOptions::new()).unwrap();

        // a second create without no_reinit reopens rather than reseeding
        let again = Repository::create(&path).unwrap();
        assert!(again.find_branch("trunk").unwrap().is_some());
        assert!(again.find_branch(DEFAULT_BRANCH).unwrap().is_none());
    }

    #[test]
    fn test_create_seeds_existing_empty_repository() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo");

        // An engine-level init leaves HEAD on an unborn branch and writes
        // no commit; create over it must still produce the requested branch.
        crate::ensure_initialized();
        let path_c = call::path_to_cstring(&path, "git_repository_init").unwrap();
        let plain = InitOptions::new()
            .with_raw("master", |opts| {
                call::out_handle("git_repository_init", |out| unsafe {
                    raw::git_repository_init_ext(out, path_c.as_ptr(), opts)
                })
            })
            .unwrap();
        drop(plain);

        let repo = Repository::create(&path).unwrap();
        let branch = repo.find_branch(DEFAULT_BRANCH).unwrap().unwrap();
        assert!(branch.target().is_some());
        assert!(repo.find_branch("master").unwrap().is_none());
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let dir = TempDir::new().unwrap();

        let err = Repository::open(dir.path().join("nope")).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.operation(), Some("git_repository_open"));
        assert!(err.message().is_some());
    }

    #[test]
    fn test_failed_create_reports_operation_and_detail() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"not a directory").unwrap();

        let err = Repository::create(file.join("repo")).unwrap_err();
        assert_eq!(err.operation(), Some("git_repository_init"));
        assert!(err.message().is_some());

        let rendered = err.to_string();
        assert!(rendered.contains("git_repository_init"));
        assert!(!rendered.contains("no message available"));
    }

    #[test]
    fn test_error_messages_survive_later_calls() {
        let dir = TempDir::new().unwrap();

        let first = Repository::open(dir.path().join("missing-one")).unwrap_err();
        let second = Repository::open(dir.path().join("missing-two")).unwrap_err();

        assert!(first.message().unwrap().contains("missing-one"));
        assert!(second.message().unwrap().contains("missing-two"));
    }

    #[test]
    fn test_exists_reports_presence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo");

        assert!(!Repository::exists(&path).unwrap());
        Repository::create(&path).unwrap();
        assert!(Repository::exists(&path).unwrap());
    }

    #[test]
    fn test_open_or_create() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo");

        let first = Repository::open_or_create(&path).unwrap();
        assert!(first.find_branch(DEFAULT_BRANCH).unwrap().is_some());
        drop(first);

        let second = Repository::open_or_create(&path).unwrap();
        assert!(second.find_branch(DEFAULT_BRANCH).unwrap().is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_unicode_workdir_is_treated_as_bare() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"wd-\xff"));

        let repo = Repository::create(&path).unwrap();
        assert!(repo.is_bare());
        assert!(repo.workdir().is_none());
        assert!(repo.find_branch(DEFAULT_BRANCH).unwrap().is_some());
    }

    #[test]
    fn test_interior_nul_in_path_is_rejected() {
        let err = Repository::open(Path::new("bad\0path")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
        assert!(err.message().unwrap().contains("NUL"));
    }

    #[test]
    fn test_default_options_translation() {
        let opts = InitOptions::new();
        assert_eq!(opts.flag_bits(), raw::GIT_REPOSITORY_INIT_MKPATH as u32);

        opts.with_raw("main", |raw_opts| {
            assert_eq!(raw_opts.version, raw::GIT_REPOSITORY_INIT_OPTIONS_VERSION);
            assert_eq!(raw_opts.mode, 0);
            assert!(raw_opts.workdir_path.is_null());
            assert!(raw_opts.description.is_null());
            assert!(raw_opts.template_path.is_null());
            assert!(raw_opts.origin_url.is_null());
            assert!(!raw_opts.initial_head.is_null());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_full_options_translation() {
        let opts = InitOptions::new()
            .bare(true)
            .no_reinit(true)
            .mkdir(true)
            .relative_gitlink(true)
            .mode(InitMode::Known(ShareMode::Group))
            .workdir_path("/tmp/worktree")
            .description("configs")
            .template_path("/tmp/template")
            .origin_url("https://example.com/repo.git");

        let expected = raw::GIT_REPOSITORY_INIT_BARE as u32
            | raw::GIT_REPOSITORY_INIT_NO_REINIT as u32
            | raw::GIT_REPOSITORY_INIT_MKDIR as u32
            | raw::GIT_REPOSITORY_INIT_MKPATH as u32
            | raw::GIT_REPOSITORY_INIT_RELATIVE_GITLINK as u32
            | raw::GIT_REPOSITORY_INIT_EXTERNAL_TEMPLATE as u32;
        assert_eq!(opts.flag_bits(), expected);

        opts.with_raw("main", |raw_opts| {
            assert_eq!(raw_opts.mode, 0o2775);
            assert!(!raw_opts.workdir_path.is_null());
            assert!(!raw_opts.description.is_null());
            assert!(!raw_opts.template_path.is_null());
            assert!(!raw_opts.origin_url.is_null());
            Ok(())
        })
        .unwrap();
    }
}

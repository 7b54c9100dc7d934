//! Per-session temporary directory lifecycle and in-memory session state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use chunkbay_protocol::UploadState;

use crate::UploadError;
use crate::layout::UploadLayout;
use crate::validation::validate_session_token;

/// Owns the temp directory of each upload session.
///
/// Nothing else creates or deletes entries under `temp/<sessionId>/`.
pub struct SessionDirectory {
    layout: UploadLayout,
}

impl SessionDirectory {
    /// Creates a directory manager over `layout`.
    pub fn new(layout: UploadLayout) -> Self {
        Self { layout }
    }

    /// Returns the session's temp directory, creating it (and parents) if
    /// missing. Idempotent; an existing directory is not an error.
    pub fn ensure(&self, session_id: &str) -> Result<PathBuf, UploadError> {
        validate_session_token(session_id)?;
        let dir = self.layout.session_dir(session_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Deletes every file directly inside the session directory, then the
    /// directory itself. Best-effort: the merge has already succeeded by the
    /// time this runs, so individual failures are logged and skipped.
    pub fn destroy(&self, session_id: &str) {
        if validate_session_token(session_id).is_err() {
            tracing::warn!(session = session_id, "refusing cleanup of invalid session token");
            return;
        }
        let dir = self.layout.session_dir(session_id);
        if !dir.exists() {
            return;
        }

        match std::fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if let Err(e) = std::fs::remove_file(entry.path()) {
                        tracing::warn!(
                            file = %entry.path().display(),
                            error = %e,
                            "failed to delete chunk file"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to list session directory");
            }
        }

        if let Err(e) = std::fs::remove_dir(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove session directory");
        } else {
            tracing::info!(session = session_id, "removed session directory");
        }
    }
}

/// Thread-safe state of one upload session.
///
/// The state value here is the primary record; the filesystem only seeds it
/// when a handle is first created. The merge gate serializes the last-chunk
/// detection-and-merge sequence for the session.
pub struct SessionHandle {
    inner: RwLock<HandleInner>,
    merge_gate: Mutex<()>,
}

struct HandleInner {
    state: UploadState,
    final_path: Option<String>,
}

impl SessionHandle {
    fn new(state: UploadState) -> Self {
        Self {
            inner: RwLock::new(HandleInner {
                state,
                final_path: None,
            }),
            merge_gate: Mutex::new(()),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> UploadState {
        self.inner.read().unwrap().state
    }

    /// Returns the recorded final artifact path, if the session completed.
    pub fn final_path(&self) -> Option<String> {
        self.inner.read().unwrap().final_path.clone()
    }

    /// Marks the session as receiving chunks. No-op once complete.
    pub fn receiving(&self) {
        let mut s = self.inner.write().unwrap();
        if !s.state.is_terminal() {
            s.state = UploadState::Receiving;
        }
    }

    /// Marks the session as merging.
    pub fn merging(&self) {
        self.inner.write().unwrap().state = UploadState::Merging;
    }

    /// Marks the session as complete and records the final path.
    pub fn complete(&self, path: String) {
        let mut s = self.inner.write().unwrap();
        s.state = UploadState::Complete;
        s.final_path = Some(path);
    }

    /// Marks the session as failed; its temp directory stays intact.
    pub fn fail(&self) {
        self.inner.write().unwrap().state = UploadState::Failed;
    }

    /// Exclusion scope around the last-chunk decision and merge.
    pub fn merge_gate(&self) -> &Mutex<()> {
        &self.merge_gate
    }
}

/// Hands out one [`SessionHandle`] per session token.
///
/// Completed tokens stay registered so a duplicate finalize request can be
/// answered with the recorded path; [`forget`](Self::forget) releases a
/// token for reuse.
pub struct SessionRegistry {
    layout: UploadLayout,
    handles: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// Creates an empty registry over `layout`.
    pub fn new(layout: UploadLayout) -> Self {
        Self {
            layout,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handle for `session_id`, creating it on first sight.
    ///
    /// A fresh handle recovers its state from disk: a session whose temp
    /// directory already exists (for example after a restart) starts as
    /// `Receiving` rather than `New`.
    pub fn handle(&self, session_id: &str) -> Arc<SessionHandle> {
        let mut handles = self.handles.lock().unwrap();
        if let Some(handle) = handles.get(session_id) {
            return Arc::clone(handle);
        }

        let state = if self.layout.session_dir(session_id).is_dir() {
            UploadState::Receiving
        } else {
            UploadState::New
        };
        let handle = Arc::new(SessionHandle::new(state));
        handles.insert(session_id.to_string(), Arc::clone(&handle));
        handle
    }

    /// Drops the in-memory record of a session, releasing its token.
    pub fn forget(&self, session_id: &str) {
        self.handles.lock().unwrap().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> (TempDir, UploadLayout) {
        let tmp = TempDir::new().unwrap();
        let layout = UploadLayout::new(tmp.path());
        (tmp, layout)
    }

    #[test]
    fn ensure_creates_directory() {
        let (_tmp, layout) = layout();
        let dirs = SessionDirectory::new(layout.clone());
        let dir = dirs.ensure("abc").unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, layout.session_dir("abc"));
    }

    #[test]
    fn ensure_is_idempotent() {
        let (_tmp, layout) = layout();
        let dirs = SessionDirectory::new(layout);
        let first = dirs.ensure("abc").unwrap();
        let second = dirs.ensure("abc").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ensure_rejects_traversal_token() {
        let (_tmp, layout) = layout();
        let dirs = SessionDirectory::new(layout);
        assert!(matches!(
            dirs.ensure("../escape"),
            Err(UploadError::InvalidSessionToken(_))
        ));
    }

    #[test]
    fn destroy_removes_files_and_directory() {
        let (_tmp, layout) = layout();
        let dirs = SessionDirectory::new(layout.clone());
        let dir = dirs.ensure("abc").unwrap();
        std::fs::write(dir.join("0.png"), b"A").unwrap();
        std::fs::write(dir.join("1.png"), b"B").unwrap();

        dirs.destroy("abc");
        assert!(!dir.exists());
    }

    #[test]
    fn destroy_missing_session_is_a_no_op() {
        let (_tmp, layout) = layout();
        let dirs = SessionDirectory::new(layout);
        dirs.destroy("never-seen");
    }

    #[test]
    fn destroy_leaves_other_sessions_alone() {
        let (_tmp, layout) = layout();
        let dirs = SessionDirectory::new(layout);
        let a = dirs.ensure("a").unwrap();
        let b = dirs.ensure("b").unwrap();
        std::fs::write(b.join("0.bin"), b"keep").unwrap();

        dirs.destroy("a");
        assert!(!a.exists());
        assert!(b.join("0.bin").exists());
    }

    #[test]
    fn fresh_handle_starts_new() {
        let (_tmp, layout) = layout();
        let registry = SessionRegistry::new(layout);
        assert_eq!(registry.handle("abc").state(), UploadState::New);
    }

    #[test]
    fn fresh_handle_recovers_receiving_from_disk() {
        let (_tmp, layout) = layout();
        std::fs::create_dir_all(layout.session_dir("abc")).unwrap();
        let registry = SessionRegistry::new(layout);
        assert_eq!(registry.handle("abc").state(), UploadState::Receiving);
    }

    #[test]
    fn handle_is_shared_per_token() {
        let (_tmp, layout) = layout();
        let registry = SessionRegistry::new(layout);
        let a = registry.handle("abc");
        let b = registry.handle("abc");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn state_transitions() {
        let handle = SessionHandle::new(UploadState::New);
        handle.receiving();
        assert_eq!(handle.state(), UploadState::Receiving);
        handle.merging();
        assert_eq!(handle.state(), UploadState::Merging);
        handle.complete("upload/chunked/1-0.png".into());
        assert_eq!(handle.state(), UploadState::Complete);
        assert_eq!(handle.final_path().unwrap(), "upload/chunked/1-0.png");
    }

    #[test]
    fn failed_session_can_resume_receiving() {
        let handle = SessionHandle::new(UploadState::Receiving);
        handle.fail();
        assert_eq!(handle.state(), UploadState::Failed);
        handle.receiving();
        assert_eq!(handle.state(), UploadState::Receiving);
    }

    #[test]
    fn receiving_does_not_reopen_completed_session() {
        let handle = SessionHandle::new(UploadState::Receiving);
        handle.complete("upload/chunked/1-0.png".into());
        handle.receiving();
        assert_eq!(handle.state(), UploadState::Complete);
    }

    #[test]
    fn forget_releases_token() {
        let (_tmp, layout) = layout();
        let registry = SessionRegistry::new(layout);
        registry.handle("abc").complete("upload/chunked/1-0.png".into());
        registry.forget("abc");
        assert_eq!(registry.handle("abc").state(), UploadState::New);
    }

    #[test]
    fn concurrent_handle_lookups() {
        use std::thread;

        let (_tmp, layout) = layout();
        let registry = Arc::new(SessionRegistry::new(layout));
        let mut handles = vec![];
        for _ in 0..8 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    let h = r.handle(&format!("s{}", i % 5));
                    h.receiving();
                    let _ = h.state();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}

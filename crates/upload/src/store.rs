//! Chunk persistence keyed by `(sessionId, chunkIndex)`.

use crate::UploadError;
use crate::layout::UploadLayout;
use crate::session::SessionDirectory;
use crate::validation::validate_session_token;

/// Maps chunk keys to files under the session temp directory.
///
/// At most one file exists per key; a repeated write for the same key
/// silently overwrites, which is what makes client retries idempotent.
pub struct ChunkStore {
    layout: UploadLayout,
    dirs: SessionDirectory,
}

impl ChunkStore {
    /// Creates a store over `layout`.
    pub fn new(layout: UploadLayout) -> Self {
        let dirs = SessionDirectory::new(layout.clone());
        Self { layout, dirs }
    }

    /// Returns `true` iff the chunk file for this key is present.
    ///
    /// The retry probe: a client that already delivered this chunk gets a
    /// skip signal instead of re-uploading. An invalid session token reports
    /// `false`, since no chunk can exist for it.
    pub fn exists(&self, session_id: &str, chunk_index: u32, extension: &str) -> bool {
        if validate_session_token(session_id).is_err() {
            return false;
        }
        self.layout
            .chunk_path(session_id, chunk_index, extension)
            .is_file()
    }

    /// Writes the chunk bytes at the canonical path, creating the session
    /// temp directory first if absent. Overwrites any prior content.
    pub fn write(
        &self,
        session_id: &str,
        chunk_index: u32,
        extension: &str,
        data: &[u8],
    ) -> Result<(), UploadError> {
        self.dirs.ensure(session_id)?;
        let path = self.layout.chunk_path(session_id, chunk_index, extension);
        std::fs::write(path, data)?;
        Ok(())
    }
}

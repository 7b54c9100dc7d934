//! Reassembly of stored chunks into the final artifact.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::{COPY_BUF_SIZE, UploadError};
use crate::layout::{UploadLayout, unique_name};
use crate::session::SessionDirectory;
use crate::validation::validate_session_token;

/// Concatenates all chunks of a session, in ascending index order, into one
/// new file in the completed-chunked area.
pub struct Reassembler {
    layout: UploadLayout,
    dirs: SessionDirectory,
}

impl Reassembler {
    /// Creates a reassembler over `layout`.
    pub fn new(layout: UploadLayout) -> Self {
        let dirs = SessionDirectory::new(layout.clone());
        Self { layout, dirs }
    }

    /// Merges chunks `0..total_chunks-1` and returns the new file name.
    ///
    /// Any missing index fails the whole merge; a truncated or reordered
    /// artifact is never produced. On failure the session temp directory is
    /// left intact so the client can re-send what is missing and retry. On
    /// success the temp directory is destroyed (best-effort).
    pub fn merge(
        &self,
        session_id: &str,
        total_chunks: u32,
        extension: &str,
    ) -> Result<String, UploadError> {
        validate_session_token(session_id)?;

        // Refuse up front rather than discover a hole mid-stream.
        for index in 0..total_chunks {
            if !self.layout.chunk_path(session_id, index, extension).is_file() {
                return Err(UploadError::MissingChunk {
                    session_id: session_id.to_string(),
                    index,
                });
            }
        }

        let dest_dir = self.layout.merged_dir();
        std::fs::create_dir_all(&dest_dir).map_err(|source| UploadError::Merge { source })?;
        let name = unique_name(extension);
        let dest_path = dest_dir.join(&name);

        if let Err(e) = self.concat(session_id, total_chunks, extension, &dest_path) {
            // Keep the chunks, drop the partial artifact.
            if let Err(rm) = std::fs::remove_file(&dest_path) {
                if rm.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        file = %dest_path.display(),
                        error = %rm,
                        "failed to remove partial artifact"
                    );
                }
            }
            return Err(e);
        }

        tracing::info!(
            session = session_id,
            chunks = total_chunks,
            file = %name,
            "merged chunked upload"
        );
        self.dirs.destroy(session_id);
        Ok(name)
    }

    /// Streams each chunk into `dest` through a bounded buffer; the artifact
    /// is never held in memory whole.
    fn concat(
        &self,
        session_id: &str,
        total_chunks: u32,
        extension: &str,
        dest: &Path,
    ) -> Result<(), UploadError> {
        let mut out = File::create(dest).map_err(|source| UploadError::Merge { source })?;
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        for index in 0..total_chunks {
            let path = self.layout.chunk_path(session_id, index, extension);
            let mut chunk = File::open(&path).map_err(|e| {
                // A chunk deleted between the scan and here is still a
                // missing chunk, not a generic stream failure.
                if e.kind() == ErrorKind::NotFound {
                    UploadError::MissingChunk {
                        session_id: session_id.to_string(),
                        index,
                    }
                } else {
                    UploadError::Merge { source: e }
                }
            })?;

            loop {
                let n = chunk.read(&mut buf).map_err(|source| UploadError::Merge { source })?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n])
                    .map_err(|source| UploadError::Merge { source })?;
            }
        }

        out.flush().map_err(|source| UploadError::Merge { source })?;
        Ok(())
    }
}

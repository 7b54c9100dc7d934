//! Upload façade: chunk probing, chunk storing, whole-file storing.

use chunkbay_protocol::{ChunkPresence, StoreReceipt};

use crate::UploadError;
use crate::layout::{UploadLayout, unique_name};
use crate::merge::Reassembler;
use crate::session::SessionRegistry;
use crate::store::ChunkStore;
use crate::validation::{chunk_mode, extension_of, validate_session_token};

/// Entry point the controller layer calls.
///
/// Decides per request whether a chunk already exists, whether to store one,
/// and whether the last chunk just arrived and reassembly must run.
pub struct UploadCoordinator {
    layout: UploadLayout,
    store: ChunkStore,
    sessions: SessionRegistry,
    merger: Reassembler,
}

impl UploadCoordinator {
    /// Creates a coordinator over `layout`.
    pub fn new(layout: UploadLayout) -> Self {
        Self {
            store: ChunkStore::new(layout.clone()),
            sessions: SessionRegistry::new(layout.clone()),
            merger: Reassembler::new(layout.clone()),
            layout,
        }
    }

    /// Returns the layout this coordinator writes under.
    pub fn layout(&self) -> &UploadLayout {
        &self.layout
    }

    /// Returns the session registry (state inspection, token release).
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Existence probe for one chunk. No side effects.
    ///
    /// With neither `chunk_index` nor `total_chunks` the request is not a
    /// chunked upload and the answer is [`ChunkPresence::NotChunked`];
    /// supplying only one of the two is a malformed request.
    pub fn check_chunk(
        &self,
        session_id: &str,
        file_name: &str,
        chunk_index: Option<u32>,
        total_chunks: Option<u32>,
    ) -> Result<ChunkPresence, UploadError> {
        let ext = extension_of(file_name)?;
        match chunk_mode(chunk_index, total_chunks)? {
            None => Ok(ChunkPresence::NotChunked),
            Some((index, _total)) => {
                validate_session_token(session_id)?;
                if self.store.exists(session_id, index, ext) {
                    Ok(ChunkPresence::Present)
                } else {
                    Ok(ChunkPresence::Missing)
                }
            }
        }
    }

    /// Stores one chunk; merges and returns the final relative path when the
    /// last chunk (zero-based `total_chunks - 1`) arrives.
    ///
    /// The last-chunk decision and the merge run under a per-session gate,
    /// so two requests that both carry the last chunk cannot trigger two
    /// merges or a merge against a directory being deleted. A finalize retry
    /// after completion returns the already-recorded path untouched.
    pub fn store_chunk(
        &self,
        session_id: &str,
        file_name: &str,
        chunk_index: u32,
        total_chunks: u32,
        data: &[u8],
    ) -> Result<StoreReceipt, UploadError> {
        let ext = extension_of(file_name)?;
        validate_session_token(session_id)?;
        if chunk_index >= total_chunks {
            return Err(UploadError::ChunkIndexOutOfRange {
                index: chunk_index,
                total: total_chunks,
            });
        }

        let handle = self.sessions.handle(session_id);

        if chunk_index != total_chunks - 1 {
            self.store.write(session_id, chunk_index, ext, data)?;
            handle.receiving();
            return Ok(StoreReceipt::pending());
        }

        let _gate = handle.merge_gate().lock().unwrap();
        if let Some(path) = handle.final_path() {
            return Ok(StoreReceipt::completed(path));
        }

        self.store.write(session_id, chunk_index, ext, data)?;
        handle.receiving();
        handle.merging();
        match self.merger.merge(session_id, total_chunks, ext) {
            Ok(name) => {
                let path = UploadLayout::merged_rel(&name);
                handle.complete(path.clone());
                Ok(StoreReceipt::completed(path))
            }
            Err(e) => {
                handle.fail();
                Err(e)
            }
        }
    }

    /// Non-chunked path: writes the whole payload straight into the
    /// completed-whole area and returns its relative path.
    pub fn store_whole(&self, file_name: &str, data: &[u8]) -> Result<String, UploadError> {
        let ext = extension_of(file_name)?;
        let dir = self.layout.whole_dir();
        std::fs::create_dir_all(&dir)?;
        let name = unique_name(ext);
        std::fs::write(dir.join(&name), data)?;
        tracing::info!(file = %name, bytes = data.len(), "stored whole upload");
        Ok(UploadLayout::whole_rel(&name))
    }
}

//! Chunked file upload engine backed by the local filesystem.
//!
//! A large file arrives as numbered chunks, each stored independently and
//! idempotently under a per-session temp directory. When the last chunk
//! lands, the chunks are streamed back together in index order into a single
//! artifact and the temp state is removed.
//!
//! Abandoned sessions are never reaped here; their temp directories stay on
//! disk until an external sweeper removes them.

mod coordinator;
mod layout;
mod merge;
mod session;
mod store;
mod validation;

pub use coordinator::UploadCoordinator;
pub use layout::{UploadLayout, default_upload_root, unique_name};
pub use merge::Reassembler;
pub use session::{SessionDirectory, SessionHandle, SessionRegistry};
pub use store::ChunkStore;
pub use validation::{chunk_mode, extension_of, validate_session_token};

/// Buffer size for streaming chunks into the merged artifact: 64 KiB.
///
/// Chunk counts and sizes are caller-controlled, so the merge must never
/// hold a whole artifact in memory.
pub const COPY_BUF_SIZE: usize = 64 * 1024;

/// Errors produced by the upload engine.
///
/// Cleanup failures after a successful merge are not errors; they are
/// logged and the already-reported outcome stands.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid session token: {0}")]
    InvalidSessionToken(String),

    #[error("chunk index and chunk count must be supplied together")]
    PartialChunkParams,

    #[error("chunk index {index} out of range for {total} chunks")]
    ChunkIndexOutOfRange { index: u32, total: u32 },

    #[error("chunk {index} missing from session {session_id}")]
    MissingChunk { session_id: String, index: u32 },

    #[error("failed to assemble chunks: {source}")]
    Merge {
        #[source]
        source: std::io::Error,
    },
}

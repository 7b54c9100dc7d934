//! Shared vocabulary between the upload engine and its callers.
//!
//! Controller layers serialize these types directly; the engine itself has
//! no HTTP dependencies.

mod types;

pub use types::{ChunkPresence, StoreReceipt, UploadState};

use serde::{Deserialize, Serialize};

/// Lifecycle state of one chunked upload session.
///
/// Carried in memory by the upload engine; the temp directory on disk is
/// only consulted to seed the state when a session is first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "receiving")]
    Receiving,
    #[serde(rename = "merging")]
    Merging,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "failed")]
    Failed,
}

impl UploadState {
    /// Returns `true` once the session can no longer accept chunks.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Complete)
    }
}

/// Result of a chunk existence probe.
///
/// `NotChunked` is a distinct "not applicable" answer for probes that carry
/// no chunk numbering, not a negative-existence signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkPresence {
    #[serde(rename = "present")]
    Present,
    #[serde(rename = "missing")]
    Missing,
    #[serde(rename = "not_chunked")]
    NotChunked,
}

impl ChunkPresence {
    /// Returns `true` iff the probed chunk is already stored.
    pub fn is_present(&self) -> bool {
        matches!(self, ChunkPresence::Present)
    }
}

/// Outcome of a chunk store operation.
///
/// `path` is the relative location of the finished artifact and is only set
/// once the last chunk has arrived and reassembly succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReceipt {
    pub state: UploadState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StoreReceipt {
    /// Receipt for a session still waiting on more chunks.
    pub fn pending() -> Self {
        Self {
            state: UploadState::Receiving,
            path: None,
        }
    }

    /// Receipt for a completed upload with its relative artifact path.
    pub fn completed(path: String) -> Self {
        Self {
            state: UploadState::Complete,
            path: Some(path),
        }
    }

    /// Returns `true` iff the upload finished and a final path exists.
    pub fn is_complete(&self) -> bool {
        self.state == UploadState::Complete && self.path.is_some()
    }
}

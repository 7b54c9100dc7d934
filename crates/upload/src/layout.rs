//! Upload-root directory layout and artifact naming.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Directory for whole (non-chunked) uploads, under the root.
pub const WHOLE_DIR: &str = "files";

/// Directory for reassembled chunked uploads, under the root.
pub const MERGED_DIR: &str = "chunked";

/// Directory for in-flight per-session chunk directories, under the root.
pub const TEMP_DIR: &str = "temp";

/// Prefix of the relative paths handed back to callers.
const REL_PREFIX: &str = "upload";

static NAME_SEQ: AtomicU64 = AtomicU64::new(0);

/// Maps upload keys to locations on disk.
///
/// Layout under the root:
/// - `files/<name>` holds completed whole uploads
/// - `chunked/<name>` holds completed reassembled uploads
/// - `temp/<sessionId>/<chunkIndex><ext>` holds in-flight chunks
#[derive(Debug, Clone)]
pub struct UploadLayout {
    root: PathBuf,
}

impl UploadLayout {
    /// Creates a layout rooted at `root`. Nothing is created on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the upload root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding completed whole uploads.
    pub fn whole_dir(&self) -> PathBuf {
        self.root.join(WHOLE_DIR)
    }

    /// Directory holding completed reassembled uploads.
    pub fn merged_dir(&self) -> PathBuf {
        self.root.join(MERGED_DIR)
    }

    /// Temporary directory owned by `session_id`.
    ///
    /// The token must already be validated; see
    /// [`validate_session_token`](crate::validate_session_token).
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(TEMP_DIR).join(session_id)
    }

    /// Canonical path of one chunk file.
    ///
    /// Index and extension together form the file name, so chunk ordering is
    /// derivable from the directory listing alone.
    pub fn chunk_path(&self, session_id: &str, chunk_index: u32, extension: &str) -> PathBuf {
        self.session_dir(session_id)
            .join(format!("{chunk_index}{extension}"))
    }

    /// Relative path reported for a completed whole upload.
    pub fn whole_rel(name: &str) -> String {
        format!("{REL_PREFIX}/{WHOLE_DIR}/{name}")
    }

    /// Relative path reported for a completed reassembled upload.
    pub fn merged_rel(name: &str) -> String {
        format!("{REL_PREFIX}/{MERGED_DIR}/{name}")
    }
}

impl Default for UploadLayout {
    fn default() -> Self {
        Self::new(default_upload_root())
    }
}

/// Resolves the default upload root: `$HOME/upload`, or `/tmp/upload`.
pub fn default_upload_root() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(REL_PREFIX)
}

/// Generates a file name for a completed upload: `<unix-millis>-<seq><ext>`.
///
/// The millisecond timestamp alone collides under concurrent completions;
/// the process-wide counter keeps names unique within one process.
pub fn unique_name(extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = NAME_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{millis}-{seq}{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_path_joins_index_and_extension() {
        let layout = UploadLayout::new("/srv/upload");
        assert_eq!(
            layout.chunk_path("abc", 7, ".png"),
            PathBuf::from("/srv/upload/temp/abc/7.png")
        );
    }

    #[test]
    fn session_dir_under_temp() {
        let layout = UploadLayout::new("/srv/upload");
        assert_eq!(
            layout.session_dir("abc"),
            PathBuf::from("/srv/upload/temp/abc")
        );
    }

    #[test]
    fn completed_areas_are_distinct() {
        let layout = UploadLayout::new("/srv/upload");
        assert_ne!(layout.whole_dir(), layout.merged_dir());
        assert!(layout.whole_dir().starts_with(layout.root()));
        assert!(layout.merged_dir().starts_with(layout.root()));
    }

    #[test]
    fn relative_paths_carry_area_prefix() {
        assert_eq!(UploadLayout::whole_rel("1-0.jpg"), "upload/files/1-0.jpg");
        assert_eq!(
            UploadLayout::merged_rel("1-0.jpg"),
            "upload/chunked/1-0.jpg"
        );
    }

    #[test]
    fn unique_name_keeps_extension() {
        let name = unique_name(".png");
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn unique_names_do_not_collide() {
        let a = unique_name(".bin");
        let b = unique_name(".bin");
        assert_ne!(a, b);
    }

    #[test]
    fn default_root_ends_with_upload() {
        assert!(default_upload_root().ends_with("upload"));
    }
}

//! Input validation for session tokens, file names and chunk numbering.

use std::path::{Component, Path};

use crate::UploadError;

/// Validates a client-supplied session token before it is embedded in a path.
///
/// Tokens become directory names under the temp area, so they must be a
/// single normal path component. Rejects:
/// - Empty tokens
/// - Separators (anything that splits into multiple components)
/// - `.` and `..`
/// - Absolute paths and Windows prefixes
pub fn validate_session_token(token: &str) -> Result<(), UploadError> {
    if token.is_empty() {
        return Err(UploadError::InvalidSessionToken("empty token".into()));
    }

    let mut components = Path::new(token).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(UploadError::InvalidSessionToken(format!(
            "token must be a single path component: {token}"
        ))),
    }
}

/// Extracts the extension from a file name, leading dot included.
///
/// `"pic.png"` yields `".png"`, matching how the artifact and chunk file
/// names are built. A name without a dot, or with path separators in its
/// suffix, is rejected.
pub fn extension_of(file_name: &str) -> Result<&str, UploadError> {
    let dot = file_name
        .rfind('.')
        .ok_or_else(|| UploadError::InvalidFileName(format!("no extension: {file_name}")))?;

    let ext = &file_name[dot..];
    if ext.contains(['/', '\\']) {
        return Err(UploadError::InvalidFileName(format!(
            "extension contains a path separator: {file_name}"
        )));
    }
    Ok(ext)
}

/// Resolves the chunk numbering of a request.
///
/// Both parameters absent means non-chunked mode (`Ok(None)`). Both present
/// means chunked mode with the index checked against the declared count.
/// One without the other is a malformed request.
pub fn chunk_mode(
    chunk_index: Option<u32>,
    total_chunks: Option<u32>,
) -> Result<Option<(u32, u32)>, UploadError> {
    match (chunk_index, total_chunks) {
        (None, None) => Ok(None),
        (Some(index), Some(total)) => {
            if index >= total {
                return Err(UploadError::ChunkIndexOutOfRange { index, total });
            }
            Ok(Some((index, total)))
        }
        _ => Err(UploadError::PartialChunkParams),
    }
}

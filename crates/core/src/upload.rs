use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::recording::{ArtifactOrigin, VideoArtifact};

/// Ceiling for user-supplied answer videos.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Video file is too large. Maximum size is 50MB.")]
    TooLarge { size: u64 },

    #[error("Unsupported video file: {file_name}")]
    NotVideo { file_name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn check_size(size: u64) -> Result<(), UploadError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size });
    }
    Ok(())
}

/// MIME type for the video containers the analysis service accepts.
pub fn video_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "webm" => Some("video/webm"),
        "mp4" | "m4v" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "mkv" => Some("video/x-matroska"),
        "avi" => Some("video/x-msvideo"),
        _ => None,
    }
}

/// Reads a user-selected answer video. The size is checked before any bytes are read.
pub async fn load_video(path: &Path) -> Result<VideoArtifact, UploadError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mime = video_mime(path).ok_or_else(|| UploadError::NotVideo {
        file_name: file_name.clone(),
    })?;

    let size = tokio::fs::metadata(path).await?.len();
    debug!(%file_name, size, "checking uploaded video");
    check_size(size)?;

    let bytes = tokio::fs::read(path).await?;
    info!(%file_name, size = bytes.len(), "uploaded video ready");

    Ok(VideoArtifact::new(
        file_name,
        mime,
        bytes,
        ArtifactOrigin::Uploaded,
    ))
}

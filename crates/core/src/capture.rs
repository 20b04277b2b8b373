//! Capture capability provider.
//!
//! Everything platform specific about cameras and encoders sits behind these
//! traits so the recording state machine can run against any backend,
//! including an in-memory one in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Preferred recorder format.
pub const PREFERRED_MIME: &str = "video/webm;codecs=vp9";
/// Generic container used when the preferred codec is unavailable.
pub const FALLBACK_MIME: &str = "video/webm";

/// Device and permission failures, one variant per remediation message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera capture is not supported on this platform")]
    Unsupported,

    #[error("no camera detected")]
    NoDevice,

    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera is in use by another application")]
    DeviceBusy,

    #[error("camera access blocked by security restrictions")]
    SecurityRestricted,

    #[error("{0}")]
    Other(String),
}

impl CaptureError {
    /// Human-readable remediation shown before falling back to upload.
    pub fn remediation(&self) -> String {
        match self {
            CaptureError::Unsupported => "Your platform does not support camera access.\n\n\
                Please use the \"Upload Video\" option instead."
                .to_string(),
            CaptureError::NoDevice => "No camera detected.\n\n\
                📷 Please:\n\
                1. Connect a webcam\n\
                2. Try again\n\n\
                Or use the \"Upload Video\" option instead."
                .to_string(),
            CaptureError::PermissionDenied => "Camera permission denied.\n\n\
                📷 To fix this:\n\
                1. Grant this application access to the camera\n\
                2. Choose \"Record with Webcam\" again\n\n\
                Or use the \"Upload Video\" option instead."
                .to_string(),
            CaptureError::DeviceBusy => "Camera is in use by another application.\n\n\
                📷 Please:\n\
                1. Close other apps using the camera\n\
                2. Try again\n\n\
                Or use the \"Upload Video\" option instead."
                .to_string(),
            CaptureError::SecurityRestricted => {
                "Camera access blocked due to security restrictions.\n\n\
                📷 Please:\n\
                1. Make sure the app runs in a trusted context\n\
                2. Check your security settings\n\n\
                Or use the \"Upload Video\" option instead."
                    .to_string()
            }
            CaptureError::Other(message) => format!(
                "Camera error: {message}\n\n\
                Please use the \"Upload Video\" option instead."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInput {
    pub id: String,
    pub label: String,
}

/// Combined audio/video stream request for the user-facing camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            audio: true,
        }
    }
}

#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Whether the platform offers any capture API at all.
    fn is_supported(&self) -> bool;

    async fn video_inputs(&self) -> Result<Vec<VideoInput>, CaptureError>;

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;

    fn supports_mime(&self, mime: &str) -> bool;
}

#[async_trait]
pub trait CaptureStream: Send {
    /// Resolves once the live preview has produced its first frame.
    async fn first_frame(&mut self) -> Result<(), CaptureError>;

    /// Starts encoding. Fails when the recorder dies before producing anything.
    async fn start_recorder(
        &mut self,
        mime: &str,
        timeslice: Duration,
    ) -> Result<Box<dyn StreamRecorder>, CaptureError>;

    /// Stops and releases every track of the stream.
    fn stop_tracks(&mut self);

    fn live_tracks(&self) -> usize;
}

#[async_trait]
pub trait StreamRecorder: Send {
    /// Chunks produced since the previous drain, in order.
    fn drain(&mut self) -> Vec<Bytes>;

    /// Errors once the recorder has ended without being asked to.
    fn check(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Stops recording and returns the chunks still pending.
    async fn stop(self: Box<Self>) -> Result<Vec<Bytes>, CaptureError>;
}

/// Picks the preferred codec, falling back to the generic container.
pub fn negotiate_mime(backend: &dyn CaptureBackend) -> &'static str {
    if backend.supports_mime(PREFERRED_MIME) {
        PREFERRED_MIME
    } else {
        FALLBACK_MIME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_failure_has_distinct_remediation() {
        let errors = [
            CaptureError::Unsupported,
            CaptureError::NoDevice,
            CaptureError::PermissionDenied,
            CaptureError::DeviceBusy,
            CaptureError::SecurityRestricted,
            CaptureError::Other("boom".into()),
        ];
        let messages: std::collections::HashSet<_> =
            errors.iter().map(CaptureError::remediation).collect();
        assert_eq!(messages.len(), errors.len());
        assert!(messages.iter().all(|m| m.contains("Upload Video")));
    }

    #[test]
    fn generic_error_keeps_original_message() {
        let message = CaptureError::Other("driver crashed".into()).remediation();
        assert!(message.starts_with("Camera error: driver crashed"));
    }
}

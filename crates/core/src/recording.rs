//! Answer recording state machine.
//!
//! `Idle → CameraInitializing → CameraReady → Recording → StoppedPreview`, plus
//! `UploadPreview` for the upload branch. Every transition goes through a
//! method on [`RecordingController`]; anything else is rejected with
//! [`RecordingError::InvalidTransition`] and leaves the state untouched.

use std::{fmt, mem, path::Path, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    capture::{
        CaptureBackend, CaptureError, CaptureStream, FALLBACK_MIME, StreamConstraints,
        StreamRecorder, negotiate_mime,
    },
    upload::{self, UploadError},
};

pub const MAX_RECORDING_SECS: u32 = 120;
pub const CHUNK_INTERVAL: Duration = Duration::from_millis(100);
pub const RECORDED_FILE_NAME: &str = "interview-response.webm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    Recorded,
    Uploaded,
}

/// The single answer video of a session, recorded or uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
    pub origin: ArtifactOrigin,
}

impl VideoArtifact {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
        origin: ArtifactOrigin,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
            origin,
        }
    }

    /// Concatenates recorder chunks into one playable webm.
    pub fn from_chunks(chunks: &[Bytes]) -> Self {
        let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            buf.extend_from_slice(chunk);
        }
        Self::new(
            RECORDED_FILE_NAME,
            FALLBACK_MIME,
            buf.freeze(),
            ArtifactOrigin::Recorded,
        )
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension for the artifact's container.
    pub fn extension(&self) -> &str {
        match self.mime_type.split(';').next().unwrap_or_default() {
            "video/mp4" => "mp4",
            "video/quicktime" => "mov",
            "video/x-matroska" => "mkv",
            "video/x-msvideo" => "avi",
            _ => "webm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Webcam,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    CameraInitializing,
    CameraReady,
    Recording,
    StoppedPreview,
    UploadPreview,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingState::Idle => "idle",
            RecordingState::CameraInitializing => "initializing the camera",
            RecordingState::CameraReady => "the camera is ready",
            RecordingState::Recording => "recording",
            RecordingState::StoppedPreview => "previewing a recording",
            RecordingState::UploadPreview => "previewing an upload",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RecordingState,
    },

    #[error("Failed to start recording: {0}")]
    Start(CaptureError),

    #[error("Failed to stop recording: {0}")]
    Stop(CaptureError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Result of trying to bring the camera up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraOutcome {
    Ready { devices: usize },
    /// The controller already switched to upload mode.
    FellBackToUpload { reason: CaptureError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Elapsed(u32),
    AutoStopped(VideoArtifact),
    /// The recorder died mid-take; what it produced is kept as the artifact.
    Interrupted {
        artifact: VideoArtifact,
        reason: CaptureError,
    },
}

enum Phase {
    Idle,
    CameraInitializing,
    CameraReady,
    Recording {
        recorder: Box<dyn StreamRecorder>,
        chunks: Vec<Bytes>,
        elapsed_secs: u32,
    },
    StoppedPreview {
        artifact: VideoArtifact,
    },
    UploadPreview {
        artifact: VideoArtifact,
    },
}

impl Phase {
    fn state(&self) -> RecordingState {
        match self {
            Phase::Idle => RecordingState::Idle,
            Phase::CameraInitializing => RecordingState::CameraInitializing,
            Phase::CameraReady => RecordingState::CameraReady,
            Phase::Recording { .. } => RecordingState::Recording,
            Phase::StoppedPreview { .. } => RecordingState::StoppedPreview,
            Phase::UploadPreview { .. } => RecordingState::UploadPreview,
        }
    }
}

/// Owns the capture stream, recorder buffers and the answer artifact of one session.
pub struct RecordingController {
    backend: Arc<dyn CaptureBackend>,
    constraints: StreamConstraints,
    mode: CaptureMode,
    phase: Phase,
    stream: Option<Box<dyn CaptureStream>>,
}

impl RecordingController {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            constraints: StreamConstraints::default(),
            mode: CaptureMode::Webcam,
            phase: Phase::Idle,
            stream: None,
        }
    }

    pub fn with_constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn state(&self) -> RecordingState {
        self.phase.state()
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn artifact(&self) -> Option<&VideoArtifact> {
        match &self.phase {
            Phase::StoppedPreview { artifact } | Phase::UploadPreview { artifact } => {
                Some(artifact)
            }
            _ => None,
        }
    }

    pub fn elapsed_secs(&self) -> u32 {
        match &self.phase {
            Phase::Recording { elapsed_secs, .. } => *elapsed_secs,
            _ => 0,
        }
    }

    /// Live tracks of the held capture stream, zero when none is held.
    pub fn live_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.live_tracks())
    }

    fn reject<T>(&self, action: &'static str) -> Result<T, RecordingError> {
        Err(RecordingError::InvalidTransition {
            action,
            state: self.state(),
        })
    }

    /// Switches to webcam mode, discarding any artifact, and brings the camera up.
    pub async fn select_webcam(&mut self) -> Result<CameraOutcome, RecordingError> {
        if matches!(self.phase, Phase::Recording { .. }) {
            return self.reject("switch to webcam");
        }
        self.mode = CaptureMode::Webcam;
        self.phase = Phase::Idle;
        self.initialize_camera().await
    }

    /// Switches to upload mode, releasing the camera and discarding any artifact.
    pub fn select_upload(&mut self) -> Result<(), RecordingError> {
        if matches!(self.phase, Phase::Recording { .. }) {
            return self.reject("switch to upload");
        }
        self.switch_to_upload();
        Ok(())
    }

    fn switch_to_upload(&mut self) {
        self.release_stream();
        self.mode = CaptureMode::Upload;
        self.phase = Phase::Idle;
        debug!("capture mode set to upload");
    }

    /// Acquires the camera. On any failure the controller falls back to upload mode.
    pub async fn initialize_camera(&mut self) -> Result<CameraOutcome, RecordingError> {
        if self.mode != CaptureMode::Webcam {
            return self.reject("initialize the camera");
        }
        if !matches!(self.phase, Phase::Idle | Phase::CameraReady) {
            return self.reject("initialize the camera");
        }

        self.release_stream();
        self.phase = Phase::CameraInitializing;

        match self.acquire().await {
            Ok((stream, devices)) => {
                info!(devices, "camera initialized");
                self.stream = Some(stream);
                self.phase = Phase::CameraReady;
                Ok(CameraOutcome::Ready { devices })
            }
            Err(reason) => {
                warn!(error = %reason, "camera initialization failed, switching to upload");
                self.switch_to_upload();
                Ok(CameraOutcome::FellBackToUpload { reason })
            }
        }
    }

    async fn acquire(&self) -> Result<(Box<dyn CaptureStream>, usize), CaptureError> {
        if !self.backend.is_supported() {
            return Err(CaptureError::Unsupported);
        }

        let devices = self.backend.video_inputs().await?;
        if devices.is_empty() {
            return Err(CaptureError::NoDevice);
        }
        debug!(count = devices.len(), "found cameras, requesting access");

        let mut stream = self.backend.open_stream(&self.constraints).await?;
        if let Err(e) = stream.first_frame().await {
            stream.stop_tracks();
            return Err(e);
        }

        Ok((stream, devices.len()))
    }

    pub async fn start_recording(&mut self) -> Result<&'static str, RecordingError> {
        if !matches!(self.phase, Phase::CameraReady) {
            return self.reject("start recording");
        }
        let Some(stream) = self.stream.as_mut() else {
            return self.reject("start recording");
        };

        let mime = negotiate_mime(self.backend.as_ref());
        let recorder = stream
            .start_recorder(mime, CHUNK_INTERVAL)
            .await
            .map_err(RecordingError::Start)?;

        self.phase = Phase::Recording {
            recorder,
            chunks: Vec::new(),
            elapsed_secs: 0,
        };
        info!(mime, "recording started");
        Ok(mime)
    }

    /// One-second timer tick. Reaching the maximum duration runs the regular stop path.
    pub async fn tick(&mut self) -> Result<TickOutcome, RecordingError> {
        let Phase::Recording {
            recorder,
            chunks,
            elapsed_secs,
        } = &mut self.phase
        else {
            return self.reject("advance the timer");
        };

        chunks.extend(recorder.drain().into_iter().filter(|c| !c.is_empty()));
        if let Err(reason) = recorder.check() {
            warn!(error = %reason, chunks = chunks.len(), "recorder ended on its own");
            if chunks.is_empty() {
                self.abort_recording().await;
                return Err(RecordingError::Start(reason));
            }
            let artifact = self.stop_recording().await?;
            return Ok(TickOutcome::Interrupted { artifact, reason });
        }
        *elapsed_secs += 1;
        let elapsed = *elapsed_secs;

        if elapsed >= MAX_RECORDING_SECS {
            info!(elapsed, "maximum duration reached, stopping");
            let artifact = self.stop_recording().await?;
            return Ok(TickOutcome::AutoStopped(artifact));
        }
        Ok(TickOutcome::Elapsed(elapsed))
    }

    /// Stops the recorder and turns the buffered chunks into the session's artifact.
    pub async fn stop_recording(&mut self) -> Result<VideoArtifact, RecordingError> {
        let (recorder, mut chunks, elapsed_secs) = match mem::replace(&mut self.phase, Phase::Idle)
        {
            Phase::Recording {
                recorder,
                chunks,
                elapsed_secs,
            } => (recorder, chunks, elapsed_secs),
            other => {
                self.phase = other;
                return self.reject("stop recording");
            }
        };

        let rest = match recorder.stop().await {
            Ok(rest) => rest,
            Err(e) => {
                warn!(error = %e, "recorder failed to stop cleanly");
                self.phase = Phase::CameraReady;
                return Err(RecordingError::Stop(e));
            }
        };
        chunks.extend(rest.into_iter().filter(|c| !c.is_empty()));

        let artifact = VideoArtifact::from_chunks(&chunks);
        info!(
            chunks = chunks.len(),
            size = artifact.len(),
            elapsed_secs,
            "recording stopped, preview ready"
        );
        self.phase = Phase::StoppedPreview {
            artifact: artifact.clone(),
        };
        Ok(artifact)
    }

    /// Reaps a recorder that produced nothing, keeping the camera.
    async fn abort_recording(&mut self) {
        if let Phase::Recording { recorder, .. } = mem::replace(&mut self.phase, Phase::CameraReady)
        {
            if let Err(e) = recorder.stop().await {
                debug!(error = %e, "failed recorder reaped");
            }
        }
    }

    /// Accepts an uploaded video. Oversized files leave the controller untouched.
    pub fn load_upload(&mut self, artifact: VideoArtifact) -> Result<(), RecordingError> {
        if self.mode != CaptureMode::Upload || !matches!(self.phase, Phase::Idle) {
            return self.reject("load an upload");
        }
        upload::check_size(artifact.len() as u64)?;

        info!(file_name = %artifact.file_name, size = artifact.len(), "uploaded video ready");
        self.phase = Phase::UploadPreview { artifact };
        Ok(())
    }

    /// Reads a video from disk and loads it as the upload.
    pub async fn upload_file(&mut self, path: &Path) -> Result<(), RecordingError> {
        if self.mode != CaptureMode::Upload || !matches!(self.phase, Phase::Idle) {
            return self.reject("load an upload");
        }
        let artifact = upload::load_video(path).await?;
        self.load_upload(artifact)
    }

    /// Discards the artifact and returns to the pre-recording state of the active mode.
    pub fn retake(&mut self) -> Result<VideoArtifact, RecordingError> {
        let next = match (&self.phase, self.mode) {
            (Phase::StoppedPreview { .. }, CaptureMode::Webcam) if self.live_tracks() > 0 => {
                Phase::CameraReady
            }
            (Phase::StoppedPreview { .. }, _) | (Phase::UploadPreview { .. }, _) => Phase::Idle,
            _ => return self.reject("retake"),
        };

        match mem::replace(&mut self.phase, next) {
            Phase::StoppedPreview { artifact } | Phase::UploadPreview { artifact } => {
                debug!(artifact = %artifact.id, "artifact discarded for retake");
                Ok(artifact)
            }
            other => {
                self.phase = other;
                self.reject("retake")
            }
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            debug!("capture stream released");
        }
    }

    /// Drops the recorder, the artifact and the camera.
    pub fn shutdown(&mut self) {
        self.phase = Phase::Idle;
        self.release_stream();
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.release_stream();
    }
}

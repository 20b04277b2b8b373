//! Charisma Core Library
//!
//! Interview practice flow: collect a role and background, fetch interview
//! questions, capture a video answer and render the coaching feedback.

pub mod analysis;
pub mod api;
pub mod capture;
pub mod config;
pub mod error;
pub mod form;
pub mod format;
pub mod preview;
pub mod recording;
pub mod render;
pub mod session;
pub mod types;
pub mod upload;

pub use analysis::{AnalysisController, AnalysisError, AnalysisRequest};
pub use api::{ApiClient, ApiError};
pub use capture::{CaptureBackend, CaptureError, CaptureStream, StreamConstraints, StreamRecorder};
pub use config::Config;
pub use error::{CoachError, Result};
pub use form::{FormController, FormError, InputMethod, PRESET_ROLES, RoleSelection};
pub use format::{format_elapsed, format_feedback_readable, format_questions};
pub use preview::PreviewStore;
pub use recording::{
    CameraOutcome, CaptureMode, MAX_RECORDING_SECS, RecordingController, RecordingError,
    RecordingState, TickOutcome, VideoArtifact,
};
pub use session::{ContextSource, InterviewSession, ResumeFile, SessionContext};
pub use types::{CategoryFeedback, FeedbackResult, QuestionSet, SimilarRole};
pub use upload::{MAX_UPLOAD_BYTES, UploadError};

use thiserror::Error;

use crate::{
    analysis::AnalysisError, api::ApiError, capture::CaptureError, form::FormError,
    preview::PreviewError, recording::RecordingError, upload::UploadError,
};

#[derive(Error, Debug)]
pub enum CoachError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Preview(#[from] PreviewError),

    #[error("Error generating questions: {0}")]
    Questions(ApiError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CoachError {
    /// Local validation problems that never reached the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoachError::Form(_)
                | CoachError::Upload(UploadError::TooLarge { .. })
                | CoachError::Recording(RecordingError::Upload(UploadError::TooLarge { .. }))
                | CoachError::Analysis(AnalysisError::NoVideo | AnalysisError::MissingContext)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoachError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_read_like_alerts() {
        let err = CoachError::Questions(ApiError::Status {
            status: 500,
            detail: "Gemini quota exceeded".into(),
        });
        assert_eq!(
            err.to_string(),
            "Error generating questions: Gemini quota exceeded"
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn oversized_upload_is_a_validation_error() {
        let err: CoachError = RecordingError::Upload(UploadError::TooLarge { size: 1 }).into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Video file is too large. Maximum size is 50MB.");
    }
}

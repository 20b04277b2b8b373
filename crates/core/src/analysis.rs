use thiserror::Error;
use tracing::info;

use crate::{
    api::{ApiClient, ApiError},
    recording::{RECORDED_FILE_NAME, VideoArtifact},
    session::InterviewSession,
    types::FeedbackResult,
};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No video to analyze")]
    NoVideo,

    #[error("Missing interview context. Please generate questions first.")]
    MissingContext,

    #[error("An analysis is already in flight")]
    Busy,

    #[error("Failed to encode questions: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Analysis failed: {0}")]
    Api(#[from] ApiError),
}

/// Everything the analysis endpoint needs, checked before anything is sent.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub video: VideoArtifact,
    pub questions_json: String,
    pub role: String,
    pub context: String,
}

impl AnalysisRequest {
    pub fn prepare(
        session: Option<&InterviewSession>,
        video: Option<&VideoArtifact>,
    ) -> Result<Self, AnalysisError> {
        let video = video.ok_or(AnalysisError::NoVideo)?;
        let session = session
            .filter(|s| !s.questions.is_empty() && !s.role().trim().is_empty())
            .ok_or(AnalysisError::MissingContext)?;

        Ok(Self {
            video: video.clone(),
            questions_json: session.questions.to_json()?,
            role: session.role().to_string(),
            context: session.candidate_context(),
        })
    }

    /// Multipart file name of the video part.
    pub fn video_file_name(&self) -> String {
        RECORDED_FILE_NAME.to_string()
    }
}

/// Tracks the analyze control: disabled while a request runs, re-enabled on failure.
#[derive(Debug, Default)]
pub struct AnalysisController {
    submitting: bool,
    completed: bool,
}

impl AnalysisController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting && !self.completed
    }

    pub async fn submit(
        &mut self,
        api: &ApiClient,
        session: Option<&InterviewSession>,
        video: Option<&VideoArtifact>,
    ) -> Result<FeedbackResult, AnalysisError> {
        if self.submitting {
            return Err(AnalysisError::Busy);
        }
        let request = AnalysisRequest::prepare(session, video)?;

        self.submitting = true;
        let result = api.analyze_video(&request).await;
        self.submitting = false;

        let feedback = result?;
        self.completed = true;
        info!(video = %request.video.id, "feedback received");
        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::{
        api::mock_server::{MockServer, Reply, feedback_body},
        recording::ArtifactOrigin,
        session::{ContextSource, SessionContext},
        types::QuestionSet,
    };

    fn session(questions: Vec<String>) -> InterviewSession {
        InterviewSession::new(
            SessionContext::new(
                "Backend Engineer",
                ContextSource::Description("Ran the payments platform team".into()),
            ),
            QuestionSet::new(questions),
        )
    }

    fn recorded() -> VideoArtifact {
        VideoArtifact::from_chunks(&[bytes::Bytes::from_static(b"webm-bytes")])
    }

    #[test]
    fn requires_video() {
        let s = session(vec!["Q1".into()]);
        assert!(matches!(
            AnalysisRequest::prepare(Some(&s), None),
            Err(AnalysisError::NoVideo)
        ));
    }

    #[test]
    fn requires_questions_and_role() {
        let video = recorded();
        assert!(matches!(
            AnalysisRequest::prepare(None, Some(&video)),
            Err(AnalysisError::MissingContext)
        ));
        let empty = session(Vec::new());
        assert!(matches!(
            AnalysisRequest::prepare(Some(&empty), Some(&video)),
            Err(AnalysisError::MissingContext)
        ));
    }

    #[tokio::test]
    async fn submits_video_with_session_fields() {
        let server = MockServer::start(Reply::ok(feedback_body())).await;
        let api = ApiClient::new(&server.base_url);
        let s = session(vec!["Why Rust?".into(), "Describe an outage".into()]);
        let video = VideoArtifact::new(
            "my answer.mp4",
            "video/mp4",
            b"mp4-bytes".to_vec(),
            ArtifactOrigin::Uploaded,
        );

        let mut controller = AnalysisController::new();
        let feedback = controller
            .submit(&api, Some(&s), Some(&video))
            .await
            .unwrap();
        assert_eq!(feedback.overall_score, 82.0);
        assert!(!controller.can_submit());

        let part = server.field("video").unwrap();
        assert_eq!(part.file_name.as_deref(), Some(RECORDED_FILE_NAME));
        assert_eq!(part.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(part.data, b"mp4-bytes");
        assert_eq!(
            server.field("questions").unwrap().text(),
            r#"["Why Rust?","Describe an outage"]"#
        );
        assert_eq!(server.field("role").unwrap().text(), "Backend Engineer");
        assert_eq!(
            server.field("context").unwrap().text(),
            "Ran the payments platform team"
        );
    }

    #[tokio::test]
    async fn failure_reenables_submission() {
        let server = MockServer::start(Reply::error(
            StatusCode::BAD_REQUEST,
            json!({"detail": "File must be a video"}),
        ))
        .await;
        let api = ApiClient::new(&server.base_url);
        let s = session(vec!["Q1".into()]);
        let video = recorded();

        let mut controller = AnalysisController::new();
        let err = controller
            .submit(&api, Some(&s), Some(&video))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Analysis failed: File must be a video");
        assert!(controller.can_submit());
    }
}

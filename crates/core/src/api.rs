use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    analysis::AnalysisRequest,
    session::{ContextSource, SessionContext},
    types::{AnalyzeVideoResponse, FeedbackResult, GenerateQuestionsResponse, QuestionSet},
};

pub const HEALTH_PATH: &str = "/health";
pub const GENERATE_QUESTIONS_PATH: &str = "/agent1/generate-questions";
pub const ANALYZE_VIDEO_PATH: &str = "/agent2/analyze-video";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response. `detail` is the server's message or a fixed fallback.
    #[error("{detail}")]
    Status { status: u16, detail: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    pub fn detail(&self) -> String {
        match self {
            ApiError::Status { detail, .. } => detail.clone(),
            ApiError::Http(e) => e.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// Thin client over the question-generation and video-analysis service.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<serde_json::Value, ApiError> {
        let response = self.client.get(self.url(HEALTH_PATH)).send().await?;
        let health = parse_response(response, "Health check failed").await?;
        debug!(%health, "backend health");
        Ok(health)
    }

    pub async fn generate_questions(
        &self,
        context: &SessionContext,
    ) -> Result<QuestionSet, ApiError> {
        let form = Form::new().text("role", context.role.clone());
        let form = match &context.source {
            ContextSource::ResumeFile(file) => {
                let part = Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.content_type)?;
                form.part("resume", part)
            }
            ContextSource::Description(text) => form.text("description", text.clone()),
        };

        info!(session = %context.id, role = %context.role, "requesting interview questions");
        let response = self
            .client
            .post(self.url(GENERATE_QUESTIONS_PATH))
            .multipart(form)
            .send()
            .await?;

        let body: GenerateQuestionsResponse =
            parse_response(response, "Failed to generate questions").await?;
        info!(
            count = body.questions.len(),
            role = body.role.as_deref().unwrap_or(&context.role),
            context_length = ?body.context_length,
            "questions received"
        );
        Ok(QuestionSet::new(body.questions))
    }

    pub async fn analyze_video(&self, request: &AnalysisRequest) -> Result<FeedbackResult, ApiError> {
        let video = Part::bytes(request.video.bytes.to_vec())
            .file_name(request.video_file_name())
            .mime_str(&request.video.mime_type)?;

        let form = Form::new()
            .part("video", video)
            .text("questions", request.questions_json.clone())
            .text("role", request.role.clone())
            .text("context", request.context.clone());

        info!(
            size = request.video.len(),
            role = %request.role,
            "uploading video for analysis"
        );
        let response = self
            .client
            .post(self.url(ANALYZE_VIDEO_PATH))
            .multipart(form)
            .send()
            .await?;

        let body: AnalyzeVideoResponse = parse_response(response, "Failed to analyze video").await?;
        info!(overall_score = body.feedback.overall_score, "analysis complete");
        Ok(body.feedback)
    }
}

/// Decodes a 2xx body, or turns the error body's `detail` into [`ApiError::Status`].
async fn parse_response<T: DeserializeOwned>(
    response: Response,
    fallback: &'static str,
) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .and_then(|detail| detail.as_str().map(str::to_string))
        .filter(|detail| !detail.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    warn!(status = status.as_u16(), %detail, "request failed");
    Err(ApiError::Status {
        status: status.as_u16(),
        detail,
    })
}


#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::{mock_server::*, *};
    use crate::session::{PDF_MIME, ResumeFile};

    #[tokio::test]
    async fn health_returns_payload() {
        let server = MockServer::start(Reply::ok(json!({"status": "healthy"}))).await;
        let client = ApiClient::new(&server.base_url);
        let health = client.health().await.unwrap();
        assert_eq!(health["status"], "healthy");
    }

    #[tokio::test]
    async fn description_submission_sends_role_and_text_only() {
        let server =
            MockServer::start(Reply::ok(questions_body(&["Q1", "Q2", "Q3"]))).await;
        let client = ApiClient::new(format!("{}/", server.base_url));
        let context = SessionContext::new(
            "Backend Engineer",
            ContextSource::Description("Built queues and caches".into()),
        );

        let questions = client.generate_questions(&context).await.unwrap();
        assert_eq!(questions.as_slice(), ["Q1", "Q2", "Q3"]);

        assert_eq!(server.field("role").unwrap().text(), "Backend Engineer");
        assert_eq!(
            server.field("description").unwrap().text(),
            "Built queues and caches"
        );
        assert!(server.field("resume").is_none());
    }

    #[tokio::test]
    async fn resume_submission_sends_file_part() {
        let server = MockServer::start(Reply::ok(questions_body(&["Q1"]))).await;
        let client = ApiClient::new(&server.base_url);
        let resume = ResumeFile::new("cv.pdf", PDF_MIME, b"%PDF-1.7".to_vec());
        let context = SessionContext::new("Data Scientist", ContextSource::ResumeFile(resume));

        client.generate_questions(&context).await.unwrap();

        let part = server.field("resume").unwrap();
        assert_eq!(part.file_name.as_deref(), Some("cv.pdf"));
        assert_eq!(part.content_type.as_deref(), Some(PDF_MIME));
        assert_eq!(part.data, b"%PDF-1.7");
        assert!(server.field("description").is_none());
    }

    #[tokio::test]
    async fn error_detail_is_surfaced() {
        let server = MockServer::start(Reply::error(
            StatusCode::BAD_REQUEST,
            json!({"detail": "Must provide either resume or description"}),
        ))
        .await;
        let client = ApiClient::new(&server.base_url);
        let context =
            SessionContext::new("Backend Engineer", ContextSource::Description("x".into()));

        let err = client.generate_questions(&context).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
        assert_eq!(err.to_string(), "Must provide either resume or description");
    }

    #[tokio::test]
    async fn missing_detail_uses_fallback() {
        let server = MockServer::start(Reply::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"message": "oops"}),
        ))
        .await;
        let client = ApiClient::new(&server.base_url);
        let context =
            SessionContext::new("Backend Engineer", ContextSource::Description("x".into()));

        let err = client.generate_questions(&context).await.unwrap_err();
        assert_eq!(err.detail(), "Failed to generate questions");
    }

    #[tokio::test]
    async fn structured_detail_uses_fallback() {
        let server = MockServer::start(Reply::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"detail": [{"loc": ["body", "role"], "msg": "field required"}]}),
        ))
        .await;
        let client = ApiClient::new(&server.base_url);
        let err = client.health().await.unwrap_err();
        assert_eq!(err.detail(), "Health check failed");
    }

    #[tokio::test]
    async fn network_failure_propagates() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(format!("http://{addr}"));
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiError::Http(_)));
    }
}

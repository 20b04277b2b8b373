use std::path::Path;

use bytes::Bytes;
use uuid::Uuid;

use crate::{form::FormError, types::QuestionSet};

pub const PDF_MIME: &str = "application/pdf";

/// A résumé picked from disk or dropped onto the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ResumeFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a PDF résumé from disk. Anything without a `.pdf` extension is refused.
    pub async fn from_path(path: &Path) -> Result<Self, FormError> {
        let is_pdf = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            return Err(FormError::NotPdf {
                file_name: path.display().to_string(),
            });
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume.pdf".to_string());

        Ok(Self::new(file_name, PDF_MIME, bytes))
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type == PDF_MIME
    }
}

/// Exactly one source of candidate background per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSource {
    ResumeFile(ResumeFile),
    Description(String),
}

/// What the user submitted to obtain questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub id: Uuid,
    pub role: String,
    pub source: ContextSource,
}

impl SessionContext {
    pub fn new(role: impl Into<String>, source: ContextSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.into(),
            source,
        }
    }
}

/// Handoff from question generation to the recording stage.
#[derive(Debug, Clone)]
pub struct InterviewSession {
    pub context: SessionContext,
    pub questions: QuestionSet,
}

impl InterviewSession {
    pub fn new(context: SessionContext, questions: QuestionSet) -> Self {
        Self { context, questions }
    }

    pub fn id(&self) -> Uuid {
        self.context.id
    }

    pub fn role(&self) -> &str {
        &self.context.role
    }

    /// Free-text background sent along with the video.
    pub fn candidate_context(&self) -> String {
        match &self.context.source {
            ContextSource::Description(text) => text.clone(),
            ContextSource::ResumeFile(file) => format!("Résumé: {}", file.file_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_context_follows_source() {
        let described = InterviewSession::new(
            SessionContext::new(
                "Backend Engineer",
                ContextSource::Description("Five years of Rust services".into()),
            ),
            QuestionSet::default(),
        );
        assert_eq!(described.candidate_context(), "Five years of Rust services");

        let resume = ResumeFile::new("cv.pdf", PDF_MIME, vec![1u8, 2, 3]);
        let uploaded = InterviewSession::new(
            SessionContext::new("Backend Engineer", ContextSource::ResumeFile(resume)),
            QuestionSet::default(),
        );
        assert_eq!(uploaded.candidate_context(), "Résumé: cv.pdf");
    }

    #[tokio::test]
    async fn non_pdf_resume_is_refused() {
        let err = ResumeFile::from_path(Path::new("notes.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, FormError::NotPdf { .. }));
    }
}

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    api::ApiClient,
    error::CoachError,
    session::{ContextSource, InterviewSession, ResumeFile, SessionContext},
};

/// A description must be longer than this many characters once trimmed.
pub const MIN_DESCRIPTION_CHARS: usize = 20;

/// Select value that switches the form to a free-text role.
pub const CUSTOM_ROLE: &str = "custom";

pub const PRESET_ROLES: &[&str] = &[
    "Software Engineer",
    "Backend Engineer",
    "Frontend Engineer",
    "Full Stack Developer",
    "Data Scientist",
    "Product Manager",
    "UX Designer",
    "DevOps Engineer",
];

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Please select or enter a role")]
    MissingRole,

    #[error("Please upload your résumé")]
    MissingResume,

    #[error("Description is too short ({chars} characters, need more than 20)")]
    DescriptionTooShort { chars: usize },

    #[error("Custom role text requires the custom role option")]
    CustomRoleNotSelected,

    #[error("Résumé must be a PDF: {file_name}")]
    NotPdf { file_name: String },

    #[error("A request is already in flight")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleSelection {
    #[default]
    Unset,
    Preset(String),
    /// `None` until the user types a non-empty custom role.
    Custom(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMethod {
    #[default]
    Resume,
    Description,
}

/// Stage-one form state: role, input method and the per-method inputs.
#[derive(Debug, Default)]
pub struct FormController {
    role: RoleSelection,
    method: InputMethod,
    resume: Option<ResumeFile>,
    description: String,
    submitting: bool,
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors the role `<select>`: `""` unsets, `"custom"` opens the free-text role.
    pub fn select_role(&mut self, value: &str) {
        match value.trim() {
            "" => self.role = RoleSelection::Unset,
            CUSTOM_ROLE => self.select_custom(),
            preset => self.select_preset(preset),
        }
    }

    pub fn select_preset(&mut self, role: &str) {
        debug!(role, "preset role selected");
        self.role = RoleSelection::Preset(role.trim().to_string());
    }

    /// Clears any preset role until custom text is entered.
    pub fn select_custom(&mut self) {
        self.role = RoleSelection::Custom(None);
    }

    pub fn set_custom_role(&mut self, text: &str) -> Result<(), FormError> {
        let RoleSelection::Custom(custom) = &mut self.role else {
            return Err(FormError::CustomRoleNotSelected);
        };
        let trimmed = text.trim();
        *custom = (!trimmed.is_empty()).then(|| trimmed.to_string());
        Ok(())
    }

    pub fn role_selection(&self) -> &RoleSelection {
        &self.role
    }

    pub fn selected_role(&self) -> Option<&str> {
        match &self.role {
            RoleSelection::Unset | RoleSelection::Custom(None) => None,
            RoleSelection::Preset(role) | RoleSelection::Custom(Some(role)) => {
                Some(role.as_str()).filter(|r| !r.is_empty())
            }
        }
    }

    /// Inputs of the inactive method are kept.
    pub fn use_resume(&mut self) {
        self.method = InputMethod::Resume;
    }

    pub fn use_description(&mut self) {
        self.method = InputMethod::Description;
    }

    pub fn input_method(&self) -> InputMethod {
        self.method
    }

    /// File picker path: the picker already filters on `.pdf`.
    pub fn attach_resume(&mut self, file: ResumeFile) {
        debug!(file_name = %file.file_name, "résumé attached");
        self.resume = Some(file);
    }

    /// Drag-and-drop path. Non-PDF drops are ignored; returns whether the file was taken.
    pub fn drop_resume(&mut self, file: ResumeFile) -> bool {
        if !file.is_pdf() {
            debug!(file_name = %file.file_name, content_type = %file.content_type, "ignored non-PDF drop");
            return false;
        }
        self.attach_resume(file);
        true
    }

    pub fn remove_resume(&mut self) {
        self.resume = None;
    }

    pub fn resume(&self) -> Option<&ResumeFile> {
        self.resume.as_ref()
    }

    pub fn set_description(&mut self, text: impl Into<String>) {
        self.description = text.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn trimmed_description_chars(&self) -> usize {
        self.description.trim().chars().count()
    }

    /// Whether the inputs are complete, ignoring the busy flag.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting && self.is_valid()
    }

    fn validate(&self) -> Result<&str, FormError> {
        let role = self.selected_role().ok_or(FormError::MissingRole)?;
        match self.method {
            InputMethod::Resume if self.resume.is_none() => Err(FormError::MissingResume),
            InputMethod::Description if self.trimmed_description_chars() <= MIN_DESCRIPTION_CHARS => {
                Err(FormError::DescriptionTooShort {
                    chars: self.trimmed_description_chars(),
                })
            }
            _ => Ok(role),
        }
    }

    /// Builds the question-generation payload for the active method only.
    pub fn submit_request(&self) -> Result<SessionContext, FormError> {
        let role = self.validate()?;
        let source = match self.method {
            InputMethod::Resume => match &self.resume {
                Some(file) => ContextSource::ResumeFile(file.clone()),
                None => return Err(FormError::MissingResume),
            },
            InputMethod::Description => {
                ContextSource::Description(self.description.trim().to_string())
            }
        };
        Ok(SessionContext::new(role, source))
    }

    /// Validates and marks the form busy. Submission stays disabled until `finish_submit`.
    pub fn begin_submit(&mut self) -> Result<SessionContext, FormError> {
        if self.submitting {
            return Err(FormError::Busy);
        }
        let request = self.submit_request()?;
        self.submitting = true;
        Ok(request)
    }

    /// On failure the submit control becomes available again; on success it stays disabled.
    pub fn finish_submit(&mut self, succeeded: bool) {
        if !succeeded {
            self.submitting = false;
        }
    }

    /// Requests questions for the current inputs and hands back the session for recording.
    pub async fn submit(&mut self, api: &ApiClient) -> Result<InterviewSession, CoachError> {
        let context = self.begin_submit()?;
        match api.generate_questions(&context).await {
            Ok(questions) => {
                self.finish_submit(true);
                Ok(InterviewSession::new(context, questions))
            }
            Err(e) => {
                warn!(error = %e, "question generation failed");
                self.finish_submit(false);
                Err(CoachError::Questions(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::{
        api::mock_server::{MockServer, Reply, questions_body},
        render,
        session::PDF_MIME,
    };

    fn pdf() -> ResumeFile {
        ResumeFile::new("cv.pdf", PDF_MIME, vec![0x25, 0x50, 0x44, 0x46])
    }

    #[test]
    fn empty_form_cannot_submit() {
        let form = FormController::new();
        assert!(!form.can_submit());
        assert!(matches!(form.submit_request(), Err(FormError::MissingRole)));
    }

    #[test]
    fn resume_mode_requires_file() {
        let mut form = FormController::new();
        form.select_preset("Backend Engineer");
        assert!(!form.can_submit());

        form.attach_resume(pdf());
        assert!(form.can_submit());

        form.remove_resume();
        assert!(!form.can_submit());
    }

    #[test]
    fn description_needs_more_than_twenty_trimmed_chars() {
        let mut form = FormController::new();
        form.select_preset("Backend Engineer");
        form.use_description();

        form.set_description("   exactly twenty chars   ");
        assert_eq!(form.description().trim().chars().count(), 20);
        assert!(!form.can_submit());

        form.set_description("twenty-one characters");
        assert!(form.can_submit());
    }

    #[test]
    fn custom_role_clears_preset_until_typed() {
        let mut form = FormController::new();
        form.use_description();
        form.set_description("Built payment systems in Rust for years");
        form.select_role("Data Scientist");
        assert!(form.can_submit());

        form.select_role(CUSTOM_ROLE);
        assert_eq!(form.selected_role(), None);
        assert!(!form.can_submit());

        form.set_custom_role("   ").unwrap();
        assert_eq!(form.selected_role(), None);

        form.set_custom_role("  Staff Platform Engineer ").unwrap();
        assert_eq!(form.selected_role(), Some("Staff Platform Engineer"));
        assert!(form.can_submit());
    }

    #[test]
    fn custom_text_without_custom_option_is_rejected() {
        let mut form = FormController::new();
        form.select_preset("UX Designer");
        assert!(matches!(
            form.set_custom_role("Researcher"),
            Err(FormError::CustomRoleNotSelected)
        ));
        assert_eq!(form.selected_role(), Some("UX Designer"));
    }

    #[test]
    fn toggling_method_keeps_inactive_inputs() {
        let mut form = FormController::new();
        form.select_preset("Backend Engineer");
        form.attach_resume(pdf());
        form.use_description();
        form.set_description("Short");
        assert!(!form.can_submit());

        form.use_resume();
        assert!(form.resume().is_some());
        assert!(form.can_submit());

        form.use_description();
        assert_eq!(form.description(), "Short");
    }

    #[test]
    fn request_carries_only_the_active_source() {
        let mut form = FormController::new();
        form.select_preset("Backend Engineer");
        form.attach_resume(pdf());
        form.use_description();
        form.set_description("  I design resilient APIs daily  ");

        let request = form.submit_request().unwrap();
        assert_eq!(request.role, "Backend Engineer");
        assert_eq!(
            request.source,
            ContextSource::Description("I design resilient APIs daily".into())
        );

        form.use_resume();
        let request = form.submit_request().unwrap();
        assert!(matches!(request.source, ContextSource::ResumeFile(ref f) if f.file_name == "cv.pdf"));
    }

    #[test]
    fn dropped_non_pdf_is_ignored() {
        let mut form = FormController::new();
        let taken = form.drop_resume(ResumeFile::new("cv.docx", "application/msword", vec![1u8]));
        assert!(!taken);
        assert!(form.resume().is_none());
        assert!(form.drop_resume(pdf()));
    }

    #[tokio::test]
    async fn backend_engineer_scenario_hands_questions_to_recording() {
        let server = MockServer::start(Reply::ok(questions_body(&[
            "Tell me about a service you scaled.",
            "How do you design idempotent APIs?",
            "Describe a production incident you led.",
        ])))
        .await;
        let api = ApiClient::new(&server.base_url);

        let mut form = FormController::new();
        form.select_role("Backend Engineer");
        form.use_description();
        form.set_description("I build Rust web services");
        assert_eq!(form.description().trim().chars().count(), 25);
        assert!(form.can_submit());

        let session = form.submit(&api).await.unwrap();
        assert_eq!(session.role(), "Backend Engineer");
        assert_eq!(session.questions.len(), 3);

        let html = render::questions_list(&session.questions);
        for n in 1..=3 {
            assert!(html.contains(&format!("<strong>Question {n}:</strong>")));
        }
        assert!(!html.contains("Question 4"));
        assert!(!form.can_submit());
    }

    #[tokio::test]
    async fn api_failure_surfaces_detail_and_reenables() {
        let server = MockServer::start(Reply::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"detail": "Model overloaded"}),
        ))
        .await;
        let api = ApiClient::new(&server.base_url);

        let mut form = FormController::new();
        form.select_preset("Backend Engineer");
        form.attach_resume(pdf());

        let err = form.submit(&api).await.unwrap_err();
        assert_eq!(err.to_string(), "Error generating questions: Model overloaded");
        assert!(form.can_submit());
    }

    #[test]
    fn failed_submit_reenables_form() {
        let mut form = FormController::new();
        form.select_preset("Backend Engineer");
        form.attach_resume(pdf());

        form.begin_submit().unwrap();
        assert!(!form.can_submit());
        assert!(matches!(form.begin_submit(), Err(FormError::Busy)));

        form.finish_submit(false);
        assert!(form.can_submit());
    }
}

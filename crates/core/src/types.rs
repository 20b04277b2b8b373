use std::{ops::Deref, sync::Arc};

use serde::{Deserialize, Serialize};

/// Ordered, immutable set of interview questions. Cloning shares the list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestionSet(Arc<[String]>);

impl QuestionSet {
    pub fn new(questions: Vec<String>) -> Self {
        Self(questions.into())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// JSON array form used by the analysis endpoint.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.0)
    }
}

impl Deref for QuestionSet {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<String>> for QuestionSet {
    fn from(questions: Vec<String>) -> Self {
        Self::new(questions)
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuestionsResponse {
    pub questions: Vec<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub context_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeVideoResponse {
    pub feedback: FeedbackResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub overall_score: f64,
    pub content_feedback: CategoryFeedback,
    pub verbal_feedback: CategoryFeedback,
    pub nonverbal_feedback: CategoryFeedback,
    #[serde(default)]
    pub actionable_tips: Vec<String>,
    #[serde(default)]
    pub similar_roles: Option<Vec<SimilarRole>>,
}

impl FeedbackResult {
    /// The three scored categories in display order, with their titles.
    pub fn categories(&self) -> [(&'static str, &CategoryFeedback); 3] {
        [
            ("Content Quality", &self.content_feedback),
            ("Verbal Delivery", &self.verbal_feedback),
            ("Non-Verbal Communication", &self.nonverbal_feedback),
        ]
    }

    /// Similar roles, only when the service returned at least one.
    pub fn similar_roles(&self) -> Option<&[SimilarRole]> {
        self.similar_roles
            .as_deref()
            .filter(|roles| !roles.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFeedback {
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarRole {
    pub title: String,
    pub reason: String,
}

/// Formats a score without a trailing `.0` for whole numbers.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{:.1}", score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_without_similar_roles_parses() {
        let json = r#"{
            "overall_score": 78,
            "content_feedback": {"score": 80, "strengths": ["clear"], "improvements": []},
            "verbal_feedback": {"score": 75, "strengths": [], "improvements": ["pace"]},
            "nonverbal_feedback": {"score": 70, "strengths": [], "improvements": []},
            "actionable_tips": ["breathe"]
        }"#;
        let feedback: FeedbackResult = serde_json::from_str(json).unwrap();
        assert_eq!(feedback.overall_score, 78.0);
        assert!(feedback.similar_roles().is_none());
        assert_eq!(feedback.categories()[1].0, "Verbal Delivery");
    }

    #[test]
    fn empty_similar_roles_are_hidden() {
        let json = r#"{
            "overall_score": 50,
            "content_feedback": {"score": 1},
            "verbal_feedback": {"score": 2},
            "nonverbal_feedback": {"score": 3},
            "actionable_tips": [],
            "similar_roles": []
        }"#;
        let feedback: FeedbackResult = serde_json::from_str(json).unwrap();
        assert!(feedback.similar_roles().is_none());
    }

    #[test]
    fn question_set_serializes_as_array() {
        let set = QuestionSet::new(vec!["Why Rust?".into(), "Tell me about \"it\"".into()]);
        assert_eq!(set.to_json().unwrap(), r#"["Why Rust?","Tell me about \"it\""]"#);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn scores_drop_trailing_zero() {
        assert_eq!(format_score(85.0), "85");
        assert_eq!(format_score(72.5), "72.5");
    }
}

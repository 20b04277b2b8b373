//! HTML fragments for the questions and feedback views.
//!
//! Every piece of service-provided text goes through [`escape_html`].

use crate::{
    session::InterviewSession,
    types::{CategoryFeedback, FeedbackResult, SimilarRole, format_score},
};

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn list_items(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect()
}

/// Generated questions, labelled `Question 1:` onwards.
pub fn questions_list(questions: &[String]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            format!(
                "<div class=\"question-item\"><strong>Question {}:</strong> {}</div>\n",
                i + 1,
                escape_html(q)
            )
        })
        .collect()
}

/// Reference list shown next to the recorder.
pub fn questions_for_recording(questions: &[String]) -> String {
    let mut html = String::from("<h4>Answer these questions:</h4>\n");
    for (i, q) in questions.iter().enumerate() {
        html.push_str(&format!(
            "<p><strong>{}.</strong> {}</p>\n",
            i + 1,
            escape_html(q)
        ));
    }
    html
}

pub fn feedback_card(title: &str, feedback: &CategoryFeedback) -> String {
    format!(
        "<div class=\"feedback-card\">\n\
         <h4>{title}</h4>\n\
         <div class=\"score-badge\">{score}/100</div>\n\
         <div class=\"strengths\">\n<strong>✅ Strengths:</strong>\n<ul>{strengths}</ul>\n</div>\n\
         <div class=\"improvements\">\n<strong>🔧 Areas to Improve:</strong>\n<ul>{improvements}</ul>\n</div>\n\
         </div>\n",
        title = escape_html(title),
        score = format_score(feedback.score),
        strengths = list_items(&feedback.strengths),
        improvements = list_items(&feedback.improvements),
    )
}

pub fn actionable_tips(tips: &[String]) -> String {
    format!(
        "<div class=\"actionable-tips\">\n<h4>🎯 Actionable Tips</h4>\n<ul>{}</ul>\n</div>\n",
        list_items(tips)
    )
}

pub fn similar_roles(roles: &[SimilarRole]) -> String {
    let mut html = String::from("<div class=\"similar-roles\">\n<div class=\"roles-list\">\n");
    for (i, role) in roles.iter().enumerate() {
        html.push_str(&format!(
            "<div class=\"role-card\"><div class=\"role-number\">{}</div>\
             <div class=\"role-content\"><h5>{}</h5><p>{}</p></div></div>\n",
            i + 1,
            escape_html(&role.title),
            escape_html(&role.reason)
        ));
    }
    html.push_str("</div>\n</div>\n");
    html
}

/// Overall score, the three category cards, tips, and similar roles when present.
pub fn feedback(feedback: &FeedbackResult) -> String {
    let mut html = format!(
        "<div class=\"overall-score\">{}</div>\n",
        format_score(feedback.overall_score)
    );
    for (title, category) in feedback.categories() {
        html.push_str(&feedback_card(title, category));
    }
    html.push_str(&actionable_tips(&feedback.actionable_tips));
    if let Some(roles) = feedback.similar_roles() {
        html.push_str(&similar_roles(roles));
    }
    html
}

/// Standalone page with the session's questions and the feedback.
pub fn report_page(session: &InterviewSession, result: &FeedbackResult) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Interview feedback: {role}</title>\n</head>\n<body>\n\
         <h2>Interview feedback: {role}</h2>\n\
         <section class=\"questions-display\">\n{questions}</section>\n\
         <section class=\"feedback-container\">\n{feedback}</section>\n\
         </body>\n</html>\n",
        role = escape_html(session.role()),
        questions = questions_for_recording(&session.questions),
        feedback = feedback(result),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::{ContextSource, SessionContext},
        types::QuestionSet,
    };

    fn category(score: f64) -> CategoryFeedback {
        CategoryFeedback {
            score,
            strengths: vec!["Clear structure".into()],
            improvements: vec!["Use <numbers>".into()],
        }
    }

    fn result(similar: Option<Vec<SimilarRole>>) -> FeedbackResult {
        FeedbackResult {
            overall_score: 81.0,
            content_feedback: category(85.0),
            verbal_feedback: category(77.5),
            nonverbal_feedback: category(80.0),
            actionable_tips: vec!["Practice the STAR method".into()],
            similar_roles: similar,
        }
    }

    #[test]
    fn questions_are_numbered_and_escaped() {
        let html = questions_list(&["Why <script>?".to_string(), "Second".to_string()]);
        assert!(html.contains("<strong>Question 1:</strong> Why &lt;script&gt;?"));
        assert!(html.contains("<strong>Question 2:</strong> Second"));
    }

    #[test]
    fn recording_reference_uses_short_labels() {
        let html = questions_for_recording(&["First".to_string()]);
        assert!(html.starts_with("<h4>Answer these questions:</h4>"));
        assert!(html.contains("<p><strong>1.</strong> First</p>"));
    }

    #[test]
    fn reference_list_has_one_line_per_question() {
        let html = questions_for_recording(&["First".to_string(), "A & B".to_string()]);
        assert_eq!(
            html,
            "<h4>Answer these questions:</h4>\n\
             <p><strong>1.</strong> First</p>\n\
             <p><strong>2.</strong> A &amp; B</p>\n"
        );
    }

    #[test]
    fn feedback_renders_all_categories() {
        let html = feedback(&result(None));
        assert!(html.contains("<div class=\"overall-score\">81</div>"));
        for title in ["Content Quality", "Verbal Delivery", "Non-Verbal Communication"] {
            assert!(html.contains(&format!("<h4>{title}</h4>")));
        }
        assert!(html.contains("77.5/100"));
        assert!(html.contains("<li>Use &lt;numbers&gt;</li>"));
        assert!(html.contains("<li>Practice the STAR method</li>"));
        assert!(!html.contains("role-card"));
    }

    #[test]
    fn similar_roles_are_numbered_cards() {
        let roles = vec![
            SimilarRole {
                title: "SRE".into(),
                reason: "Ops depth".into(),
            },
            SimilarRole {
                title: "Platform Engineer".into(),
                reason: "Systems & tooling".into(),
            },
        ];
        let html = feedback(&result(Some(roles)));
        assert!(html.contains("<div class=\"role-number\">2</div>"));
        assert!(html.contains("<h5>Platform Engineer</h5><p>Systems &amp; tooling</p>"));
    }

    #[test]
    fn report_page_embeds_session() {
        let session = InterviewSession::new(
            SessionContext::new(
                "Backend \"Core\" Engineer",
                ContextSource::Description("twenty-plus characters here".into()),
            ),
            QuestionSet::new(vec!["Q?".into()]),
        );
        let page = report_page(&session, &result(None));
        assert!(page.contains("<title>Interview feedback: Backend &quot;Core&quot; Engineer</title>"));
        assert!(page.contains("<strong>1.</strong> Q?"));
        assert!(page.trim_end().ends_with("</html>"));
    }
}

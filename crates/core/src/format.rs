use crate::types::{CategoryFeedback, FeedbackResult, format_score};

/// Format elapsed recording seconds as M:SS
pub fn format_elapsed(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Numbered questions for the terminal
pub fn format_questions(questions: &[String]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("Question {}: {}", i + 1, q.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_category(output: &mut String, title: &str, feedback: &CategoryFeedback) {
    output.push_str(&format!(
        "### {} ({}/100)\n\n",
        title,
        format_score(feedback.score)
    ));
    output.push_str("Strengths:\n");
    for strength in &feedback.strengths {
        output.push_str(&format!("• {}\n", strength));
    }
    output.push_str("Areas to improve:\n");
    for improvement in &feedback.improvements {
        output.push_str(&format!("• {}\n", improvement));
    }
    output.push('\n');
}

pub fn format_feedback_readable(feedback: &FeedbackResult) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "# Overall score: {}/100\n\n",
        format_score(feedback.overall_score)
    ));

    for (title, category) in feedback.categories() {
        push_category(&mut output, title, category);
    }

    output.push_str("## Actionable tips\n\n");
    for tip in &feedback.actionable_tips {
        output.push_str(&format!("• {}\n", tip));
    }
    output.push('\n');

    if let Some(roles) = feedback.similar_roles() {
        output.push_str("## Similar roles\n\n");
        for (i, role) in roles.iter().enumerate() {
            output.push_str(&format!("{}. {}: {}\n", i + 1, role.title, role.reason));
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SimilarRole;

    #[test]
    fn elapsed_pads_seconds() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(65), "1:05");
        assert_eq!(format_elapsed(120), "2:00");
    }

    #[test]
    fn questions_are_numbered() {
        let text = format_questions(&["  Why Rust? ".to_string(), "Why now?".to_string()]);
        assert_eq!(text, "Question 1: Why Rust?\nQuestion 2: Why now?");
    }

    #[test]
    fn readable_feedback_lists_everything() {
        let category = CategoryFeedback {
            score: 70.0,
            strengths: vec!["Structured".into()],
            improvements: vec!["Slow down".into()],
        };
        let feedback = FeedbackResult {
            overall_score: 72.0,
            content_feedback: category.clone(),
            verbal_feedback: category.clone(),
            nonverbal_feedback: category,
            actionable_tips: vec!["Smile".into()],
            similar_roles: Some(vec![SimilarRole {
                title: "Tech Lead".into(),
                reason: "Leads incidents".into(),
            }]),
        };
        let text = format_feedback_readable(&feedback);
        assert!(text.starts_with("# Overall score: 72/100"));
        assert!(text.contains("### Non-Verbal Communication (70/100)"));
        assert!(text.contains("• Smile"));
        assert!(text.contains("1. Tech Lead: Leads incidents"));
    }
}

//! Keyword-based question answering over the profile.
//!
//! Questions are matched against an ordered list of rules. The first rule
//! whose keywords occur in the (lowercased) question produces the answer;
//! when none match, [`DEFAULT_ANSWER`] is returned. Rule order is part of the
//! contract: a question mentioning both "last position" and "skills" is a
//! last-position question.

use cv_mcp_types::Profile;

/// Answer given when no rule matches.
pub const DEFAULT_ANSWER: &str = "I can answer about your last position, skills, and experience. Try asking 'What role did I have at my last position?'";

/// What a question was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    LastPosition,
    Skills,
    Experience,
    Fallback,
}

/// One classification rule.
pub struct AnswerRule {
    pub topic: Topic,
    /// Any of these substrings selects the rule.
    pub keywords: &'static [&'static str],
    render: fn(&Profile) -> String,
}

impl AnswerRule {
    /// Whether the rule applies to an already lowercased question.
    pub fn matches(&self, question: &str) -> bool {
        self.keywords.iter().any(|k| question.contains(k))
    }
}

/// Rules in evaluation order.
pub const RULES: &[AnswerRule] = &[
    AnswerRule {
        topic: Topic::LastPosition,
        keywords: &["last position", "most recent role", "current role"],
        render: render_last_position,
    },
    AnswerRule {
        topic: Topic::Skills,
        keywords: &["skills"],
        render: render_skills,
    },
    AnswerRule {
        topic: Topic::Experience,
        keywords: &["experience", "work history"],
        render: render_experience,
    },
];

/// A generated answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub topic: Topic,
    pub text: String,
}

/// First rule in [`RULES`] that applies to `question`.
fn rule_for(question: &str) -> Option<&'static AnswerRule> {
    let q = question.to_lowercase();
    RULES.iter().find(|rule| rule.matches(&q))
}

/// Classify a question without rendering an answer.
pub fn classify(question: &str) -> Topic {
    rule_for(question).map_or(Topic::Fallback, |rule| rule.topic)
}

/// Answer a question about `profile`.
pub fn answer(profile: &Profile, question: &str) -> Answer {
    match rule_for(question) {
        Some(rule) => Answer {
            topic: rule.topic,
            text: (rule.render)(profile),
        },
        None => Answer {
            topic: Topic::Fallback,
            text: DEFAULT_ANSWER.to_string(),
        },
    }
}

fn render_last_position(profile: &Profile) -> String {
    match profile.last_position() {
        Some(last) => format!(
            "Your last position was {} at {} ({}).",
            last.role, last.company, last.period
        ),
        None => "No positions are recorded in the profile.".to_string(),
    }
}

fn render_skills(profile: &Profile) -> String {
    format!("Skills: {}.", profile.skills.join(", "))
}

fn render_experience(profile: &Profile) -> String {
    profile
        .experience
        .iter()
        .map(|e| format!("{} @ {} ({})", e.role, e.company, e.period))
        .collect::<Vec<_>>()
        .join(" | ")
}

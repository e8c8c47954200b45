//! Free-text comment interpretation
//!
//! Operators type comments such as `"PRE dr 1234"` or `"post, pt 0412-07"` into the
//! device app. This module extracts the measurement phase, the recorded role and the
//! subject id with case-insensitive whole-word matches.
//!
//! Conflicting tokens (`pre` and `post`, or `dr` and `pt`) leave the field empty and
//! log a warning. Interpretation is pure: the same comment always yields the same result.

use crate::models::{InterpretedComment, Phase, Role};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PRE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpre\b").expect("valid regex"));
static POST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpost\b").expect("valid regex"));
static DOCTOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdr\b").expect("valid regex"));
static PATIENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpt\b").expect("valid regex"));
static HYPHENATED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3,4}-\d{2,3}\b").expect("valid regex"));
static BARE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3,4}\b").expect("valid regex"));

/// Which subject-id pattern wins when both match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectIdPrecedence {
    /// A bare 3-4 digit token wins over `NNNN-NN`
    #[default]
    BareDigits,
    /// `NNNN-NN` wins; the bare token is used only when no hyphenated id is present
    Hyphenated,
}

/// Comment interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentInterpreter {
    precedence: SubjectIdPrecedence,
}

impl CommentInterpreter {
    pub fn new(precedence: SubjectIdPrecedence) -> Self {
        Self { precedence }
    }

    /// Extract phase, role and subject id from a comment
    pub fn interpret(&self, comment: Option<&str>) -> InterpretedComment {
        let Some(text) = comment else {
            return InterpretedComment::default();
        };

        InterpretedComment {
            phase: Self::phase(text),
            role: Self::role(text),
            subject_id: self.subject_id(text),
        }
    }

    fn phase(text: &str) -> Phase {
        match (PRE.is_match(text), POST.is_match(text)) {
            (true, true) => {
                tracing::warn!("Comment '{}' mentions both pre and post, phase left empty", text);
                Phase::None
            }
            (true, false) => Phase::Pre,
            (false, true) => Phase::Post,
            (false, false) => Phase::None,
        }
    }

    fn role(text: &str) -> Role {
        match (DOCTOR.is_match(text), PATIENT.is_match(text)) {
            (true, true) => {
                tracing::warn!("Comment '{}' mentions both dr and pt, role left empty", text);
                Role::None
            }
            (true, false) => Role::Doctor,
            (false, true) => Role::Patient,
            (false, false) => Role::None,
        }
    }

    fn subject_id(&self, text: &str) -> String {
        let hyphenated = HYPHENATED_ID.find(text).map(|m| m.as_str());
        let bare = BARE_ID.find(text).map(|m| m.as_str());

        let chosen = match self.precedence {
            SubjectIdPrecedence::BareDigits => bare.or(hyphenated),
            SubjectIdPrecedence::Hyphenated => hyphenated.or(bare),
        };

        chosen.unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(comment: &str) -> InterpretedComment {
        CommentInterpreter::default().interpret(Some(comment))
    }

    #[test]
    fn test_absent_comment_yields_empty_fields() {
        let result = CommentInterpreter::default().interpret(None);
        assert_eq!(result.phase, Phase::None);
        assert_eq!(result.role, Role::None);
        assert_eq!(result.subject_id, "");
    }

    #[test]
    fn test_patient_with_bare_id() {
        let result = interpret("PT visit, folder 1234");
        assert_eq!(result.role, Role::Patient);
        assert_eq!(result.subject_id, "1234");
        assert_eq!(result.phase, Phase::None);
    }

    #[test]
    fn test_phase_conflict_leaves_phase_empty() {
        assert_eq!(interpret("pre and post").phase, Phase::None);
        assert_eq!(interpret("Pre-op").phase, Phase::Pre);
        assert_eq!(interpret("POST").phase, Phase::Post);
    }

    #[test]
    fn test_role_conflict_leaves_role_empty() {
        assert_eq!(interpret("dr with pt").role, Role::None);
        assert_eq!(interpret("Dr. Smith").role, Role::Doctor);
    }

    #[test]
    fn test_whole_words_only() {
        let result = interpret("prescription postponed by drone, ptolemy 12345");
        assert_eq!(result.phase, Phase::None);
        assert_eq!(result.role, Role::None);
        assert_eq!(result.subject_id, "");
    }

    #[test]
    fn test_bare_digits_win_by_default() {
        assert_eq!(interpret("pt 1234-56").subject_id, "1234");
        assert_eq!(interpret("pt 0412-567 room 88").subject_id, "0412");
    }

    #[test]
    fn test_hyphenated_precedence() {
        let interpreter = CommentInterpreter::new(SubjectIdPrecedence::Hyphenated);
        assert_eq!(
            interpreter.interpret(Some("pt 1234-56")).subject_id,
            "1234-56"
        );
        assert_eq!(interpreter.interpret(Some("pt 987")).subject_id, "987");
    }

    #[test]
    fn test_interpretation_is_pure() {
        let interpreter = CommentInterpreter::default();
        let comment = Some("post dr 4411 pre");
        assert_eq!(interpreter.interpret(comment), interpreter.interpret(comment));
    }
}

use serde::{Deserialize, Serialize};

pub type QuestionId = i64;
pub type CategoryId = i64;

/// One question as recovered from an imported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    pub categories: Vec<String>,
    pub answers: Vec<RecordAnswer>,
}

impl QuestionRecord {
    /// Multiple choice iff more than one answer was given.
    pub fn is_multiple_choice(&self) -> bool {
        self.answers.len() > 1
    }

    pub fn correct_answers(&self) -> usize {
        self.answers.iter().filter(|a| a.correct).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAnswer {
    pub content: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Key used for every category lookup.
pub fn category_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A question eligible under one specific requested category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub question_id: QuestionId,
    pub question: String,
    pub is_multiple_choice: bool,
    pub category_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRow {
    pub question_id: QuestionId,
    pub content: String,
    pub correct: bool,
}

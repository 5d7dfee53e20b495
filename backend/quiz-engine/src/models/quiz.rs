use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::question::{category_key, AnswerRow, CandidateRow, QuestionId};

/// An assembled quiz. Serializes as the bare JSON array stored in drafts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quiz {
    pub categories: Vec<QuizCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizCategory {
    pub category: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub question: String,
    #[serde(rename = "multipleChoice")]
    pub multiple_choice: bool,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub content: String,
    pub correct: bool,
}

impl From<AnswerRow> for QuizAnswer {
    fn from(row: AnswerRow) -> Self {
        Self {
            content: row.content,
            correct: row.correct,
        }
    }
}

impl QuizQuestion {
    pub fn from_candidate(row: CandidateRow, answers: Vec<QuizAnswer>) -> Self {
        Self {
            id: row.question_id,
            question: row.question,
            multiple_choice: row.is_multiple_choice,
            answers,
        }
    }
}

impl Quiz {
    pub fn new(categories: Vec<QuizCategory>) -> Self {
        Self { categories }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Every question id present anywhere in the quiz.
    pub fn question_ids(&self) -> HashSet<QuestionId> {
        self.categories
            .iter()
            .flat_map(|c| c.questions.iter().map(|q| q.id))
            .collect()
    }

    pub fn question_count(&self) -> usize {
        self.categories.iter().map(|c| c.questions.len()).sum()
    }

    pub fn category_index(&self, name: &str) -> Option<usize> {
        let key = category_key(name);
        self.categories
            .iter()
            .position(|c| category_key(&c.category) == key)
    }

    pub fn category(&self, name: &str) -> Option<&QuizCategory> {
        self.category_index(name).map(|idx| &self.categories[idx])
    }
}

impl QuizCategory {
    pub fn empty(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            questions: Vec::new(),
        }
    }

    pub fn position_of(&self, question_id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id == question_id)
    }
}

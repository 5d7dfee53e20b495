use std::sync::Arc;
use std::time::Duration;

use super::question_store::{timed_store_call, QuestionStore};
use super::sampler::group_answers;
use crate::error::{QuizError, QuizResult};
use crate::metrics::QUESTIONS_REPLACED_TOTAL;
use crate::models::{QuestionId, Quiz, QuizQuestion};

/// Swaps a single question of an assembled quiz for an unused one.
pub struct ReplacementEngine {
    store: Arc<dyn QuestionStore>,
    store_timeout: Duration,
}

impl ReplacementEngine {
    pub fn new(store: Arc<dyn QuestionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Returns a new quiz where `question_id` under `category` is replaced,
    /// at the same position, by a question of that category that appears
    /// nowhere in the quiz. Without such a question it is simply removed.
    pub async fn replace(
        &self,
        quiz: &Quiz,
        category: &str,
        question_id: QuestionId,
    ) -> QuizResult<Quiz> {
        let not_found = || {
            QUESTIONS_REPLACED_TOTAL
                .with_label_values(&["not_found"])
                .inc();
            QuizError::NotFound {
                category: category.to_string(),
                question_id,
            }
        };

        let category_idx = quiz.category_index(category).ok_or_else(not_found)?;
        let target = &quiz.categories[category_idx];
        let position = target.position_of(question_id).ok_or_else(not_found)?;

        let in_use = quiz.question_ids();
        let lookup = vec![target.category.clone()];
        let candidate = timed_store_call(
            "find_candidates",
            self.store_timeout,
            self.store.find_candidates(&lookup, &in_use),
        )
        .await?
        .into_iter()
        .find(|row| !in_use.contains(&row.question_id));

        let replacement = match candidate {
            Some(row) => {
                let answers = timed_store_call(
                    "fetch_answers",
                    self.store_timeout,
                    self.store.fetch_answers(&[row.question_id]),
                )
                .await?;
                let answers = group_answers(answers)
                    .remove(&row.question_id)
                    .unwrap_or_default();
                Some(QuizQuestion::from_candidate(row, answers))
            }
            None => None,
        };

        let mut updated = quiz.clone();
        let questions = &mut updated.categories[category_idx].questions;
        match replacement {
            Some(question) => {
                tracing::info!(
                    "Replaced question {} with {} in category '{}' at position {}",
                    question_id,
                    question.id,
                    target.category,
                    position
                );
                questions[position] = question;
                QUESTIONS_REPLACED_TOTAL
                    .with_label_values(&["replaced"])
                    .inc();
            }
            None => {
                tracing::warn!(
                    "No unused question left in category '{}', removing question {}",
                    target.category,
                    question_id
                );
                questions.remove(position);
                QUESTIONS_REPLACED_TOTAL
                    .with_label_values(&["removed"])
                    .inc();
            }
        }

        Ok(updated)
    }
}

use std::sync::Arc;

use super::draft_store::{DraftKey, DraftStore};
use super::replacement::ReplacementEngine;
use super::sampler::StratifiedSampler;
use crate::error::QuizResult;
use crate::models::{QuestionId, Quiz};

/// A sampled quiz together with the key it was saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub key: DraftKey,
    pub quiz: Quiz,
}

/// Creates quiz drafts and edits them in place.
pub struct QuizDraftService {
    sampler: StratifiedSampler,
    replacement: ReplacementEngine,
    drafts: Arc<dyn DraftStore>,
}

impl QuizDraftService {
    pub fn new(
        sampler: StratifiedSampler,
        replacement: ReplacementEngine,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            sampler,
            replacement,
            drafts,
        }
    }

    pub async fn create_draft(&self, categories: &[String], per_category: u32) -> QuizResult<Draft> {
        let quiz = self.sampler.sample(categories, per_category).await?;
        let key = DraftKey::generate();
        self.drafts.put(&key, &quiz).await?;

        tracing::info!(
            "Created draft {} with {} questions across {} categories",
            key,
            quiz.question_count(),
            quiz.categories.len()
        );
        Ok(Draft { key, quiz })
    }

    pub async fn load_draft(&self, key: &DraftKey) -> QuizResult<Quiz> {
        self.drafts.get(key).await
    }

    /// Replaces one question of a stored draft and saves the result under
    /// the same key. A failed replacement leaves the stored draft as it was.
    pub async fn replace_in_draft(
        &self,
        key: &DraftKey,
        category: &str,
        question_id: QuestionId,
    ) -> QuizResult<Quiz> {
        let current = self.drafts.get(key).await?;
        let updated = self
            .replacement
            .replace(&current, category, question_id)
            .await?;
        self.drafts.put(key, &updated).await?;
        Ok(updated)
    }
}

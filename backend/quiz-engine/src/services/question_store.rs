use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{QuizError, QuizResult};
use crate::metrics::{STORE_OPERATIONS_TOTAL, STORE_OPERATION_DURATION_SECONDS};
use crate::models::{AnswerRow, CandidateRow, Category, CategoryId, QuestionId};

/// Read side of the question bank plus the entry point for ingestion writes.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Questions linked to any of `category_names` and not in `exclude`.
    /// A question linked to two requested categories yields one row per
    /// category. Row order is unspecified.
    async fn find_candidates(
        &self,
        category_names: &[String],
        exclude: &HashSet<QuestionId>,
    ) -> QuizResult<Vec<CandidateRow>>;

    /// Answers of the given questions, in stored display order per question.
    async fn fetch_answers(&self, question_ids: &[QuestionId]) -> QuizResult<Vec<AnswerRow>>;

    async fn list_categories(&self) -> QuizResult<Vec<Category>>;

    async fn begin_ingest(&self) -> QuizResult<Box<dyn IngestTransaction + '_>>;
}

/// All writes of one source document. Nothing is visible to readers until
/// `commit`; dropping the transaction without committing discards it.
#[async_trait]
pub trait IngestTransaction: Send {
    async fn insert_question(
        &mut self,
        content: &str,
        is_multiple_choice: bool,
    ) -> QuizResult<QuestionId>;

    async fn find_or_create_category(&mut self, name: &str) -> QuizResult<CategoryId>;

    async fn link_question_category(
        &mut self,
        question_id: QuestionId,
        category_id: CategoryId,
    ) -> QuizResult<()>;

    async fn insert_answer(
        &mut self,
        question_id: QuestionId,
        content: &str,
        correct: bool,
    ) -> QuizResult<()>;

    async fn commit(self: Box<Self>) -> QuizResult<()>;

    async fn rollback(self: Box<Self>) -> QuizResult<()>;
}

/// Runs one store call under the configured timeout and records its metrics.
/// An elapsed timeout becomes `StoreUnavailable`, never an empty result.
/// Store failures are reported under `operation`.
pub async fn timed_store_call<F, T>(operation: &str, timeout: Duration, future: F) -> QuizResult<T>
where
    F: Future<Output = QuizResult<T>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(timeout, future).await {
        Ok(Err(QuizError::StoreUnavailable { reason, .. })) => {
            Err(QuizError::store_unavailable(operation, reason))
        }
        Ok(result) => result,
        Err(_) => Err(QuizError::store_unavailable(
            operation,
            format!("timed out after {}ms", timeout.as_millis()),
        )),
    };

    let status = if result.is_ok() { "success" } else { "error" };
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    result
}

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use quiz_engine::{
    config::Config,
    error::{QuizError, QuizResult},
    models::{AnswerRow, CandidateRow, Category, CategoryId, QuestionId},
    services::{
        draft_store::MemoryDraftStore,
        ingestion_service::IngestionService,
        memory_store::MemoryQuestionStore,
        question_store::{IngestTransaction, QuestionStore},
        AppState,
    },
};

pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Question bank used across integration tests. Ids are assigned in
/// document order starting at 1:
///
/// * Q1 belongs to both math and history
/// * math: Q1..=Q5
/// * history: Q1, Q6..=Q9
/// * science: Q10, Q11
pub const QUESTION_BANK: &str = "\
[qa]What is 2+2?[qz][ca]math, history[cz][aa]3[az][xaa]4[xaz][aa]5[az]
[qa]What is 3*3?[qz][ca]math[cz][aa]6[az][xaa]9[xaz]
[qa]Is 7 prime?[qz][ca]math[cz][xaa]yes[xaz]
[qa]Square root of 16?[qz][ca]Math[cz][xaa]4[xaz][aa]8[az]
[qa]What is 10/2?[qz][ca]math[cz][aa]2[az][xaa]5[xaz]
[qa]Year the Berlin wall fell?[qz][ca]history[cz][xaa]1989[xaz][aa]1991[az]
[qa]First emperor of Rome?[qz][ca]history[cz][xaa]Augustus[xaz][aa]Nero[az]
[qa]Was the Magna Carta signed in 1215?[qz][ca]history[cz][xaa]yes[xaz]
[qa]Who built the pyramids of Giza?[qz][ca]History[cz][xaa]Egyptians[xaz][aa]Romans[az]
[qa]Boiling point of water at sea level?[qz][ca]science[cz][xaa]100C[xaz][aa]90C[az]
[qa]Chemical symbol of gold?[qz][ca]science[cz][aa]Ag[az][xaa]Au[xaz]
";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://localhost:27017".to_string(),
        mongo_database: "quizbank_test".to_string(),
        store_timeout_ms: TEST_TIMEOUT.as_millis() as u64,
        drafts_dir: std::env::temp_dir()
            .join("quiz-engine-test-drafts")
            .display()
            .to_string(),
        default_per_category: 5,
    }
}

/// Memory store loaded with [`QUESTION_BANK`] through the ingestion path.
pub async fn seeded_store() -> Arc<MemoryQuestionStore> {
    init_tracing();

    let store = Arc::new(MemoryQuestionStore::new());
    IngestionService::new(store.clone(), TEST_TIMEOUT)
        .ingest_text(QUESTION_BANK)
        .await
        .expect("Failed to seed question bank");
    store
}

pub async fn seeded_state() -> (AppState, Arc<MemoryDraftStore>) {
    let drafts = Arc::new(MemoryDraftStore::new());
    let state = AppState::with_stores(test_config(), seeded_store().await, drafts.clone());
    (state, drafts)
}

pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Store whose ingest transactions fail on the n-th answer insert, or at
/// commit when `fail_on_commit` is set.
pub struct FailingStore {
    pub inner: Arc<dyn QuestionStore>,
    pub fail_on_answer: usize,
    pub fail_on_commit: bool,
}

impl FailingStore {
    pub fn on_answer(inner: Arc<dyn QuestionStore>, fail_on_answer: usize) -> Self {
        Self {
            inner,
            fail_on_answer,
            fail_on_commit: false,
        }
    }

    pub fn on_commit(inner: Arc<dyn QuestionStore>) -> Self {
        Self {
            inner,
            fail_on_answer: usize::MAX,
            fail_on_commit: true,
        }
    }
}

struct FailingTransaction<'a> {
    inner: Box<dyn IngestTransaction + 'a>,
    answers_left: usize,
    fail_on_commit: bool,
}

#[async_trait]
impl QuestionStore for FailingStore {
    async fn find_candidates(
        &self,
        category_names: &[String],
        exclude: &HashSet<QuestionId>,
    ) -> QuizResult<Vec<CandidateRow>> {
        self.inner.find_candidates(category_names, exclude).await
    }

    async fn fetch_answers(&self, question_ids: &[QuestionId]) -> QuizResult<Vec<AnswerRow>> {
        self.inner.fetch_answers(question_ids).await
    }

    async fn list_categories(&self) -> QuizResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn begin_ingest(&self) -> QuizResult<Box<dyn IngestTransaction + '_>> {
        let inner = self.inner.begin_ingest().await?;
        Ok(Box::new(FailingTransaction {
            inner,
            answers_left: self.fail_on_answer,
            fail_on_commit: self.fail_on_commit,
        }))
    }
}

#[async_trait]
impl IngestTransaction for FailingTransaction<'_> {
    async fn insert_question(
        &mut self,
        content: &str,
        is_multiple_choice: bool,
    ) -> QuizResult<QuestionId> {
        self.inner.insert_question(content, is_multiple_choice).await
    }

    async fn find_or_create_category(&mut self, name: &str) -> QuizResult<CategoryId> {
        self.inner.find_or_create_category(name).await
    }

    async fn link_question_category(
        &mut self,
        question_id: QuestionId,
        category_id: CategoryId,
    ) -> QuizResult<()> {
        self.inner
            .link_question_category(question_id, category_id)
            .await
    }

    async fn insert_answer(
        &mut self,
        question_id: QuestionId,
        content: &str,
        correct: bool,
    ) -> QuizResult<()> {
        self.answers_left = self.answers_left.saturating_sub(1);
        if self.answers_left == 0 {
            return Err(QuizError::store_unavailable(
                "insert_answer",
                "connection reset by peer",
            ));
        }
        self.inner.insert_answer(question_id, content, correct).await
    }

    async fn commit(self: Box<Self>) -> QuizResult<()> {
        if self.fail_on_commit {
            self.inner.rollback().await?;
            return Err(QuizError::store_unavailable(
                "commit",
                "transaction aborted by server",
            ));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> QuizResult<()> {
        self.inner.rollback().await
    }
}

/// Store that answers every read only after `delay`.
pub struct SlowStore {
    pub inner: Arc<MemoryQuestionStore>,
    pub delay: Duration,
}

#[async_trait]
impl QuestionStore for SlowStore {
    async fn find_candidates(
        &self,
        category_names: &[String],
        exclude: &HashSet<QuestionId>,
    ) -> QuizResult<Vec<CandidateRow>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_candidates(category_names, exclude).await
    }

    async fn fetch_answers(&self, question_ids: &[QuestionId]) -> QuizResult<Vec<AnswerRow>> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_answers(question_ids).await
    }

    async fn list_categories(&self) -> QuizResult<Vec<Category>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_categories().await
    }

    async fn begin_ingest(&self) -> QuizResult<Box<dyn IngestTransaction + '_>> {
        self.inner.begin_ingest().await
    }
}

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::question_store::{IngestTransaction, QuestionStore};
use crate::error::QuizResult;
use crate::models::{
    category_key, AnswerRow, CandidateRow, Category, CategoryId, QuestionId,
};

#[derive(Debug, Clone)]
struct QuestionEntry {
    id: QuestionId,
    content: String,
    is_multiple_choice: bool,
}

#[derive(Debug, Default)]
struct Tables {
    questions: HashMap<QuestionId, QuestionEntry>,
    categories: Vec<Category>,
    links: Vec<(QuestionId, CategoryId)>,
    answers: Vec<AnswerRow>,
}

impl Tables {
    fn category_by_key(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| category_key(&c.name) == key)
    }
}

/// Question bank held in process memory.
#[derive(Debug)]
pub struct MemoryQuestionStore {
    tables: RwLock<Tables>,
    next_question_id: AtomicI64,
    next_category_id: AtomicI64,
}

impl Default for MemoryQuestionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQuestionStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_question_id: AtomicI64::new(1),
            next_category_id: AtomicI64::new(1),
        }
    }

    pub async fn question_count(&self) -> usize {
        self.tables.read().await.questions.len()
    }
}

#[async_trait]
impl QuestionStore for MemoryQuestionStore {
    async fn find_candidates(
        &self,
        category_names: &[String],
        exclude: &HashSet<QuestionId>,
    ) -> QuizResult<Vec<CandidateRow>> {
        let tables = self.tables.read().await;

        let requested: HashMap<CategoryId, &Category> = category_names
            .iter()
            .filter_map(|name| tables.category_by_key(&category_key(name)))
            .map(|category| (category.id, category))
            .collect();

        let rows = tables
            .links
            .iter()
            .filter(|(question_id, _)| !exclude.contains(question_id))
            .filter_map(|(question_id, category_id)| {
                let category = requested.get(category_id)?;
                let question = tables.questions.get(question_id)?;
                Some(CandidateRow {
                    question_id: question.id,
                    question: question.content.clone(),
                    is_multiple_choice: question.is_multiple_choice,
                    category_name: category.name.clone(),
                })
            })
            .collect();

        Ok(rows)
    }

    async fn fetch_answers(&self, question_ids: &[QuestionId]) -> QuizResult<Vec<AnswerRow>> {
        let wanted: HashSet<QuestionId> = question_ids.iter().copied().collect();
        let tables = self.tables.read().await;
        Ok(tables
            .answers
            .iter()
            .filter(|answer| wanted.contains(&answer.question_id))
            .cloned()
            .collect())
    }

    async fn list_categories(&self) -> QuizResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.clone())
    }

    async fn begin_ingest(&self) -> QuizResult<Box<dyn IngestTransaction + '_>> {
        Ok(Box::new(MemoryIngestTransaction {
            store: self,
            staged: Tables::default(),
        }))
    }
}

/// Writes staged until commit, then applied under a single write lock.
struct MemoryIngestTransaction<'a> {
    store: &'a MemoryQuestionStore,
    staged: Tables,
}

#[async_trait]
impl IngestTransaction for MemoryIngestTransaction<'_> {
    async fn insert_question(
        &mut self,
        content: &str,
        is_multiple_choice: bool,
    ) -> QuizResult<QuestionId> {
        let id = self.store.next_question_id.fetch_add(1, Ordering::SeqCst);
        self.staged.questions.insert(
            id,
            QuestionEntry {
                id,
                content: content.to_string(),
                is_multiple_choice,
            },
        );
        Ok(id)
    }

    async fn find_or_create_category(&mut self, name: &str) -> QuizResult<CategoryId> {
        let key = category_key(name);
        if let Some(existing) = self.staged.category_by_key(&key) {
            return Ok(existing.id);
        }
        if let Some(existing) = self.store.tables.read().await.category_by_key(&key) {
            return Ok(existing.id);
        }

        let id = self.store.next_category_id.fetch_add(1, Ordering::SeqCst);
        self.staged.categories.push(Category {
            id,
            name: name.trim().to_string(),
        });
        Ok(id)
    }

    async fn link_question_category(
        &mut self,
        question_id: QuestionId,
        category_id: CategoryId,
    ) -> QuizResult<()> {
        if !self.staged.links.contains(&(question_id, category_id)) {
            self.staged.links.push((question_id, category_id));
        }
        Ok(())
    }

    async fn insert_answer(
        &mut self,
        question_id: QuestionId,
        content: &str,
        correct: bool,
    ) -> QuizResult<()> {
        self.staged.answers.push(AnswerRow {
            question_id,
            content: content.to_string(),
            correct,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> QuizResult<()> {
        let MemoryIngestTransaction { store, staged } = *self;
        let mut tables = store.tables.write().await;

        // A concurrent document may have created the same category meanwhile.
        let mut remap: HashMap<CategoryId, CategoryId> = HashMap::new();
        for category in staged.categories {
            match tables.category_by_key(&category_key(&category.name)) {
                Some(existing) => {
                    remap.insert(category.id, existing.id);
                }
                None => tables.categories.push(category),
            }
        }

        tables.questions.extend(staged.questions);
        for (question_id, category_id) in staged.links {
            let category_id = remap.get(&category_id).copied().unwrap_or(category_id);
            if !tables.links.contains(&(question_id, category_id)) {
                tables.links.push((question_id, category_id));
            }
        }
        tables.answers.extend(staged.answers);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> QuizResult<()> {
        tracing::debug!(
            "Discarding {} staged questions",
            self.staged.questions.len()
        );
        Ok(())
    }
}

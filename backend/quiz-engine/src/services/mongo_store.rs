use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client, ClientSession, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::question_store::{IngestTransaction, QuestionStore};
use crate::error::{QuizError, QuizResult};
use crate::models::{
    category_key, AnswerRow, CandidateRow, Category, CategoryId, QuestionId,
};

const QUESTIONS: &str = "questions";
const CATEGORIES: &str = "categories";
const QUESTION_CATEGORIES: &str = "question_categories";
const ANSWERS: &str = "answers";
const COUNTERS: &str = "counters";

#[derive(Debug, Serialize, Deserialize)]
struct QuestionDocument {
    #[serde(rename = "_id")]
    id: QuestionId,
    content: String,
    is_multiple_choice: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CategoryDocument {
    #[serde(rename = "_id")]
    id: CategoryId,
    name: String,
    name_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkDocument {
    question_id: QuestionId,
    category_id: CategoryId,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnswerDocument {
    question_id: QuestionId,
    position: i32,
    content: String,
    correct: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterDocument {
    #[serde(rename = "_id")]
    id: String,
    seq: i64,
}

/// Question bank stored in MongoDB. Ingestion needs a replica set, since
/// every document is written inside one multi-document transaction.
pub struct MongoQuestionStore {
    client: Client,
    mongo: Database,
}

impl MongoQuestionStore {
    pub fn new(client: Client, database: &str) -> Self {
        let mongo = client.database(database);
        Self { client, mongo }
    }

    pub async fn ensure_indexes(&self) -> QuizResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.categories()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name_key": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.links()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "category_id": 1, "question_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.answers()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "question_id": 1, "position": 1 })
                    .build(),
            )
            .await?;

        tracing::info!("Question store indexes ensured");
        Ok(())
    }

    fn questions(&self) -> Collection<QuestionDocument> {
        self.mongo.collection(QUESTIONS)
    }

    fn categories(&self) -> Collection<CategoryDocument> {
        self.mongo.collection(CATEGORIES)
    }

    fn links(&self) -> Collection<LinkDocument> {
        self.mongo.collection(QUESTION_CATEGORIES)
    }

    fn answers(&self) -> Collection<AnswerDocument> {
        self.mongo.collection(ANSWERS)
    }

    fn counters(&self) -> Collection<CounterDocument> {
        self.mongo.collection(COUNTERS)
    }
}

#[async_trait]
impl QuestionStore for MongoQuestionStore {
    async fn find_candidates(
        &self,
        category_names: &[String],
        exclude: &HashSet<QuestionId>,
    ) -> QuizResult<Vec<CandidateRow>> {
        let keys: Vec<String> = category_names.iter().map(|n| category_key(n)).collect();
        let categories: Vec<CategoryDocument> = self
            .categories()
            .find(doc! { "name_key": { "$in": keys } })
            .await?
            .try_collect()
            .await?;

        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let category_ids: Vec<CategoryId> = categories.iter().map(|c| c.id).collect();
        let category_names: HashMap<CategoryId, String> =
            categories.into_iter().map(|c| (c.id, c.name)).collect();
        let excluded: Vec<QuestionId> = exclude.iter().copied().collect();

        let links: Vec<LinkDocument> = self
            .links()
            .find(doc! {
                "category_id": { "$in": category_ids },
                "question_id": { "$nin": excluded },
            })
            .await?
            .try_collect()
            .await?;

        let question_ids: Vec<QuestionId> = links
            .iter()
            .map(|link| link.question_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let questions: HashMap<QuestionId, QuestionDocument> = self
            .questions()
            .find(doc! { "_id": { "$in": question_ids } })
            .await?
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        tracing::debug!(
            "Found {} candidate links across {} categories",
            links.len(),
            category_names.len()
        );

        Ok(links
            .into_iter()
            .filter_map(|link| {
                let question = questions.get(&link.question_id)?;
                let category_name = category_names.get(&link.category_id)?;
                Some(CandidateRow {
                    question_id: question.id,
                    question: question.content.clone(),
                    is_multiple_choice: question.is_multiple_choice,
                    category_name: category_name.clone(),
                })
            })
            .collect())
    }

    async fn fetch_answers(&self, question_ids: &[QuestionId]) -> QuizResult<Vec<AnswerRow>> {
        let find_options = FindOptions::builder()
            .sort(doc! { "question_id": 1, "position": 1 })
            .build();

        let answers: Vec<AnswerDocument> = self
            .answers()
            .find(doc! { "question_id": { "$in": question_ids.to_vec() } })
            .with_options(find_options)
            .await?
            .try_collect()
            .await?;

        Ok(answers
            .into_iter()
            .map(|a| AnswerRow {
                question_id: a.question_id,
                content: a.content,
                correct: a.correct,
            })
            .collect())
    }

    async fn list_categories(&self) -> QuizResult<Vec<Category>> {
        let categories: Vec<CategoryDocument> = self
            .categories()
            .find(doc! {})
            .await?
            .try_collect()
            .await?;

        Ok(categories
            .into_iter()
            .map(|c| Category {
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    async fn begin_ingest(&self) -> QuizResult<Box<dyn IngestTransaction + '_>> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        Ok(Box::new(MongoIngestTransaction {
            store: self,
            session,
            answer_positions: HashMap::new(),
        }))
    }
}

struct MongoIngestTransaction<'a> {
    store: &'a MongoQuestionStore,
    session: ClientSession,
    answer_positions: HashMap<QuestionId, i32>,
}

impl MongoIngestTransaction<'_> {
    /// Integer ids come from a counter document bumped inside the transaction.
    async fn next_id(&mut self, sequence: &str) -> QuizResult<i64> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .store
            .counters()
            .find_one_and_update(doc! { "_id": sequence }, doc! { "$inc": { "seq": 1_i64 } })
            .with_options(options)
            .session(&mut self.session)
            .await?
            .ok_or_else(|| {
                QuizError::store_unavailable("next_id", format!("counter {} missing", sequence))
            })?;

        Ok(counter.seq)
    }
}

#[async_trait]
impl IngestTransaction for MongoIngestTransaction<'_> {
    async fn insert_question(
        &mut self,
        content: &str,
        is_multiple_choice: bool,
    ) -> QuizResult<QuestionId> {
        let id = self.next_id(QUESTIONS).await?;
        self.store
            .questions()
            .insert_one(QuestionDocument {
                id,
                content: content.to_string(),
                is_multiple_choice,
            })
            .session(&mut self.session)
            .await?;
        Ok(id)
    }

    async fn find_or_create_category(&mut self, name: &str) -> QuizResult<CategoryId> {
        let key = category_key(name);
        let existing = self
            .store
            .categories()
            .find_one(doc! { "name_key": key.clone() })
            .session(&mut self.session)
            .await?;
        if let Some(category) = existing {
            return Ok(category.id);
        }

        let id = self.next_id(CATEGORIES).await?;
        self.store
            .categories()
            .insert_one(CategoryDocument {
                id,
                name: name.trim().to_string(),
                name_key: key,
            })
            .session(&mut self.session)
            .await?;
        tracing::debug!("Created category {} ({})", name.trim(), id);
        Ok(id)
    }

    async fn link_question_category(
        &mut self,
        question_id: QuestionId,
        category_id: CategoryId,
    ) -> QuizResult<()> {
        self.store
            .links()
            .insert_one(LinkDocument {
                question_id,
                category_id,
            })
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn insert_answer(
        &mut self,
        question_id: QuestionId,
        content: &str,
        correct: bool,
    ) -> QuizResult<()> {
        let position = self.answer_positions.entry(question_id).or_insert(0);
        let current = *position;
        *position += 1;

        self.store
            .answers()
            .insert_one(AnswerDocument {
                question_id,
                position: current,
                content: content.to_string(),
                correct,
            })
            .session(&mut self.session)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> QuizResult<()> {
        let mut tx = self;
        tx.session.commit_transaction().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> QuizResult<()> {
        let mut tx = self;
        tx.session.abort_transaction().await?;
        Ok(())
    }
}

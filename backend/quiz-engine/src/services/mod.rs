use crate::config::Config;
use mongodb::Client as MongoClient;
use std::sync::Arc;

pub mod category_service;
pub mod draft_service;
pub mod draft_store;
pub mod ingestion_service;
pub mod memory_store;
pub mod mongo_store;
pub mod question_store;
pub mod replacement;
pub mod sampler;
pub mod tag_parser;

use category_service::CategoryService;
use draft_service::QuizDraftService;
use draft_store::{DraftStore, FsDraftStore};
use ingestion_service::IngestionService;
use mongo_store::MongoQuestionStore;
use question_store::QuestionStore;
use replacement::ReplacementEngine;
use sampler::StratifiedSampler;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn QuestionStore>,
    pub drafts: Arc<dyn DraftStore>,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let store = MongoQuestionStore::new(mongo_client, &config.mongo_database);

        tracing::info!("Ensuring question bank indexes...");
        tokio::time::timeout(config.store_timeout(), store.ensure_indexes())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "MongoDB index setup timeout after {}ms",
                    config.store_timeout_ms
                )
            })??;
        tracing::info!("MongoDB question bank ready");

        let drafts = FsDraftStore::new(&config.drafts_dir);

        Ok(Self::with_stores(config, Arc::new(store), Arc::new(drafts)))
    }

    pub fn with_stores(
        config: Config,
        store: Arc<dyn QuestionStore>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            config,
            store,
            drafts,
        }
    }

    pub fn sampler(&self) -> StratifiedSampler {
        StratifiedSampler::new(self.store.clone(), self.config.store_timeout())
    }

    pub fn replacement(&self) -> ReplacementEngine {
        ReplacementEngine::new(self.store.clone(), self.config.store_timeout())
    }

    pub fn ingestion(&self) -> IngestionService {
        IngestionService::new(self.store.clone(), self.config.store_timeout())
    }

    pub fn categories(&self) -> CategoryService {
        CategoryService::new(self.store.clone(), self.config.store_timeout())
    }

    pub fn draft_service(&self) -> QuizDraftService {
        QuizDraftService::new(self.sampler(), self.replacement(), self.drafts.clone())
    }
}

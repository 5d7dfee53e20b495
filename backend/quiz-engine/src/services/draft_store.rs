use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{QuizError, QuizResult};
use crate::models::Quiz;

const DRAFTS_PREFIX: &str = "drafts";
const DRAFT_FILE: &str = "quiz.json";

/// Storage key of a quiz draft: `drafts/{uuid}/quiz.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey(Uuid);

impl DraftKey {
    pub fn generate() -> Self {
        DraftKey(Uuid::new_v4())
    }

    pub fn parse(key: &str) -> QuizResult<Self> {
        let invalid = || QuizError::InvalidArgument(format!("invalid draft key: {}", key));

        let mut segments = key.trim_matches('/').split('/');
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(DRAFTS_PREFIX), Some(id), Some(DRAFT_FILE), None) => {
                Uuid::parse_str(id).map(DraftKey).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", DRAFTS_PREFIX, self.0, DRAFT_FILE)
    }
}

/// Keeps quiz drafts as JSON artifacts.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn put(&self, key: &DraftKey, quiz: &Quiz) -> QuizResult<()>;

    async fn get(&self, key: &DraftKey) -> QuizResult<Quiz>;
}

/// Drafts written as files below a root directory, mirroring the key path.
#[derive(Debug, Clone)]
pub struct FsDraftStore {
    root: PathBuf,
}

impl FsDraftStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &DraftKey) -> PathBuf {
        self.root
            .join(DRAFTS_PREFIX)
            .join(key.id().to_string())
            .join(DRAFT_FILE)
    }
}

fn storage_error(key: &DraftKey, err: impl fmt::Display) -> QuizError {
    QuizError::DraftStorage {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl DraftStore for FsDraftStore {
    async fn put(&self, key: &DraftKey, quiz: &Quiz) -> QuizResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(key, e))?;
        }

        // Write then rename so readers never see a partial draft.
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, quiz.to_json()?)
            .await
            .map_err(|e| storage_error(key, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| storage_error(key, e))?;

        tracing::debug!("Stored draft {} at {}", key, path.display());
        Ok(())
    }

    async fn get(&self, key: &DraftKey) -> QuizResult<Quiz> {
        let json = match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QuizError::DraftNotFound {
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(storage_error(key, e)),
        };
        Ok(Quiz::from_json(&json)?)
    }
}

/// Drafts kept in process memory as serialized JSON.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<DraftKey, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn raw(&self, key: &DraftKey) -> Option<String> {
        self.drafts.read().await.get(key).cloned()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn put(&self, key: &DraftKey, quiz: &Quiz) -> QuizResult<()> {
        let json = quiz.to_json()?;
        self.drafts.write().await.insert(key.clone(), json);
        Ok(())
    }

    async fn get(&self, key: &DraftKey) -> QuizResult<Quiz> {
        let drafts = self.drafts.read().await;
        let json = drafts.get(key).ok_or_else(|| QuizError::DraftNotFound {
            key: key.to_string(),
        })?;
        Ok(Quiz::from_json(json)?)
    }
}

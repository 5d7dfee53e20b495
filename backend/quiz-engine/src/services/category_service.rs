use std::sync::Arc;
use std::time::Duration;

use super::question_store::{timed_store_call, QuestionStore};
use crate::error::QuizResult;
use crate::models::{category_key, Category};

pub struct CategoryService {
    store: Arc<dyn QuestionStore>,
    store_timeout: Duration,
}

impl CategoryService {
    pub fn new(store: Arc<dyn QuestionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// All categories ordered by name, case-insensitively.
    pub async fn list_categories(&self) -> QuizResult<Vec<Category>> {
        let mut categories = timed_store_call(
            "list_categories",
            self.store_timeout,
            self.store.list_categories(),
        )
        .await?;

        categories.sort_by(|a, b| {
            category_key(&a.name)
                .cmp(&category_key(&b.name))
                .then(a.id.cmp(&b.id))
        });
        Ok(categories)
    }
}

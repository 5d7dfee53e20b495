use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::question_store::{timed_store_call, IngestTransaction, QuestionStore};
use super::tag_parser;
use crate::error::{QuizError, QuizResult};
use crate::metrics::{DOCUMENTS_INGESTED_TOTAL, QUESTIONS_INGESTED_TOTAL};
use crate::models::{QuestionId, QuestionRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub question_ids: Vec<QuestionId>,
    pub categories_linked: usize,
    pub answers_inserted: usize,
}

/// Loads tagged question documents into the question store.
pub struct IngestionService {
    store: Arc<dyn QuestionStore>,
    store_timeout: Duration,
}

impl IngestionService {
    pub fn new(store: Arc<dyn QuestionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub async fn ingest_file(&self, path: &Path) -> QuizResult<IngestReport> {
        let text = extract_text(path).await?;
        tracing::info!("Ingesting document {}", path.display());
        self.ingest_text(&text).await
    }

    /// Parses `text` and persists every record, all or nothing.
    pub async fn ingest_text(&self, text: &str) -> QuizResult<IngestReport> {
        let records = match tag_parser::parse(text) {
            Ok(records) => records,
            Err(e) => {
                DOCUMENTS_INGESTED_TOTAL
                    .with_label_values(&["malformed"])
                    .inc();
                return Err(e);
            }
        };

        let mut tx = timed_store_call(
            "begin_ingest",
            self.store_timeout,
            self.store.begin_ingest(),
        )
        .await?;

        let written = self.write_records(tx.as_mut(), &records).await;
        match written {
            Ok(report) => {
                if let Err(e) = timed_store_call("commit", self.store_timeout, tx.commit()).await {
                    tracing::warn!("Commit failed, document not persisted: {}", e);
                    DOCUMENTS_INGESTED_TOTAL
                        .with_label_values(&["rolled_back"])
                        .inc();
                    return Err(e);
                }

                DOCUMENTS_INGESTED_TOTAL
                    .with_label_values(&["committed"])
                    .inc();
                QUESTIONS_INGESTED_TOTAL.inc_by(report.question_ids.len() as u64);
                tracing::info!(
                    "Committed {} questions, {} category links, {} answers",
                    report.question_ids.len(),
                    report.categories_linked,
                    report.answers_inserted
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("Ingestion failed, rolling back document: {}", e);
                DOCUMENTS_INGESTED_TOTAL
                    .with_label_values(&["rolled_back"])
                    .inc();
                if let Err(rollback_err) =
                    timed_store_call("rollback", self.store_timeout, tx.rollback()).await
                {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn write_records<'t>(
        &self,
        tx: &mut (dyn IngestTransaction + 't),
        records: &[QuestionRecord],
    ) -> QuizResult<IngestReport> {
        let mut report = IngestReport::default();

        for record in records {
            let question_id = timed_store_call(
                "insert_question",
                self.store_timeout,
                tx.insert_question(&record.question, record.is_multiple_choice()),
            )
            .await?;

            for name in &record.categories {
                let category_id = timed_store_call(
                    "find_or_create_category",
                    self.store_timeout,
                    tx.find_or_create_category(name),
                )
                .await?;
                timed_store_call(
                    "link_question_category",
                    self.store_timeout,
                    tx.link_question_category(question_id, category_id),
                )
                .await?;
                report.categories_linked += 1;
            }

            for answer in &record.answers {
                timed_store_call(
                    "insert_answer",
                    self.store_timeout,
                    tx.insert_answer(question_id, &answer.content, answer.correct),
                )
                .await?;
                report.answers_inserted += 1;
            }

            report.question_ids.push(question_id);
        }

        Ok(report)
    }
}

/// Reads the plain text of a source document.
pub async fn extract_text(path: &Path) -> QuizResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| QuizError::DocumentUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let text = String::from_utf8(bytes).map_err(|e| QuizError::DocumentUnreadable {
        path: path.display().to_string(),
        reason: format!("not valid UTF-8 text: {}", e),
    })?;

    if text.starts_with('\u{feff}') {
        Ok(text['\u{feff}'.len_utf8()..].to_string())
    } else {
        Ok(text)
    }
}

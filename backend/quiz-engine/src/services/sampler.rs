use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::question_store::{timed_store_call, QuestionStore};
use crate::error::{QuizError, QuizResult};
use crate::metrics::QUIZZES_SAMPLED_TOTAL;
use crate::models::{
    category_key, AnswerRow, CandidateRow, QuestionId, Quiz, QuizAnswer, QuizCategory,
    QuizQuestion,
};

/// Builds category-balanced quizzes from the question bank.
pub struct StratifiedSampler {
    store: Arc<dyn QuestionStore>,
    store_timeout: Duration,
}

impl StratifiedSampler {
    pub fn new(store: Arc<dyn QuestionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub async fn sample(&self, categories: &[String], per_category: u32) -> QuizResult<Quiz> {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.sample_with_rng(categories, per_category, &mut rng).await
    }

    /// Same as [`sample`](Self::sample) with the shuffle driven by `rng`.
    pub async fn sample_with_rng<R: Rng + Send>(
        &self,
        categories: &[String],
        per_category: u32,
        rng: &mut R,
    ) -> QuizResult<Quiz> {
        let result = self.assemble(categories, per_category, rng).await;
        let status = if result.is_ok() { "success" } else { "error" };
        QUIZZES_SAMPLED_TOTAL.with_label_values(&[status]).inc();
        result
    }

    async fn assemble<R: Rng + Send>(
        &self,
        categories: &[String],
        per_category: u32,
        rng: &mut R,
    ) -> QuizResult<Quiz> {
        validate_request(categories, per_category)?;

        let mut quiz = Quiz::new(
            categories
                .iter()
                .map(|name| QuizCategory::empty(name.clone()))
                .collect(),
        );
        if categories.is_empty() {
            return Ok(quiz);
        }

        let no_exclusions = HashSet::new();
        let mut rows = timed_store_call(
            "find_candidates",
            self.store_timeout,
            self.store.find_candidates(categories, &no_exclusions),
        )
        .await?;
        let candidate_count = rows.len();

        rows.shuffle(rng);
        let kept = select_stratified(rows, per_category);

        let question_ids: Vec<QuestionId> = kept.iter().map(|row| row.question_id).collect();
        let mut answers = if question_ids.is_empty() {
            HashMap::new()
        } else {
            let rows = timed_store_call(
                "fetch_answers",
                self.store_timeout,
                self.store.fetch_answers(&question_ids),
            )
            .await?;
            group_answers(rows)
        };

        for row in kept {
            let Some(idx) = quiz.category_index(&row.category_name) else {
                tracing::warn!(
                    "Store returned question {} under unrequested category '{}'",
                    row.question_id,
                    row.category_name
                );
                continue;
            };
            let row_answers = answers.remove(&row.question_id).unwrap_or_default();
            quiz.categories[idx]
                .questions
                .push(QuizQuestion::from_candidate(row, row_answers));
        }

        tracing::info!(
            "Sampled {} questions from {} candidates across {} categories ({} per category)",
            quiz.question_count(),
            candidate_count,
            categories.len(),
            per_category
        );

        Ok(quiz)
    }
}

fn validate_request(categories: &[String], per_category: u32) -> QuizResult<()> {
    if per_category < 1 {
        return Err(QuizError::InvalidArgument(
            "questions per category must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for name in categories {
        let key = category_key(name);
        if key.is_empty() {
            return Err(QuizError::InvalidArgument(
                "category names must not be blank".to_string(),
            ));
        }
        if !seen.insert(key) {
            return Err(QuizError::InvalidArgument(format!(
                "category '{}' requested more than once",
                name.trim()
            )));
        }
    }
    Ok(())
}

/// Picks at most `per_category` rows per category from rows that are
/// already in random order.
///
/// Order matters: rows are deduplicated by question id first (the first row
/// of a question decides its category), then ranked inside each category,
/// and only then cut at the cap.
pub fn select_stratified(rows: Vec<CandidateRow>, per_category: u32) -> Vec<CandidateRow> {
    let mut seen: HashSet<QuestionId> = HashSet::new();
    let mut ranks: HashMap<String, u32> = HashMap::new();

    rows.into_iter()
        .filter(|row| seen.insert(row.question_id))
        .filter(|row| {
            let rank = ranks.entry(category_key(&row.category_name)).or_insert(0);
            *rank += 1;
            *rank <= per_category
        })
        .collect()
}

/// Answers keyed by question, keeping stored order.
pub(crate) fn group_answers(rows: Vec<AnswerRow>) -> HashMap<QuestionId, Vec<QuizAnswer>> {
    let mut grouped: HashMap<QuestionId, Vec<QuizAnswer>> = HashMap::new();
    for row in rows {
        grouped.entry(row.question_id).or_default().push(row.into());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: QuestionId, category: &str) -> CandidateRow {
        CandidateRow {
            question_id: id,
            question: format!("question {}", id),
            is_multiple_choice: false,
            category_name: category.to_string(),
        }
    }

    fn ids(rows: &[CandidateRow]) -> Vec<QuestionId> {
        rows.iter().map(|r| r.question_id).collect()
    }

    #[test]
    fn test_dedups_before_capping() {
        // Q1 is first seen under math, so history must still get two others.
        let rows = vec![
            row(1, "math"),
            row(2, "math"),
            row(1, "history"),
            row(3, "history"),
            row(4, "history"),
        ];

        let kept = select_stratified(rows, 2);
        assert_eq!(ids(&kept), vec![1, 2, 3, 4]);
        assert_eq!(kept[0].category_name, "math");
    }

    #[test]
    fn test_dropped_rows_still_claim_their_question() {
        // Q3 is claimed by math (rank 3, over the cap) and is not handed to history.
        let rows = vec![
            row(1, "math"),
            row(2, "math"),
            row(3, "math"),
            row(3, "history"),
            row(4, "history"),
        ];

        let kept = select_stratified(rows, 2);
        assert_eq!(ids(&kept), vec![1, 2, 4]);
    }

    #[test]
    fn test_caps_each_category_independently() {
        let rows = (1..=10)
            .map(|id| row(id, if id % 2 == 0 { "even" } else { "odd" }))
            .collect();

        let kept = select_stratified(rows, 3);
        assert_eq!(ids(&kept), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_rejects_bad_requests() {
        assert!(matches!(
            validate_request(&["math".to_string()], 0),
            Err(QuizError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_request(&["math".to_string(), "Math ".to_string()], 1),
            Err(QuizError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_request(&["  ".to_string()], 1),
            Err(QuizError::InvalidArgument(_))
        ));
        assert!(validate_request(&[], 1).is_ok());
    }

    #[test]
    fn test_groups_answers_in_stored_order() {
        let rows = vec![
            AnswerRow {
                question_id: 1,
                content: "a".into(),
                correct: false,
            },
            AnswerRow {
                question_id: 2,
                content: "x".into(),
                correct: true,
            },
            AnswerRow {
                question_id: 1,
                content: "b".into(),
                correct: true,
            },
        ];

        let grouped = group_answers(rows);
        let first: Vec<&str> = grouped[&1].iter().map(|a| a.content.as_str()).collect();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(grouped[&2].len(), 1);
    }
}

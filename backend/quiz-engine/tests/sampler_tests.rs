mod common;

use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use quiz_engine::error::QuizError;
use quiz_engine::models::Quiz;
use quiz_engine::services::sampler::StratifiedSampler;

use common::{names, seeded_store, SlowStore, TEST_TIMEOUT};

async fn sampler() -> StratifiedSampler {
    StratifiedSampler::new(seeded_store().await, TEST_TIMEOUT)
}

fn all_ids(quiz: &Quiz) -> Vec<i64> {
    quiz.categories
        .iter()
        .flat_map(|c| c.questions.iter().map(|q| q.id))
        .collect()
}

#[tokio::test]
async fn test_categories_follow_request_order() {
    let sampler = sampler().await;

    let quiz = assert_ok!(
        sampler
            .sample(&names(&["science", "math", "geography"]), 2)
            .await
    );

    let order: Vec<&str> = quiz.categories.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(order, vec!["science", "math", "geography"]);
    assert!(quiz.categories[2].questions.is_empty());
}

#[tokio::test]
async fn test_shared_question_never_appears_twice() {
    let sampler = sampler().await;

    for _ in 0..200 {
        let quiz = sampler
            .sample(&names(&["math", "history"]), 5)
            .await
            .unwrap();

        let ids = all_ids(&quiz);
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate question in {:?}", ids);

        // Nine distinct questions exist across math and history.
        assert_eq!(ids.len(), 9);
        assert_eq!(ids.iter().filter(|id| **id == 1).count(), 1);
        for category in &quiz.categories {
            assert!(category.questions.len() <= 5);
        }
    }
}

#[tokio::test]
async fn test_cap_is_applied_after_deduplication() {
    let sampler = sampler().await;

    for _ in 0..100 {
        let quiz = sampler
            .sample(&names(&["math", "history"]), 2)
            .await
            .unwrap();

        // Each category has four unshared questions, so losing Q1 to the
        // other category never leaves it short.
        assert_eq!(quiz.categories[0].questions.len(), 2);
        assert_eq!(quiz.categories[1].questions.len(), 2);
    }
}

#[tokio::test]
async fn test_small_category_returns_everything_it_has() {
    let sampler = sampler().await;

    let quiz = sampler.sample(&names(&["science"]), 10).await.unwrap();

    let ids: HashSet<i64> = all_ids(&quiz).into_iter().collect();
    assert_eq!(ids, HashSet::from([10, 11]));
}

#[tokio::test]
async fn test_questions_carry_answers_in_stored_order() {
    let sampler = sampler().await;

    let quiz = sampler.sample(&names(&["science"]), 2).await.unwrap();
    let gold = quiz.categories[0]
        .questions
        .iter()
        .find(|q| q.id == 11)
        .expect("gold question sampled");

    assert!(gold.multiple_choice);
    let answers: Vec<(&str, bool)> = gold
        .answers
        .iter()
        .map(|a| (a.content.as_str(), a.correct))
        .collect();
    assert_eq!(answers, vec![("Ag", false), ("Au", true)]);
}

#[tokio::test]
async fn test_category_names_match_case_insensitively() {
    let sampler = sampler().await;

    let quiz = sampler.sample(&names(&["SCIENCE"]), 5).await.unwrap();

    assert_eq!(quiz.categories[0].category, "SCIENCE");
    assert_eq!(quiz.categories[0].questions.len(), 2);
}

#[tokio::test]
async fn test_seeded_rng_is_reproducible() {
    let sampler = sampler().await;
    let categories = names(&["math", "history", "science"]);

    let mut first_rng = StdRng::seed_from_u64(42);
    let mut second_rng = StdRng::seed_from_u64(42);
    let first = sampler
        .sample_with_rng(&categories, 3, &mut first_rng)
        .await
        .unwrap();
    let second = sampler
        .sample_with_rng(&categories, 3, &mut second_rng)
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_request_yields_empty_quiz() {
    let sampler = sampler().await;

    let quiz = assert_ok!(sampler.sample(&[], 3).await);
    assert!(quiz.categories.is_empty());
    assert_eq!(quiz.to_json().unwrap(), "[]");
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let sampler = sampler().await;

    let zero = assert_err!(sampler.sample(&names(&["math"]), 0).await);
    assert!(matches!(zero, QuizError::InvalidArgument(_)));

    let duplicate = assert_err!(sampler.sample(&names(&["math", " MATH "]), 2).await);
    assert!(matches!(duplicate, QuizError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_slow_store_surfaces_as_unavailable() {
    let store = Arc::new(SlowStore {
        inner: seeded_store().await,
        delay: Duration::from_millis(300),
    });
    let sampler = StratifiedSampler::new(store, Duration::from_millis(20));

    let err = assert_err!(sampler.sample(&names(&["math"]), 2).await);
    assert!(matches!(err, QuizError::StoreUnavailable { .. }));
    assert!(err.is_retryable());
}

pub mod question;
pub mod quiz;

pub use question::{
    category_key, AnswerRow, CandidateRow, Category, CategoryId, QuestionId, QuestionRecord,
    RecordAnswer,
};
pub use quiz::{Quiz, QuizAnswer, QuizCategory, QuizQuestion};

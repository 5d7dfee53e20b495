//! Markup-tag parser for imported question documents.
//!
//! A document is a flat run of tagged spans:
//!
//! ```text
//! [qa]What is 2+2?[qz][ca]math[cz][aa]3[az][xaa]4[xaz]
//! ```
//!
//! `[qa]` starts a question, `[ca]` lists its categories (comma separated),
//! `[aa]` adds an answer and `[xaa]` adds the correct answer. Tags with any
//! other name are skipped and text outside of tags carries no meaning.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{QuizError, QuizResult};
use crate::models::{category_key, QuestionRecord, RecordAnswer};

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"\[[^\[\]]*\]").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagRole {
    Question,
    Categories,
    Answer,
    CorrectAnswer,
}

impl TagRole {
    const ALL: [TagRole; 4] = [
        TagRole::Question,
        TagRole::Categories,
        TagRole::Answer,
        TagRole::CorrectAnswer,
    ];

    fn open_name(self) -> &'static str {
        match self {
            TagRole::Question => "qa",
            TagRole::Categories => "ca",
            TagRole::Answer => "aa",
            TagRole::CorrectAnswer => "xaa",
        }
    }

    fn close_name(self) -> &'static str {
        match self {
            TagRole::Question => "qz",
            TagRole::Categories => "cz",
            TagRole::Answer => "az",
            TagRole::CorrectAnswer => "xaz",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Open(TagRole),
    Close(TagRole),
}

impl Tag {
    /// `None` for tag names the format does not know.
    fn resolve(raw: &str) -> Option<Tag> {
        let name = raw
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim()
            .to_ascii_lowercase();
        TagRole::ALL.iter().find_map(|role| {
            if name == role.open_name() {
                Some(Tag::Open(*role))
            } else if name == role.close_name() {
                Some(Tag::Close(*role))
            } else {
                None
            }
        })
    }
}

/// Document text with line breaks removed, remembering where every byte
/// came from so errors can point into the raw input.
struct ScanText {
    text: String,
    origin: Vec<usize>,
}

impl ScanText {
    fn new(raw: &str) -> Self {
        let mut text = String::with_capacity(raw.len());
        let mut origin = Vec::with_capacity(raw.len() + 1);

        for (idx, ch) in raw.char_indices() {
            if is_stripped(ch) {
                continue;
            }
            text.push(ch);
            origin.extend(idx..idx + ch.len_utf8());
        }
        origin.push(raw.len());

        Self { text, origin }
    }

    fn origin(&self, pos: usize) -> usize {
        self.origin
            .get(pos)
            .copied()
            .unwrap_or_else(|| self.origin.last().copied().unwrap_or_default())
    }

    /// Finds the close tag for `role` starting at `from` and returns the
    /// content before it together with the position right after the close tag.
    fn span_until_close(
        &self,
        role: TagRole,
        from: usize,
        open_pos: usize,
    ) -> QuizResult<(&str, usize)> {
        let rest = &self.text[from..];
        for found in TAG_REGEX.find_iter(rest) {
            match Tag::resolve(found.as_str()) {
                Some(Tag::Close(closing)) if closing == role => {
                    return Ok((&rest[..found.start()], from + found.end()));
                }
                Some(_) => {
                    return Err(QuizError::malformed(
                        self.origin(from + found.start()),
                        format!(
                            "tag {} inside [{}] content",
                            found.as_str(),
                            role.open_name()
                        ),
                    ));
                }
                None => continue,
            }
        }

        Err(QuizError::malformed(
            self.origin(open_pos),
            format!(
                "[{}] is never closed by [{}]",
                role.open_name(),
                role.close_name()
            ),
        ))
    }
}

fn is_stripped(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\t' | '\u{0b}' | '\u{0c}' | '\u{2028}' | '\u{2029}'
    )
}

struct PendingQuestion {
    text: String,
    offset: usize,
}

/// The question under construction.
#[derive(Default)]
struct ParserState {
    current_question: Option<PendingQuestion>,
    pending_answers: Vec<RecordAnswer>,
    pending_categories: Vec<String>,
}

impl ParserState {
    fn apply(
        &mut self,
        role: TagRole,
        content: &str,
        offset: usize,
        records: &mut Vec<QuestionRecord>,
    ) -> QuizResult<()> {
        let content = content.trim();
        match role {
            TagRole::Question => {
                self.flush(records)?;
                self.current_question = Some(PendingQuestion {
                    text: content.to_string(),
                    offset,
                });
            }
            TagRole::Categories => {
                self.require_question(role, offset)?;
                for name in content.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    let key = category_key(name);
                    if !self
                        .pending_categories
                        .iter()
                        .any(|existing| category_key(existing) == key)
                    {
                        self.pending_categories.push(name.to_string());
                    }
                }
            }
            TagRole::Answer | TagRole::CorrectAnswer => {
                self.require_question(role, offset)?;
                self.pending_answers.push(RecordAnswer {
                    content: content.to_string(),
                    correct: role == TagRole::CorrectAnswer,
                });
            }
        }
        Ok(())
    }

    fn require_question(&self, role: TagRole, offset: usize) -> QuizResult<()> {
        if self.current_question.is_none() {
            return Err(QuizError::malformed(
                offset,
                format!("[{}] used before any [qa]", role.open_name()),
            ));
        }
        Ok(())
    }

    fn flush(&mut self, records: &mut Vec<QuestionRecord>) -> QuizResult<()> {
        let Some(pending) = self.current_question.take() else {
            return Ok(());
        };

        let record = QuestionRecord {
            question: pending.text,
            categories: std::mem::take(&mut self.pending_categories),
            answers: std::mem::take(&mut self.pending_answers),
        };
        validate(&record, pending.offset)?;
        records.push(record);
        Ok(())
    }
}

fn validate(record: &QuestionRecord, offset: usize) -> QuizResult<()> {
    if record.question.is_empty() {
        return Err(QuizError::malformed(offset, "question text is empty"));
    }
    if record.categories.is_empty() {
        return Err(QuizError::malformed(
            offset,
            format!("question '{}' has no category", record.question),
        ));
    }
    if record.answers.is_empty() {
        return Err(QuizError::malformed(
            offset,
            format!("question '{}' has no answer", record.question),
        ));
    }
    if record.is_multiple_choice() && record.correct_answers() != 1 {
        return Err(QuizError::malformed(
            offset,
            format!(
                "multiple choice question '{}' must have exactly one correct answer, found {}",
                record.question,
                record.correct_answers()
            ),
        ));
    }
    Ok(())
}

/// Parses raw document text into question records, in document order.
pub fn parse(raw: &str) -> QuizResult<Vec<QuestionRecord>> {
    let scan = ScanText::new(raw);
    let mut state = ParserState::default();
    let mut records = Vec::new();
    let mut pos = 0;

    while let Some(found) = TAG_REGEX.find_at(&scan.text, pos) {
        let offset = scan.origin(found.start());
        match Tag::resolve(found.as_str()) {
            Some(Tag::Open(role)) => {
                let (content, next) = scan.span_until_close(role, found.end(), found.start())?;
                state.apply(role, content, offset, &mut records)?;
                pos = next;
            }
            Some(Tag::Close(role)) => {
                return Err(QuizError::malformed(
                    offset,
                    format!(
                        "[{}] without a preceding [{}]",
                        role.close_name(),
                        role.open_name()
                    ),
                ));
            }
            None => {
                tracing::trace!("Skipping unknown tag {} at offset {}", found.as_str(), offset);
                pos = found.end();
            }
        }
    }

    state.flush(&mut records)?;
    tracing::debug!("Parsed {} question records", records.len());
    Ok(records)
}

// src/questions.rs
// The seam to the external question-generation service. Question content is
// opaque to the engine; only the final correctness signal feeds scheduling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::word::{WordId, WordRecord};

/// How a question is answered, which decides whether a correct answer may
/// auto-advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizKind {
    Options,
    FreeText,
}

/// A generated quiz question. The engine never inspects prompt or choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub word_id: WordId,
    pub kind: QuizKind,
    /// Generator's tag for this question style, e.g. "definition",
    /// "synonym". Feeds the per-word failed-quiz-type tracking.
    pub quiz_type: String,
    pub prompt: String,
    pub choices: Vec<String>,
}

#[derive(Debug, Error)]
pub enum QuestionError {
    #[error("question service unavailable: {0}")]
    Unavailable(String),
    #[error("question service returned no questions")]
    EmptyResponse,
}

/// Implemented by the AI question-generation collaborator. Called from the
/// prefetch thread, hence `Send + Sync`. The batch carries full scheduling
/// metadata so the generator can target weak quiz types; the pool word list
/// exists for plausible distractors.
pub trait QuestionSource: Send + Sync {
    fn generate(
        &self,
        batch: &[WordRecord],
        pool_words: &[String],
    ) -> Result<Vec<QuizQuestion>, QuestionError>;
}

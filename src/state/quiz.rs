use std::time::Duration;

use crate::dao::models::{AnswerValue, QuizEntity};

/// Runtime representation of the quiz played in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    /// Identifier of the quiz in the store.
    pub id: String,
    /// Human readable quiz title.
    pub title: String,
    /// Questions played in order.
    pub questions: Vec<Question>,
}

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Prompt shown to players.
    pub text: String,
    /// Options in display order.
    pub options: Vec<String>,
    /// Correct answer as stored; normalized at settlement.
    pub correct_answer: AnswerValue,
    /// Revealed with the results.
    pub explanation: Option<String>,
}

/// Per-room settings chosen at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    /// Maximum number of players allowed in the room.
    pub max_players: usize,
    /// Answer window of each question.
    pub time_per_question: Duration,
    /// Upper bound on the number of questions played.
    pub question_count: usize,
}

impl Quiz {
    /// Keep only the first `count` questions.
    pub fn truncated(mut self, count: usize) -> Self {
        self.questions.truncate(count);
        self
    }

    /// Number of questions in the quiz.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the quiz has no question at all.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl From<QuizEntity> for Quiz {
    fn from(value: QuizEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            questions: value
                .questions
                .into_iter()
                .map(|question| Question {
                    text: question.question,
                    options: question.options,
                    correct_answer: question.correct_answer,
                    explanation: question.explanation,
                })
                .collect(),
        }
    }
}

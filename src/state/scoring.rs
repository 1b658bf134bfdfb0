//! Per-question settlement: answer normalization and speed-scaled points.
//!
//! Everything in here is a pure function of its inputs so a round settles the
//! same way no matter which trigger (timer or last answer) closed it.

use std::time::Duration;

use indexmap::IndexMap;
use tracing::warn;

use crate::{
    dao::models::AnswerValue,
    state::{quiz::Question, room::Answer},
};

/// Points awarded for an instantaneous correct answer.
pub const MAX_POINTS: f64 = 1000.0;

/// Convert any accepted answer representation into the canonical zero-based
/// option index.
///
/// Accepted forms, in order of precedence:
/// - a numeric index (`2`),
/// - the exact text of an option, compared case-insensitively after trimming,
/// - a single option letter, case-insensitive (`"c"`),
/// - a numeric string (`"2"`).
///
/// Option text wins over the letter and numeric forms, so options such as
/// `"C"` or `"2"` resolve to themselves.
///
/// Returns `None` when the value designates no option of the question.
pub fn normalize_answer(value: &AnswerValue, options: &[String]) -> Option<usize> {
    let index = match value {
        AnswerValue::Index(index) => *index as usize,
        AnswerValue::Text(text) => {
            let text = text.trim();
            if let Some(position) = options
                .iter()
                .position(|option| option.trim().eq_ignore_ascii_case(text))
            {
                return Some(position);
            }
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) if letter.is_ascii_alphabetic() => {
                    (letter.to_ascii_uppercase() as u8 - b'A') as usize
                }
                _ => text.parse::<usize>().ok()?,
            }
        }
    };

    (index < options.len()).then_some(index)
}

/// Letter shown for an option index (`0 → "A"`).
pub fn option_letter(index: usize) -> String {
    u8::try_from(index)
        .ok()
        .filter(|index| *index < 26)
        .map(|index| char::from(b'A' + index).to_string())
        .unwrap_or_else(|| index.to_string())
}

/// Points for a correct answer given `time_spent` out of `time_limit`.
///
/// `round(MAX_POINTS × (0.5 + 0.5 × bonus))` where
/// `bonus = max(0, (limit − spent) / limit)`.
pub fn question_points(time_limit: Duration, time_spent: f64) -> u32 {
    let limit = time_limit.as_secs_f64();
    if limit <= 0.0 {
        return (MAX_POINTS * 0.5).round() as u32;
    }
    let spent = if time_spent.is_finite() {
        time_spent
    } else {
        limit
    };
    let bonus = ((limit - spent) / limit).clamp(0.0, 1.0);
    (MAX_POINTS * (0.5 + 0.5 * bonus)).round() as u32
}

/// Outcome of one player for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionOutcome {
    /// Player identity.
    pub player_id: String,
    /// Raw submitted answer, if any.
    pub answer: Option<AnswerValue>,
    /// Seconds the answer took, if the player answered.
    pub time_spent: Option<f64>,
    /// Whether the answer matched the correct option.
    pub is_correct: bool,
    /// Points earned for this question.
    pub points: u32,
}

/// Settle one question for every participant.
///
/// Participants without an answer, answers that do not designate an option,
/// and questions whose stored correct answer cannot be resolved all yield an
/// incorrect outcome with zero points.
pub fn settle_question<'a>(
    question: &Question,
    time_limit: Duration,
    participants: impl IntoIterator<Item = &'a str>,
    answers: &IndexMap<String, Answer>,
) -> Vec<QuestionOutcome> {
    let correct = normalize_answer(&question.correct_answer, &question.options);
    if correct.is_none() {
        warn!(
            question = %question.text,
            correct_answer = ?question.correct_answer,
            "stored correct answer does not match any option; scoring every answer as incorrect"
        );
    }

    participants
        .into_iter()
        .map(|player_id| match answers.get(player_id) {
            Some(answer) => {
                let chosen = normalize_answer(&answer.value, &question.options);
                let is_correct = chosen.is_some() && chosen == correct;
                let points = if is_correct {
                    question_points(time_limit, answer.time_spent)
                } else {
                    0
                };
                QuestionOutcome {
                    player_id: player_id.to_owned(),
                    answer: Some(answer.value.clone()),
                    time_spent: Some(answer.time_spent),
                    is_correct,
                    points,
                }
            }
            None => QuestionOutcome {
                player_id: player_id.to_owned(),
                answer: None,
                time_spent: None,
                is_correct: false,
                points: 0,
            },
        })
        .collect()
}

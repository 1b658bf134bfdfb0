use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use serde::Deserialize;

use crate::dao::models::{
    AnswerValue, MultiplayerStatsEntity, ProfileProgressEntity, QuestionEntity, QuizEntity,
    UserProfileEntity,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: Bson,
    title: String,
    #[serde(default)]
    questions: Vec<MongoQuestionDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MongoQuestionDocument {
    question: String,
    options: Vec<String>,
    correct_answer: AnswerValue,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: Bson,
    username: String,
    #[serde(default)]
    level: Option<u32>,
    #[serde(default)]
    xp: u64,
    #[serde(default)]
    badges: Vec<String>,
    #[serde(default)]
    multiplayer_stats: MultiplayerStatsEntity,
}

impl From<MongoQuizDocument> for QuizEntity {
    fn from(value: MongoQuizDocument) -> Self {
        Self {
            id: bson_id_to_string(&value.id),
            title: value.title,
            questions: value
                .questions
                .into_iter()
                .map(|question| QuestionEntity {
                    question: question.question,
                    options: question.options,
                    correct_answer: question.correct_answer,
                    explanation: question.explanation,
                })
                .collect(),
        }
    }
}

impl From<MongoUserDocument> for UserProfileEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: bson_id_to_string(&value.id),
            name: value.username,
            level: value.level.unwrap_or(1),
            xp: value.xp,
            badges: value.badges,
            multiplayer_stats: value.multiplayer_stats,
        }
    }
}

/// `$set` document applying a match result to a user.
pub fn progress_update(progress: &ProfileProgressEntity) -> Document {
    doc! {
        "$set": {
            "xp": progress.xp as i64,
            "level": progress.level as i64,
            "badges": progress.badges.clone(),
            "multiplayerStats.gamesPlayed": progress.multiplayer_stats.games_played as i64,
            "multiplayerStats.wins": progress.multiplayer_stats.wins as i64,
        }
    }
}

/// Filter on `_id`, accepting both ObjectId hex strings and plain string ids.
pub fn doc_id(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! {"_id": oid},
        Err(_) => doc! {"_id": id},
    }
}

fn bson_id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(value) => value.clone(),
        other => other.to_string(),
    }
}

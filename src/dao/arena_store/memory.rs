//! In-process store used for local development and tests.

use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

use crate::dao::{
    arena_store::ArenaStore,
    models::{ProfileProgressEntity, QuizEntity, UserProfileEntity},
    storage::{StorageError, StorageResult},
};

/// Errors raised while loading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The file could not be read.
    #[error("failed to read seed file `{path}`")]
    Read {
        /// Seed file location.
        path: String,
        /// I/O cause.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid seed JSON.
    #[error("failed to parse seed file `{path}`")]
    Parse {
        /// Seed file location.
        path: String,
        /// Parse cause.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    quizzes: Vec<QuizEntity>,
    #[serde(default)]
    users: Vec<UserProfileEntity>,
}

/// `DashMap` backed [`ArenaStore`].
#[derive(Clone, Default)]
pub struct MemoryArenaStore {
    quizzes: Arc<DashMap<String, QuizEntity>>,
    profiles: Arc<DashMap<String, UserProfileEntity>>,
}

impl MemoryArenaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a JSON seed file
    /// (`{ "quizzes": [...], "users": [...] }`).
    pub fn from_seed_file(path: &Path) -> Result<Self, SeedError> {
        let contents = fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let seed: SeedFile = serde_json::from_str(&contents).map_err(|source| SeedError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        let store = Self::new();
        seed.quizzes.into_iter().for_each(|quiz| store.insert_quiz(quiz));
        seed.users
            .into_iter()
            .for_each(|profile| store.insert_profile(profile));
        Ok(store)
    }

    /// Insert or replace a quiz.
    pub fn insert_quiz(&self, quiz: QuizEntity) {
        self.quizzes.insert(quiz.id.clone(), quiz);
    }

    /// Insert or replace a profile.
    pub fn insert_profile(&self, profile: UserProfileEntity) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Read back a profile synchronously.
    pub fn profile(&self, user_id: &str) -> Option<UserProfileEntity> {
        self.profiles.get(user_id).map(|entry| entry.value().clone())
    }
}

impl ArenaStore for MemoryArenaStore {
    fn find_quiz(&self, id: String) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let quiz = self.quizzes.get(&id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(quiz) })
    }

    fn find_profile(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserProfileEntity>>> {
        let profile = self.profile(&user_id);
        Box::pin(async move { Ok(profile) })
    }

    fn save_progress(
        &self,
        user_id: String,
        progress: ProfileProgressEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = match self.profiles.get_mut(&user_id) {
            Some(mut entry) => {
                let profile = entry.value_mut();
                profile.xp = progress.xp;
                profile.level = progress.level;
                profile.badges = progress.badges;
                profile.multiplayer_stats = progress.multiplayer_stats;
                Ok(())
            }
            None => Err(StorageError::Missing(format!("user `{user_id}`"))),
        };
        Box::pin(async move { result })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

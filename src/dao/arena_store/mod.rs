pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::{ProfileProgressEntity, QuizEntity, UserProfileEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer holding quizzes and user profiles.
pub trait ArenaStore: Send + Sync {
    /// Load a quiz by identifier.
    fn find_quiz(&self, id: String) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>>;
    /// Load a user profile by identifier.
    fn find_profile(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserProfileEntity>>>;
    /// Overwrite the progression fields of a profile in a single write.
    fn save_progress(
        &self,
        user_id: String,
        progress: ProfileProgressEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

use futures::future::BoxFuture;
use mongodb::{Collection, Database, bson::doc};

use super::{
    connection::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoQuizDocument, MongoUserDocument, doc_id, progress_update},
};
use crate::dao::{
    arena_store::ArenaStore,
    models::{ProfileProgressEntity, QuizEntity, UserProfileEntity},
    storage::StorageResult,
};

const QUIZ_COLLECTION_NAME: &str = "quizzes";
const USER_COLLECTION_NAME: &str = "users";

/// [`ArenaStore`] backed by the MongoDB database shared with the rest of the platform.
///
/// The driver pools and re-establishes connections on its own, so the store only
/// keeps the database handle around.
#[derive(Clone)]
pub struct MongoArenaStore {
    database: Database,
}

impl MongoArenaStore {
    /// Connect to the configured database.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = config.open().await?;
        Ok(Self { database })
    }

    async fn ping(&self) -> MongoResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    fn quiz_collection(&self) -> Collection<MongoQuizDocument> {
        self.database
            .collection::<MongoQuizDocument>(QUIZ_COLLECTION_NAME)
    }

    fn user_collection(&self) -> Collection<MongoUserDocument> {
        self.database
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
    }

    async fn find_quiz(&self, id: String) -> MongoResult<Option<QuizEntity>> {
        let collection = self.quiz_collection();
        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadQuiz { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_profile(&self, id: String) -> MongoResult<Option<UserProfileEntity>> {
        let collection = self.user_collection();
        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadUser { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_progress(&self, id: String, progress: ProfileProgressEntity) -> MongoResult<()> {
        let collection = self.user_collection();
        let result = collection
            .update_one(doc_id(&id), progress_update(&progress))
            .await
            .map_err(|source| MongoDaoError::SaveProgress {
                id: id.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::UnknownUser { id });
        }
        Ok(())
    }
}

impl ArenaStore for MongoArenaStore {
    fn find_quiz(&self, id: String) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }

    fn find_profile(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_profile(user_id).await.map_err(Into::into) })
    }

    fn save_progress(
        &self,
        user_id: String,
        progress: ProfileProgressEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_progress(user_id, progress)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}

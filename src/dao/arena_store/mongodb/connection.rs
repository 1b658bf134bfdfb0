use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "quiz_arena";
const PING_ATTEMPTS: u32 = 5;
const FIRST_PING_BACKOFF: Duration = Duration::from_millis(250);
const MAX_PING_BACKOFF: Duration = Duration::from_secs(5);

/// Where the arena collections live.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options.
    pub options: ClientOptions,
    /// Database holding the `quizzes` and `users` collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection URI. The database defaults to `quiz_arena`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        Ok(Self {
            options,
            database_name: db_name.unwrap_or(DEFAULT_DATABASE).to_owned(),
        })
    }

    /// Open the database and wait for it to answer a ping, giving up after a
    /// few attempts. The storage supervisor retries on top of this.
    pub async fn open(&self) -> MongoResult<Database> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut backoff = FIRST_PING_BACKOFF;
        let mut attempt = 1;
        loop {
            let Err(source) = database.run_command(doc! { "ping": 1 }).await else {
                return Ok(database);
            };
            if attempt == PING_ATTEMPTS {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            debug!(attempt, database = %self.database_name, "mongodb ping failed; retrying");
            sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_PING_BACKOFF);
            attempt += 1;
        }
    }
}

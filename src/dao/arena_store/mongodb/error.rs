use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backed store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver cause.
        #[source]
        source: MongoError,
    },
    /// The driver refused the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver cause.
        #[source]
        source: MongoError,
    },
    /// The server never answered the initial ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Number of pings attempted.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A health ping failed on an established connection.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver cause.
        #[source]
        source: MongoError,
    },
    /// Reading a quiz failed.
    #[error("failed to load quiz `{id}`")]
    LoadQuiz {
        /// Quiz identifier.
        id: String,
        /// Driver cause.
        #[source]
        source: MongoError,
    },
    /// Reading a user profile failed.
    #[error("failed to load user `{id}`")]
    LoadUser {
        /// User identifier.
        id: String,
        /// Driver cause.
        #[source]
        source: MongoError,
    },
    /// Writing match progress to a profile failed.
    #[error("failed to save progress for user `{id}`")]
    SaveProgress {
        /// User identifier.
        id: String,
        /// Driver cause.
        #[source]
        source: MongoError,
    },
    /// The update matched no profile.
    #[error("user `{id}` does not exist")]
    UnknownUser {
        /// User identifier.
        id: String,
    },
}

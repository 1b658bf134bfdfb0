/// Quiz and profile persistence backends.
pub mod arena_store;
/// Persistence model definitions.
pub mod models;
/// Storage error types shared by every backend.
pub mod storage;

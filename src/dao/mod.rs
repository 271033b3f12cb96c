/// Match and player persistence backends.
pub mod match_store;
/// Storage entity definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;

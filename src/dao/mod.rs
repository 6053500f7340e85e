/// Database model definitions.
pub mod models;
/// Row storage and retrieval operations.
pub mod row_store;
/// Storage abstraction layer for database operations.
pub mod storage;

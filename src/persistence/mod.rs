//! This module contains the state store for the homewatch application.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStateRepository;

//! # studyhub-store
//!
//! Relational storage for StudyHub, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain model.
//! Uniqueness and ownership invariants live in the schema itself (unique
//! indexes, `CHECK` constraints, `ON DELETE CASCADE` foreign keys); a
//! violated unique constraint surfaces as [`StoreError::Conflict`].

pub mod accesses;
pub mod cards;
pub mod database;
pub mod migrations;
pub mod models;
pub mod peers;
pub mod sessions;
pub mod shares;
pub mod topics;
pub mod users;

mod error;
mod row;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;

//! # chatline-store
//!
//! Write-through mirror of the in-memory chat state, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed upsert/load helpers for chats,
//! messages (with their reactions) and the display-name cache. It is never
//! the source of truth for a running process; it only lets state survive a
//! restart.

pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod names;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;

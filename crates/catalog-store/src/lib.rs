//! # catalog-store
//!
//! SQLite persistence for the course catalog.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`, runs migrations on open and provides typed CRUD
//! helpers for every catalog record: users, courses, sections, course media,
//! subsections and subsection resources.

pub mod course_media;
pub mod courses;
pub mod database;
pub mod migrations;
pub mod models;
pub mod resources;
pub mod sections;
pub mod subsections;
pub mod users;

mod error;
mod sql;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;

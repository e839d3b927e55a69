//! # catalog-shared
//!
//! Domain vocabulary shared by the store and the HTTP server: the enums
//! persisted in every table, slug generation, password hashing and the
//! bearer tokens handed out at login.

pub mod constants;
pub mod error;
pub mod password;
pub mod slug;
pub mod token;
pub mod types;

pub use error::{PasswordError, TokenError};
pub use types::{CourseStatus, MediaType, Role, UserStatus};

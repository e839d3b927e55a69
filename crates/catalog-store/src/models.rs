//! Records persisted in the catalog database, plus the insert and patch
//! shapes the CRUD helpers accept.
//!
//! Every record derives `Serialize` so the HTTP layer can hand it straight
//! to clients. Password hashes are never serialized.

use catalog_shared::{CourseStatus, MediaType, Role, UserStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: String,
    pub email: String,
    pub email_verified: bool,
    pub status: UserStatus,
    /// Argon2 PHC string.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    /// Soft-delete flag.
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub modified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub modified_by: Option<i64>,
}

// ---------------------------------------------------------------------------
// Course
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub topic: String,
    pub status: CourseStatus,
    pub prerequisites: Vec<String>,
    pub outcomes: Vec<String>,
    pub duration: Option<String>,
    /// Stored upload filename.
    pub banner: Option<String>,
    pub intro_video: Option<String>,
    pub slug: Option<String>,
    /// Soft-delete flag. Independent of `status`.
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub modified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub description: String,
    pub topic: String,
    pub slug: String,
    pub prerequisites: Vec<String>,
    pub outcomes: Vec<String>,
    pub duration: Option<String>,
    pub banner: Option<String>,
    pub intro_video: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub topic: Option<String>,
    pub status: Option<CourseStatus>,
    pub prerequisites: Option<Vec<String>>,
    pub outcomes: Option<Vec<String>>,
    pub duration: Option<String>,
    pub banner: Option<String>,
    pub intro_video: Option<String>,
    pub slug: Option<String>,
    pub modified_by: Option<i64>,
}

/// Which base filter a course listing starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseScope {
    /// `status = ACTIVE`, replaced by an explicit status filter when given.
    /// Soft-deleted courses are not excluded.
    Published,
    /// `is_active = true`, optionally narrowed by status.
    Admin,
}

#[derive(Debug, Clone)]
pub struct CourseFilter {
    pub scope: CourseScope,
    /// Substring match on name, description or topic.
    pub search: Option<String>,
    pub status: Option<CourseStatus>,
    pub topic: Option<String>,
}

/// The `{id, name, topic}` view of a course attached to child records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseSummary {
    pub id: i64,
    pub name: String,
    pub topic: String,
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sequence: i64,
    pub created_by: Option<i64>,
    pub modified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSection {
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sequence: i64,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SectionPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub sequence: Option<i64>,
    pub modified_by: Option<i64>,
}

/// `{id, name, description}` view attached to subsections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// `{id, name}` view attached to subsection resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionRef {
    pub id: i64,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Course media
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseMedia {
    pub id: i64,
    pub course_id: i64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    pub link: Option<String>,
    pub length: Option<i64>,
    pub created_by: Option<i64>,
    pub modified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCourseMedia {
    pub course_id: i64,
    pub media_type: MediaType,
    pub name: String,
    pub link: Option<String>,
    pub length: Option<i64>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CourseMediaPatch {
    pub course_id: Option<i64>,
    pub media_type: Option<MediaType>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub length: Option<i64>,
    pub modified_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub course_id: Option<i64>,
    pub media_type: Option<MediaType>,
}

// ---------------------------------------------------------------------------
// Subsection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subsection {
    pub id: i64,
    pub course_id: i64,
    pub section_id: Option<i64>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    pub length: Option<i64>,
    pub sequence: Option<i64>,
    pub link: Option<String>,
    pub created_by: Option<i64>,
    pub modified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubsection {
    pub course_id: i64,
    pub section_id: Option<i64>,
    pub media_type: MediaType,
    pub name: String,
    pub length: Option<i64>,
    pub sequence: Option<i64>,
    pub link: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SubsectionPatch {
    pub media_type: Option<MediaType>,
    pub name: Option<String>,
    pub length: Option<i64>,
    pub sequence: Option<i64>,
    pub link: Option<String>,
    pub modified_by: Option<i64>,
}

/// `{id, name, type}` view attached to subsection resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubsectionRef {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

// ---------------------------------------------------------------------------
// Subsection resource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubsectionResource {
    pub id: i64,
    pub course_id: i64,
    pub section_id: Option<i64>,
    pub subsection_id: i64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    pub length: Option<i64>,
    pub sequence: Option<i64>,
    pub link: Option<String>,
    pub created_by: Option<i64>,
    pub modified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubsectionResource {
    pub course_id: i64,
    pub section_id: Option<i64>,
    pub subsection_id: i64,
    pub media_type: MediaType,
    pub name: String,
    pub length: Option<i64>,
    pub sequence: Option<i64>,
    pub link: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SubsectionResourcePatch {
    pub course_id: Option<i64>,
    pub section_id: Option<i64>,
    pub subsection_id: Option<i64>,
    pub media_type: Option<MediaType>,
    pub name: Option<String>,
    pub length: Option<i64>,
    pub sequence: Option<i64>,
    pub link: Option<String>,
    pub modified_by: Option<i64>,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// A page of rows plus the total number of rows matching the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Tie-break for resources sharing a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOrder {
    OldestFirst,
    NewestFirst,
}

//! CRUD operations for [`Course`] records.
//!
//! Courses are never removed. Deleting one clears `is_active`, which is
//! independent of the publication `status`.

use catalog_shared::CourseStatus;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{
    Course, CourseFilter, CoursePatch, CourseScope, CourseSummary, NewCourse, PageRequest, Paged,
};
use crate::sql::{self, Changes, Conditions};

const COURSE_COLUMNS: &str = "id, name, description, topic, status, prerequisites, outcomes, \
                              duration, banner, intro_video, slug, is_active, created_by, \
                              modified_by, created_at, modified_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new course. It starts out `INACTIVE` and live.
    pub fn create_course(&self, course: &NewCourse) -> Result<Course> {
        let now = sql::now();
        self.conn().execute(
            "INSERT INTO courses (name, description, topic, status, prerequisites, outcomes,
                                  duration, banner, intro_video, slug, created_by, modified_by,
                                  created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?12, ?12)",
            params![
                course.name,
                course.description,
                course.topic,
                CourseStatus::default().as_str(),
                serde_json::to_string(&course.prerequisites)?,
                serde_json::to_string(&course.outcomes)?,
                course.duration,
                course.banner,
                course.intro_video,
                course.slug,
                course.created_by,
                now,
            ],
        )?;
        self.get_course(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a course by id, live or not.
    pub fn get_course(&self, id: i64) -> Result<Course> {
        self.conn()
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
                params![id],
                row_to_course,
            )
            .map_err(not_found)
    }

    pub fn find_course(&self, id: i64) -> Result<Option<Course>> {
        let course = self
            .conn()
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
                params![id],
                row_to_course,
            )
            .optional()?;
        Ok(course)
    }

    /// Slug lookups only see live courses.
    pub fn find_live_course_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        let course = self
            .conn()
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE slug = ?1 AND is_active = 1"),
                params![slug],
                row_to_course,
            )
            .optional()?;
        Ok(course)
    }

    pub fn course_exists(&self, id: i64) -> Result<bool> {
        let exists = self.conn().query_row(
            "SELECT EXISTS (SELECT 1 FROM courses WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether an `ACTIVE` course other than `exclude` already carries `name`.
    pub fn active_course_name_taken(&self, name: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM courses
                 WHERE name = ?1 AND status = 'ACTIVE' AND (?2 IS NULL OR id != ?2)
             )",
            params![name, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Whether a live course other than `exclude` already uses `slug`.
    pub fn slug_in_use(&self, slug: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM courses
                 WHERE slug = ?1 AND is_active = 1 AND (?2 IS NULL OR id != ?2)
             )",
            params![slug, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Page through courses, newest first.
    pub fn list_courses(&self, filter: &CourseFilter, page: PageRequest) -> Result<Paged<Course>> {
        let mut cond = Conditions::new();
        match filter.scope {
            CourseScope::Published => {
                let status = filter.status.unwrap_or(CourseStatus::Active);
                cond.push("status = ?", [Value::Text(status.as_str().into())]);
            }
            CourseScope::Admin => {
                cond.require("is_active = 1");
                if let Some(status) = filter.status {
                    cond.push("status = ?", [Value::Text(status.as_str().into())]);
                }
            }
        }
        if let Some(term) = filter.search.as_deref().filter(|t| !t.is_empty()) {
            let pattern = sql::contains_pattern(term);
            cond.push(
                "(name LIKE ? OR description LIKE ? OR topic LIKE ?)",
                std::iter::repeat(pattern).take(3),
            );
        }
        if let Some(topic) = filter.topic.as_deref().filter(|t| !t.is_empty()) {
            cond.push("topic = ?", [Value::Text(topic.into())]);
        }

        let where_sql = cond.where_sql();
        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM courses{where_sql}"),
            params_from_iter(cond.values()),
            |row| row.get(0),
        )?;

        let mut values = cond.values();
        values.push(Value::Integer(page.limit.into()));
        values.push(Value::Integer(page.offset().into()));

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses{where_sql}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_course)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Paged {
            items,
            total: total as u64,
        })
    }

    /// `{id, name, topic}` of a course, for embedding in child records.
    pub fn course_summary(&self, id: i64) -> Result<Option<CourseSummary>> {
        let summary = self
            .conn()
            .query_row(
                "SELECT id, name, topic FROM courses WHERE id = ?1",
                params![id],
                |row| {
                    Ok(CourseSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        topic: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_course(&self, id: i64, patch: &CoursePatch) -> Result<Course> {
        let mut changes = Changes::new();
        changes.set_some("name", patch.name.clone());
        changes.set_some("description", patch.description.clone());
        changes.set_some("topic", patch.topic.clone());
        changes.set_some("status", patch.status.map(|s| s.as_str().to_string()));
        if let Some(list) = &patch.prerequisites {
            changes.set("prerequisites", serde_json::to_string(list)?);
        }
        if let Some(list) = &patch.outcomes {
            changes.set("outcomes", serde_json::to_string(list)?);
        }
        changes.set_some("duration", patch.duration.clone());
        changes.set_some("banner", patch.banner.clone());
        changes.set_some("intro_video", patch.intro_video.clone());
        changes.set_some("slug", patch.slug.clone());
        changes.set("modified_by", patch.modified_by);

        if changes.apply(self.conn(), "courses", id)? == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_course(id)
    }

    pub fn set_course_status(&self, id: i64, status: CourseStatus) -> Result<Course> {
        let mut changes = Changes::new();
        changes.set("status", status.as_str().to_string());
        if changes.apply(self.conn(), "courses", id)? == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_course(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Soft-delete a live course. Returns `false` if no live course has `id`.
    ///
    /// Sections, media and subsections are left in place.
    pub fn deactivate_course(&self, id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE courses SET is_active = 0, modified_at = ?2 WHERE id = ?1 AND is_active = 1",
            params![id, sql::now()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        topic: row.get(3)?,
        status: sql::get_enum(row, 4)?,
        prerequisites: sql::get_string_list(row, 5)?,
        outcomes: sql::get_string_list(row, 6)?,
        duration: row.get(7)?,
        banner: row.get(8)?,
        intro_video: row.get(9)?,
        slug: row.get(10)?,
        is_active: row.get(11)?,
        created_by: row.get(12)?,
        modified_by: row.get(13)?,
        created_at: sql::get_timestamp(row, 14)?,
        modified_at: sql::get_timestamp(row, 15)?,
    })
}

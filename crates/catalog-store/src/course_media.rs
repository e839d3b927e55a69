//! CRUD operations for [`CourseMedia`] records.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{CourseMedia, CourseMediaPatch, MediaFilter, NewCourseMedia, PageRequest, Paged};
use crate::sql::{self, Changes, Conditions};

const MEDIA_COLUMNS: &str =
    "id, course_id, type, name, link, length, created_by, modified_by, created_at, modified_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_course_media(&self, media: &NewCourseMedia) -> Result<CourseMedia> {
        let now = sql::now();
        self.conn().execute(
            "INSERT INTO course_media (course_id, type, name, link, length, created_by, modified_by,
                                       created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, ?7)",
            params![
                media.course_id,
                media.media_type.as_str(),
                media.name,
                media.link,
                media.length,
                media.created_by,
                now,
            ],
        )?;
        self.get_course_media(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_course_media(&self, id: i64) -> Result<CourseMedia> {
        self.conn()
            .query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM course_media WHERE id = ?1"),
                params![id],
                row_to_media,
            )
            .map_err(not_found)
    }

    pub fn find_course_media(&self, id: i64) -> Result<Option<CourseMedia>> {
        let media = self
            .conn()
            .query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM course_media WHERE id = ?1"),
                params![id],
                row_to_media,
            )
            .optional()?;
        Ok(media)
    }

    /// Whether another media item of the course already has `name`.
    pub fn media_name_taken(&self, course_id: i64, name: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM course_media
                 WHERE course_id = ?1 AND name = ?2 AND (?3 IS NULL OR id != ?3)
             )",
            params![course_id, name, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Page through media, newest first.
    pub fn list_course_media(&self, filter: &MediaFilter, page: PageRequest) -> Result<Paged<CourseMedia>> {
        let mut cond = Conditions::new();
        if let Some(course_id) = filter.course_id {
            cond.push("course_id = ?", [Value::Integer(course_id)]);
        }
        if let Some(media_type) = filter.media_type {
            cond.push("type = ?", [Value::Text(media_type.as_str().into())]);
        }

        let where_sql = cond.where_sql();
        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM course_media{where_sql}"),
            params_from_iter(cond.values()),
            |row| row.get(0),
        )?;

        let mut values = cond.values();
        values.push(Value::Integer(page.limit.into()));
        values.push(Value::Integer(page.offset().into()));

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MEDIA_COLUMNS} FROM course_media{where_sql}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_media)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Paged {
            items,
            total: total as u64,
        })
    }

    /// All media of a course, newest first.
    pub fn media_for_course(&self, course_id: i64) -> Result<Vec<CourseMedia>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MEDIA_COLUMNS} FROM course_media
             WHERE course_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![course_id], row_to_media)?;

        let mut media = Vec::new();
        for row in rows {
            media.push(row?);
        }
        Ok(media)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_course_media(&self, id: i64, patch: &CourseMediaPatch) -> Result<CourseMedia> {
        let mut changes = Changes::new();
        changes.set_some("course_id", patch.course_id);
        changes.set_some("type", patch.media_type.map(|t| t.as_str().to_string()));
        changes.set_some("name", patch.name.clone());
        changes.set_some("link", patch.link.clone());
        changes.set_some("length", patch.length);
        changes.set("modified_by", patch.modified_by);

        if changes.apply(self.conn(), "course_media", id)? == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_course_media(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    pub fn delete_course_media(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM course_media WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourseMedia> {
    Ok(CourseMedia {
        id: row.get(0)?,
        course_id: row.get(1)?,
        media_type: sql::get_enum(row, 2)?,
        name: row.get(3)?,
        link: row.get(4)?,
        length: row.get(5)?,
        created_by: row.get(6)?,
        modified_by: row.get(7)?,
        created_at: sql::get_timestamp(row, 8)?,
        modified_at: sql::get_timestamp(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use catalog_shared::MediaType;

    fn new_media(course_id: i64, name: &str, media_type: MediaType) -> NewCourseMedia {
        NewCourseMedia {
            course_id,
            media_type,
            name: name.into(),
            link: Some(format!("{name}.bin")),
            length: None,
            created_by: Some(1),
        }
    }

    #[test]
    fn media_newest_first_and_filterable() {
        let db = Database::open_in_memory().unwrap();
        let course = fixtures::course(&db, "Rust 101");
        let other = fixtures::course(&db, "Go 101");
        db.create_course_media(&new_media(course.id, "cover", MediaType::Image)).unwrap();
        db.create_course_media(&new_media(course.id, "trailer", MediaType::Video)).unwrap();
        db.create_course_media(&new_media(other.id, "cover", MediaType::Image)).unwrap();

        let names: Vec<_> = db
            .media_for_course(course.id)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, ["trailer", "cover"]);

        let images = MediaFilter {
            course_id: None,
            media_type: Some(MediaType::Image),
        };
        let page = db
            .list_course_media(&images, PageRequest { page: 1, limit: 10 })
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|m| m.media_type == MediaType::Image));
    }

    #[test]
    fn name_taken_within_course_only() {
        let db = Database::open_in_memory().unwrap();
        let course = fixtures::course(&db, "Rust 101");
        let other = fixtures::course(&db, "Go 101");
        let cover = db.create_course_media(&new_media(course.id, "cover", MediaType::Image)).unwrap();

        assert!(db.media_name_taken(course.id, "cover", None).unwrap());
        assert!(!db.media_name_taken(course.id, "cover", Some(cover.id)).unwrap());
        assert!(!db.media_name_taken(other.id, "cover", None).unwrap());
    }

    #[test]
    fn update_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let course = fixtures::course(&db, "Rust 101");
        let media = db.create_course_media(&new_media(course.id, "cover", MediaType::Image)).unwrap();

        let patch = CourseMediaPatch {
            media_type: Some(MediaType::Link),
            link: Some("https://example.com".into()),
            length: Some(30),
            ..Default::default()
        };
        let updated = db.update_course_media(media.id, &patch).unwrap();
        assert_eq!(updated.media_type, MediaType::Link);
        assert_eq!(updated.link.as_deref(), Some("https://example.com"));
        assert_eq!(updated.length, Some(30));
        assert_eq!(updated.name, "cover");

        let json = serde_json::to_value(&updated).unwrap();
        assert_eq!(json["type"], "LINK");

        assert!(db.delete_course_media(media.id).unwrap());
        assert!(matches!(db.get_course_media(media.id), Err(StoreError::NotFound)));
    }
}

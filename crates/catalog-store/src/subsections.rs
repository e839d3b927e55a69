//! CRUD operations for [`Subsection`] records.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{NewSubsection, PageRequest, Paged, Subsection, SubsectionPatch, SubsectionRef};
use crate::sql::{self, Changes, Conditions};

const SUBSECTION_COLUMNS: &str = "id, course_id, section_id, type, name, length, sequence, link, \
                                  created_by, modified_by, created_at, modified_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_subsection(&self, subsection: &NewSubsection) -> Result<Subsection> {
        let now = sql::now();
        self.conn().execute(
            "INSERT INTO subsections (course_id, section_id, type, name, length, sequence, link,
                                      created_by, modified_by, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?9)",
            params![
                subsection.course_id,
                subsection.section_id,
                subsection.media_type.as_str(),
                subsection.name,
                subsection.length,
                subsection.sequence,
                subsection.link,
                subsection.created_by,
                now,
            ],
        )?;
        self.get_subsection(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_subsection(&self, id: i64) -> Result<Subsection> {
        self.conn()
            .query_row(
                &format!("SELECT {SUBSECTION_COLUMNS} FROM subsections WHERE id = ?1"),
                params![id],
                row_to_subsection,
            )
            .map_err(not_found)
    }

    pub fn find_subsection(&self, id: i64) -> Result<Option<Subsection>> {
        let subsection = self
            .conn()
            .query_row(
                &format!("SELECT {SUBSECTION_COLUMNS} FROM subsections WHERE id = ?1"),
                params![id],
                row_to_subsection,
            )
            .optional()?;
        Ok(subsection)
    }

    pub fn subsection_exists(&self, id: i64) -> Result<bool> {
        let exists = self.conn().query_row(
            "SELECT EXISTS (SELECT 1 FROM subsections WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether another subsection in the same course and section (or in the
    /// course with no section) already has `name`.
    pub fn subsection_name_taken(
        &self,
        course_id: i64,
        section_id: Option<i64>,
        name: &str,
        exclude: Option<i64>,
    ) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM subsections
                 WHERE course_id = ?1 AND section_id IS ?2 AND name = ?3
                   AND (?4 IS NULL OR id != ?4)
             )",
            params![course_id, section_id, name, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Same scoping as [`Database::subsection_name_taken`], for `sequence`.
    pub fn subsection_sequence_taken(
        &self,
        course_id: i64,
        section_id: Option<i64>,
        sequence: i64,
        exclude: Option<i64>,
    ) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM subsections
                 WHERE course_id = ?1 AND section_id IS ?2 AND sequence = ?3
                   AND (?4 IS NULL OR id != ?4)
             )",
            params![course_id, section_id, sequence, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Page through the subsections of a course, optionally narrowed to one
    /// section. Ordered by sequence (unset last), newest first within ties.
    pub fn list_subsections(
        &self,
        course_id: i64,
        section_id: Option<i64>,
        page: PageRequest,
    ) -> Result<Paged<Subsection>> {
        let mut cond = Conditions::new();
        cond.push("course_id = ?", [Value::Integer(course_id)]);
        if let Some(section_id) = section_id {
            cond.push("section_id = ?", [Value::Integer(section_id)]);
        }

        let where_sql = cond.where_sql();
        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM subsections{where_sql}"),
            params_from_iter(cond.values()),
            |row| row.get(0),
        )?;

        let mut values = cond.values();
        values.push(Value::Integer(page.limit.into()));
        values.push(Value::Integer(page.offset().into()));

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SUBSECTION_COLUMNS} FROM subsections{where_sql}
             ORDER BY sequence IS NULL, sequence ASC, created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_subsection)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Paged {
            items,
            total: total as u64,
        })
    }

    /// All subsections filed under a section, in sequence order.
    pub fn subsections_for_section(&self, section_id: i64) -> Result<Vec<Subsection>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SUBSECTION_COLUMNS} FROM subsections
             WHERE section_id = ?1
             ORDER BY sequence IS NULL, sequence ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![section_id], row_to_subsection)?;

        let mut subsections = Vec::new();
        for row in rows {
            subsections.push(row?);
        }
        Ok(subsections)
    }

    pub fn subsection_ref(&self, id: i64) -> Result<Option<SubsectionRef>> {
        let subsection = self
            .conn()
            .query_row(
                "SELECT id, name, type FROM subsections WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SubsectionRef {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        media_type: sql::get_enum(row, 2)?,
                    })
                },
            )
            .optional()?;
        Ok(subsection)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_subsection(&self, id: i64, patch: &SubsectionPatch) -> Result<Subsection> {
        let mut changes = Changes::new();
        changes.set_some("type", patch.media_type.map(|t| t.as_str().to_string()));
        changes.set_some("name", patch.name.clone());
        changes.set_some("length", patch.length);
        changes.set_some("sequence", patch.sequence);
        changes.set_some("link", patch.link.clone());
        changes.set("modified_by", patch.modified_by);

        if changes.apply(self.conn(), "subsections", id)? == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_subsection(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a subsection after removing its resources.
    ///
    /// The two statements are not wrapped in a transaction. Returns the number
    /// of resources removed, or `None` if the subsection did not exist.
    pub fn delete_subsection(&self, id: i64) -> Result<Option<usize>> {
        let resources = self.conn().execute(
            "DELETE FROM subsection_resources WHERE subsection_id = ?1",
            params![id],
        )?;
        let affected = self
            .conn()
            .execute("DELETE FROM subsections WHERE id = ?1", params![id])?;

        if affected == 0 {
            return Ok(None);
        }
        tracing::debug!(subsection_id = id, resources, "deleted subsection");
        Ok(Some(resources))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_subsection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subsection> {
    Ok(Subsection {
        id: row.get(0)?,
        course_id: row.get(1)?,
        section_id: row.get(2)?,
        media_type: sql::get_enum(row, 3)?,
        name: row.get(4)?,
        length: row.get(5)?,
        sequence: row.get(6)?,
        link: row.get(7)?,
        created_by: row.get(8)?,
        modified_by: row.get(9)?,
        created_at: sql::get_timestamp(row, 10)?,
        modified_at: sql::get_timestamp(row, 11)?,
    })
}

//! CRUD operations for [`Section`] records.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{NewSection, PageRequest, Paged, Section, SectionPatch, SectionRef, SectionSummary};
use crate::sql::{self, Changes, Conditions};

const SECTION_COLUMNS: &str =
    "id, course_id, name, description, sequence, created_by, modified_by, created_at, modified_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_section(&self, section: &NewSection) -> Result<Section> {
        let now = sql::now();
        self.conn().execute(
            "INSERT INTO sections (course_id, name, description, sequence, created_by, modified_by,
                                   created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?6)",
            params![
                section.course_id,
                section.name,
                section.description,
                section.sequence,
                section.created_by,
                now,
            ],
        )?;
        self.get_section(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_section(&self, id: i64) -> Result<Section> {
        self.conn()
            .query_row(
                &format!("SELECT {SECTION_COLUMNS} FROM sections WHERE id = ?1"),
                params![id],
                row_to_section,
            )
            .map_err(not_found)
    }

    pub fn find_section(&self, id: i64) -> Result<Option<Section>> {
        let section = self
            .conn()
            .query_row(
                &format!("SELECT {SECTION_COLUMNS} FROM sections WHERE id = ?1"),
                params![id],
                row_to_section,
            )
            .optional()?;
        Ok(section)
    }

    pub fn section_exists(&self, id: i64) -> Result<bool> {
        let exists = self.conn().query_row(
            "SELECT EXISTS (SELECT 1 FROM sections WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether another section of the course already has `name`.
    pub fn section_name_taken(&self, course_id: i64, name: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM sections
                 WHERE course_id = ?1 AND name = ?2 AND (?3 IS NULL OR id != ?3)
             )",
            params![course_id, name, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Whether another section of the course already sits at `sequence`.
    pub fn section_sequence_taken(
        &self,
        course_id: i64,
        sequence: i64,
        exclude: Option<i64>,
    ) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM sections
                 WHERE course_id = ?1 AND sequence = ?2 AND (?3 IS NULL OR id != ?3)
             )",
            params![course_id, sequence, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Page through sections, optionally restricted to one course, in
    /// sequence order.
    pub fn list_sections(&self, course_id: Option<i64>, page: PageRequest) -> Result<Paged<Section>> {
        let mut cond = Conditions::new();
        if let Some(course_id) = course_id {
            cond.push("course_id = ?", [Value::Integer(course_id)]);
        }

        let where_sql = cond.where_sql();
        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM sections{where_sql}"),
            params_from_iter(cond.values()),
            |row| row.get(0),
        )?;

        let mut values = cond.values();
        values.push(Value::Integer(page.limit.into()));
        values.push(Value::Integer(page.offset().into()));

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections{where_sql}
             ORDER BY sequence ASC, id ASC
             LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_section)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Paged {
            items,
            total: total as u64,
        })
    }

    /// All sections of a course in sequence order.
    pub fn sections_for_course(&self, course_id: i64) -> Result<Vec<Section>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections
             WHERE course_id = ?1
             ORDER BY sequence ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![course_id], row_to_section)?;

        let mut sections = Vec::new();
        for row in rows {
            sections.push(row?);
        }
        Ok(sections)
    }

    pub fn section_summary(&self, id: i64) -> Result<Option<SectionSummary>> {
        let summary = self
            .conn()
            .query_row(
                "SELECT id, name, description FROM sections WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SectionSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }

    pub fn section_ref(&self, id: i64) -> Result<Option<SectionRef>> {
        let section = self
            .conn()
            .query_row(
                "SELECT id, name FROM sections WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SectionRef {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(section)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_section(&self, id: i64, patch: &SectionPatch) -> Result<Section> {
        let mut changes = Changes::new();
        changes.set_some("name", patch.name.clone());
        changes.set_some("description", patch.description.clone());
        changes.set_some("sequence", patch.sequence);
        changes.set("modified_by", patch.modified_by);

        if changes.apply(self.conn(), "sections", id)? == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_section(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Hard-delete a section. Fails with a constraint error while
    /// subsections or resources still reference it.
    pub fn delete_section(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sections WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_section(row: &rusqlite::Row<'_>) -> rusqlite::Result<Section> {
    Ok(Section {
        id: row.get(0)?,
        course_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        sequence: row.get(4)?,
        created_by: row.get(5)?,
        modified_by: row.get(6)?,
        created_at: sql::get_timestamp(row, 7)?,
        modified_at: sql::get_timestamp(row, 8)?,
    })
}

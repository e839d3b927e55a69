//! CRUD operations for [`SubsectionResource`] records.

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{
    NewSubsectionResource, ResourceOrder, SubsectionResource, SubsectionResourcePatch,
};
use crate::sql::{self, Changes};

const RESOURCE_COLUMNS: &str = "id, course_id, section_id, subsection_id, type, name, length, \
                                sequence, link, created_by, modified_by, created_at, modified_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_resource(&self, resource: &NewSubsectionResource) -> Result<SubsectionResource> {
        let now = sql::now();
        self.conn().execute(
            "INSERT INTO subsection_resources (course_id, section_id, subsection_id, type, name,
                                               length, sequence, link, created_by, modified_by,
                                               created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10, ?10)",
            params![
                resource.course_id,
                resource.section_id,
                resource.subsection_id,
                resource.media_type.as_str(),
                resource.name,
                resource.length,
                resource.sequence,
                resource.link,
                resource.created_by,
                now,
            ],
        )?;
        self.get_resource(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_resource(&self, id: i64) -> Result<SubsectionResource> {
        self.conn()
            .query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM subsection_resources WHERE id = ?1"),
                params![id],
                row_to_resource,
            )
            .map_err(not_found)
    }

    pub fn find_resource(&self, id: i64) -> Result<Option<SubsectionResource>> {
        let resource = self
            .conn()
            .query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM subsection_resources WHERE id = ?1"),
                params![id],
                row_to_resource,
            )
            .optional()?;
        Ok(resource)
    }

    /// Resources attached to a subsection, by sequence (unset last) then
    /// creation time in the requested direction.
    pub fn resources_for_subsection(
        &self,
        subsection_id: i64,
        order: ResourceOrder,
    ) -> Result<Vec<SubsectionResource>> {
        let tiebreak = match order {
            ResourceOrder::OldestFirst => "created_at ASC, id ASC",
            ResourceOrder::NewestFirst => "created_at DESC, id DESC",
        };
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM subsection_resources
             WHERE subsection_id = ?1
             ORDER BY sequence IS NULL, sequence ASC, {tiebreak}"
        ))?;
        let rows = stmt.query_map(params![subsection_id], row_to_resource)?;

        let mut resources = Vec::new();
        for row in rows {
            resources.push(row?);
        }
        Ok(resources)
    }

    /// Resources matching the full course / section / subsection triple,
    /// oldest first within a sequence.
    pub fn list_resources(
        &self,
        course_id: i64,
        section_id: Option<i64>,
        subsection_id: i64,
    ) -> Result<Vec<SubsectionResource>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM subsection_resources
             WHERE course_id = ?1 AND section_id IS ?2 AND subsection_id = ?3
             ORDER BY sequence IS NULL, sequence ASC, created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![course_id, section_id, subsection_id], row_to_resource)?;

        let mut resources = Vec::new();
        for row in rows {
            resources.push(row?);
        }
        Ok(resources)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_resource(
        &self,
        id: i64,
        patch: &SubsectionResourcePatch,
    ) -> Result<SubsectionResource> {
        let mut changes = Changes::new();
        changes.set_some("course_id", patch.course_id);
        changes.set_some("section_id", patch.section_id);
        changes.set_some("subsection_id", patch.subsection_id);
        changes.set_some("type", patch.media_type.map(|t| t.as_str().to_string()));
        changes.set_some("name", patch.name.clone());
        changes.set_some("length", patch.length);
        changes.set_some("sequence", patch.sequence);
        changes.set_some("link", patch.link.clone());
        changes.set("modified_by", patch.modified_by);

        if changes.apply(self.conn(), "subsection_resources", id)? == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_resource(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    pub fn delete_resource(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM subsection_resources WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_resource(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubsectionResource> {
    Ok(SubsectionResource {
        id: row.get(0)?,
        course_id: row.get(1)?,
        section_id: row.get(2)?,
        subsection_id: row.get(3)?,
        media_type: sql::get_enum(row, 4)?,
        name: row.get(5)?,
        length: row.get(6)?,
        sequence: row.get(7)?,
        link: row.get(8)?,
        created_by: row.get(9)?,
        modified_by: row.get(10)?,
        created_at: sql::get_timestamp(row, 11)?,
        modified_at: sql::get_timestamp(row, 12)?,
    })
}

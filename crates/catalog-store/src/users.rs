//! CRUD operations for [`User`] records.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{NewUser, PageRequest, Paged, User, UserPatch};
use crate::sql::{self, Changes, Conditions};

const USER_COLUMNS: &str = "id, first_name, last_name, mobile, email, email_verified, status, \
                            password, role, is_active, created_by, modified_by, created_at, modified_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user. The user is recorded as its own creator.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = sql::now();
        self.conn().execute(
            "INSERT INTO users (first_name, last_name, mobile, email, password, role, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                user.first_name,
                user.last_name,
                user.mobile,
                user.email,
                user.password_hash,
                user.role.as_str(),
                now,
            ],
        )?;
        let id = self.conn().last_insert_rowid();

        self.conn().execute(
            "UPDATE users SET created_by = ?1, modified_by = ?1 WHERE id = ?1",
            params![id],
        )?;
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Fetch a user by id regardless of the soft-delete flag.
    pub fn find_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// The active user registered under `email`, if any.
    pub fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users
                     WHERE email = ?1 AND is_active = 1
                     ORDER BY id LIMIT 1"
                ),
                params![email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Whether an active user other than `exclude` already uses `email`.
    pub fn email_in_use(&self, email: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = self.conn().query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM users
                 WHERE email = ?1 AND is_active = 1 AND (?2 IS NULL OR id != ?2)
             )",
            params![email, exclude],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    /// Page through active users, newest first.
    ///
    /// `search` is a substring match on first name, last name, email or mobile.
    pub fn list_users(&self, search: Option<&str>, page: PageRequest) -> Result<Paged<User>> {
        let mut cond = Conditions::new();
        cond.require("is_active = 1");
        if let Some(term) = search.filter(|t| !t.is_empty()) {
            let pattern = sql::contains_pattern(term);
            cond.push(
                "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR mobile LIKE ?)",
                std::iter::repeat(pattern).take(4),
            );
        }

        let where_sql = cond.where_sql();
        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM users{where_sql}"),
            params_from_iter(cond.values()),
            |row| row.get(0),
        )?;

        let mut values = cond.values();
        values.push(Value::Integer(page.limit.into()));
        values.push(Value::Integer(page.offset().into()));

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users{where_sql}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_user)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Paged {
            items,
            total: total as u64,
        })
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Merge the supplied fields into an existing user.
    pub fn update_user(&self, id: i64, patch: &UserPatch) -> Result<User> {
        let mut changes = Changes::new();
        changes.set_some("first_name", patch.first_name.clone());
        changes.set_some("last_name", patch.last_name.clone());
        changes.set_some("mobile", patch.mobile.clone());
        changes.set_some("email", patch.email.clone());
        changes.set_some("password", patch.password_hash.clone());
        changes.set_some("role", patch.role.map(|r| r.as_str().to_string()));
        changes.set("modified_by", patch.modified_by);

        if changes.apply(self.conn(), "users", id)? == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Soft-delete a user by clearing `is_active`. Returns `true` if a row
    /// was updated.
    pub fn deactivate_user(&self, id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET is_active = 0, modified_at = ?2 WHERE id = ?1",
            params![id, sql::now()],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        mobile: row.get(3)?,
        email: row.get(4)?,
        email_verified: row.get(5)?,
        status: sql::get_enum(row, 6)?,
        password_hash: row.get(7)?,
        role: sql::get_enum(row, 8)?,
        is_active: row.get(9)?,
        created_by: row.get(10)?,
        modified_by: row.get(11)?,
        created_at: sql::get_timestamp(row, 12)?,
        modified_at: sql::get_timestamp(row, 13)?,
    })
}

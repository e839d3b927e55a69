//! Small helpers shared by the per-entity CRUD modules: timestamp and enum
//! column decoding, sparse `UPDATE` building and `WHERE` clause assembly.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, Row};

/// Timestamps are stored as fixed-width RFC 3339 text, so lexical order is
/// chronological order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    timestamp(Utc::now())
}

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(idx, e))
}

/// Decode an upper-case enum column such as `status` or `type`.
pub(crate) fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_failure(idx, e))
}

/// Decode a JSON array of strings. NULL reads as an empty list.
pub(crate) fn get_string_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        None => Ok(Vec::new()),
        Some(text) => serde_json::from_str(&text).map_err(|e| conversion_failure(idx, e)),
    }
}

// ---------------------------------------------------------------------------
// Sparse updates
// ---------------------------------------------------------------------------

/// Column assignments for a partial `UPDATE ... WHERE id = ?`.
///
/// `modified_at` is always refreshed.
#[derive(Default)]
pub(crate) struct Changes {
    columns: Vec<(&'static str, Value)>,
}

impl Changes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, column: &'static str, value: impl Into<Value>) {
        self.columns.push((column, value.into()));
    }

    /// Assign only when a value was supplied.
    pub(crate) fn set_some<T: Into<Value>>(&mut self, column: &'static str, value: Option<T>) {
        if let Some(value) = value {
            self.set(column, value);
        }
    }

    /// Run the update. Returns the number of rows touched.
    pub(crate) fn apply(mut self, conn: &Connection, table: &str, id: i64) -> rusqlite::Result<usize> {
        self.set("modified_at", now());

        let assignments = self
            .columns
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {table} SET {assignments} WHERE id = ?");

        let mut values: Vec<Value> = self.columns.into_iter().map(|(_, v)| v).collect();
        values.push(Value::Integer(id));
        conn.execute(&sql, params_from_iter(values))
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// `AND`-joined conditions using anonymous `?` placeholders.
#[derive(Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Conditions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a condition that takes no parameters.
    pub(crate) fn require(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    pub(crate) fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.values.extend(values);
    }

    /// `" WHERE a AND b"`, or an empty string when nothing was pushed.
    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        self.values.clone()
    }
}

/// `%term%` pattern for `LIKE`.
pub(crate) fn contains_pattern(term: &str) -> Value {
    Value::Text(format!("%{term}%"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_lexically() {
        let early = DateTime::parse_from_rfc3339("2024-01-01T09:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(early), "2024-01-01T09:00:00.500000Z");
        assert!(timestamp(early) < timestamp(late));
    }

    #[test]
    fn conditions_render() {
        let mut cond = Conditions::new();
        assert_eq!(cond.where_sql(), "");

        cond.push("a = ?", [Value::Integer(1)]);
        cond.push("(b LIKE ? OR c LIKE ?)", [contains_pattern("x"), contains_pattern("x")]);
        assert_eq!(cond.where_sql(), " WHERE a = ? AND (b LIKE ? OR c LIKE ?)");
        assert_eq!(cond.values().len(), 3);
    }

    #[test]
    fn changes_update_only_named_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, a TEXT, b INTEGER, modified_at TEXT);
             INSERT INTO t (id, a, b, modified_at) VALUES (1, 'x', 5, 'old');",
        )
        .unwrap();

        let mut changes = Changes::new();
        changes.set("a", "y".to_string());
        changes.set_some::<i64>("b", None);
        assert_eq!(changes.apply(&conn, "t", 1).unwrap(), 1);

        let (a, b, modified): (String, i64, String) = conn
            .query_row("SELECT a, b, modified_at FROM t WHERE id = 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(a, "y");
        assert_eq!(b, 5);
        assert_ne!(modified, "old");
    }
}

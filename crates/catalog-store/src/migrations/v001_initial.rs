//! v001 -- Initial schema creation.
//!
//! Creates the six catalog tables: `users`, `courses`, `sections`,
//! `course_media`, `subsections` and `subsection_resources`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name     TEXT,
    last_name      TEXT,
    mobile         TEXT NOT NULL,
    email          TEXT NOT NULL,
    email_verified INTEGER NOT NULL DEFAULT 0,      -- boolean 0/1
    status         TEXT NOT NULL DEFAULT 'ACTIVE',  -- ACTIVE | INACTIVE
    password       TEXT NOT NULL,                   -- argon2 PHC string
    role           TEXT NOT NULL DEFAULT 'STUDENT', -- STUDENT | ADMIN | TEACHER
    is_active      INTEGER NOT NULL DEFAULT 1,
    created_by     INTEGER,
    modified_by    INTEGER,
    created_at     TEXT NOT NULL,                   -- RFC-3339, microseconds
    modified_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

-- ----------------------------------------------------------------
-- Courses
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS courses (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    description   TEXT NOT NULL,
    topic         TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'INACTIVE',
    prerequisites TEXT,                             -- JSON array of strings
    outcomes      TEXT,                             -- JSON array of strings
    duration      TEXT,
    banner        TEXT,                             -- upload filename
    intro_video   TEXT,
    slug          TEXT,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_by    INTEGER,
    modified_by   INTEGER,
    created_at    TEXT NOT NULL,
    modified_at   TEXT NOT NULL
);

-- slugs only need to be unique among live courses
CREATE UNIQUE INDEX IF NOT EXISTS idx_courses_live_slug
    ON courses(slug) WHERE is_active = 1;
CREATE INDEX IF NOT EXISTS idx_courses_created ON courses(created_at DESC);

-- ----------------------------------------------------------------
-- Sections
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sections (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id   INTEGER NOT NULL,
    name        TEXT NOT NULL,
    description TEXT,
    sequence    INTEGER NOT NULL,
    created_by  INTEGER,
    modified_by INTEGER,
    created_at  TEXT NOT NULL,
    modified_at TEXT NOT NULL,

    FOREIGN KEY (course_id) REFERENCES courses(id)
);

CREATE INDEX IF NOT EXISTS idx_sections_course_seq ON sections(course_id, sequence);

-- ----------------------------------------------------------------
-- Course media
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS course_media (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id   INTEGER NOT NULL,
    type        TEXT NOT NULL,                      -- IMAGE | VIDEO | PDF | DOCUMENT | LINK | VIDEOID
    name        TEXT NOT NULL,
    link        TEXT,
    length      INTEGER,
    created_by  INTEGER,
    modified_by INTEGER,
    created_at  TEXT NOT NULL,
    modified_at TEXT NOT NULL,

    FOREIGN KEY (course_id) REFERENCES courses(id)
);

CREATE INDEX IF NOT EXISTS idx_course_media_course ON course_media(course_id, created_at DESC);

-- ----------------------------------------------------------------
-- Subsections
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS subsections (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id   INTEGER NOT NULL,
    section_id  INTEGER,                            -- nullable FK -> sections(id)
    type        TEXT NOT NULL,
    name        TEXT NOT NULL,
    length      INTEGER,
    sequence    INTEGER,
    link        TEXT,
    created_by  INTEGER,
    modified_by INTEGER,
    created_at  TEXT NOT NULL,
    modified_at TEXT NOT NULL,

    FOREIGN KEY (course_id) REFERENCES courses(id),
    FOREIGN KEY (section_id) REFERENCES sections(id)
);

CREATE INDEX IF NOT EXISTS idx_subsections_course ON subsections(course_id, section_id);

-- ----------------------------------------------------------------
-- Subsection resources
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS subsection_resources (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id     INTEGER NOT NULL,
    section_id    INTEGER,
    subsection_id INTEGER NOT NULL,
    type          TEXT NOT NULL,
    name          TEXT NOT NULL,
    length        INTEGER,
    sequence      INTEGER,
    link          TEXT,
    created_by    INTEGER,
    modified_by   INTEGER,
    created_at    TEXT NOT NULL,
    modified_at   TEXT NOT NULL,

    FOREIGN KEY (course_id) REFERENCES courses(id),
    FOREIGN KEY (section_id) REFERENCES sections(id),
    FOREIGN KEY (subsection_id) REFERENCES subsections(id)
);

CREATE INDEX IF NOT EXISTS idx_resources_subsection ON subsection_resources(subsection_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

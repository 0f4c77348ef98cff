//! SQLite persistence for issued certificates and pending students.

mod certificates;
mod query;
mod students;

pub use query::{CertificateQuery, FilterMode, Page, Stats, PAGE_SIZE};

use log::info;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{CertissueError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS certificates (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    certificate_id    TEXT NOT NULL UNIQUE,
    full_name         TEXT NOT NULL,
    roll_number       TEXT NOT NULL UNIQUE,
    college_name      TEXT NOT NULL,
    affiliated_name   TEXT NOT NULL,
    course            TEXT NOT NULL,
    start_date        TEXT NOT NULL,
    end_date          TEXT NOT NULL,
    email             TEXT NOT NULL,
    template          TEXT NOT NULL,
    certificate_image TEXT,
    qr_code_image     TEXT,
    verification_url  TEXT NOT NULL DEFAULT '',
    is_verified       INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    email_sent        INTEGER NOT NULL DEFAULT 0,
    email_sent_at     TEXT,
    drive_uploaded    INTEGER NOT NULL DEFAULT 0,
    drive_file_id     TEXT NOT NULL DEFAULT '',
    drive_uploaded_at TEXT,
    notes             TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_certificates_created ON certificates(created_at);
CREATE INDEX IF NOT EXISTS idx_certificates_email ON certificates(email);

CREATE TABLE IF NOT EXISTS pending_students (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name       TEXT NOT NULL,
    course          TEXT NOT NULL,
    roll_number     TEXT NOT NULL,
    college_name    TEXT NOT NULL,
    affiliated_name TEXT NOT NULL,
    start_date      TEXT NOT NULL,
    end_date        TEXT NOT NULL,
    email           TEXT NOT NULL,
    contact         TEXT NOT NULL DEFAULT 'NONE',
    gender          TEXT NOT NULL DEFAULT 'NONE',
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pending_roll ON pending_students(roll_number);
"#;

/// Thread-safe handle on the certificate database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening database {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CertissueError::StoreUnavailable)
    }
}

/// Escapes `%`, `_` and `\` for use in a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

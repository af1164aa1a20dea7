//! The database driver boundary.
//!
//! Everything the rest of the crate needs from PostgreSQL goes through the
//! [`Session`] trait: plain statement execution, text-shaped result rows,
//! transaction/savepoint control, and `mogrify` — client-side literal
//! substitution, used exclusively for the `COMMENT ON ... IS '...'`
//! signing statement whose payload is an arbitrary JSON string.

use std::fmt;

use async_trait::async_trait;
use sqlx::postgres::PgDatabaseError;
use sqlx::{Connection, PgConnection, Row};
use tracing::debug;

/// A failure reported by the database (or the connection to it).
#[derive(Debug, Clone)]
pub struct SessionError {
    pub message: String,
    pub code: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            detail: None,
            hint: None,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n  Detail: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  Hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(error: sqlx::Error) -> Self {
        if let Some(db_error) = error.as_database_error()
            && let Some(pg_error) = db_error.try_downcast_ref::<PgDatabaseError>()
        {
            return Self {
                message: pg_error.message().to_string(),
                code: Some(pg_error.code().to_string()),
                detail: pg_error.detail().map(|s| s.to_string()),
                hint: pg_error.hint().map(|s| s.to_string()),
            };
        }
        Self::new(error.to_string())
    }
}

/// One serially-used database session. The core never runs SQL anywhere
/// else, and never holds more than one of these per run.
#[async_trait]
pub trait Session: Send {
    async fn execute(&mut self, sql: &str) -> Result<(), SessionError>;

    /// Run a query and return every row with all columns rendered as text
    /// (queries cast accordingly). Keeps the boundary narrow and fakeable.
    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, SessionError>;

    /// Substitute `$1`..`$n` with properly quoted literals, client-side.
    fn mogrify(&self, sql: &str, params: &[&str]) -> String {
        mogrify(sql, params)
    }

    async fn begin(&mut self) -> Result<(), SessionError> {
        // harmless if a transaction is already open; the server warns
        self.execute("BEGIN;").await
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        self.execute("COMMIT;").await
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        self.execute("ROLLBACK;").await
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), SessionError> {
        self.execute(&format!("SAVEPOINT {name};")).await
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<(), SessionError> {
        self.execute(&format!("RELEASE SAVEPOINT {name};")).await
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), SessionError> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {name};")).await
    }
}

/// Quote a string as a PostgreSQL literal. Uses `E''` escape syntax when
/// the value contains backslashes so the result is safe regardless of
/// `standard_conforming_strings`.
pub fn quote_literal(value: &str) -> String {
    if value.contains('\\') {
        format!("E'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Client-side parameter substitution: `$1`..`$n` become quoted literals.
pub fn mogrify(sql: &str, params: &[&str]) -> String {
    let mut out = sql.to_string();
    for (ix, param) in params.iter().enumerate().rev() {
        out = out.replace(&format!("${}", ix + 1), &quote_literal(param));
    }
    out
}

/// The production session: one sqlx connection to one PostgreSQL backend.
pub struct PgSession {
    conn: PgConnection,
}

impl PgSession {
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let conn = PgConnection::connect(url)
            .await
            .map_err(|e| SessionError::new(format!("URL did not connect: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<(), SessionError> {
        debug!(sql, "execute");
        sqlx::query(sql)
            .execute(&mut self.conn)
            .await
            .map(|_| ())
            .map_err(SessionError::from)
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, SessionError> {
        debug!(sql, "fetch_all");
        let rows = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(SessionError::from)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(row.len());
            for ix in 0..row.len() {
                values.push(row.try_get::<Option<String>, _>(ix).map_err(SessionError::from)?);
            }
            out.push(values);
        }
        Ok(out)
    }
}

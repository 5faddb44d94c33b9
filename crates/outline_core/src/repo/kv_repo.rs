//! Key-value repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide `get`/`put_all` over string keys and string values.
//! - Keep SQL details inside the repository boundary.
//!
//! # Invariants
//! - `put_all` writes every entry or none (single transaction).

use crate::db::DbError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from key-value persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection was not migrated; required table is missing.
    MissingRequiredTable(&'static str),
    /// Value cannot be encoded for storage.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "state repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid state data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::MissingRequiredTable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// String key-value storage consulted at load/save boundaries.
pub trait KeyValueRepository {
    /// Reads one value.
    fn get(&self, key: &str) -> RepoResult<Option<String>>;
    /// Upserts all entries atomically.
    fn put_all(&self, entries: &[(&str, String)]) -> RepoResult<()>;
}

/// SQLite-backed key-value repository.
pub struct SqliteKeyValueRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKeyValueRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'kv_store'
            );",
            [],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::MissingRequiredTable("kv_store"));
        }
        Ok(Self { conn })
    }
}

impl KeyValueRepository for SqliteKeyValueRepository<'_> {
    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1;", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put_all(&self, entries: &[(&str, String)]) -> RepoResult<()> {
        let now_ms = Utc::now().timestamp_millis();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value, now_ms])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyValueRepository, RepoError, SqliteKeyValueRepository};
    use crate::db::open_db_in_memory;
    use rusqlite::Connection;

    #[test]
    fn put_all_upserts_and_get_reads_back() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");

        repo.put_all(&[("a", "1".to_string()), ("b", "2".to_string())])
            .expect("first write");
        repo.put_all(&[("a", "3".to_string())]).expect("overwrite");

        assert_eq!(repo.get("a").expect("get a").as_deref(), Some("3"));
        assert_eq!(repo.get("b").expect("get b").as_deref(), Some("2"));
        assert_eq!(repo.get("missing").expect("get missing"), None);
    }

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().expect("raw connection");
        let err = SqliteKeyValueRepository::try_new(&conn)
            .err()
            .expect("unmigrated connection must be rejected");
        assert!(matches!(err, RepoError::MissingRequiredTable("kv_store")));
    }
}

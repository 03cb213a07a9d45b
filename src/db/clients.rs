//! SQLite-backed client store.
//!
//! One database file per store: the active client list and the archive of
//! fully contacted clients are separate files with the same schema.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{ClientStore, DbClient, DbError, OpenStore, RowId};
use crate::types::ClientKey;

pub struct ClientDb {
    conn: Connection,
    path: PathBuf,
}

impl ClientDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or create) a database file and apply the schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let mut conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let pre_upgrade = PathBuf::from(format!("{}.pre-upgrade.bak", path.display()));
        crate::migrations::upgrade(&mut conn, &pre_upgrade)?;

        Ok(Self { conn, path })
    }

    fn map_client_row(row: &rusqlite::Row) -> rusqlite::Result<(RowId, DbClient)> {
        Ok((
            row.get(0)?,
            DbClient {
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                last_visit: row.get(3)?,
                rem_date: row.get(4)?,
                email: row.get(5)?,
                times_contacted: row.get(6)?,
            },
        ))
    }
}

impl ClientStore for ClientDb {
    fn insert_client(&mut self, client: &DbClient) -> Result<RowId, DbError> {
        self.conn.execute(
            "INSERT INTO clients (first_name, last_name, last_visit, rem_date, email, times_contacted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                client.first_name,
                client.last_name,
                client.last_visit,
                client.rem_date,
                client.email,
                client.times_contacted,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn all_clients(&self) -> Result<Vec<(RowId, DbClient)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, last_visit, rem_date, email, times_contacted
             FROM clients ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::map_client_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn update_client(&mut self, id: RowId, client: &DbClient) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE clients
             SET first_name = ?1, last_name = ?2, last_visit = ?3, rem_date = ?4,
                 email = ?5, times_contacted = ?6
             WHERE id = ?7",
            params![
                client.first_name,
                client.last_name,
                client.last_visit,
                client.rem_date,
                client.email,
                client.times_contacted,
                id,
            ],
        )?;
        Ok(())
    }

    fn remove_client(&mut self, id: RowId) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM clients WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn clear(&mut self) -> Result<usize, DbError> {
        Ok(self.conn.execute("DELETE FROM clients", [])?)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) {
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            log::warn!("Rollback on {} failed: {}", self.path.display(), e);
        }
    }

    fn find_clients(&self, key: &ClientKey) -> Result<Vec<(RowId, DbClient)>, DbError> {
        // NOCASE only folds ASCII
        if !key.is_ascii() {
            return Ok(self
                .all_clients()?
                .into_iter()
                .filter(|(_, c)| key.matches(&c.first_name, &c.last_name))
                .collect());
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, last_visit, rem_date, email, times_contacted
             FROM clients
             WHERE first_name = ?1 COLLATE NOCASE AND last_name = ?2 COLLATE NOCASE
             ORDER BY id",
        )?;
        let rows = stmt.query_map(
            params![key.first_name(), key.last_name()],
            Self::map_client_row,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// A database file that can be opened as a client store.
#[derive(Debug, Clone)]
pub struct SqliteLocation {
    path: PathBuf,
}

impl SqliteLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OpenStore for SqliteLocation {
    type Store = ClientDb;

    fn open(&self) -> Result<ClientDb, DbError> {
        ClientDb::open_at(self.path.clone())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Copy a live database to `dest` with SQLite's online backup API.
pub fn backup_database(db: &ClientDb, dest: &Path) -> Result<PathBuf, DbError> {
    copy_database(db.conn_ref(), dest)?;
    log::info!("Database backed up to {}", dest.display());
    Ok(dest.to_path_buf())
}

pub(crate) fn copy_database(src: &Connection, dest: &Path) -> Result<(), DbError> {
    let mut backup_conn = Connection::open(dest)?;

    let backup = rusqlite::backup::Backup::new(src, &mut backup_conn)
        .map_err(|e| DbError::Backup(format!("Failed to initialize backup: {}", e)))?;

    // Client lists are small; copy every page in one step
    backup
        .step(-1)
        .map_err(|e| DbError::Backup(e.to_string()))?;
    Ok(())
}

//! Schema upgrades for client database files.
//!
//! The schema version is SQLite's `user_version` header field, so it travels
//! with the file it describes. Each step runs in its own transaction together
//! with its version bump. A step that fails leaves the file at the version it
//! had before that step.

use std::path::Path;

use rusqlite::{Connection, TransactionBehavior};

use crate::db::clients::copy_database;
use crate::db::DbError;

/// Step `n` (zero-based) brings a file to version `n + 1`.
const STEPS: &[&str] = &[include_str!("migrations/001_baseline.sql")];

pub fn schema_version(conn: &Connection) -> Result<u32, DbError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring `conn` up to the newest schema and return how many steps ran.
///
/// A file that already has a schema is copied to `backup_to` before its first
/// pending step. A file newer than this build is refused without changes.
pub fn upgrade(conn: &mut Connection, backup_to: &Path) -> Result<usize, DbError> {
    apply_steps(conn, STEPS, backup_to)
}

fn apply_steps(conn: &mut Connection, steps: &[&str], backup_to: &Path) -> Result<usize, DbError> {
    let found = schema_version(conn)?;
    let supported = steps.len() as u32;
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }
    if found == supported {
        return Ok(0);
    }

    if found > 0 {
        copy_database(conn, backup_to)?;
        log::info!(
            "Copied the v{} database to {} before upgrading",
            found,
            backup_to.display()
        );
    }

    for (index, sql) in steps.iter().enumerate().skip(found as usize) {
        let version = index as u32 + 1;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(sql)
            .map_err(|source| DbError::Migration { version, source })?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        log::info!("Schema upgraded to v{}", version);
    }

    Ok((supported - found) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn test_fresh_db_reaches_latest_version() {
        let mut conn = mem_db();
        let applied = upgrade(&mut conn, Path::new("unused.bak")).expect("upgrade should succeed");
        assert_eq!(applied, STEPS.len());
        assert_eq!(schema_version(&conn).unwrap(), 1);
        assert!(table_exists(&conn, "idx_clients_full_name"));

        conn.execute(
            "INSERT INTO clients (first_name, last_name, last_visit, rem_date, email)
             VALUES ('Rob', 'Bob', '3/5/2018', '11/16/2026', NULL)",
            [],
        )
        .expect("clients table should exist");
        let contacted: i64 = conn
            .query_row("SELECT times_contacted FROM clients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(contacted, 0);
    }

    #[test]
    fn test_negative_contact_count_rejected() {
        let mut conn = mem_db();
        upgrade(&mut conn, Path::new("unused.bak")).unwrap();
        let result = conn.execute(
            "INSERT INTO clients (first_name, last_name, last_visit, rem_date, times_contacted)
             VALUES ('a', 'b', '1/1/2020', '1/1/2020', -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_newer_file_is_refused_untouched() {
        let mut conn = mem_db();
        conn.pragma_update(None, "user_version", 7u32).unwrap();

        match upgrade(&mut conn, Path::new("unused.bak")) {
            Err(DbError::SchemaTooNew { found, supported }) => {
                assert_eq!(found, 7);
                assert_eq!(supported, 1);
            }
            other => panic!("expected SchemaTooNew, got {:?}", other),
        }
        assert!(!table_exists(&conn, "clients"));
    }

    #[test]
    fn test_second_upgrade_is_a_no_op() {
        let mut conn = mem_db();
        assert_eq!(upgrade(&mut conn, Path::new("unused.bak")).unwrap(), 1);
        assert_eq!(upgrade(&mut conn, Path::new("unused.bak")).unwrap(), 0);
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_failed_step_keeps_previous_version() {
        let mut conn = mem_db();
        let steps = [
            STEPS[0],
            "CREATE TABLE notes (body TEXT); INSERT INTO no_such_table VALUES (1);",
        ];

        match apply_steps(&mut conn, &steps, Path::new("unused.bak")) {
            Err(DbError::Migration { version, .. }) => assert_eq!(version, 2),
            other => panic!("expected Migration error, got {:?}", other),
        }
        assert_eq!(schema_version(&conn).unwrap(), 1);
        assert!(table_exists(&conn, "clients"));
        assert!(!table_exists(&conn, "notes"), "half-applied step should roll back");

        // Fixing the step lets the same file move on
        let fixed = [STEPS[0], "CREATE TABLE notes (body TEXT);"];
        assert_eq!(apply_steps(&mut conn, &fixed, Path::new("unused.bak")).unwrap(), 1);
        assert_eq!(schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_copy_taken_only_when_upgrading_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("clients.db");
        let backup_path = dir.path().join("clients.db.pre-upgrade.bak");

        let mut conn = Connection::open(&db_path).expect("open db");
        apply_steps(&mut conn, &STEPS[..1], &backup_path).unwrap();
        assert!(!backup_path.exists(), "a brand-new file has nothing to keep");

        conn.execute(
            "INSERT INTO clients (first_name, last_name, last_visit, rem_date)
             VALUES ('Jim', 'Smith', '3/12/2017', '3/21/2019')",
            [],
        )
        .unwrap();
        let steps = [STEPS[0], "ALTER TABLE clients ADD COLUMN phone TEXT;"];
        assert_eq!(apply_steps(&mut conn, &steps, &backup_path).unwrap(), 1);
        assert!(backup_path.exists());

        let copy = Connection::open(&backup_path).unwrap();
        assert_eq!(schema_version(&copy).unwrap(), 1);
        let rows: i64 = copy
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}

//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dates::{format_date, DateNormalizer};
use crate::types::{ClientKey, ClientRecord};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema step v{version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database schema v{found} is newer than this build supports (v{supported})")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("Stored client {name} has an unreadable {field}: {value}")]
    CorruptRecord {
        name: String,
        field: &'static str,
        value: String,
    },

    #[error("Backup failed: {0}")]
    Backup(String),
}

/// Row id within one store.
pub type RowId = i64;

/// A row from the `clients` table, dates kept as stored `M/D/Y` text.
///
/// The JSON names are the external record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbClient {
    pub first_name: String,
    pub last_name: String,
    pub last_visit: String,
    #[serde(rename = "rem date")]
    pub rem_date: String,
    pub email: Option<String>,
    #[serde(rename = "times contacted")]
    pub times_contacted: u32,
}

impl DbClient {
    pub fn key(&self) -> ClientKey {
        ClientKey::new(&self.first_name, &self.last_name)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Read the stored dates back into a validated record.
    pub fn to_record(&self, dates: &DateNormalizer) -> Result<ClientRecord, DbError> {
        let last_visit =
            dates
                .parse_stored(&self.last_visit)
                .map_err(|_| DbError::CorruptRecord {
                    name: self.full_name(),
                    field: "last visit",
                    value: self.last_visit.clone(),
                })?;
        let reminder_date =
            dates
                .parse_stored(&self.rem_date)
                .map_err(|_| DbError::CorruptRecord {
                    name: self.full_name(),
                    field: "rem date",
                    value: self.rem_date.clone(),
                })?;
        Ok(ClientRecord {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            last_visit,
            reminder_date,
            email: self.email.clone(),
            times_contacted: self.times_contacted,
        })
    }
}

impl From<&ClientRecord> for DbClient {
    fn from(record: &ClientRecord) -> Self {
        Self {
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            last_visit: format_date(record.last_visit),
            rem_date: format_date(record.reminder_date),
            email: record.email.clone(),
            times_contacted: record.times_contacted,
        }
    }
}

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::format_date;

/// Configuration stored in ~/.reactivate/config.json
///
/// Every field is optional in the file; paths left unset resolve under
/// `~/.reactivate/` (see `state`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// Destination for clients removed after too many contacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    /// Line-per-client bulk input, rewritten after every import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox_path: Option<PathBuf>,
    /// Days from today until a new or just-contacted client is due again.
    #[serde(default = "default_reminder_offset_days")]
    pub reminder_offset_days: u32,
    /// Visits older than this many 52-week years are refused.
    #[serde(default = "default_max_age_years")]
    pub max_age_years: u32,
    /// Clients contacted more often than this are archived.
    #[serde(default = "default_removal_threshold")]
    pub removal_threshold: u32,
    #[serde(default)]
    pub sender: SenderConfig,
}

fn default_reminder_offset_days() -> u32 {
    30
}

fn default_max_age_years() -> u32 {
    11
}

fn default_removal_threshold() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            archive_path: None,
            staging_path: None,
            template_path: None,
            outbox_path: None,
            reminder_offset_days: default_reminder_offset_days(),
            max_age_years: default_max_age_years(),
            removal_threshold: default_removal_threshold(),
            sender: SenderConfig::default(),
        }
    }
}

/// Who reminder messages come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderConfig {
    #[serde(default = "default_sender_name")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_contact_number")]
    pub contact_number: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_sender_name() -> String {
    "Business owner name".to_string()
}

fn default_contact_number() -> String {
    "123-456-7890".to_string()
}

fn default_subject() -> String {
    "We miss you!".to_string()
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            name: default_sender_name(),
            email: String::new(),
            contact_number: default_contact_number(),
            subject: default_subject(),
        }
    }
}

/// Case-insensitive full-name key. Two different people sharing a name are
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    first_name: String,
    last_name: String,
}

impl ClientKey {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_lowercase(),
            last_name: last_name.to_lowercase(),
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn is_ascii(&self) -> bool {
        self.first_name.is_ascii() && self.last_name.is_ascii()
    }

    pub fn matches(&self, first_name: &str, last_name: &str) -> bool {
        self.first_name == first_name.to_lowercase() && self.last_name == last_name.to_lowercase()
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// A fully validated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub first_name: String,
    pub last_name: String,
    pub last_visit: NaiveDate,
    pub reminder_date: NaiveDate,
    pub email: Option<String>,
    pub times_contacted: u32,
}

impl ClientRecord {
    pub fn key(&self) -> ClientKey {
        ClientKey::new(&self.first_name, &self.last_name)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether outreach can actually reach this client.
    pub fn is_contactable(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty())
    }
}

impl fmt::Display for ClientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, Client's last visit: {}, Client to be reminded on {}, Client's email: {}",
            self.full_name(),
            format_date(self.last_visit),
            format_date(self.reminder_date),
            self.email.as_deref().unwrap_or("None"),
        )
    }
}

pub mod dates;
pub mod db;
pub mod email;
pub mod error;
pub mod ingest;
pub mod lifecycle;
mod migrations;
pub mod outreach;
pub mod selector;
pub mod state;
pub mod types;
pub mod validate;

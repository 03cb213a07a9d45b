//! Client ingestion: one hand-entered record, or a staging file of many.
//!
//! A batch never stops on a bad line. Accepted lines are written to the
//! store, rejected lines are sorted into the five failure buckets, and the
//! staging file is then rewritten to hold only the rejected lines so the
//! next import picks up exactly what still needs fixing.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::db::{with_store, ClientStore, DbClient, DbError, OpenStore};
use crate::error::{FailureBucket, ValidationError};
use crate::types::ClientRecord;
use crate::validate::{InteractiveInput, RecordValidator};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("Database error: {0}")]
    Store(#[from] DbError),

    #[error("Staging file {path}: {source}")]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Validate one record and store it. Nothing is written on failure.
pub fn ingest_single<S: ClientStore>(
    store: &mut S,
    validator: &RecordValidator,
    input: &InteractiveInput,
) -> Result<ClientRecord, IngestError> {
    let record = validator.validate_interactive(input)?;
    store.insert_client(&DbClient::from(&record))?;
    log::info!("Added client {}", record.full_name());
    Ok(record)
}

/// What the operator sees after adding a client by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveOutcome {
    /// The stored client, or `None` when nothing was ingested.
    pub record: Option<ClientRecord>,
    pub message: String,
}

/// Add one client and describe the result. Never returns an error: every
/// failure becomes a readable message and an empty `record`.
pub fn ingest_interactive<O: OpenStore>(
    location: &O,
    validator: &RecordValidator,
    input: &InteractiveInput,
) -> InteractiveOutcome {
    match with_store(location, |store| ingest_single(store, validator, input)) {
        Ok(record) => InteractiveOutcome {
            message: format!("Client added: {}", record),
            record: Some(record),
        },
        Err(IngestError::Invalid(e)) => {
            log::debug!("Rejected client input: {}", e);
            InteractiveOutcome {
                record: None,
                message: format!("{}. {}", e, e.recovery_suggestion()),
            }
        }
        Err(e) => {
            log::error!("Could not add client to {}: {}", location.describe(), e);
            InteractiveOutcome {
                record: None,
                message: format!("Client not added: {}", e),
            }
        }
    }
}

/// One staging line that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line: String,
    pub error: ValidationError,
}

/// Result of one pass over a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Full names of clients written to the store, in input order.
    pub written: Vec<String>,
    pub failures: BTreeMap<FailureBucket, Vec<RejectedLine>>,
    /// Valid lines the store refused to take. They go back to staging.
    pub unpersisted: Vec<String>,
}

impl BatchReport {
    pub fn bucket(&self, bucket: FailureBucket) -> &[RejectedLine] {
        self.failures.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rejected_count(&self) -> usize {
        self.failures.values().map(Vec::len).sum()
    }

    /// Lines to keep for the next import: each bucket in declaration order,
    /// then anything the store refused.
    pub fn requeue_lines(&self) -> Vec<String> {
        FailureBucket::ALL
            .iter()
            .flat_map(|b| self.bucket(*b).iter().map(|r| r.line.clone()))
            .chain(self.unpersisted.iter().cloned())
            .collect()
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} written", self.written.len())];
        for bucket in FailureBucket::ALL {
            let count = self.bucket(bucket).len();
            if count > 0 {
                parts.push(format!("{}: {}", bucket.label(), count));
            }
        }
        if !self.unpersisted.is_empty() {
            parts.push(format!("not saved: {}", self.unpersisted.len()));
        }
        parts.join(", ")
    }
}

/// Validate and store every non-blank line. One line's failure never affects
/// another.
pub fn ingest_batch<S, L>(store: &mut S, validator: &RecordValidator, lines: &[L]) -> BatchReport
where
    S: ClientStore,
    L: AsRef<str>,
{
    let mut report = BatchReport::default();
    for raw in lines {
        let line = raw.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        match validator.validate_line(line) {
            Ok(record) => match store.insert_client(&DbClient::from(&record)) {
                Ok(_) => report.written.push(record.full_name()),
                Err(e) => {
                    log::error!("Failed to store {}: {}", record.full_name(), e);
                    report.unpersisted.push(line.to_string());
                }
            },
            Err(error) => {
                log::debug!("Rejected staging line {:?}: {}", line, error);
                report
                    .failures
                    .entry(error.bucket())
                    .or_default()
                    .push(RejectedLine {
                        line: line.to_string(),
                        error,
                    });
            }
        }
    }
    report
}

/// Import the staging file, then rewrite it with only the lines that still
/// need attention. A missing file is an empty batch.
///
/// The file is rewritten once, after every line is classified and the store
/// work has committed. If the store fails to commit, the file is untouched.
pub fn ingest_staging_file<O: OpenStore>(
    staging: &Path,
    location: &O,
    validator: &RecordValidator,
) -> Result<BatchReport, IngestError> {
    if !staging.exists() {
        log::info!("No staging file at {}; nothing to import", staging.display());
        return Ok(BatchReport::default());
    }
    let content = std::fs::read_to_string(staging).map_err(|source| IngestError::Staging {
        path: staging.to_path_buf(),
        source,
    })?;
    let lines: Vec<&str> = content.lines().collect();

    let report = with_store(location, |store| {
        Ok::<_, IngestError>(ingest_batch(store, validator, &lines))
    })?;

    rewrite_staging(staging, &report.requeue_lines())?;
    log::info!("Import from {}: {}", staging.display(), report.summary());
    Ok(report)
}

fn rewrite_staging(staging: &Path, lines: &[String]) -> Result<(), IngestError> {
    let io_err = |source| IngestError::Staging {
        path: staging.to_path_buf(),
        source,
    };
    let dir = match staging.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    for line in lines {
        writeln!(tmp, "{}", line).map_err(io_err)?;
    }
    tmp.persist(staging).map_err(|e| io_err(e.error))?;
    Ok(())
}

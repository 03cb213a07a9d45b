//! Error types for client validation and outreach
//!
//! Validation failures are classified into a fixed taxonomy so the caller can
//! report each category separately:
//! - Shape: wrong number of terms, malformed email
//! - Date: bad format, impossible calendar date, too old, wrong side of today

use thiserror::Error;

use crate::dates::DateError;
use crate::db::DbError;

/// Which temporal side a date is not allowed to fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalConstraint {
    None,
    MustNotBeFuture,
    MustNotBePast,
}

impl TemporalConstraint {
    pub fn describe(self) -> &'static str {
        match self {
            TemporalConstraint::None => "unconstrained",
            TemporalConstraint::MustNotBeFuture => "must not be in the future",
            TemporalConstraint::MustNotBePast => "must not be in the past",
        }
    }
}

/// Classified reason a client record was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Expected 3 to 5 terms (first name, last name, last visit, reminder date, email), found {found}")]
    IncorrectNumberOfTerms { found: usize },

    #[error("Incorrect date formatting: {raw}")]
    DateFormat { raw: String },

    #[error("Impossible date: {raw}")]
    DateRange { raw: String },

    #[error("Date too far in past: {raw}")]
    DateTooFarInPast { raw: String },

    #[error("Date {raw} {}", .constraint.describe())]
    TemporalConstraint {
        raw: String,
        constraint: TemporalConstraint,
    },

    #[error("Email does not contain '@' sign: {email}")]
    InvalidEmail { email: String },
}

/// Copyable tag for a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IncorrectNumberOfTerms,
    DateFormat,
    DateRange,
    DateTooFarInPast,
    TemporalConstraint,
    InvalidEmail,
}

/// Batch failure buckets, in the order they are reported and written back to
/// the staging file.
///
/// Impossible dates and dates on the wrong side of today share the
/// `BadDate` bucket; every other kind has a bucket of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureBucket {
    IncorrectNumberOfTerms,
    BadDate,
    DateFormat,
    DateTooFarInPast,
    InvalidEmail,
}

impl FailureBucket {
    pub const ALL: [FailureBucket; 5] = [
        FailureBucket::IncorrectNumberOfTerms,
        FailureBucket::BadDate,
        FailureBucket::DateFormat,
        FailureBucket::DateTooFarInPast,
        FailureBucket::InvalidEmail,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FailureBucket::IncorrectNumberOfTerms => "Incorrect number of terms",
            FailureBucket::BadDate => "Bad date",
            FailureBucket::DateFormat => "Incorrect date formatting",
            FailureBucket::DateTooFarInPast => "Date too far in past",
            FailureBucket::InvalidEmail => "Email does not contain '@' sign",
        }
    }
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::IncorrectNumberOfTerms { .. } => ErrorKind::IncorrectNumberOfTerms,
            ValidationError::DateFormat { .. } => ErrorKind::DateFormat,
            ValidationError::DateRange { .. } => ErrorKind::DateRange,
            ValidationError::DateTooFarInPast { .. } => ErrorKind::DateTooFarInPast,
            ValidationError::TemporalConstraint { .. } => ErrorKind::TemporalConstraint,
            ValidationError::InvalidEmail { .. } => ErrorKind::InvalidEmail,
        }
    }

    pub fn bucket(&self) -> FailureBucket {
        match self.kind() {
            ErrorKind::IncorrectNumberOfTerms => FailureBucket::IncorrectNumberOfTerms,
            ErrorKind::DateRange | ErrorKind::TemporalConstraint => FailureBucket::BadDate,
            ErrorKind::DateFormat => FailureBucket::DateFormat,
            ErrorKind::DateTooFarInPast => FailureBucket::DateTooFarInPast,
            ErrorKind::InvalidEmail => FailureBucket::InvalidEmail,
        }
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ValidationError::IncorrectNumberOfTerms { .. } => {
                "Input requires first name, last name and date of last visit."
            }
            ValidationError::DateFormat { .. } => {
                "Use the date format mm/dd/yyyy or mm-dd-yyyy and try again."
            }
            ValidationError::DateRange { .. } => "That date does not exist. Check month and day.",
            ValidationError::DateTooFarInPast { .. } => {
                "Clients whose last visit is this old are not tracked."
            }
            ValidationError::TemporalConstraint { constraint, .. } => match constraint {
                TemporalConstraint::MustNotBeFuture => {
                    "The date of last visit cannot be in the future."
                }
                TemporalConstraint::MustNotBePast => "The reminder date cannot be in the past.",
                TemporalConstraint::None => "Check the date and try again.",
            },
            ValidationError::InvalidEmail { .. } => "Check the email address and try again.",
        }
    }
}

impl From<DateError> for ValidationError {
    fn from(err: DateError) -> Self {
        match err {
            DateError::Format(raw) => ValidationError::DateFormat { raw },
            DateError::Range(raw) => ValidationError::DateRange { raw },
            DateError::TooFarInPast(raw) => ValidationError::DateTooFarInPast { raw },
            DateError::TemporalConstraint { raw, constraint } => {
                ValidationError::TemporalConstraint { raw, constraint }
            }
        }
    }
}

/// Errors raised while delivering reminder messages.
#[derive(Debug, Error)]
pub enum OutreachError {
    #[error("Failed to read message template {path}: {source}")]
    Template {
        path: String,
        source: std::io::Error,
    },

    #[error("Message template references unknown placeholder ${0}")]
    UnknownPlaceholder(String),

    #[error("Failed to deliver message to {recipient}: {reason}")]
    Delivery { recipient: String, reason: String },

    #[error("Database error: {0}")]
    Store(#[from] DbError),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for OutreachError {
    fn from(err: std::io::Error) -> Self {
        OutreachError::IoError(err.to_string())
    }
}

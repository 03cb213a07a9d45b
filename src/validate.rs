//! Whole-record validation for incoming clients.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. term count
//! 2. last visit (must not be in the future)
//! 3. reminder date (bulk: any side of today; interactive: not in the past),
//!    defaulting to today plus the reminder offset when omitted
//! 4. email shape

use crate::dates::{DateNormalizer, TemporalConstraint};
use crate::email::validate_email;
use crate::error::ValidationError;
use crate::types::ClientRecord;

const MIN_BULK_TERMS: usize = 3;
const MAX_BULK_TERMS: usize = 5;

/// One client entered by hand: three positional fields plus optional
/// named overrides.
#[derive(Debug, Clone, Default)]
pub struct InteractiveInput {
    pub positional: Vec<String>,
    pub reminder_date: Option<String>,
    pub email: Option<String>,
}

impl InteractiveInput {
    pub fn new(first_name: &str, last_name: &str, last_visit: &str) -> Self {
        Self {
            positional: vec![
                first_name.to_string(),
                last_name.to_string(),
                last_visit.to_string(),
            ],
            ..Default::default()
        }
    }

    pub fn with_reminder_date(mut self, raw: &str) -> Self {
        self.reminder_date = Some(raw.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordValidator {
    dates: DateNormalizer,
}

impl RecordValidator {
    pub fn new(dates: DateNormalizer) -> Self {
        Self { dates }
    }

    pub fn dates(&self) -> &DateNormalizer {
        &self.dates
    }

    /// Validate one staging line (whitespace-separated fields).
    pub fn validate_line(&self, line: &str) -> Result<ClientRecord, ValidationError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        self.validate_bulk(&tokens)
    }

    /// Validate positional bulk fields:
    /// `first last last_visit [reminder_date [email]]`.
    pub fn validate_bulk(&self, tokens: &[&str]) -> Result<ClientRecord, ValidationError> {
        if !(MIN_BULK_TERMS..=MAX_BULK_TERMS).contains(&tokens.len()) {
            return Err(ValidationError::IncorrectNumberOfTerms {
                found: tokens.len(),
            });
        }
        self.build(
            tokens[0],
            tokens[1],
            tokens[2],
            tokens.get(3).copied(),
            TemporalConstraint::None,
            tokens.get(4).copied(),
        )
    }

    /// Validate a hand-entered client.
    pub fn validate_interactive(
        &self,
        input: &InteractiveInput,
    ) -> Result<ClientRecord, ValidationError> {
        let found: usize = input
            .positional
            .iter()
            .map(|field| field.split_whitespace().count())
            .sum();
        if input.positional.len() != MIN_BULK_TERMS || found != MIN_BULK_TERMS {
            return Err(ValidationError::IncorrectNumberOfTerms { found });
        }
        self.build(
            &input.positional[0],
            &input.positional[1],
            &input.positional[2],
            input.reminder_date.as_deref(),
            TemporalConstraint::MustNotBePast,
            input.email.as_deref(),
        )
    }

    fn build(
        &self,
        first_name: &str,
        last_name: &str,
        last_visit: &str,
        reminder_date: Option<&str>,
        reminder_constraint: TemporalConstraint,
        email: Option<&str>,
    ) -> Result<ClientRecord, ValidationError> {
        let last_visit = self
            .dates
            .parse_constrained(last_visit, TemporalConstraint::MustNotBeFuture)?;

        let reminder_date = match reminder_date {
            Some(raw) => self.dates.parse_constrained(raw, reminder_constraint)?,
            None => self.dates.default_reminder_date(),
        };

        if !validate_email(email) {
            return Err(ValidationError::InvalidEmail {
                email: email.unwrap_or_default().to_string(),
            });
        }

        Ok(ClientRecord {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            last_visit,
            reminder_date,
            email: email.filter(|e| !e.is_empty()).map(str::to_string),
            times_contacted: 0,
        })
    }
}

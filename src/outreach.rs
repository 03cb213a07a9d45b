//! Confirmed reminder outreach.
//!
//! Sending is two-phase. [`propose`] turns the due list into a
//! [`ConfirmationToken`] without touching anything. The operator then either
//! [`commit`]s the token, which sends, records the contacts and archives, or
//! [`decline`]s it, which does nothing at all. A token is consumed either way.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::dates::DateNormalizer;
use crate::db::{with_store, OpenStore};
use crate::email::{build_messages, MessageTemplate, Transport};
use crate::error::OutreachError;
use crate::lifecycle::{archive_overdue_between, record_outreach};
use crate::types::{ClientKey, ClientRecord, SenderConfig};

/// A proposed batch of reminders awaiting a yes or no.
#[derive(Debug)]
pub struct ConfirmationToken {
    id: Uuid,
    proposed_at: NaiveDateTime,
    recipients: Vec<ClientRecord>,
    skipped: Vec<ClientRecord>,
}

impl ConfirmationToken {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn proposed_at(&self) -> NaiveDateTime {
        self.proposed_at
    }

    /// Candidates with an email address; these are who a commit will message.
    pub fn recipients(&self) -> &[ClientRecord] {
        &self.recipients
    }

    /// Candidates with no email address. They are never messaged or counted.
    pub fn skipped(&self) -> &[ClientRecord] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Split the candidates into who can be reached and who can't.
pub fn propose(candidates: Vec<ClientRecord>, dates: &DateNormalizer) -> ConfirmationToken {
    let (recipients, skipped): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(ClientRecord::is_contactable);
    let token = ConfirmationToken {
        id: Uuid::new_v4(),
        proposed_at: dates.clock().now(),
        recipients,
        skipped,
    };
    log::info!(
        "Proposed outreach {}: {} recipients, {} without email",
        token.id,
        token.recipients.len(),
        token.skipped.len()
    );
    token
}

/// Everything a commit needs besides the stores.
pub struct Dispatch<'a, T: Transport> {
    pub template: &'a MessageTemplate,
    pub sender: &'a SenderConfig,
    pub transport: &'a mut T,
    pub dates: &'a DateNormalizer,
    pub removal_threshold: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutreachOutcome {
    pub token_id: Uuid,
    /// Full names of clients a message was handed to.
    pub sent: Vec<String>,
    /// `(full name, reason)` for sends that failed.
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
    /// Rows whose contact count went up.
    pub recorded: usize,
    pub archived: Vec<String>,
}

/// Send the proposed reminders, then count a contact for each client
/// actually sent to and archive anyone now past the removal threshold.
///
/// Every message is rendered before the first send, so a template problem
/// sends nothing and changes nothing.
pub fn commit<O, P, T>(
    token: ConfirmationToken,
    mut dispatch: Dispatch<'_, T>,
    active: &O,
    archive: &P,
) -> Result<OutreachOutcome, OutreachError>
where
    O: OpenStore,
    P: OpenStore,
    T: Transport,
{
    let messages = build_messages(&token.recipients, dispatch.template, dispatch.sender)?;

    let mut outcome = OutreachOutcome {
        token_id: token.id,
        skipped: token.skipped.iter().map(ClientRecord::full_name).collect(),
        ..Default::default()
    };
    let mut reached: Vec<ClientKey> = Vec::new();
    for (recipient, message) in &messages {
        match dispatch.transport.send(message) {
            Ok(()) => {
                reached.push(recipient.key());
                outcome.sent.push(recipient.full_name());
            }
            Err(e) => {
                log::warn!("Reminder to {} not sent: {}", recipient.full_name(), e);
                outcome.failed.push((recipient.full_name(), e.to_string()));
            }
        }
    }

    if reached.is_empty() {
        log::info!("Outreach {}: no reminders sent", token.id);
        return Ok(outcome);
    }

    outcome.recorded = with_store(active, |store| {
        record_outreach(store, dispatch.dates, &reached)
    })
    .inspect_err(|e| {
        log::error!(
            "Reminders went to {} but the contact count was not saved: {}",
            outcome.sent.join(", "),
            e
        )
    })?;
    outcome.archived = archive_overdue_between(active, archive, dispatch.removal_threshold)?;

    log::info!(
        "Outreach {}: {} sent, {} failed, {} archived",
        token.id,
        outcome.sent.len(),
        outcome.failed.len(),
        outcome.archived.len()
    );
    Ok(outcome)
}

/// Drop a proposal. No message is sent and no store is opened.
pub fn decline(token: ConfirmationToken) -> Uuid {
    log::info!(
        "Outreach {} declined; {} reminders not sent",
        token.id,
        token.recipients.len()
    );
    token.id
}

//! Reminder messages: email shape check, template rendering and delivery.
//!
//! Actual SMTP delivery lives outside this crate. A [`Transport`] receives
//! fully rendered messages; the bundled [`OutboxTransport`] appends them to an
//! NDJSON file that a mail relay can drain.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::OutreachError;
use crate::types::{ClientRecord, SenderConfig};

/// The only shape check performed: an address must contain `@`.
/// An absent or empty address passes.
pub fn validate_email(email: Option<&str>) -> bool {
    match email {
        None => true,
        Some(e) if e.is_empty() => true,
        Some(e) => e.contains('@'),
    }
}

const DEFAULT_TEMPLATE: &str = "Dear ${PERSON_NAME},

It has been a while since your last visit and we miss you! Give us a call at \
${PHONE} to book your next appointment.

Best wishes,
${YOUR_NAME}
";

fn re_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\})").unwrap()
    })
}

/// Message body with `$NAME` / `${NAME}` placeholders; `$$` is a literal `$`.
///
/// Known placeholders: `PERSON_NAME`, `PHONE`, `YOUR_NAME`.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    text: String,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl MessageTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_file(path: &Path) -> Result<Self, OutreachError> {
        let text = std::fs::read_to_string(path).map_err(|source| OutreachError::Template {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(text))
    }

    /// Load from `path` when given, otherwise use the built-in text.
    pub fn load(path: Option<&Path>) -> Result<Self, OutreachError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String, OutreachError> {
        let mut missing: Option<String> = None;
        let rendered = re_placeholder().replace_all(&self.text, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match values.get(name) {
                Some(value) => value.to_string(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(name) => Err(OutreachError::UnknownPlaceholder(name)),
            None => Ok(rendered.into_owned()),
        }
    }

    /// Render the reminder for one recipient.
    pub fn render_for(
        &self,
        recipient: &ClientRecord,
        sender: &SenderConfig,
    ) -> Result<String, OutreachError> {
        let values = HashMap::from([
            ("PERSON_NAME", recipient.first_name.as_str()),
            ("PHONE", sender.contact_number.as_str()),
            ("YOUR_NAME", sender.name.as_str()),
        ]);
        self.render(&values)
    }
}

/// A rendered reminder ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Render one message per contactable recipient. Recipients without an
/// address get nothing.
pub fn build_messages(
    recipients: &[ClientRecord],
    template: &MessageTemplate,
    sender: &SenderConfig,
) -> Result<Vec<(ClientRecord, OutboundMessage)>, OutreachError> {
    let mut out = Vec::new();
    for recipient in recipients {
        let Some(to) = recipient.email.as_deref().filter(|e| !e.is_empty()) else {
            continue;
        };
        let message = OutboundMessage {
            from: sender.email.clone(),
            to: to.to_string(),
            subject: sender.subject.clone(),
            body: template.render_for(recipient, sender)?,
        };
        out.push((recipient.clone(), message));
    }
    Ok(out)
}

/// Delivers one message at a time. A send either completes or fails; there is
/// no cancellation of a message already handed over.
pub trait Transport {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), OutreachError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboxEntry<'a> {
    queued_at: String,
    #[serde(flatten)]
    message: &'a OutboundMessage,
}

/// Appends each message as one JSON line to an outbox file.
#[derive(Debug, Clone)]
pub struct OutboxTransport {
    path: PathBuf,
}

impl OutboxTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Transport for OutboxTransport {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), OutreachError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let entry = OutboxEntry {
            queued_at: Utc::now().to_rfc3339(),
            message,
        };
        let line = serde_json::to_string(&entry).map_err(|e| OutreachError::Delivery {
            recipient: message.to.clone(),
            reason: e.to_string(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        log::debug!("Queued reminder for {} in {}", message.to, self.path.display());
        Ok(())
    }
}

/// Keeps every message in memory. Addresses listed in `fail_for` are refused.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    pub sent: Vec<OutboundMessage>,
    pub fail_for: Vec<String>,
}

impl Transport for RecordingTransport {
    fn send(&mut self, message: &OutboundMessage) -> Result<(), OutreachError> {
        if self.fail_for.iter().any(|addr| addr == &message.to) {
            return Err(OutreachError::Delivery {
                recipient: message.to.clone(),
                reason: "refused by recipient server".to_string(),
            });
        }
        self.sent.push(message.clone());
        Ok(())
    }
}

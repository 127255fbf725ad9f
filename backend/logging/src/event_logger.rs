//! Portal Event Logger
//!
//! Structured session/dispatch events (login, re-authentication, portal
//! switches, response classification) written through `tracing` under the
//! `portal_events` target, so they land in the NDJSON file as one record each.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortalEvent {
    LoginAttempt {
        username: String,
        base_url: String,
    },
    LoginFinished {
        username: String,
        success: bool,
        detail: String,
    },
    Reauthenticating {
        portal_id: String,
    },
    PortalSwitch {
        from: String,
        to: String,
    },
    Classified {
        portal_id: String,
        status: u16,
        outcome: String,
    },
    AvailabilityResolved {
        state: String,
        portal_ids: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: PortalEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Redact free-text fields and emit the event.
    pub fn log_event(mut event: PortalEvent) -> EventLogEntry {
        match &mut event {
            PortalEvent::LoginFinished { detail, .. } => {
                *detail = redact_sensitive_data(detail);
            }
            PortalEvent::Classified { outcome, .. } => {
                *outcome = redact_sensitive_data(outcome);
            }
            _ => {}
        }

        let entry = EventLogEntry {
            timestamp: Utc::now(),
            event,
        };

        let json = serde_json::to_string(&entry.event).unwrap_or_default();
        info!(target: "portal_events", event = %json, "Portal event");
        entry
    }
}

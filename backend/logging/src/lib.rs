//! Telemetry and structured logging for PortalChat.
//!
//! Handles log redaction, console/NDJSON output, file rotation, and the
//! portal session event log.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, PortalEvent};
pub use logger::init_logger;
pub use redact::{body_preview, redact_sensitive_data};

//! Eve — Suricata eve.json wire model, normalization and classification.

pub mod classify;
pub mod model;
pub mod parse;

pub use model::{
    AlertData, DnsData, EveEnvelope, EventDetail, FlowData, HttpData, NormalizedEvent,
    ParseError, SshData, TenantId, TlsData,
};
pub use parse::{decode, Parser};

/// Subject prefix for normalized event publishes.
pub const EVENT_SUBJECT_PREFIX: &str = "events.";

/// Subject used when an event carries no type tag.
pub const DEFAULT_EVENT_SUBJECT: &str = "events.eve";

/// Wildcard pattern matching every event subject.
pub const EVENT_SUBJECT_PATTERN: &str = "events.*";

/// Map an event type to its broker subject.
///
/// Pure function: `events.<event_type>`, or [`DEFAULT_EVENT_SUBJECT`]
/// when the type tag is empty.
pub fn subject_for(event_type: &str) -> String {
    if event_type.is_empty() {
        DEFAULT_EVENT_SUBJECT.to_string()
    } else {
        format!("{}{}", EVENT_SUBJECT_PREFIX, event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_for_typed_event() {
        assert_eq!(subject_for("alert"), "events.alert");
        assert_eq!(subject_for("dns"), "events.dns");
    }

    #[test]
    fn test_subject_for_empty_type_falls_back() {
        assert_eq!(subject_for(""), "events.eve");
    }
}

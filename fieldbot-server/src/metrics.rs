// Service metrics. Recording is a no-op until an exporter installs a recorder.

use fieldbot_core::ACTIONS_TRIGGERED;
use fieldbot_eye::CAPTURE_FAILURES;
use metrics::{counter, describe_counter, describe_gauge, gauge};

pub const SESSIONS_ACTIVE: &str = "fieldbot_sessions_active";
pub const PAYLOADS_SENT: &str = "fieldbot_payloads_sent_total";
pub const COMMANDS: &str = "fieldbot_commands_total";
pub const MALFORMED_COMMANDS: &str = "fieldbot_malformed_commands_total";

/// Register descriptions for every metric the service emits
pub fn describe() {
    describe_gauge!(SESSIONS_ACTIVE, "Open streaming sessions");
    describe_counter!(PAYLOADS_SENT, "Telemetry payloads delivered");
    describe_counter!(COMMANDS, "Control commands applied, by kind");
    describe_counter!(MALFORMED_COMMANDS, "Control messages that failed to parse");
    describe_counter!(CAPTURE_FAILURES, "Failed camera grabs or decodes");
    describe_counter!(ACTIONS_TRIGGERED, "Transitions into ACTION_TRIGGERED");
}

pub fn record_session_opened() {
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

pub fn record_session_closed() {
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

pub fn record_payload_sent() {
    counter!(PAYLOADS_SENT).increment(1);
}

pub fn record_command(kind: &'static str) {
    counter!(COMMANDS, "kind" => kind).increment(1);
}

pub fn record_malformed_command() {
    counter!(MALFORMED_COMMANDS).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_shared_and_unique() {
        let names = [
            SESSIONS_ACTIVE,
            PAYLOADS_SENT,
            COMMANDS,
            MALFORMED_COMMANDS,
            CAPTURE_FAILURES,
            ACTIONS_TRIGGERED,
        ];
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert!(names.iter().all(|n| n.starts_with("fieldbot_")));
        assert_eq!(CAPTURE_FAILURES, fieldbot_eye::camera::CAPTURE_FAILURES);
        assert_eq!(ACTIONS_TRIGGERED, fieldbot_core::controller::ACTIONS_TRIGGERED);
    }

    #[test]
    fn test_recording_without_exporter_is_noop() {
        describe();
        record_session_opened();
        record_command("START");
        record_malformed_command();
        record_payload_sent();
        record_session_closed();
    }
}

//! Wire protocol for client ↔ watcher communication.
//!
//! Every message on the wire is a self-describing JSON mapping: the receiver
//! interprets the remaining fields from `command`/`option` (requests) or
//! `success` (results). Unknown commands are rejected with a failure result,
//! never silently ignored.

pub mod transport;
pub mod wire;

use crate::types::{Bytes, Pid};
use serde::{Deserialize, Serialize};

/// Command name for watch sessions, as registered in the server's dispatch table.
pub const PROFILE_COMMAND: &str = "profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandOption {
    Start,
    Stop,
}

/// Request sent from a client to the watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    pub option: CommandOption,
    /// Target process id; present on start, absent on stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<Pid>,
}

impl CommandMessage {
    /// Open a watch session for `pid`.
    pub fn start(pid: Pid) -> Self {
        Self {
            command: PROFILE_COMMAND.to_string(),
            option: CommandOption::Start,
            pid: Some(pid),
        }
    }

    /// End the current watch session.
    pub fn stop() -> Self {
        Self {
            command: PROFILE_COMMAND.to_string(),
            option: CommandOption::Stop,
            pid: None,
        }
    }
}

/// Acknowledgment that sampling is about to begin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyMessage {
    pub ready: bool,
}

impl ReadyMessage {
    pub fn ack() -> Self {
        Self { ready: true }
    }
}

/// Terminal reply for a watch session.
///
/// A result is success-xor-failure: the constructors are the only way client
/// and server code builds one, and they never populate both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_usage: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultMessage {
    pub fn ok(peak_usage: Bytes) -> Self {
        Self {
            success: true,
            peak_usage: Some(peak_usage),
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            peak_usage: None,
            message: Some(message.into()),
        }
    }

    /// Peak usage on success, or the watcher's failure message.
    pub fn into_peak_usage(self) -> Result<Bytes, String> {
        if self.success {
            Ok(self.peak_usage.unwrap_or(0))
        } else {
            Err(self
                .message
                .unwrap_or_else(|| "watcher reported an unspecified failure".to_string()))
        }
    }
}

/// First reply in a session: the ready ack, or a failure result if the
/// watcher could not even take a baseline reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionReply {
    Ready(ReadyMessage),
    Result(ResultMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_command_wire_shape() {
        let value = serde_json::to_value(CommandMessage::start(42)).unwrap();
        assert_eq!(
            value,
            json!({"command": "profile", "option": "start", "pid": 42})
        );
    }

    #[test]
    fn test_stop_command_omits_pid() {
        let value = serde_json::to_value(CommandMessage::stop()).unwrap();
        assert_eq!(value, json!({"command": "profile", "option": "stop"}));
    }

    #[test]
    fn test_success_result_carries_no_message() {
        let value = serde_json::to_value(ResultMessage::ok(12_000_000)).unwrap();
        assert_eq!(value, json!({"success": true, "peak_usage": 12_000_000u64}));
    }

    #[test]
    fn test_failure_result_carries_no_peak() {
        let value = serde_json::to_value(ResultMessage::fail("process 7 does not exist")).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "message": "process 7 does not exist"})
        );
    }

    #[test]
    fn test_into_peak_usage() {
        assert_eq!(ResultMessage::ok(10).into_peak_usage(), Ok(10));
        assert_eq!(
            ResultMessage::fail("boom").into_peak_usage(),
            Err("boom".to_string())
        );
    }

    #[test]
    fn test_session_reply_distinguishes_ready_from_result() {
        let ready: SessionReply = serde_json::from_value(json!({"ready": true})).unwrap();
        assert!(matches!(ready, SessionReply::Ready(ReadyMessage { ready: true })));

        let result: SessionReply =
            serde_json::from_value(json!({"success": false, "message": "no baseline"})).unwrap();
        match result {
            SessionReply::Result(r) => {
                assert!(!r.success);
                assert_eq!(r.message.as_deref(), Some("no baseline"));
            }
            SessionReply::Ready(_) => panic!("expected a result reply"),
        }
    }

    #[test]
    fn test_unknown_fields_do_not_break_decoding() {
        let cmd: CommandMessage = serde_json::from_value(
            json!({"command": "profile", "option": "start", "pid": 1, "extra": "ignored"}),
        )
        .unwrap();
        assert_eq!(cmd.pid, Some(1));
    }
}

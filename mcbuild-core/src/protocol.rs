//! Reload wire protocol
//!
//! The game client speaks the Bedrock WebSocket protocol: every command is a
//! `commandRequest` envelope sent as one JSON text frame.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Protocol version carried in both header and body
pub const PROTOCOL_VERSION: u32 = 1;

/// Command asking the client to reload scripts and functions
pub const RELOAD_COMMAND: &str = "reload";

/// Prefix shown in chat notices
const NOTICE_TAG: &str = "[§bmcpack devtools§r]";

/// A command request envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRequest {
    pub body: CommandBody,
    pub header: CommandHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandBody {
    pub origin: CommandOrigin,
    pub command_line: String,
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandOrigin {
    #[serde(rename = "type")]
    pub origin_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandHeader {
    pub request_id: Uuid,
    pub message_purpose: String,
    pub version: u32,
    pub message_type: String,
}

impl CommandRequest {
    /// Wrap a command line in a player-origin request
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            body: CommandBody {
                origin: CommandOrigin {
                    origin_type: "player".to_string(),
                },
                command_line: command_line.into(),
                version: PROTOCOL_VERSION,
            },
            header: CommandHeader {
                request_id: Uuid::nil(),
                message_purpose: "commandRequest".to_string(),
                version: PROTOCOL_VERSION,
                message_type: "commandRequest".to_string(),
            },
        }
    }

    /// Serialize to a single-line JSON frame
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// `tellraw @a` broadcast carrying a tagged notice
pub fn tellraw_notice(text: &str) -> String {
    let rawtext = serde_json::json!({
        "rawtext": [{ "text": format!("{} {}", NOTICE_TAG, text) }]
    });
    format!("tellraw @a {}", rawtext)
}

/// Where commands for the game client go
///
/// Sending is fire-and-forget: implementations never block and never fail the caller;
/// with nobody listening a send is a no-op.
pub trait CommandSink: Send + Sync {
    fn send(&self, command: &str);
}

/// Sink used when no reload channel is running
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CommandSink for NullSink {
    fn send(&self, command: &str) {
        tracing::trace!("no reload channel, dropping command: {}", command);
    }
}

//! The framed message envelope shared by every exchange on the wire.

use serde::{Deserialize, Serialize};

/// Context id carried by messages that are not bound to a context yet.
pub const UNBOUND_CONTEXT_ID: i32 = -1;

fn default_context_id() -> i32 {
    UNBOUND_CONTEXT_ID
}

/// One framed protocol message.
///
/// `host_id` is stamped by the sending side's connection just before the
/// frame is written; inbound messages may carry the peer's host id or
/// nothing at all. Routing metadata (which connection a message arrived
/// on) is deliberately not part of the envelope — it travels next to the
/// message, decoded once at the transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    #[serde(default = "default_context_id")]
    pub context_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Message {
    /// Build an outbound message from an already-serialized payload.
    #[must_use]
    pub fn from_payload(
        message_type: &str,
        context_id: i32,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_type: message_type.to_string(),
            host_id: None,
            context_id,
            payload: Some(payload),
        }
    }
}

/// Message type tags recognized by the protocol.
///
/// The set is open-ended on purpose: unrecognized inbound tags are
/// ignored rather than rejected.
pub mod message_types {
    // Requests
    pub const INITIALIZE: &str = "Initialize";
    pub const CHANGE_CONFIGURATION: &str = "ChangeConfiguration";
    pub const REFRESH_DEPENDENCIES: &str = "RefreshDependencies";
    pub const RESTORE_COMPLETE: &str = "RestoreComplete";
    pub const FILES_CHANGED: &str = "FilesChanged";
    pub const GET_DIAGNOSTICS: &str = "GetDiagnostics";
    pub const ENUMERATE_PROJECT_CONTEXTS: &str = "EnumerateProjectContexts";
    pub const PROTOCOL_VERSION: &str = "ProtocolVersion";

    // Responses
    pub const PROJECT_INFORMATION: &str = "ProjectInformation";
    pub const DIAGNOSTICS: &str = "Diagnostics";
    pub const DEPENDENCY_DIAGNOSTICS: &str = "DependencyDiagnostics";
    pub const DEPENDENCIES: &str = "Dependencies";
    pub const COMPILER_OPTIONS: &str = "CompilerOptions";
    pub const REFERENCES: &str = "References";
    pub const SOURCES: &str = "Sources";
    pub const ERROR: &str = "Error";
    pub const ALL_DIAGNOSTICS: &str = "AllDiagnostics";
    pub const PROJECT_CONTEXTS: &str = "ProjectContexts";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_casing_is_pascal_case() {
        let message = Message::from_payload(
            message_types::SOURCES,
            3,
            serde_json::json!({"Files": ["a.cs"]}),
        );
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["MessageType"], "Sources");
        assert_eq!(json["ContextId"], 3);
        assert_eq!(json["Payload"]["Files"][0], "a.cs");
        assert!(json.get("HostId").is_none(), "unset HostId must be omitted");
    }

    #[test]
    fn test_context_id_defaults_to_unbound() {
        let message: Message =
            serde_json::from_value(serde_json::json!({"MessageType": "Initialize"})).unwrap();
        assert_eq!(message.context_id, UNBOUND_CONTEXT_ID);
        assert!(message.payload.is_none());
    }

    #[test]
    fn test_roundtrip_preserves_all_fields() {
        let mut message = Message::from_payload(
            message_types::ERROR,
            7,
            serde_json::json!({"Message": "boom"}),
        );
        message.host_id = Some("host-1".to_string());

        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.message_type, "Error");
        assert_eq!(decoded.host_id.as_deref(), Some("host-1"));
        assert_eq!(decoded.context_id, 7);
        assert_eq!(decoded.payload.unwrap()["Message"], "boom");
    }
}

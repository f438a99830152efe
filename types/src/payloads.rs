//! Typed inbound payload schemas, decoded once at the message boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Payload of an `Initialize` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitializePayload {
    pub project_folder: String,
    #[serde(default)]
    pub configuration: Option<String>,
    /// Requested protocol version; 0 (or absent) means "no preference".
    #[serde(default)]
    pub version: i32,
}

/// Payload of a `ChangeConfiguration` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeConfigurationPayload {
    pub configuration: String,
}

/// Payload of a `ProtocolVersion` negotiation message, in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtocolVersionPayload {
    pub version: i32,
}

/// Payload of a `ProjectContexts` enumeration response: project path to
/// context id, for every context known to the process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectContextsPayload {
    pub projects: BTreeMap<String, i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_payload_full() {
        let payload: InitializePayload = serde_json::from_value(serde_json::json!({
            "ProjectFolder": "/work/app",
            "Configuration": "Release",
            "Version": 3
        }))
        .unwrap();
        assert_eq!(payload.project_folder, "/work/app");
        assert_eq!(payload.configuration.as_deref(), Some("Release"));
        assert_eq!(payload.version, 3);
    }

    #[test]
    fn test_initialize_payload_minimal() {
        let payload: InitializePayload =
            serde_json::from_value(serde_json::json!({"ProjectFolder": "/work/app"})).unwrap();
        assert!(payload.configuration.is_none());
        assert_eq!(payload.version, 0);
    }

    #[test]
    fn test_initialize_payload_requires_project_folder() {
        let result: Result<InitializePayload, _> =
            serde_json::from_value(serde_json::json!({"Configuration": "Debug"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_project_contexts_payload_shape() {
        let mut payload = ProjectContextsPayload::default();
        payload.projects.insert("/work/app".to_string(), 1);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["Projects"]["/work/app"], 1);
    }
}

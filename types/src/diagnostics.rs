//! Diagnostics model and its protocol-version-dependent wire form.

use serde::{Deserialize, Serialize};

use crate::sections::FrameworkData;

/// Severity of a resolution diagnostic, carried numerically on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum DiagnosticSeverity {
    Info = 0,
    Warning = 1,
    Error = 2,
}

impl From<DiagnosticSeverity> for i32 {
    fn from(severity: DiagnosticSeverity) -> Self {
        severity as Self
    }
}

impl TryFrom<i32> for DiagnosticSeverity {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, String> {
        match value {
            0 => Ok(DiagnosticSeverity::Info),
            1 => Ok(DiagnosticSeverity::Warning),
            2 => Ok(DiagnosticSeverity::Error),
            other => Err(format!("unknown diagnostic severity {other}")),
        }
    }
}

impl DiagnosticSeverity {
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// One diagnostic produced while resolving project state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiagnosticMessage {
    pub error_code: String,
    pub message: String,
    pub severity: DiagnosticSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_path: Option<String>,
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub start_column: u32,
}

impl DiagnosticMessage {
    #[must_use]
    pub fn new(
        error_code: impl Into<String>,
        message: impl Into<String>,
        severity: DiagnosticSeverity,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            severity,
            source_file_path: None,
            start_line: 0,
            start_column: 0,
        }
    }

    #[must_use]
    pub fn with_location(mut self, path: impl Into<String>, line: u32, column: u32) -> Self {
        self.source_file_path = Some(path.into());
        self.start_line = line;
        self.start_column = column;
        self
    }

    /// Render as `path(line,column): severity CODE: message`, the format
    /// old protocol versions receive instead of structured objects.
    #[must_use]
    pub fn formatted(&self) -> String {
        let location = self
            .source_file_path
            .as_ref()
            .map(|path| format!("{path}({},{}): ", self.start_line, self.start_column))
            .unwrap_or_default();
        format!(
            "{location}{} {}: {}",
            self.severity.label(),
            self.error_code,
            self.message
        )
    }
}

/// A batch of diagnostics scoped to one target framework.
///
/// The top-level (whole-project) batch uses `framework: None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsGroup {
    pub framework: Option<FrameworkData>,
    pub diagnostics: Vec<DiagnosticMessage>,
}

impl DiagnosticsGroup {
    #[must_use]
    pub fn new(framework: Option<FrameworkData>, diagnostics: Vec<DiagnosticMessage>) -> Self {
        Self {
            framework,
            diagnostics,
        }
    }

    fn split(&self) -> (Vec<&DiagnosticMessage>, Vec<&DiagnosticMessage>) {
        let errors = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect();
        let warnings = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .collect();
        (errors, warnings)
    }

    /// Serialize for the given protocol version.
    ///
    /// Version 3 introduced structured diagnostic objects; earlier
    /// clients receive the formatted message strings only.
    #[must_use]
    pub fn to_payload(&self, protocol_version: i32) -> serde_json::Value {
        let (errors, warnings) = self.split();

        let framework = self
            .framework
            .as_ref()
            .map(|f| serde_json::to_value(f).unwrap_or(serde_json::Value::Null))
            .unwrap_or(serde_json::Value::Null);

        if protocol_version >= 3 {
            serde_json::json!({
                "Framework": framework,
                "Errors": errors,
                "Warnings": warnings,
            })
        } else {
            let errors: Vec<String> = errors.iter().map(|d| d.formatted()).collect();
            let warnings: Vec<String> = warnings.iter().map(|d| d.formatted()).collect();
            serde_json::json!({
                "Framework": framework,
                "Errors": errors,
                "Warnings": warnings,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framework() -> FrameworkData {
        FrameworkData {
            framework_name: "DesignTime,Version=v1.0".to_string(),
            friendly_name: "DesignTime 1.0".to_string(),
            short_name: "dt10".to_string(),
            redist_list_path: None,
        }
    }

    fn error_diag() -> DiagnosticMessage {
        DiagnosticMessage::new("DTH1001", "unable to resolve 'lib'", DiagnosticSeverity::Error)
            .with_location("/work/app/project.json", 4, 9)
    }

    #[test]
    fn test_formatted_includes_location_and_code() {
        assert_eq!(
            error_diag().formatted(),
            "/work/app/project.json(4,9): error DTH1001: unable to resolve 'lib'"
        );
    }

    #[test]
    fn test_formatted_without_location() {
        let diag = DiagnosticMessage::new("DTH1002", "stale lock file", DiagnosticSeverity::Warning);
        assert_eq!(diag.formatted(), "warning DTH1002: stale lock file");
    }

    #[test]
    fn test_structured_payload_for_current_protocol() {
        let group = DiagnosticsGroup::new(
            Some(framework()),
            vec![
                error_diag(),
                DiagnosticMessage::new("DTH1002", "stale lock file", DiagnosticSeverity::Warning),
            ],
        );
        let payload = group.to_payload(3);
        assert_eq!(payload["Framework"]["ShortName"], "dt10");
        assert_eq!(payload["Errors"][0]["ErrorCode"], "DTH1001");
        assert_eq!(payload["Errors"][0]["StartLine"], 4);
        assert_eq!(payload["Errors"][0]["Severity"], 2);
        assert_eq!(payload["Warnings"][0]["ErrorCode"], "DTH1002");
        assert_eq!(payload["Warnings"][0]["Severity"], 1);
    }

    #[test]
    fn test_severity_wire_form_is_numeric() {
        assert_eq!(serde_json::to_value(DiagnosticSeverity::Info).unwrap(), 0);
        assert_eq!(serde_json::to_value(DiagnosticSeverity::Warning).unwrap(), 1);
        assert_eq!(serde_json::to_value(DiagnosticSeverity::Error).unwrap(), 2);

        let severity: DiagnosticSeverity = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(severity, DiagnosticSeverity::Warning);
        assert!(serde_json::from_value::<DiagnosticSeverity>(serde_json::json!(9)).is_err());
    }

    #[test]
    fn test_legacy_payload_sends_formatted_strings() {
        let group = DiagnosticsGroup::new(Some(framework()), vec![error_diag()]);
        let payload = group.to_payload(2);
        assert_eq!(
            payload["Errors"][0],
            "/work/app/project.json(4,9): error DTH1001: unable to resolve 'lib'"
        );
        assert_eq!(payload["Warnings"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_top_level_group_has_null_framework() {
        let group = DiagnosticsGroup::new(None, vec![error_diag()]);
        let payload = group.to_payload(4);
        assert!(payload["Framework"].is_null());
    }

    #[test]
    fn test_info_diagnostics_are_neither_errors_nor_warnings() {
        let group = DiagnosticsGroup::new(
            None,
            vec![DiagnosticMessage::new(
                "DTH9000",
                "restore skipped",
                DiagnosticSeverity::Info,
            )],
        );
        let payload = group.to_payload(4);
        assert!(payload["Errors"].as_array().unwrap().is_empty());
        assert!(payload["Warnings"].as_array().unwrap().is_empty());
    }
}

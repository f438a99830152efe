//! Independently diffable project-state sections.
//!
//! Each section is a plain value type with structural equality; the
//! server transmits a section when (and only when) the freshly resolved
//! value differs from the last transmitted one. Sequences compare
//! order-sensitively, so producers are expected to emit deterministic
//! ordering (sorted maps, resolution-ordered lists).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a target framework, as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FrameworkData {
    pub framework_name: String,
    pub friendly_name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redist_list_path: Option<String>,
}

/// Top-level project identity: frameworks, configurations, commands and
/// the search paths used to locate sibling projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectInformationPayload {
    pub name: String,
    pub frameworks: Vec<FrameworkData>,
    pub configurations: Vec<String>,
    pub commands: BTreeMap<String, String>,
    pub project_search_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_json_path: Option<String>,
}

/// Source files compiled for one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourcesPayload {
    pub framework: FrameworkData,
    pub files: Vec<String>,
    #[serde(default)]
    pub generated_files: BTreeMap<String, String>,
}

/// A reference to a sibling project resolved from the search paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectReferenceData {
    pub framework: FrameworkData,
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_project_path: Option<String>,
}

/// File and project references for one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferencesPayload {
    pub framework: FrameworkData,
    pub file_references: Vec<String>,
    pub project_references: Vec<ProjectReferenceData>,
}

/// One edge in a dependency's own dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DependencyItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One node of the resolved dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DependencyDescription {
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub resolved: bool,
    pub dependencies: Vec<DependencyItem>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// The dependency graph for one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DependenciesPayload {
    pub framework: FrameworkData,
    pub root_dependency: String,
    pub dependencies: BTreeMap<String, DependencyDescription>,
}

/// Compiler settings in effect for one target framework and configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompilationSettings {
    pub defines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<String>,
    #[serde(default)]
    pub optimize: bool,
    #[serde(default)]
    pub emit_entry_point: bool,
    #[serde(default)]
    pub warnings_as_errors: bool,
}

/// The compiler-options section for one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompilerOptionsPayload {
    pub framework: FrameworkData,
    pub options: CompilationSettings,
}

/// The most recent unrecoverable failure of a resolution pass.
///
/// The default (all-`None`) value means "no error"; clients treat an
/// empty record as clearing any previously reported failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl ErrorPayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.is_none()
    }
}

//! Resolved project state handed back across the resolution boundary.

use std::collections::BTreeMap;

use dth_types::{
    CompilationSettings, DependencyDescription, DiagnosticMessage, FrameworkData,
    ProjectReferenceData,
};

/// Everything known about one project after a resolution pass.
#[derive(Debug, Clone)]
pub struct ProjectState {
    pub name: String,
    pub path: String,
    pub configurations: Vec<String>,
    pub commands: BTreeMap<String, String>,
    pub search_paths: Vec<String>,
    pub global_json_path: Option<String>,
    /// Whole-project diagnostics, not tied to a target framework.
    pub diagnostics: Vec<DiagnosticMessage>,
    /// Per-target-framework state, in resolution order.
    pub targets: Vec<TargetState>,
}

/// Resolved state for one target framework.
#[derive(Debug, Clone)]
pub struct TargetState {
    pub framework: FrameworkData,
    pub source_files: Vec<String>,
    pub compiler_options: CompilationSettings,
    pub dependencies: DependencyInfo,
}

/// The dependency graph and its side products for one target.
#[derive(Debug, Clone, Default)]
pub struct DependencyInfo {
    pub dependencies: BTreeMap<String, DependencyDescription>,
    pub project_references: Vec<ProjectReferenceData>,
    pub file_references: Vec<String>,
    pub exported_source_files: Vec<String>,
    pub diagnostics: Vec<DiagnosticMessage>,
}

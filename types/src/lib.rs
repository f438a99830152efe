//! Wire envelope and payload types for the design-time host protocol.
//!
//! This crate contains pure data types with no IO and no async. The wire
//! format uses PascalCase JSON field names throughout; every struct here
//! carries the matching serde rename so the casing lives in exactly one
//! place per type.

mod diagnostics;
mod message;
mod payloads;
mod sections;

pub use diagnostics::{DiagnosticMessage, DiagnosticSeverity, DiagnosticsGroup};
pub use message::{Message, UNBOUND_CONTEXT_ID, message_types};
pub use payloads::{
    ChangeConfigurationPayload, InitializePayload, ProjectContextsPayload, ProtocolVersionPayload,
};
pub use sections::{
    CompilationSettings, CompilerOptionsPayload, DependenciesPayload, DependencyDescription,
    DependencyItem, ErrorPayload, FrameworkData, ProjectInformationPayload, ProjectReferenceData,
    ReferencesPayload, SourcesPayload,
};

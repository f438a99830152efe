//! Project state resolution boundary.
//!
//! The server core treats resolution as an external collaborator behind
//! the [`ProjectResolver`] trait: given a project folder and a
//! configuration, produce the fully resolved state or fail with a
//! structured error. [`ManifestResolver`] is the production
//! implementation, reading a `project.json` manifest from disk.

mod error;
mod manifest;
mod state;

pub use error::ResolveError;
pub use manifest::{MANIFEST_FILE_NAME, ManifestResolver};
pub use state::{DependencyInfo, ProjectState, TargetState};

/// Resolves the authoritative state of one project.
///
/// Implementations must be safe to call repeatedly for the same path
/// with differing configurations; each call stands alone.
pub trait ProjectResolver: Send + Sync {
    /// Resolve `project_path` under `configuration`.
    ///
    /// `refresh_dependencies` asks the implementation to discard any
    /// cached dependency information before resolving.
    /// `previous_search_paths` is the search-path list from the last
    /// state actually transmitted to clients, if any; implementations
    /// use it to detect dependencies whose kind changed when the
    /// search paths did.
    fn resolve(
        &self,
        project_path: &str,
        configuration: &str,
        refresh_dependencies: bool,
        previous_search_paths: Option<&[String]>,
    ) -> Result<ProjectState, ResolveError>;
}

//! Local/remote state snapshots and the per-section diff.
//!
//! Each context keeps two snapshots. `local` is rebuilt wholesale from
//! every successful resolution pass; `remote` mirrors what the client
//! has actually been sent, updated one section at a time as sections go
//! out. Transmitting a section is exactly "local differs from remote".

use std::collections::BTreeMap;

use dth_resolver::ProjectState;
use dth_types::{
    CompilerOptionsPayload, DependenciesPayload, DiagnosticsGroup, ErrorPayload, FrameworkData,
    ProjectInformationPayload, ReferencesPayload, SourcesPayload,
};

/// The per-framework sections of one snapshot.
#[derive(Debug, Clone)]
pub struct ProjectWorld {
    pub framework: FrameworkData,
    pub sources: Option<SourcesPayload>,
    pub references: Option<ReferencesPayload>,
    pub dependencies: Option<DependenciesPayload>,
    pub compiler_options: Option<CompilerOptionsPayload>,
    pub dependency_diagnostics: Option<DiagnosticsGroup>,
}

impl ProjectWorld {
    #[must_use]
    pub fn empty(framework: FrameworkData) -> Self {
        Self {
            framework,
            sources: None,
            references: None,
            dependencies: None,
            compiler_options: None,
            dependency_diagnostics: None,
        }
    }
}

/// One side of the diff: either the freshly resolved state or the
/// last-transmitted state.
///
/// `projects` preserves resolution order; frameworks are keyed by their
/// full framework name.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub project_information: Option<ProjectInformationPayload>,
    pub project_diagnostics: Option<DiagnosticsGroup>,
    pub global_error: ErrorPayload,
    pub projects: Vec<ProjectWorld>,
}

impl Snapshot {
    /// Build the local snapshot from a resolution result.
    #[must_use]
    pub fn from_state(state: &ProjectState) -> Self {
        let mut snapshot = Self {
            project_information: Some(ProjectInformationPayload {
                name: state.name.clone(),
                frameworks: state
                    .targets
                    .iter()
                    .map(|target| target.framework.clone())
                    .collect(),
                configurations: state.configurations.clone(),
                commands: state.commands.clone(),
                project_search_paths: state.search_paths.clone(),
                global_json_path: state.global_json_path.clone(),
            }),
            project_diagnostics: Some(DiagnosticsGroup::new(None, state.diagnostics.clone())),
            global_error: ErrorPayload::default(),
            projects: Vec::with_capacity(state.targets.len()),
        };

        for target in &state.targets {
            let framework = target.framework.clone();
            let mut files = target.source_files.clone();
            files.extend(target.dependencies.exported_source_files.iter().cloned());

            snapshot.projects.push(ProjectWorld {
                sources: Some(SourcesPayload {
                    framework: framework.clone(),
                    files,
                    generated_files: BTreeMap::new(),
                }),
                references: Some(ReferencesPayload {
                    framework: framework.clone(),
                    file_references: target.dependencies.file_references.clone(),
                    project_references: target.dependencies.project_references.clone(),
                }),
                dependencies: Some(DependenciesPayload {
                    framework: framework.clone(),
                    root_dependency: state.name.clone(),
                    dependencies: target.dependencies.dependencies.clone(),
                }),
                compiler_options: Some(CompilerOptionsPayload {
                    framework: framework.clone(),
                    options: target.compiler_options.clone(),
                }),
                dependency_diagnostics: Some(DiagnosticsGroup::new(
                    Some(framework.clone()),
                    target.dependencies.diagnostics.clone(),
                )),
                framework,
            });
        }

        snapshot
    }

    /// The world for `framework`, created empty on first access.
    pub fn world_mut(&mut self, framework: &FrameworkData) -> &mut ProjectWorld {
        let index = self
            .projects
            .iter()
            .position(|world| world.framework.framework_name == framework.framework_name);
        let index = match index {
            Some(index) => index,
            None => {
                self.projects.push(ProjectWorld::empty(framework.clone()));
                self.projects.len() - 1
            }
        };
        &mut self.projects[index]
    }

    /// Drop every framework not in `live`. No deletion message exists in
    /// the protocol; clients infer removals from `ProjectInformation`.
    pub fn prune_stale_frameworks(&mut self, live: &[String]) {
        self.projects
            .retain(|world| live.contains(&world.framework.framework_name));
    }
}

/// Send a section iff the local value exists and differs from the
/// last-transmitted one; on send, the remote side is updated to match.
/// Returns whether the section was transmitted.
pub fn send_if_changed<T, E, F>(
    local: &Option<T>,
    remote: &mut Option<T>,
    send: F,
) -> Result<bool, E>
where
    T: PartialEq + Clone,
    F: FnOnce(&T) -> Result<(), E>,
{
    match local {
        Some(value) if remote.as_ref() != Some(value) => {
            send(value)?;
            *remote = Some(value.clone());
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// [`send_if_changed`] for the always-present global error record.
pub fn send_error_if_changed<E, F>(
    local: &ErrorPayload,
    remote: &mut ErrorPayload,
    send: F,
) -> Result<bool, E>
where
    F: FnOnce(&ErrorPayload) -> Result<(), E>,
{
    if local == remote {
        return Ok(false);
    }
    send(local)?;
    *remote = local.clone();
    Ok(true)
}

//! Manifest-based project resolution.
//!
//! A project is a directory containing a `project.json` manifest naming
//! its target frameworks, sources, dependencies, configurations and
//! commands. Sibling projects are discovered through search paths (the
//! project's parent directory plus any `projects` entries of an
//! ancestor `global.json`); a dependency whose name matches a sibling
//! project directory resolves as a project reference, everything else
//! as a package. A project reference contributes the sibling's `shared`
//! sources to the dependent's compilation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use dth_types::{
    CompilationSettings, DependencyDescription, DependencyItem, DiagnosticMessage,
    DiagnosticSeverity, FrameworkData, ProjectReferenceData,
};

use crate::error::ResolveError;
use crate::state::{DependencyInfo, ProjectState, TargetState};
use crate::ProjectResolver;

pub const MANIFEST_FILE_NAME: &str = "project.json";

const GLOBAL_SETTINGS_FILE_NAME: &str = "global.json";

/// A dependency could not be resolved.
const UNRESOLVED_CODE: &str = "DTH1001";
/// A dependency's kind flipped between package and project after the
/// search paths changed.
const KIND_CHANGED_CODE: &str = "DTH1010";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    /// Sources this project exports to every project that depends on it.
    #[serde(default)]
    shared: Vec<String>,
    #[serde(default)]
    compilation_options: ManifestCompilation,
    #[serde(default)]
    configurations: BTreeMap<String, ManifestCompilation>,
    #[serde(default)]
    dependencies: BTreeMap<String, ManifestDependency>,
    #[serde(default)]
    frameworks: BTreeMap<String, ManifestFramework>,
    #[serde(default)]
    commands: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestCompilation {
    #[serde(default)]
    defines: Vec<String>,
    #[serde(default)]
    language_version: Option<String>,
    #[serde(default)]
    optimize: Option<bool>,
    #[serde(default)]
    emit_entry_point: Option<bool>,
    #[serde(default)]
    warnings_as_errors: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ManifestDependency {
    Version(String),
    Detailed {
        #[serde(default)]
        version: Option<String>,
        #[serde(default, rename = "type")]
        kind: Option<String>,
    },
}

impl ManifestDependency {
    fn version(&self) -> Option<&str> {
        match self {
            Self::Version(version) => Some(version),
            Self::Detailed { version, .. } => version.as_deref(),
        }
    }

    fn pinned_kind(&self) -> Option<&str> {
        match self {
            Self::Version(_) => None,
            Self::Detailed { kind, .. } => kind.as_deref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFramework {
    #[serde(default)]
    framework_name: Option<String>,
    #[serde(default)]
    friendly_name: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, ManifestDependency>,
    #[serde(default)]
    compilation_options: Option<ManifestCompilation>,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalSettings {
    #[serde(default)]
    projects: Vec<String>,
}

/// The production [`ProjectResolver`]: reads `project.json` manifests.
#[derive(Debug, Default)]
pub struct ManifestResolver;

impl ManifestResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProjectResolver for ManifestResolver {
    fn resolve(
        &self,
        project_path: &str,
        configuration: &str,
        refresh_dependencies: bool,
        previous_search_paths: Option<&[String]>,
    ) -> Result<ProjectState, ResolveError> {
        let project_dir = Path::new(project_path);
        let manifest_path = project_dir.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            return Err(ResolveError::Failed(format!(
                "unable to find {MANIFEST_FILE_NAME} in '{project_path}'"
            )));
        }

        if refresh_dependencies {
            tracing::debug!(path = project_path, "refreshing dependency information");
        }

        let text = fs::read_to_string(&manifest_path)?;
        let manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| ResolveError::malformed_json(&manifest_path, &e))?;

        if manifest.frameworks.is_empty() {
            return Err(ResolveError::Failed(format!(
                "project '{project_path}' does not declare any target frameworks"
            )));
        }

        let name = manifest
            .name
            .clone()
            .or_else(|| {
                project_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| project_path.to_string());

        let global_settings = find_global_settings(project_dir)?;
        let search_paths = resolve_search_paths(project_dir, global_settings.as_ref());
        let candidates = project_candidates(&search_paths);

        // Dependency kinds are revalidated only when the search paths
        // differ from the last state clients saw.
        let revalidate_kinds =
            previous_search_paths.is_some_and(|previous| previous != search_paths.as_slice());

        let sources: Vec<String> = manifest
            .sources
            .iter()
            .map(|rel| project_dir.join(rel).display().to_string())
            .collect();

        let mut configurations: Vec<String> = manifest.configurations.keys().cloned().collect();
        if configurations.is_empty() {
            configurations = vec!["Debug".to_string(), "Release".to_string()];
        }

        let mut targets = Vec::new();
        for (short_name, framework_manifest) in &manifest.frameworks {
            let framework = framework_data(short_name, framework_manifest);

            let mut merged_dependencies = manifest.dependencies.clone();
            for (dep_name, dep) in &framework_manifest.dependencies {
                merged_dependencies.insert(dep_name.clone(), dep.clone());
            }

            let dependencies = resolve_dependencies(
                &name,
                &manifest_path,
                &framework,
                &merged_dependencies,
                &candidates,
                project_dir,
                revalidate_kinds,
            );

            let compiler_options = merge_compilation(
                &manifest.compilation_options,
                manifest.configurations.get(configuration),
                framework_manifest.compilation_options.as_ref(),
            );

            targets.push(TargetState {
                framework,
                source_files: sources.clone(),
                compiler_options,
                dependencies,
            });
        }

        Ok(ProjectState {
            name,
            path: project_path.to_string(),
            configurations,
            commands: manifest.commands,
            search_paths,
            global_json_path: global_settings.map(|(path, _)| path.display().to_string()),
            diagnostics: Vec::new(),
            targets,
        })
    }
}

fn framework_data(short_name: &str, framework_manifest: &ManifestFramework) -> FrameworkData {
    FrameworkData {
        framework_name: framework_manifest
            .framework_name
            .clone()
            .unwrap_or_else(|| format!("DesignTime,Version={short_name}")),
        friendly_name: framework_manifest
            .friendly_name
            .clone()
            .unwrap_or_else(|| short_name.to_string()),
        short_name: short_name.to_string(),
        redist_list_path: None,
    }
}

fn find_global_settings(
    project_dir: &Path,
) -> Result<Option<(PathBuf, GlobalSettings)>, ResolveError> {
    for dir in project_dir.ancestors().skip(1) {
        let candidate = dir.join(GLOBAL_SETTINGS_FILE_NAME);
        if candidate.is_file() {
            let text = fs::read_to_string(&candidate)?;
            let settings: GlobalSettings = serde_json::from_str(&text)
                .map_err(|e| ResolveError::malformed_json(&candidate, &e))?;
            return Ok(Some((candidate, settings)));
        }
    }
    Ok(None)
}

/// Parent directory first, then `global.json` entries, deduplicated.
fn resolve_search_paths(
    project_dir: &Path,
    global_settings: Option<&(PathBuf, GlobalSettings)>,
) -> Vec<String> {
    let mut paths = Vec::new();
    if let Some(parent) = project_dir.parent() {
        paths.push(parent.display().to_string());
    }
    if let Some((global_path, settings)) = global_settings
        && let Some(global_dir) = global_path.parent()
    {
        for entry in &settings.projects {
            let path = global_dir.join(entry).display().to_string();
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Names of sibling directories that contain a manifest, mapped to the
/// directory they were found in.
fn project_candidates(search_paths: &[String]) -> BTreeMap<String, PathBuf> {
    let mut candidates = BTreeMap::new();
    for search_path in search_paths {
        let Ok(entries) = fs::read_dir(search_path) else {
            continue;
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.join(MANIFEST_FILE_NAME).is_file())
            .collect();
        dirs.sort();
        for dir in dirs {
            if let Some(dir_name) = dir.file_name() {
                candidates
                    .entry(dir_name.to_string_lossy().into_owned())
                    .or_insert(dir);
            }
        }
    }
    candidates
}

fn resolve_dependencies(
    project_name: &str,
    manifest_path: &Path,
    framework: &FrameworkData,
    declared: &BTreeMap<String, ManifestDependency>,
    candidates: &BTreeMap<String, PathBuf>,
    project_dir: &Path,
    revalidate_kinds: bool,
) -> DependencyInfo {
    let mut info = DependencyInfo::default();

    // The project itself is the root node of its own graph.
    info.dependencies.insert(
        project_name.to_string(),
        DependencyDescription {
            name: project_name.to_string(),
            display_name: project_name.to_string(),
            version: None,
            r#type: "Project".to_string(),
            path: Some(manifest_path.display().to_string()),
            resolved: true,
            dependencies: declared
                .iter()
                .map(|(dep_name, dep)| DependencyItem {
                    name: dep_name.clone(),
                    version: dep.version().map(str::to_string),
                })
                .collect(),
            errors: Vec::new(),
            warnings: Vec::new(),
        },
    );

    for (dep_name, dep) in declared {
        let candidate = candidates.get(dep_name);
        let kind = dep
            .pinned_kind()
            .map(normalize_kind)
            .unwrap_or_else(|| if candidate.is_some() { "Project" } else { "Package" });

        let mut diagnostics = Vec::new();
        let mut resolved;
        let mut path = None;

        if kind == "Project" {
            resolved = candidate.is_some();
            if let Some(dir) = candidate {
                let manifest = dir.join(MANIFEST_FILE_NAME);
                path = Some(manifest.display().to_string());
                info.project_references.push(ProjectReferenceData {
                    framework: framework.clone(),
                    name: dep_name.clone(),
                    path: manifest.display().to_string(),
                    wrapped_project_path: None,
                });
                info.exported_source_files.extend(shared_sources(dir));
            } else {
                diagnostics.push(unresolved_diagnostic(dep_name, manifest_path));
            }
        } else {
            resolved = dep.version().is_some();
            if let Some(version) = dep.version() {
                let reference = project_dir
                    .join("packages")
                    .join(dep_name)
                    .join(version)
                    .join(format!("{dep_name}.dll"));
                path = Some(reference.display().to_string());
                info.file_references.push(reference.display().to_string());
            } else {
                diagnostics.push(unresolved_diagnostic(dep_name, manifest_path));
            }
        }

        // A pinned kind that no longer matches what the search paths
        // provide invalidates the dependency once the paths change.
        if revalidate_kinds
            && let Some(pinned) = dep.pinned_kind().map(normalize_kind)
        {
            let looks_like_project = candidate.is_some();
            if (pinned == "Project") != looks_like_project {
                resolved = false;
                diagnostics.push(
                    DiagnosticMessage::new(
                        KIND_CHANGED_CODE,
                        format!("the type of dependency '{dep_name}' was changed"),
                        DiagnosticSeverity::Error,
                    )
                    .with_location(manifest_path.display().to_string(), 0, 0),
                );
            }
        }

        let errors = diagnostics
            .iter()
            .filter(|d| d.severity.is_error())
            .map(DiagnosticMessage::formatted)
            .collect();
        let warnings = diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .map(DiagnosticMessage::formatted)
            .collect();
        info.diagnostics.extend(diagnostics);

        info.dependencies.insert(
            dep_name.clone(),
            DependencyDescription {
                name: dep_name.clone(),
                display_name: dep_name.clone(),
                version: dep.version().map(str::to_string),
                r#type: kind.to_string(),
                path,
                resolved,
                dependencies: Vec::new(),
                errors,
                warnings,
            },
        );
    }

    info
}

/// Sources a sibling project exports to its dependents, as absolute
/// paths. A sibling whose manifest cannot be read exports nothing; its
/// own resolution will surface the problem.
fn shared_sources(project_dir: &Path) -> Vec<String> {
    let Ok(text) = fs::read_to_string(project_dir.join(MANIFEST_FILE_NAME)) else {
        return Vec::new();
    };
    let Ok(manifest) = serde_json::from_str::<Manifest>(&text) else {
        return Vec::new();
    };
    manifest
        .shared
        .iter()
        .map(|rel| project_dir.join(rel).display().to_string())
        .collect()
}

fn normalize_kind(kind: &str) -> &'static str {
    if kind.eq_ignore_ascii_case("project") {
        "Project"
    } else {
        "Package"
    }
}

fn unresolved_diagnostic(dep_name: &str, manifest_path: &Path) -> DiagnosticMessage {
    DiagnosticMessage::new(
        UNRESOLVED_CODE,
        format!("unable to resolve dependency '{dep_name}'"),
        DiagnosticSeverity::Error,
    )
    .with_location(manifest_path.display().to_string(), 0, 0)
}

fn merge_compilation(
    base: &ManifestCompilation,
    configuration: Option<&ManifestCompilation>,
    framework: Option<&ManifestCompilation>,
) -> CompilationSettings {
    let mut settings = CompilationSettings {
        defines: base.defines.clone(),
        language_version: base.language_version.clone(),
        optimize: base.optimize.unwrap_or(false),
        emit_entry_point: base.emit_entry_point.unwrap_or(false),
        warnings_as_errors: base.warnings_as_errors.unwrap_or(false),
    };

    for layer in [configuration, framework].into_iter().flatten() {
        for define in &layer.defines {
            if !settings.defines.contains(define) {
                settings.defines.push(define.clone());
            }
        }
        if let Some(language_version) = &layer.language_version {
            settings.language_version = Some(language_version.clone());
        }
        if let Some(optimize) = layer.optimize {
            settings.optimize = optimize;
        }
        if let Some(emit_entry_point) = layer.emit_entry_point {
            settings.emit_entry_point = emit_entry_point;
        }
        if let Some(warnings_as_errors) = layer.warnings_as_errors {
            settings.warnings_as_errors = warnings_as_errors;
        }
    }

    settings
}

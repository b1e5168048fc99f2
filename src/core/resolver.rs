// src/core/resolver.rs

//! The resolution pass: one depth-first walk of the directive tree for one
//! generator identity and one set of option values, producing a flattened,
//! deduplicated build description.
//!
//! All per-pass state (the canonical paths already emitted, the modules
//! already traversed) lives on the [`Resolver`] value, which is constructed
//! fresh for every run. Nothing is process-wide or generator-wide, so
//! repeated runs cannot leak state into each other. Traversal order is part
//! of the directive semantics — selectors see previously established option
//! state and "first occurrence wins" deduplication depends on it — which is
//! why resolution is deliberately single-threaded.

use crate::core::directive::{
    DEFAULT_GENERATOR_KEY, Directive, EnumerationDirective, Scope, SourceDirectoriesDirective,
};
use crate::core::paths;
use crate::core::project::{GenerateError, Project};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Everything one generation run carries through resolution and emission.
pub struct RunContext<'p> {
    pub project: &'p Project,
    /// Identity of the generator performing this resolution, as matched by
    /// `+generator` selectors.
    pub generator_id: &'p str,
    /// The option values configured for this run. Selectors referencing an
    /// enumeration with no configured value simply do not fire.
    pub options: &'p BTreeMap<String, String>,
    /// The generator's own output directory; custom directives write their
    /// files below it.
    pub output_directory: PathBuf,
}

/// Receives the flattened effects of one resolution pass.
///
/// Defines arrive already split on the first `=`; a define without a value
/// carries `None` and the generator decides its default treatment. Files and
/// directories arrive canonicalized, first sighting only.
pub trait DirectiveSink {
    fn define(&mut self, _name: &str, _value: Option<&str>) {}
    fn source_file(&mut self, _file: &Path) {}
    fn third_party_source_file(&mut self, _file: &Path) {}
    fn header_path(&mut self, _directory: &Path) {}
    fn third_party_header_path(&mut self, _directory: &Path) {}
    fn target_name(&mut self, _name: &str) {}
    fn project_file(&mut self, _file: &Path) {}
}

pub struct Resolver<'r> {
    run: &'r RunContext<'r>,
    visited_source_files: HashSet<PathBuf>,
    visited_header_paths: HashSet<PathBuf>,
    /// Modules traversed in this pass. Distinct from the project-level import
    /// memoization: that one makes two imports share a parsed scope, this one
    /// keeps the shared scope from being walked twice in one pass.
    visited_modules: HashSet<PathBuf>,
}

impl<'r> Resolver<'r> {
    pub fn new(run: &'r RunContext<'r>) -> Self {
        Self {
            run,
            visited_source_files: HashSet::new(),
            visited_header_paths: HashSet::new(),
            visited_modules: HashSet::new(),
        }
    }

    /// Walks the whole directive tree once, forwarding effects to `sink` and
    /// running custom directives as they are encountered.
    pub fn resolve(&mut self, sink: &mut dyn DirectiveSink) -> Result<(), GenerateError> {
        let run = self.run;
        self.visit_scope(run.project.root_scope(), sink)
    }

    fn visit_scope(&mut self, scope: &Scope, sink: &mut dyn DirectiveSink) -> Result<(), GenerateError> {
        for directive in scope.directives() {
            self.visit_directive(directive, sink)?;
        }
        Ok(())
    }

    fn visit_directive(
        &mut self,
        directive: &Directive,
        sink: &mut dyn DirectiveSink,
    ) -> Result<(), GenerateError> {
        match directive {
            Directive::Define(defines) => {
                for define in defines {
                    match define.split_once('=') {
                        Some((name, value)) => sink.define(name, Some(value)),
                        None => sink.define(define, None),
                    }
                }
            }
            Directive::SourceDirectories(inner) => {
                self.visit_source_directories(inner, sink, false)?;
            }
            Directive::ThirdPartySourceDirectories(inner) => {
                self.visit_source_directories(inner, sink, true)?;
            }
            Directive::HeaderPaths(directories) => {
                for directory in directories {
                    if self.visited_header_paths.insert(paths::canonicalize(directory)) {
                        sink.header_path(directory);
                    }
                }
            }
            Directive::ThirdPartyHeaderPaths(directories) => {
                for directory in directories {
                    if self.visited_header_paths.insert(paths::canonicalize(directory)) {
                        sink.third_party_header_path(directory);
                    }
                }
            }
            // Consulted, not walked: its declaration establishes the legal
            // value domain, nothing more.
            Directive::Enumeration(_) => {}
            Directive::Selector(selector) => {
                let fires = self
                    .run
                    .options
                    .get(&selector.enumeration_id)
                    .is_some_and(|value| selector.matching_values.contains(value));
                if fires {
                    self.visit_scope(&selector.scope, sink)?;
                }
            }
            Directive::GeneratorSelector(selector) => {
                let branch = selector
                    .branch(self.run.generator_id)
                    .or_else(|| selector.branch(DEFAULT_GENERATOR_KEY));
                if let Some(scope) = branch {
                    self.visit_scope(scope, sink)?;
                }
            }
            Directive::RootProjectSelector(selector) => {
                if selector.root_project {
                    self.visit_scope(&selector.scope, sink)?;
                }
            }
            Directive::Import(import) => {
                if self.visited_modules.insert(import.module_path.clone()) {
                    sink.project_file(&import.project_file);
                    self.visit_scope(&import.scope, sink)?;
                }
            }
            Directive::TargetName(name) => sink.target_name(name),
            Directive::Custom(custom) => custom.run(self.run)?,
        }
        Ok(())
    }

    fn visit_source_directories(
        &mut self,
        directive: &SourceDirectoriesDirective,
        sink: &mut dyn DirectiveSink,
        third_party: bool,
    ) -> Result<(), GenerateError> {
        for file in directive.files()? {
            let canonical = paths::canonicalize(&file);
            if !self.visited_source_files.insert(canonical.clone()) {
                continue;
            }
            // The tool's own output lives under the project tree; generated
            // files must never feed back into the build description.
            if paths::is_inside(&canonical, self.run.project.output_directory()) {
                continue;
            }
            if third_party {
                sink.third_party_source_file(&canonical);
            } else {
                sink.source_file(&canonical);
            }
        }
        Ok(())
    }
}

/// How a generator classifies and defaults what the resolver hands it.
pub struct GeneratorConventions {
    pub source_extensions: &'static [&'static str],
    pub header_extensions: &'static [&'static str],
    /// Value given to a define that names no value (e.g. `"1"` for C
    /// preprocessor semantics).
    pub default_define_value: &'static str,
}

impl GeneratorConventions {
    fn is_source_file(&self, file: &Path) -> bool {
        file_has_extension(file, self.source_extensions)
    }

    fn is_header_file(&self, file: &Path) -> bool {
        file_has_extension(file, self.header_extensions)
    }
}

fn file_has_extension(file: &Path, extensions: &[&str]) -> bool {
    let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|extension| name.len() > extension.len() && name.ends_with(extension))
}

/// The flattened, deduplicated result of one resolution pass.
#[derive(Debug, Default, PartialEq)]
pub struct BuildDescription {
    pub target_name: String,
    /// Name → value in first-occurrence order; a later define with the same
    /// name overwrites the value but keeps the position.
    pub defines: Vec<(String, String)>,
    pub source_files: Vec<PathBuf>,
    pub header_files: Vec<PathBuf>,
    pub third_party_source_files: Vec<PathBuf>,
    pub third_party_header_files: Vec<PathBuf>,
    pub header_paths: Vec<PathBuf>,
    pub third_party_header_paths: Vec<PathBuf>,
    /// Project files visited through imports, for IDE grouping.
    pub project_files: Vec<PathBuf>,
}

impl BuildDescription {
    /// Runs a full resolution pass and collects it into a description using
    /// the generator's file-classification conventions.
    pub fn collect(
        run: &RunContext<'_>,
        conventions: &GeneratorConventions,
    ) -> Result<Self, GenerateError> {
        let mut description = Self {
            target_name: crate::constants::DEFAULT_TARGET_NAME.to_string(),
            ..Self::default()
        };

        let mut collector = Collector {
            description: &mut description,
            conventions,
        };
        Resolver::new(run).resolve(&mut collector)?;
        Ok(description)
    }
}

struct Collector<'a> {
    description: &'a mut BuildDescription,
    conventions: &'a GeneratorConventions,
}

impl DirectiveSink for Collector<'_> {
    fn define(&mut self, name: &str, value: Option<&str>) {
        let value = value.unwrap_or(self.conventions.default_define_value);
        if let Some(entry) = self
            .description
            .defines
            .iter_mut()
            .find(|(existing, _)| existing.as_str() == name)
        {
            entry.1 = value.to_string();
        } else {
            self.description
                .defines
                .push((name.to_string(), value.to_string()));
        }
    }

    fn source_file(&mut self, file: &Path) {
        if self.conventions.is_source_file(file) {
            self.description.source_files.push(file.to_path_buf());
        } else if self.conventions.is_header_file(file) {
            self.description.header_files.push(file.to_path_buf());
        }
    }

    fn third_party_source_file(&mut self, file: &Path) {
        if self.conventions.is_source_file(file) {
            self.description
                .third_party_source_files
                .push(file.to_path_buf());
        } else if self.conventions.is_header_file(file) {
            self.description
                .third_party_header_files
                .push(file.to_path_buf());
        }
    }

    fn header_path(&mut self, directory: &Path) {
        self.description.header_paths.push(directory.to_path_buf());
    }

    fn third_party_header_path(&mut self, directory: &Path) {
        self.description
            .third_party_header_paths
            .push(directory.to_path_buf());
    }

    fn target_name(&mut self, name: &str) {
        self.description.target_name = name.to_string();
    }

    fn project_file(&mut self, file: &Path) {
        self.description.project_files.push(file.to_path_buf());
    }
}

/// Pure visibility query for presentation layers: the enumerations a user
/// should currently be offered, given a generator identity and the options
/// selected so far. Performs the same gating as a resolution pass but never
/// touches the filesystem and never runs custom directives, so it is safe to
/// call while a user is still making up their mind.
pub fn visible_enumerations<'p>(
    project: &'p Project,
    generator_id: &str,
    options: &BTreeMap<String, String>,
) -> Vec<&'p EnumerationDirective> {
    let mut result = Vec::new();
    let mut visited_modules = HashSet::new();
    collect_enumerations(
        project.root_scope(),
        generator_id,
        options,
        &mut visited_modules,
        &mut result,
    );
    result
}

fn collect_enumerations<'p>(
    scope: &'p Scope,
    generator_id: &str,
    options: &BTreeMap<String, String>,
    visited_modules: &mut HashSet<PathBuf>,
    result: &mut Vec<&'p EnumerationDirective>,
) {
    for directive in scope.directives() {
        match directive {
            Directive::Enumeration(enumeration) => result.push(enumeration),
            Directive::Selector(selector) => {
                let fires = options
                    .get(&selector.enumeration_id)
                    .is_some_and(|value| selector.matching_values.contains(value));
                if fires {
                    collect_enumerations(&selector.scope, generator_id, options, visited_modules, result);
                }
            }
            Directive::GeneratorSelector(selector) => {
                let branch = selector
                    .branch(generator_id)
                    .or_else(|| selector.branch(DEFAULT_GENERATOR_KEY));
                if let Some(inner) = branch {
                    collect_enumerations(inner, generator_id, options, visited_modules, result);
                }
            }
            Directive::RootProjectSelector(selector) => {
                if selector.root_project {
                    collect_enumerations(&selector.scope, generator_id, options, visited_modules, result);
                }
            }
            Directive::Import(import) => {
                if visited_modules.insert(import.module_path.clone()) {
                    collect_enumerations(&import.scope, generator_id, options, visited_modules, result);
                }
            }
            Directive::Define(_)
            | Directive::SourceDirectories(_)
            | Directive::ThirdPartySourceDirectories(_)
            | Directive::HeaderPaths(_)
            | Directive::ThirdPartyHeaderPaths(_)
            | Directive::TargetName(_)
            | Directive::Custom(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROJECT_FILE_NAME;
    use crate::plugins::PluginRegistry;
    use std::fs;

    const TEST_CONVENTIONS: GeneratorConventions = GeneratorConventions {
        source_extensions: &[".c", ".cc", ".cpp", ".cxx"],
        header_extensions: &[".h", ".hh", ".hpp", ".hxx", ".inl"],
        default_define_value: "1",
    };

    fn write_file(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn open_project(directory: &Path) -> Project {
        let registry = PluginRegistry::builtin();
        Project::open(directory, &registry).unwrap()
    }

    fn collect(
        project: &Project,
        generator_id: &str,
        options: &[(&str, &str)],
    ) -> BuildDescription {
        let options: BTreeMap<String, String> = options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let run = RunContext {
            project,
            generator_id,
            options: &options,
            output_directory: project.output_directory().join("test"),
        };
        BuildDescription::collect(&run, &TEST_CONVENTIONS).unwrap()
    }

    fn define_names(description: &BuildDescription) -> Vec<&str> {
        description
            .defines
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    #[test]
    fn selector_gating_follows_the_configured_value() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "enum:\n  id: platform\n  title: Platform\n  default: linux\n  values:\n    windows: Windows\n    linux: Linux\n\
             ^platform(windows):\n  define: USE_WIN32\n",
        );

        let project = open_project(dir.path());
        let on_linux = collect(&project, "cmake", &[("platform", "linux")]);
        assert!(!define_names(&on_linux).contains(&"USE_WIN32"));

        let on_windows = collect(&project, "cmake", &[("platform", "windows")]);
        assert!(define_names(&on_windows).contains(&"USE_WIN32"));

        // No configured value at all: the subtree is invisible.
        let unset = collect(&project, "cmake", &[]);
        assert!(!define_names(&unset).contains(&"USE_WIN32"));
    }

    #[test]
    fn source_files_are_deduplicated_across_overlapping_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("src/main.cpp"), "int main() {}\n");
        write_file(&dir.path().join("src/sub/util.cpp"), "\n");
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "source_directories:\n  - src\n  - src/sub\n",
        );

        let project = open_project(dir.path());
        let description = collect(&project, "cmake", &[]);
        assert_eq!(description.source_files.len(), 2);
    }

    #[test]
    fn generator_selector_falls_back_to_default_branch() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "+generator:\n  +xcode:\n    define: FOR_XCODE\n  +default:\n    define: FALLBACK\n",
        );

        let project = open_project(dir.path());
        let description = collect(&project, "cmake", &[]);
        assert_eq!(define_names(&description), vec!["FALLBACK"]);

        let description = collect(&project, "xcode", &[]);
        assert_eq!(define_names(&description), vec!["FOR_XCODE"]);
    }

    #[test]
    fn diamond_imports_emit_module_effects_once() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("shared/code/lib.cpp"), "\n");
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "import:\n  - a\n  - b\n",
        );
        write_file(&dir.path().join("a").join(PROJECT_FILE_NAME), "import: ../shared\n");
        write_file(&dir.path().join("b").join(PROJECT_FILE_NAME), "import: ../shared\n");
        write_file(
            &dir.path().join("shared").join(PROJECT_FILE_NAME),
            "source_directories: code\ndefine: SHARED\n",
        );

        let project = open_project(dir.path());
        let description = collect(&project, "cmake", &[]);
        assert_eq!(description.source_files.len(), 1);
        assert_eq!(define_names(&description), vec!["SHARED"]);
        // a, b and shared each contribute one project file, shared only once.
        assert_eq!(description.project_files.len(), 3);
    }

    #[test]
    fn last_target_name_wins_and_fallback_applies() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "target_name: first\n^which(second):\n  target_name: second\n",
        );

        let project = open_project(dir.path());
        let description = collect(&project, "cmake", &[("which", "second")]);
        assert_eq!(description.target_name, "second");

        let description = collect(&project, "cmake", &[]);
        assert_eq!(description.target_name, "first");

        let empty_dir = tempfile::tempdir().unwrap();
        write_file(&empty_dir.path().join(PROJECT_FILE_NAME), "define: X\n");
        let project = open_project(empty_dir.path());
        let description = collect(&project, "cmake", &[]);
        assert_eq!(description.target_name, "App");
    }

    #[test]
    fn defines_split_on_first_equals_and_overwrite_in_place() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "define:\n  - PLAIN\n  - PATH=a=b\n  - PLAIN=7\n",
        );

        let project = open_project(dir.path());
        let description = collect(&project, "cmake", &[]);
        assert_eq!(
            description.defines,
            vec![
                ("PLAIN".to_string(), "7".to_string()),
                ("PATH".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn generated_output_never_feeds_back_into_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("main.cpp"), "int main() {}\n");
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "source_directories: .\n",
        );

        let project = open_project(dir.path());
        // Simulate a leftover generated source from an earlier run.
        write_file(
            &project.output_directory().join("cmake/generated.cpp"),
            "\n",
        );

        let description = collect(&project, "cmake", &[]);
        let names: Vec<String> = description
            .source_files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["main.cpp"]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("src/z.cpp"), "\n");
        write_file(&dir.path().join("src/a.cpp"), "\n");
        write_file(&dir.path().join("src/a.hpp"), "\n");
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "source_directories: src\nheader_search_paths: src\ndefine: [A, B=2]\n",
        );

        let project = open_project(dir.path());
        let first = collect(&project, "cmake", &[]);
        project.clear_directive_caches();
        let second = collect(&project, "cmake", &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn hidden_enumerations_become_visible_when_their_selector_fires() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join(PROJECT_FILE_NAME),
            "enum:\n  id: platform\n  title: Platform\n  values:\n    windows: Windows\n    linux: Linux\n\
             ^platform(windows):\n\
             \x20 enum:\n\
             \x20   id: toolkit\n\
             \x20   title: Toolkit\n\
             \x20   values:\n\
             \x20     win32: Win32\n",
        );

        let project = open_project(dir.path());

        let options = BTreeMap::new();
        let visible = visible_enumerations(&project, "cmake", &options);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "platform");

        let options: BTreeMap<String, String> =
            [("platform".to_string(), "windows".to_string())].into();
        let visible = visible_enumerations(&project, "cmake", &options);
        let ids: Vec<&str> = visible.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["platform", "toolkit"]);
    }
}

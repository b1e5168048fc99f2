// src/core/directive.rs

//! The directive model: the typed units a project description is made of,
//! and the scopes that assemble them into a tree.

use crate::core::paths;
use log::debug;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::plugins::CustomDirective;

/// The fallback branch key of a `+generator` selector.
pub const DEFAULT_GENERATOR_KEY: &str = "default";

/// One typed unit of project configuration.
///
/// The set is closed on purpose: everything that handles directives matches
/// exhaustively, so adding a variant is a compile error at every site that
/// needs to learn about it.
#[derive(Debug)]
pub enum Directive {
    /// Preprocessor-style flags in raw `NAME` / `NAME=VALUE` form. The split
    /// on the first `=` happens at resolution time.
    Define(Vec<String>),
    SourceDirectories(SourceDirectoriesDirective),
    ThirdPartySourceDirectories(SourceDirectoriesDirective),
    HeaderPaths(Vec<PathBuf>),
    ThirdPartyHeaderPaths(Vec<PathBuf>),
    Enumeration(EnumerationDirective),
    Selector(SelectorDirective),
    GeneratorSelector(GeneratorSelectorDirective),
    RootProjectSelector(RootProjectSelectorDirective),
    Import(Arc<ImportDirective>),
    TargetName(String),
    Custom(Box<dyn CustomDirective>),
}

/// An ordered list of directives introduced by one block of the project file.
///
/// Enumeration-id reservations (unique along ancestor chains, bubbling
/// through transparent import-introduced scopes up to the first opaque
/// selector boundary) are enforced by the parser's scope-frame stack while
/// the tree is being built; the finished tree only needs the directives.
#[derive(Debug, Default)]
pub struct Scope {
    directives: Vec<Directive>,
}

impl Scope {
    pub fn push(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Drops the cached directory enumerations of every directive reachable
    /// from this scope. Called before each generation run: the directives are
    /// long-lived, and directory contents may have changed since they were
    /// last expanded.
    pub fn clear_caches(&self) {
        for directive in &self.directives {
            match directive {
                Directive::SourceDirectories(inner) | Directive::ThirdPartySourceDirectories(inner) => {
                    inner.clear_cache();
                }
                Directive::Selector(inner) => inner.scope.clear_caches(),
                Directive::GeneratorSelector(inner) => {
                    for (_, scope) in &inner.branches {
                        scope.clear_caches();
                    }
                }
                Directive::RootProjectSelector(inner) => inner.scope.clear_caches(),
                Directive::Import(inner) => inner.scope.clear_caches(),
                Directive::Define(_)
                | Directive::HeaderPaths(_)
                | Directive::ThirdPartyHeaderPaths(_)
                | Directive::Enumeration(_)
                | Directive::TargetName(_)
                | Directive::Custom(_) => {}
            }
        }
    }
}

/// Directories recursively expanded into a file list on first use.
///
/// The expansion is cached on the directive because the same instance is
/// walked by every generation run against the same project.
#[derive(Debug)]
pub struct SourceDirectoriesDirective {
    directories: Vec<PathBuf>,
    files: Mutex<Option<Vec<PathBuf>>>,
}

impl SourceDirectoriesDirective {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            files: Mutex::new(None),
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Every file under the configured directories, enumerated once and
    /// cached until [`Scope::clear_caches`] runs.
    pub fn files(&self) -> io::Result<Vec<PathBuf>> {
        let mut cache = self.files.lock().expect("file cache mutex poisoned");
        if cache.is_none() {
            let mut files = Vec::new();
            for directory in &self.directories {
                debug!("enumerating files under \"{}\"", directory.display());
                files.extend(paths::enumerate_files(directory)?);
            }
            *cache = Some(files);
        }
        Ok(cache.as_ref().expect("cache populated above").clone())
    }

    pub fn clear_cache(&self) {
        *self.files.lock().expect("file cache mutex poisoned") = None;
    }
}

/// A named option with a fixed, ordered set of legal values.
#[derive(Debug, Clone)]
pub struct EnumerationDirective {
    pub id: String,
    pub title: String,
    /// Must name one of `values` when present; checked at parse time.
    pub default_value: Option<String>,
    /// Value name → human-readable description, in declaration order.
    pub values: Vec<(String, String)>,
}

impl EnumerationDirective {
    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|(value, _)| value == name)
    }
}

/// Conditionally includes its scope when the configured value of an
/// enumeration is one of the matching values.
#[derive(Debug)]
pub struct SelectorDirective {
    pub enumeration_id: String,
    /// Non-empty. Not validated against the enumeration's declared value set
    /// at parse time, so forward references across imports are tolerated.
    pub matching_values: HashSet<String>,
    pub scope: Scope,
}

/// Branches by the identity of the generator performing resolution.
#[derive(Debug)]
pub struct GeneratorSelectorDirective {
    /// Generator id → scope, in declaration order. `default` is the fallback.
    pub branches: Vec<(String, Scope)>,
}

impl GeneratorSelectorDirective {
    pub fn branch(&self, generator_id: &str) -> Option<&Scope> {
        self.branches
            .iter()
            .find(|(id, _)| id == generator_id)
            .map(|(_, scope)| scope)
    }
}

/// Included only when resolution runs against the top-level project file.
/// The flag is fixed at parse time (import depth of the declaring file).
#[derive(Debug)]
pub struct RootProjectSelectorDirective {
    pub scope: Scope,
    pub root_project: bool,
}

/// Splices another project description in at this point. Instances are
/// memoized per canonical module path at the project level and shared.
#[derive(Debug)]
pub struct ImportDirective {
    /// Canonical path of the imported module's directory.
    pub module_path: PathBuf,
    /// Canonical path of the module's project file, recorded for IDE
    /// grouping of project files.
    pub project_file: PathBuf,
    pub scope: Scope,
}

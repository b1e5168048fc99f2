// src/core/project.rs

//! Project lifecycle: parse the directive tree once, keep the build cache
//! open, and run any number of generation runs against it. A run that fails
//! rolls the cache back and leaves the project usable for another attempt.

use crate::constants::{OUTPUT_DIRECTORY_NAME, PROJECT_FILE_NAME};
use crate::core::database::{Database, DatabaseError};
use crate::core::directive::{ImportDirective, Scope};
use crate::core::parser::{ParseError, ProjectFileParser};
use crate::core::paths;
use crate::plugins::{Plugin, PluginRegistry};
use crate::generators::Generator;
use crate::system::invoker::{InvokeError, OutputSink};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("project file \"{}\" does not exist", .0.display())]
    MissingProjectFile(PathBuf),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can go wrong during one generation run. Fatal to the run
/// only: the database is rolled back and the project remains usable.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("use of undeclared variable \"{0}\" in a template")]
    UndeclaredTemplateVariable(String),
    #[error("{0}")]
    Generator(String),
}

pub struct Project {
    project_directory: PathBuf,
    output_directory: PathBuf,
    root_scope: Scope,
    imports: HashMap<PathBuf, Arc<ImportDirective>>,
    plugins: Vec<Arc<dyn Plugin>>,
    database: Database,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("project_directory", &self.project_directory)
            .field("output_directory", &self.output_directory)
            .field("root_scope", &self.root_scope)
            .field("imports", &self.imports)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl Project {
    /// Parses `project.yml` in `directory`, prepares the hidden output
    /// directory and opens the build cache. Parsing aborts on the first
    /// error; no partially constructed project is ever returned.
    pub fn open(directory: &Path, registry: &PluginRegistry) -> Result<Self, OpenError> {
        let project_directory = paths::canonicalize(directory);
        let project_file = project_directory.join(PROJECT_FILE_NAME);
        if !project_file.exists() {
            return Err(OpenError::MissingProjectFile(project_file));
        }

        let parsed = ProjectFileParser::new(registry).parse_project(&project_file)?;

        let output_directory = project_directory.join(OUTPUT_DIRECTORY_NAME);
        fs::create_dir_all(&output_directory)?;
        let database = Database::open(&output_directory)?;

        Ok(Self {
            project_directory,
            output_directory,
            root_scope: parsed.root,
            imports: parsed.imports,
            plugins: parsed.plugins,
            database,
        })
    }

    pub fn project_directory(&self) -> &Path {
        &self.project_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn root_scope(&self) -> &Scope {
        &self.root_scope
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The plugin instances activated by `plugin:` directives, in activation
    /// order.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Drops every cached directory enumeration in the directive tree.
    /// Directives outlive generation runs, and the filesystem may have
    /// changed between them.
    pub fn clear_directive_caches(&self) {
        debug!("clearing cached directory enumerations");
        self.root_scope.clear_caches();
        for import in self.imports.values() {
            import.scope.clear_caches();
        }
    }

    /// Runs one full generation: resolution, emission and (optionally) the
    /// external build tool, bracketed by exactly one commit or rollback of
    /// the build cache.
    pub fn generate(
        &self,
        generator: &dyn Generator,
        options: &BTreeMap<String, String>,
        output: &mut dyn OutputSink,
        build: bool,
    ) -> Result<(), GenerateError> {
        println!("Generating project for {}.", generator.name());
        self.clear_directive_caches();

        if !options.is_empty() {
            println!("Using options:");
            let width = options.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in options {
                println!("  {key:width$} = {value}");
            }
            println!();
        }

        match generator.generate(self, options, output, build) {
            Ok(()) => {
                self.database.commit()?;
                Ok(())
            }
            Err(error) => {
                self.database.rollback_safe();
                Err(error)
            }
        }
    }
}

/// Runs one generation on a dedicated worker thread and blocks until it
/// completes. Keeps the run off the initiating thread while giving callers a
/// plain join instead of a completion callback.
pub fn generate_on_worker(
    project: &Project,
    generator: &dyn Generator,
    options: &BTreeMap<String, String>,
    output: &mut dyn OutputSink,
    build: bool,
) -> Result<(), GenerateError> {
    thread::scope(|scope| {
        scope
            .spawn(|| project.generate(generator, options, output, build))
            .join()
            .expect("generation worker panicked")
    })
}

// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// lathe: a declarative project-file generator for native build systems.
///
/// Reads the `project.yml` description of a project, resolves its conditional
/// directives for one generator and one set of configuration options, and
/// emits the input files of the corresponding external build tool — running
/// that tool too when asked. Repeated runs are incremental: unchanged
/// generated files are never rewritten.
///
/// Without `--batch`, missing choices (generator, configuration options) are
/// asked for interactively and remembered for the next invocation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the source directory of the project.
    #[arg(short, long, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Identifier of the generator to use (e.g. "cmake").
    #[arg(short, long, value_name = "ID")]
    pub generator: Option<String>,

    /// Run without prompts. Requires a generator, either given with
    /// --generator or remembered from an earlier run.
    #[arg(short, long)]
    pub batch: bool,

    /// Verbose error reporting.
    #[arg(short, long)]
    pub verbose: bool,

    /// Invoke the external build tool after generating its input files.
    #[arg(long)]
    pub build: bool,

    /// Build tool for the CMake generator (e.g. "Ninja").
    #[arg(long, value_name = "NAME")]
    pub build_tool: Option<String>,

    /// Build type for the CMake generator (e.g. "Release").
    #[arg(long, value_name = "NAME")]
    pub build_type: Option<String>,

    /// Configuration option overrides in name=value form.
    #[arg(value_name = "NAME=VALUE")]
    pub options: Vec<String>,
}

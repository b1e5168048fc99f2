// src/bin/lathe.rs

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use colored::Colorize;
use lathe::cli::Cli;
use lathe::constants::{OPTION_GENERATOR, PROJECT_OPTION_PREFIX};
use lathe::core::project::{self, Project};
use lathe::core::resolver;
use lathe::generators::{self, Generator, cmake};
use lathe::plugins::PluginRegistry;
use lathe::system::invoker::ConsoleSink;
use std::collections::BTreeMap;
use std::env;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(error) = run(cli) {
        if verbose {
            eprintln!("{} {error:?}", "Error:".red().bold());
        } else {
            eprintln!("{} {error:#}", "Error:".red().bold());
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let project_directory = match &cli.project {
        Some(path) => {
            if !path.exists() {
                bail!("Directory does not exist: \"{}\".", path.display());
            }
            if !path.is_dir() {
                bail!("\"{}\" is not a directory.", path.display());
            }
            path.clone()
        }
        None => env::current_dir()?,
    };

    let overrides = parse_overrides(&cli.options)?;

    let registry = PluginRegistry::builtin();
    let project = Project::open(&project_directory, &registry)?;

    // Generator-specific settings given on the command line are validated and
    // persisted up front, exactly like answers given interactively; they are
    // committed together with the run they configure.
    if let Some(build_tool) = &cli.build_tool {
        if cmake::BuildTool::from_title(build_tool).is_none() {
            bail!("Invalid build tool \"{build_tool}\".");
        }
        project
            .database()
            .set_option(cmake::OPTION_BUILD_TOOL, build_tool)?;
    }
    if let Some(build_type) = &cli.build_type {
        if !cmake::is_valid_build_type(build_type) {
            bail!("Invalid build type \"{build_type}\".");
        }
        project
            .database()
            .set_option(cmake::OPTION_BUILD_TYPE, build_type)?;
    }

    let generator = select_generator(&cli, &project)?;
    project
        .database()
        .set_option(OPTION_GENERATOR, generator.id())?;

    if cli.batch {
        project::generate_on_worker(
            &project,
            generator.as_ref(),
            &overrides,
            &mut ConsoleSink,
            cli.build,
        )?;
        println!(
            "{}",
            "Project has been successfully generated.".green().bold()
        );
        return Ok(());
    }

    run_interactive(&project, generator.as_ref(), &overrides, cli.build)
}

fn select_generator(cli: &Cli, project: &Project) -> Result<Box<dyn Generator>> {
    if let Some(id) = &cli.generator {
        return generators::find(id).ok_or_else(|| anyhow!("Invalid generator \"{id}\"."));
    }

    // Re-invocation without flags reuses the last recorded choice.
    let remembered = project
        .database()
        .get_option(OPTION_GENERATOR)?
        .and_then(|id| generators::find(&id));
    if let Some(generator) = remembered {
        return Ok(generator);
    }

    if cli.batch {
        bail!("No generator was specified on the command line.");
    }

    let all = generators::all();
    let names: Vec<&str> = all.iter().map(|generator| generator.name()).collect();
    let index = dialoguer::Select::new()
        .with_prompt("Generator")
        .items(&names)
        .default(0)
        .interact()?;
    Ok(all
        .into_iter()
        .nth(index)
        .expect("selection is within range"))
}

fn run_interactive(
    project: &Project,
    generator: &dyn Generator,
    overrides: &BTreeMap<String, String>,
    build: bool,
) -> Result<()> {
    loop {
        let options = ask_options(project, generator.id(), overrides)?;

        match project::generate_on_worker(project, generator, &options, &mut ConsoleSink, build) {
            Ok(()) => {
                println!(
                    "{}",
                    "Project has been successfully generated.".green().bold()
                );
                return Ok(());
            }
            Err(error) => {
                // The run rolled the build cache back; the project is still
                // usable, so offer another attempt with fresh answers.
                eprintln!("{} {error}", "Error:".red().bold());
                let retry = dialoguer::Confirm::new()
                    .with_prompt("Try again?")
                    .default(true)
                    .interact()?;
                if !retry {
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Asks for every enumeration currently visible, iterating until answering
/// one question reveals no further ones. Earlier answers (and enumeration
/// defaults) preselect the prompt; all answers are remembered for next time.
fn ask_options(
    project: &Project,
    generator_id: &str,
    overrides: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut options = overrides.clone();

    loop {
        let visible = resolver::visible_enumerations(project, generator_id, &options);
        let mut asked_any = false;

        for enumeration in visible {
            if options.contains_key(&enumeration.id) {
                continue;
            }

            let remembered = project
                .database()
                .get_option(&format!("{PROJECT_OPTION_PREFIX}{}", enumeration.id))?;
            let preferred = remembered
                .as_deref()
                .or(enumeration.default_value.as_deref());
            let default_index = preferred
                .and_then(|value| {
                    enumeration
                        .values
                        .iter()
                        .position(|(name, _)| name == value)
                })
                .unwrap_or(0);

            let labels: Vec<String> = enumeration
                .values
                .iter()
                .map(|(name, description)| format!("{description} ({name})"))
                .collect();
            let index = dialoguer::Select::new()
                .with_prompt(enumeration.title.as_str())
                .items(&labels)
                .default(default_index)
                .interact()?;

            let (value, _) = &enumeration.values[index];
            options.insert(enumeration.id.clone(), value.clone());
            asked_any = true;
        }

        if !asked_any {
            break;
        }
    }

    for (id, value) in &options {
        project
            .database()
            .set_option(&format!("{PROJECT_OPTION_PREFIX}{id}"), value)?;
    }

    Ok(options)
}

fn parse_overrides(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut overrides = BTreeMap::new();
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("Invalid option \"{pair}\"; expected name=value.");
        };
        if name.is_empty() {
            bail!("Invalid option \"{pair}\"; expected name=value.");
        }
        overrides.insert(name.to_string(), value.to_string());
    }
    Ok(overrides)
}

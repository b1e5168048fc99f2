// src/generators/cmake.rs

//! The CMake generator: emits `CMakeLists.txt` files and the source-list
//! includes for one build tool / build type combination, then optionally runs
//! `cmake` to produce (and build) the native project.
//!
//! The selected build tool and build type are persisted database options, so
//! re-invocation without explicit flags reuses the last choice and the
//! generator itself stays stateless.

use crate::constants::PROJECT_FILE_NAME;
use crate::core::file_builder::FileBuilder;
use crate::core::paths;
use crate::core::project::{GenerateError, Project};
use crate::core::resolver::{BuildDescription, GeneratorConventions, RunContext};
use crate::core::template::Template;
use crate::generators::Generator;
use crate::system::invoker::{self, OutputSink};
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub const ID: &str = "cmake";
pub const NAME: &str = "CMake 3.5+";
const SOURCE_DIRECTORY: &str = "src";

/// Database option keys persisted across runs.
pub const OPTION_BUILD_TOOL: &str = "CMakeBuildTool";
pub const OPTION_BUILD_TYPE: &str = "CMakeBuildType";

pub const BUILD_TYPES: &[&str] = &["Debug", "Release", "RelWithDebInfo", "MinSizeRel"];

const CONVENTIONS: GeneratorConventions = GeneratorConventions {
    source_extensions: &[".c", ".cc", ".cpp", ".cxx"],
    header_extensions: &[".h", ".hh", ".hpp", ".hxx", ".inl"],
    default_define_value: "1",
};

lazy_static! {
    static ref ROOT_TEMPLATE: Template =
        Template::parse(include_str!("templates/root-CMakeLists.txt.in"));
    static ref SRC_TEMPLATE: Template =
        Template::parse(include_str!("templates/src-CMakeLists.txt.in"));
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuildTool {
    UnixMakefiles,
    Ninja,
    Xcode,
    MinGw32,
    MinGw64,
    Vs2013Win32,
    Vs2013Win64,
    Vs2015Win32,
    Vs2015Win64,
}

impl BuildTool {
    const ALL: &'static [Self] = &[
        Self::UnixMakefiles,
        Self::Ninja,
        Self::Xcode,
        Self::MinGw32,
        Self::MinGw64,
        Self::Vs2013Win32,
        Self::Vs2013Win64,
        Self::Vs2015Win32,
        Self::Vs2015Win64,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::UnixMakefiles => "Unix Makefiles",
            Self::Ninja => "Ninja",
            Self::Xcode => "Xcode",
            Self::MinGw32 => "MinGW (32-bit)",
            Self::MinGw64 => "MinGW (64-bit)",
            Self::Vs2013Win32 => "Visual Studio 2013 (32-bit)",
            Self::Vs2013Win64 => "Visual Studio 2013 (64-bit)",
            Self::Vs2015Win32 => "Visual Studio 2015 (32-bit)",
            Self::Vs2015Win64 => "Visual Studio 2015 (64-bit)",
        }
    }

    fn directory_name(self) -> &'static str {
        match self {
            Self::UnixMakefiles => "makefiles",
            Self::Ninja => "ninja",
            Self::Xcode => "xcode",
            Self::MinGw32 => "mingw32",
            Self::MinGw64 => "mingw64",
            Self::Vs2013Win32 => "vs2013_win32",
            Self::Vs2013Win64 => "vs2013_win64",
            Self::Vs2015Win32 => "vs2015_win32",
            Self::Vs2015Win64 => "vs2015_win64",
        }
    }

    fn cmake_generator(self) -> String {
        match self {
            Self::UnixMakefiles => "Unix Makefiles".to_string(),
            Self::Ninja => "Ninja".to_string(),
            Self::Xcode => "Xcode".to_string(),
            // An MSYS shell changes which makefile flavor CMake should emit.
            Self::MinGw32 | Self::MinGw64 => {
                if paths::resolve_executable("sh").is_some() {
                    "MSYS Makefiles".to_string()
                } else {
                    "MinGW Makefiles".to_string()
                }
            }
            Self::Vs2013Win32 => "Visual Studio 12 2013".to_string(),
            Self::Vs2013Win64 => "Visual Studio 12 2013 Win64".to_string(),
            Self::Vs2015Win32 => "Visual Studio 14 2015".to_string(),
            Self::Vs2015Win64 => "Visual Studio 14 2015 Win64".to_string(),
        }
    }

    fn accepts_build_type(self) -> bool {
        matches!(
            self,
            Self::UnixMakefiles | Self::Ninja | Self::MinGw32 | Self::MinGw64
        )
    }

    fn extra_defines(self) -> &'static [&'static str] {
        match self {
            Self::MinGw32 => &["Z_MINGW_CFLAGS=-m32"],
            Self::MinGw64 => &["Z_MINGW_CFLAGS=-m64"],
            _ => &[],
        }
    }

    /// The build tools usable on the current platform, in presentation order.
    pub fn available() -> Vec<Self> {
        let mut tools = Vec::new();
        if cfg!(target_os = "macos") {
            tools.push(Self::Xcode);
        }
        if cfg!(target_os = "windows") {
            tools.extend([
                Self::Vs2013Win32,
                Self::Vs2013Win64,
                Self::Vs2015Win32,
                Self::Vs2015Win64,
                Self::MinGw32,
                Self::MinGw64,
            ]);
        } else {
            tools.push(Self::UnixMakefiles);
        }
        tools.push(Self::Ninja);
        tools
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tool| tool.title() == title)
    }
}

pub fn is_valid_build_type(name: &str) -> bool {
    BUILD_TYPES.contains(&name)
}

#[derive(Default)]
pub struct CMakeGenerator;

impl CMakeGenerator {
    pub fn new() -> Self {
        Self
    }

    fn write_project_files(
        &self,
        project: &Project,
        run: &RunContext<'_>,
        description: &BuildDescription,
    ) -> Result<(), GenerateError> {
        let output_directory = &run.output_directory;
        let source_base = output_directory.join(SOURCE_DIRECTORY);

        // Relative source paths plus their IDE grouping by directory.
        let mut source_paths = Vec::new();
        let mut header_paths = Vec::new();
        let mut third_party_source_paths = Vec::new();
        let mut third_party_header_paths = Vec::new();
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();

        collect_relative_paths(project, &source_base, &description.source_files, &mut source_paths, &mut groups);
        collect_relative_paths(project, &source_base, &description.header_files, &mut header_paths, &mut groups);
        collect_relative_paths(
            project,
            &source_base,
            &description.third_party_source_files,
            &mut third_party_source_paths,
            &mut groups,
        );
        collect_relative_paths(
            project,
            &source_base,
            &description.third_party_header_files,
            &mut third_party_header_paths,
            &mut groups,
        );

        // Root CMakeLists.txt.

        let mut project_files = Vec::new();
        project_files.push(project.project_directory().join(PROJECT_FILE_NAME));
        project_files.extend(description.project_files.iter().cloned());
        let project_file_list = project_files
            .iter()
            .map(|file| format!("\"{}\"", cmake_escape_path(&file.to_string_lossy())))
            .collect::<Vec<_>>()
            .join("\n    ");

        let mut builder = FileBuilder::new(output_directory, "CMakeLists.txt");
        write_auto_generated_header(&mut builder);
        let mut variables = HashMap::new();
        variables.insert(
            "target_name".to_string(),
            cmake_escape(&description.target_name),
        );
        variables.insert("generator_name".to_string(), NAME.to_string());
        variables.insert("project_files".to_string(), project_file_list);
        ROOT_TEMPLATE.emit(&mut builder, &variables)?;
        builder.commit(project.database())?;

        // src/CMakeLists.txt.

        let mut defines = String::new();
        if !description.defines.is_empty() {
            defines.push_str("add_definitions(\n");
            for (name, value) in &description.defines {
                defines.push_str(&format!(
                    "    \"-D{}={}\"\n",
                    cmake_escape(name),
                    cmake_escape(value)
                ));
            }
            defines.push_str(")\n");
        }

        let mut include_directories = String::new();
        if !description.header_paths.is_empty() {
            include_directories.push_str("include_directories(\n");
            for directory in &description.header_paths {
                include_directories.push_str(&format!(
                    "    \"{}\"\n",
                    relative_for_cmake(&source_base, directory)
                ));
            }
            include_directories.push_str(")\n");
        }
        if !description.third_party_header_paths.is_empty() {
            include_directories.push_str("include_directories(SYSTEM\n");
            for directory in &description.third_party_header_paths {
                include_directories.push_str(&format!(
                    "    \"{}\"\n",
                    relative_for_cmake(&source_base, directory)
                ));
            }
            include_directories.push_str(")\n");
        }

        let mut builder = FileBuilder::new(&source_base, "CMakeLists.txt");
        write_auto_generated_header(&mut builder);
        let mut variables = HashMap::new();
        variables.insert(
            "target_name".to_string(),
            cmake_escape(&description.target_name),
        );
        variables.insert("defines".to_string(), defines);
        variables.insert("include_directories".to_string(), include_directories);
        SRC_TEMPLATE.emit(&mut builder, &variables)?;
        builder.commit(project.database())?;

        // src/SourceFiles.cmake.

        let mut builder = FileBuilder::new(&source_base, "SourceFiles.cmake");
        write_auto_generated_header(&mut builder);
        write_source_paths(&mut builder, "source_files", &source_paths);
        write_source_paths(&mut builder, "header_files", &header_paths);
        write_source_paths(&mut builder, "third_party_source_files", &third_party_source_paths);
        write_source_paths(&mut builder, "third_party_header_files", &third_party_header_paths);
        builder.commit(project.database())?;

        // src/SourceGroups.cmake.

        let mut builder = FileBuilder::new(&source_base, "SourceGroups.cmake");
        write_auto_generated_header(&mut builder);
        for (group, files) in &groups {
            if files.is_empty() {
                continue;
            }
            builder.append(&format!("source_group(\"{}\" FILES\n", cmake_escape(group)));
            for file in files {
                builder.append(&format!("    \"{}\"\n", cmake_escape_path(file)));
            }
            builder.append(")\n\n");
        }
        builder.commit(project.database())?;

        Ok(())
    }
}

impl Generator for CMakeGenerator {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn generate(
        &self,
        project: &Project,
        options: &BTreeMap<String, String>,
        output: &mut dyn OutputSink,
        build: bool,
    ) -> Result<(), GenerateError> {
        let build_tool = project
            .database()
            .get_option(OPTION_BUILD_TOOL)?
            .and_then(|title| BuildTool::from_title(&title));
        let build_type = project.database().get_option(OPTION_BUILD_TYPE)?;

        let mut output_directory = project.output_directory().join(ID);
        match build_tool {
            Some(tool) => {
                output_directory.push(tool.directory_name());
                if tool.accepts_build_type() {
                    if let Some(build_type) = &build_type {
                        output_directory.push(build_type);
                    }
                }
            }
            None => output_directory.push("default"),
        }
        fs::create_dir_all(&output_directory)?;

        let run = RunContext {
            project,
            generator_id: self.id(),
            options,
            output_directory: output_directory.clone(),
        };
        let description = BuildDescription::collect(&run, &CONVENTIONS)?;
        self.write_project_files(project, &run, &description)?;

        let Some(tool) = build_tool else {
            // Without a selected build tool there is nothing to invoke; the
            // generated tree under cmake/default is the whole result.
            return Ok(());
        };

        let cmake = find_cmake_executable()
            .ok_or_else(|| GenerateError::Generator("CMake was not found in PATH.".to_string()))?;
        let cmake = cmake.to_string_lossy().into_owned();

        let mut command = vec![cmake.clone(), "-G".to_string(), tool.cmake_generator()];
        if tool.accepts_build_type() {
            if let Some(build_type) = &build_type {
                command.push(format!("-DCMAKE_BUILD_TYPE={build_type}"));
            }
        }
        for define in tool.extra_defines() {
            command.push(format!("-D{define}"));
        }
        command.push(".".to_string());
        invoker::invoke(&output_directory, &command, output)?;

        if build {
            let command = vec![cmake, "--build".to_string(), ".".to_string()];
            invoker::invoke(&output_directory, &command, output)?;
        }

        Ok(())
    }
}

/// Records `file` relative to the generated src/ directory and files it into
/// its IDE source group (the file's directory relative to the project root).
fn collect_relative_paths(
    project: &Project,
    source_base: &Path,
    files: &[PathBuf],
    out_paths: &mut Vec<String>,
    groups: &mut Vec<(String, Vec<String>)>,
) {
    for file in files {
        let relative = paths::relative_to(source_base, file)
            .to_string_lossy()
            .replace('\\', "/");
        out_paths.push(relative.clone());

        let parent = file.parent().unwrap_or(file);
        let mut group = paths::relative_to(project.project_directory(), parent)
            .to_string_lossy()
            .replace('/', "\\");
        while let Some(stripped) = group.strip_prefix("..\\") {
            group = stripped.to_string();
        }

        match groups.iter_mut().find(|(name, _)| *name == group) {
            Some((_, members)) => members.push(relative),
            None => groups.push((group, vec![relative])),
        }
    }
}

fn write_auto_generated_header(builder: &mut FileBuilder) {
    builder.append_char('\n');
    builder.append("# ------------------------------------------------------\n");
    builder.append("# THIS IS AN AUTOMATICALLY GENERATED FILE. DO NOT EDIT!\n");
    builder.append("# ------------------------------------------------------\n");
    builder.append_char('\n');
}

fn write_source_paths(builder: &mut FileBuilder, variable_name: &str, source_paths: &[String]) {
    if source_paths.is_empty() {
        builder.append(&format!("set({variable_name})\n"));
        return;
    }

    builder.append(&format!("set({variable_name}\n"));
    for path in source_paths {
        builder.append(&format!("    \"{}\"\n", cmake_escape_path(path)));
    }
    builder.append(")\n");
}

fn relative_for_cmake(base: &Path, target: &Path) -> String {
    cmake_escape_path(
        &paths::relative_to(base, target)
            .to_string_lossy()
            .replace('\\', "/"),
    )
}

fn find_cmake_executable() -> Option<PathBuf> {
    if let Some(path) = paths::resolve_executable("cmake") {
        return Some(path);
    }

    if cfg!(target_os = "macos") {
        let app_bundle = Path::new("/Applications/CMake.app/Contents/bin/cmake");
        if app_bundle.is_file() {
            return Some(app_bundle.to_path_buf());
        }
    }

    if cfg!(target_os = "windows") {
        for variable in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Some(program_files) = std::env::var_os(variable) {
                let candidate = PathBuf::from(program_files).join("CMake/bin/cmake.exe");
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

pub fn cmake_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Like [`cmake_escape`], but backslashes become forward slashes: CMake
/// treats them as escapes even inside quoted Windows paths.
pub fn cmake_escape_path(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push('/'),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    escaped
}

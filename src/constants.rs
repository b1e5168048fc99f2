// src/constants.rs

/// The name of the project description file looked up in a project directory.
pub const PROJECT_FILE_NAME: &str = "project.yml";

/// The name of the hidden directory that holds generated files and the build
/// cache for a project.
pub const OUTPUT_DIRECTORY_NAME: &str = ".build";

/// The name of the build cache database file (inside .build/).
pub const DATABASE_FILE_NAME: &str = "cache.redb";

/// Database option key remembering the generator used by the last run.
pub const OPTION_GENERATOR: &str = "Generator";

/// Prefix of database option keys remembering the configuration values the
/// user picked interactively ("ProjectOption:<enumeration id>").
pub const PROJECT_OPTION_PREFIX: &str = "ProjectOption:";

/// Target name used when the project file does not provide one.
pub const DEFAULT_TARGET_NAME: &str = "App";

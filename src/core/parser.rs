// src/core/parser.rs

//! The project-file parser: turns option-tree mappings into the directive
//! model, enforcing directive syntax and the enumeration-id scoping rules.
//!
//! Parsing is strictly recursive descent, so the parser's frame stack mirrors
//! the lexical scope chain: import-introduced scopes are transparent for
//! enumeration-id reservation, selector-introduced scopes are opaque
//! boundaries. Any violation aborts the whole parse with a located error; no
//! partial directive tree is ever handed out.

use crate::constants::PROJECT_FILE_NAME;
use crate::core::directive::{
    Directive, EnumerationDirective, GeneratorSelectorDirective, ImportDirective,
    RootProjectSelectorDirective, Scope, SelectorDirective, SourceDirectoriesDirective,
};
use crate::core::option_tree::{self, Location, MarkedMappingNode, Node, OptionTree, TreeError};
use crate::core::paths;
use crate::plugins::{Plugin, PluginRegistry};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

lazy_static! {
    /// `^id(value1,value2,...)` selector keys.
    static ref SELECTOR_RE: Regex =
        Regex::new(r"^\^([a-zA-Z0-9_-]+)\(([a-zA-Z0-9_-]+(?:,[a-zA-Z0-9_-]+)*)\)$").unwrap();
    /// Legal enumeration ids, enumeration values and target names.
    static ref NAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{location}: {message}")]
    Directive { location: Location, message: String },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl ParseError {
    /// A located parse error; the constructor plugins use as well.
    pub fn at(location: Location, message: impl Into<String>) -> Self {
        Self::Directive {
            location,
            message: message.into(),
        }
    }
}

/// The outcome of parsing one project: the root scope, the project-wide
/// import memoization table and the plugins activated by `plugin:` keys.
pub struct ParsedProject {
    pub root: Scope,
    pub imports: HashMap<PathBuf, Arc<ImportDirective>>,
    pub plugins: Vec<Arc<dyn Plugin>>,
}

/// One reservation frame of the lexical scope chain.
struct Frame {
    transparent: bool,
    reserved: HashSet<String>,
}

impl Frame {
    fn opaque() -> Self {
        Self {
            transparent: false,
            reserved: HashSet::new(),
        }
    }

    fn transparent() -> Self {
        Self {
            transparent: true,
            reserved: HashSet::new(),
        }
    }
}

pub struct ProjectFileParser<'a> {
    registry: &'a PluginRegistry,
    /// Plugins activated so far, in activation order, keyed for reuse.
    plugins: Vec<(String, Arc<dyn Plugin>)>,
    /// Project-level import memoization: canonical module directory → the one
    /// parsed import instance.
    imports: HashMap<PathBuf, Arc<ImportDirective>>,
    /// Canonical paths of the files currently being parsed, innermost last.
    /// Guards against import cycles.
    module_stack: Vec<PathBuf>,
    frames: Vec<Frame>,
}

impl<'a> ProjectFileParser<'a> {
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self {
            registry,
            plugins: Vec::new(),
            imports: HashMap::new(),
            module_stack: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Parses a top-level project file into a complete directive tree.
    pub fn parse_project(mut self, project_file: &Path) -> Result<ParsedProject, ParseError> {
        let mut root = Scope::default();
        self.frames.push(Frame::opaque());
        self.parse_file(&mut root, project_file)?;
        self.frames.pop();

        Ok(ParsedProject {
            root,
            imports: self.imports,
            plugins: self.plugins.into_iter().map(|(_, plugin)| plugin).collect(),
        })
    }

    fn parse_file(&mut self, scope: &mut Scope, file: &Path) -> Result<(), ParseError> {
        let module_key = paths::canonicalize(file);
        if self.module_stack.contains(&module_key) {
            warn!("circular import of \"{}\" ignored", module_key.display());
            return Ok(());
        }

        self.module_stack.push(module_key);
        let result = self.parse_file_contents(scope, file);
        self.module_stack.pop();
        result
    }

    fn parse_file_contents(&mut self, scope: &mut Scope, file: &Path) -> Result<(), ParseError> {
        let Some(tree) = OptionTree::load(file)? else {
            return Ok(());
        };

        let base = paths::canonicalize(file.parent().unwrap_or_else(|| Path::new(".")));
        let mapping = tree.root().as_mapping().ok_or_else(|| {
            ParseError::at(
                tree.location(tree.root()),
                "Expected mapping at the root level.",
            )
        })?;

        self.process_mapping(&base, scope, mapping, &tree)
    }

    fn process_mapping(
        &mut self,
        base: &Path,
        scope: &mut Scope,
        mapping: &MarkedMappingNode,
        tree: &OptionTree,
    ) -> Result<(), ParseError> {
        for (key_node, value) in mapping.iter() {
            let key = key_node.as_str();

            let directive = if key.starts_with('^') {
                Some(self.process_selector(base, key, key_node, value, tree)?)
            } else {
                match key {
                    "+generator" => Some(self.process_generator_selector(base, value, tree)?),
                    "+if(root_project)" => {
                        Some(self.process_root_project_selector(base, value, tree)?)
                    }
                    "enum" => Some(self.process_enum(key_node, value, tree)?),
                    "import" => {
                        self.process_import(base, scope, value, tree)?;
                        None
                    }
                    "define" => Some(self.process_define(value, tree)?),
                    "source_directories" => Some(Directive::SourceDirectories(
                        SourceDirectoriesDirective::new(self.process_directories(base, value, tree)?),
                    )),
                    "3rdparty_source_directories" => Some(Directive::ThirdPartySourceDirectories(
                        SourceDirectoriesDirective::new(self.process_directories(base, value, tree)?),
                    )),
                    "header_search_paths" => Some(Directive::HeaderPaths(
                        self.process_directories(base, value, tree)?,
                    )),
                    "3rdparty_header_search_paths" => Some(Directive::ThirdPartyHeaderPaths(
                        self.process_directories(base, value, tree)?,
                    )),
                    "target_name" => Some(self.process_target_name(value, tree)?),
                    "plugin" => {
                        self.process_plugin(value, tree)?;
                        None
                    }
                    _ => Some(self.process_unknown(base, key, key_node, value, tree)?),
                }
            };

            if let Some(directive) = directive {
                scope.push(directive);
            }
        }

        Ok(())
    }

    /// Offers an unrecognized key to every activated plugin in activation
    /// order; the first one to claim it wins.
    fn process_unknown(
        &mut self,
        base: &Path,
        key: &str,
        key_node: &option_tree::MarkedScalarNode,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Directive, ParseError> {
        let plugins: Vec<Arc<dyn Plugin>> = self
            .plugins
            .iter()
            .map(|(_, plugin)| Arc::clone(plugin))
            .collect();
        for plugin in plugins {
            if let Some(custom) = plugin.process_directive(base, key, key_node, value, tree)? {
                return Ok(Directive::Custom(custom));
            }
        }

        Err(ParseError::at(
            tree.location_of_scalar(key_node),
            format!("Unknown option \"{key}\"."),
        ))
    }

    fn process_selector(
        &mut self,
        base: &Path,
        key: &str,
        key_node: &option_tree::MarkedScalarNode,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Directive, ParseError> {
        let captures = SELECTOR_RE.captures(key).ok_or_else(|| {
            ParseError::at(tree.location_of_scalar(key_node), "Invalid selector.")
        })?;

        let enumeration_id = captures[1].to_string();
        let matching_values: HashSet<String> =
            captures[2].split(',').map(str::to_string).collect();

        let scope = self.parse_nested_scope(false, base, value, tree)?;

        Ok(Directive::Selector(SelectorDirective {
            enumeration_id,
            matching_values,
            scope,
        }))
    }

    fn process_generator_selector(
        &mut self,
        base: &Path,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Directive, ParseError> {
        let mapping = value.as_mapping().ok_or_else(|| {
            ParseError::at(tree.location(value), "Expected mapping.")
        })?;

        let mut branches: Vec<(String, Scope)> = Vec::new();
        for (key_node, branch_value) in mapping.iter() {
            let key = key_node.as_str();
            let name = key.strip_prefix('+').ok_or_else(|| {
                ParseError::at(
                    tree.location_of_scalar(key_node),
                    "Keys in a generator selector should begin with '+'.",
                )
            })?;

            if branches.iter().any(|(id, _)| id == name) {
                return Err(ParseError::at(
                    tree.location_of_scalar(key_node),
                    format!("Duplicate key \"{name}\"."),
                ));
            }

            let scope = self.parse_nested_scope(false, base, branch_value, tree)?;
            branches.push((name.to_string(), scope));
        }

        Ok(Directive::GeneratorSelector(GeneratorSelectorDirective {
            branches,
        }))
    }

    fn process_root_project_selector(
        &mut self,
        base: &Path,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Directive, ParseError> {
        let scope = self.parse_nested_scope(false, base, value, tree)?;

        // Fixed at parse time: the file currently being parsed is the
        // top-level project file iff nothing imported it.
        Ok(Directive::RootProjectSelector(RootProjectSelectorDirective {
            scope,
            root_project: self.module_stack.len() == 1,
        }))
    }

    fn process_enum(
        &mut self,
        key_node: &option_tree::MarkedScalarNode,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Directive, ParseError> {
        let mapping = value.as_mapping().ok_or_else(|| {
            ParseError::at(tree.location(value), "Expected mapping.")
        })?;

        let mut id = None;
        let mut title = None;
        let mut default_value: Option<(String, Location)> = None;
        let mut values: Vec<(String, String)> = Vec::new();

        for (sub_key_node, sub_value) in mapping.iter() {
            match sub_key_node.as_str() {
                "id" => {
                    let value = self.expect_scalar(sub_value, tree)?;
                    if !NAME_RE.is_match(value) {
                        return Err(ParseError::at(
                            tree.location(sub_value),
                            format!("Invalid enumeration id \"{value}\"."),
                        ));
                    }
                    // Reserved eagerly so sibling and later directives in the
                    // same file can reference it, and so a duplicate is caught
                    // right here with a precise location.
                    if !self.reserve_enumeration_id(value) {
                        return Err(ParseError::at(
                            tree.location(sub_value),
                            format!("Duplicate enumeration id \"{value}\"."),
                        ));
                    }
                    id = Some(value.to_string());
                }
                "title" => {
                    let value = self.expect_scalar(sub_value, tree)?;
                    if value.is_empty() {
                        return Err(ParseError::at(
                            tree.location(sub_value),
                            "Title should not be empty.",
                        ));
                    }
                    title = Some(value.to_string());
                }
                "default" => {
                    let value = self.expect_scalar(sub_value, tree)?;
                    default_value = Some((value.to_string(), tree.location(sub_value)));
                }
                "values" => {
                    self.process_enum_values(&mut values, sub_value, tree)?;
                }
                other => {
                    return Err(ParseError::at(
                        tree.location_of_scalar(sub_key_node),
                        format!("Unknown option \"{other}\"."),
                    ));
                }
            }
        }

        let key_location = tree.location_of_scalar(key_node);
        let id = id.ok_or_else(|| ParseError::at(key_location.clone(), "Missing enumeration id."))?;
        let title =
            title.ok_or_else(|| ParseError::at(key_location.clone(), "Missing enumeration title."))?;
        if values.is_empty() {
            return Err(ParseError::at(key_location, "Missing enumeration values."));
        }

        let default_value = match default_value {
            Some((value, location)) => {
                if !values.iter().any(|(name, _)| *name == value) {
                    return Err(ParseError::at(
                        location,
                        format!("Invalid default value \"{value}\"."),
                    ));
                }
                Some(value)
            }
            None => None,
        };

        Ok(Directive::Enumeration(EnumerationDirective {
            id,
            title,
            default_value,
            values,
        }))
    }

    fn process_enum_values(
        &self,
        values: &mut Vec<(String, String)>,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<(), ParseError> {
        let mapping = value.as_mapping().ok_or_else(|| {
            ParseError::at(tree.location(value), "Expected mapping.")
        })?;

        for (name_node, description_node) in mapping.iter() {
            let name = name_node.as_str();
            let description = self.expect_scalar(description_node, tree)?;

            if !NAME_RE.is_match(name) {
                return Err(ParseError::at(
                    tree.location_of_scalar(name_node),
                    format!("Invalid enumeration value \"{name}\"."),
                ));
            }
            if values.iter().any(|(existing, _)| existing == name) {
                return Err(ParseError::at(
                    tree.location_of_scalar(name_node),
                    format!("Duplicate enumeration value \"{name}\"."),
                ));
            }

            values.push((name.to_string(), description.to_string()));
        }

        Ok(())
    }

    fn process_import(
        &mut self,
        base: &Path,
        scope: &mut Scope,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<(), ParseError> {
        for (name, node) in self.scalar_list(value, tree)? {
            let module_directory = base.join(name);
            let module_file = module_directory.join(PROJECT_FILE_NAME);
            if !module_file.exists() {
                return Err(ParseError::at(
                    tree.location(node),
                    format!(
                        "File \"{}\" does not exist.",
                        paths::canonicalize(&module_file).display()
                    ),
                ));
            }

            let module_path = paths::canonicalize(&module_directory);
            if let Some(existing) = self.imports.get(&module_path) {
                // Already imported somewhere in this project: reuse the
                // parsed instance verbatim, no re-parse.
                scope.push(Directive::Import(Arc::clone(existing)));
                continue;
            }

            let mut inner = Scope::default();
            self.frames.push(Frame::transparent());
            let parsed = self.parse_file(&mut inner, &module_file);
            self.frames.pop();
            parsed?;

            let import = Arc::new(ImportDirective {
                module_path: module_path.clone(),
                project_file: paths::canonicalize(&module_file),
                scope: inner,
            });
            self.imports.insert(module_path, Arc::clone(&import));
            scope.push(Directive::Import(import));
        }

        Ok(())
    }

    fn process_define(&self, value: &Node, tree: &OptionTree) -> Result<Directive, ParseError> {
        let defines = self
            .scalar_list(value, tree)?
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect();
        Ok(Directive::Define(defines))
    }

    fn process_directories(
        &self,
        base: &Path,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Vec<PathBuf>, ParseError> {
        let mut directories = Vec::new();
        for (name, node) in self.scalar_list(value, tree)? {
            let directory = base.join(name);
            if !directory.exists() {
                return Err(ParseError::at(
                    tree.location(node),
                    format!(
                        "Directory \"{}\" does not exist.",
                        paths::canonicalize(&directory).display()
                    ),
                ));
            }
            if !directory.is_dir() {
                return Err(ParseError::at(
                    tree.location(node),
                    format!(
                        "\"{}\" is not a directory.",
                        paths::canonicalize(&directory).display()
                    ),
                ));
            }
            directories.push(paths::canonicalize(&directory));
        }
        Ok(directories)
    }

    fn process_target_name(&self, value: &Node, tree: &OptionTree) -> Result<Directive, ParseError> {
        let name = self.expect_scalar(value, tree)?;
        if !NAME_RE.is_match(name) {
            return Err(ParseError::at(tree.location(value), "Invalid target name."));
        }
        Ok(Directive::TargetName(name.to_string()))
    }

    fn process_plugin(&mut self, value: &Node, tree: &OptionTree) -> Result<(), ParseError> {
        let id = self.expect_scalar(value, tree)?;
        if self.plugins.iter().any(|(existing, _)| existing == id) {
            return Ok(());
        }

        let plugin = self.registry.create(id).ok_or_else(|| {
            ParseError::at(tree.location(value), format!("Unknown plugin \"{id}\"."))
        })?;
        self.plugins.push((id.to_string(), plugin));
        Ok(())
    }

    fn parse_nested_scope(
        &mut self,
        transparent: bool,
        base: &Path,
        value: &Node,
        tree: &OptionTree,
    ) -> Result<Scope, ParseError> {
        let mapping = value.as_mapping().ok_or_else(|| {
            ParseError::at(tree.location(value), "Expected mapping.")
        })?;

        self.frames.push(if transparent {
            Frame::transparent()
        } else {
            Frame::opaque()
        });
        let mut scope = Scope::default();
        let result = self.process_mapping(base, &mut scope, mapping, tree);
        self.frames.pop();
        result?;

        Ok(scope)
    }

    /// False if the id is already reserved anywhere along the lexical scope
    /// chain. Otherwise reserves it in the innermost scope and bubbles the
    /// reservation outward through transparent (import) frames, stopping at
    /// the first opaque (selector) boundary.
    fn reserve_enumeration_id(&mut self, id: &str) -> bool {
        if self.frames.iter().any(|frame| frame.reserved.contains(id)) {
            return false;
        }

        for frame in self.frames.iter_mut().rev() {
            frame.reserved.insert(id.to_string());
            if !frame.transparent {
                break;
            }
        }

        true
    }

    fn scalar_list<'n>(
        &self,
        value: &'n Node,
        tree: &OptionTree,
    ) -> Result<Vec<(&'n str, &'n Node)>, ParseError> {
        if let Some(sequence) = value.as_sequence() {
            let mut items = Vec::with_capacity(sequence.len());
            for item in sequence.iter() {
                let text = option_tree::scalar(item).ok_or_else(|| {
                    ParseError::at(tree.location(item), "Expected string.")
                })?;
                items.push((text, item));
            }
            Ok(items)
        } else if let Some(text) = option_tree::scalar(value) {
            Ok(vec![(text, value)])
        } else {
            Err(ParseError::at(
                tree.location(value),
                "Expected string or sequence of strings.",
            ))
        }
    }

    fn expect_scalar<'n>(&self, value: &'n Node, tree: &OptionTree) -> Result<&'n str, ParseError> {
        option_tree::scalar(value)
            .ok_or_else(|| ParseError::at(tree.location(value), "Expected string."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_project(directory: &Path, text: &str) {
        fs::create_dir_all(directory).unwrap();
        fs::write(directory.join(PROJECT_FILE_NAME), text).unwrap();
    }

    fn parse(directory: &Path) -> Result<ParsedProject, ParseError> {
        let registry = PluginRegistry::builtin();
        ProjectFileParser::new(&registry).parse_project(&directory.join(PROJECT_FILE_NAME))
    }

    fn error_message(result: Result<ParsedProject, ParseError>) -> String {
        result.err().expect("expected a parse error").to_string()
    }

    #[test]
    fn parses_basic_directives() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        write_project(
            dir.path(),
            "target_name: demo\n\
             define:\n  - ENABLE_LOGGING\n  - VERSION=2\n\
             source_directories: src\n\
             header_search_paths: src\n",
        );

        let parsed = parse(dir.path()).unwrap();
        let directives = parsed.root.directives();
        assert_eq!(directives.len(), 4);
        assert!(matches!(&directives[0], Directive::TargetName(name) if name == "demo"));
        assert!(
            matches!(&directives[1], Directive::Define(defines) if defines == &["ENABLE_LOGGING", "VERSION=2"])
        );
        assert!(matches!(&directives[2], Directive::SourceDirectories(_)));
        assert!(matches!(&directives[3], Directive::HeaderPaths(_)));
    }

    #[test]
    fn rejects_unknown_keys_with_location() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "target_name: demo\nbogus: 1\n");

        let message = error_message(parse(dir.path()));
        assert!(message.contains("Unknown option \"bogus\"."));
        assert!(message.contains("project.yml:2"));
    }

    #[test]
    fn rejects_duplicate_enumeration_id_in_one_file() {
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "enum:\n  id: platform\n  title: Platform\n  values:\n    linux: Linux\n\
             ^platform(linux):\n\
             \x20 enum:\n\
             \x20   id: platform\n\
             \x20   title: Again\n\
             \x20   values:\n\
             \x20     a: A\n",
        );

        let message = error_message(parse(dir.path()));
        assert!(message.contains("Duplicate enumeration id \"platform\"."));
    }

    #[test]
    fn rejects_duplicate_enumeration_id_across_transparent_import() {
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "enum:\n  id: platform\n  title: Platform\n  values:\n    linux: Linux\n\
             import: module\n",
        );
        write_project(
            &dir.path().join("module"),
            "enum:\n  id: platform\n  title: Clash\n  values:\n    a: A\n",
        );

        let message = error_message(parse(dir.path()));
        assert!(message.contains("Duplicate enumeration id \"platform\"."));
    }

    #[test]
    fn allows_same_enumeration_id_in_sibling_selector_branches() {
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "^platform(windows):\n\
             \x20 enum:\n\
             \x20   id: toolkit\n\
             \x20   title: Toolkit\n\
             \x20   values:\n\
             \x20     win32: Win32\n\
             ^platform(linux):\n\
             \x20 enum:\n\
             \x20   id: toolkit\n\
             \x20   title: Toolkit\n\
             \x20   values:\n\
             \x20     x11: X11\n",
        );

        assert!(parse(dir.path()).is_ok());
    }

    #[test]
    fn selector_boundary_does_not_leak_reservations_outward() {
        // An id declared inside a selector branch stays local to that branch;
        // a later declaration outside it is legal.
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "^platform(windows):\n\
             \x20 enum:\n\
             \x20   id: toolkit\n\
             \x20   title: Toolkit\n\
             \x20   values:\n\
             \x20     win32: Win32\n\
             enum:\n  id: toolkit\n  title: Toolkit\n  values:\n    any: Any\n",
        );

        assert!(parse(dir.path()).is_ok());
    }

    #[test]
    fn rejects_invalid_selector_syntax() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "\"^platform()\":\n  define: X\n");

        let message = error_message(parse(dir.path()));
        assert!(message.contains("Invalid selector."));
    }

    #[test]
    fn rejects_invalid_enum_default() {
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "enum:\n  id: platform\n  title: Platform\n  default: macos\n  values:\n    linux: Linux\n",
        );

        let message = error_message(parse(dir.path()));
        assert!(message.contains("Invalid default value \"macos\"."));
    }

    #[test]
    fn imports_are_memoized_per_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "import:\n  - a\n  - b\n");
        write_project(&dir.path().join("a"), "import: ../shared\n");
        write_project(&dir.path().join("b"), "import: ../shared\n");
        write_project(&dir.path().join("shared"), "define: SHARED\n");

        let parsed = parse(dir.path()).unwrap();
        assert_eq!(parsed.imports.len(), 3);

        let import_of = |scope: &Scope| -> Arc<ImportDirective> {
            match &scope.directives()[0] {
                Directive::Import(import) => Arc::clone(import),
                other => panic!("expected an import, got {other:?}"),
            }
        };

        let a = import_of(&parsed.root);
        let shared_via_a = import_of(&a.scope);
        let b = match &parsed.root.directives()[1] {
            Directive::Import(import) => Arc::clone(import),
            other => panic!("expected an import, got {other:?}"),
        };
        let shared_via_b = import_of(&b.scope);

        assert!(Arc::ptr_eq(&shared_via_a, &shared_via_b));
    }

    #[test]
    fn import_cycles_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "import: a\n");
        write_project(&dir.path().join("a"), "define: IN_A\nimport: ../b\n");
        write_project(&dir.path().join("b"), "define: IN_B\nimport: ../a\n");

        let parsed = parse(dir.path()).unwrap();
        let a = match &parsed.root.directives()[0] {
            Directive::Import(import) => Arc::clone(import),
            other => panic!("expected an import, got {other:?}"),
        };
        let b = match &a.scope.directives()[1] {
            Directive::Import(import) => Arc::clone(import),
            other => panic!("expected an import, got {other:?}"),
        };
        // The back-edge import of `a` is present but empty.
        let back = match &b.scope.directives()[1] {
            Directive::Import(import) => Arc::clone(import),
            other => panic!("expected an import, got {other:?}"),
        };
        assert!(back.scope.directives().is_empty());
    }

    #[test]
    fn missing_import_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "import: nowhere\n");

        let message = error_message(parse(dir.path()));
        assert!(message.contains("does not exist."));
    }

    #[test]
    fn root_project_flag_is_fixed_at_parse_time() {
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "+if(root_project):\n  define: IS_ROOT\nimport: module\n",
        );
        write_project(
            &dir.path().join("module"),
            "+if(root_project):\n  define: MODULE_THINKS_IT_IS_ROOT\n",
        );

        let parsed = parse(dir.path()).unwrap();
        let Directive::RootProjectSelector(root_selector) = &parsed.root.directives()[0] else {
            panic!("expected a root-project selector");
        };
        assert!(root_selector.root_project);

        let Directive::Import(import) = &parsed.root.directives()[1] else {
            panic!("expected an import");
        };
        let Directive::RootProjectSelector(module_selector) = &import.scope.directives()[0] else {
            panic!("expected a root-project selector");
        };
        assert!(!module_selector.root_project);
    }

    #[test]
    fn generator_selector_validates_branch_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "+generator:\n  +cmake:\n    define: FOR_CMAKE\n  cmake:\n    define: X\n",
        );

        let message = error_message(parse(dir.path()));
        assert!(message.contains("should begin with '+'"));
    }

    #[test]
    fn unknown_plugin_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "plugin: does_not_exist\n");

        let message = error_message(parse(dir.path()));
        assert!(message.contains("Unknown plugin \"does_not_exist\"."));
    }

    #[test]
    fn directories_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "source_directories: missing\n");

        let message = error_message(parse(dir.path()));
        assert!(message.contains("does not exist."));
    }
}

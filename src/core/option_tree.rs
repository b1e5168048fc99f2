// src/core/option_tree.rs

//! Facade over the YAML front-end.
//!
//! The rest of the crate never imports `marked_yaml` directly: it works with
//! an [`OptionTree`] whose nodes are scalars, sequences or ordered mappings,
//! each carrying a source position usable in error messages. Scalar coercion
//! follows the project-file rules: asking a sequence or a mapping for its
//! scalar value yields `None`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use marked_yaml::Node;
pub use marked_yaml::types::{MarkedMappingNode, MarkedScalarNode, MarkedSequenceNode};

use marked_yaml::types::Span;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("unable to read \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse YAML file \"{path}\": {message}")]
    Yaml { path: PathBuf, message: String },
}

/// Source position of a node inside a project file.
#[derive(Debug, Clone)]
pub struct Location {
    pub file: Arc<PathBuf>,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// One parsed project file: the root node plus the path locations are
/// reported against.
pub struct OptionTree {
    path: Arc<PathBuf>,
    root: Node,
}

impl OptionTree {
    /// Reads and parses a project file. Returns `Ok(None)` for files with no
    /// content, which parse to an empty scope.
    pub fn load(path: &Path) -> Result<Option<Self>, TreeError> {
        let text = fs::read_to_string(path).map_err(|source| TreeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let root = marked_yaml::parse_yaml(0, &text).map_err(|error| TreeError::Yaml {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

        Ok(Some(Self {
            path: Arc::new(path.to_path_buf()),
            root,
        }))
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The source position of a node, for error reporting.
    pub fn location(&self, node: &Node) -> Location {
        self.location_of_span(span_of(node))
    }

    pub fn location_of_scalar(&self, node: &MarkedScalarNode) -> Location {
        self.location_of_span(node.span())
    }

    fn location_of_span(&self, span: &Span) -> Location {
        let (line, column) = span
            .start()
            .map(|marker| (marker.line(), marker.column()))
            .unwrap_or((0, 0));
        Location {
            file: Arc::clone(&self.path),
            line,
            column,
        }
    }
}

/// The scalar value of a node, or `None` for sequences and mappings.
pub fn scalar(node: &Node) -> Option<&str> {
    node.as_scalar().map(MarkedScalarNode::as_str)
}

fn span_of(node: &Node) -> &Span {
    match node {
        Node::Scalar(scalar) => scalar.span(),
        Node::Sequence(sequence) => sequence.span(),
        Node::Mapping(mapping) => mapping.span(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tree_from(text: &str) -> OptionTree {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        OptionTree::load(file.path()).unwrap().unwrap()
    }

    #[test]
    fn mapping_preserves_declaration_order() {
        let tree = tree_from("zebra: 1\napple: 2\nmango: 3\n");
        let mapping = tree.root().as_mapping().unwrap();
        let keys: Vec<&str> = mapping.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn scalar_coercion_rejects_collections() {
        let tree = tree_from("items:\n  - one\n  - two\n");
        let mapping = tree.root().as_mapping().unwrap();
        let (_, value) = mapping.iter().next().unwrap();
        assert!(scalar(value).is_none());
        assert!(value.as_sequence().is_some());
    }

    #[test]
    fn locations_track_lines() {
        let tree = tree_from("first: 1\nsecond: 2\n");
        let mapping = tree.root().as_mapping().unwrap();
        let (key, _) = mapping.iter().nth(1).unwrap();
        let location = tree.location_of_scalar(key);
        assert_eq!(location.line, 2);
    }

    #[test]
    fn empty_file_loads_as_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"  \n").unwrap();
        file.flush().unwrap();
        assert!(OptionTree::load(file.path()).unwrap().is_none());
    }
}

// src/generators/mod.rs

//! Generators turn a resolved build description into concrete input files
//! for one external build tool, and optionally invoke that tool.

pub mod cmake;

use crate::core::project::{GenerateError, Project};
use crate::system::invoker::OutputSink;
use std::collections::BTreeMap;

pub trait Generator: Send + Sync {
    /// Stable identifier, matched by `+generator` selectors and persisted in
    /// the build cache across runs.
    fn id(&self) -> &'static str;

    /// Human-readable name for display.
    fn name(&self) -> &'static str;

    /// Performs one full resolution and emission for this generator. When
    /// `build` is set, also invokes the external build tool.
    fn generate(
        &self,
        project: &Project,
        options: &BTreeMap<String, String>,
        output: &mut dyn OutputSink,
        build: bool,
    ) -> Result<(), GenerateError>;
}

/// Every generator this build ships with, in presentation order.
pub fn all() -> Vec<Box<dyn Generator>> {
    vec![Box::new(cmake::CMakeGenerator::new())]
}

pub fn find(id: &str) -> Option<Box<dyn Generator>> {
    all().into_iter().find(|generator| generator.id() == id)
}

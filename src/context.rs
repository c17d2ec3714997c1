//! Shared per-run execution context.
//!
//! One [`ExecutionContext`] exists per recipe run. Step functions that declare
//! a `recipe_context` parameter receive it by mutable reference and read or
//! write sub-keys of its sections. The context is only ever merged into; there
//! is no way to swap it out wholesale.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

/// One key/value section of the context
pub type Section = IndexMap<String, Value>;

/// Names of the context sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SectionName {
    Variables,
    Files,
    Settings,
    Results,
    Metadata,
}

/// Mutable state shared by every step of a single recipe run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default)]
    variables: Section,
    #[serde(default)]
    files: Section,
    #[serde(default)]
    settings: Section,
    #[serde(default)]
    results: Section,
    #[serde(default)]
    metadata: Section,
}

impl ExecutionContext {
    /// Create an empty context for a new run
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: SectionName) -> &Section {
        match name {
            SectionName::Variables => &self.variables,
            SectionName::Files => &self.files,
            SectionName::Settings => &self.settings,
            SectionName::Results => &self.results,
            SectionName::Metadata => &self.metadata,
        }
    }

    pub fn section_mut(&mut self, name: SectionName) -> &mut Section {
        match name {
            SectionName::Variables => &mut self.variables,
            SectionName::Files => &mut self.files,
            SectionName::Settings => &mut self.settings,
            SectionName::Results => &mut self.results,
            SectionName::Metadata => &mut self.metadata,
        }
    }

    /// Look up a single value
    pub fn get(&self, section: SectionName, key: &str) -> Option<&Value> {
        self.section(section).get(key)
    }

    /// Write a single value, returning the previous one
    pub fn set(
        &mut self,
        section: SectionName,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.section_mut(section).insert(key.into(), value.into())
    }

    /// Merge another context into this one, key by key.
    ///
    /// Keys present in `other` overwrite; keys only present here survive.
    pub fn merge(&mut self, other: ExecutionContext) {
        let ExecutionContext {
            variables,
            files,
            settings,
            results,
            metadata,
        } = other;
        self.variables.extend(variables);
        self.files.extend(files);
        self.settings.extend(settings);
        self.results.extend(results);
        self.metadata.extend(metadata);
    }

    /// Total number of stored keys across all sections
    pub fn len(&self) -> usize {
        self.variables.len()
            + self.files.len()
            + self.settings.len()
            + self.results.len()
            + self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

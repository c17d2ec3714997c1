//! Canonical in-memory recipe representation.
//!
//! Every on-disk schema is normalized into a [`RecipeDocument`] before it
//! reaches the executor. The executor only reads it; step order is exactly the
//! declared order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder used when a recipe declares no title
pub const DEFAULT_TITLE: &str = "Untitled Recipe";

/// Placeholder used when a recipe declares no description
pub const DEFAULT_DESCRIPTION: &str = "No description available.";

/// Prefix marking step fields as internal metadata (never bound or verified)
pub const INTERNAL_FIELD_PREFIX: char = '_';

/// Optional presentation hints carried through to the display layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_end: Option<String>,
}

impl DisplayHints {
    /// Returns true if no hint is set
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.color_end.is_none()
    }
}

/// A normalized recipe, ready for verification and execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDocument {
    /// Schema version the document was normalized from
    pub version: String,

    pub title: String,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_hints: Option<DisplayHints>,

    /// Executable steps in declared order (may be empty)
    pub steps: Vec<Step>,
}

impl RecipeDocument {
    /// Number of executable steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// One unit of a recipe: a statement plus an optional bound function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Synthesized presentation name ("Step 3")
    pub display_name: String,

    /// Text shown to the user
    pub statement: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    /// Parameters requested from the user, in declared order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub prompt_for: IndexMap<String, String>,

    /// Every other field of the step object, in declared order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra_params: IndexMap<String, Value>,
}

impl Step {
    /// Create a statement-only step
    pub fn statement(display_name: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            statement: statement.into(),
            function_name: None,
            prompt_for: IndexMap::new(),
            extra_params: IndexMap::new(),
        }
    }

    /// Bind a function to this step
    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Add a prompted parameter
    pub fn with_prompt(mut self, param: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompt_for.insert(param.into(), text.into());
        self
    }

    /// Add a literal parameter
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra_params.insert(name.into(), value);
        self
    }

    /// The bound function name, if the step calls one.
    ///
    /// An empty name counts as no function.
    pub fn callable(&self) -> Option<&str> {
        self.function_name.as_deref().filter(|name| !name.is_empty())
    }

    /// Returns true if the step is a pure statement
    pub fn is_noop(&self) -> bool {
        self.callable().is_none()
    }

    /// Literal values eligible for parameter binding, in binding order.
    ///
    /// `statement` comes first, then `extra_params` minus internal fields.
    pub fn literal_params(&self) -> impl Iterator<Item = (&str, Value)> + '_ {
        std::iter::once(("statement", Value::String(self.statement.clone()))).chain(
            self.extra_params
                .iter()
                .filter(|(name, _)| !is_internal_field(name))
                .map(|(name, value)| (name.as_str(), value.clone())),
        )
    }
}

/// Returns true for `_`-prefixed step fields
pub fn is_internal_field(name: &str) -> bool {
    name.starts_with(INTERNAL_FIELD_PREFIX)
}

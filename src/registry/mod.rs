//! Function registry
//!
//! A recipe's step functions live in a *module* tied to the recipe file: the
//! module shares the recipe's directory and file stem. Registries resolve a
//! [`ModuleId`] into a [`RecipeModule`] exposing each function's declared
//! parameter names and a callable body.
//!
//! # Implementations
//!
//! - [`BuiltinRegistry`]: Rust functions registered by the host program
//! - [`ScriptRegistry`]: bash snippets from a sibling `<stem>.module.json`
//! - [`CompositeRegistry`]: asks several registries in order
//!
//! Modules are built fresh on every lookup, so editing a script module takes
//! effect on the next run without touching any execution state.

pub mod script;

pub use script::{MODULE_FILE_SUFFIX, ScriptRegistry};

use crate::error::Result;
use crate::fault::{FunctionFault, catch_fault};
use crate::invoke::CallArgs;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Identity of the module belonging to a recipe file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    /// Directory holding the recipe
    pub dir: PathBuf,
    /// Recipe file name without extension
    pub stem: String,
}

impl ModuleId {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// Derive the module identity from a recipe path
    pub fn for_recipe(recipe_path: &Path) -> Option<Self> {
        let stem = recipe_path.file_stem()?.to_str()?;
        let dir = match recipe_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some(Self::new(dir, stem))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir.join(&self.stem).display())
    }
}

/// Callable body of a step function
pub type FunctionBody =
    Arc<dyn Fn(&mut CallArgs<'_>) -> std::result::Result<Value, FunctionFault> + Send + Sync>;

/// A named function with its declared parameter list
#[derive(Clone)]
pub struct RecipeFunction {
    name: String,
    params: Vec<String>,
    body: FunctionBody,
}

impl RecipeFunction {
    pub fn new<F>(name: impl Into<String>, params: &[&str], body: F) -> Self
    where
        F: Fn(&mut CallArgs<'_>) -> std::result::Result<Value, FunctionFault>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: Arc::new(body),
        }
    }

    pub fn from_parts(name: impl Into<String>, params: Vec<String>, body: FunctionBody) -> Self {
        Self {
            name: name.into(),
            params,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter names, in declaration order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn declares(&self, param: &str) -> bool {
        self.params.iter().any(|p| p == param)
    }

    /// Invoke the body; panics are caught and reported as faults
    pub fn call(&self, args: &mut CallArgs<'_>) -> std::result::Result<Value, FunctionFault> {
        catch_fault(&self.name, || (self.body)(args))
    }
}

impl fmt::Debug for RecipeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// The set of functions available to one recipe
#[derive(Debug, Clone, Default)]
pub struct RecipeModule {
    name: String,
    source: Option<PathBuf>,
    functions: IndexMap<String, RecipeFunction>,
}

impl RecipeModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            functions: IndexMap::new(),
        }
    }

    /// Record the file the module was loaded from
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_function(mut self, function: RecipeFunction) -> Self {
        self.insert(function);
        self
    }

    /// Add or replace a function
    pub fn insert(&mut self, function: RecipeFunction) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Look up a function by exact name
    pub fn function(&self, name: &str) -> Option<&RecipeFunction> {
        self.functions.get(name)
    }

    /// `(name, declared params)` for every function, in registration order
    pub fn signatures(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.functions
            .values()
            .map(|f| (f.name.as_str(), f.params.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Resolves recipe modules
pub trait FunctionRegistry {
    /// Load the module for `id`; `Ok(None)` when this registry has none
    fn load(&self, id: &ModuleId) -> Result<Option<RecipeModule>>;

    /// Load the module belonging to a recipe file
    fn module_for(&self, recipe_path: &Path) -> Result<Option<RecipeModule>> {
        match ModuleId::for_recipe(recipe_path) {
            Some(id) => self.load(&id),
            None => Ok(None),
        }
    }
}

/// Builds a fresh module on each lookup
pub type ModuleBuilder = Arc<dyn Fn() -> RecipeModule + Send + Sync>;

/// Modules compiled into the host, keyed by recipe stem
#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    builders: IndexMap<String, ModuleBuilder>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module builder for recipes named `<stem>.json`
    pub fn register<F>(&mut self, stem: impl Into<String>, builder: F)
    where
        F: Fn() -> RecipeModule + Send + Sync + 'static,
    {
        self.builders.insert(stem.into(), Arc::new(builder));
    }

    pub fn with_module<F>(mut self, stem: impl Into<String>, builder: F) -> Self
    where
        F: Fn() -> RecipeModule + Send + Sync + 'static,
    {
        self.register(stem, builder);
        self
    }
}

impl FunctionRegistry for BuiltinRegistry {
    fn load(&self, id: &ModuleId) -> Result<Option<RecipeModule>> {
        Ok(self.builders.get(&id.stem).map(|build| {
            debug!(module = %id, "using builtin module");
            build()
        }))
    }
}

/// Tries each registry in order; the first that knows the module wins
#[derive(Default)]
pub struct CompositeRegistry {
    registries: Vec<Box<dyn FunctionRegistry>>,
}

impl CompositeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, registry: impl FunctionRegistry + 'static) {
        self.registries.push(Box::new(registry));
    }

    pub fn with(mut self, registry: impl FunctionRegistry + 'static) -> Self {
        self.push(registry);
        self
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

impl FunctionRegistry for CompositeRegistry {
    fn load(&self, id: &ModuleId) -> Result<Option<RecipeModule>> {
        for registry in &self.registries {
            if let Some(module) = registry.load(id)? {
                return Ok(Some(module));
            }
        }
        Ok(None)
    }
}

/// A registry that never has a module
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegistry;

impl FunctionRegistry for EmptyRegistry {
    fn load(&self, _id: &ModuleId) -> Result<Option<RecipeModule>> {
        Ok(None)
    }
}

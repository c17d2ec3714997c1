//! Recipe loading pipeline.
//!
//! file bytes → version detection → optional upgrade (backup + persist) →
//! normalization. [`load_entry`] additionally resolves the recipe's module
//! and verifies the recipe against it, collecting every problem instead of
//! failing.

use crate::error::{AshError, Result};
use crate::normalize::normalize;
use crate::recipe::{DisplayHints, RecipeDocument};
use crate::registry::{FunctionRegistry, RecipeModule};
use crate::verify::verify_recipe;
use crate::version::{
    CURRENT_RECIPE_VERSION, SchemaVersion, VersionRecord, detect_version, is_supported_version,
    persist_upgrade, upgrade,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a recipe file is processed on load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Upgrade older schemas and write the result back to disk
    pub auto_upgrade: bool,
    /// Copy the original to `<path>.backup` before overwriting it
    pub create_backup: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            auto_upgrade: true,
            create_backup: true,
        }
    }
}

/// A recipe that made it through the pipeline
#[derive(Debug, Clone)]
pub struct LoadedRecipe {
    pub path: PathBuf,
    pub document: RecipeDocument,
    pub version: VersionRecord,
    /// Backup written during this load, if any
    pub backup: Option<PathBuf>,
    /// Non-fatal problems (e.g. the upgraded file could not be saved)
    pub warnings: Vec<String>,
}

/// Read and parse a recipe file without interpreting it
pub fn read_raw(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| AshError::load(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| AshError::load(path, e.to_string()))
}

/// Load a recipe file into its canonical form
pub fn load_recipe(path: &Path, options: LoadOptions) -> Result<LoadedRecipe> {
    let raw = read_raw(path)?;
    let detected = detect_version(&raw)?;
    debug!(path = %path.display(), version = %detected, "detected recipe version");

    let current: SchemaVersion = CURRENT_RECIPE_VERSION.parse()?;
    if detected.parse::<SchemaVersion>()? > current || !is_supported_version(&detected) {
        return Err(AshError::UnsupportedVersion {
            found: detected,
            supported: CURRENT_RECIPE_VERSION.to_string(),
        });
    }

    let mut warnings = Vec::new();
    let mut backup = None;
    let (raw, was_upgraded) = if options.auto_upgrade {
        upgrade(raw, &detected, CURRENT_RECIPE_VERSION)?
    } else {
        (raw, false)
    };

    if was_upgraded {
        info!(path = %path.display(), from = %detected, to = CURRENT_RECIPE_VERSION, "upgraded recipe");
        match persist_upgrade(path, &raw, options.create_backup) {
            Ok(written) => backup = written,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not save upgraded recipe");
                warnings.push(format!("Upgraded recipe could not be saved: {err}"));
            }
        }
    }

    let document = normalize(&raw)?;
    let version = VersionRecord {
        detected,
        target: CURRENT_RECIPE_VERSION.to_string(),
        was_upgraded,
    };

    Ok(LoadedRecipe {
        path: path.to_path_buf(),
        document,
        version,
        backup,
        warnings,
    })
}

/// Menu-facing summary of one recipe file
#[derive(Debug, Clone)]
pub struct RecipeEntry {
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub display_hints: Option<DisplayHints>,
    /// Rendered version state: `v1.1`, `v1.0 → v1.1`, or `error`
    pub version_info: String,
    pub was_upgraded: bool,
    /// Load failure or verification findings; empty when the recipe is runnable
    pub load_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub document: Option<RecipeDocument>,
    pub module: Option<RecipeModule>,
}

impl RecipeEntry {
    /// Returns true if the recipe loaded and verified cleanly
    pub fn is_runnable(&self) -> bool {
        self.document.is_some() && self.load_errors.is_empty()
    }

    fn failed(path: &Path, error: &AshError) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path: path.to_path_buf(),
            title: format!("{file_name} - Error loading"),
            description: error.to_string(),
            display_hints: None,
            version_info: "error".to_string(),
            was_upgraded: false,
            load_errors: vec![error.to_string()],
            warnings: Vec::new(),
            document: None,
            module: None,
        }
    }
}

/// Load, resolve and verify one recipe file. Never fails; problems land in
/// [`RecipeEntry::load_errors`].
pub fn load_entry(
    path: &Path,
    registry: &dyn FunctionRegistry,
    options: LoadOptions,
) -> RecipeEntry {
    let loaded = match load_recipe(path, options) {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "recipe failed to load");
            return RecipeEntry::failed(path, &err);
        }
    };

    let mut load_errors = Vec::new();
    let module = match registry.module_for(path) {
        Ok(module) => module,
        Err(err) => {
            load_errors.push(err.to_string());
            None
        }
    };

    load_errors.extend(
        verify_recipe(&loaded.document, module.as_ref())
            .iter()
            .map(ToString::to_string),
    );
    if !load_errors.is_empty() {
        debug!(path = %path.display(), issues = load_errors.len(), "recipe has configuration issues");
    }

    RecipeEntry {
        path: loaded.path,
        title: loaded.document.title.clone(),
        description: loaded.document.description.clone(),
        display_hints: loaded.document.display_hints.clone(),
        version_info: loaded.version.to_string(),
        was_upgraded: loaded.version.was_upgraded,
        load_errors,
        warnings: loaded.warnings,
        document: Some(loaded.document),
        module,
    }
}

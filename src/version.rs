//! Recipe schema versioning
//!
//! Detects the schema version of a raw recipe, migrates older schemas to the
//! current one through a chain of pairwise migrations, and persists upgraded
//! recipes with an on-disk backup.
//!
//! # Schema History
//!
//! ```text
//! 1.0  [ {title, description, color?}, {statement, ...}, ... ]
//!       ↓ legacy_to_flat
//! 1.1  { version: "1.1", title, description, step1: {...}, step2: {...} }
//! ```
//!
//! Versions newer than [`CURRENT_RECIPE_VERSION`] are rejected outright;
//! there is no forward-compatible partial parsing.

use crate::error::{AshError, Result};
use crate::recipe::{DEFAULT_DESCRIPTION, DEFAULT_TITLE};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Schema version every recipe is upgraded to
pub const CURRENT_RECIPE_VERSION: &str = "1.1";

/// Sentinel version of array-rooted recipes
pub const LEGACY_VERSION: &str = "1.0";

/// Suffix appended to a recipe path for its pre-upgrade backup
pub const BACKUP_SUFFIX: &str = ".backup";

/// A `major.minor` schema version, ordered numerically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The version a migration from this one produces
    pub const fn next(self) -> Self {
        Self::new(self.major, self.minor + 1)
    }
}

impl FromStr for SchemaVersion {
    type Err = AshError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AshError::InvalidVersion(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Description of one supported schema version
#[derive(Debug, Clone, Copy)]
pub struct VersionInfo {
    pub version: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

/// Every schema version this build understands, oldest first
pub const VERSION_HISTORY: &[VersionInfo] = &[
    VersionInfo {
        version: "1.0",
        description: "Original format (array-based)",
        features: &["basic_steps", "function_calls", "prompt_for"],
    },
    VersionInfo {
        version: "1.1",
        description: "Added recipe_context support + flat step format",
        features: &[
            "basic_steps",
            "function_calls",
            "prompt_for",
            "recipe_context",
            "flat_format",
            "professional_naming",
        ],
    },
];

/// Returns true if this build knows the given version
pub fn is_supported_version(version: &str) -> bool {
    VERSION_HISTORY.iter().any(|info| info.version == version)
}

/// Detect the schema version of a parsed recipe.
///
/// A mapping carrying `version` reports that value; an array is a legacy
/// recipe. Anything else is rejected.
pub fn detect_version(raw: &Value) -> Result<String> {
    match raw {
        Value::Object(map) => match map.get("version") {
            Some(Value::String(v)) => Ok(v.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(AshError::InvalidVersion(other.to_string())),
            None => Err(AshError::UnrecognizedShape(
                "object recipe has no 'version' field".to_string(),
            )),
        },
        Value::Array(_) => Ok(LEGACY_VERSION.to_string()),
        other => Err(AshError::UnrecognizedShape(format!(
            "expected an object or array at the root, found {}",
            json_kind(other)
        ))),
    }
}

/// A single N → N+1 schema migration
struct Migration {
    from: SchemaVersion,
    apply: fn(Value) -> Result<Value>,
}

/// Registered migrations; each entry upgrades `from` to `from.next()`
const MIGRATIONS: &[Migration] = &[Migration {
    from: SchemaVersion::new(1, 0),
    apply: legacy_to_flat,
}];

fn find_migration(from: SchemaVersion) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.from == from)
}

/// Upgrade a raw recipe from one schema version to another.
///
/// Returns the upgraded document and whether anything changed. Upgrading to
/// the same version is a no-op; upgrading "down" is an
/// [`AshError::UnsupportedVersion`].
pub fn upgrade(raw: Value, from: &str, to: &str) -> Result<(Value, bool)> {
    let from_v: SchemaVersion = from.parse()?;
    let to_v: SchemaVersion = to.parse()?;

    match from_v.cmp(&to_v) {
        Ordering::Equal => return Ok((raw, false)),
        Ordering::Greater => {
            return Err(AshError::UnsupportedVersion {
                found: from.to_string(),
                supported: to.to_string(),
            });
        }
        Ordering::Less => {}
    }

    let mut current = from_v;
    let mut doc = raw;
    while current < to_v {
        let migration = find_migration(current).ok_or_else(|| AshError::UnsupportedVersion {
            found: current.to_string(),
            supported: to.to_string(),
        })?;
        debug!(from = %current, to = %current.next(), "applying recipe migration");
        doc = (migration.apply)(doc)?;
        current = current.next();
    }

    Ok((doc, true))
}

/// Upgrade a raw recipe to [`CURRENT_RECIPE_VERSION`], detecting its version first
pub fn upgrade_to_current(raw: Value) -> Result<(Value, VersionRecord)> {
    let detected = detect_version(&raw)?;
    let (doc, was_upgraded) = upgrade(raw, &detected, CURRENT_RECIPE_VERSION)?;
    Ok((
        doc,
        VersionRecord {
            detected,
            target: CURRENT_RECIPE_VERSION.to_string(),
            was_upgraded,
        },
    ))
}

/// 1.0 → 1.1: split the metadata element off and flatten steps into `stepN` keys
fn legacy_to_flat(raw: Value) -> Result<Value> {
    let migration_error = |reason: &str| AshError::Migration {
        from: "1.0".to_string(),
        to: "1.1".to_string(),
        reason: reason.to_string(),
    };

    let Value::Array(mut items) = raw else {
        return Err(migration_error("legacy recipe must be an array"));
    };
    if items.is_empty() {
        return Err(migration_error("legacy recipe is empty"));
    }
    let steps = items.split_off(1);
    let Some(Value::Object(metadata)) = items.pop() else {
        return Err(migration_error("first element must be a metadata object"));
    };

    let mut upgraded = Map::new();
    upgraded.insert("version".to_string(), json!("1.1"));
    upgraded.insert(
        "title".to_string(),
        metadata
            .get("title")
            .cloned()
            .unwrap_or_else(|| json!(DEFAULT_TITLE)),
    );
    upgraded.insert(
        "description".to_string(),
        metadata
            .get("description")
            .cloned()
            .unwrap_or_else(|| json!(DEFAULT_DESCRIPTION)),
    );
    if let Some(color) = metadata.get("color") {
        upgraded.insert("color".to_string(), color.clone());
    }
    if let Some(color_end) = metadata.get("color_end").or_else(|| metadata.get("colorEnd")) {
        upgraded.insert("color_end".to_string(), color_end.clone());
    }

    let has_steps = !steps.is_empty();
    for (i, step) in steps.into_iter().enumerate() {
        upgraded.insert(format!("step{}", i + 1), step);
    }

    if has_steps {
        upgraded.insert(
            "metadata".to_string(),
            json!({"original_version": "1.0", "upgraded_on": "auto"}),
        );
    }

    Ok(Value::Object(upgraded))
}

/// Outcome of version processing for one load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub detected: String,
    pub target: String,
    pub was_upgraded: bool,
}

impl VersionRecord {
    /// Returns true if the recipe is older than the target and was left as-is
    pub fn is_legacy(&self) -> bool {
        !self.was_upgraded && self.detected != self.target
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.was_upgraded {
            write!(f, "v{} → v{}", self.detected, self.target)
        } else if self.is_legacy() {
            write!(f, "v{} (legacy)", self.detected)
        } else {
            write!(f, "v{}", self.detected)
        }
    }
}

/// Path of the backup written before a recipe is upgraded in place
pub fn backup_path(recipe_path: &Path) -> PathBuf {
    let mut name = recipe_path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Persist an upgraded recipe over the original file.
///
/// When `create_backup` is set the original bytes are copied to
/// `<path>.backup` first. The new content is written to a temp file in the
/// same directory and renamed over the original, so a crash leaves either
/// the old file or the new one in place.
pub fn persist_upgrade(
    recipe_path: &Path,
    upgraded: &Value,
    create_backup: bool,
) -> Result<Option<PathBuf>> {
    let backup = if create_backup && recipe_path.exists() {
        let backup = backup_path(recipe_path);
        std::fs::copy(recipe_path, &backup)?;
        info!(backup = %backup.display(), "recipe backup written");
        Some(backup)
    } else {
        None
    };

    let mut json = serde_json::to_string_pretty(upgraded)?;
    json.push('\n');

    let dir = match recipe_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(recipe_path).map_err(|e| AshError::Io(e.error))?;

    info!(path = %recipe_path.display(), "upgraded recipe saved");
    Ok(backup)
}

/// Build a new recipe skeleton in the current schema
pub fn new_recipe_template(title: &str, description: &str) -> Value {
    json!({
        "version": CURRENT_RECIPE_VERSION,
        "title": title,
        "description": description,
        "step1": {
            "statement": "Welcome to your new recipe! Edit this step to get started."
        },
        "step2": {
            "statement": "Add more steps by creating step3, step4, etc.",
            "function_name": "optional_function_name"
        }
    })
}

/// Human-readable JSON type name for diagnostics
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

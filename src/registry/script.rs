//! Script-backed recipe modules.
//!
//! A recipe `deploy.json` may ship a sibling `deploy.module.json`:
//!
//! ```json
//! {
//!   "functions": {
//!     "check_host": {
//!       "params": ["host", "recipe_context"],
//!       "script": "ping -c1 \"$host\""
//!     }
//!   }
//! }
//! ```
//!
//! Each function runs as `bash -c <script>` in the recipe's directory. Bound
//! parameters are exported as environment variables named after the
//! parameter. A declared `recipe_context` receives the path of a JSON file
//! holding the shared context; whatever the script leaves in that file is
//! merged back after it exits. Exit status 0 counts as success, any other
//! status as a retryable failure, and death by signal as a fault.

use super::{FunctionBody, FunctionRegistry, ModuleId, RecipeFunction, RecipeModule};
use crate::context::ExecutionContext;
use crate::console::{Console, Tone};
use crate::error::{AshError, Result};
use crate::fault::{FunctionFault, SourceLocation};
use crate::invoke::{CallArgs, RECIPE_CONTEXT_PARAM};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name suffix of script modules, appended to the recipe stem
pub const MODULE_FILE_SUFFIX: &str = ".module.json";

const DEFAULT_SHELL: &str = "bash";

#[derive(Debug, Deserialize)]
struct ModuleFile {
    #[serde(default)]
    functions: IndexMap<String, ScriptFunction>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptFunction {
    #[serde(default)]
    params: Vec<String>,
    script: String,
}

/// Loads `<stem>.module.json` next to the recipe
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    shell: String,
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run scripts with a different shell
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Path of the module file for a module identity
    pub fn module_path(id: &ModuleId) -> PathBuf {
        id.dir.join(format!("{}{}", id.stem, MODULE_FILE_SUFFIX))
    }
}

impl FunctionRegistry for ScriptRegistry {
    fn load(&self, id: &ModuleId) -> Result<Option<RecipeModule>> {
        let path = Self::module_path(id);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| AshError::module(path.display().to_string(), e.to_string()))?;
        let file: ModuleFile = serde_json::from_str(&content)
            .map_err(|e| AshError::module(path.display().to_string(), e.to_string()))?;

        debug!(module = %path.display(), functions = file.functions.len(), "loaded script module");

        let mut module = RecipeModule::new(id.stem.clone()).with_source(&path);
        for (name, function) in file.functions {
            module.insert(script_function(&self.shell, &path, &id.dir, name, function));
        }
        Ok(Some(module))
    }
}

fn script_function(
    shell: &str,
    module_path: &Path,
    workdir: &Path,
    name: String,
    function: ScriptFunction,
) -> RecipeFunction {
    let shell = shell.to_string();
    let module_path = module_path.to_path_buf();
    let workdir = workdir.to_path_buf();
    let fn_name = name.clone();
    let script = function.script;

    let body: FunctionBody = Arc::new(move |args: &mut CallArgs<'_>| {
        let location = SourceLocation::new(module_path.display().to_string(), 0, 0);
        run_script(&shell, &workdir, &fn_name, &script, args)
            .map_err(|fault| fault.in_function(&fn_name).at(location))
    });
    RecipeFunction::from_parts(name, function.params, body)
}

/// Render a bound value as an environment variable
fn env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn run_script(
    shell: &str,
    workdir: &Path,
    function: &str,
    script: &str,
    args: &mut CallArgs<'_>,
) -> std::result::Result<Value, FunctionFault> {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(script)
        .arg(function)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    for (param, value) in args.values() {
        cmd.env(param, env_value(value));
    }

    // Context hand-off file lives until the script's changes are merged back
    let context_file = match args.context() {
        Some(context) => {
            let mut file = tempfile::Builder::new()
                .prefix("ash-context-")
                .suffix(".json")
                .tempfile()
                .map_err(|e| FunctionFault::new(format!("cannot create context file: {e}")))?;
            let json = serde_json::to_string(&*context)
                .map_err(|e| FunctionFault::new(format!("cannot encode context: {e}")))?;
            file.write_all(json.as_bytes())
                .map_err(|e| FunctionFault::new(format!("cannot write context file: {e}")))?;
            cmd.env(RECIPE_CONTEXT_PARAM, file.path());
            Some(file)
        }
        None => None,
    };

    info!("running script function {} with {}", function, shell);
    let output = cmd
        .output()
        .map_err(|e| FunctionFault::new(format!("failed to spawn {shell}: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if let Some(console) = args.output() {
        for line in stdout.lines() {
            console.print(line);
        }
        for line in stderr.lines() {
            console.say(Tone::Warning, line);
        }
    }

    if let Some(file) = context_file {
        let updated = std::fs::read_to_string(file.path())
            .map_err(|e| FunctionFault::new(format!("cannot read context file back: {e}")))?;
        if !updated.trim().is_empty() {
            let updated: ExecutionContext = serde_json::from_str(&updated).map_err(|e| {
                FunctionFault::new(format!("script left an invalid context file: {e}"))
            })?;
            if let Some(context) = args.context() {
                context.merge(updated);
            }
        }
    }

    match output.status.code() {
        Some(0) => Ok(json!(true)),
        Some(code) => {
            debug!(function, code, "script function exited non-zero");
            Ok(json!(false))
        }
        None => {
            warn!(function, "script function terminated by signal");
            Err(FunctionFault::new("script terminated by signal")
                .with_detail(format!("status: {}\n{}", output.status, stderr.trim())))
        }
    }
}

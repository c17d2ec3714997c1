//! Script Module Tests
//!
//! Recipes paired with a `<stem>.module.json` file whose functions run
//! under bash:
//! - exit status maps onto success, retry and fault
//! - bound parameters arrive as environment variables
//! - the shared context round-trips through the hand-off file
//! - verification sees the module's declared parameters

#![cfg(unix)]

use ash::context::SectionName;
use ash::loader::{LoadOptions, RecipeEntry, load_entry};
use ash::{
    BuiltinRegistry, CompositeRegistry, Dependencies, FunctionRegistry, RecipeFunction,
    RecipeModule, RunOptions, RunOutcome, RunReport, ScriptRegistry, ScriptedConsole,
    ScriptedDialog, StepState, Tone, run_recipe,
};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

fn write_pair(dir: &Path, recipe: &Value, module: &Value) -> RecipeEntry {
    write_pair_with(dir, recipe, module, &ScriptRegistry::new())
}

fn write_pair_with(
    dir: &Path,
    recipe: &Value,
    module: &Value,
    registry: &dyn FunctionRegistry,
) -> RecipeEntry {
    let recipe_path = dir.join("tasks.json");
    fs::write(&recipe_path, serde_json::to_string_pretty(recipe).unwrap()).unwrap();
    fs::write(
        dir.join("tasks.module.json"),
        serde_json::to_string_pretty(module).unwrap(),
    )
    .unwrap();
    load_entry(&recipe_path, registry, LoadOptions::default())
}

fn run_entry(entry: &RecipeEntry, console: &mut ScriptedConsole, max_retries: u32) -> RunReport {
    let mut dialog = ScriptedDialog::new();
    let mut deps = Dependencies::new(console, &mut dialog);
    let options = RunOptions {
        max_retries,
        pause_between_steps: false,
    };
    run_recipe(
        entry.document.as_ref().unwrap(),
        entry.module.as_ref(),
        &mut deps,
        options,
    )
    .unwrap()
}

// =============================================================================
// Exit Status
// =============================================================================

#[test]
fn exit_status_decides_the_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Exit codes",
            "step1": {"statement": "works", "function_name": "ok"},
            "step2": {"statement": "breaks", "function_name": "fail"}
        }),
        &json!({"functions": {
            "ok": {"script": "exit 0"},
            "fail": {"script": "exit 3"}
        }}),
    );
    assert!(entry.is_runnable(), "{:?}", entry.load_errors);

    let mut console = ScriptedConsole::new();
    let report = run_entry(&entry, &mut console, 1);

    assert_eq!(report.steps[0].state, StepState::Succeeded);
    assert_eq!(report.steps[0].attempts, 1);
    assert_eq!(report.steps[1].state, StepState::Aborted);
    assert_eq!(report.steps[1].attempts, 2);
}

#[test]
fn killed_script_is_a_fault() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Signals",
            "step1": {"statement": "dies", "function_name": "die"}
        }),
        &json!({"functions": {"die": {"script": "kill -9 $$"}}}),
    );

    let mut console = ScriptedConsole::new();
    let report = run_entry(&entry, &mut console, 3);

    assert_eq!(report.steps[0].attempts, 1);
    match report.outcome {
        RunOutcome::Aborted { reason, .. } => {
            assert!(reason.contains("signal"));
            assert!(reason.contains("tasks.module.json"));
        }
        RunOutcome::Completed => panic!("expected the run to abort"),
    }
}

#[test]
fn missing_shell_is_a_fault_at_the_module_file() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair_with(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "No shell",
            "step1": {"statement": "try", "function_name": "try_it"}
        }),
        &json!({"functions": {"try_it": {"script": "exit 0"}}}),
        &ScriptRegistry::with_shell("/nonexistent-shell"),
    );
    assert!(entry.is_runnable(), "{:?}", entry.load_errors);

    let mut console = ScriptedConsole::new();
    let report = run_entry(&entry, &mut console, 3);

    assert_eq!(report.steps[0].attempts, 1);
    assert_eq!(report.steps[0].state, StepState::Aborted);
    match report.outcome {
        RunOutcome::Aborted { reason, .. } => {
            assert!(reason.contains("failed to spawn /nonexistent-shell"), "{reason}");
            assert!(reason.contains("function 'try_it' failed"), "{reason}");
            assert!(reason.contains("tasks.module.json"), "{reason}");
        }
        RunOutcome::Completed => panic!("expected the run to abort"),
    }
}

// =============================================================================
// Output Relay
// =============================================================================

#[test]
fn output_is_relayed_without_a_console_param() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Noisy",
            "step1": {"statement": "noisy", "function_name": "noisy"}
        }),
        &json!({"functions": {"noisy": {
            "script": "echo visible-out; echo visible-err >&2; exit 1"
        }}}),
    );

    let mut console = ScriptedConsole::new();
    let report = run_entry(&entry, &mut console, 0);

    assert!(!report.is_completed());
    assert!(
        console
            .lines()
            .iter()
            .any(|(tone, text)| *tone == Tone::Plain && text == "visible-out")
    );
    assert!(
        console
            .lines()
            .iter()
            .any(|(tone, text)| *tone == Tone::Warning && text == "visible-err")
    );
}

// =============================================================================
// Parameter Binding
// =============================================================================

#[test]
fn prompted_and_literal_values_become_env_vars() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Env",
            "step1": {
                "statement": "ping a host",
                "function_name": "ping",
                "prompt_for": {"host": "Host name"},
                "count": 3,
                "label": "primary"
            }
        }),
        &json!({"functions": {"ping": {
            "params": ["host", "count", "label", "console"],
            "script": "echo \"pinging $host x$count ($label)\"; test \"$host\" = example.org && test \"$count\" = 3"
        }}}),
    );
    assert!(entry.is_runnable(), "{:?}", entry.load_errors);

    let mut console = ScriptedConsole::with_inputs(["example.org"]);
    let report = run_entry(&entry, &mut console, 0);

    assert!(report.is_completed());
    assert!(console.contains("pinging example.org x3 (primary)"));
}

#[test]
fn stderr_is_relayed_as_warning() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Stderr",
            "step1": {"statement": "complain", "function_name": "complain"}
        }),
        &json!({"functions": {"complain": {
            "params": ["console"],
            "script": "echo 'careful now' >&2"
        }}}),
    );

    let mut console = ScriptedConsole::new();
    run_entry(&entry, &mut console, 0);

    assert!(
        console
            .lines()
            .iter()
            .any(|(tone, text)| *tone == Tone::Warning && text == "careful now")
    );
}

#[test]
fn scripts_run_in_the_recipe_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("marker.txt"), "here").unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Workdir",
            "step1": {"statement": "look", "function_name": "look"}
        }),
        &json!({"functions": {"look": {"script": "test -f marker.txt"}}}),
    );

    let mut console = ScriptedConsole::new();
    assert!(run_entry(&entry, &mut console, 0).is_completed());
}

// =============================================================================
// Shared Context
// =============================================================================

#[test]
fn context_written_by_one_script_is_seen_by_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Context",
            "step1": {"statement": "remember", "function_name": "remember"},
            "step2": {"statement": "recall", "function_name": "recall"}
        }),
        &json!({"functions": {
            "remember": {
                "params": ["recipe_context"],
                "script": "printf '{\"variables\":{\"greeting\":\"hi\"}}' > \"$recipe_context\""
            },
            "recall": {
                "params": ["recipe_context"],
                "script": "grep -q '\"greeting\":\"hi\"' \"$recipe_context\""
            }
        }}),
    );

    let mut console = ScriptedConsole::new();
    let report = run_entry(&entry, &mut console, 0);

    assert!(report.is_completed(), "{:?}", report.outcome);
    assert_eq!(
        report.context.get(SectionName::Variables, "greeting"),
        Some(&json!("hi"))
    );
}

#[test]
fn garbage_context_file_is_a_fault() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!({
            "version": "1.1",
            "title": "Garbage",
            "step1": {"statement": "scribble", "function_name": "scribble"}
        }),
        &json!({"functions": {"scribble": {
            "params": ["recipe_context"],
            "script": "echo 'not json' > \"$recipe_context\""
        }}}),
    );

    let mut console = ScriptedConsole::new();
    let report = run_entry(&entry, &mut console, 3);

    assert_eq!(report.steps[0].attempts, 1);
    assert!(!report.is_completed());
}

// =============================================================================
// Verification
// =============================================================================

#[test]
fn verification_uses_script_params() {
    let dir = tempfile::tempdir().unwrap();
    let entry = write_pair(
        dir.path(),
        &json!([
            {"title": "Legacy with module"},
            {"statement": "deploy", "function_name": "deploy", "prompt_for": {"target": "Where to?"}},
            {"statement": "missing", "function_name": "nowhere"}
        ]),
        &json!({"functions": {"deploy": {"params": ["host"], "script": "true"}}}),
    );

    assert!(entry.was_upgraded);
    assert_eq!(entry.version_info, "v1.0 → v1.1");
    assert_eq!(
        entry.load_errors,
        vec![
            "Step 1: Parameter 'target' in prompt_for not found in function 'deploy'".to_string(),
            "Step 2: Function 'nowhere' not found in module".to_string(),
        ]
    );
    assert!(!entry.is_runnable());
}

#[test]
fn malformed_module_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let recipe_path = dir.path().join("tasks.json");
    fs::write(
        &recipe_path,
        r#"{"version": "1.1", "title": "Broken module", "step1": {"statement": "x"}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("tasks.module.json"), "{ nope").unwrap();

    let entry = load_entry(&recipe_path, &ScriptRegistry::new(), LoadOptions::default());

    assert!(entry.document.is_some());
    assert!(entry.module.is_none());
    assert_eq!(entry.load_errors.len(), 1);
    assert!(entry.load_errors[0].contains("tasks.module.json"));
}

// =============================================================================
// Host Registries
// =============================================================================

#[test]
fn script_module_shadows_builtin_of_the_same_stem() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CompositeRegistry::new().with(ScriptRegistry::new()).with(
        BuiltinRegistry::new().with_module("tasks", || {
            RecipeModule::new("tasks").with_function(RecipeFunction::new("which", &[], |_| {
                Ok(json!(false))
            }))
        }),
    );
    let recipe = json!({
        "version": "1.1",
        "title": "Shadowing",
        "step1": {"statement": "which one", "function_name": "which"}
    });

    let entry = write_pair_with(
        dir.path(),
        &recipe,
        &json!({"functions": {"which": {"script": "exit 0"}}}),
        &registry,
    );
    let mut console = ScriptedConsole::new();
    assert!(run_entry(&entry, &mut console, 0).is_completed());

    // Without a module file the builtin answers
    fs::remove_file(dir.path().join("tasks.module.json")).unwrap();
    let entry = load_entry(&dir.path().join("tasks.json"), &registry, LoadOptions::default());
    assert!(entry.is_runnable(), "{:?}", entry.load_errors);
    let mut console = ScriptedConsole::new();
    let report = run_entry(&entry, &mut console, 0);
    assert_eq!(report.steps[0].state, StepState::Aborted);
}

//! ASH - Actionable Sequence Helper
//!
//! Loads declarative step recipes, upgrades older recipe schemas, and walks
//! the user through each step while invoking the recipe's step functions.

pub mod cli;
pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod executor;
pub mod fault;
pub mod invoke;
pub mod loader;
pub mod normalize;
pub mod recipe;
pub mod registry;
pub mod step_state;
pub mod verify;
pub mod version;

// Re-export main types for convenience
pub use config::RunnerConfig;
pub use console::{
    Console, DialogHelper, ScriptedConsole, ScriptedDialog, TerminalConsole, TerminalDialog, Tone,
};
pub use context::{ExecutionContext, SectionName};
pub use error::{AshError, Result};
pub use executor::{RunOptions, RunOutcome, RunReport, StepReport, run_recipe};
pub use fault::{FunctionFault, SourceLocation};
pub use invoke::{CallArgs, Dependencies, FatalReason, Outcome, is_truthy, resolve_and_invoke};
pub use loader::{LoadOptions, LoadedRecipe, RecipeEntry, load_entry, load_recipe};
pub use normalize::normalize;
pub use recipe::{DisplayHints, RecipeDocument, Step};
pub use registry::{
    BuiltinRegistry, CompositeRegistry, FunctionRegistry, ModuleId, RecipeFunction, RecipeModule,
    ScriptRegistry,
};
pub use step_state::{StepRun, StepState, StepTransitionError};
pub use verify::{ConfigIssue, IssueKind, verify_recipe};
pub use version::{
    CURRENT_RECIPE_VERSION, VersionRecord, detect_version, persist_upgrade, upgrade,
};

//! Step executor
//!
//! Walks a normalized recipe step by step, driving each one through the
//! [`StepRun`] state machine until it succeeds or aborts. One
//! [`ExecutionContext`] is created per run and threaded unchanged through
//! every attempt of every step.

use crate::console::{Console, Tone};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::invoke::{Dependencies, FatalReason, Outcome, resolve_and_invoke};
use crate::recipe::RecipeDocument;
use crate::registry::RecipeModule;
use crate::step_state::{DEFAULT_MAX_RETRIES, StepRun, StepState};
use tracing::{debug, info, warn};

/// Knobs for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub max_retries: u32,
    /// Wait for Enter after each succeeded step except the last
    pub pause_between_steps: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            pause_between_steps: true,
        }
    }
}

/// Final state of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub display_name: String,
    pub state: StepState,
    pub attempts: u32,
}

/// How the run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted { step: String, reason: String },
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub title: String,
    /// One entry per recipe step; steps never reached stay `Pending`
    pub steps: Vec<StepReport>,
    pub outcome: RunOutcome,
    /// Context as left by the last step
    pub context: ExecutionContext,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Total attempts across all steps
    pub fn total_attempts(&self) -> u32 {
        self.steps.iter().map(|s| s.attempts).sum()
    }
}

/// Execute every step of `recipe` in order
pub fn run_recipe(
    recipe: &RecipeDocument,
    module: Option<&RecipeModule>,
    deps: &mut Dependencies<'_>,
    options: RunOptions,
) -> Result<RunReport> {
    let mut context = ExecutionContext::new();
    let mut reports: Vec<StepReport> = recipe
        .steps
        .iter()
        .map(|step| StepReport {
            display_name: step.display_name.clone(),
            state: StepState::Pending,
            attempts: 0,
        })
        .collect();

    info!(title = %recipe.title, steps = recipe.step_count(), "starting recipe");
    show_header(deps.console, &recipe.title);

    let last = recipe.steps.len().saturating_sub(1);
    for (index, step) in recipe.steps.iter().enumerate() {
        show_step(deps.console, &step.display_name, &step.statement);

        let mut run = StepRun::new(options.max_retries);
        let mut fatal: Option<FatalReason> = None;
        while !run.state().is_terminal() {
            run.start()?;
            if run.attempts() > 1 {
                debug!(step = %step.display_name, attempt = run.attempts(), "retrying step");
            }
            let outcome = resolve_and_invoke(step, module, deps, &mut context);
            let state = run.record(&outcome)?;

            match (&outcome, state) {
                (Outcome::Retryable, StepState::Retrying) => {
                    deps.console.say(
                        Tone::Warning,
                        "The step failed. Please review the output and try again.",
                    );
                    deps.console.say(
                        Tone::Warning,
                        &format!(
                            "Retrying step... (attempt {} of {})",
                            run.attempts() + 1,
                            run.max_retries() + 1
                        ),
                    );
                }
                (Outcome::Fatal(reason), _) => fatal = Some(reason.clone()),
                _ => {}
            }
        }

        let report = &mut reports[index];
        report.state = run.state();
        report.attempts = run.attempts();

        if run.state() == StepState::Aborted {
            let reason = match fatal {
                Some(reason) => {
                    deps.console.say(Tone::Error, &format!("FATAL ERROR: {reason}"));
                    reason.to_string()
                }
                None => {
                    let reason = format!("step failed after {} attempts", run.attempts());
                    deps.console.say(Tone::Error, &format!("{}: {reason}", step.display_name));
                    reason
                }
            };
            deps.console.say(Tone::Error, "Recipe execution aborted due to fatal error.");
            warn!(step = %step.display_name, %reason, "recipe aborted");
            return Ok(RunReport {
                title: recipe.title.clone(),
                steps: reports,
                outcome: RunOutcome::Aborted {
                    step: step.display_name.clone(),
                    reason,
                },
                context,
            });
        }

        if !step.prompt_for.is_empty() {
            deps.console.say(
                Tone::Success,
                &format!("{} completed successfully!", step.display_name),
            );
        }

        if options.pause_between_steps && index < last {
            pause(deps.console);
        }
    }

    deps.console.say(Tone::Success, "--- Recipe Complete ---");
    info!(title = %recipe.title, "recipe complete");
    Ok(RunReport {
        title: recipe.title.clone(),
        steps: reports,
        outcome: RunOutcome::Completed,
        context,
    })
}

fn show_header(console: &mut dyn Console, title: &str) {
    console.say(Tone::Success, &format!("--- Starting Recipe {title} ---"));
    console.say(Tone::Dim, &"-".repeat(25));
}

fn show_step(console: &mut dyn Console, display_name: &str, statement: &str) {
    console.say(Tone::Info, &format!("[{display_name}]"));
    if !statement.is_empty() {
        console.print(statement);
    }
}

fn pause(console: &mut dyn Console) {
    // Closed input cannot be waited on; keep going
    if let Err(err) = console.input("Press Enter to continue...") {
        debug!(error = %err, "pause skipped");
    }
}

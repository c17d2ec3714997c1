//! Command line interface
//!
//! `ash run | verify | upgrade | new | versions`. Command handlers live here
//! so they can be driven with scripted consoles in tests; `main` only wires
//! up the terminal and the registries.

use crate::config::RunnerConfig;
use crate::console::{Console, DialogHelper, Tone};
use crate::executor::{RunOutcome, run_recipe};
use crate::invoke::Dependencies;
use crate::loader::{LoadOptions, load_entry, read_raw};
use crate::registry::FunctionRegistry;
use crate::version::{
    CURRENT_RECIPE_VERSION, VERSION_HISTORY, new_recipe_template, persist_upgrade,
    upgrade_to_current,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// ASH - Actionable Sequence Helper
#[derive(Parser, Debug)]
#[command(name = "ash")]
#[command(about = "Walks you through versioned step recipes and runs their step functions")]
#[command(version)]
pub struct Cli {
    /// Runner configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a recipe step by step
    Run {
        /// Recipe file (JSON)
        recipe: PathBuf,

        /// Do not upgrade older recipe schemas on disk
        #[arg(long)]
        no_upgrade: bool,

        /// Retries per step before aborting
        #[arg(long)]
        max_retries: Option<u32>,

        /// Do not wait for Enter between steps
        #[arg(long)]
        no_pause: bool,

        /// Run even if verification reported problems
        #[arg(long)]
        force: bool,
    },
    /// Check recipes against their modules without running them
    Verify {
        /// Recipe files (JSON)
        #[arg(required = true)]
        recipes: Vec<PathBuf>,
    },
    /// Upgrade a recipe to the current schema in place
    Upgrade {
        /// Recipe file (JSON)
        recipe: PathBuf,

        /// Skip writing `<recipe>.backup`
        #[arg(long)]
        no_backup: bool,
    },
    /// Create a new recipe from the template
    New {
        /// Where to write the recipe
        path: PathBuf,

        #[arg(short, long, default_value = "New Recipe")]
        title: String,

        #[arg(short, long, default_value = "Describe what this recipe does.")]
        description: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List supported recipe schema versions
    Versions,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Load the configuration file if one was given, then apply flag overrides
    pub fn resolve_config(&self) -> Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load_from_file(path)?,
            None => RunnerConfig::default(),
        };

        if let Commands::Run {
            no_upgrade,
            max_retries,
            no_pause,
            ..
        } = &self.command
        {
            if *no_upgrade {
                config.auto_upgrade = false;
            }
            if let Some(retries) = max_retries {
                config.max_retries = *retries;
            }
            if *no_pause {
                config.pause_between_steps = false;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

/// Everything a command needs from the host
pub struct Session<'a> {
    pub console: &'a mut dyn Console,
    pub dialog: &'a mut dyn DialogHelper,
    pub registry: &'a dyn FunctionRegistry,
}

/// Execute the parsed command. Returns `Ok(false)` when the command ran but
/// did not succeed (aborted recipe, failed verification).
pub fn dispatch(cli: &Cli, session: &mut Session<'_>) -> Result<bool> {
    let config = cli.resolve_config()?;
    debug!(?config, "resolved runner configuration");

    match &cli.command {
        Commands::Run { recipe, force, .. } => run_command(recipe, *force, &config, session),
        Commands::Verify { recipes } => Ok(verify_command(recipes, session)),
        Commands::Upgrade { recipe, no_backup } => {
            upgrade_command(recipe, !no_backup, session.console)
        }
        Commands::New {
            path,
            title,
            description,
            force,
        } => new_command(path, title, description, *force, session.console),
        Commands::Versions => {
            versions_command(session.console);
            Ok(true)
        }
    }
}

fn run_command(
    recipe: &Path,
    force: bool,
    config: &RunnerConfig,
    session: &mut Session<'_>,
) -> Result<bool> {
    let entry = load_entry(recipe, session.registry, config.load_options());
    let console = &mut *session.console;

    for warning in &entry.warnings {
        console.say(Tone::Warning, warning);
    }
    let Some(document) = entry.document.as_ref() else {
        for error in &entry.load_errors {
            console.say(Tone::Error, error);
        }
        return Ok(false);
    };
    if entry.was_upgraded {
        console.say(Tone::Info, &format!("Recipe upgraded: {}", entry.version_info));
    }
    if !entry.load_errors.is_empty() {
        console.say(Tone::Error, "Configuration problems found:");
        for error in &entry.load_errors {
            console.say(Tone::Error, &format!("  {error}"));
        }
        if !force {
            console.say(Tone::Dim, "Fix the recipe or pass --force to run anyway.");
            return Ok(false);
        }
    }

    let mut deps = Dependencies::new(console, &mut *session.dialog);
    let report = run_recipe(document, entry.module.as_ref(), &mut deps, config.run_options())?;
    info!(title = %report.title, attempts = report.total_attempts(), "run finished");
    Ok(report.outcome == RunOutcome::Completed)
}

fn verify_command(recipes: &[PathBuf], session: &mut Session<'_>) -> bool {
    // Verification never rewrites files
    let options = LoadOptions {
        auto_upgrade: false,
        create_backup: false,
    };

    let mut all_clean = true;
    for path in recipes {
        let entry = load_entry(path, session.registry, options);
        if entry.is_runnable() {
            session.console.say(
                Tone::Success,
                &format!("✓ {} [{}] {}", entry.title, entry.version_info, path.display()),
            );
        } else {
            all_clean = false;
            session.console.say(
                Tone::Error,
                &format!("✗ {} [{}] {}", entry.title, entry.version_info, path.display()),
            );
            for error in &entry.load_errors {
                session.console.say(Tone::Error, &format!("  {error}"));
            }
        }
        for warning in &entry.warnings {
            session.console.say(Tone::Warning, &format!("  {warning}"));
        }
    }
    all_clean
}

fn upgrade_command(recipe: &Path, create_backup: bool, console: &mut dyn Console) -> Result<bool> {
    let raw = read_raw(recipe)?;
    let (upgraded, record) = upgrade_to_current(raw)?;
    if !record.was_upgraded {
        console.say(
            Tone::Info,
            &format!("{} is already at v{}", recipe.display(), CURRENT_RECIPE_VERSION),
        );
        return Ok(true);
    }

    let backup = persist_upgrade(recipe, &upgraded, create_backup)
        .with_context(|| format!("Failed to save upgraded recipe {}", recipe.display()))?;
    console.say(
        Tone::Success,
        &format!("Upgraded {}: {}", recipe.display(), record),
    );
    if let Some(backup) = backup {
        console.say(Tone::Dim, &format!("Backup written to {}", backup.display()));
    }
    Ok(true)
}

fn new_command(
    path: &Path,
    title: &str,
    description: &str,
    force: bool,
    console: &mut dyn Console,
) -> Result<bool> {
    if path.exists() && !force {
        console.say(
            Tone::Error,
            &format!("{} already exists (use --force to overwrite)", path.display()),
        );
        return Ok(false);
    }

    let template = new_recipe_template(title, description);
    let mut json = serde_json::to_string_pretty(&template)?;
    json.push('\n');
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write recipe to {}", path.display()))?;
    console.say(Tone::Success, &format!("Created {}", path.display()));
    Ok(true)
}

fn versions_command(console: &mut dyn Console) {
    for info in VERSION_HISTORY {
        let marker = if info.version == CURRENT_RECIPE_VERSION {
            " (current)"
        } else {
            ""
        };
        console.say(
            Tone::Info,
            &format!("v{}{} - {}", info.version, marker, info.description),
        );
        console.say(Tone::Dim, &format!("  features: {}", info.features.join(", ")));
    }
}

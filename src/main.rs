//! ASH - Main entry point

use ash::cli::{Cli, Session, dispatch};
use ash::console::{Console, TerminalConsole, TerminalDialog, Tone};
use ash::registry::ScriptRegistry;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Logs go to stderr so they never interleave with recipe output.
/// `RUST_LOG` overrides the level chosen by `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    debug!("CLI arguments parsed");

    // Step functions come from `<stem>.module.json` next to the recipe
    let registry = ScriptRegistry::new();

    let mut console = TerminalConsole::new();
    let mut dialog = TerminalDialog::new(TerminalConsole::new());
    let mut session = Session {
        console: &mut console,
        dialog: &mut dialog,
        registry: &registry,
    };

    match dispatch(&cli, &mut session) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            console.say(Tone::Error, &format!("✗ {:#}", e));
            std::process::exit(1);
        }
    }
}

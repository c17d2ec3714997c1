//! Console and dialog capabilities.
//!
//! The executor and every step function talk to the user through these two
//! traits. [`TerminalConsole`] and [`TerminalDialog`] back the CLI;
//! [`ScriptedConsole`] and [`ScriptedDialog`] replay canned input and record
//! output for headless runs and tests.

use crossterm::style::Stylize;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use strum::{Display, EnumIter};

/// Semantic color of a console line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Tone {
    Plain,
    Info,
    Success,
    Warning,
    Error,
    Dim,
}

/// Output and input sink shared by the executor and step functions
pub trait Console {
    /// Write one line in the given tone
    fn say(&mut self, tone: Tone, text: &str);

    fn print(&mut self, text: &str) {
        self.say(Tone::Plain, text);
    }

    /// Show a prompt and read one line, without the trailing newline.
    ///
    /// Closed input is reported as [`io::ErrorKind::UnexpectedEof`].
    fn input(&mut self, prompt: &str) -> io::Result<String>;
}

/// Dialog helper injected as `run_tk_dialog`
pub trait DialogHelper {
    /// Ask the user to choose a file; `None` when cancelled
    fn pick_file(&mut self, title: &str) -> Option<PathBuf>;

    /// Ask a yes/no question
    fn confirm(&mut self, question: &str) -> bool;
}

/// Console on the process's stdin/stdout with crossterm colors
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }

    fn styled(tone: Tone, text: &str) -> String {
        match tone {
            Tone::Plain => text.to_string(),
            Tone::Info => text.cyan().to_string(),
            Tone::Success => text.green().bold().to_string(),
            Tone::Warning => text.yellow().bold().to_string(),
            Tone::Error => text.red().bold().to_string(),
            Tone::Dim => text.dim().to_string(),
        }
    }
}

impl Console for TerminalConsole {
    fn say(&mut self, tone: Tone, text: &str) {
        println!("{}", Self::styled(tone, text));
    }

    fn input(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt.cyan())?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Console that replays queued input and records everything written
#[derive(Debug, Default, Clone)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    lines: Vec<(Tone, String)>,
    prompts: Vec<String>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console whose `input` calls return these lines in order
    pub fn with_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Lines written so far, with their tones
    pub fn lines(&self) -> &[(Tone, String)] {
        &self.lines
    }

    /// Prompts shown so far, in order
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// All written text joined by newlines
    pub fn transcript(&self) -> String {
        self.lines
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns true if any written line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, text)| text.contains(needle))
    }

    pub fn remaining_inputs(&self) -> usize {
        self.inputs.len()
    }
}

impl Console for ScriptedConsole {
    fn say(&mut self, tone: Tone, text: &str) {
        self.lines.push((tone, text.to_string()));
    }

    fn input(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.inputs
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted input left"))
    }
}

/// Dialog helper that asks through a console of its own
#[derive(Debug, Default, Clone)]
pub struct TerminalDialog<C = TerminalConsole> {
    console: C,
}

impl<C: Console> TerminalDialog<C> {
    pub fn new(console: C) -> Self {
        Self { console }
    }

    pub fn into_inner(self) -> C {
        self.console
    }
}

impl<C: Console> DialogHelper for TerminalDialog<C> {
    fn pick_file(&mut self, title: &str) -> Option<PathBuf> {
        let answer = self.console.input(&format!("{title} (path, empty to cancel): ")).ok()?;
        let answer = answer.trim();
        (!answer.is_empty()).then(|| PathBuf::from(answer))
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.console
            .input(&format!("{question} [y/N]: "))
            .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }
}

/// Dialog helper with canned answers
#[derive(Debug, Default, Clone)]
pub struct ScriptedDialog {
    files: VecDeque<PathBuf>,
    confirmations: VecDeque<bool>,
    asked: Vec<String>,
}

impl ScriptedDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push_back(path.into());
        self
    }

    pub fn with_confirmation(mut self, answer: bool) -> Self {
        self.confirmations.push_back(answer);
        self
    }

    /// Titles and questions shown so far
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl DialogHelper for ScriptedDialog {
    fn pick_file(&mut self, title: &str) -> Option<PathBuf> {
        self.asked.push(title.to_string());
        self.files.pop_front()
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.asked.push(question.to_string());
        self.confirmations.pop_front().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_console_replays_inputs() {
        let mut console = ScriptedConsole::with_inputs(["first", "second"]);
        assert_eq!(console.input("a? ").unwrap(), "first");
        assert_eq!(console.input("b? ").unwrap(), "second");
        let err = console.input("c? ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(console.prompts(), ["a? ", "b? ", "c? "]);
    }

    #[test]
    fn test_scripted_console_records_output() {
        let mut console = ScriptedConsole::new();
        console.print("hello");
        console.say(Tone::Error, "bad");
        assert_eq!(console.lines()[1], (Tone::Error, "bad".to_string()));
        assert_eq!(console.transcript(), "hello\nbad");
        assert!(console.contains("hel"));
    }

    #[test]
    fn test_terminal_styling_keeps_text() {
        assert_eq!(TerminalConsole::styled(Tone::Plain, "plain"), "plain");
        let styled = TerminalConsole::styled(Tone::Error, "bad");
        assert!(styled.contains("bad"));
        assert_ne!(styled, "bad");
    }

    #[test]
    fn test_terminal_dialog_uses_console() {
        let console = ScriptedConsole::with_inputs(["/tmp/x.txt", "yes", ""]);
        let mut dialog = TerminalDialog::new(console);
        assert_eq!(dialog.pick_file("Pick"), Some(PathBuf::from("/tmp/x.txt")));
        assert!(dialog.confirm("Sure?"));
        assert_eq!(dialog.pick_file("Pick"), None);
        assert!(!dialog.confirm("Closed?"));
        assert_eq!(dialog.into_inner().prompts().len(), 4);
    }

    #[test]
    fn test_scripted_dialog_answers() {
        let mut dialog = ScriptedDialog::new()
            .with_file("/a")
            .with_confirmation(true);
        assert_eq!(dialog.pick_file("File"), Some(PathBuf::from("/a")));
        assert!(dialog.confirm("Ok?"));
        assert!(!dialog.confirm("Again?"));
        assert_eq!(dialog.asked().len(), 3);
    }

    #[test]
    fn test_tone_names() {
        assert_eq!(Tone::Warning.to_string(), "warning");
    }
}

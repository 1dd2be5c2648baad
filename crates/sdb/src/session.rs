//! Line-oriented debugging session.
//!
//! Reads one command per line, dispatches it against the traced process and
//! prints the outcome. Errors from the process controller are printed and the
//! session keeps going; only I/O failures on the session streams end it.

use std::io::{self, BufRead, Write};

use sdb_core::{Process, SdbError};
use sdb_utils::debug;
use thiserror::Error;

const PROMPT: &str = "sdb> ";

/// A command the session understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command
{
    /// Resume the process and wait for its next stop
    Continue,
    /// List commands
    Help,
}

impl Command
{
    /// Commands in matching order: a prefix picks the first command it fits.
    const ALL: [(&'static str, Command, &'static str); 2] = [
        ("continue", Command::Continue, "Resume the process until it stops, exits or is killed"),
        ("help", Command::Help, "Show this list"),
    ];
}

/// Why a session line could not be carried out.
#[derive(Debug, Error)]
pub(crate) enum SessionError
{
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Core(#[from] SdbError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Whether `word` is a (non-strict) prefix of `command`.
fn is_prefix(word: &str, command: &str) -> bool
{
    command.starts_with(word)
}

/// Parse the first word of `line` into a command.
///
/// Returns `Ok(None)` for a blank line.
pub(crate) fn parse(line: &str) -> Result<Option<Command>, SessionError>
{
    let Some(word) = line.split_whitespace().next() else {
        return Ok(None);
    };

    Command::ALL
        .iter()
        .find(|(name, _, _)| is_prefix(word, name))
        .map(|(_, command, _)| Some(*command))
        .ok_or_else(|| SessionError::UnknownCommand(word.to_string()))
}

/// Remembers the last non-empty line so an empty line repeats it.
#[derive(Debug, Default)]
pub(crate) struct LineHistory
{
    last: Option<String>,
}

impl LineHistory
{
    /// The line to execute for `input`, or `None` if there is nothing to do.
    pub(crate) fn resolve(&mut self, input: &str) -> Option<String>
    {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return self.last.clone();
        }
        self.last = Some(trimmed.to_string());
        self.last.clone()
    }
}

fn execute<W: Write>(process: &mut Process, command: Command, output: &mut W) -> Result<(), SessionError>
{
    match command {
        Command::Continue => {
            process.resume()?;
            let reason = process.wait_on_signal()?;
            writeln!(output, "Process {} {}", process.pid(), reason)?;
        }
        Command::Help => {
            for (name, _, description) in Command::ALL {
                writeln!(output, "  {name:<10} {description}")?;
            }
        }
    }
    Ok(())
}

/// Run the session until `input` is exhausted.
///
/// ## Errors
///
/// Returns an error only when reading `input` or writing `output` fails.
pub(crate) fn run<R, W>(process: &mut Process, input: R, mut output: W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut history = LineHistory::default();
    let mut lines = input.lines();

    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            // End of input: finish the prompt line
            writeln!(output)?;
            return Ok(());
        };
        let Some(line) = history.resolve(&line?) else {
            continue;
        };

        debug!(%line, "Session command");
        let result = parse(&line).and_then(|command| match command {
            Some(command) => execute(process, command, &mut output),
            None => Ok(()),
        });

        match result {
            Ok(()) => {}
            Err(SessionError::Io(err)) => return Err(err),
            Err(err @ SessionError::UnknownCommand(_)) => eprintln!("{err}"),
            Err(err @ SessionError::Core(_)) => writeln!(output, "{err}")?,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_accepts_any_prefix_of_continue()
    {
        for word in ["c", "co", "cont", "continue"] {
            assert_eq!(parse(word).unwrap(), Some(Command::Continue), "{word}");
        }
    }

    #[test]
    fn test_parse_ignores_extra_arguments_and_whitespace()
    {
        assert_eq!(parse("  cont   now ").unwrap(), Some(Command::Continue));
        assert_eq!(parse("h").unwrap(), Some(Command::Help));
    }

    #[test]
    fn test_parse_blank_line_is_no_command()
    {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_unknown_and_overlong_words()
    {
        let err = parse("step").unwrap_err();
        assert_eq!(err.to_string(), "Unknown command: step");

        // Longer than the command itself is not a prefix
        assert!(matches!(parse("continues"), Err(SessionError::UnknownCommand(_))));
    }

    #[test]
    fn test_history_repeats_last_line_on_empty_input()
    {
        let mut history = LineHistory::default();
        assert_eq!(history.resolve(""), None);
        assert_eq!(history.resolve("cont"), Some("cont".to_string()));
        assert_eq!(history.resolve(""), Some("cont".to_string()));
        assert_eq!(history.resolve("  \t"), Some("cont".to_string()));
        assert_eq!(history.resolve("help"), Some("help".to_string()));
        assert_eq!(history.resolve(""), Some("help".to_string()));
    }
}

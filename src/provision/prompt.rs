// file: src/provision/prompt.rs
// version: 1.1.0
// guid: b85d2f6c-0e4a-4c19-93f7-d1a6e8c2b047

//! Operator interaction during add-server

use crate::{KangarooError, Result};
use std::io::{BufRead, Write};

/// Questions and progress messages for the operator
pub trait Prompter: Send + Sync {
    /// Print a progress line
    fn say(&self, message: &str);

    /// Read one line of input
    fn prompt(&self, label: &str) -> Result<String>;

    /// Read a secret without echo
    fn prompt_password(&self, label: &str) -> Result<String>;

    /// Yes/no question; anything but y/yes is no
    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = self.prompt(&format!("{} [y/N]", question))?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    /// Block until the operator presses ENTER
    fn pause(&self, message: &str) -> Result<()> {
        self.prompt(message).map(|_| ())
    }
}

/// Prompts on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn say(&self, message: &str) {
        println!("{}", message);
    }

    fn prompt(&self, label: &str) -> Result<String> {
        print!("{}: ", label);
        std::io::stdout().flush()?;

        read_answer(&mut std::io::stdin().lock())
    }

    fn prompt_password(&self, label: &str) -> Result<String> {
        Ok(rpassword::prompt_password(format!("{}: ", label))?)
    }
}

/// One trimmed line; end of input is an error so callers never spin on it
fn read_answer<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut input = String::new();
    if reader.read_line(&mut input)? == 0 {
        return Err(KangarooError::validation("no input: standard input is closed"));
    }
    Ok(input.trim().to_string())
}

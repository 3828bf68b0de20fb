//! Argument vector for the replacement program.

use lockdown_common::constants::SHELL_PATH;
use lockdown_common::error::{LockdownError, Result};

/// The program to run after lockdown and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    argv: Vec<String>,
}

impl CommandLine {
    /// Builds the argument vector from command-line words.
    ///
    /// A single word is split with shell quoting rules, so
    /// `"nginx -g 'daemon off;'"` works as one argument. With `shell`, the
    /// command runs as `/bin/sh -c <script>`.
    ///
    /// # Errors
    ///
    /// Returns [`LockdownError::InvalidCommand`] if the command is empty or
    /// has unbalanced quotes.
    pub fn build(words: &[String], shell: bool) -> Result<Self> {
        let argv = if shell {
            let script = match words {
                [single] => single.trim().to_string(),
                _ => shell_words::join(words),
            };
            if script.is_empty() {
                return Err(empty());
            }
            vec![SHELL_PATH.to_string(), "-c".to_string(), script]
        } else {
            match words {
                [single] => shell_words::split(single).map_err(|e| LockdownError::InvalidCommand {
                    message: format!("{e}: {single}"),
                })?,
                _ => words.to_vec(),
            }
        };
        if argv.first().is_none_or(|program| program.is_empty()) {
            return Err(empty());
        }
        Ok(Self { argv })
    }

    /// The program, searched in `PATH` at exec time.
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// The full argument vector, program included.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Consumes the command line, returning the argument vector.
    pub fn into_argv(self) -> Vec<String> {
        self.argv
    }
}

fn empty() -> LockdownError {
    LockdownError::InvalidCommand {
        message: "no command given".into(),
    }
}

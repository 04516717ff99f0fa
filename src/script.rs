//! Command script parsing.
//!
//! A script is either free text, where commands are separated by `;` or
//! newlines and `#` starts a comment line, or an already structured list of
//! commands.

use std::path::Path;

use crate::error::{Error, InputError, Result};

/// Commands to run in order, as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandScript {
    /// Free text, split on `;` and newlines
    Text(String),
    /// One command per entry; entries are not split further
    List(Vec<String>),
}

impl CommandScript {
    /// Read a text script from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        Ok(Self::Text(std::fs::read_to_string(path)?))
    }

    /// Split the script into individual commands.
    ///
    /// Blank entries and `#` comments are dropped from both forms. An empty
    /// script yields no commands; a non-empty one that holds nothing else is
    /// rejected.
    pub fn parse(&self) -> std::result::Result<Vec<String>, InputError> {
        match self {
            CommandScript::Text(text) => {
                if text.trim().is_empty() {
                    return Ok(Vec::new());
                }
                let commands: Vec<String> = text
                    .replace(';', "\n")
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(String::from)
                    .collect();
                if commands.is_empty() {
                    return Err(InputError::NoUsableCommands);
                }
                Ok(commands)
            }
            CommandScript::List(entries) => {
                if entries.is_empty() {
                    return Ok(Vec::new());
                }
                let commands: Vec<String> = entries
                    .iter()
                    .filter(|entry| {
                        let entry = entry.trim();
                        !entry.is_empty() && !entry.starts_with('#')
                    })
                    .cloned()
                    .collect();
                if commands.is_empty() {
                    return Err(InputError::NoUsableCommands);
                }
                Ok(commands)
            }
        }
    }
}

impl From<&str> for CommandScript {
    fn from(text: &str) -> Self {
        CommandScript::Text(text.to_string())
    }
}

impl From<String> for CommandScript {
    fn from(text: String) -> Self {
        CommandScript::Text(text)
    }
}

impl From<Vec<String>> for CommandScript {
    fn from(commands: Vec<String>) -> Self {
        CommandScript::List(commands)
    }
}

impl From<&[&str]> for CommandScript {
    fn from(commands: &[&str]) -> Self {
        CommandScript::List(commands.iter().map(|c| c.to_string()).collect())
    }
}

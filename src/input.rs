use std::path::PathBuf;

use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{config::Config as EditorConfig, Editor};
use rustyline::{Completer, Helper, Highlighter, Hinter};

use crate::lang::exception::Result;
use crate::lang::source::Source;

/// Helper that extends editor
///
/// Currently only implements `Validator` trait to trigger multiline editing when a `\` is seen at
/// the end of a line.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplHelper {}

impl ReplHelper {
    pub fn new() -> Self {
        ReplHelper {}
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if ctx.input().ends_with('\\') {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Remove the multiline escape created by `ReplHelper` so a continued line reads as one statement
pub fn fixup_input(input: &str) -> String {
    input.replace("\\\n", " ")
}

/// Line editor backed source for the interactive prompt
///
/// History is loaded on creation and written back when the source is dropped.
pub struct ConsoleSource {
    editor: Editor<ReplHelper, DefaultHistory>,
    history: Option<PathBuf>,
}

impl ConsoleSource {
    pub fn new(history: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = EditorConfig::builder().auto_add_history(true).build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ReplHelper::new()));

        if let Some(path) = &history {
            if editor.load_history(path).is_err() {
                info!("no history at {}", path.display());
            }
        }

        Ok(ConsoleSource { editor, history })
    }
}

impl Source for ConsoleSource {
    fn next_line(&mut self, prompt: &str) -> Result<Option<String>> {
        loop {
            match self.editor.readline(prompt) {
                Ok(line) => return Ok(Some(fixup_input(&line))),
                Err(ReadlineError::Interrupted) => {
                    eprintln!("Press Ctrl-D or type 'quit' to quit");
                }
                Err(ReadlineError::Eof) => {
                    println!("quit");
                    return Ok(None);
                }
                Err(e) => {
                    error!("Unexpected error: {}", e);
                    println!("quit");
                    return Ok(None);
                }
            }
        }
    }
}

impl Drop for ConsoleSource {
    fn drop(&mut self) {
        if let Some(path) = &self.history {
            if let Err(e) = self.editor.save_history(path) {
                error!("Failed to save history: {}", e);
            }
        }
    }
}

#[test]
fn test_fixup_input() {
    assert_eq!(fixup_input("let x = \\\n5"), "let x =  5");
    assert_eq!(fixup_input("print(1) \\ \nprint(2)"), "print(1) \\ \nprint(2)");
    assert_eq!(fixup_input("1 + 1"), "1 + 1");
}

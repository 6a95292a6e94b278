//! # REPL - Read-Eval-Print Loop
//!
//! The interactive loop of the chwire inspector. Handles:
//!
//! - Reading input with rustyline (history, line editing)
//! - Dispatching dot commands against the current [`Session`]
//! - Printing command output and errors
//!
//! ## Execution Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Read Line                             │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │              Starts with '.'?                             │
//! └──────────────────────────────────────────────────────────┘
//!           │ Yes                          │ No
//!           ▼                              ▼
//! ┌──────────────────┐          ┌──────────────────────────┐
//! │ Execute Command  │          │ Print usage hint         │
//! └──────────────────┘          └──────────────────────────┘
//!           │                              │
//!           ▼                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Print Result                            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Command errors, including failed `.load` decodes, are printed but do not
//! terminate the REPL. Use `.quit` or Ctrl+D to exit.

use std::time::Instant;

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::cli::commands::{summary, CommandHandler, CommandResult};
use crate::cli::history::history_path;
use crate::cli::session::Session;

const PROMPT: &str = "chwire> ";

pub struct Repl {
    session: Session,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(session: Session) -> Result<Self> {
        let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;

        if let Some(history_file) = history_path() {
            let _ = editor.load_history(&history_file);
        }

        Ok(Self { session, editor })
    }

    pub fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    if !self.handle_line(&line) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye");
                    break;
                }
                Err(err) => {
                    eprintln!("Error reading input: {}", err);
                    break;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return true;
        }

        self.editor.add_history_entry(trimmed).ok();

        if !CommandHandler::is_command(trimmed) {
            eprintln!("Commands start with '.'. Enter \".help\" for usage hints.");
            return true;
        }

        let start = Instant::now();
        let keep_going = match CommandHandler::execute(trimmed, &mut self.session) {
            CommandResult::Exit => false,
            CommandResult::Output(text) => {
                println!("{}", text);
                true
            }
            CommandResult::Continue => true,
            CommandResult::Error(msg) => {
                eprintln!("Error: {}", msg);
                true
            }
        };
        if trimmed.to_lowercase().starts_with(".load") {
            println!("({:.3} sec)", start.elapsed().as_secs_f64());
        }
        keep_going
    }

    fn print_welcome(&self) {
        println!("chwire version {}", env!("CARGO_PKG_VERSION"));
        println!("Enter \".help\" for usage hints.");
        match (self.session.body(), self.session.result()) {
            (Some(body), Some(result)) => {
                println!("Loaded: {}", body.path.display());
                println!("{}", summary(result));
            }
            _ => println!("No body loaded. Use .load FILE [FORMAT]."),
        }
        println!();
    }

    fn save_history(&mut self) {
        if let Some(history_file) = history_path() {
            if let Err(e) = self.editor.save_history(&history_file) {
                eprintln!("Warning: could not save history: {}", e);
            }
        }
    }
}

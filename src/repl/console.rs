//! Line-oriented REPL loop (spec.md §6).
//!
//! The teacher's console drives a raw-mode terminal with a multi-line edit
//! buffer, a prompt cursor, and a status bar — all in service of a
//! multi-statement, semicolon-terminated SQL dialect. This shell has none
//! of that: one command per line, no raw mode, just `stdin`/`stdout`. What
//! carries over is the coloring convention (`echo_error` in red via
//! `crossterm`) and the overall open/loop/close shape of `start()`.

use std::io::{self, BufRead, Write};

use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

use crate::command;
use crate::error::Result;
use crate::session::{Outcome, Session};

const PROMPT: &str = "shelfdb> ";

pub fn run(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "{}", PROMPT)?;
        stdout.flush()?;

        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            // EOF (e.g. piped input or Ctrl-D): behave like `.exit`.
            session.close()?;
            return Ok(());
        }

        if line.trim().is_empty() {
            continue;
        }

        match command::parse_line(&line) {
            Ok(statement) => match session.execute(statement) {
                Ok(Outcome::Rows(rows)) => {
                    for row in rows {
                        println!("{}", row);
                    }
                }
                Ok(Outcome::AffectedRows(_)) => {}
                Ok(Outcome::Message(msg)) => println!("{}", msg),
                Ok(Outcome::Exit) => {
                    println!("Bye.");
                    return Ok(());
                }
                Err(err) if err.is_fatal() => {
                    echo_error(&mut stdout, &format!("Error: {}.", err.class()))?;
                    tracing::error!("{}", err);
                    return Err(err);
                }
                Err(err) => {
                    echo_error(&mut stdout, &format!("Error: {}.", err.class()))?;
                }
            },
            Err(err) => {
                echo_error(&mut stdout, &format!("Error: {}.", err.class()))?;
            }
        }
    }
}

fn echo_error(stdout: &mut io::Stdout, message: &str) -> Result<()> {
    execute!(
        stdout,
        SetForegroundColor(Color::Red),
        Print(message),
        ResetColor,
        Print("\n"),
    )?;
    Ok(())
}

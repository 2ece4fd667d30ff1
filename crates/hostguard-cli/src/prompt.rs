//! Terminal implementations of the operator-facing traits.
//!
//! Both mark their blocking reads on the shared [`Interrupt`] so Ctrl+C at a
//! prompt ends the run instead of waiting for Enter.

use hostguard_core::escalation::Confirm;
use hostguard_core::interrupt::Interrupt;
use hostguard_core::orchestrator::ParameterSource;
use std::io::{BufRead, Write};

/// Reads one line from stdin. `None` on EOF or a read error.
fn read_line() -> Option<String> {
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// Asks recoverable-error questions on the terminal.
///
/// With `assume_yes` every question is answered yes without reading stdin.
/// A closed stdin counts as no.
pub struct TerminalConfirm {
    assume_yes: bool,
    interrupt: Interrupt,
}

impl TerminalConfirm {
    pub fn new(assume_yes: bool, interrupt: Interrupt) -> Self {
        Self {
            assume_yes,
            interrupt,
        }
    }
}

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, question: &str) -> bool {
        if self.interrupt.is_raised() {
            return false;
        }
        if self.assume_yes {
            eprintln!("{question} [y/N] y (--yes)");
            return true;
        }
        eprint!("{question} [y/N] ");
        let _ = std::io::stderr().flush();
        let answer = self.interrupt.while_waiting(read_line);
        matches!(
            answer.as_deref().map(str::trim),
            Some("y") | Some("Y") | Some("yes") | Some("YES")
        )
    }
}

/// Collects run parameters interactively.
pub struct TerminalPrompt {
    interrupt: Interrupt,
}

impl TerminalPrompt {
    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }
}

impl ParameterSource for TerminalPrompt {
    fn ask(&mut self, question: &str, secret: bool) -> Option<String> {
        if self.interrupt.is_raised() {
            return None;
        }
        if secret {
            eprint!("{question} (input is visible): ");
        } else {
            eprint!("{question}: ");
        }
        let _ = std::io::stderr().flush();
        self.interrupt.while_waiting(read_line)
    }
}

//! Two-tier escalation: fatal aborts, recoverable asks the operator.
//!
//! The controller owns the decision; the question itself is delegated to an
//! injected [`Confirm`] provider so the policy runs without a terminal.

use crate::outcome::{Outcome, Severity};
use crate::runlog::RunLog;
use serde::Serialize;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    Abort,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Continue => f.write_str("continue"),
            Decision::Abort => f.write_str("abort"),
        }
    }
}

/// Asks the operator a yes/no question. Blocks until answered.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Accepts every recoverable error (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _question: &str) -> bool {
        true
    }
}

/// Declines every recoverable error (non-interactive runs).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&mut self, _question: &str) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct EscalationController<C: Confirm> {
    confirm: C,
    log: RunLog,
}

impl<C: Confirm> EscalationController<C> {
    pub fn new(confirm: C, log: RunLog) -> Self {
        Self { confirm, log }
    }

    pub fn resolve(&mut self, outcome: &Outcome) -> Decision {
        self.resolve_stage("run", outcome)
    }

    /// Resolve `outcome` produced by `stage`, recording both in the run log.
    pub fn resolve_stage(&mut self, stage: &str, outcome: &Outcome) -> Decision {
        self.log.record(stage, outcome);
        match outcome.status {
            Severity::Ok => Decision::Continue,
            Severity::FatalError => {
                error!(stage, message = %outcome.message, "fatal error, aborting");
                self.log.note(stage, "decision: abort (fatal)");
                Decision::Abort
            }
            Severity::RecoverableError => {
                let question = question_for(stage, outcome);
                let accepted = self.confirm.confirm(&question);
                let decision = if accepted {
                    Decision::Continue
                } else {
                    Decision::Abort
                };
                if accepted {
                    warn!(stage, message = %outcome.message, "operator chose to continue");
                } else {
                    info!(stage, message = %outcome.message, "operator declined to continue");
                }
                self.log.note(stage, &format!("decision: {decision} (operator)"));
                decision
            }
        }
    }

    pub fn into_inner(self) -> C {
        self.confirm
    }
}

fn question_for(stage: &str, outcome: &Outcome) -> String {
    let mut q = format!("{stage}: {}", outcome.message);
    if let Some(hint) = outcome.remediation_hint.as_deref().filter(|h| !h.is_empty()) {
        q.push_str(&format!("\n  hint: {hint}"));
    }
    q.push_str("\nContinue anyway?");
    q
}

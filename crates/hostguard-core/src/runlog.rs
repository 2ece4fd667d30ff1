//! Append-only run log. Every outcome and escalation decision lands here,
//! regardless of severity.

use crate::io;
use crate::outcome::Outcome;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct RunLog {
    path: Option<PathBuf>,
}

impl RunLog {
    pub fn open(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    /// A log that drops everything (used by one-shot commands and tests).
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, stage: &str, outcome: &Outcome) {
        let mut line = format!("[{stage}] {}: {}", outcome.status, outcome.message);
        if let Some(hint) = &outcome.remediation_hint {
            line.push_str(&format!(" | hint: {hint}"));
        }
        self.write(&line);
    }

    pub fn note(&self, stage: &str, text: &str) {
        self.write(&format!("[{stage}] {text}"));
    }

    fn write(&self, line: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let stamped = format!("{} {line}\n", Utc::now().to_rfc3339());
        // A broken log must never stop the run; the event still reaches tracing.
        if let Err(e) = io::append_text(path, &stamped) {
            warn!(path = %path.display(), error = %e, "run log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn records_outcomes_with_hint() {
        let dir = TempDir::new().unwrap();
        let log = RunLog::open(&dir.path().join("logs/run.log"));
        log.record("ssh", &Outcome::ok("Port set"));
        log.record("firewall", &Outcome::recoverable("ufw allow failed", "run ufw status"));
        let text = std::fs::read_to_string(log.path().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[ssh] ok: Port set"));
        assert!(lines[1].contains("recoverable_error: ufw allow failed | hint: run ufw status"));
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = RunLog::disabled();
        log.note("x", "y");
        assert!(log.path().is_none());
    }
}

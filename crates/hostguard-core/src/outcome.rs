//! Result of every mutating or validating step.
//!
//! Outcomes carry a severity instead of a Rust error so the escalation policy
//! can be applied uniformly: the orchestrator never inspects component state,
//! only the Outcome each step hands back.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    RecoverableError,
    FatalError,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Ok => "ok",
            Severity::RecoverableError => "recoverable_error",
            Severity::FatalError => "fatal_error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_hint: Option<String>,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Severity::Ok,
            message: message.into(),
            remediation_hint: None,
        }
    }

    pub fn recoverable(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            status: Severity::RecoverableError,
            message: message.into(),
            remediation_hint: Some(hint.into()),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            status: Severity::FatalError,
            message: message.into(),
            remediation_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.remediation_hint = Some(hint.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Severity::Ok
    }

    pub fn is_fatal(&self) -> bool {
        self.status == Severity::FatalError
    }

    /// Keep the more severe of two outcomes; on a tie the first one wins.
    pub fn worst(self, other: Outcome) -> Outcome {
        if rank(other.status) > rank(self.status) {
            other
        } else {
            self
        }
    }
}

fn rank(s: Severity) -> u8 {
    match s {
        Severity::Ok => 0,
        Severity::RecoverableError => 1,
        Severity::FatalError => 2,
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)?;
        if let Some(hint) = &self.remediation_hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_prefers_higher_severity() {
        let a = Outcome::ok("fine");
        let b = Outcome::recoverable("rule failed", "retry ufw");
        assert_eq!(a.clone().worst(b.clone()), b);
        assert_eq!(b.clone().worst(a), b);
        let c = Outcome::fatal("no write");
        assert!(b.worst(c).is_fatal());
    }

    #[test]
    fn display_includes_hint() {
        let o = Outcome::recoverable("sshd -t failed", "inspect /etc/ssh/sshd_config.backup.x");
        let s = o.to_string();
        assert!(s.starts_with("[recoverable_error] sshd -t failed"));
        assert!(s.contains("hint: inspect"));
    }

    #[test]
    fn severity_serializes_snake_case() {
        let json = serde_json::to_string(&Severity::FatalError).unwrap();
        assert_eq!(json, "\"fatal_error\"");
    }
}

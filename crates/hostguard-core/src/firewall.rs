//! Firewall rule set and its ordered application.
//!
//! Order is fixed: reset → default policies → allow rules (SSH first) →
//! enable. Enabling is refused unless the SSH rule for the configured port
//! was applied, so a run can never lock the operator out.

use crate::error::Result;
use crate::outcome::Outcome;
use serde::{Deserialize, Serialize};
use tracing::info;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Incoming => f.write_str("incoming"),
            Direction::Outgoing => f.write_str("outgoing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Allow,
    Deny,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Allow => f.write_str("allow"),
            Policy::Deny => f.write_str("deny"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub port: u16,
    pub protocol: Protocol,
    #[serde(default)]
    pub comment: String,
}

impl Rule {
    pub fn tcp(port: u16, comment: impl Into<String>) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
            comment: comment.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub ssh_port: u16,
    pub incoming: Policy,
    pub outgoing: Policy,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Deny-incoming / allow-outgoing set whose first rule admits SSH.
    pub fn for_ssh(ssh_port: u16) -> Self {
        Self {
            ssh_port,
            incoming: Policy::Deny,
            outgoing: Policy::Allow,
            rules: vec![Rule::tcp(ssh_port, "SSH")],
        }
    }

    /// Append a rule unless the same port/protocol is already allowed.
    pub fn allow(mut self, rule: Rule) -> Self {
        let dup = self
            .rules
            .iter()
            .any(|r| r.port == rule.port && r.protocol == rule.protocol);
        if !dup {
            self.rules.push(rule);
        }
        self
    }

    pub fn has_ssh_rule(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.port == self.ssh_port && r.protocol == Protocol::Tcp)
    }

    /// Rules in application order: the SSH rule always goes first.
    pub fn ordered(&self) -> Vec<&Rule> {
        let (ssh, rest): (Vec<&Rule>, Vec<&Rule>) = self
            .rules
            .iter()
            .partition(|r| r.port == self.ssh_port && r.protocol == Protocol::Tcp);
        ssh.into_iter().chain(rest).collect()
    }
}

// ---------------------------------------------------------------------------
// Tool interface
// ---------------------------------------------------------------------------

pub trait FirewallTool {
    fn reset(&mut self) -> Result<()>;
    fn set_default_policy(&mut self, direction: Direction, policy: Policy) -> Result<()>;
    fn allow(&mut self, rule: &Rule) -> Result<()>;
    fn enable(&mut self) -> Result<()>;
    fn status(&mut self) -> Result<String>;
}

/// Push `set` through `tool` in the fixed order.
pub fn apply(set: &RuleSet, tool: &mut dyn FirewallTool) -> Outcome {
    if !set.has_ssh_rule() {
        return Outcome::fatal(format!(
            "rule set has no allow rule for SSH port {}; refusing to enable the firewall",
            set.ssh_port
        ));
    }

    if let Err(e) = tool.reset() {
        return Outcome::recoverable(
            format!("firewall reset failed: {e}"),
            "the firewall is unchanged; check `ufw status` and re-run",
        );
    }
    for (direction, policy) in [
        (Direction::Incoming, set.incoming),
        (Direction::Outgoing, set.outgoing),
    ] {
        if let Err(e) = tool.set_default_policy(direction, policy) {
            return Outcome::recoverable(
                format!("setting default {direction} policy to {policy} failed: {e}"),
                "the firewall was reset but not enabled",
            );
        }
    }

    let mut ssh_applied = false;
    let mut failed = Vec::new();
    for rule in set.ordered() {
        match tool.allow(rule) {
            Ok(()) => {
                if rule.port == set.ssh_port && rule.protocol == Protocol::Tcp {
                    ssh_applied = true;
                }
                info!(port = rule.port, protocol = %rule.protocol, comment = %rule.comment, "allow rule added");
            }
            Err(e) => failed.push(format!("{}/{}: {e}", rule.port, rule.protocol)),
        }
    }
    if !ssh_applied {
        return Outcome::recoverable(
            format!("SSH rule for port {} could not be added", set.ssh_port),
            "firewall left disabled to avoid locking you out",
        );
    }

    if let Err(e) = tool.enable() {
        return Outcome::recoverable(
            format!("enabling the firewall failed: {e}"),
            "rules are staged; run `ufw enable` once the cause is fixed",
        );
    }

    if failed.is_empty() {
        Outcome::ok(format!(
            "firewall enabled with {} allow rule(s)",
            set.rules.len()
        ))
    } else {
        Outcome::recoverable(
            format!("firewall enabled but some rules failed: {}", failed.join("; ")),
            "add the missing rules by hand with `ufw allow`",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostguardError;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_on: Option<String>,
    }

    impl Recorder {
        fn step(&mut self, call: String) -> Result<()> {
            let fail = self.fail_on.as_deref() == Some(call.as_str());
            self.calls.push(call.clone());
            if fail {
                return Err(HostguardError::CommandFailed {
                    program: "ufw".into(),
                    code: Some(1),
                    stderr: call,
                });
            }
            Ok(())
        }
    }

    impl FirewallTool for Recorder {
        fn reset(&mut self) -> Result<()> {
            self.step("reset".into())
        }
        fn set_default_policy(&mut self, d: Direction, p: Policy) -> Result<()> {
            self.step(format!("default {p} {d}"))
        }
        fn allow(&mut self, r: &Rule) -> Result<()> {
            self.step(format!("allow {}/{}", r.port, r.protocol))
        }
        fn enable(&mut self) -> Result<()> {
            self.step("enable".into())
        }
        fn status(&mut self) -> Result<String> {
            Ok("Status: active".into())
        }
    }

    fn web_set() -> RuleSet {
        RuleSet {
            ssh_port: 2222,
            incoming: Policy::Deny,
            outgoing: Policy::Allow,
            rules: vec![Rule::tcp(80, "HTTP"), Rule::tcp(2222, "SSH")],
        }
    }

    #[test]
    fn applies_in_fixed_order_with_ssh_first() {
        let mut t = Recorder::default();
        let o = apply(&web_set(), &mut t);
        assert!(o.is_ok(), "{o}");
        assert_eq!(
            t.calls,
            vec![
                "reset",
                "default deny incoming",
                "default allow outgoing",
                "allow 2222/tcp",
                "allow 80/tcp",
                "enable"
            ]
        );
    }

    #[test]
    fn missing_ssh_rule_never_enables() {
        let mut set = web_set();
        set.rules.retain(|r| r.port != 2222);
        let mut t = Recorder::default();
        assert!(apply(&set, &mut t).is_fatal());
        assert!(t.calls.is_empty());
    }

    #[test]
    fn failed_ssh_rule_leaves_firewall_disabled() {
        let mut t = Recorder {
            fail_on: Some("allow 2222/tcp".into()),
            ..Default::default()
        };
        let o = apply(&web_set(), &mut t);
        assert_eq!(o.status, crate::outcome::Severity::RecoverableError);
        assert!(!t.calls.contains(&"enable".to_string()));
    }

    #[test]
    fn failed_extra_rule_is_recoverable_but_enabled() {
        let mut t = Recorder {
            fail_on: Some("allow 80/tcp".into()),
            ..Default::default()
        };
        let o = apply(&web_set(), &mut t);
        assert_eq!(o.status, crate::outcome::Severity::RecoverableError);
        assert_eq!(t.calls.last().unwrap(), "enable");
    }

    #[test]
    fn allow_skips_duplicates() {
        let set = RuleSet::for_ssh(2222)
            .allow(Rule::tcp(2222, "dup"))
            .allow(Rule::tcp(443, "HTTPS"));
        assert_eq!(set.rules.len(), 2);
        assert!(set.has_ssh_rule());
    }
}

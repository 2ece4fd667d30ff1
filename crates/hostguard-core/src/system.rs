//! System collaborators: thin wrappers over the host's tools.
//!
//! Everything goes through a [`CommandRunner`] so passes can be exercised
//! with a scripted runner instead of a real host.
//!
//! # Tools
//! - `apt-get`: package manager
//! - `systemctl`: service manager
//! - `sshd -t`: sshd_config syntax check
//! - `ufw`: firewall
//! - `useradd`, `chpasswd`, `usermod`: accounts
//! - proxy binary (`xray`): UUID / x25519 generation and config test

use crate::error::{HostguardError, Result};
use crate::firewall::{Direction, FirewallTool, Policy, Rule};
use crate::material::KeyGenerator;
use crate::outcome::Outcome;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait CommandRunner {
    /// Run `program` to completion. A non-zero exit is not an error here.
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput>;

    /// Whether `program` can be found on PATH.
    fn exists(&self, program: &str) -> bool;
}

/// Runs real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let binary = which::which(program)
            .map_err(|_| HostguardError::CommandNotFound(program.to_string()))?;
        debug!(program, ?args, "running");

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|e| HostguardError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())
                    .map_err(|e| HostguardError::SpawnFailed {
                        program: program.to_string(),
                        reason: format!("failed to write stdin: {e}"),
                    })?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| HostguardError::SpawnFailed {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Run and require a zero exit, returning stdout.
fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    stdin: Option<&str>,
) -> Result<String> {
    let out = runner.run(program, args, stdin)?;
    if !out.success() {
        let detail = if out.stderr.trim().is_empty() {
            out.stdout.trim().chars().take(500).collect()
        } else {
            out.stderr.trim().chars().take(500).collect()
        };
        return Err(HostguardError::CommandFailed {
            program: program.to_string(),
            code: out.code,
            stderr: detail,
        });
    }
    Ok(out.stdout)
}

/// True when the effective user is root (`id -u` prints 0).
pub fn is_root(runner: &dyn CommandRunner) -> bool {
    run_checked(runner, "id", &["-u"], None)
        .map(|uid| uid.trim() == "0")
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Package manager
// ---------------------------------------------------------------------------

pub trait PackageManager {
    fn update(&mut self) -> Result<()>;
    fn install(&mut self, names: &[String]) -> Result<()>;
}

pub struct Apt {
    runner: Arc<dyn CommandRunner>,
}

impl Apt {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl PackageManager for Apt {
    fn update(&mut self) -> Result<()> {
        run_checked(
            self.runner.as_ref(),
            "env",
            &["DEBIAN_FRONTEND=noninteractive", "apt-get", "update", "-y"],
            None,
        )
        .map(|_| ())
    }

    fn install(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y"];
        args.extend(names.iter().map(String::as_str));
        run_checked(self.runner.as_ref(), "env", &args, None).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Service manager
// ---------------------------------------------------------------------------

pub trait ServiceManager {
    fn restart(&mut self, name: &str) -> Result<()>;
    fn is_active(&mut self, name: &str) -> bool;
}

pub struct Systemctl {
    runner: Arc<dyn CommandRunner>,
}

impl Systemctl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl ServiceManager for Systemctl {
    fn restart(&mut self, name: &str) -> Result<()> {
        run_checked(self.runner.as_ref(), "systemctl", &["restart", name], None).map(|_| ())
    }

    fn is_active(&mut self, name: &str) -> bool {
        self.runner
            .run("systemctl", &["is-active", "--quiet", name], None)
            .map(|o| o.success())
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait AccountManager {
    fn user_exists(&mut self, name: &str) -> bool;
    fn create_user(&mut self, name: &str) -> Result<()>;
    fn set_password(&mut self, name: &str, password: &str) -> Result<()>;
    fn grant_sudo(&mut self, name: &str) -> Result<()>;
}

pub struct ShadowAccounts {
    runner: Arc<dyn CommandRunner>,
}

impl ShadowAccounts {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl AccountManager for ShadowAccounts {
    fn user_exists(&mut self, name: &str) -> bool {
        self.runner
            .run("id", &["-u", name], None)
            .map(|o| o.success())
            .unwrap_or(false)
    }

    fn create_user(&mut self, name: &str) -> Result<()> {
        run_checked(
            self.runner.as_ref(),
            "useradd",
            &["-m", "-s", "/bin/bash", name],
            None,
        )
        .map(|_| ())
    }

    fn set_password(&mut self, name: &str, password: &str) -> Result<()> {
        if password.chars().any(char::is_control) {
            return Err(HostguardError::PasswordControlChar);
        }
        let line = format!("{name}:{password}\n");
        run_checked(self.runner.as_ref(), "chpasswd", &[], Some(&line)).map(|_| ())
    }

    fn grant_sudo(&mut self, name: &str) -> Result<()> {
        run_checked(self.runner.as_ref(), "usermod", &["-aG", "sudo", name], None).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Firewall (ufw)
// ---------------------------------------------------------------------------

pub struct Ufw {
    runner: Arc<dyn CommandRunner>,
}

impl Ufw {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl FirewallTool for Ufw {
    fn reset(&mut self) -> Result<()> {
        run_checked(self.runner.as_ref(), "ufw", &["--force", "reset"], None).map(|_| ())
    }

    fn set_default_policy(&mut self, direction: Direction, policy: Policy) -> Result<()> {
        let policy = policy.to_string();
        let direction = direction.to_string();
        run_checked(
            self.runner.as_ref(),
            "ufw",
            &["default", &policy, &direction],
            None,
        )
        .map(|_| ())
    }

    fn allow(&mut self, rule: &Rule) -> Result<()> {
        let target = format!("{}/{}", rule.port, rule.protocol);
        let mut args = vec!["allow", target.as_str()];
        if !rule.comment.is_empty() {
            args.push("comment");
            args.push(rule.comment.as_str());
        }
        run_checked(self.runner.as_ref(), "ufw", &args, None).map(|_| ())
    }

    fn enable(&mut self) -> Result<()> {
        run_checked(self.runner.as_ref(), "ufw", &["--force", "enable"], None).map(|_| ())
    }

    fn status(&mut self) -> Result<String> {
        run_checked(self.runner.as_ref(), "ufw", &["status", "verbose"], None)
    }
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Checks a rewritten file before it is allowed to stay in place.
pub trait Validator {
    fn check(&mut self, path: &Path) -> Outcome;
}

/// `sshd -t -f <path>`.
pub struct SshdCheck {
    runner: Arc<dyn CommandRunner>,
}

impl SshdCheck {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Validator for SshdCheck {
    fn check(&mut self, path: &Path) -> Outcome {
        let path_str = path.display().to_string();
        match run_checked(self.runner.as_ref(), "sshd", &["-t", "-f", &path_str], None) {
            Ok(_) => Outcome::ok(format!("{path_str} passed sshd -t")),
            Err(e) => Outcome::recoverable(
                format!("sshd rejected {path_str}: {e}"),
                "run `sshd -t` to see the offending line",
            ),
        }
    }
}

/// `<program> run -test -c <path>` for the proxy server config.
pub struct ProxyConfigCheck {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl ProxyConfigCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl Validator for ProxyConfigCheck {
    fn check(&mut self, path: &Path) -> Outcome {
        let path_str = path.display().to_string();
        match run_checked(
            self.runner.as_ref(),
            &self.program,
            &["run", "-test", "-c", &path_str],
            None,
        ) {
            Ok(_) => Outcome::ok(format!("{path_str} accepted by {}", self.program)),
            Err(e) => Outcome::recoverable(
                format!("{} rejected {path_str}: {e}", self.program),
                format!("run `{} run -test -c {path_str}` for details", self.program),
            ),
        }
    }
}

/// Runs an arbitrary shell command; the file path is exported as `$1`.
pub struct ShellCheck {
    runner: Arc<dyn CommandRunner>,
    command: String,
}

impl ShellCheck {
    pub fn new(runner: Arc<dyn CommandRunner>, command: impl Into<String>) -> Self {
        Self {
            runner,
            command: command.into(),
        }
    }
}

impl Validator for ShellCheck {
    fn check(&mut self, path: &Path) -> Outcome {
        let path_str = path.display().to_string();
        match run_checked(
            self.runner.as_ref(),
            "sh",
            &["-c", &self.command, "hostguard-validate", &path_str],
            None,
        ) {
            Ok(_) => Outcome::ok(format!("`{}` accepted {path_str}", self.command)),
            Err(e) => Outcome::recoverable(
                format!("`{}` rejected {path_str}: {e}", self.command),
                "fix the validator error and re-run",
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Key generator binary
// ---------------------------------------------------------------------------

/// The proxy binary's `uuid` and `x25519` subcommands.
pub struct BinaryKeyGenerator {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl BinaryKeyGenerator {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl KeyGenerator for BinaryKeyGenerator {
    fn uuid(&mut self) -> Result<String> {
        run_checked(self.runner.as_ref(), &self.program, &["uuid"], None)
    }

    fn keypair(&mut self) -> Result<String> {
        run_checked(self.runner.as_ref(), &self.program, &["x25519"], None)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner shared by the system and orchestrator tests.
    use super::*;
    use std::cell::RefCell;

    /// Records every call and answers from a table keyed by the joined command line.
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub calls: RefCell<Vec<String>>,
        pub replies: RefCell<Vec<(String, CommandOutput)>>,
        pub missing: Vec<String>,
    }

    impl ScriptedRunner {
        pub fn reply(&self, prefix: &str, code: i32, stdout: &str) {
            self.replies.borrow_mut().push((
                prefix.to_string(),
                CommandOutput {
                    code: Some(code),
                    stdout: stdout.to_string(),
                    stderr: if code == 0 { String::new() } else { "failed".into() },
                },
            ));
        }

        pub fn called(&self, prefix: &str) -> bool {
            self.calls.borrow().iter().any(|c| c.starts_with(prefix))
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            let mut recorded = line.clone();
            if let Some(s) = stdin {
                recorded.push_str(&format!(" <<< {}", s.trim_end()));
            }
            self.calls.borrow_mut().push(recorded);
            if self.missing.iter().any(|m| m == program) {
                return Err(HostguardError::CommandNotFound(program.to_string()));
            }
            // Most specific prefix wins.
            let replies = self.replies.borrow();
            let best = replies
                .iter()
                .filter(|(p, _)| line.starts_with(p.as_str()))
                .max_by_key(|(p, _)| p.len());
            Ok(best.map(|(_, o)| o.clone()).unwrap_or(CommandOutput {
                code: Some(0),
                ..Default::default()
            }))
        }

        fn exists(&self, program: &str) -> bool {
            !self.missing.iter().any(|m| m == program)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;

    #[test]
    fn ufw_commands_are_formed_correctly() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut ufw = Ufw::new(runner.clone());
        ufw.reset().unwrap();
        ufw.set_default_policy(Direction::Incoming, Policy::Deny).unwrap();
        ufw.allow(&Rule::tcp(2222, "SSH")).unwrap();
        ufw.enable().unwrap();
        assert_eq!(
            *runner.calls.borrow(),
            vec![
                "ufw --force reset",
                "ufw default deny incoming",
                "ufw allow 2222/tcp comment SSH",
                "ufw --force enable"
            ]
        );
    }

    #[test]
    fn nonzero_exit_becomes_error() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.reply("systemctl restart", 1, "");
        let mut sc = Systemctl::new(runner.clone());
        assert!(matches!(
            sc.restart("ssh"),
            Err(HostguardError::CommandFailed { code: Some(1), .. })
        ));
    }

    #[test]
    fn chpasswd_gets_password_on_stdin() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut acc = ShadowAccounts::new(runner.clone());
        acc.set_password("deploy", "s3cretpass").unwrap();
        assert_eq!(runner.calls.borrow()[0], "chpasswd <<< deploy:s3cretpass");
    }

    #[test]
    fn chpasswd_never_sees_a_multiline_password() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut acc = ShadowAccounts::new(runner.clone());
        assert!(matches!(
            acc.set_password("deploy", "longenough\nroot:x"),
            Err(HostguardError::PasswordControlChar)
        ));
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn apt_install_is_noninteractive() {
        let runner = Arc::new(ScriptedRunner::default());
        let mut apt = Apt::new(runner.clone());
        apt.install(&["ufw".to_string(), "curl".to_string()]).unwrap();
        assert_eq!(
            runner.calls.borrow()[0],
            "env DEBIAN_FRONTEND=noninteractive apt-get install -y ufw curl"
        );
    }

    #[test]
    fn root_detection() {
        let runner = ScriptedRunner::default();
        runner.reply("id -u", 0, "0\n");
        assert!(is_root(&runner));
        let runner = ScriptedRunner::default();
        runner.reply("id -u", 0, "1000\n");
        assert!(!is_root(&runner));
    }

    #[test]
    fn sshd_check_failure_is_recoverable() {
        let runner = ScriptedRunner::default();
        runner.reply("sshd -t", 255, "");
        let runner = Arc::new(runner);
        let o = SshdCheck::new(runner).check(Path::new("/etc/ssh/sshd_config"));
        assert_eq!(o.status, crate::outcome::Severity::RecoverableError);
    }

    #[test]
    fn key_generator_uses_subcommands() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.reply("xray uuid", 0, "0f8fad5b-d9cb-469f-a165-70867728950e\n");
        runner.reply("xray x25519", 0, "Private key: a\nPublic key: b\n");
        let mut g = BinaryKeyGenerator::new(runner.clone(), "xray");
        let m = crate::material::resolve(&mut g).unwrap();
        assert_eq!(m.public_key, "b");
    }
}

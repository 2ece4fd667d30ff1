//! Provisioning run: sequences the hardening passes and owns the run status.
//!
//! Each pass returns one [`Outcome`]; the escalation controller turns it into
//! continue/abort. An abort stops the run with completed passes left in
//! effect. Rollback only exists inside a pass, via the guard.
//!
//! Operator parameters are collected by their own pass, after the dependency
//! and system checks, so a host that cannot be hardened never prompts.

use crate::config::{HostguardConfig, RunConfig, WarnLevel};
use crate::directive::{Directive, DirectiveStore};
use crate::error::{HostguardError, Result};
use crate::escalation::{Confirm, Decision, EscalationController};
use crate::firewall::{self, FirewallTool, Protocol, Rule, RuleSet};
use crate::guard;
use crate::interrupt::Interrupt;
use crate::material::{self, KeyGenerator};
use crate::outcome::Outcome;
use crate::params;
use crate::profile::{self, ConnectionProfile, ProfileFiles};
use crate::runlog::RunLog;
use crate::system::{
    AccountManager, Apt, BinaryKeyGenerator, CommandRunner, PackageManager, ProxyConfigCheck,
    ServiceManager, ShadowAccounts, SshdCheck, Systemctl, SystemRunner, Ufw, Validator,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Tools every run needs; a missing one is fatal.
const REQUIRED_TOOLS: &[&str] = &["systemctl", "sshd", "useradd", "chpasswd", "usermod", "apt-get"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Dependencies,
    SystemChecks,
    Parameters,
    Packages,
    Account,
    Ssh,
    Firewall,
    Keys,
}

impl Pass {
    pub const ALL: [Pass; 8] = [
        Pass::Dependencies,
        Pass::SystemChecks,
        Pass::Parameters,
        Pass::Packages,
        Pass::Account,
        Pass::Ssh,
        Pass::Firewall,
        Pass::Keys,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::Dependencies => "dependencies",
            Pass::SystemChecks => "system_checks",
            Pass::Parameters => "parameters",
            Pass::Packages => "packages",
            Pass::Account => "account",
            Pass::Ssh => "ssh",
            Pass::Firewall => "firewall",
            Pass::Keys => "keys",
        }
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_packages: bool,
    pub skip_firewall: bool,
    pub skip_keys: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass: Pass,
    pub outcome: Outcome,
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted,
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub passes: Vec<PassReport>,
    /// Unset when the run stopped before parameters were collected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Only set when hostguard generated the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileArtifacts>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// External tools the passes drive.
pub struct Collaborators {
    pub runner: Arc<dyn CommandRunner>,
    pub packages: Box<dyn PackageManager>,
    pub services: Box<dyn ServiceManager>,
    pub accounts: Box<dyn AccountManager>,
    pub firewall: Box<dyn FirewallTool>,
    pub keys: Box<dyn KeyGenerator>,
    pub sshd_check: Box<dyn Validator>,
    pub proxy_check: Box<dyn Validator>,
}

impl Collaborators {
    /// Collaborators backed by `runner` (usually [`SystemRunner`]).
    pub fn with_runner(runner: Arc<dyn CommandRunner>, config: &HostguardConfig) -> Self {
        Self {
            packages: Box::new(Apt::new(runner.clone())),
            services: Box::new(Systemctl::new(runner.clone())),
            accounts: Box::new(ShadowAccounts::new(runner.clone())),
            firewall: Box::new(Ufw::new(runner.clone())),
            keys: Box::new(BinaryKeyGenerator::new(
                runner.clone(),
                config.proxy.generator.clone(),
            )),
            sshd_check: Box::new(SshdCheck::new(runner.clone())),
            proxy_check: Box::new(ProxyConfigCheck::new(
                runner.clone(),
                config.proxy.generator.clone(),
            )),
            runner,
        }
    }

    pub fn system(config: &HostguardConfig) -> Self {
        Self::with_runner(Arc::new(SystemRunner), config)
    }
}

// ---------------------------------------------------------------------------
// Parameter collection
// ---------------------------------------------------------------------------

/// Where operator parameters come from when not preset on the command line.
pub trait ParameterSource {
    /// Ask for a value. `None` means the operator gave nothing.
    fn ask(&mut self, question: &str, secret: bool) -> Option<String>;
}

/// Never answers; only presets are used.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl ParameterSource for Unattended {
    fn ask(&mut self, _question: &str, _secret: bool) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct Presets {
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<String>,
}

const MAX_ATTEMPTS: usize = 3;

/// Build the immutable [`RunConfig`], asking `source` for anything missing
/// and re-asking (up to three times) on invalid input.
///
/// `current_ssh_port` is exempt from the in-use check since sshd holds it.
pub fn collect_run_config(
    presets: &Presets,
    source: &mut dyn ParameterSource,
    current_ssh_port: u16,
) -> Result<RunConfig> {
    let username = ask_valid(presets.username.clone(), source, "Username", false, |u| {
        params::validate_username(u.trim())
    })?;

    let password = match presets.password.clone() {
        Some(p) => {
            params::validate_password(&p)?;
            Some(p)
        }
        None => {
            let mut last_err = None;
            let mut chosen = None;
            for _ in 0..MAX_ATTEMPTS {
                match source.ask("Password (empty to generate)", true) {
                    None => break,
                    Some(p) if p.is_empty() => break,
                    Some(p) => match params::validate_password(&p) {
                        Ok(()) => {
                            chosen = Some(p);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    },
                }
            }
            match (chosen, last_err) {
                (Some(p), _) => Some(p),
                (None, Some(e)) => return Err(e),
                (None, None) => None,
            }
        }
    };

    let port = ask_valid(presets.port.clone(), source, "SSH port", false, |p| {
        let port = params::parse_port(p)?;
        if port == current_ssh_port {
            warn!(port, "port is the current sshd port; skipping the in-use check");
        } else {
            params::ensure_port_free(port)?;
        }
        Ok(())
    })?;

    RunConfig::new(&username, password.as_deref(), &port)
}

fn ask_valid<F>(
    preset: Option<String>,
    source: &mut dyn ParameterSource,
    question: &str,
    secret: bool,
    check: F,
) -> Result<String>
where
    F: Fn(&str) -> Result<()>,
{
    if let Some(v) = preset {
        check(&v)?;
        return Ok(v);
    }
    let mut last_err = HostguardError::InvalidConfig(format!("no value given for {question}"));
    for _ in 0..MAX_ATTEMPTS {
        let Some(v) = source.ask(question, secret) else {
            break;
        };
        match check(&v) {
            Ok(()) => return Ok(v),
            Err(e) => {
                warn!(question, error = %e, "invalid input");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// The port sshd is configured for right now (first active `Port`, else 22).
pub fn effective_ssh_port(sshd_config: &Path) -> u16 {
    DirectiveStore::load(sshd_config)
        .ok()
        .and_then(|s| s.get("Port"))
        .and_then(|d| d.value.parse().ok())
        .unwrap_or(DEFAULT_SSH_PORT)
}

/// The directive set the SSH pass enforces.
pub fn ssh_directives(run: &RunConfig) -> Vec<Directive> {
    let port = run.ssh_port().to_string();
    [
        ("Port", port.as_str()),
        ("PermitRootLogin", "no"),
        ("PasswordAuthentication", "yes"),
        ("PubkeyAuthentication", "yes"),
    ]
    .into_iter()
    .map(|(k, v)| Directive {
        key: k.to_string(),
        value: v.to_string(),
        commented: false,
    })
    .collect()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator<'a, C: Confirm> {
    config: &'a HostguardConfig,
    presets: Presets,
    source: Box<dyn ParameterSource + 'a>,
    run: Option<RunConfig>,
    tools: Collaborators,
    escalation: EscalationController<C>,
    log: RunLog,
    interrupt: Interrupt,
    options: RunOptions,
    os_release: PathBuf,
    firewall_status: Option<String>,
    profile: Option<ProfileArtifacts>,
}

impl<'a, C: Confirm> Orchestrator<'a, C> {
    pub fn new(config: &'a HostguardConfig, tools: Collaborators, confirm: C, log: RunLog) -> Self {
        Self {
            config,
            presets: Presets::default(),
            source: Box::new(Unattended),
            run: None,
            tools,
            escalation: EscalationController::new(confirm, log.clone()),
            log,
            interrupt: Interrupt::new(),
            options: RunOptions::default(),
            os_release: PathBuf::from("/etc/os-release"),
            firewall_status: None,
            profile: None,
        }
    }

    /// Values given up front, and where to ask for the rest.
    pub fn with_parameters<S>(mut self, presets: Presets, source: S) -> Self
    where
        S: ParameterSource + 'a,
    {
        self.presets = presets;
        self.source = Box::new(source);
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_os_release(mut self, path: &Path) -> Self {
        self.os_release = path.to_path_buf();
        self
    }

    /// Run every pass in order until one resolves to abort or the run is
    /// interrupted. The interrupt flag is checked before each pass, after it
    /// and after the operator's decision.
    pub fn execute(mut self) -> RunReport {
        let mut passes = Vec::new();
        let mut status = RunStatus::Completed;
        self.log.note("run", "starting");

        for pass in Pass::ALL {
            self.interrupt.enter(pass.as_str());
            if self.interrupt.is_raised() {
                let outcome = Outcome::fatal(format!("interrupted before {pass}"));
                self.log.record(pass.as_str(), &outcome);
                passes.push(PassReport {
                    pass,
                    outcome,
                    decision: Decision::Abort,
                });
                status = RunStatus::Interrupted;
                break;
            }

            info!(%pass, "pass starting");
            let outcome = self.run_pass(pass);
            if self.interrupt.is_raised() {
                warn!(%pass, "interrupted during pass");
                self.log.record(pass.as_str(), &outcome);
                self.log.note(pass.as_str(), "interrupted during pass");
                passes.push(PassReport {
                    pass,
                    outcome,
                    decision: Decision::Abort,
                });
                status = RunStatus::Interrupted;
                break;
            }

            let decision = self.escalation.resolve_stage(pass.as_str(), &outcome);
            info!(%pass, status = %outcome.status, %decision, "pass finished");
            passes.push(PassReport {
                pass,
                outcome,
                decision,
            });
            if self.interrupt.is_raised() {
                warn!(%pass, "interrupted while deciding");
                self.log.note(pass.as_str(), "interrupted while deciding");
                status = RunStatus::Interrupted;
                break;
            }
            if decision == Decision::Abort {
                status = RunStatus::Aborted;
                break;
            }
        }

        self.log.note("run", &format!("finished: {status:?}"));
        let run = self.run.as_ref();
        RunReport {
            status,
            passes,
            username: run.map(|r| r.username().to_string()),
            generated_password: run
                .filter(|r| r.password_generated())
                .map(|r| r.password().to_string()),
            ssh_port: run.map(RunConfig::ssh_port),
            firewall_status: self.firewall_status,
            profile: self.profile,
        }
    }

    fn run_pass(&mut self, pass: Pass) -> Outcome {
        match pass {
            Pass::Dependencies => self.check_dependencies(),
            Pass::SystemChecks => self.check_system(),
            Pass::Parameters => self.parameters_pass(),
            Pass::Packages if self.options.skip_packages => Outcome::ok("skipped"),
            Pass::Packages => self.packages_pass(),
            Pass::Account => self.with_run(pass, Self::account_pass),
            Pass::Ssh => self.with_run(pass, Self::ssh_pass),
            Pass::Firewall if self.options.skip_firewall || !self.config.firewall.enabled => {
                Outcome::ok("skipped")
            }
            Pass::Firewall => self.with_run(pass, Self::firewall_pass),
            Pass::Keys if self.options.skip_keys || !self.config.proxy.enabled => {
                Outcome::ok("skipped")
            }
            Pass::Keys => self.keys_pass(),
        }
    }

    fn with_run(&mut self, pass: Pass, f: fn(&mut Self, &RunConfig) -> Outcome) -> Outcome {
        match self.run.clone() {
            Some(run) => f(self, &run),
            None => Outcome::fatal(format!("{pass} needs run parameters but none were collected")),
        }
    }

    // -- dependencies -------------------------------------------------------

    fn check_dependencies(&mut self) -> Outcome {
        let runner = self.tools.runner.as_ref();
        let missing: Vec<&str> = REQUIRED_TOOLS
            .iter()
            .copied()
            .filter(|t| !runner.exists(t))
            .collect();
        if !missing.is_empty() {
            return Outcome::fatal(format!("required tools missing: {}", missing.join(", ")))
                .with_hint("run on a Debian/Ubuntu host with openssh-server installed");
        }

        let installs_ufw =
            !self.options.skip_packages && self.config.packages.iter().any(|p| p == "ufw");
        let mut optional = Vec::new();
        if self.config.firewall.enabled
            && !self.options.skip_firewall
            && !installs_ufw
            && !runner.exists("ufw")
        {
            optional.push("ufw");
        }
        if optional.is_empty() {
            Outcome::ok("all required tools present")
        } else {
            Outcome::recoverable(
                format!("optional tools missing: {}", optional.join(", ")),
                "the passes that need them will fail; add them to `packages`",
            )
        }
    }

    // -- system checks ------------------------------------------------------

    fn check_system(&mut self) -> Outcome {
        if !crate::system::is_root(self.tools.runner.as_ref()) {
            return Outcome::fatal("hostguard must run as root").with_hint("re-run with sudo");
        }
        if !self.config.sshd_config.exists() {
            return Outcome::fatal(format!(
                "{} not found",
                self.config.sshd_config.display()
            ))
            .with_hint("install openssh-server or set `sshd_config` in the config file");
        }
        let os = std::fs::read_to_string(&self.os_release).unwrap_or_default();
        if !is_debian_like(&os) {
            return Outcome::recoverable(
                "this host does not look like Debian or Ubuntu",
                "package and firewall commands assume apt and ufw",
            );
        }
        Outcome::ok("running as root on a Debian-family host")
    }

    // -- parameters ---------------------------------------------------------

    fn parameters_pass(&mut self) -> Outcome {
        let current = effective_ssh_port(&self.config.sshd_config);
        let run = match collect_run_config(&self.presets, self.source.as_mut(), current) {
            Ok(r) => r,
            Err(e) => {
                return Outcome::fatal(format!("invalid run parameters: {e}"))
                    .with_hint("pass --username, --password and --port, or answer the prompts")
            }
        };

        let mut errors = Vec::new();
        for w in self.config.validate(Some(run.ssh_port())) {
            match w.level {
                WarnLevel::Error => errors.push(w.message),
                WarnLevel::Warning => warn!("{}", w.message),
            }
        }
        if !errors.is_empty() {
            return Outcome::fatal(format!("config has errors: {}", errors.join("; ")))
                .with_hint("run `hostguard config validate`");
        }

        let summary = format!("user={} ssh_port={}", run.username(), run.ssh_port());
        self.run = Some(run);
        Outcome::ok(summary)
    }

    // -- packages -----------------------------------------------------------

    fn packages_pass(&mut self) -> Outcome {
        if let Err(e) = self.tools.packages.update() {
            return Outcome::recoverable(
                format!("package index update failed: {e}"),
                "check network access and /etc/apt/sources.list",
            );
        }
        match self.tools.packages.install(&self.config.packages) {
            Ok(()) => Outcome::ok(format!("installed: {}", self.config.packages.join(", "))),
            Err(e) => Outcome::recoverable(
                format!("package install failed: {e}"),
                "install the packages by hand with apt-get",
            ),
        }
    }

    // -- account ------------------------------------------------------------

    fn account_pass(&mut self, run: &RunConfig) -> Outcome {
        let name = run.username();
        let accounts = self.tools.accounts.as_mut();
        let created = if accounts.user_exists(name) {
            false
        } else {
            if let Err(e) = accounts.create_user(name) {
                return Outcome::recoverable(
                    format!("creating user {name} failed: {e}"),
                    "create the account by hand with useradd",
                );
            }
            true
        };
        if let Err(e) = accounts.set_password(name, run.password()) {
            return Outcome::recoverable(
                format!("setting the password for {name} failed: {e}"),
                format!("run `passwd {name}`"),
            );
        }
        if let Err(e) = accounts.grant_sudo(name) {
            return Outcome::recoverable(
                format!("adding {name} to sudo failed: {e}"),
                format!("run `usermod -aG sudo {name}`"),
            );
        }
        if created {
            Outcome::ok(format!("user {name} created with sudo"))
        } else {
            Outcome::ok(format!("user {name} existed; password updated"))
        }
    }

    // -- ssh ----------------------------------------------------------------

    fn ssh_pass(&mut self, run: &RunConfig) -> Outcome {
        let path = self.config.sshd_config.clone();
        let mut store = match DirectiveStore::load(&path) {
            Ok(s) => s,
            Err(e) => return Outcome::fatal(format!("cannot read {}: {e}", path.display())),
        };
        let directives = ssh_directives(run);
        let service = self.config.ssh_service.clone();
        let sshd_check = self.tools.sshd_check.as_mut();
        let services = self.tools.services.as_mut();

        let outcome = guard::run(&mut store, &directives, |p| {
            let syntax = sshd_check.check(p);
            if !syntax.is_ok() {
                return syntax;
            }
            if let Err(e) = services.restart(&service) {
                return Outcome::recoverable(format!("restarting {service} failed: {e}"), "");
            }
            if !services.is_active(&service) {
                return Outcome::recoverable(format!("{service} is not active after restart"), "");
            }
            Outcome::ok("sshd accepted the new config")
        });

        if !outcome.is_ok() && !outcome.is_fatal() {
            // The file is back to the snapshot; bring the service back on it.
            if let Err(e) = self.tools.services.restart(&service) {
                warn!(error = %e, "restart on restored sshd_config failed");
                self.log
                    .note("ssh", &format!("restart on restored config failed: {e}"));
            }
        }
        outcome
    }

    // -- firewall -----------------------------------------------------------

    fn firewall_pass(&mut self, run: &RunConfig) -> Outcome {
        // Use what sshd is actually configured for, so a reverted SSH pass
        // never leads to allowing the wrong port.
        let ssh_port = effective_ssh_port(&self.config.sshd_config);
        let mut set = RuleSet::for_ssh(ssh_port);
        if self.config.firewall.allow_web {
            set = set.allow(Rule::tcp(80, "HTTP")).allow(Rule::tcp(443, "HTTPS"));
        }
        if self.config.proxy.enabled && !self.options.skip_keys {
            set = set.allow(Rule {
                port: self.config.proxy.listen_port,
                protocol: Protocol::Tcp,
                comment: "proxy".to_string(),
            });
        }
        for rule in &self.config.firewall.extra_rules {
            set = set.allow(rule.clone());
        }

        let mut outcome = firewall::apply(&set, self.tools.firewall.as_mut());
        if ssh_port != run.ssh_port() && outcome.is_ok() {
            outcome = Outcome::recoverable(
                format!(
                    "firewall allows SSH on {ssh_port}, not the requested {}",
                    run.ssh_port()
                ),
                "the SSH pass did not apply the new port; fix sshd_config and re-run",
            );
        }
        match self.tools.firewall.status() {
            Ok(s) => self.firewall_status = Some(s),
            Err(e) => warn!(error = %e, "could not read firewall status"),
        }
        outcome
    }

    // -- keys ---------------------------------------------------------------

    fn keys_pass(&mut self) -> Outcome {
        let (outcome, artifacts) = provision_profile(self.config, &mut self.tools, true);
        self.profile = artifacts;
        outcome
    }
}

/// Client-side result of the keys pass.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileArtifacts {
    pub uri: String,
    pub files: ProfileFiles,
    /// Terminal rendering of the URI.
    #[serde(skip)]
    pub qr: Option<String>,
}

/// Generate secret material, install the proxy server config under the
/// guard, restart the proxy (unless `restart` is false) and write the
/// connection profile. Artifacts are only returned on success.
pub fn provision_profile(
    config: &HostguardConfig,
    tools: &mut Collaborators,
    restart: bool,
) -> (Outcome, Option<ProfileArtifacts>) {
    let proxy = &config.proxy;
    if !tools.runner.exists(&proxy.generator) {
        let outcome = Outcome::recoverable(
            format!(
                "{} is not installed; no connection profile generated",
                proxy.generator
            ),
            format!("install {} and run `hostguard keys`", proxy.generator),
        );
        return (outcome, None);
    }

    let material = match material::resolve(tools.keys.as_mut()) {
        Ok(m) => m,
        Err(outcome) => return (outcome, None),
    };
    let short_id = profile::generate_short_id();

    let server =
        profile::server_config(&material, proxy.listen_port, &proxy.server_name, &short_id);
    let rendered = match serde_json::to_string_pretty(&server) {
        Ok(s) => s,
        Err(e) => return (Outcome::fatal(format!("cannot render proxy config: {e}")), None),
    };
    let proxy_check = tools.proxy_check.as_mut();
    let written = guard::replace_file(&proxy.server_config, rendered.as_bytes(), |p| {
        proxy_check.check(p)
    });
    if !written.is_ok() {
        return (written, None);
    }
    if restart {
        if let Err(e) = tools.services.restart(&proxy.service) {
            let outcome = Outcome::recoverable(
                format!("restarting {} failed: {e}", proxy.service),
                format!("check `journalctl -u {}`", proxy.service),
            );
            return (outcome, None);
        }
    }

    let host = proxy
        .public_host
        .clone()
        .unwrap_or_else(|| detect_host(tools.runner.as_ref()));
    let conn = ConnectionProfile::new(
        &material,
        &proxy.profile_name,
        &host,
        proxy.listen_port,
        &proxy.server_name,
        &short_id,
    );
    let uri = conn.uri();
    let files = match profile::write_profile(&config.output_dir, &conn) {
        Ok(f) => f,
        Err(e) => {
            let outcome = Outcome::recoverable(
                format!("writing the connection profile failed: {e}"),
                format!(
                    "the proxy is configured; rebuild the profile from {}",
                    proxy.server_config.display()
                ),
            );
            return (outcome, None);
        }
    };
    let outcome = Outcome::ok(format!(
        "connection profile written to {}",
        files.text.display()
    ));
    let qr = profile::render_qr_text(&uri).ok();
    (outcome, Some(ProfileArtifacts { uri, files, qr }))
}

fn is_debian_like(os_release: &str) -> bool {
    os_release.lines().any(|l| {
        let l = l.trim();
        (l.starts_with("ID=") || l.starts_with("ID_LIKE="))
            && (l.contains("debian") || l.contains("ubuntu"))
    })
}

/// First address from `hostname -I`, else a placeholder the operator replaces.
fn detect_host(runner: &dyn CommandRunner) -> String {
    runner
        .run("hostname", &["-I"], None)
        .ok()
        .filter(|o| o.success())
        .and_then(|o| o.stdout.split_whitespace().next().map(str::to_string))
        .unwrap_or_else(|| "SERVER_IP".to_string())
}

use crate::output::{print_json, print_table};
use crate::prompt::{TerminalConfirm, TerminalPrompt};
use anyhow::Context;
use hostguard_core::config::HostguardConfig;
use hostguard_core::interrupt::{Interrupt, SignalAction};
use hostguard_core::orchestrator::{
    Collaborators, Orchestrator, Presets, RunOptions, RunReport, RunStatus,
};
use hostguard_core::runlog::RunLog;
use std::path::Path;
use tracing::warn;

/// Exit code for a run stopped by Ctrl+C.
const EXIT_INTERRUPTED: i32 = 130;

pub struct RunArgs {
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<String>,
    pub yes: bool,
    pub skip_packages: bool,
    pub skip_firewall: bool,
    pub skip_keys: bool,
}

pub fn run(config_path: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = HostguardConfig::load(config_path).context("failed to load config")?;
    let log = RunLog::open(&config.log_file);

    let rt = tokio::runtime::Runtime::new()?;
    let interrupt = Interrupt::new();
    let flag = interrupt.clone();
    let signal_log = log.clone();
    rt.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match flag.signal() {
                SignalAction::ExitNow => {
                    let stage = flag.stage();
                    signal_log.note(
                        "run",
                        &format!(
                            "interrupted during {stage} while waiting for input; backups left in place"
                        ),
                    );
                    eprintln!(
                        "\ninterrupted during {stage}; completed passes stay applied, backups are kept"
                    );
                    std::process::exit(EXIT_INTERRUPTED);
                }
                SignalAction::StopAtNextCheck => {
                    warn!("interrupt received; stopping once the current step returns")
                }
            }
        }
    });

    let presets = Presets {
        username: args.username,
        password: args.password,
        port: args.port,
    };
    let tools = Collaborators::system(&config);
    let report = Orchestrator::new(
        &config,
        tools,
        TerminalConfirm::new(args.yes, interrupt.clone()),
        log.clone(),
    )
    .with_parameters(presets, TerminalPrompt::new(interrupt.clone()))
    .with_options(RunOptions {
        skip_packages: args.skip_packages,
        skip_firewall: args.skip_firewall,
        skip_keys: args.skip_keys,
    })
    .with_interrupt(interrupt.clone())
    .execute();

    if json {
        print_json(&report)?;
    } else {
        print_summary(&report, &log);
    }

    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Interrupted => {
            log.note(
                "run",
                &format!(
                    "interrupted during {}; backups left in place",
                    interrupt.stage()
                ),
            );
            eprintln!(
                "interrupted during {}; completed passes stay applied, backups are kept",
                interrupt.stage()
            );
            std::process::exit(EXIT_INTERRUPTED);
        }
        RunStatus::Aborted => {
            let last = report
                .passes
                .last()
                .map(|p| p.pass.to_string())
                .unwrap_or_default();
            anyhow::bail!("run aborted at {last}; earlier passes stay applied")
        }
    }
}

fn print_summary(report: &RunReport, log: &RunLog) {
    let rows = report
        .passes
        .iter()
        .map(|p| {
            vec![
                p.pass.to_string(),
                p.outcome.status.to_string(),
                p.decision.to_string(),
                p.outcome.message.clone(),
            ]
        })
        .collect();
    print_table(&["PASS", "STATUS", "DECISION", "MESSAGE"], rows);

    for p in &report.passes {
        if let Some(hint) = p.outcome.remediation_hint.as_deref().filter(|h| !h.is_empty()) {
            println!("  {}: {hint}", p.pass);
        }
    }

    println!();
    if let Some(user) = &report.username {
        println!("user:     {user}");
    }
    if let Some(pw) = &report.generated_password {
        println!("password: {pw} (generated; store it now)");
    }
    if let Some(port) = report.ssh_port {
        println!("ssh port: {port}");
    }
    if let Some(path) = log.path() {
        println!("log:      {}", path.display());
    }

    if let Some(status) = &report.firewall_status {
        println!("\n{}", status.trim_end());
    }

    if let Some(profile) = &report.profile {
        if let Some(qr) = &profile.qr {
            println!("\n{qr}");
        }
        println!("{}", profile.uri);
        println!("profile: {}", profile.files.text.display());
        println!("qr code: {}", profile.files.svg.display());
    }
}

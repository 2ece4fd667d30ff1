use crate::output::{print_json, print_outcome};
use anyhow::Context;
use hostguard_core::config::HostguardConfig;
use hostguard_core::orchestrator::{provision_profile, Collaborators};
use std::path::Path;

/// The keys pass on its own, for re-keying a host that is already hardened.
pub fn run(config_path: &Path, restart: bool, json: bool) -> anyhow::Result<()> {
    let config = HostguardConfig::load(config_path).context("failed to load config")?;
    let mut tools = Collaborators::system(&config);
    let (outcome, artifacts) = provision_profile(&config, &mut tools, restart);

    if json {
        print_json(&serde_json::json!({
            "outcome": outcome,
            "profile": artifacts,
        }))?;
    } else {
        print_outcome(&outcome);
        if let Some(a) = &artifacts {
            if let Some(qr) = &a.qr {
                println!("\n{qr}");
            }
            println!("{}", a.uri);
            println!("profile: {}", a.files.text.display());
            println!("qr code: {}", a.files.svg.display());
        }
    }

    if !outcome.is_ok() {
        anyhow::bail!("{}", outcome.message);
    }
    Ok(())
}

use crate::output::print_json;
use anyhow::Context;
use hostguard_core::config::HostguardConfig;
use hostguard_core::orchestrator::effective_ssh_port;
use hostguard_core::params;
use std::path::Path;

/// Validate `input` as an SSH port; the port sshd already listens on counts as free.
pub fn run(config_path: &Path, input: &str, json: bool) -> anyhow::Result<()> {
    let config = HostguardConfig::load(config_path).context("failed to load config")?;
    let port = params::parse_port(input)?;
    let current = effective_ssh_port(&config.sshd_config);
    if port != current {
        params::ensure_port_free(port)?;
    }

    if json {
        print_json(&serde_json::json!({
            "port": port,
            "available": true,
            "current_ssh_port": port == current,
        }))?;
    } else if port == current {
        println!("port {port} is the current SSH port");
    } else {
        println!("port {port} is available");
    }
    Ok(())
}

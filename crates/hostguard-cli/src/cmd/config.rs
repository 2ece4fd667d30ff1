use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use hostguard_core::config::{HostguardConfig, WarnLevel};
use hostguard_core::io;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a config file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config (file merged over defaults)
    Show,

    /// Validate the config for common mistakes
    Validate {
        /// SSH port the next run will use, to check for collisions
        #[arg(long)]
        port: Option<u16>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init { force } => init(path, force),
        ConfigSubcommand::Show => show(path, json),
        ConfigSubcommand::Validate { port } => validate(path, port, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    let yaml = HostguardConfig::default().to_yaml()?;
    if force {
        io::atomic_write(path, yaml.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    let created = io::write_if_missing(path, yaml.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    if created {
        println!("Wrote {}", path.display());
    } else {
        println!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = HostguardConfig::load(path).context("failed to load config")?;
    if json {
        print_json(&config)?;
    } else {
        print!("{}", config.to_yaml()?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(path: &Path, port: Option<u16>, json: bool) -> anyhow::Result<()> {
    let config = HostguardConfig::load(path).context("failed to load config")?;
    let warnings = config.validate(port);

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

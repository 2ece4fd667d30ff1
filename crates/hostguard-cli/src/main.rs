mod cmd;
mod output;
mod prompt;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use hostguard_core::config::DEFAULT_CONFIG_PATH;
use hostguard_core::directive::{Directive, Separator};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hostguard",
    about = "Idempotent host hardening: guarded sshd_config edits, firewall, accounts and proxy keys",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: /etc/hostguard/hostguard.yaml)
    #[arg(long, global = true, env = "HOSTGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every hardening pass in order
    Run {
        /// Account to create or update
        #[arg(long)]
        username: Option<String>,

        /// Password for the account (empty or omitted: ask, then generate)
        #[arg(long, env = "HOSTGUARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// New SSH port (1024-65535)
        #[arg(long)]
        port: Option<String>,

        /// Continue past every recoverable error without asking
        #[arg(long, short = 'y')]
        yes: bool,

        #[arg(long)]
        skip_packages: bool,

        #[arg(long)]
        skip_firewall: bool,

        #[arg(long)]
        skip_keys: bool,
    },

    /// Set directives in a config file under backup and validation
    Apply {
        /// File to edit
        file: PathBuf,

        /// Directives as KEY=VALUE
        #[arg(required = true, value_parser = parse_directive)]
        directives: Vec<Directive>,

        /// Shell command that must exit 0 for the edit to stay; the file path is $1
        #[arg(long)]
        validate: Option<String>,

        /// Force the key/value separator: space or equals (default: detect)
        #[arg(long)]
        separator: Option<Separator>,
    },

    /// Generate proxy keys, install the server config and write the connection profile
    Keys {
        /// Don't restart the proxy service afterwards
        #[arg(long)]
        no_restart: bool,
    },

    /// Check that a port is a valid, free SSH port
    CheckPort { port: String },

    /// Inspect and initialise the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn parse_directive(s: &str) -> Result<Directive, String> {
    Directive::parse_assignment(s).map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Keys { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let result = match cli.command {
        Commands::Run {
            username,
            password,
            port,
            yes,
            skip_packages,
            skip_firewall,
            skip_keys,
        } => cmd::run::run(
            &config_path,
            cmd::run::RunArgs {
                username,
                password,
                port,
                yes,
                skip_packages,
                skip_firewall,
                skip_keys,
            },
            cli.json,
        ),
        Commands::Apply {
            file,
            directives,
            validate,
            separator,
        } => cmd::apply::run(&file, &directives, validate.as_deref(), separator, cli.json),
        Commands::Keys { no_restart } => cmd::keys::run(&config_path, !no_restart, cli.json),
        Commands::CheckPort { port } => cmd::check::run(&config_path, &port, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

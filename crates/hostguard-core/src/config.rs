use crate::error::{HostguardError, Result};
use crate::firewall::Rule;
use crate::params;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostguard/hostguard.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// FirewallConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allow 80/tcp and 443/tcp.
    #[serde(default = "default_true")]
    pub allow_web: bool,
    /// Re-applied after every reset, so declared custom rules survive re-runs.
    #[serde(default)]
    pub extra_rules: Vec<Rule>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_web: true,
            extra_rules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProxyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_generator")]
    pub generator: String,
    #[serde(default = "default_proxy_service")]
    pub service: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// SNI / REALITY destination.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Host put into the connection URI. Falls back to the machine hostname.
    #[serde(default)]
    pub public_host: Option<String>,
    #[serde(default = "default_server_config")]
    pub server_config: PathBuf,
    #[serde(default = "default_profile_name")]
    pub profile_name: String,
}

fn default_generator() -> String {
    "xray".to_string()
}

fn default_proxy_service() -> String {
    "xray".to_string()
}

fn default_listen_port() -> u16 {
    443
}

fn default_server_name() -> String {
    "www.microsoft.com".to_string()
}

fn default_server_config() -> PathBuf {
    PathBuf::from("/usr/local/etc/xray/config.json")
}

fn default_profile_name() -> String {
    "hostguard".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            generator: default_generator(),
            service: default_proxy_service(),
            listen_port: default_listen_port(),
            server_name: default_server_name(),
            public_host: None,
            server_config: default_server_config(),
            profile_name: default_profile_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// HostguardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostguardConfig {
    #[serde(default = "default_sshd_config")]
    pub sshd_config: PathBuf,
    #[serde(default = "default_ssh_service")]
    pub ssh_service: String,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    #[serde(default)]
    pub firewall: FirewallConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

fn default_true() -> bool {
    true
}

fn default_sshd_config() -> PathBuf {
    PathBuf::from("/etc/ssh/sshd_config")
}

fn default_ssh_service() -> String {
    "ssh".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/hostguard.log")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/root/hostguard")
}

fn default_packages() -> Vec<String> {
    vec![
        "curl".to_string(),
        "ufw".to_string(),
        "openssh-server".to_string(),
    ]
}

impl Default for HostguardConfig {
    fn default() -> Self {
        Self {
            sshd_config: default_sshd_config(),
            ssh_service: default_ssh_service(),
            log_file: default_log_file(),
            output_dir: default_output_dir(),
            packages: default_packages(),
            firewall: FirewallConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl HostguardConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load from `path`, failing when it does not exist.
    pub fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HostguardError::ConfigNotFound(path.display().to_string()));
        }
        Self::load(path)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check internal consistency. `ssh_port` is the port chosen for this run, if known.
    pub fn validate(&self, ssh_port: Option<u16>) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        for rule in &self.firewall.extra_rules {
            if rule.port == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("firewall extra rule '{}' has port 0", rule.comment),
                });
            }
        }
        if self.proxy.enabled {
            if self.proxy.generator.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "proxy.generator is empty".to_string(),
                });
            }
            if Some(self.proxy.listen_port) == ssh_port {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "proxy.listen_port {} collides with the SSH port",
                        self.proxy.listen_port
                    ),
                });
            }
            if self.firewall.enabled
                && !self.firewall.allow_web
                && !self
                    .firewall
                    .extra_rules
                    .iter()
                    .any(|r| r.port == self.proxy.listen_port)
            {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "proxy listens on {} but no firewall rule admits it",
                        self.proxy.listen_port
                    ),
                });
            }
        }
        if self.packages.iter().any(|p| p.trim().is_empty()) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "packages contains an empty name".to_string(),
            });
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Operator parameters, collected once and then only read.
#[derive(Clone)]
pub struct RunConfig {
    username: String,
    password: String,
    password_generated: bool,
    ssh_port: u16,
}

impl RunConfig {
    /// Validate the raw inputs. A `None` password is generated.
    pub fn new(username: &str, password: Option<&str>, port: &str) -> Result<Self> {
        let username = username.trim();
        params::validate_username(username)?;
        let ssh_port = params::parse_port(port)?;
        let (password, password_generated) = match password {
            Some(p) if !p.is_empty() => {
                params::validate_password(p)?;
                (p.to_string(), false)
            }
            _ => (params::generate_password(), true),
        };
        Ok(Self {
            username: username.to_string(),
            password,
            password_generated,
            ssh_port,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn password_generated(&self) -> bool {
        self.password_generated
    }

    pub fn ssh_port(&self) -> u16 {
        self.ssh_port
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("password_generated", &self.password_generated)
            .field("ssh_port", &self.ssh_port)
            .finish()
    }
}

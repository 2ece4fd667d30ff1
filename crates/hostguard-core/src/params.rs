use crate::error::{HostguardError, Result};
use regex::Regex;
use std::net::TcpListener;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const GENERATED_PASSWORD_LEN: usize = 16;
pub const MIN_PORT: u16 = 1024;

static USERNAME_RE: OnceLock<Regex> = OnceLock::new();

fn username_re() -> &'static Regex {
    USERNAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9_]+$").unwrap())
}

pub fn validate_username(name: &str) -> Result<()> {
    if username_re().is_match(name) {
        Ok(())
    } else {
        Err(HostguardError::InvalidUsername(name.to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    let got = password.chars().count();
    if got < MIN_PASSWORD_LEN {
        return Err(HostguardError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
            got,
        });
    }
    // chpasswd reads one `user:password` record per line.
    if password.chars().any(char::is_control) {
        return Err(HostguardError::PasswordControlChar);
    }
    Ok(())
}

/// Generate a random alphanumeric password.
pub fn generate_password() -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Parse an SSH port: digits only, within 1024..=65535.
pub fn parse_port(input: &str) -> Result<u16> {
    let s = input.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(HostguardError::InvalidPort(input.to_string()));
    }
    match s.parse::<u16>() {
        Ok(p) if p >= MIN_PORT => Ok(p),
        _ => Err(HostguardError::InvalidPort(input.to_string())),
    }
}

/// Fail if something already listens on `port`.
pub fn ensure_port_free(port: u16) -> Result<()> {
    match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(_) => Err(HostguardError::PortInUse(port)),
    }
}

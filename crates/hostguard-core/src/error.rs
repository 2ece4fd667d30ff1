use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostguardError {
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid username '{0}': must be non-empty lowercase alphanumeric or underscore")]
    InvalidUsername(String),

    #[error("password too short: need at least {min} characters, got {got}")]
    PasswordTooShort { min: usize, got: usize },

    #[error("password must not contain control characters such as newlines")]
    PasswordControlChar,

    #[error("invalid port '{0}': must be a number between 1024 and 65535")]
    InvalidPort(String),

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("invalid directive '{0}': expected KEY=VALUE")]
    InvalidDirective(String),

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("'{program}' exited with status {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("QR rendering failed: {0}")]
    Qr(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HostguardError>;

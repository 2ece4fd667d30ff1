//! Secret material resolution: identity UUID plus an x25519 key pair, parsed
//! from an external generator's text output.
//!
//! A missing UUID is fatal immediately. A missing key is retried exactly once
//! with a fresh generation; the fallback pair replaces the first one wholesale.

use crate::error::Result;
use crate::outcome::Outcome;
use serde::Serialize;
use tracing::warn;

pub const PRIVATE_KEY_PREFIX: &str = "Private key: ";
pub const PUBLIC_KEY_PREFIX: &str = "Public key: ";

/// Fully populated material. Construction only happens in [`resolve`], after
/// every field has been checked, so a partial tuple never escapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretMaterial {
    pub uuid: String,
    pub private_key: String,
    pub public_key: String,
}

/// Source of generator output. One call, one fresh output buffer.
pub trait KeyGenerator {
    fn uuid(&mut self) -> Result<String>;
    fn keypair(&mut self) -> Result<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl KeyPair {
    fn is_complete(&self) -> bool {
        !self.private_key.is_empty() && !self.public_key.is_empty()
    }
}

/// First non-empty trimmed line of the UUID generator's output.
pub fn parse_uuid(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Pick `Private key: ` / `Public key: ` lines out of a key pair block.
pub fn parse_keypair(text: &str) -> KeyPair {
    let mut pair = KeyPair::default();
    for line in text.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix(PRIVATE_KEY_PREFIX) {
            if pair.private_key.is_empty() {
                pair.private_key = v.trim().to_string();
            }
        } else if let Some(v) = line.strip_prefix(PUBLIC_KEY_PREFIX) {
            if pair.public_key.is_empty() {
                pair.public_key = v.trim().to_string();
            }
        }
    }
    pair
}

pub fn resolve(generator: &mut dyn KeyGenerator) -> std::result::Result<SecretMaterial, Outcome> {
    let uuid = match generator.uuid() {
        Ok(text) => parse_uuid(&text),
        Err(e) => return Err(Outcome::fatal(format!("UUID generator failed: {e}"))),
    };
    if uuid.is_empty() {
        return Err(Outcome::fatal("UUID generator produced no output")
            .with_hint("check that the proxy binary is installed and runnable"));
    }
    if uuid::Uuid::parse_str(&uuid).is_err() {
        return Err(Outcome::fatal(format!("generator returned an invalid UUID '{uuid}'")));
    }

    let primary = match generator.keypair() {
        Ok(text) => parse_keypair(&text),
        Err(e) => {
            warn!(error = %e, "key pair generation failed, retrying once");
            KeyPair::default()
        }
    };

    let pair = if primary.is_complete() {
        primary
    } else {
        warn!("key pair output incomplete, regenerating once");
        let fallback = generator
            .keypair()
            .map(|text| parse_keypair(&text))
            .map_err(|e| Outcome::fatal(format!("fallback key generation failed: {e}")))?;
        if !fallback.is_complete() {
            return Err(Outcome::fatal(
                "key generator produced no public key after one retry",
            )
            .with_hint("run the generator by hand and check its output format"));
        }
        fallback
    };

    Ok(SecretMaterial {
        uuid,
        private_key: pair.private_key,
        public_key: pair.public_key,
    })
}

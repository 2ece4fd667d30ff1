//! Connection profile for the proxy: server config, client URI and QR code.

use crate::error::{HostguardError, Result};
use crate::io;
use crate::material::SecretMaterial;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

pub const FLOW: &str = "xtls-rprx-vision";
pub const FINGERPRINT: &str = "chrome";

/// Everything the client needs, derived from resolved material.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub server_name: String,
    pub short_id: String,
    pub uuid: String,
    pub public_key: String,
}

impl ConnectionProfile {
    pub fn new(
        material: &SecretMaterial,
        name: &str,
        host: &str,
        port: u16,
        server_name: &str,
        short_id: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
            server_name: server_name.to_string(),
            short_id: short_id.to_string(),
            uuid: material.uuid.clone(),
            public_key: material.public_key.clone(),
        }
    }

    pub fn uri(&self) -> String {
        format!(
            "vless://{uuid}@{host}:{port}?encryption=none&flow={FLOW}&security=reality\
             &sni={sni}&fp={FINGERPRINT}&pbk={pbk}&sid={sid}&type=tcp#{name}",
            uuid = self.uuid,
            host = self.host,
            port = self.port,
            sni = percent_encode(&self.server_name),
            pbk = percent_encode(&self.public_key),
            sid = self.short_id,
            name = percent_encode(&self.name),
        )
    }
}

/// 8 random bytes as lowercase hex.
pub fn generate_short_id() -> String {
    use rand::Rng;
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// VLESS + REALITY inbound for the proxy server.
pub fn server_config(
    material: &SecretMaterial,
    listen_port: u16,
    server_name: &str,
    short_id: &str,
) -> serde_json::Value {
    json!({
        "log": { "loglevel": "warning" },
        "inbounds": [{
            "listen": "0.0.0.0",
            "port": listen_port,
            "protocol": "vless",
            "settings": {
                "clients": [{ "id": material.uuid, "flow": FLOW }],
                "decryption": "none"
            },
            "streamSettings": {
                "network": "tcp",
                "security": "reality",
                "realitySettings": {
                    "show": false,
                    "dest": format!("{server_name}:443"),
                    "xver": 0,
                    "serverNames": [server_name],
                    "privateKey": material.private_key,
                    "shortIds": [short_id]
                }
            },
            "sniffing": { "enabled": true, "destOverride": ["http", "tls"] }
        }],
        "outbounds": [
            { "protocol": "freedom", "tag": "direct" },
            { "protocol": "blackhole", "tag": "block" }
        ]
    })
}

// ---------------------------------------------------------------------------
// QR rendering
// ---------------------------------------------------------------------------

pub fn render_qr_text(data: &str) -> Result<String> {
    use qrcode::{render::unicode, QrCode};
    let code = QrCode::new(data.as_bytes()).map_err(|e| HostguardError::Qr(e.to_string()))?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Dark)
        .light_color(unicode::Dense1x2::Light)
        .build())
}

pub fn render_qr_svg(data: &str) -> Result<String> {
    use qrcode::{render::svg, QrCode};
    let code = QrCode::new(data.as_bytes()).map_err(|e| HostguardError::Qr(e.to_string()))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .build())
}

/// Paths of the written profile artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileFiles {
    pub text: PathBuf,
    pub svg: PathBuf,
}

/// Write `profile.txt` (URI and parameters) and `profile.svg` into `dir`.
pub fn write_profile(dir: &Path, profile: &ConnectionProfile) -> Result<ProfileFiles> {
    io::ensure_dir(dir)?;
    let uri = profile.uri();
    let text = format!(
        "name: {}\nhost: {}\nport: {}\nsni: {}\nshort_id: {}\npublic_key: {}\nuuid: {}\n\n{uri}\n",
        profile.name,
        profile.host,
        profile.port,
        profile.server_name,
        profile.short_id,
        profile.public_key,
        profile.uuid,
    );
    let files = ProfileFiles {
        text: dir.join("profile.txt"),
        svg: dir.join("profile.svg"),
    };
    io::atomic_write(&files.text, text.as_bytes())?;
    io::atomic_write(&files.svg, render_qr_svg(&uri)?.as_bytes())?;
    restrict(&files.text)?;
    restrict(&files.svg)?;
    Ok(files)
}

#[cfg(unix)]
fn restrict(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict(_path: &Path) -> Result<()> {
    Ok(())
}

//! Idempotent directive mutation.
//!
//! `apply` classifies the key against the store (see [`Placement`]), builds the
//! complete new file in memory and swaps it in atomically. A failed write is
//! fatal and leaves both the file and the store as they were.

use crate::directive::{Directive, DirectiveStore, Placement};
use crate::outcome::Outcome;
use tracing::debug;

pub fn apply(store: &mut DirectiveStore, key: &str, desired: &str) -> Outcome {
    let edit = match store.plan(key, desired) {
        Ok(e) => e,
        Err(e) => return Outcome::fatal(format!("cannot set {key}: {e}")),
    };

    if !edit.is_change() {
        return Outcome::ok(format!("{key} already set to {}", desired.trim()));
    }

    let mut message = match &edit.placement {
        Placement::Unchanged { .. } => format!("{key} kept at {}", desired.trim()),
        Placement::Rewrite { line, previous } => format!(
            "{key}: {previous} -> {} (line {})",
            desired.trim(),
            line + 1
        ),
        Placement::Uncomment { line } => {
            format!("{key} uncommented and set to {} (line {})", desired.trim(), line + 1)
        }
        Placement::Append { .. } => format!("{key} {} appended", desired.trim()),
    };
    if !edit.disabled_duplicates.is_empty() {
        let lines: Vec<String> = edit
            .disabled_duplicates
            .iter()
            .map(|l| (l + 1).to_string())
            .collect();
        message.push_str(&format!("; duplicate commented out (line {})", lines.join(", ")));
    }

    let path = store.path().to_path_buf();
    if let Err(e) = crate::io::atomic_write(&path, edit.render().as_bytes()) {
        return Outcome::fatal(format!("cannot write {}: {e}", path.display()))
            .with_hint("check that the file system is writable and you are running as root");
    }
    if !edit.disabled_duplicates.is_empty() {
        debug!(
            key,
            lines = ?edit.disabled_duplicates,
            "commented out duplicate directives"
        );
    }
    store.commit(edit);
    debug!(path = %path.display(), %message, "directive applied");
    Outcome::ok(message)
}

/// Apply every directive in order, stopping at the first non-ok outcome.
pub fn apply_all(store: &mut DirectiveStore, directives: &[Directive]) -> Outcome {
    let mut changed = Vec::new();
    for d in directives {
        let will_change = store
            .plan(&d.key, &d.value)
            .map(|e| e.is_change())
            .unwrap_or(false);
        let outcome = apply(store, &d.key, &d.value);
        if !outcome.is_ok() {
            return outcome;
        }
        if will_change {
            changed.push(d.key.as_str());
        }
    }
    if changed.is_empty() {
        Outcome::ok(format!("{} already up to date", store.path().display()))
    } else {
        Outcome::ok(format!(
            "{} updated: {}",
            store.path().display(),
            changed.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_store(dir: &TempDir, text: &str) -> DirectiveStore {
        let path = dir.path().join("sshd_config");
        std::fs::write(&path, text).unwrap();
        DirectiveStore::load(&path).unwrap()
    }

    fn read(store: &DirectiveStore) -> String {
        std::fs::read_to_string(store.path()).unwrap()
    }

    #[test]
    fn applying_twice_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "#Port 22\nUsePAM yes\n");
        assert!(apply(&mut s, "Port", "8422").is_ok());
        let first = read(&s);
        assert!(apply(&mut s, "Port", "8422").is_ok());
        assert_eq!(read(&s), first);
    }

    #[test]
    fn matching_value_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let original = "Port 8422\nUsePAM yes";
        let mut s = write_store(&dir, original);
        let o = apply(&mut s, "Port", "8422");
        assert!(o.message.contains("already set"));
        assert_eq!(read(&s), original);
    }

    #[test]
    fn commented_only_is_uncommented_not_duplicated() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "#PermitRootLogin prohibit-password\nUsePAM yes\n");
        apply(&mut s, "PermitRootLogin", "no");
        assert_eq!(read(&s), "PermitRootLogin no\nUsePAM yes\n");
    }

    #[test]
    fn active_line_wins_over_commented() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "#Port 22\nPort 22\n");
        apply(&mut s, "Port", "2222");
        assert_eq!(read(&s), "#Port 22\nPort 2222\n");
    }

    #[test]
    fn absent_key_is_appended() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "UsePAM yes\n");
        apply(&mut s, "PubkeyAuthentication", "yes");
        assert_eq!(read(&s), "UsePAM yes\nPubkeyAuthentication yes\n");
    }

    #[test]
    fn store_rescans_after_external_edit() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "Port 22\n");
        std::fs::write(s.path(), "Port 2222\n").unwrap();
        s.reload().unwrap();
        assert!(apply(&mut s, "Port", "2222").message.contains("already set"));
    }

    #[test]
    fn later_active_duplicate_is_disabled_even_when_first_matches() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "Port 2222\nPort 22\n");
        let o = apply(&mut s, "Port", "2222");
        assert!(o.is_ok());
        assert!(o.message.contains("duplicate commented out (line 2)"));
        assert_eq!(read(&s), "Port 2222\n# Port 22\n");

        let o = apply(&mut s, "Port", "2222");
        assert!(o.message.contains("already set"));
        assert_eq!(read(&s), "Port 2222\n# Port 22\n");
    }

    #[test]
    fn apply_all_counts_duplicate_cleanup_as_a_change() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "Port 2222\nUsePAM yes\nPort 22\n");
        let ds = vec![Directive::new("Port", "2222").unwrap()];
        let o = apply_all(&mut s, &ds);
        assert!(o.message.ends_with("updated: Port"));
        assert_eq!(read(&s), "Port 2222\nUsePAM yes\n# Port 22\n");
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_directory_is_fatal_and_leaves_file_intact() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "Port 22\n");
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores directory permissions; only assert when the write really fails.
        let o = apply(&mut s, "Port", "2222");
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        if o.is_fatal() {
            assert_eq!(read(&s), "Port 22\n");
            assert_eq!(s.content(), "Port 22\n");
        }
    }

    #[test]
    fn apply_all_reports_changed_keys() {
        let dir = TempDir::new().unwrap();
        let mut s = write_store(&dir, "Port 2222\n");
        let ds = vec![
            Directive::new("Port", "2222").unwrap(),
            Directive::new("PermitRootLogin", "no").unwrap(),
        ];
        let o = apply_all(&mut s, &ds);
        assert!(o.is_ok());
        assert!(o.message.ends_with("updated: PermitRootLogin"));
        let o = apply_all(&mut s, &ds);
        assert!(o.message.contains("already up to date"));
    }
}

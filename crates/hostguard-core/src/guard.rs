//! Backup & validate guard: snapshot → apply → validate → revert.
//!
//! The live file is never left in a state the validator rejects. Backups are
//! written next to the original as `<path>.backup.<YYYYmmdd_HHMMSS>` and are
//! never removed by hostguard.

use crate::directive::{Directive, DirectiveStore};
use crate::io;
use crate::mutator;
use crate::outcome::Outcome;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// BackupRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub original: PathBuf,
    /// `None` when the original did not exist at snapshot time.
    pub backup: Option<PathBuf>,
    pub created_at: DateTime<Local>,
}

impl BackupRecord {
    /// Snapshot `original`. A missing original is recorded, not copied, so a
    /// later revert removes whatever was created.
    pub fn snapshot(original: &Path) -> crate::Result<Self> {
        let created_at = Local::now();
        if !original.exists() {
            return Ok(Self {
                original: original.to_path_buf(),
                backup: None,
                created_at,
            });
        }
        let backup = backup_path(original, created_at);
        std::fs::copy(original, &backup)?;
        info!(original = %original.display(), backup = %backup.display(), "backup created");
        Ok(Self {
            original: original.to_path_buf(),
            backup: Some(backup),
            created_at,
        })
    }

    pub fn restore(&self) -> crate::Result<()> {
        match &self.backup {
            Some(b) => io::restore_from(b, &self.original),
            None => {
                if self.original.exists() {
                    std::fs::remove_file(&self.original)?;
                }
                Ok(())
            }
        }
    }

    pub fn describe(&self) -> String {
        match &self.backup {
            Some(b) => b.display().to_string(),
            None => format!("(none: {} did not exist)", self.original.display()),
        }
    }
}

/// `<original>.backup.<timestamp>`, with `.1`, `.2`, … appended on collision.
pub fn backup_path(original: &Path, at: DateTime<Local>) -> PathBuf {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let base = format!("{}.backup.{stamp}", original.display());
    let mut candidate = PathBuf::from(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}.{n}"));
        n += 1;
    }
    candidate
}

// ---------------------------------------------------------------------------
// Guarded operations
// ---------------------------------------------------------------------------

/// Apply `mutations` to `store` transactionally.
///
/// The store is re-read first so the edit is built from the same bytes the
/// snapshot captures. `validate` receives the live path after all mutations landed; any non-ok
/// outcome from it reverts the file to the snapshot.
pub fn run<V>(store: &mut DirectiveStore, mutations: &[Directive], validate: V) -> Outcome
where
    V: FnOnce(&Path) -> Outcome,
{
    let path = store.path().to_path_buf();
    if let Err(e) = store.reload() {
        return Outcome::fatal(format!(
            "cannot re-read {}: {e}; refusing to modify it",
            path.display()
        ));
    }
    let record = match BackupRecord::snapshot(&path) {
        Ok(r) => r,
        Err(e) => {
            return Outcome::fatal(format!(
                "cannot back up {}: {e}; refusing to modify it",
                path.display()
            ))
        }
    };

    let applied = mutator::apply_all(store, mutations);
    if !applied.is_ok() {
        return revert(store, &record, applied);
    }

    let verdict = validate(&path);
    if verdict.is_ok() {
        return Outcome::ok(format!("{} (backup: {})", applied.message, record.describe()));
    }
    revert(store, &record, verdict)
}

/// Replace the whole file at `path` with `contents` under the same protocol.
pub fn replace_file<V>(path: &Path, contents: &[u8], validate: V) -> Outcome
where
    V: FnOnce(&Path) -> Outcome,
{
    if let Ok(existing) = std::fs::read(path) {
        if existing == contents {
            return Outcome::ok(format!("{} already up to date", path.display()));
        }
    }
    let record = match BackupRecord::snapshot(path) {
        Ok(r) => r,
        Err(e) => {
            return Outcome::fatal(format!(
                "cannot back up {}: {e}; refusing to modify it",
                path.display()
            ))
        }
    };
    if let Err(e) = io::atomic_write(path, contents) {
        return Outcome::fatal(format!("cannot write {}: {e}", path.display()));
    }
    let verdict = validate(path);
    if verdict.is_ok() {
        return Outcome::ok(format!(
            "{} written (backup: {})",
            path.display(),
            record.describe()
        ));
    }
    match record.restore() {
        Ok(()) => Outcome::recoverable(
            format!("{} rejected and reverted: {}", path.display(), verdict.message),
            format!("previous version kept at {}", record.describe()),
        ),
        Err(e) => Outcome::fatal(format!(
            "{} rejected and revert failed: {e}",
            path.display()
        ))
        .with_hint(format!("restore manually from {}", record.describe())),
    }
}

fn revert(store: &mut DirectiveStore, record: &BackupRecord, cause: Outcome) -> Outcome {
    let path = store.path().display().to_string();
    warn!(path = %path, cause = %cause.message, "reverting to backup");
    if let Err(e) = record.restore() {
        return Outcome::fatal(format!("{path}: {}; revert failed: {e}", cause.message))
            .with_hint(format!("restore manually from {}", record.describe()));
    }
    if let Err(e) = store.reload() {
        warn!(path = %path, error = %e, "reverted file could not be re-read");
    }
    if cause.is_fatal() {
        return cause.with_hint(format!(
            "{path} restored from {}",
            record.describe()
        ));
    }
    Outcome::recoverable(
        format!("{path} failed validation and was reverted: {}", cause.message),
        format!("original restored from {}; inspect it before re-running", record.describe()),
    )
}

//! In-memory view of a line-oriented configuration file.
//!
//! The store keeps the raw lines (terminators included) so that lines the
//! mutator does not touch are written back byte-for-byte. Nothing is cached
//! between calls: every lookup scans the current lines, and [`DirectiveStore::reload`]
//! must be called after anything outside the store rewrites the file.

use crate::error::{HostguardError, Result};
use crate::io;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub commented: bool,
}

impl Directive {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            key,
            value: value.into().trim().to_string(),
            commented: false,
        })
    }

    /// Parse `KEY=VALUE` as given on the command line.
    pub fn parse_assignment(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((k, v)) => Self::new(k.trim(), v),
            None => Err(HostguardError::InvalidDirective(s.to_string())),
        }
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.commented {
            f.write_str("#")?;
        }
        write!(f, "{} {}", self.key, self.value)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key
            .chars()
            .any(|c| c.is_whitespace() || c == '=' || c == '#');
    if bad {
        return Err(HostguardError::InvalidDirective(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Separator
// ---------------------------------------------------------------------------

/// How a rendered directive joins key and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
    /// `Port 2222` (sshd_config style)
    Space,
    /// `key = value`
    Equals,
}

impl Separator {
    fn join(self, key: &str, value: &str) -> String {
        match self {
            Separator::Space => format!("{key} {value}"),
            Separator::Equals => format!("{key} = {value}"),
        }
    }
}

impl std::str::FromStr for Separator {
    type Err = HostguardError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "space" => Ok(Separator::Space),
            "equals" => Ok(Separator::Equals),
            _ => Err(HostguardError::InvalidConfig(format!(
                "unknown separator '{s}': must be space or equals"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Line matching
// ---------------------------------------------------------------------------

/// A line that names a key, either active or behind a `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub line: usize,
    pub commented: bool,
    pub value: String,
}

fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = raw.strip_suffix('\n') {
        (body, "\n")
    } else {
        (raw, "")
    }
}

/// Match `key` at the start of `body` (after indentation and an optional
/// comment marker). Case-sensitive; `Port` does not match `PortX` or `port`.
fn match_key(body: &str, key: &str) -> Option<(bool, String)> {
    let trimmed = body.trim_start();
    let (commented, rest) = match trimmed.strip_prefix('#') {
        Some(r) => (true, r.trim_start()),
        None => (false, trimmed),
    };
    let after = rest.strip_prefix(key)?;
    let value = match after.chars().next() {
        None => "",
        Some(c) if c.is_whitespace() || c == '=' => {
            let v = after.trim_start();
            v.strip_prefix('=').unwrap_or(v).trim()
        }
        Some(_) => return None,
    };
    Some((commented, value.to_string()))
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Where a desired directive lands, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Active line already carries the desired value.
    Unchanged { line: usize },
    /// Active line with another value is rewritten in place.
    Rewrite { line: usize, previous: String },
    /// Only a commented line exists; it is uncommented and set.
    Uncomment { line: usize },
    /// Key is absent; a new line is appended.
    Append { line: usize },
}

impl Placement {
    pub fn is_change(&self) -> bool {
        !matches!(self, Placement::Unchanged { .. })
    }
}

/// A planned edit: the full replacement line set, built before anything is
/// written so a failed write leaves the store and file untouched.
#[derive(Debug, Clone)]
pub struct Edit {
    pub placement: Placement,
    /// Later active duplicates that were commented out.
    pub disabled_duplicates: Vec<usize>,
    lines: Vec<String>,
}

impl Edit {
    /// True when writing this edit would alter the file.
    pub fn is_change(&self) -> bool {
        self.placement.is_change() || !self.disabled_duplicates.is_empty()
    }

    pub fn render(&self) -> String {
        self.lines.concat()
    }
}

// ---------------------------------------------------------------------------
// DirectiveStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DirectiveStore {
    path: PathBuf,
    lines: Vec<String>,
    separator: Separator,
}

impl DirectiveStore {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(path, &text))
    }

    pub fn from_text(path: &Path, text: &str) -> Self {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let separator = detect_separator(&lines);
        Self {
            path: path.to_path_buf(),
            lines,
            separator,
        }
    }

    /// Re-read the backing file, discarding the in-memory lines.
    pub fn reload(&mut self) -> Result<()> {
        let text = std::fs::read_to_string(&self.path)?;
        self.lines = text.split_inclusive('\n').map(str::to_string).collect();
        Ok(())
    }

    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }

    pub fn content(&self) -> String {
        self.lines.concat()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Every line naming `key`, in file order.
    pub fn matches(&self, key: &str) -> Vec<LineMatch> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let (body, _) = split_terminator(raw);
                match_key(body, key).map(|(commented, value)| LineMatch {
                    line: i,
                    commented,
                    value,
                })
            })
            .collect()
    }

    /// The authoritative (first active) directive for `key`.
    pub fn get(&self, key: &str) -> Option<Directive> {
        self.matches(key)
            .into_iter()
            .find(|m| !m.commented)
            .map(|m| Directive {
                key: key.to_string(),
                value: m.value,
                commented: false,
            })
    }

    /// Classify where `key = value` would land without changing anything.
    pub fn classify(&self, key: &str, value: &str) -> Placement {
        let found = self.matches(key);
        if let Some(active) = found.iter().find(|m| !m.commented) {
            if active.value == value.trim() {
                return Placement::Unchanged { line: active.line };
            }
            return Placement::Rewrite {
                line: active.line,
                previous: active.value.clone(),
            };
        }
        if let Some(commented) = found.iter().find(|m| m.commented) {
            return Placement::Uncomment {
                line: commented.line,
            };
        }
        Placement::Append {
            line: self.lines.len(),
        }
    }

    /// Build the full post-edit line set for `key = value`.
    pub fn plan(&self, key: &str, value: &str) -> Result<Edit> {
        validate_key(key)?;
        let value = value.trim();
        let placement = self.classify(key, value);
        let mut lines = self.lines.clone();
        let mut disabled_duplicates = Vec::new();
        let rendered = self.separator.join(key, value);

        match &placement {
            Placement::Unchanged { .. } => {}
            Placement::Rewrite { line, .. } | Placement::Uncomment { line } => {
                let (body, term) = split_terminator(&lines[*line]);
                let indent: String = body.chars().take_while(|c| c.is_whitespace()).collect();
                lines[*line] = format!("{indent}{rendered}{term}");
            }
            Placement::Append { .. } => {
                if let Some(last) = lines.last_mut() {
                    if !last.ends_with('\n') {
                        last.push('\n');
                    }
                }
                lines.push(format!("{rendered}\n"));
            }
        }

        // Only the first active line may stay active, whatever its value was.
        if let Placement::Unchanged { line } | Placement::Rewrite { line, .. } = &placement {
            for m in self.matches(key) {
                if !m.commented && m.line > *line {
                    let (body, term) = split_terminator(&lines[m.line]);
                    lines[m.line] = format!("# {}{term}", body.trim_start());
                    disabled_duplicates.push(m.line);
                }
            }
        }

        Ok(Edit {
            placement,
            disabled_duplicates,
            lines,
        })
    }

    /// Adopt a planned edit once it has been written.
    pub fn commit(&mut self, edit: Edit) {
        self.lines = edit.lines;
    }

    /// Write the current lines to the backing file atomically.
    pub fn persist(&self) -> Result<()> {
        io::atomic_write(&self.path, self.content().as_bytes())
    }
}

fn detect_separator(lines: &[String]) -> Separator {
    for raw in lines {
        let (body, _) = split_terminator(raw);
        let t = body.trim();
        if t.is_empty() || t.starts_with('#') {
            continue;
        }
        let key_end = t
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(t.len());
        if t[key_end..].trim_start().starts_with('=') {
            return Separator::Equals;
        }
        return Separator::Space;
    }
    Separator::Space
}

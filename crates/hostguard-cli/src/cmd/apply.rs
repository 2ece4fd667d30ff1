use crate::output::{print_json, print_outcome};
use anyhow::Context;
use hostguard_core::directive::{Directive, DirectiveStore, Separator};
use hostguard_core::guard;
use hostguard_core::outcome::Outcome;
use hostguard_core::system::{ShellCheck, SystemRunner, Validator};
use std::path::Path;
use std::sync::Arc;

pub fn run(
    file: &Path,
    directives: &[Directive],
    validate: Option<&str>,
    separator: Option<Separator>,
    json: bool,
) -> anyhow::Result<()> {
    let mut store = DirectiveStore::load(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    if let Some(sep) = separator {
        store = store.with_separator(sep);
    }

    let mut check = validate.map(|cmd| ShellCheck::new(Arc::new(SystemRunner), cmd));
    let outcome = guard::run(&mut store, directives, |path| match check.as_mut() {
        Some(c) => c.check(path),
        None => Outcome::ok("no validator"),
    });

    if json {
        print_json(&outcome)?;
    } else {
        print_outcome(&outcome);
    }

    if !outcome.is_ok() {
        anyhow::bail!("{}", outcome.message);
    }
    Ok(())
}

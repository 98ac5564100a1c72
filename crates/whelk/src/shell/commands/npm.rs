//! A small `npm` that only edits the `dependencies` of `package.json`.

use crate::shell::result::CommandResult;
use crate::store::{DependencyChange, FileStore, MANIFEST_PATH, StoreError};

use super::{CommandOutcome, Output};

/// Version recorded when none is requested and the package is new.
const DEFAULT_VERSION: &str = "latest";

/// Split `name[@version]`, keeping the leading `@` of scoped packages.
fn parse_spec(spec: &str) -> (&str, Option<&str>) {
    let split_at = if let Some(scoped) = spec.strip_prefix('@') {
        scoped.find('@').map(|i| i + 1)
    } else {
        spec.find('@')
    };
    match split_at {
        Some(i) if i + 1 < spec.len() => (&spec[..i], Some(&spec[i + 1..])),
        Some(i) => (&spec[..i], None),
        None => (spec, None),
    }
}

fn install(packages: &[&String], store: &mut FileStore) -> Result<Output, StoreError> {
    let mut output = Output::default();
    if packages.is_empty() {
        let count = store.dependencies().len();
        output.line(format!(
            "up to date, {count} dependencies in {MANIFEST_PATH}"
        ));
        return Ok(output);
    }

    let installed = store.dependencies();
    for spec in packages {
        let (name, requested) = parse_spec(spec);
        if name.is_empty() {
            output.error(format!("npm: invalid package name '{spec}'"));
            continue;
        }
        // A bare name keeps whatever version is already pinned
        let version = match (requested, installed.get(name)) {
            (Some(version), _) => version,
            (None, Some(pinned)) => {
                output.line(format!("{name}@{pinned} already installed"));
                continue;
            }
            (None, None) => DEFAULT_VERSION,
        };
        match store.add_dependency(name, version)? {
            DependencyChange::Added => output.line(format!("added {name}@{version}")),
            DependencyChange::Updated { previous } => {
                output.line(format!("updated {name} from {previous} to {version}"));
            }
            DependencyChange::Unchanged => {
                output.line(format!("{name}@{version} already installed"));
            }
        }
    }
    Ok(output)
}

fn uninstall(packages: &[&String], store: &mut FileStore) -> Result<Output, StoreError> {
    let mut output = Output::default();
    if packages.is_empty() {
        output.error("npm: missing package name");
        return Ok(output);
    }
    for spec in packages {
        let (name, _) = parse_spec(spec);
        if store.remove_dependency(name)? {
            output.line(format!("removed {name}"));
        } else {
            output.warn(format!("npm: {name} is not installed"));
        }
    }
    Ok(output)
}

fn list(store: &FileStore) -> Output {
    let mut output = Output::default();
    let deps = store.dependencies();
    if deps.is_empty() {
        output.line("(empty)");
    }
    for (name, version) in deps {
        output.line(format!("{name}@{version}"));
    }
    output
}

pub(super) fn npm(args: &[String], store: &mut FileStore) -> CommandOutcome {
    let Some((subcommand, rest)) = args.split_first() else {
        return Ok(CommandResult::failure(
            "npm: missing command\nUsage: npm install|uninstall|list [PKG[@VERSION]...]",
        ));
    };
    // --save, -D and friends change nothing here
    let packages: Vec<&String> = rest.iter().filter(|a| !a.starts_with('-')).collect();

    let result = match subcommand.as_str() {
        "install" | "i" | "add" => install(&packages, store),
        "uninstall" | "remove" | "rm" | "un" => uninstall(&packages, store),
        "list" | "ls" => Ok(list(store)),
        other => {
            return Ok(CommandResult::failure(format!(
                "npm: unknown command '{other}'"
            )));
        }
    };

    match result {
        Ok(output) => output.finish(),
        Err(e) => {
            tracing::debug!("npm {} failed: {}", subcommand, e);
            Ok(CommandResult::failure(format!("npm: {e}")))
        }
    }
}

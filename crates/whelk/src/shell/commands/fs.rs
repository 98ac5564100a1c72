//! File listing and mutation builtins.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::SecondsFormat;

use crate::shell::flags::{Flag, FlagSpec};
use crate::shell::result::CommandResult;
use crate::store::{FileStore, StoreError, normalize_dir};

use super::{CommandOutcome, Output, basename, sources, trim_newline};

const LS: FlagSpec = FlagSpec::new(&[
    Flag::switch('l', "long"),
    Flag::switch('a', "all"),
    Flag::switch('R', "recursive"),
    Flag::switch('1', "one-per-line"),
]);

const CAT: FlagSpec = FlagSpec::new(&[Flag::switch('n', "number")]);

const RM: FlagSpec = FlagSpec::new(&[
    Flag::switch('r', "recursive"),
    Flag::switch('R', "recursive"),
    Flag::switch('f', "force"),
    Flag::switch('v', "verbose"),
]);

const MV: FlagSpec = FlagSpec::new(&[Flag::switch('f', "force"), Flag::switch('v', "verbose")]);

const CP: FlagSpec = FlagSpec::new(&[
    Flag::switch('r', "recursive"),
    Flag::switch('R', "recursive"),
    Flag::switch('f', "force"),
    Flag::switch('v', "verbose"),
]);

/// Whether `path` lies inside directory `prefix` (`""` is the root).
fn in_dir(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Normalized directory for an operand that names a directory with files.
fn existing_dir(store: &FileStore, operand: &str) -> Option<String> {
    normalize_dir(operand).ok().filter(|p| store.is_dir(p))
}

// ==================== ls ====================

pub(super) fn ls(args: &[String], store: &FileStore) -> CommandOutcome {
    let parsed = LS.parse(args);
    let long = parsed.has("long");
    let mut output = Output::default();

    let targets = if parsed.operands.is_empty() {
        vec![".".to_string()]
    } else {
        parsed.operands
    };

    for target in &targets {
        let listed: Vec<_> = match store.read_file(target) {
            Some(file) => vec![file],
            None => match normalize_dir(target) {
                Ok(prefix) => store.files().filter(|f| in_dir(&f.path, &prefix)).collect(),
                Err(_) => {
                    output.error(format!(
                        "ls: cannot access '{target}': No such file or directory"
                    ));
                    continue;
                }
            },
        };

        if listed.is_empty() {
            if targets.len() == 1 && normalize_dir(target).is_ok_and(|p| p.is_empty()) {
                output.line("No files");
            } else {
                output.line(format!("No files in {target}"));
            }
            continue;
        }

        for file in listed {
            if long {
                output.line(format!(
                    "{:>8}  {:<4}  {}",
                    file.size(),
                    file.language,
                    file.path
                ));
            } else {
                output.line(file.path.clone());
            }
        }
    }

    output.finish()
}

// ==================== cat ====================

pub(super) fn cat(args: &[String], stdin: Option<&str>, store: &FileStore) -> CommandOutcome {
    let parsed = CAT.parse(args);
    let mut output = Output::default();

    let mut operands = parsed.operands.clone();
    if operands.is_empty() {
        // `find ... | cat` reads the listed files
        if let Some(input) = stdin {
            let named: Vec<String> = input
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            if !named.is_empty() && named.iter().all(|n| store.exists(n)) {
                operands = named;
            }
        }
    }

    let found = sources("cat", &operands, stdin, store, &mut output);
    let mut number = 0;
    for source in found {
        let text = trim_newline(&source.text);
        if text.is_empty() {
            continue;
        }
        if parsed.has("number") {
            let numbered: Vec<String> = text
                .lines()
                .map(|line| {
                    number += 1;
                    format!("{number:>6}\t{line}")
                })
                .collect();
            output.line(numbered.join("\n"));
        } else {
            output.line(text);
        }
    }

    output.finish()
}

// ==================== rm ====================

pub(super) fn rm(args: &[String], store: &mut FileStore) -> CommandOutcome {
    let parsed = RM.parse(args);
    let force = parsed.has("force");
    let recursive = parsed.has("recursive");
    let mut output = Output::default();

    if parsed.operands.is_empty() && !force {
        output.error("rm: missing operand");
    }

    for operand in &parsed.operands {
        if store.exists(operand) {
            store.delete_file(operand)?;
            if parsed.has("verbose") {
                output.line(format!("removed '{operand}'"));
            }
            continue;
        }

        match normalize_dir(operand) {
            Ok(prefix) if prefix.is_empty() => {
                output.error(format!("rm: refusing to remove '{operand}'"));
            }
            Ok(prefix) if store.is_dir(&prefix) => {
                if !recursive {
                    output.error(format!("rm: cannot remove '{operand}': Is a directory"));
                    continue;
                }
                let doomed: Vec<String> = store.paths_under(&prefix).map(str::to_string).collect();
                tracing::debug!("Removing {} files under {}", doomed.len(), prefix);
                for path in doomed {
                    store.delete_file(&path)?;
                }
            }
            _ if force => {}
            _ => output.error(format!(
                "rm: cannot remove '{operand}': No such file or directory"
            )),
        }
    }

    output.finish()
}

// ==================== mv / cp ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Move,
    Copy,
}

impl Transfer {
    fn name(self) -> &'static str {
        match self {
            Transfer::Move => "mv",
            Transfer::Copy => "cp",
        }
    }

    fn apply(self, from: &str, to: &str, store: &mut FileStore) -> Result<(), StoreError> {
        match self {
            Transfer::Move => store.rename_file(from, to),
            Transfer::Copy => {
                let content = store
                    .read_file(from)
                    .map(|f| f.content.clone())
                    .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
                store.write_file(to, &content).map(|_| ())
            }
        }
    }
}

pub(super) fn mv(args: &[String], store: &mut FileStore) -> CommandOutcome {
    transfer(Transfer::Move, args, store)
}

pub(super) fn cp(args: &[String], store: &mut FileStore) -> CommandOutcome {
    transfer(Transfer::Copy, args, store)
}

fn transfer(mode: Transfer, args: &[String], store: &mut FileStore) -> CommandOutcome {
    let cmd = mode.name();
    let parsed = match mode {
        Transfer::Move => MV.parse(args),
        Transfer::Copy => CP.parse(args),
    };
    let recursive = mode == Transfer::Move || parsed.has("recursive");
    let mut output = Output::default();

    let Some((dest, srcs)) = parsed.operands.split_last() else {
        output.error(format!("{cmd}: missing file operand"));
        return output.finish();
    };
    if srcs.is_empty() {
        output.error(format!("{cmd}: missing destination file operand after '{dest}'"));
        return output.finish();
    }

    let into_dir =
        dest.ends_with('/') || srcs.len() > 1 || (!store.exists(dest) && store.is_dir(dest));

    for src in srcs {
        let target = if into_dir {
            format!("{}/{}", dest.trim_end_matches('/'), basename(src))
        } else {
            dest.clone()
        };

        if store.exists(src) {
            if let Err(e) = mode.apply(src, &target, store) {
                output.error(format!("{cmd}: {e}"));
            }
            continue;
        }

        let Some(prefix) = existing_dir(store, src).filter(|p| !p.is_empty()) else {
            output.error(format!(
                "{cmd}: cannot stat '{src}': No such file or directory"
            ));
            continue;
        };
        if !recursive {
            output.error(format!("{cmd}: -r not specified; omitting directory '{src}'"));
            continue;
        }

        let paths: Vec<String> = store.paths_under(&prefix).map(str::to_string).collect();
        let base = target.trim_end_matches('/');
        for path in paths {
            let to = format!("{base}{}", &path[prefix.len()..]);
            if let Err(e) = mode.apply(&path, &to, store) {
                output.error(format!("{cmd}: {e}"));
            }
        }
    }

    output.finish()
}

// ==================== touch ====================

pub(super) fn touch(args: &[String], store: &mut FileStore) -> CommandOutcome {
    let mut output = Output::default();
    let operands: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    if operands.is_empty() {
        output.error("touch: missing file operand");
    }
    for path in operands {
        if store.exists(path) {
            continue;
        }
        if let Err(e) = store.write_file(path, "") {
            output.error(format!("touch: cannot touch '{path}': {e}"));
        }
    }
    output.finish()
}

// ==================== tree ====================

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<String, Node>,
}

impl Node {
    fn insert<'a>(&mut self, mut segments: impl Iterator<Item = &'a str>) {
        if let Some(segment) = segments.next() {
            self.children
                .entry(segment.to_string())
                .or_default()
                .insert(segments);
        }
    }

    /// Render children below `indent`, returning (directories, files).
    fn render(&self, indent: &str, out: &mut String) -> Result<(usize, usize), std::fmt::Error> {
        let mut dirs = 0;
        let mut files = 0;
        let count = self.children.len();
        for (idx, (name, child)) in self.children.iter().enumerate() {
            let last = idx + 1 == count;
            let (branch, nested) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            writeln!(out, "{indent}{branch}{name}")?;
            if child.children.is_empty() {
                files += 1;
            } else {
                let (d, f) = child.render(&format!("{indent}{nested}"), out)?;
                dirs += d + 1;
                files += f;
            }
        }
        Ok((dirs, files))
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}

pub(super) fn tree(args: &[String], store: &FileStore) -> CommandOutcome {
    let dir = args
        .iter()
        .find(|a| !a.starts_with('-'))
        .map_or(".", String::as_str);

    let Some(prefix) = existing_dir(store, dir) else {
        return Ok(CommandResult::failure(format!(
            "tree: {dir}: No such file or directory"
        )));
    };

    let mut root = Node::default();
    for path in store.paths_under(&prefix) {
        let relative = if prefix.is_empty() {
            path
        } else {
            &path[prefix.len() + 1..]
        };
        root.insert(relative.split('/'));
    }

    let mut text = String::new();
    writeln!(text, "{}", if prefix.is_empty() { "." } else { prefix.as_str() })?;
    let (dirs, files) = root.render("", &mut text)?;
    write!(
        text,
        "\n{}, {}",
        plural(dirs, "directory", "directories"),
        plural(files, "file", "files")
    )?;

    Ok(CommandResult::ok(text))
}

// ==================== stat ====================

pub(super) fn stat(args: &[String], store: &FileStore) -> CommandOutcome {
    let mut output = Output::default();
    if args.is_empty() {
        output.error("stat: missing operand");
    }

    for operand in args {
        if let Some(file) = store.read_file(operand) {
            output.line(format!(
                "  File: {}\n  Size: {} bytes\n Lines: {}\n  Type: {}\nModify: {}",
                file.path,
                file.size(),
                file.line_count(),
                file.language,
                file.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        } else if let Some(prefix) = existing_dir(store, operand) {
            let label = if prefix.is_empty() { "." } else { prefix.as_str() };
            output.line(format!(
                "  File: {label}/\n  Type: directory\n Files: {}",
                store.paths_under(&prefix).count()
            ));
        } else {
            output.error(format!(
                "stat: cannot stat '{operand}': No such file or directory"
            ));
        }
    }

    output.finish()
}

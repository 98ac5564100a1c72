//! grep and find over the project files.

use std::collections::BTreeSet;

use ::glob::{MatchOptions, Pattern};
use regex_lite::Regex;

use crate::glob::GlobMatcher;
use crate::shell::flags::{Flag, FlagSpec};
use crate::shell::result::CommandResult;
use crate::store::{FileStore, compile_lenient, normalize_dir};

use super::{CommandOutcome, Output, basename};

const GREP: FlagSpec = FlagSpec::new(&[
    Flag::switch('i', "ignore-case"),
    Flag::switch('v', "invert-match"),
    Flag::switch('n', "line-number"),
    Flag::switch('c', "count"),
    Flag::switch('l', "files-with-matches"),
    Flag::switch('o', "only-matching"),
    Flag::switch('w', "word-regexp"),
    Flag::switch('F', "fixed-strings"),
    Flag::switch('E', "extended-regexp"),
    Flag::switch('r', "recursive"),
    Flag::switch('R', "recursive"),
    Flag::switch('H', "with-filename"),
    Flag::switch('h', "no-filename"),
    Flag::value('m', "max-count"),
    Flag::value('e', "regexp"),
    Flag::long_value("include"),
    Flag::long_value("exclude"),
]);

// ==================== grep ====================

fn build_regex(pattern: &str, fixed: bool, word: bool, ignore_case: bool) -> Option<Regex> {
    let mut source = if fixed || Regex::new(pattern).is_err() {
        regex_lite::escape(pattern)
    } else {
        pattern.to_string()
    };
    if word {
        source = format!(r"\b(?:{source})\b");
    }
    compile_lenient(&source, ignore_case)
}

/// Whether a glob matches either the file name or the full path.
fn filter_matches(filter: Option<&GlobMatcher>, path: &str) -> bool {
    filter.is_some_and(|m| m.is_match(path) || m.is_match(basename(path)))
}

pub(super) fn grep(args: &[String], stdin: Option<&str>, store: &FileStore) -> CommandOutcome {
    let parsed = GREP.parse(args);
    let mut operands = parsed.operands.iter();

    let pattern = match parsed.value("regexp") {
        Some(p) => p.to_string(),
        None => match operands.next() {
            Some(p) => p.clone(),
            None => {
                return Ok(CommandResult::failure(
                    "grep: missing pattern\nUsage: grep [OPTION]... PATTERN [FILE]...",
                ));
            }
        },
    };
    let targets: Vec<&String> = operands.collect();

    let Some(regex) = build_regex(
        &pattern,
        parsed.has("fixed-strings"),
        parsed.has("word-regexp"),
        parsed.has("ignore-case"),
    ) else {
        return Ok(CommandResult::failure(format!(
            "grep: pattern too large: {pattern}"
        )));
    };
    let max_count = match parsed.value("max-count").map(str::parse::<usize>) {
        Some(Ok(n)) => Some(n),
        Some(Err(_)) => return Ok(CommandResult::failure("grep: invalid max count")),
        None => None,
    };

    let include = parsed.value("include").map(GlobMatcher::new);
    let exclude = parsed.value("exclude").map(GlobMatcher::new);
    let wanted = |path: &str| {
        (include.is_none() || filter_matches(include.as_ref(), path))
            && !filter_matches(exclude.as_ref(), path)
    };

    let mut output = Output::default();
    // (display name, text)
    let mut inputs: Vec<(Option<String>, String)> = Vec::new();
    let mut show_names = false;

    if targets.is_empty() {
        match stdin {
            Some(text) => inputs.push((None, text.to_string())),
            None => {
                show_names = true;
                for file in store.files().filter(|f| wanted(f.path.as_str())) {
                    inputs.push((Some(file.path.clone()), file.content.clone()));
                }
            }
        }
    } else {
        show_names = targets.len() > 1;
        for target in targets {
            if let Some(file) = store.read_file(target) {
                inputs.push((Some(target.clone()), file.content.clone()));
                continue;
            }
            let prefix = normalize_dir(target).ok().filter(|p| store.is_dir(p));
            let Some(prefix) = prefix else {
                output.error(format!("grep: {target}: No such file or directory"));
                continue;
            };
            show_names = true;
            for path in store.paths_under(&prefix).filter(|p| wanted(*p)) {
                if let Some(file) = store.read_file(path) {
                    inputs.push((Some(file.path.clone()), file.content.clone()));
                }
            }
        }
    }

    if parsed.has("with-filename") {
        show_names = true;
    }
    if parsed.has("no-filename") {
        show_names = false;
    }

    let invert = parsed.has("invert-match");
    let count_only = parsed.has("count");
    let files_only = parsed.has("files-with-matches");
    let only_matching = parsed.has("only-matching") && !invert;
    let line_numbers = parsed.has("line-number");

    for (name, text) in &inputs {
        let shown = name.as_deref().unwrap_or("(standard input)");
        let mut count = 0;
        for (idx, line) in text.lines().enumerate() {
            if max_count.is_some_and(|max| count >= max) {
                break;
            }
            if regex.is_match(line) == invert {
                continue;
            }
            count += 1;
            if count_only || files_only {
                continue;
            }

            let mut prefix = String::new();
            if show_names {
                prefix.push_str(shown);
                prefix.push(':');
            }
            if line_numbers {
                prefix.push_str(&format!("{}:", idx + 1));
            }
            if only_matching {
                for m in regex.find_iter(line) {
                    output.line(format!("{prefix}{}", m.as_str()));
                }
            } else {
                output.line(format!("{prefix}{line}"));
            }
        }

        if files_only {
            if count > 0 {
                output.line(shown);
            }
        } else if count_only {
            if show_names {
                output.line(format!("{shown}:{count}"));
            } else {
                output.line(count.to_string());
            }
        }
    }

    output.finish()
}

// ==================== find ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Default)]
struct FindQuery {
    roots: Vec<String>,
    name: Option<(Pattern, bool)>,
    path: Option<Pattern>,
    kind: Option<EntryKind>,
    max_depth: Option<usize>,
}

fn parse_find(args: &[String]) -> Result<FindQuery, String> {
    let mut query = FindQuery::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut operand = || {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("find: missing argument to `{arg}'"))
        };
        match arg.as_str() {
            "-name" | "-iname" => {
                let raw = operand()?;
                let pattern =
                    Pattern::new(&raw).map_err(|e| format!("find: invalid pattern '{raw}': {e}"))?;
                query.name = Some((pattern, arg == "-iname"));
            }
            "-path" | "-wholename" => {
                let raw = operand()?;
                let pattern = Pattern::new(raw.trim_start_matches("./"))
                    .map_err(|e| format!("find: invalid pattern '{raw}': {e}"))?;
                query.path = Some(pattern);
            }
            "-type" => {
                query.kind = match operand()?.as_str() {
                    "f" => Some(EntryKind::File),
                    "d" => Some(EntryKind::Dir),
                    other => return Err(format!("find: Unknown argument to -type: {other}")),
                };
            }
            "-maxdepth" => {
                let raw = operand()?;
                query.max_depth = Some(
                    raw.parse()
                        .map_err(|_| format!("find: invalid -maxdepth value '{raw}'"))?,
                );
            }
            flag if flag.starts_with('-') => {
                tracing::debug!("find: ignoring unsupported predicate {}", flag);
            }
            root => query.roots.push(root.to_string()),
        }
    }
    if query.roots.is_empty() {
        query.roots.push(".".to_string());
    }
    Ok(query)
}

impl FindQuery {
    fn accepts(&self, path: &str, kind: EntryKind, depth: usize) -> bool {
        if self.kind.is_some_and(|k| k != kind) {
            return false;
        }
        if self.max_depth.is_some_and(|max| depth > max) {
            return false;
        }
        if let Some((pattern, ignore_case)) = &self.name {
            let options = MatchOptions {
                case_sensitive: !ignore_case,
                require_literal_separator: false,
                require_literal_leading_dot: false,
            };
            if !pattern.matches_with(basename(path), options) {
                return false;
            }
        }
        if let Some(pattern) = &self.path {
            if !pattern.matches(path) {
                return false;
            }
        }
        true
    }
}

pub(super) fn find(args: &[String], store: &FileStore) -> CommandOutcome {
    let query = match parse_find(args) {
        Ok(query) => query,
        Err(message) => return Ok(CommandResult::failure(message)),
    };

    let mut output = Output::default();
    let mut found = BTreeSet::new();

    for root in &query.roots {
        let Some(prefix) = normalize_dir(root).ok().filter(|p| store.is_dir(p) || store.exists(p))
        else {
            output.error(format!("find: '{root}': No such file or directory"));
            continue;
        };

        if store.exists(&prefix) {
            if query.accepts(&prefix, EntryKind::File, 0) {
                found.insert(prefix);
            }
            continue;
        }
        if !prefix.is_empty() && query.accepts(&prefix, EntryKind::Dir, 0) {
            found.insert(prefix.clone());
        }

        let skip = if prefix.is_empty() { 0 } else { prefix.len() + 1 };
        for path in store.paths_under(&prefix) {
            let relative = &path[skip..];
            let segments: Vec<&str> = relative.split('/').collect();
            if query.accepts(path, EntryKind::File, segments.len()) {
                found.insert(path.to_string());
            }
            // Directories are implied by the paths of their files
            for depth in 1..segments.len() {
                let dir = &path[..skip + segments[..depth].join("/").len()];
                if query.accepts(dir, EntryKind::Dir, depth) {
                    found.insert(dir.to_string());
                }
            }
        }
    }

    for path in found {
        output.line(path);
    }
    output.finish()
}

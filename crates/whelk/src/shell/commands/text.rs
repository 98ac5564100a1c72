//! Line-oriented text builtins: head, tail, wc, echo, sed, sort, uniq, tee.

use regex_lite::Regex;

use crate::shell::flags::{Flag, FlagSpec, ParsedArgs};
use crate::shell::result::CommandResult;
use crate::store::{FileStore, compile_lenient};

use super::{CommandOutcome, Output, Source, append_output, sources, trim_newline};

const HEAD: FlagSpec = FlagSpec::new(&[Flag::value('n', "lines"), Flag::switch('q', "quiet")])
    .with_numeric("lines");

const WC: FlagSpec = FlagSpec::new(&[
    Flag::switch('l', "lines"),
    Flag::switch('w', "words"),
    Flag::switch('c', "bytes"),
    Flag::switch('m', "chars"),
]);

const SED: FlagSpec = FlagSpec::new(&[
    Flag::switch('i', "in-place"),
    Flag::switch('E', "regexp-extended"),
    Flag::switch('r', "regexp-extended"),
    Flag::value('e', "expression"),
]);

const SORT: FlagSpec = FlagSpec::new(&[
    Flag::switch('r', "reverse"),
    Flag::switch('u', "unique"),
    Flag::switch('n', "numeric-sort"),
    Flag::switch('f', "ignore-case"),
]);

const UNIQ: FlagSpec = FlagSpec::new(&[
    Flag::switch('c', "count"),
    Flag::switch('d', "repeated"),
    Flag::switch('u', "unique"),
]);

const TEE: FlagSpec = FlagSpec::new(&[Flag::switch('a', "append")]);

const DEFAULT_LINES: usize = 10;

// ==================== head / tail ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    First(usize),
    Last(usize),
    From(usize),
}

impl Span {
    fn select<'a>(self, lines: &'a [&'a str]) -> &'a [&'a str] {
        match self {
            Span::First(n) => &lines[..n.min(lines.len())],
            Span::Last(n) => &lines[lines.len().saturating_sub(n)..],
            Span::From(n) => &lines[n.saturating_sub(1).min(lines.len())..],
        }
    }
}

fn parse_span(cmd: &str, parsed: &ParsedArgs) -> Result<Span, String> {
    let Some(raw) = parsed.value("lines") else {
        return Ok(if cmd == "head" {
            Span::First(DEFAULT_LINES)
        } else {
            Span::Last(DEFAULT_LINES)
        });
    };
    let invalid = || format!("{cmd}: invalid number of lines: '{raw}'");
    if cmd == "tail" {
        if let Some(from) = raw.strip_prefix('+') {
            return from.parse().map(Span::From).map_err(|_| invalid());
        }
    }
    let n: usize = raw.parse().map_err(|_| invalid())?;
    Ok(if cmd == "head" {
        Span::First(n)
    } else {
        Span::Last(n)
    })
}

fn head_or_tail(
    cmd: &str,
    args: &[String],
    stdin: Option<&str>,
    store: &FileStore,
) -> CommandOutcome {
    let parsed = HEAD.parse(args);
    let span = match parse_span(cmd, &parsed) {
        Ok(span) => span,
        Err(message) => return Ok(CommandResult::failure(message)),
    };

    let mut output = Output::default();
    let found = sources(cmd, &parsed.operands, stdin, store, &mut output);
    let headers = found.len() > 1 && !parsed.has("quiet");

    for (idx, source) in found.iter().enumerate() {
        if headers {
            if idx > 0 {
                output.line("");
            }
            output.line(format!(
                "==> {} <==",
                source.name.as_deref().unwrap_or("standard input")
            ));
        }
        let lines: Vec<&str> = source.text.lines().collect();
        let selected = span.select(&lines);
        if !selected.is_empty() {
            output.line(selected.join("\n"));
        }
    }

    output.finish()
}

pub(super) fn head(args: &[String], stdin: Option<&str>, store: &FileStore) -> CommandOutcome {
    head_or_tail("head", args, stdin, store)
}

pub(super) fn tail(args: &[String], stdin: Option<&str>, store: &FileStore) -> CommandOutcome {
    head_or_tail("tail", args, stdin, store)
}

// ==================== wc ====================

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    lines: usize,
    words: usize,
    chars: usize,
}

impl Counts {
    fn of(text: &str) -> Self {
        Self {
            lines: text.lines().count(),
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
        }
    }

    fn add(&mut self, other: Counts) {
        self.lines += other.lines;
        self.words += other.words;
        self.chars += other.chars;
    }
}

pub(super) fn wc(args: &[String], stdin: Option<&str>, store: &FileStore) -> CommandOutcome {
    let parsed = WC.parse(args);
    let want_lines = parsed.has("lines");
    let want_words = parsed.has("words");
    let want_chars = parsed.has("bytes") || parsed.has("chars");
    let all = !(want_lines || want_words || want_chars);

    let render = |counts: Counts, name: Option<&str>| {
        let mut fields = Vec::new();
        if all || want_lines {
            fields.push(counts.lines.to_string());
        }
        if all || want_words {
            fields.push(counts.words.to_string());
        }
        if all || want_chars {
            fields.push(counts.chars.to_string());
        }
        if let Some(name) = name {
            fields.push(name.to_string());
        }
        fields.join(" ")
    };

    let mut output = Output::default();
    let found = sources("wc", &parsed.operands, stdin, store, &mut output);
    let mut total = Counts::default();
    for source in &found {
        let counts = Counts::of(&source.text);
        total.add(counts);
        output.line(render(counts, source.name.as_deref()));
    }
    if found.len() > 1 {
        output.line(render(total, Some("total")));
    }

    output.finish()
}

// ==================== echo ====================

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub(super) fn echo(args: &[String]) -> CommandOutcome {
    let mut interpret = false;
    let mut start = 0;
    for arg in args {
        let is_flag = arg.len() > 1
            && arg.starts_with('-')
            && arg[1..].chars().all(|c| matches!(c, 'n' | 'e' | 'E'));
        if !is_flag {
            break;
        }
        if arg.contains('e') {
            interpret = true;
        }
        if arg.contains('E') {
            interpret = false;
        }
        start += 1;
    }

    let text = args[start..].join(" ");
    let text = if interpret { unescape(&text) } else { text };
    Ok(CommandResult::ok(text))
}

// ==================== sed ====================

#[derive(Debug)]
enum Address {
    Pattern(Regex),
    Line(usize),
    Last,
}

#[derive(Debug)]
enum SedScript {
    Substitute {
        regex: Regex,
        replacement: String,
        global: bool,
    },
    Delete(Address),
}

/// Split `body` on unescaped `delim`, turning `\<delim>` into `delim`.
fn split_delimited(body: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == delim {
            parts.push(std::mem::take(&mut current));
        } else if c == '\\' {
            match chars.next() {
                Some(next) if next == delim => current.push(delim),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            }
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Translate sed replacement syntax (`&`, `\1`) into regex replacement syntax.
fn convert_replacement(repl: &str) -> String {
    let mut out = String::with_capacity(repl.len());
    let mut chars = repl.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(d) if d.is_ascii_digit() => {
                    out.push_str("${");
                    out.push(d);
                    out.push('}');
                }
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('$') => out.push_str("$$"),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '&' => out.push_str("${0}"),
            '$' => out.push_str("$$"),
            c => out.push(c),
        }
    }
    out
}

fn parse_sed_script(expr: &str) -> Result<SedScript, String> {
    let mut chars = expr.chars();
    if chars.next() == Some('s') {
        if let Some(delim) = chars.next().filter(|c| !c.is_alphanumeric() && *c != '\\') {
            let parts = split_delimited(chars.as_str(), delim);
            if parts.len() != 3 {
                return Err("sed: unterminated `s' command".to_string());
            }
            let mut global = false;
            let mut ignore_case = false;
            for flag in parts[2].chars() {
                match flag {
                    'g' => global = true,
                    'i' | 'I' => ignore_case = true,
                    _ => return Err(format!("sed: unknown option to `s': {flag}")),
                }
            }
            let regex = compile_lenient(&parts[0], ignore_case)
                .ok_or_else(|| format!("sed: invalid regex '{}'", parts[0]))?;
            return Ok(SedScript::Substitute {
                regex,
                replacement: convert_replacement(&parts[1]),
                global,
            });
        }
    }

    if let Some(address) = expr.strip_suffix('d') {
        if address == "$" {
            return Ok(SedScript::Delete(Address::Last));
        }
        if let Ok(line) = address.parse::<usize>() {
            return Ok(SedScript::Delete(Address::Line(line)));
        }
        if let Some(pattern) = address
            .strip_prefix('/')
            .and_then(|a| a.strip_suffix('/'))
        {
            let regex = compile_lenient(pattern, false)
                .ok_or_else(|| format!("sed: invalid regex '{pattern}'"))?;
            return Ok(SedScript::Delete(Address::Pattern(regex)));
        }
    }

    Err(format!("sed: unsupported expression '{expr}'"))
}

impl SedScript {
    fn apply(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let count = lines.len();
        let mut kept = Vec::with_capacity(count);
        for (idx, line) in lines.into_iter().enumerate() {
            match self {
                SedScript::Substitute {
                    regex,
                    replacement,
                    global,
                } => {
                    let replaced = if *global {
                        regex.replace_all(line, replacement.as_str())
                    } else {
                        regex.replace(line, replacement.as_str())
                    };
                    kept.push(replaced.into_owned());
                }
                SedScript::Delete(address) => {
                    let doomed = match address {
                        Address::Pattern(regex) => regex.is_match(line),
                        Address::Line(n) => idx + 1 == *n,
                        Address::Last => idx + 1 == count,
                    };
                    if !doomed {
                        kept.push(line.to_string());
                    }
                }
            }
        }
        let mut result = kept.join("\n");
        if text.ends_with('\n') && !result.is_empty() {
            result.push('\n');
        }
        result
    }
}

pub(super) fn sed(args: &[String], stdin: Option<&str>, store: &mut FileStore) -> CommandOutcome {
    let parsed = SED.parse(args);
    let in_place = parsed.has("in-place");
    let mut operands = parsed.operands.clone();
    // BSD-style `sed -i '' ...`
    if in_place && operands.first().is_some_and(String::is_empty) {
        operands.remove(0);
    }

    let expr = match parsed.value("expression") {
        Some(expr) => expr.to_string(),
        None if operands.is_empty() => {
            return Ok(CommandResult::failure("sed: missing expression"));
        }
        None => operands.remove(0),
    };
    let script = match parse_sed_script(&expr) {
        Ok(script) => script,
        Err(message) => return Ok(CommandResult::failure(message)),
    };

    let mut output = Output::default();
    if in_place && operands.is_empty() {
        output.error("sed: -i requires a file operand");
        return output.finish();
    }

    let found = sources("sed", &operands, stdin, store, &mut output);
    for Source { name, text } in found {
        let edited = script.apply(&text);
        match name {
            Some(path) if in_place => {
                if edited != text {
                    store.write_file(&path, &edited)?;
                }
            }
            _ => {
                let shown = trim_newline(&edited);
                if !shown.is_empty() {
                    output.line(shown);
                }
            }
        }
    }

    output.finish()
}

// ==================== sort / uniq ====================

/// Leading number of a line for `sort -n`; lines without one sort as 0.
fn numeric_key(line: &str) -> f64 {
    let trimmed = line.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(idx, c)| !(c.is_ascii_digit() || c == '.' || (idx == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(idx, _)| idx);
    trimmed[..end].parse().unwrap_or(0.0)
}

pub(super) fn sort(args: &[String], stdin: Option<&str>, store: &FileStore) -> CommandOutcome {
    let parsed = SORT.parse(args);
    let mut output = Output::default();
    let found = sources("sort", &parsed.operands, stdin, store, &mut output);

    let mut lines: Vec<&str> = found.iter().flat_map(|s| s.text.lines()).collect();
    let ignore_case = parsed.has("ignore-case");
    if parsed.has("numeric-sort") {
        lines.sort_by(|a, b| numeric_key(a).total_cmp(&numeric_key(b)).then_with(|| a.cmp(b)));
    } else if ignore_case {
        lines.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
    } else {
        lines.sort_unstable();
    }
    if parsed.has("unique") {
        if ignore_case {
            // Same folding as the -f ordering so equal keys are adjacent
            lines.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());
        } else {
            lines.dedup();
        }
    }
    if parsed.has("reverse") {
        lines.reverse();
    }

    if !lines.is_empty() {
        output.line(lines.join("\n"));
    }
    output.finish()
}

pub(super) fn uniq(args: &[String], stdin: Option<&str>, store: &FileStore) -> CommandOutcome {
    let parsed = UNIQ.parse(args);
    let mut output = Output::default();
    let found = sources("uniq", &parsed.operands, stdin, store, &mut output);

    let mut groups: Vec<(&str, usize)> = Vec::new();
    for line in found.iter().flat_map(|s| s.text.lines()) {
        match groups.last_mut() {
            Some((last, count)) if *last == line => *count += 1,
            _ => groups.push((line, 1)),
        }
    }

    for (line, count) in groups {
        if parsed.has("repeated") && count < 2 {
            continue;
        }
        if parsed.has("unique") && count > 1 {
            continue;
        }
        if parsed.has("count") {
            output.line(format!("{count:>7} {line}"));
        } else {
            output.line(line);
        }
    }

    output.finish()
}

// ==================== tee ====================

pub(super) fn tee(args: &[String], stdin: Option<&str>, store: &mut FileStore) -> CommandOutcome {
    let parsed = TEE.parse(args);
    let input = stdin.unwrap_or_default();
    let mut output = Output::default();

    for path in &parsed.operands {
        let written = if parsed.has("append") {
            append_output(store, path, input)
        } else {
            store.write_file(path, input).map(|_| ())
        };
        if let Err(e) = written {
            output.error(format!("tee: {path}: {e}"));
        }
    }
    if !input.is_empty() {
        output.line(input);
    }

    output.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n")
    }

    // ==================== head / tail Tests ====================

    #[test]
    fn test_head_default_and_counts() {
        let store = FileStore::from_files([("log.md", numbered(15))]).unwrap();

        let result = head(&args(&["log.md"]), None, &store).unwrap();
        assert_eq!(result.stdout.lines().count(), 10);

        let result = head(&args(&["-n", "2", "log.md"]), None, &store).unwrap();
        assert_eq!(result.stdout, "line1\nline2");

        let result = head(&args(&["-3", "log.md"]), None, &store).unwrap();
        assert_eq!(result.stdout, "line1\nline2\nline3");
    }

    #[test]
    fn test_tail_variants() {
        let store = FileStore::from_files([("log.md", numbered(15))]).unwrap();

        let result = tail(&args(&["-2", "log.md"]), None, &store).unwrap();
        assert_eq!(result.stdout, "line14\nline15");

        let result = tail(&args(&["-n", "+14", "log.md"]), None, &store).unwrap();
        assert_eq!(result.stdout, "line14\nline15");
    }

    #[test]
    fn test_head_stdin_and_invalid_count() {
        let store = FileStore::new();
        let result = head(&args(&["-n1"]), Some("a\nb"), &store).unwrap();
        assert_eq!(result.stdout, "a");

        let result = head(&args(&["-n", "lots"]), Some("a"), &store).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("invalid number of lines"));
    }

    #[test]
    fn test_head_multiple_files_have_headers() {
        let store = FileStore::from_files([("a.md", "1"), ("b.md", "2")]).unwrap();
        let result = head(&args(&["a.md", "b.md"]), None, &store).unwrap();
        assert_eq!(result.stdout, "==> a.md <==\n1\n\n==> b.md <==\n2");
    }

    // ==================== wc Tests ====================

    #[test]
    fn test_wc() {
        let store = FileStore::from_files([("a.md", "one two\nthree\n")]).unwrap();

        let result = wc(&args(&["a.md"]), None, &store).unwrap();
        assert_eq!(result.stdout, "2 3 14 a.md");

        let result = wc(&args(&["-l"]), Some("x\ny\nz"), &store).unwrap();
        assert_eq!(result.stdout, "3");

        let result = wc(&args(&["-w", "a.md", "a.md"]), None, &store).unwrap();
        assert_eq!(result.stdout, "3 a.md\n3 a.md\n6 total");
    }

    // ==================== echo Tests ====================

    #[test]
    fn test_echo() {
        assert_eq!(echo(&args(&["hello", "world"])).unwrap().stdout, "hello world");
        assert_eq!(echo(&args(&["-n", "x"])).unwrap().stdout, "x");
        assert_eq!(echo(&args(&["-e", r"a\tb\nc"])).unwrap().stdout, "a\tb\nc");
        assert_eq!(echo(&args(&[r"a\nb"])).unwrap().stdout, r"a\nb");
        assert_eq!(echo(&args(&["-x"])).unwrap().stdout, "-x");
        assert_eq!(echo(&[]).unwrap().stdout, "");
    }

    // ==================== sed Tests ====================

    #[test]
    fn test_sed_substitute_stdout() {
        let mut store = FileStore::from_files([("a.ts", "foo foo\nbar foo\n")]).unwrap();

        let result = sed(&args(&["s/foo/baz/", "a.ts"]), None, &mut store).unwrap();
        assert_eq!(result.stdout, "baz foo\nbar baz");

        let result = sed(&args(&["s/foo/baz/g", "a.ts"]), None, &mut store).unwrap();
        assert_eq!(result.stdout, "baz baz\nbar baz");
        assert_eq!(store.read_file("a.ts").unwrap().content, "foo foo\nbar foo\n");
    }

    #[test]
    fn test_sed_in_place_preserves_trailing_newline() {
        let mut store = FileStore::from_files([("a.ts", "const A = 1;\n")]).unwrap();

        let result = sed(&args(&["-i", "s/A/B/", "a.ts"]), None, &mut store).unwrap();

        assert!(result.stdout.is_empty());
        assert_eq!(store.read_file("a.ts").unwrap().content, "const B = 1;\n");
    }

    #[test]
    fn test_sed_delimiters_groups_and_case() {
        let store_text = "path/to/file";
        let mut store = FileStore::new();

        let result = sed(&args(&["s|/|::|g"]), Some(store_text), &mut store).unwrap();
        assert_eq!(result.stdout, "path::to::file");

        let result = sed(&args(&[r"s/(\w+)@(\w+)/\2 at \1/"]), Some("me@home"), &mut store).unwrap();
        assert_eq!(result.stdout, "home at me");

        let result = sed(&args(&["s/hello/[&]/I"]), Some("HELLO there"), &mut store).unwrap();
        assert_eq!(result.stdout, "[HELLO] there");

        let result = sed(&args(&["s/x/$5/"]), Some("x"), &mut store).unwrap();
        assert_eq!(result.stdout, "$5");
    }

    #[test]
    fn test_sed_delete() {
        let mut store = FileStore::new();
        let text = "keep\ndrop me\nkeep too";

        let result = sed(&args(&["/drop/d"]), Some(text), &mut store).unwrap();
        assert_eq!(result.stdout, "keep\nkeep too");

        let result = sed(&args(&["1d"]), Some(text), &mut store).unwrap();
        assert_eq!(result.stdout, "drop me\nkeep too");

        let result = sed(&args(&["$d"]), Some(text), &mut store).unwrap();
        assert_eq!(result.stdout, "keep\ndrop me");
    }

    #[test]
    fn test_sed_invalid_regex_is_literal() {
        let mut store = FileStore::new();
        let result = sed(&args(&["s/foo(/bar/"]), Some("call foo(1)"), &mut store).unwrap();
        assert_eq!(result.stdout, "call bar1)");
    }

    #[test]
    fn test_sed_errors() {
        let mut store = FileStore::new();
        assert_eq!(sed(&[], Some("x"), &mut store).unwrap().exit_code, 1);
        assert_eq!(
            sed(&args(&["s/a/b"]), Some("a"), &mut store).unwrap().stderr,
            "sed: unterminated `s' command"
        );
        assert_eq!(sed(&args(&["-i", "s/a/b/"]), Some("a"), &mut store).unwrap().exit_code, 1);
        assert_eq!(sed(&args(&["y/a/b/"]), Some("a"), &mut store).unwrap().exit_code, 1);
    }

    // ==================== sort / uniq Tests ====================

    #[test]
    fn test_sort_flags() {
        let store = FileStore::new();
        let input = "b\na\nb\nc\na";

        assert_eq!(sort(&[], Some(input), &store).unwrap().stdout, "a\na\nb\nb\nc");
        assert_eq!(sort(&args(&["-u"]), Some(input), &store).unwrap().stdout, "a\nb\nc");
        assert_eq!(sort(&args(&["-ru"]), Some(input), &store).unwrap().stdout, "c\nb\na");
        assert_eq!(
            sort(&args(&["-n"]), Some("10 ten\n9 nine\n100\nx"), &store).unwrap().stdout,
            "x\n9 nine\n10 ten\n100"
        );
    }

    #[test]
    fn test_sort_ignore_case_unique() {
        let store = FileStore::new();

        assert_eq!(sort(&args(&["-fu"]), Some("B\na\nb"), &store).unwrap().stdout, "a\nB");
        assert_eq!(
            sort(&args(&["-f", "-u"]), Some("éa\nb\nÉa"), &store).unwrap().stdout,
            "b\nÉa"
        );
    }

    #[test]
    fn test_uniq() {
        let store = FileStore::new();
        let input = "a\na\nb\na";

        assert_eq!(uniq(&[], Some(input), &store).unwrap().stdout, "a\nb\na");
        assert_eq!(
            uniq(&args(&["-c"]), Some(input), &store).unwrap().stdout,
            "      2 a\n      1 b\n      1 a"
        );
        assert_eq!(uniq(&args(&["-d"]), Some(input), &store).unwrap().stdout, "a");
    }

    // ==================== tee Tests ====================

    #[test]
    fn test_tee_writes_and_passes_through() {
        let mut store = FileStore::new();

        let result = tee(&args(&["out.md"]), Some("hello"), &mut store).unwrap();
        assert_eq!(result.stdout, "hello");
        assert_eq!(store.read_file("out.md").unwrap().content, "hello");

        tee(&args(&["-a", "out.md"]), Some("again"), &mut store).unwrap();
        assert_eq!(store.read_file("out.md").unwrap().content, "hello\nagain");
    }
}

//! Command-line execution: `;`, `&&`/`||`, `|` and redirections.
//!
//! A line is split into `;` segments, each segment into a chain of
//! `&&`-joined or `||`-joined pipelines, and each pipeline into `|` stages.
//! All splitting ignores operators inside quotes. Stage stdout becomes the
//! next stage's stdin as a whole buffer.

use crate::glob::{GlobMatcher, is_glob};
use crate::store::FileStore;

use super::commands::{self, append_output};
use super::result::{CommandResult, join_into};
use super::tokenizer::{Token, tokenize_words};

const DEV_NULL: &str = "/dev/null";

/// Split `s` on any of `ops` outside quotes.
///
/// Each piece is paired with the operator that preceded it.
fn split_unquoted<'a>(s: &'a str, ops: &[&'static str]) -> Vec<(Option<&'static str>, &'a str)> {
    let bytes = s.as_bytes();
    let mut pieces = Vec::new();
    let mut quote: Option<u8> = None;
    let mut prev_op = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if b == b'"' || b == b'\'' {
            quote = Some(b);
            i += 1;
            continue;
        }
        match ops.iter().find(|op| bytes[i..].starts_with(op.as_bytes())) {
            Some(op) => {
                pieces.push((prev_op, &s[start..i]));
                prev_op = Some(*op);
                i += op.len();
                start = i;
            }
            None => i += 1,
        }
    }
    pieces.push((prev_op, &s[start..]));
    pieces
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainOp {
    And,
    Or,
}

/// Where a stream of one stage goes instead of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Redirect {
    target: String,
    append: bool,
}

/// One `|` stage with its redirections removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Stage {
    words: Vec<Token>,
    stdout: Option<Redirect>,
    stderr: Option<Redirect>,
    merge_stderr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectOp {
    Out { append: bool },
    Err { append: bool },
    ErrToOut,
}

/// Pad unquoted redirection operators with spaces so `echo hi>out.txt`
/// tokenizes like `echo hi > out.txt`.
///
/// A `1` or `2` directly before `>` belongs to the operator only when it
/// starts a word (`a2>b` redirects the word `a2`).
fn isolate_redirects(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            out.push(c);
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
            continue;
        }
        if c != '>' {
            out.push(c);
            continue;
        }

        let mut op = String::new();
        let mut tail = out.chars().rev();
        if let Some(fd @ ('1' | '2')) = tail.next() {
            if tail.next().is_none_or(char::is_whitespace) {
                out.pop();
                op.push(fd);
            }
        }
        op.push('>');
        if chars.next_if_eq(&'>').is_some() {
            op.push('>');
        } else if op == "2>" && chars.next_if_eq(&'&').is_some() {
            op.push('&');
            if let Some(target) = chars.next_if(char::is_ascii_digit) {
                op.push(target);
            }
        }
        out.push(' ');
        out.push_str(&op);
        out.push(' ');
    }
    out
}

/// Recognize a redirection operator at the start of an unquoted word.
///
/// Returns the operator and any target text attached to it (`>out.txt`).
fn redirect_op(word: &str) -> Option<(RedirectOp, &str)> {
    if word == "2>&1" {
        return Some((RedirectOp::ErrToOut, ""));
    }
    const TABLE: &[(&str, RedirectOp)] = &[
        ("2>>", RedirectOp::Err { append: true }),
        ("2>", RedirectOp::Err { append: false }),
        ("1>>", RedirectOp::Out { append: true }),
        ("1>", RedirectOp::Out { append: false }),
        (">>", RedirectOp::Out { append: true }),
        (">", RedirectOp::Out { append: false }),
    ];
    TABLE
        .iter()
        .find_map(|(prefix, op)| word.strip_prefix(prefix).map(|rest| (*op, rest)))
}

fn parse_stage(text: &str) -> Result<Stage, String> {
    let mut stage = Stage::default();
    let mut tokens = tokenize_words(&isolate_redirects(text)).into_iter();

    while let Some(token) = tokens.next() {
        let op = if token.quoted {
            None
        } else {
            redirect_op(&token.text)
        };
        let Some((op, attached)) = op else {
            stage.words.push(token);
            continue;
        };
        if op == RedirectOp::ErrToOut {
            stage.merge_stderr = true;
            continue;
        }
        let target = if attached.is_empty() {
            match tokens.next() {
                Some(t) => t.text,
                None => return Err("syntax error: missing redirection target".to_string()),
            }
        } else {
            attached.to_string()
        };
        match op {
            RedirectOp::Out { append } => stage.stdout = Some(Redirect { target, append }),
            RedirectOp::Err { append } => stage.stderr = Some(Redirect { target, append }),
            RedirectOp::ErrToOut => {}
        }
    }
    Ok(stage)
}

/// Expand unquoted glob words against the store. The command name is kept.
fn expand_words(words: Vec<Token>, store: &FileStore) -> Vec<String> {
    let mut args = Vec::with_capacity(words.len());
    for (idx, word) in words.into_iter().enumerate() {
        if idx == 0 || word.quoted || !is_glob(&word.text) {
            args.push(word.text);
            continue;
        }
        let matches = GlobMatcher::new(&word.text).filter(store.paths());
        if matches.is_empty() {
            tracing::debug!("Glob {} matched nothing, passing it through", word.text);
            args.push(word.text);
        } else {
            args.extend(matches);
        }
    }
    args
}

/// Write `text` to a redirection target. `/dev/null` swallows it.
fn write_redirect(redirect: &Redirect, text: &str, store: &mut FileStore) -> Result<(), String> {
    if redirect.target == DEV_NULL {
        return Ok(());
    }
    tracing::debug!(
        "Redirecting {} bytes to {} (append: {})",
        text.len(),
        redirect.target,
        redirect.append
    );
    let written = if redirect.append {
        append_output(store, &redirect.target, text)
    } else {
        store.write_file(&redirect.target, text).map(|_| ())
    };
    written.map_err(|e| format!("{}: {}", redirect.target, e))
}

fn run_stage(stage: Stage, stdin: Option<&str>, store: &mut FileStore) -> CommandResult {
    let Stage {
        words,
        stdout,
        stderr,
        merge_stderr,
    } = stage;

    let mut result = if words.is_empty() {
        CommandResult::default()
    } else {
        let mut args = expand_words(words, store);
        let name = args.remove(0);
        commands::dispatch(&name, &args, stdin, store)
    };

    if merge_stderr {
        let err = std::mem::take(&mut result.stderr);
        join_into(&mut result.stdout, &err);
    }

    if let Some(redirect) = &stderr {
        let err = std::mem::take(&mut result.stderr);
        if let Err(e) = write_redirect(redirect, &err, store) {
            result.stderr = e;
            result.exit_code = 1;
        }
    }

    if let Some(redirect) = &stdout {
        let out = std::mem::take(&mut result.stdout);
        match write_redirect(redirect, &out, store) {
            Ok(()) if redirect.target != DEV_NULL => result.exit_code = 0,
            Ok(()) => {}
            Err(e) => {
                join_into(&mut result.stderr, &e);
                result.exit_code = 1;
            }
        }
    }

    result
}

/// Run one `|` pipeline. Only the last stage's stderr and exit code survive.
fn run_pipeline(text: &str, store: &mut FileStore) -> CommandResult {
    let parts = split_unquoted(text, &["|"]);
    let many = parts.len() > 1;

    let mut stages = Vec::with_capacity(parts.len());
    for (_, part) in parts {
        if part.trim().is_empty() && many {
            return CommandResult::failure("syntax error near '|'");
        }
        match parse_stage(part) {
            Ok(stage) => stages.push(stage),
            Err(e) => return CommandResult::failure(e),
        }
    }

    let mut piped: Option<String> = None;
    let mut last = CommandResult::default();
    let count = stages.len();
    for (idx, stage) in stages.into_iter().enumerate() {
        last = run_stage(stage, piped.as_deref(), store);
        if idx + 1 < count {
            piped = Some(std::mem::take(&mut last.stdout));
        }
    }
    last
}

/// Run one `;` segment: a single pipeline or an `&&`/`||` chain.
fn run_segment(text: &str, store: &mut FileStore) -> CommandResult {
    let parts = split_unquoted(text, &["&&", "||"]);

    let mut chain_op = None;
    for (op, _) in &parts {
        let op = match *op {
            Some("&&") => ChainOp::And,
            Some(_) => ChainOp::Or,
            None => continue,
        };
        match chain_op {
            Some(existing) if existing != op => {
                return CommandResult::failure(
                    "mixing '&&' and '||' in one command is not supported; split it with ';'",
                );
            }
            _ => chain_op = Some(op),
        }
    }

    if parts.len() > 1 {
        if let Some((op, _)) = parts.iter().find(|(_, p)| p.trim().is_empty()) {
            let near = (*op).unwrap_or(match chain_op {
                Some(ChainOp::Or) => "||",
                _ => "&&",
            });
            return CommandResult::failure(format!("syntax error near '{near}'"));
        }
    }

    let mut combined = CommandResult::default();
    for (_, part) in parts {
        let result = run_pipeline(part, store);
        join_into(&mut combined.stdout, &result.stdout);
        join_into(&mut combined.stderr, &result.stderr);
        combined.exit_code = result.exit_code;

        let stop = match chain_op {
            Some(ChainOp::And) => !result.success(),
            Some(ChainOp::Or) => result.success(),
            None => false,
        };
        if stop {
            break;
        }
    }
    combined
}

/// Run a full command line against `store`.
pub(crate) fn run_line(line: &str, store: &mut FileStore) -> CommandResult {
    let mut combined = CommandResult::default();
    for (_, segment) in split_unquoted(line, &[";"]) {
        if segment.trim().is_empty() {
            continue;
        }
        let result = run_segment(segment, store);
        join_into(&mut combined.stdout, &result.stdout);
        join_into(&mut combined.stderr, &result.stderr);
        combined.exit_code = result.exit_code;
    }
    combined
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> FileStore {
        FileStore::from_files([
            ("App.tsx", "export default function App() {}"),
            ("src/index.ts", "import App from './App';"),
            ("notes.md", "b\na\nb"),
        ])
        .unwrap()
    }

    // ==================== Splitting Tests ====================

    #[test]
    fn test_split_unquoted_respects_quotes() {
        let pieces = split_unquoted(r#"grep "a|b" x | wc -l"#, &["|"]);
        let texts: Vec<&str> = pieces.iter().map(|(_, p)| *p).collect();
        assert_eq!(texts, vec![r#"grep "a|b" x "#, " wc -l"]);
        assert_eq!(pieces[1].0, Some("|"));
    }

    #[test]
    fn test_split_chain_operators() {
        let pieces = split_unquoted("a && b || c", &["&&", "||"]);
        let ops: Vec<Option<&str>> = pieces.iter().map(|(op, _)| *op).collect();
        assert_eq!(ops, vec![None, Some("&&"), Some("||")]);
    }

    #[test]
    fn test_parse_stage_redirects() {
        let stage = parse_stage("echo hi > out.txt").unwrap();
        assert_eq!(stage.words.len(), 2);
        assert_eq!(
            stage.stdout,
            Some(Redirect {
                target: "out.txt".to_string(),
                append: false
            })
        );

        let stage = parse_stage("cat a 2>/dev/null >>log.md").unwrap();
        assert_eq!(stage.stderr.unwrap().target, DEV_NULL);
        assert!(stage.stdout.unwrap().append);

        let stage = parse_stage("cat a 2>&1").unwrap();
        assert!(stage.merge_stderr);
    }

    #[test]
    fn test_parse_stage_attached_redirects() {
        let stage = parse_stage(r#"echo "hello">out.txt"#).unwrap();
        let words: Vec<&str> = stage.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(words, vec!["echo", "hello"]);
        assert_eq!(stage.stdout.unwrap().target, "out.txt");

        let stage = parse_stage("cat a.ts b.ts>>all.ts 2>/dev/null").unwrap();
        assert_eq!(stage.words.len(), 3);
        assert!(stage.stdout.unwrap().append);
        assert_eq!(stage.stderr.unwrap().target, DEV_NULL);

        let stage = parse_stage("cat missing.ts 2>&1").unwrap();
        assert!(stage.merge_stderr);
        assert_eq!(stage.words.len(), 2);

        // A digit inside a word is part of the word
        let stage = parse_stage("echo v2>out.txt").unwrap();
        assert_eq!(stage.words[1].text, "v2");
        assert!(stage.stderr.is_none());
    }

    #[test]
    fn test_parse_stage_quoted_operator_is_literal() {
        let stage = parse_stage(r#"echo ">" x"#).unwrap();
        assert_eq!(stage.words.len(), 3);
        assert!(stage.stdout.is_none());
    }

    #[test]
    fn test_parse_stage_missing_target() {
        assert_eq!(
            parse_stage("echo hi >").unwrap_err(),
            "syntax error: missing redirection target"
        );
    }

    #[test]
    fn test_expand_words() {
        let words = vec![Token::bare("cat"), Token::bare("*.tsx"), Token::bare("*.py")];
        assert_eq!(expand_words(words, &store()), vec!["cat", "App.tsx", "*.py"]);

        let quoted = vec![
            Token::bare("find"),
            Token {
                text: "*.tsx".to_string(),
                quoted: true,
            },
        ];
        assert_eq!(expand_words(quoted, &store()), vec!["find", "*.tsx"]);
    }

    // ==================== Execution Tests ====================

    #[test]
    fn test_empty_line() {
        let result = run_line("   ", &mut store());
        assert_eq!(result, CommandResult::default());
    }

    #[test]
    fn test_semicolon_returns_last_status() {
        let result = run_line("cat missing.ts; echo done", &mut store());
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "done");
        assert!(result.stderr.contains("No such file"));
    }

    #[test]
    fn test_mixed_chain_rejected() {
        let result = run_line("true && false || echo x", &mut store());
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("mixing '&&' and '||'"));
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_dangling_operators() {
        let result = run_line("ls |", &mut store());
        assert_eq!(result.stderr, "syntax error near '|'");

        let result = run_line("ls &&", &mut store());
        assert_eq!(result.stderr, "syntax error near '&&'");
    }

    #[test]
    fn test_pipeline_hides_earlier_stderr() {
        let result = run_line("cat missing.ts | wc -l", &mut store());
        assert_eq!(result.exit_code, 0);
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn test_redirect_writes_and_appends() {
        let mut store = store();
        let result = run_line("echo one > out.md", &mut store);
        assert_eq!(result, CommandResult::default());

        run_line("echo two >> out.md", &mut store);
        assert_eq!(store.read_file("out.md").unwrap().content, "one\ntwo");
    }

    #[test]
    fn test_redirect_without_spaces() {
        let mut store = store();
        let result = run_line(r#"echo "hello">out.txt"#, &mut store);
        assert_eq!(result, CommandResult::default());
        assert_eq!(store.read_file("out.txt").unwrap().content, "hello");

        run_line("echo hi>>out.txt", &mut store);
        assert_eq!(store.read_file("out.txt").unwrap().content, "hello\nhi");

        let result = run_line(r#"echo "a > b""#, &mut store);
        assert_eq!(result.stdout, "a > b");
    }

    #[test]
    fn test_redirect_to_invalid_path() {
        let result = run_line("echo x > ../escape.md", &mut store());
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("invalid path"));
    }

    #[test]
    fn test_stderr_redirects() {
        let result = run_line("cat missing.ts 2>/dev/null", &mut store());
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.is_empty());

        let result = run_line("cat missing.ts 2>&1", &mut store());
        assert!(result.stdout.contains("No such file"));
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn test_dev_null_discards_stdout() {
        let mut store = store();
        let before = store.history_len();
        let result = run_line("cat App.tsx > /dev/null", &mut store);
        assert!(result.stdout.is_empty());
        assert_eq!(store.history_len(), before);
    }
}

//! Shell plumbing: `xargs` and `help`.

use crate::shell::result::{CommandResult, join_into};
use crate::shell::tokenizer::tokenize;
use crate::store::FileStore;

use super::{Builtin, CommandOutcome, Output, dispatch};

#[derive(Debug)]
struct XargsOpts {
    batch: usize,
    replace: Option<String>,
    command: Vec<String>,
}

/// Options end at the first word that is not an xargs flag; the rest is
/// the command.
fn parse_xargs(args: &[String]) -> Result<XargsOpts, String> {
    let mut opts = XargsOpts {
        batch: 1,
        replace: None,
        command: Vec::new(),
    };
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let (flag, attached) = match arg {
            "-n" | "-I" | "-L" => (arg, None),
            _ if arg.starts_with("-n") || arg.starts_with("-L") || arg.starts_with("-I") => {
                (&arg[..2], Some(&arg[2..]))
            }
            "-r" | "--no-run-if-empty" | "-0" | "-t" => {
                i += 1;
                continue;
            }
            _ => break,
        };
        let value = match attached {
            Some(v) => v.to_string(),
            None => {
                i += 1;
                args.get(i)
                    .cloned()
                    .ok_or_else(|| format!("xargs: option requires an argument -- '{}'", &flag[1..]))?
            }
        };
        if flag == "-I" {
            opts.replace = Some(value);
        } else {
            opts.batch = value
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("xargs: invalid number for {flag}: '{value}'"))?;
        }
        i += 1;
    }
    opts.command = args[i..].to_vec();
    if opts.command.is_empty() {
        opts.command.push("echo".to_string());
    }
    Ok(opts)
}

pub(super) fn xargs(args: &[String], stdin: Option<&str>, store: &mut FileStore) -> CommandOutcome {
    let opts = match parse_xargs(args) {
        Ok(opts) => opts,
        Err(message) => return Ok(CommandResult::failure(message)),
    };
    let input = stdin.unwrap_or_default();

    // -I substitutes whole lines; otherwise stdin is split into words
    let invocations: Vec<Vec<String>> = match &opts.replace {
        Some(marker) => input
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|line| {
                opts.command
                    .iter()
                    .map(|word| word.replace(marker.as_str(), line))
                    .collect()
            })
            .collect(),
        None => tokenize(input)
            .chunks(opts.batch)
            .map(|chunk| {
                let mut words = opts.command.clone();
                words.extend_from_slice(chunk);
                words
            })
            .collect(),
    };

    let limit = store.limits().max_xargs_invocations;
    if invocations.len() > limit {
        return Ok(CommandResult::failure(format!(
            "xargs: too many invocations ({}, limit {limit})",
            invocations.len()
        )));
    }
    tracing::debug!("xargs running {} invocations", invocations.len());

    let mut combined = CommandResult::default();
    for words in invocations {
        let Some((name, rest)) = words.split_first() else {
            continue;
        };
        let result = dispatch(name, rest, None, store);
        join_into(&mut combined.stdout, &result.stdout);
        join_into(&mut combined.stderr, &result.stderr);
        if !result.success() {
            combined.exit_code = 1;
        }
    }
    Ok(combined)
}

pub(super) fn help(args: &[String]) -> CommandOutcome {
    if let Some(topic) = args.first() {
        return Ok(match Builtin::from_name(topic) {
            Some(builtin) => CommandResult::ok(builtin.usage()),
            None => CommandResult::failure(format!("help: no help topics match '{topic}'")),
        });
    }

    let mut output = Output::default();
    output.line("Available commands:");
    for builtin in Builtin::ALL {
        output.line(format!("  {}", builtin.usage()));
    }
    output.finish()
}

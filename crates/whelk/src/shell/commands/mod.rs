//! Builtin commands.
//!
//! Every command is a variant of the closed [`Builtin`] enum. Name lookup
//! happens once in [`Builtin::from_name`] and [`Builtin::run`] dispatches with
//! an exhaustive match. Implementations are grouped by family:
//!
//! - `fs`: listing and file mutation (`ls`, `cat`, `rm`, `mv`, `cp`, ...)
//! - `text`: line filters (`head`, `tail`, `wc`, `sed`, `sort`, ...)
//! - `search`: `grep` and `find`
//! - `npm`: dependency edits on `package.json`
//! - `project`: session summaries (`project`, `errors`, `deps`, `plan`, `undo`)
//! - `misc`: shell plumbing (`pwd`, `cd`, `xargs`, `help`, ...)

mod fs;
mod misc;
mod npm;
mod project;
mod search;
mod text;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::store::{FileStore, StoreError};

use super::result::CommandResult;

/// Fault inside a builtin.
///
/// Never returned from [`crate::execute_command`]; the dispatcher turns it
/// into an exit code of 1.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Store operation failed unexpectedly
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Formatting output failed
    #[error("formatting failed: {0}")]
    Format(#[from] fmt::Error),
    /// Anything else, including panics
    #[error("{0}")]
    Internal(String),
}

type CommandOutcome = Result<CommandResult, CommandError>;

macro_rules! builtins {
    ($($variant:ident => $name:literal, $usage:literal;)+) => {
        /// A builtin command.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $(
                #[doc = $usage]
                $variant,
            )+
        }

        impl Builtin {
            /// Every builtin, in `help` order.
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant),+];

            /// Look up a builtin by command name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Builtin::$variant),)+
                    _ => None,
                }
            }

            /// Command name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name,)+
                }
            }

            /// One-line usage.
            pub fn usage(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $usage,)+
                }
            }
        }
    };
}

builtins! {
    Ls => "ls", "ls [-l] [DIR|FILE...]  list files";
    Cat => "cat", "cat [-n] [FILE...]  print file contents";
    Head => "head", "head [-n N | -N] [FILE...]  first lines";
    Tail => "tail", "tail [-n N | -N | -n +N] [FILE...]  last lines";
    Grep => "grep", "grep [-icvnlwFHh] [-m N] [--include GLOB] PATTERN [FILE|DIR...]  search contents";
    Find => "find", "find [DIR] [-name GLOB] [-iname GLOB] [-type f|d]  find files by name";
    Wc => "wc", "wc [-lwc] [FILE...]  count lines, words and characters";
    Echo => "echo", "echo [-n] [-e] [TEXT...]  print text";
    Rm => "rm", "rm [-rf] FILE...  delete files";
    Mv => "mv", "mv SRC... DST  move or rename";
    Cp => "cp", "cp [-r] SRC... DST  copy files";
    Touch => "touch", "touch FILE...  create empty files";
    Mkdir => "mkdir", "mkdir [-p] DIR...  accepted for compatibility; directories are implicit";
    Tree => "tree", "tree [DIR]  show the directory tree";
    Stat => "stat", "stat FILE...  show file details";
    Sed => "sed", "sed [-i] 's/PAT/REPL/[gi]' | '/PAT/d' [FILE...]  edit lines";
    Sort => "sort", "sort [-rnuf] [FILE...]  sort lines";
    Uniq => "uniq", "uniq [-cd] [FILE...]  collapse repeated lines";
    Tee => "tee", "tee [-a] FILE...  copy stdin to files";
    Xargs => "xargs", "xargs [-n N] [-I STR] [CMD [ARG...]]  run CMD for each stdin word";
    Npm => "npm", "npm install|uninstall|list [PKG[@VERSION]...]  manage package.json dependencies";
    Project => "project", "project  summarize the project";
    Errors => "errors", "errors [clear]  show or clear reported errors";
    Deps => "deps", "deps  list dependencies";
    Plan => "plan", "plan [start|done|reset ID]  show or update the task plan";
    Undo => "undo", "undo  revert the last file change";
    Pwd => "pwd", "pwd  print the working directory";
    Cd => "cd", "cd [DIR]  accepted for compatibility; the working directory is fixed";
    True => "true", "true  succeed";
    False => "false", "false  fail";
    Help => "help", "help [CMD]  list commands or show one command's usage";
}

impl Builtin {
    /// Run this builtin.
    pub(crate) fn run(
        self,
        args: &[String],
        stdin: Option<&str>,
        store: &mut FileStore,
    ) -> CommandOutcome {
        match self {
            Builtin::Ls => fs::ls(args, store),
            Builtin::Cat => fs::cat(args, stdin, store),
            Builtin::Rm => fs::rm(args, store),
            Builtin::Mv => fs::mv(args, store),
            Builtin::Cp => fs::cp(args, store),
            Builtin::Touch => fs::touch(args, store),
            Builtin::Mkdir => Ok(CommandResult::default()),
            Builtin::Tree => fs::tree(args, store),
            Builtin::Stat => fs::stat(args, store),
            Builtin::Head => text::head(args, stdin, store),
            Builtin::Tail => text::tail(args, stdin, store),
            Builtin::Wc => text::wc(args, stdin, store),
            Builtin::Echo => text::echo(args),
            Builtin::Sed => text::sed(args, stdin, store),
            Builtin::Sort => text::sort(args, stdin, store),
            Builtin::Uniq => text::uniq(args, stdin, store),
            Builtin::Tee => text::tee(args, stdin, store),
            Builtin::Grep => search::grep(args, stdin, store),
            Builtin::Find => search::find(args, store),
            Builtin::Npm => npm::npm(args, store),
            Builtin::Project => project::project(store),
            Builtin::Errors => project::errors(args, store),
            Builtin::Deps => project::deps(store),
            Builtin::Plan => project::plan(args, store),
            Builtin::Undo => project::undo(store),
            Builtin::Xargs => misc::xargs(args, stdin, store),
            Builtin::Pwd => Ok(CommandResult::ok(store.limits().working_dir.clone())),
            Builtin::Cd => Ok(CommandResult::default()),
            Builtin::True => Ok(CommandResult::default()),
            Builtin::False => Ok(CommandResult::new("", "", 1)),
            Builtin::Help => misc::help(args),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up and run a command. Never fails: faults become exit code 1.
pub(crate) fn dispatch(
    name: &str,
    args: &[String],
    stdin: Option<&str>,
    store: &mut FileStore,
) -> CommandResult {
    let Some(builtin) = Builtin::from_name(name) else {
        tracing::debug!("Unknown command {}", name);
        return CommandResult::failure(format!("{name}: command not found"));
    };
    tracing::debug!("Running {} with {} args", builtin, args.len());
    guarded(name, || builtin.run(args, stdin, store))
}

/// Run `f`, converting errors and panics into a failed result.
fn guarded<F>(name: &str, f: F) -> CommandResult
where
    F: FnOnce() -> CommandOutcome,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(CommandError::Internal(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        )))
    });
    match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("{} failed internally: {}", name, e);
            CommandResult::failure(format!("{name}: internal error: {e}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

// ==================== Shared helpers ====================

/// Accumulates the stdout and stderr lines of one builtin.
#[derive(Debug, Default)]
pub(crate) struct Output {
    out: Vec<String>,
    err: Vec<String>,
    failed: bool,
}

impl Output {
    pub(crate) fn line(&mut self, line: impl Into<String>) {
        self.out.push(line.into());
    }

    /// Record an error line and mark the command as failed.
    pub(crate) fn error(&mut self, line: impl Into<String>) {
        self.err.push(line.into());
        self.failed = true;
    }

    /// Record an error line without failing.
    pub(crate) fn warn(&mut self, line: impl Into<String>) {
        self.err.push(line.into());
    }

    pub(crate) fn finish(self) -> CommandOutcome {
        Ok(CommandResult::new(
            self.out.join("\n"),
            self.err.join("\n"),
            i32::from(self.failed),
        ))
    }
}

/// Text a filter reads, tagged with the file it came from.
#[derive(Debug)]
pub(crate) struct Source {
    /// File path, `None` for piped stdin
    pub name: Option<String>,
    pub text: String,
}

/// Resolve the inputs of a filter command: the named files, else stdin.
///
/// Missing files are reported on `output`; with neither files nor stdin the
/// command fails with "missing file operand".
pub(crate) fn sources(
    cmd: &str,
    operands: &[String],
    stdin: Option<&str>,
    store: &FileStore,
    output: &mut Output,
) -> Vec<Source> {
    if operands.is_empty() || operands.iter().all(|o| o == "-") {
        return match stdin {
            Some(text) => vec![Source {
                name: None,
                text: text.to_string(),
            }],
            None => {
                output.error(format!("{cmd}: missing file operand"));
                Vec::new()
            }
        };
    }

    let mut found = Vec::with_capacity(operands.len());
    for operand in operands {
        if operand == "-" {
            if let Some(text) = stdin {
                found.push(Source {
                    name: None,
                    text: text.to_string(),
                });
            }
            continue;
        }
        match read_operand(cmd, operand, store) {
            Ok(text) => found.push(Source {
                name: Some(operand.clone()),
                text,
            }),
            Err(message) => output.error(message),
        }
    }
    found
}

/// Content of `path`, or the error line to report.
pub(crate) fn read_operand(cmd: &str, path: &str, store: &FileStore) -> Result<String, String> {
    if let Some(file) = store.read_file(path) {
        return Ok(file.content.clone());
    }
    if store.is_dir(path) {
        Err(format!("{cmd}: {path}: Is a directory"))
    } else {
        Err(format!("{cmd}: {path}: No such file or directory"))
    }
}

/// Append command output to a file, starting a new line when the file
/// does not already end with one.
pub(crate) fn append_output(
    store: &mut FileStore,
    path: &str,
    text: &str,
) -> Result<(), StoreError> {
    let needs_newline = store
        .read_file(path)
        .is_some_and(|f| !f.content.is_empty() && !f.content.ends_with('\n'));
    if needs_newline {
        store.append_file(path, &format!("\n{text}"))?;
    } else {
        store.append_file(path, text)?;
    }
    Ok(())
}

/// Drop a single trailing newline.
pub(crate) fn trim_newline(text: &str) -> &str {
    text.strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(text)
}

/// Last path segment.
pub(crate) fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

//! The bash-like interpreter.
//!
//! [`execute_command`] is the whole public surface: it takes one command
//! line and a [`FileStore`] and always returns a [`CommandResult`]. Parse
//! errors, unknown commands and faults inside builtins all come back as a
//! non-zero exit code with a message on stderr.

mod commands;
pub(crate) mod flags;
mod pipeline;
pub mod result;
pub mod tokenizer;

pub use commands::{Builtin, CommandError};
pub use result::CommandResult;

use crate::limits::truncate_output;
use crate::store::FileStore;

/// Run one command line against `store`.
///
/// Supports `;`, `&&`, `||`, `|`, `>`, `>>`, `2>` and glob expansion. The
/// stdout and stderr of the result are each capped at
/// [`ResourceLimits::max_output_bytes`](crate::ResourceLimits::max_output_bytes).
pub fn execute_command(line: &str, store: &mut FileStore) -> CommandResult {
    tracing::debug!("Executing: {}", line);
    let mut result = pipeline::run_line(line, store);

    let limit = store.limits().max_output_bytes;
    result.stdout = truncate_output(result.stdout, limit);
    result.stderr = truncate_output(result.stderr, limit);
    tracing::debug!("Exit code {}", result.exit_code);
    result
}

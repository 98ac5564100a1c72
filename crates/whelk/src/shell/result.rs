//! Result of running a command line.

use serde::{Deserialize, Serialize};

/// Output and status of one command line.
///
/// `stdout` and `stderr` never carry a trailing newline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// 0 on success, 1 on failure
    pub exit_code: i32,
}

impl CommandResult {
    /// Build a result from its parts.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(stdout, String::new(), 0)
    }

    /// Failed result (exit code 1) with the given stderr.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self::new(String::new(), stderr, 1)
    }

    /// Whether the exit code is 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Append `part` to `buf`, separating non-empty pieces with a newline.
pub(crate) fn join_into(buf: &mut String, part: &str) {
    if part.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(part);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let ok = CommandResult::ok("hi");
        assert!(ok.success());
        assert_eq!(ok.stdout, "hi");

        let failed = CommandResult::failure("nope");
        assert!(!failed.success());
        assert_eq!(failed.exit_code, 1);
        assert_eq!(failed.stderr, "nope");
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(CommandResult::ok("x")).unwrap();
        assert_eq!(json["exitCode"], 0);
        assert_eq!(json["stdout"], "x");
    }

    #[test]
    fn test_join_into_skips_empty() {
        let mut buf = String::new();
        join_into(&mut buf, "a");
        join_into(&mut buf, "");
        join_into(&mut buf, "b");
        assert_eq!(buf, "a\nb");
    }
}

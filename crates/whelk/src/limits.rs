//! Resource limits for a project session

use serde::{Deserialize, Serialize};

/// Marker appended to output that was cut at the byte limit.
pub const TRUNCATION_MARKER: &str = "\n... [output truncated] ...";

/// Resource limits for a project session
///
/// Every field has a default, so a partial JSON document (for example
/// `{"history_depth": 3}`) deserializes into a complete set of limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Number of snapshots kept for rollback
    pub history_depth: usize,
    /// Maximum stdout (and, separately, stderr) of one command line in bytes
    pub max_output_bytes: usize,
    /// Maximum number of commands a single `xargs` may run
    pub max_xargs_invocations: usize,
    /// Default cap on matches returned by a file search
    pub max_search_results: usize,
    /// Directory reported by `pwd`
    pub working_dir: String,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            history_depth: 10,
            max_output_bytes: 1024 * 1024, // 1 MB output
            max_xargs_invocations: 1000,
            max_search_results: 500,
            working_dir: "/project".to_string(),
        }
    }
}

/// Buffer that limits how much text can be written
#[derive(Debug, Clone)]
struct LimitedBuffer {
    buffer: String,
    limit: usize,
    truncated: bool,
}

impl LimitedBuffer {
    /// Create an empty buffer that holds at most `limit` bytes of payload.
    fn new(limit: usize) -> Self {
        Self {
            buffer: String::new(),
            limit,
            truncated: false,
        }
    }

    /// Append `data`, truncating at the limit on a character boundary.
    ///
    /// Returns the number of bytes the caller handed in, whether or not
    /// they were kept.
    fn write(&mut self, data: &str) -> usize {
        if self.truncated {
            return data.len();
        }

        let remaining = self.limit.saturating_sub(self.buffer.len());
        if data.len() <= remaining {
            self.buffer.push_str(data);
            return data.len();
        }

        let mut cut = remaining;
        while !data.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buffer.push_str(&data[..cut]);
        self.buffer.push_str(TRUNCATION_MARKER);
        self.truncated = true;

        data.len()
    }

    /// Consume the buffer, returning its text.
    fn into_string(self) -> String {
        self.buffer
    }
}

/// Cap `text` at `limit` bytes, appending [`TRUNCATION_MARKER`] when cut.
pub fn truncate_output(text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }
    let mut buffer = LimitedBuffer::new(limit);
    buffer.write(&text);
    buffer.into_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== ResourceLimits Tests ====================

    #[test]
    fn test_default_limits() {
        let limits = ResourceLimits::default();

        assert_eq!(limits.history_depth, 10);
        assert_eq!(limits.max_output_bytes, 1024 * 1024);
        assert_eq!(limits.max_xargs_invocations, 1000);
        assert_eq!(limits.max_search_results, 500);
        assert_eq!(limits.working_dir, "/project");
    }

    #[test]
    fn test_limits_serialization() {
        let limits = ResourceLimits {
            history_depth: 3,
            max_output_bytes: 2048,
            max_xargs_invocations: 5,
            max_search_results: 20,
            working_dir: "/workspace".to_string(),
        };

        let json = serde_json::to_string(&limits).unwrap();
        let deserialized: ResourceLimits = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, limits);
    }

    #[test]
    fn test_limits_partial_document_uses_defaults() {
        let limits: ResourceLimits = serde_json::from_str(r#"{"history_depth": 2}"#).unwrap();

        assert_eq!(limits.history_depth, 2);
        assert_eq!(limits.max_output_bytes, 1024 * 1024);
        assert_eq!(limits.working_dir, "/project");
    }

    // ==================== LimitedBuffer Tests ====================

    #[test]
    fn test_limited_buffer_under_limit() {
        let mut buffer = LimitedBuffer::new(100);

        let written = buffer.write("hello world");
        assert_eq!(written, 11);
        assert!(!buffer.truncated);
        assert_eq!(buffer.buffer.as_str(), "hello world");
    }

    #[test]
    fn test_limited_buffer_at_limit() {
        let mut buffer = LimitedBuffer::new(5);

        buffer.write("hello");
        assert!(!buffer.truncated);
        assert_eq!(buffer.buffer.as_str(), "hello");
    }

    #[test]
    fn test_limited_buffer_over_limit_truncates() {
        let mut buffer = LimitedBuffer::new(5);

        let written = buffer.write("hello world");
        assert_eq!(written, 11); // Reports full length written
        assert!(buffer.truncated);
        assert_eq!(buffer.buffer.as_str(), format!("hello{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_limited_buffer_respects_char_boundaries() {
        let mut buffer = LimitedBuffer::new(2);

        // 'é' is two bytes; cutting at 2 would split it
        buffer.write("aé");
        assert!(buffer.truncated);
        assert!(buffer.buffer.as_str().starts_with('a'));
        assert!(!buffer.buffer.as_str().contains('é'));
    }

    #[test]
    fn test_limited_buffer_write_after_truncation() {
        let mut buffer = LimitedBuffer::new(5);

        buffer.write("hello world");
        let len = buffer.buffer.as_str().len();

        let written = buffer.write("more data");
        assert_eq!(written, 9);
        assert_eq!(buffer.buffer.as_str().len(), len);
    }

    #[test]
    fn test_truncate_output_passthrough() {
        assert_eq!(truncate_output("short".to_string(), 10), "short");
    }

    #[test]
    fn test_truncate_output_cuts() {
        let out = truncate_output("0123456789".to_string(), 4);
        assert!(out.starts_with("0123"));
        assert!(out.contains("truncated"));
    }
}

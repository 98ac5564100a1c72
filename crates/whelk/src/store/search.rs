//! Content search across the project files.

use regex_lite::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::FileStore;
use crate::glob::GlobMatcher;

/// Options for [`FileStore::search_files`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Treat the query as a regular expression instead of a literal string
    pub regex: bool,
    /// Match case exactly
    pub case_sensitive: bool,
    /// Only search paths matching this glob (for example `src/**/*.tsx`)
    pub path_glob: Option<String>,
    /// Stop after this many matches; the store's limit applies when unset
    pub max_results: Option<usize>,
}

/// A single matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// File containing the match
    pub path: String,
    /// 1-based line number
    pub line_number: usize,
    /// The matching line, without its terminator
    pub line: String,
}

/// Compile `pattern`, falling back to a literal match when it is not a valid regex.
///
/// `None` only when even the escaped literal exceeds the regex size limit.
pub fn compile_lenient(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex_lite::escape(pattern))
                .case_insensitive(case_insensitive)
                .build()
        })
        .ok()
}

impl FileStore {
    /// Search file contents line by line.
    pub fn search_files(&self, query: &str, opts: &SearchOptions) -> Vec<SearchMatch> {
        if query.is_empty() {
            return Vec::new();
        }

        let pattern = if opts.regex {
            query.to_string()
        } else {
            regex_lite::escape(query)
        };
        let Some(regex) = compile_lenient(&pattern, !opts.case_sensitive) else {
            return Vec::new();
        };
        let path_filter = opts.path_glob.as_deref().map(GlobMatcher::new);
        let max = opts.max_results.unwrap_or(self.limits().max_search_results);

        let mut matches = Vec::new();
        for file in self.files() {
            if let Some(filter) = &path_filter {
                if !filter.is_match(&file.path) {
                    continue;
                }
            }
            for (idx, line) in file.content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(SearchMatch {
                        path: file.path.clone(),
                        line_number: idx + 1,
                        line: line.to_string(),
                    });
                    if matches.len() >= max {
                        return matches;
                    }
                }
            }
        }
        matches
    }
}

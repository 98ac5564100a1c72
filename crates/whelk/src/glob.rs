//! Glob patterns over store paths.
//!
//! A pattern is compiled to an anchored regular expression: `**` matches
//! anything including `/`, `*` matches anything except `/`, `?` matches one
//! non-`/` character, and every other character is literal.

use regex_lite::Regex;

/// Whether `arg` should be treated as a glob pattern.
pub fn is_glob(arg: &str) -> bool {
    arg.contains('*') || arg.contains('?')
}

/// Translate a glob into anchored regex source.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' | '?' => {
                out.push_str(&regex_lite::escape(&literal));
                literal.clear();
                if c == '?' {
                    out.push_str("[^/]");
                } else if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` also matches zero directories
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex_lite::escape(&literal));
    out.push('$');
    out
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    regex: Option<Regex>,
}

impl GlobMatcher {
    /// Compile `pattern`, ignoring leading `./` and `/`.
    pub fn new(pattern: &str) -> Self {
        let pattern = strip_root(pattern);
        Self {
            regex: Regex::new(&glob_to_regex(pattern)).ok(),
        }
    }

    /// Whether `path` matches the whole pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|re| re.is_match(strip_root(path)))
    }

    /// Every path from `paths` that matches, in input order.
    pub fn filter<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        paths
            .into_iter()
            .filter(|p| self.is_match(p))
            .map(str::to_string)
            .collect()
    }
}

fn strip_root(path: &str) -> &str {
    let mut path = path;
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            return path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATHS: &[&str] = &[
        "App.tsx",
        "a.tmp",
        "b.tmp",
        "package.json",
        "src/components/Button.tsx",
        "src/index.ts",
        "src/keep.tmp",
    ];

    fn matches(pattern: &str) -> Vec<String> {
        GlobMatcher::new(pattern).filter(PATHS.iter().copied())
    }

    #[test]
    fn test_star_stays_in_segment() {
        assert_eq!(matches("*.tmp"), vec!["a.tmp", "b.tmp"]);
        assert_eq!(matches("src/*.ts"), vec!["src/index.ts"]);
    }

    #[test]
    fn test_double_star_crosses_segments() {
        assert_eq!(
            matches("src/**"),
            vec!["src/components/Button.tsx", "src/index.ts", "src/keep.tmp"]
        );
        assert_eq!(
            matches("**/*.tsx"),
            vec!["App.tsx", "src/components/Button.tsx"]
        );
    }

    #[test]
    fn test_dot_is_literal() {
        assert!(!GlobMatcher::new("*.ts").is_match("src/indexxts"));
        assert!(!GlobMatcher::new("a.tmp").is_match("aXtmp"));
    }

    #[test]
    fn test_question_mark() {
        assert_eq!(matches("?.tmp"), vec!["a.tmp", "b.tmp"]);
    }

    #[test]
    fn test_leading_dot_slash_ignored() {
        assert_eq!(matches("./*.json"), vec!["package.json"]);
        assert_eq!(matches("/*.json"), vec!["package.json"]);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(GlobMatcher::new("(app)+*.ts").is_match("(app)+x.ts"));
        assert!(!GlobMatcher::new("(app)+*.ts").is_match("appx.ts"));
    }

    #[test]
    fn test_no_match() {
        assert!(matches("*.py").is_empty());
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("*.ts"));
        assert!(is_glob("file?.md"));
        assert!(!is_glob("src/index.ts"));
    }
}

//! Option parsing shared by the builtins.
//!
//! Each builtin declares its options as a static [`FlagSpec`]. The parser
//! understands combined short switches (`-in`), attached or detached values
//! (`-n5`, `-n 5`), `--long` and `--long=value`, the `--` terminator, and an
//! optional `-N` numeric shorthand. Unknown options are collected instead of
//! rejected.

use std::collections::{BTreeMap, BTreeSet};

/// A single option a builtin accepts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Flag {
    /// Long name, also used as the lookup key
    pub name: &'static str,
    pub short: Option<char>,
    pub takes_value: bool,
}

impl Flag {
    pub(crate) const fn switch(short: char, name: &'static str) -> Self {
        Self {
            name,
            short: Some(short),
            takes_value: false,
        }
    }

    pub(crate) const fn value(short: char, name: &'static str) -> Self {
        Self {
            name,
            short: Some(short),
            takes_value: true,
        }
    }

    /// Option with only a long form, taking a value.
    pub(crate) const fn long_value(name: &'static str) -> Self {
        Self {
            name,
            short: None,
            takes_value: true,
        }
    }
}

/// The option table of one builtin.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FlagSpec {
    flags: &'static [Flag],
    numeric: Option<&'static str>,
}

impl FlagSpec {
    pub(crate) const fn new(flags: &'static [Flag]) -> Self {
        Self {
            flags,
            numeric: None,
        }
    }

    /// Treat `-N` as the value of the named option (`head -5`).
    pub(crate) const fn with_numeric(mut self, name: &'static str) -> Self {
        self.numeric = Some(name);
        self
    }

    fn by_short(&self, c: char) -> Option<&Flag> {
        self.flags.iter().find(|f| f.short == Some(c))
    }

    fn by_long(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Split `args` into options and operands.
    pub(crate) fn parse(&self, args: &[String]) -> ParsedArgs {
        let mut parsed = ParsedArgs::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                parsed.operands.extend(iter.by_ref().cloned());
                break;
            }

            if let Some(long) = arg.strip_prefix("--") {
                let (name, inline) = match long.split_once('=') {
                    Some((n, v)) => (n, Some(v.to_string())),
                    None => (long, None),
                };
                match self.by_long(name) {
                    Some(flag) if flag.takes_value => {
                        if let Some(v) = inline.or_else(|| iter.next().cloned()) {
                            parsed.values.insert(flag.name, v);
                        }
                    }
                    Some(flag) => {
                        parsed.switches.insert(flag.name);
                    }
                    None => parsed.unknown.push(arg.clone()),
                }
                continue;
            }

            let Some(shorts) = arg.strip_prefix('-').filter(|s| !s.is_empty()) else {
                parsed.operands.push(arg.clone());
                continue;
            };

            if let Some(name) = self.numeric {
                if shorts.chars().all(|c| c.is_ascii_digit()) {
                    parsed.values.insert(name, shorts.to_string());
                    continue;
                }
            }

            for (idx, c) in shorts.char_indices() {
                match self.by_short(c) {
                    Some(flag) if flag.takes_value => {
                        let attached = &shorts[idx + c.len_utf8()..];
                        let value = if attached.is_empty() {
                            iter.next().cloned()
                        } else {
                            Some(attached.to_string())
                        };
                        if let Some(v) = value {
                            parsed.values.insert(flag.name, v);
                        }
                        break;
                    }
                    Some(flag) => {
                        parsed.switches.insert(flag.name);
                    }
                    None => parsed.unknown.push(format!("-{c}")),
                }
            }
        }

        if !parsed.unknown.is_empty() {
            tracing::debug!("Ignoring unknown options {:?}", parsed.unknown);
        }
        parsed
    }
}

/// Options and operands of one invocation.
#[derive(Debug, Default, Clone)]
pub(crate) struct ParsedArgs {
    switches: BTreeSet<&'static str>,
    values: BTreeMap<&'static str, String>,
    /// Non-option arguments in order
    pub operands: Vec<String>,
    /// Options missing from the table, ignored by the builtins
    pub unknown: Vec<String>,
}

impl ParsedArgs {
    /// Whether the named switch was given.
    pub(crate) fn has(&self, name: &str) -> bool {
        self.switches.contains(name)
    }

    /// Value of the named option, if given.
    pub(crate) fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREP: FlagSpec = FlagSpec::new(&[
        Flag::switch('i', "ignore-case"),
        Flag::switch('n', "line-number"),
        Flag::switch('v', "invert-match"),
        Flag::value('m', "max-count"),
        Flag::long_value("include"),
    ]);

    const HEAD: FlagSpec = FlagSpec::new(&[Flag::value('n', "lines")]).with_numeric("lines");

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_combined_short_switches() {
        let parsed = GREP.parse(&args(&["-in", "pattern", "file.ts"]));
        assert!(parsed.has("ignore-case"));
        assert!(parsed.has("line-number"));
        assert!(!parsed.has("invert-match"));
        assert_eq!(parsed.operands, vec!["pattern", "file.ts"]);
    }

    #[test]
    fn test_values_attached_and_detached() {
        let parsed = GREP.parse(&args(&["-m", "3", "x"]));
        assert_eq!(parsed.value("max-count"), Some("3"));
        assert_eq!(parsed.operands, vec!["x"]);

        let parsed = GREP.parse(&args(&["-vm2", "x"]));
        assert!(parsed.has("invert-match"));
        assert_eq!(parsed.value("max-count"), Some("2"));
    }

    #[test]
    fn test_long_options() {
        let parsed = GREP.parse(&args(&["--ignore-case", "--include=*.tsx", "--max-count", "4"]));
        assert!(parsed.has("ignore-case"));
        assert_eq!(parsed.value("include"), Some("*.tsx"));
        assert_eq!(parsed.value("max-count"), Some("4"));
    }

    #[test]
    fn test_double_dash_ends_options() {
        let parsed = GREP.parse(&args(&["-i", "--", "-v", "file"]));
        assert!(parsed.has("ignore-case"));
        assert!(!parsed.has("invert-match"));
        assert_eq!(parsed.operands, vec!["-v", "file"]);
    }

    #[test]
    fn test_unknown_options_are_collected() {
        let parsed = GREP.parse(&args(&["-iz", "--color=auto", "p"]));
        assert!(parsed.has("ignore-case"));
        assert_eq!(parsed.unknown, vec!["-z", "--color=auto"]);
        assert_eq!(parsed.operands, vec!["p"]);
    }

    #[test]
    fn test_numeric_shorthand() {
        let parsed = HEAD.parse(&args(&["-5", "a.ts"]));
        assert_eq!(parsed.value("lines"), Some("5"));
        assert_eq!(parsed.operands, vec!["a.ts"]);

        let parsed = HEAD.parse(&args(&["-n", "+3"]));
        assert_eq!(parsed.value("lines"), Some("+3"));
    }

    #[test]
    fn test_lone_dash_is_operand() {
        let parsed = GREP.parse(&args(&["-"]));
        assert_eq!(parsed.operands, vec!["-"]);
    }
}

//! Quote-aware word splitting.
//!
//! Words are separated by unquoted whitespace. Text between matching `"` or
//! `'` belongs to the current word with the quotes removed, so `a"b c"d` is
//! the single word `ab cd`. An unterminated quote runs to the end of input.
//! Backslashes are kept as-is.

/// One word of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Word text with quotes removed
    pub text: String,
    /// Whether any part of the word was quoted
    pub quoted: bool,
}

impl Token {
    /// An unquoted word.
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }
}

/// Split `input` into words, remembering which were quoted.
pub fn tokenize_words(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                in_word = true;
                quoted = true;
            }
            c if c.is_whitespace() => {
                if in_word {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        quoted,
                    });
                    in_word = false;
                    quoted = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        tokens.push(Token {
            text: current,
            quoted,
        });
    }
    tokens
}

/// Split `input` into plain words.
pub fn tokenize(input: &str) -> Vec<String> {
    tokenize_words(input).into_iter().map(|t| t.text).collect()
}

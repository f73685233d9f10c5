//! systemd-style word splitting and quoting
//!
//! Splitting follows the relaxed rules systemd applies to `ExecStart=` and
//! similar settings: words are separated by whitespace, single and double
//! quotes group characters, and a backslash protects the next character.
//! [`split_words_unescaped`] additionally decodes C escapes such as `\n` or
//! `\x41`.

use std::borrow::Cow;

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Split into words, removing quotes
///
/// # Example
/// ```
/// use quadlet_unitfile::split_words;
///
/// assert_eq!(split_words(r#"sh -c "echo hi""#), vec!["sh", "-c", "echo hi"]);
/// ```
#[must_use]
pub fn split_words(input: &str) -> Vec<String> {
    split(input, false)
}

/// Split into words, removing quotes and decoding C escapes
#[must_use]
pub fn split_words_unescaped(input: &str) -> Vec<String> {
    split(input, true)
}

fn split(input: &str, unescape: bool) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;

    loop {
        while i < chars.len() && is_separator(chars[i]) {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let mut word = String::new();
        let mut quote: Option<char> = None;
        let mut quoted = false;

        while i < chars.len() {
            let c = chars[i];
            i += 1;
            match c {
                '\\' => {
                    if i >= chars.len() {
                        word.push('\\');
                        break;
                    }
                    if unescape {
                        i += unescape_one(&chars[i..], &mut word);
                    } else {
                        word.push(chars[i]);
                        i += 1;
                    }
                }
                c if Some(c) == quote => quote = None,
                c if quote.is_some() => word.push(c),
                '\'' | '"' => {
                    quote = Some(c);
                    quoted = true;
                }
                c if is_separator(c) => break,
                c => word.push(c),
            }
        }

        if !word.is_empty() || quoted {
            words.push(word);
        }
    }

    words
}

fn hex_value(digits: &[char]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, c| Some(acc * 16 + c.to_digit(16)?))
}

/// Decode one escape sequence following a backslash.
///
/// Returns the number of characters consumed. Unknown or truncated sequences
/// are kept literally.
fn unescape_one(rest: &[char], out: &mut String) -> usize {
    let simple = match rest[0] {
        'a' => Some('\u{07}'),
        'b' => Some('\u{08}'),
        'f' => Some('\u{0c}'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'v' => Some('\u{0b}'),
        's' => Some(' '),
        '\\' | '"' | '\'' => Some(rest[0]),
        _ => None,
    };
    if let Some(c) = simple {
        out.push(c);
        return 1;
    }

    let (width, radix_len) = match rest[0] {
        'x' => (2, 1),
        'u' => (4, 1),
        'U' => (8, 1),
        '0'..='7' => (3, 0),
        _ => (0, 0),
    };

    if width > 0 && rest.len() >= radix_len + width {
        let digits = &rest[radix_len..radix_len + width];
        let value = if radix_len == 0 {
            digits
                .iter()
                .try_fold(0u32, |acc, c| Some(acc * 8 + c.to_digit(8)?))
                .filter(|v| *v <= 0xff)
        } else {
            hex_value(digits)
        };
        if let Some(c) = value.and_then(char::from_u32) {
            out.push(c);
            return radix_len + width;
        }
    }

    out.push('\\');
    out.push(rest[0]);
    1
}

fn char_needs_escape(c: char) -> bool {
    c.is_ascii_control() || c.is_ascii_whitespace() || matches!(c, '"' | '\'' | '\\' | ';')
}

fn escape_word(word: &str, out: &mut String) {
    if word.is_empty() {
        out.push_str("\"\"");
        return;
    }
    if !word.chars().any(char_needs_escape) {
        out.push_str(word);
        return;
    }

    out.push('"');
    for c in word.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Join words into a single command line that splits back into the same words
#[must_use]
pub fn escape_words<S: AsRef<str>>(words: &[S]) -> String {
    let mut escaped = String::new();
    for (index, word) in words.iter().enumerate() {
        if index > 0 {
            escaped.push(' ');
        }
        escape_word(word.as_ref(), &mut escaped);
    }
    escaped
}

/// Join backslash-newline continuations with a single space
#[must_use]
pub fn apply_line_continuation(raw: &str) -> Cow<'_, str> {
    if raw.contains("\\\n") {
        Cow::Owned(raw.replace("\\\n", " "))
    } else {
        Cow::Borrowed(raw)
    }
}

//! Line-oriented unit file parser

use quadlet_core::{Error, Result};

use crate::unitfile::{UnitFile, UnitLine};

fn is_comment(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#') || line.starts_with(';')
}

fn is_key_value(line: &str) -> bool {
    line.find('=').is_some_and(|pos| pos > 0)
}

/// Group name from a `[name]` header, allowing trailing blanks after `]`
fn group_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('[')?;
    let end = rest.find(']')?;
    rest[end + 1..]
        .chars()
        .all(|c| c == ' ' || c == '\t')
        .then(|| &rest[..end])
}

fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c == '[' || c == ']' || c.is_ascii_control())
}

fn is_valid_key_name(key: &str) -> bool {
    let (name, locale) = match key.find('[') {
        Some(open) => (&key[..open], Some(&key[open + 1..])),
        None => (key, None),
    };

    if name.is_empty() || name.starts_with(' ') || name.ends_with(' ') || name.contains(']') {
        return false;
    }

    match locale {
        None => true,
        Some(locale) => locale.strip_suffix(']').is_some_and(|tag| {
            tag.chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        }),
    }
}

struct Parser<'a> {
    origin: &'a str,
    unit: UnitFile,
    current: Option<usize>,
    pending: Vec<UnitLine>,
}

impl Parser<'_> {
    fn error(&self, line: usize, message: String) -> Error {
        Error::UnitSyntax {
            path: self.origin.to_string(),
            line,
            message,
        }
    }

    fn parse_line(&mut self, text: &str, line_no: usize) -> Result<()> {
        if is_comment(text) {
            self.pending.push(UnitLine::comment(text));
            return Ok(());
        }

        if let Some(name) = group_header(text) {
            if !is_valid_group_name(name) {
                return Err(self.error(line_no, format!("invalid group name '{name}'")));
            }
            let index = self.unit.ensure_group(name);
            self.current = Some(index);

            // One separating blank line is re-added when printing.
            if self.pending.first().is_some_and(UnitLine::is_blank) {
                self.pending.remove(0);
            }
            let pending = std::mem::take(&mut self.pending);
            self.unit.group_at_mut(index).comments.extend(pending);
            return Ok(());
        }

        if is_key_value(text) {
            let Some(index) = self.current else {
                return Err(self.error(line_no, "key file does not start with a group".to_string()));
            };
            let Some((key, value)) = text.split_once('=') else {
                return Err(self.error(line_no, "missing '='".to_string()));
            };
            let key = key.trim_end();
            if !is_valid_key_name(key) {
                return Err(self.error(line_no, format!("invalid key name '{key}'")));
            }
            let value = value.trim_start();

            let pending = std::mem::take(&mut self.pending);
            let group = self.unit.group_at_mut(index);
            group.lines.extend(pending);
            group.lines.push(UnitLine::entry(key, value));
            return Ok(());
        }

        Err(self.error(
            line_no,
            format!("line '{text}' is not a key-value pair, group, or comment"),
        ))
    }

    fn finish(mut self) -> UnitFile {
        // Comments in a file without any group are dropped.
        if let Some(index) = self.current {
            let pending = std::mem::take(&mut self.pending);
            self.unit.group_at_mut(index).lines.extend(pending);
        }
        self.unit
    }
}

/// Parse unit file text; `origin` names the source in syntax errors
pub(crate) fn parse(data: &str, origin: &str) -> Result<UnitFile> {
    let mut lines: Vec<&str> = data.split('\n').collect();
    if data.ends_with('\n') {
        lines.pop();
    }

    let mut parser = Parser {
        origin,
        unit: UnitFile::new(),
        current: None,
        pending: Vec::new(),
    };

    let mut index = 0;
    while index < lines.len() {
        let line_no = index + 1;
        let mut text = lines[index].to_string();
        index += 1;

        if !is_comment(&text) && is_key_value(&text) {
            while text.ends_with('\\') && index < lines.len() {
                text.push('\n');
                text.push_str(lines[index]);
                index += 1;
            }
        }

        parser.parse_line(&text, line_no)?;
    }

    Ok(parser.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_header_detection() {
        assert_eq!(group_header("[Unit]"), Some("Unit"));
        assert_eq!(group_header("[Unit] \t"), Some("Unit"));
        assert_eq!(group_header("[Unit] x"), None);
        assert_eq!(group_header("Unit]"), None);
    }

    #[test]
    fn test_key_name_validation() {
        assert!(is_valid_key_name("Exec"));
        assert!(is_valid_key_name("Name[de_DE]"));
        assert!(is_valid_key_name("With Space"));
        assert!(!is_valid_key_name(" Lead"));
        assert!(!is_valid_key_name("Bad]"));
        assert!(!is_valid_key_name("Name[de"));
        assert!(!is_valid_key_name("Name[d e]"));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = parse("[Unit]\nA=b\nnot a pair\n", "test.container").unwrap_err();
        match err {
            Error::UnitSyntax { path, line, .. } => {
                assert_eq!(path, "test.container");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_key_before_group_rejected() {
        assert!(parse("A=b\n[Unit]\n", "x").is_err());
    }

    #[test]
    fn test_invalid_group_name_rejected() {
        assert!(parse("[]\n", "x").is_err());
        assert!(parse("[a\u{1}b]\n", "x").is_err());
    }

    #[test]
    fn test_line_numbers_after_continuation() {
        let err = parse("[Unit]\nA=one \\\n two\nbogus\n", "x").unwrap_err();
        assert!(matches!(err, Error::UnitSyntax { line: 4, .. }));
    }
}

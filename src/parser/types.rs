//! Shared parser types and limits.

use std::fmt;

// Limits that keep pathological input from hanging the parser.
pub const MAX_INPUT_SIZE: usize = 1_000_000;
pub const MAX_PARSER_DEPTH: usize = 200;

/// Lex/parse failure.
///
/// `needs_more_input` distinguishes "the unit is incomplete" (open quote,
/// unterminated compound, pending heredoc) from a hard syntax error, so an
/// interactive front-end can read a continuation line instead of reporting.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub needs_more_input: bool,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self { message: message.into(), line, column, needs_more_input: false }
    }

    pub fn incomplete(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self { message: message.into(), line, column, needs_more_input: true }
    }

    pub fn syntax_near(token: &str, line: usize, column: usize) -> Self {
        Self::new(
            format!("syntax error near unexpected token `{}'", token),
            line,
            column,
        )
    }
}

/// Check that a string is a valid variable name: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Check that `s` up to `=`/`+=` is a valid assignment left-hand side,
/// allowing one balanced `[subscript]`.
pub fn is_valid_assignment_lhs(s: &str) -> bool {
    let name_len = s
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .count();
    if name_len == 0 {
        return false;
    }
    let first = match s.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return false;
    }
    let rest: String = s.chars().skip(name_len).collect();
    if rest.is_empty() || rest == "+" {
        return true;
    }
    if let Some(inner) = rest.strip_prefix('[') {
        let mut depth = 1usize;
        let mut consumed = 0usize;
        for c in inner.chars() {
            consumed += 1;
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return false;
        }
        let tail: String = inner.chars().skip(consumed).collect();
        return tail.is_empty() || tail == "+";
    }
    false
}

/// Find the index of the assignment `=` (or the `=` of `+=`) outside
/// subscript brackets. Returns the index of `=` itself.
pub fn find_assignment_eq(s: &str) -> Option<usize> {
    let chars: Vec<char> = s.chars().collect();
    let mut depth = 0i32;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            '=' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("foo"));
        assert!(is_valid_name("_x9"));
        assert!(!is_valid_name("9x"));
        assert!(!is_valid_name("a-b"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_assignment_lhs() {
        assert!(is_valid_assignment_lhs("x"));
        assert!(is_valid_assignment_lhs("x+"));
        assert!(is_valid_assignment_lhs("arr[i+1]"));
        assert!(is_valid_assignment_lhs("arr[a[0]]+"));
        assert!(!is_valid_assignment_lhs("1x"));
        assert!(!is_valid_assignment_lhs("arr[unclosed"));
    }

    #[test]
    fn test_find_assignment_eq() {
        assert_eq!(find_assignment_eq("x=1"), Some(1));
        assert_eq!(find_assignment_eq("arr[x=2]=1"), Some(8));
        assert_eq!(find_assignment_eq("noeq"), None);
    }
}

//! Quoting helpers: glob-escaping for the pattern view of a field, and
//! shell quoting for `${var@Q}` and `declare -p` output.

/// Backslash-protect glob metacharacters so quoted text matches literally.
pub fn escape_pattern_chars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Quote a value so it re-reads as one word (the `@Q` transform and
/// `declare -p` use this). Plain words pass through; anything else gets
/// single quotes, with embedded single quotes spliced.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || "_-./:=+%@,".contains(c))
    {
        return s.to_string();
    }
    if s.chars().any(|c| (c as u32) < 0x20 || c == '\x7f') {
        // Control characters need the $'...' form.
        let mut out = String::from("$'");
        for c in s.chars() {
            match c {
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                c if (c as u32) < 0x20 || c == '\x7f' => {
                    out.push_str(&format!("\\{:03o}", c as u32));
                }
                c => out.push(c),
            }
        }
        out.push('\'');
        return out;
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_pattern_chars() {
        assert_eq!(escape_pattern_chars("a*b"), "a\\*b");
        assert_eq!(escape_pattern_chars("[x]?"), "\\[x\\]\\?");
        assert_eq!(escape_pattern_chars("plain"), "plain");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "plain");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("a\nb"), "$'a\\nb'");
        assert_eq!(shell_quote(""), "''");
    }
}

//! Field splitting on IFS.
//!
//! IFS whitespace characters collapse and never produce empty fields;
//! non-whitespace IFS characters are hard delimiters, except that one
//! trailing delimiter terminates the last field instead of adding an
//! empty one.

/// Split expansion output. Returns (fields, leading_break, trailing_break):
/// the breaks tell the caller whether the text started/ended on a
/// separator, so adjacent literal content lands in a different field.
pub fn split_fields(text: &str, ifs: &str) -> (Vec<String>, bool, bool) {
    if text.is_empty() {
        return (Vec::new(), false, false);
    }
    let is_ifs = |c: char| ifs.contains(c);
    let is_ifs_ws = |c: char| is_ifs(c) && (c == ' ' || c == '\t' || c == '\n');

    let chars: Vec<char> = text.chars().collect();
    let leading = is_ifs(chars[0]);
    let trailing = is_ifs(chars[chars.len() - 1]);

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_field = false;
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if is_ifs_ws(c) {
            // Whitespace run: ends the field, absorbs adjacent whitespace
            // and at most one non-whitespace delimiter.
            if in_field {
                fields.push(std::mem::take(&mut current));
                in_field = false;
            }
            while i < chars.len() && is_ifs_ws(chars[i]) {
                i += 1;
            }
            if i < chars.len() && is_ifs(chars[i]) && !is_ifs_ws(chars[i]) {
                i += 1;
                while i < chars.len() && is_ifs_ws(chars[i]) {
                    i += 1;
                }
                if i < chars.len() {
                    in_field = true;
                }
            }
            continue;
        }
        if is_ifs(c) {
            // Non-whitespace delimiter: terminates the field (possibly
            // producing an empty one).
            fields.push(std::mem::take(&mut current));
            in_field = false;
            i += 1;
            // Absorb surrounding IFS whitespace.
            while i < chars.len() && is_ifs_ws(chars[i]) {
                i += 1;
            }
            if i < chars.len() {
                in_field = true;
            }
            continue;
        }
        current.push(c);
        in_field = true;
        i += 1;
    }
    if in_field {
        fields.push(current);
    }
    (fields, leading, trailing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WS: &str = " \t\n";

    fn fields(text: &str, ifs: &str) -> Vec<String> {
        split_fields(text, ifs).0
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(fields("a  b   c", WS), vec!["a", "b", "c"]);
        assert_eq!(fields("  a b  ", WS), vec!["a", "b"]);
        assert_eq!(fields("   ", WS), Vec::<String>::new());
    }

    #[test]
    fn test_breaks() {
        let (f, lead, trail) = split_fields(" b", WS);
        assert_eq!(f, vec!["b"]);
        assert!(lead);
        assert!(!trail);
        let (f, lead, trail) = split_fields("b ", WS);
        assert_eq!(f, vec!["b"]);
        assert!(!lead);
        assert!(trail);
    }

    #[test]
    fn test_hard_delimiters() {
        assert_eq!(fields("a::b", ":"), vec!["a", "", "b"]);
        assert_eq!(fields("a:b", ":"), vec!["a", "b"]);
        // One trailing delimiter terminates, two leave an empty field.
        assert_eq!(fields("a:", ":"), vec!["a"]);
        assert_eq!(fields("a::", ":"), vec!["a", ""]);
    }

    #[test]
    fn test_mixed_ifs() {
        assert_eq!(fields("a : b", ": \t\n"), vec!["a", "b"]);
        assert_eq!(fields("a : : b", ": \t\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_leading_hard_delimiter() {
        assert_eq!(fields(":a", ":"), vec!["", "a"]);
    }
}

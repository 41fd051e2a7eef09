//! Word segmentation.
//!
//! The lexer hands over raw word text with quotes and substitution syntax
//! intact; this module splits it into the ordered `WordPart` sequence the
//! expander consumes:
//! - quoting: '...', "...", $'...', backslash escapes
//! - substitutions: $VAR, ${...}, $(...), $((...)), `...`, <(...), >(...)
//! - tilde prefixes and brace expansion candidates

use crate::ast::types::{
    BraceItem, ProcessDirection, ScriptNode, WordNode, WordPart,
};
use crate::parser::expansion_parser::parse_param_inner;
use crate::parser::arithmetic_parser::parse_arith;
use crate::parser::types::ParseError;

/// Parse one raw word into parts. `in_assignment` enables tilde
/// recognition after `:` and `=` (assignment-value rule).
pub fn parse_word(raw: &str, line: usize, in_assignment: bool) -> Result<WordNode, ParseError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut parts: Vec<WordPart> = Vec::new();
    let mut literal = String::new();
    let mut i = 0usize;

    // Tilde is recognized at the very start of the word (and after : / =
    // in assignment values); quoting anywhere in the prefix defeats it.
    if chars.first() == Some(&'~') {
        if let Some((part, next)) = parse_tilde(&chars, 0) {
            parts.push(part);
            i = next;
        }
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                flush(&mut parts, &mut literal);
                let (value, next) = scan_until(&chars, i + 1, '\'');
                parts.push(WordPart::SingleQuoted(value));
                i = next;
            }
            '"' => {
                flush(&mut parts, &mut literal);
                let (inner, next) = parse_double_quoted(&chars, i + 1, line)?;
                parts.push(WordPart::DoubleQuoted(inner));
                i = next;
            }
            '\\' => {
                flush(&mut parts, &mut literal);
                if i + 1 < chars.len() {
                    parts.push(WordPart::Escaped(chars[i + 1].to_string()));
                    i += 2;
                } else {
                    literal.push('\\');
                    i += 1;
                }
            }
            '`' => {
                flush(&mut parts, &mut literal);
                let (part, next) = parse_backquoted(&chars, i, line)?;
                parts.push(part);
                i = next;
            }
            '$' => {
                let (part, next) = parse_dollar(&chars, i, line)?;
                match part {
                    Some(p) => {
                        flush(&mut parts, &mut literal);
                        parts.push(p);
                    }
                    None => literal.push('$'),
                }
                i = next;
            }
            '<' | '>' if chars.get(i + 1) == Some(&'(') => {
                flush(&mut parts, &mut literal);
                let end = find_matching(&chars, i + 1, '(', ')').ok_or_else(|| {
                    ParseError::incomplete("unexpected EOF while looking for matching `)'", line, 0)
                })?;
                let body: String = chars[i + 2..end].iter().collect();
                let direction = if c == '<' { ProcessDirection::Read } else { ProcessDirection::Write };
                parts.push(WordPart::ProcessSubst {
                    body: parse_subst_body(&body, line)?,
                    direction,
                });
                i = end + 1;
            }
            '{' => {
                if let Some((items, next)) = try_parse_brace(&chars, i, line)? {
                    flush(&mut parts, &mut literal);
                    parts.push(WordPart::Brace(items));
                    i = next;
                } else {
                    literal.push('{');
                    i += 1;
                }
            }
            ':' | '=' if in_assignment && chars.get(i + 1) == Some(&'~') => {
                literal.push(c);
                flush(&mut parts, &mut literal);
                if let Some((part, next)) = parse_tilde(&chars, i + 1) {
                    parts.push(part);
                    i = next;
                } else {
                    literal.push('~');
                    i += 2;
                }
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush(&mut parts, &mut literal);
    Ok(WordNode { parts })
}

/// Parse a heredoc body: only `$`, backquote and backslash are special.
pub fn parse_heredoc_body(raw: &str, line: usize) -> Result<WordNode, ParseError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut parts: Vec<WordPart> = Vec::new();
    let mut literal = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '\\' if matches!(chars.get(i + 1), Some('$') | Some('`') | Some('\\')) => {
                flush(&mut parts, &mut literal);
                parts.push(WordPart::Escaped(chars[i + 1].to_string()));
                i += 2;
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                i += 2;
            }
            '`' => {
                flush(&mut parts, &mut literal);
                let (part, next) = parse_backquoted(&chars, i, line)?;
                parts.push(part);
                i = next;
            }
            '$' => {
                let (part, next) = parse_dollar(&chars, i, line)?;
                match part {
                    Some(p) => {
                        flush(&mut parts, &mut literal);
                        parts.push(p);
                    }
                    None => literal.push('$'),
                }
                i = next;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush(&mut parts, &mut literal);
    Ok(WordNode { parts })
}

fn flush(parts: &mut Vec<WordPart>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(WordPart::Literal(std::mem::take(literal)));
    }
}

fn scan_until(chars: &[char], mut i: usize, close: char) -> (String, usize) {
    let mut out = String::new();
    while i < chars.len() && chars[i] != close {
        out.push(chars[i]);
        i += 1;
    }
    (out, (i + 1).min(chars.len() + 1))
}

/// `~` / `~user` / `~+` / `~-` prefix ending at `/` or end-of-word.
fn parse_tilde(chars: &[char], i: usize) -> Option<(WordPart, usize)> {
    debug_assert_eq!(chars.get(i), Some(&'~'));
    let mut j = i + 1;
    let mut user = String::new();
    while j < chars.len() {
        let c = chars[j];
        if c == '/' {
            break;
        }
        // Quoting or substitution syntax anywhere in the prefix makes the
        // tilde literal.
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' || c == '+') {
            return None;
        }
        user.push(c);
        j += 1;
    }
    let user = if user.is_empty() { None } else { Some(user) };
    Some((WordPart::Tilde(user), j))
}

/// Inside double quotes: expansions allowed, no splitting or globbing.
fn parse_double_quoted(
    chars: &[char],
    mut i: usize,
    line: usize,
) -> Result<(Vec<WordPart>, usize), ParseError> {
    let mut parts: Vec<WordPart> = Vec::new();
    let mut literal = String::new();
    loop {
        let c = match chars.get(i) {
            Some(&c) => c,
            None => return Err(ParseError::incomplete("unexpected EOF while looking for matching `\"'", line, 0)),
        };
        match c {
            '"' => {
                flush(&mut parts, &mut literal);
                return Ok((parts, i + 1));
            }
            '\\' => match chars.get(i + 1) {
                Some(&n @ ('$' | '`' | '"' | '\\')) => {
                    flush(&mut parts, &mut literal);
                    parts.push(WordPart::Escaped(n.to_string()));
                    i += 2;
                }
                Some('\n') => {
                    i += 2;
                }
                _ => {
                    literal.push('\\');
                    i += 1;
                }
            },
            '`' => {
                flush(&mut parts, &mut literal);
                let (part, next) = parse_backquoted(chars, i, line)?;
                parts.push(part);
                i = next;
            }
            '$' => {
                let (part, next) = parse_dollar(chars, i, line)?;
                match part {
                    Some(p) => {
                        flush(&mut parts, &mut literal);
                        parts.push(p);
                    }
                    None => literal.push('$'),
                }
                i = next;
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }
}

/// `$`-introduced syntax at `chars[i]`. Returns None part when the `$` is
/// literal; `next` always points past what was consumed.
fn parse_dollar(
    chars: &[char],
    i: usize,
    line: usize,
) -> Result<(Option<WordPart>, usize), ParseError> {
    match chars.get(i + 1) {
        Some('\'') => {
            let end = find_ansic_end(chars, i + 2)
                .ok_or_else(|| ParseError::incomplete("unexpected EOF while looking for matching `''", line, 0))?;
            let raw: String = chars[i + 2..end].iter().collect();
            Ok((Some(WordPart::AnsiC(resolve_ansi_c(&raw))), end + 1))
        }
        Some('"') => {
            // $"..." - translation is not supported; behaves as "...".
            let (inner, next) = parse_double_quoted(chars, i + 2, line)?;
            Ok((Some(WordPart::DoubleQuoted(inner)), next))
        }
        Some('(') => {
            if chars.get(i + 2) == Some(&'(') {
                // Try arithmetic first: `$((expr))` iff the inner paren's
                // match is immediately followed by the outer close.
                if let Some(inner_end) = find_matching(chars, i + 2, '(', ')') {
                    if chars.get(inner_end + 1) == Some(&')') {
                        let text: String = chars[i + 3..inner_end].iter().collect();
                        let expr = parse_arith(&text, line)?;
                        return Ok((Some(WordPart::ArithSubst(expr)), inner_end + 2));
                    }
                }
            }
            let end = find_matching(chars, i + 1, '(', ')')
                .ok_or_else(|| ParseError::incomplete("unexpected EOF while looking for matching `)'", line, 0))?;
            let body: String = chars[i + 2..end].iter().collect();
            Ok((
                Some(WordPart::CommandSubst { body: parse_subst_body(&body, line)?, backquoted: false }),
                end + 1,
            ))
        }
        Some('{') => {
            let end = find_matching(chars, i + 1, '{', '}')
                .ok_or_else(|| ParseError::incomplete("unexpected EOF while looking for matching `}'", line, 0))?;
            let inner: String = chars[i + 2..end].iter().collect();
            let part = parse_param_inner(&inner, line)?;
            Ok((Some(WordPart::Parameter(part)), end + 1))
        }
        Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
            let mut j = i + 1;
            let mut name = String::new();
            while let Some(&c) = chars.get(j) {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    j += 1;
                } else {
                    break;
                }
            }
            Ok((Some(WordPart::Parameter(simple_param(name))), j))
        }
        Some(&c) if c.is_ascii_digit() => {
            Ok((Some(WordPart::Parameter(simple_param(c.to_string()))), i + 2))
        }
        Some(&c) if matches!(c, '?' | '$' | '!' | '#' | '@' | '*' | '-') => {
            Ok((Some(WordPart::Parameter(simple_param(c.to_string()))), i + 2))
        }
        _ => Ok((None, i + 1)),
    }
}

fn simple_param(name: String) -> crate::ast::types::ParamExpPart {
    crate::ast::types::ParamExpPart { name, subscript: None, indirect: false, op: None }
}

fn parse_backquoted(
    chars: &[char],
    i: usize,
    line: usize,
) -> Result<(WordPart, usize), ParseError> {
    debug_assert_eq!(chars.get(i), Some(&'`'));
    let mut j = i + 1;
    let mut body = String::new();
    loop {
        match chars.get(j) {
            None => return Err(ParseError::incomplete("unexpected EOF while looking for matching ``'", line, 0)),
            Some('`') => break,
            Some('\\') => {
                // Inside backquotes, backslash only escapes $, ` and \.
                match chars.get(j + 1) {
                    Some(&n @ ('$' | '`' | '\\')) => {
                        body.push(n);
                        j += 2;
                    }
                    _ => {
                        body.push('\\');
                        j += 1;
                    }
                }
            }
            Some(&c) => {
                body.push(c);
                j += 1;
            }
        }
    }
    Ok((
        WordPart::CommandSubst { body: parse_subst_body(&body, line)?, backquoted: true },
        j + 1,
    ))
}

/// Parse a substitution body as a full script.
fn parse_subst_body(body: &str, line: usize) -> Result<ScriptNode, ParseError> {
    crate::parser::parse_script(body, None).map_err(|mut e| {
        e.line += line.saturating_sub(1);
        e
    })
}

/// Find the index of the close matching `chars[open_idx]`, honoring quotes
/// and nested opens.
pub fn find_matching(chars: &[char], open_idx: usize, open: char, close: char) -> Option<usize> {
    debug_assert_eq!(chars.get(open_idx), Some(&open));
    let mut depth = 0usize;
    let mut i = open_idx;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                i += 1;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn find_ansic_end(chars: &[char], mut i: usize) -> Option<usize> {
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\'' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

// =============================================================================
// Brace expansion candidates
// =============================================================================

/// `{...}` is a brace expansion when the matching close exists and the body
/// has a top-level comma or a valid `..` range; otherwise it stays literal.
fn try_parse_brace(
    chars: &[char],
    i: usize,
    line: usize,
) -> Result<Option<(Vec<BraceItem>, usize)>, ParseError> {
    let end = match find_matching(chars, i, '{', '}') {
        Some(e) => e,
        None => return Ok(None),
    };
    let inner: String = chars[i + 1..end].iter().collect();
    let items = split_brace_items(&inner);
    if items.len() > 1 {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(BraceItem::Word(parse_word(&item, line, false)?));
        }
        return Ok(Some((out, end + 1)));
    }
    if let Some(range) = try_parse_range(&inner) {
        return Ok(Some((vec![range], end + 1)));
    }
    Ok(None)
}

/// Split brace body on top-level commas, respecting nesting and quotes.
pub fn split_brace_items(inner: &str) -> Vec<String> {
    let chars: Vec<char> = inner.chars().collect();
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                current.push(c);
                if i + 1 < chars.len() {
                    current.push(chars[i + 1]);
                    i += 1;
                }
            }
            '\'' => {
                current.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    current.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    current.push('\'');
                }
            }
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                items.push(std::mem::take(&mut current));
                i += 1;
                continue;
            }
            _ => current.push(c),
        }
        i += 1;
    }
    items.push(current);
    items
}

/// `{1..5}`, `{a..e}`, `{01..10}`, optional `..step`.
fn try_parse_range(inner: &str) -> Option<BraceItem> {
    let segments: Vec<&str> = inner.split("..").collect();
    if segments.len() != 2 && segments.len() != 3 {
        return None;
    }
    let step = if segments.len() == 3 {
        match segments[2].parse::<i64>() {
            Ok(s) => s,
            Err(_) => return None,
        }
    } else {
        0
    };

    let (a, b) = (segments[0], segments[1]);
    if let (Ok(start), Ok(end)) = (a.parse::<i64>(), b.parse::<i64>()) {
        // Zero padding carries over from either endpoint.
        let pad = |s: &str| {
            let bare = s.strip_prefix('-').unwrap_or(s);
            if bare.len() > 1 && bare.starts_with('0') { s.len() } else { 0 }
        };
        let width = pad(a).max(pad(b));
        let step = normalize_step(step, start, end)?;
        return Some(BraceItem::Range { start, end, step, width, chars: false });
    }

    let (ac, bc) = (a.chars().collect::<Vec<_>>(), b.chars().collect::<Vec<_>>());
    if ac.len() == 1 && bc.len() == 1 && ac[0].is_ascii_alphabetic() && bc[0].is_ascii_alphabetic() {
        let (start, end) = (ac[0] as i64, bc[0] as i64);
        let step = normalize_step(step, start, end)?;
        return Some(BraceItem::Range { start, end, step, width: 0, chars: true });
    }
    None
}

fn normalize_step(step: i64, start: i64, end: i64) -> Option<i64> {
    let magnitude = if step == 0 { 1 } else { step.unsigned_abs() as i64 };
    Some(if start <= end { magnitude } else { -magnitude })
}

// =============================================================================
// ANSI-C quoting
// =============================================================================

/// Resolve $'...' escape sequences.
pub fn resolve_ansi_c(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let c = chars[i + 1];
        i += 2;
        match c {
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'e' | 'E' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '?' => out.push('?'),
            'x' => {
                let (val, used) = take_radix(&chars, i, 16, 2);
                if used == 0 {
                    out.push_str("\\x");
                } else {
                    out.push(val as u8 as char);
                    i += used;
                }
            }
            'u' => {
                let (val, used) = take_radix(&chars, i, 16, 4);
                if used == 0 {
                    out.push_str("\\u");
                } else {
                    out.push(char::from_u32(val).unwrap_or('\u{fffd}'));
                    i += used;
                }
            }
            'U' => {
                let (val, used) = take_radix(&chars, i, 16, 8);
                if used == 0 {
                    out.push_str("\\U");
                } else {
                    out.push(char::from_u32(val).unwrap_or('\u{fffd}'));
                    i += used;
                }
            }
            '0'..='7' => {
                let (val, used) = take_radix(&chars, i - 1, 8, 3);
                out.push((val & 0xff) as u8 as char);
                i = i - 1 + used;
            }
            'c' => {
                // \cX - control character.
                if i < chars.len() {
                    let ctl = chars[i].to_ascii_uppercase() as u32 ^ 0x40;
                    out.push(ctl as u8 as char);
                    i += 1;
                } else {
                    out.push_str("\\c");
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn take_radix(chars: &[char], start: usize, radix: u32, max_digits: usize) -> (u32, usize) {
    let mut val: u32 = 0;
    let mut used = 0usize;
    while used < max_digits {
        match chars.get(start + used).and_then(|c| c.to_digit(radix)) {
            Some(d) => {
                val = val.wrapping_mul(radix).wrapping_add(d);
                used += 1;
            }
            None => break,
        }
    }
    (val, used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::ParamExpPart;

    fn word(raw: &str) -> WordNode {
        parse_word(raw, 1, false).unwrap()
    }

    #[test]
    fn test_plain_literal() {
        assert_eq!(word("hello").parts, vec![WordPart::Literal("hello".into())]);
    }

    #[test]
    fn test_quotes() {
        let w = word("a'b c'\"d $x\"");
        assert_eq!(w.parts[0], WordPart::Literal("a".into()));
        assert_eq!(w.parts[1], WordPart::SingleQuoted("b c".into()));
        match &w.parts[2] {
            WordPart::DoubleQuoted(inner) => {
                assert_eq!(inner[0], WordPart::Literal("d ".into()));
                assert!(matches!(inner[1], WordPart::Parameter(_)));
            }
            other => panic!("expected double-quoted, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_parameter() {
        let w = word("$HOME/bin");
        assert!(matches!(
            &w.parts[0],
            WordPart::Parameter(ParamExpPart { name, .. }) if name == "HOME"
        ));
        assert_eq!(w.parts[1], WordPart::Literal("/bin".into()));
    }

    #[test]
    fn test_positional_single_digit() {
        let w = word("$12");
        assert!(matches!(
            &w.parts[0],
            WordPart::Parameter(ParamExpPart { name, .. }) if name == "1"
        ));
        assert_eq!(w.parts[1], WordPart::Literal("2".into()));
    }

    #[test]
    fn test_arith_vs_nested_subshell() {
        assert!(matches!(word("$((1+2))").parts[0], WordPart::ArithSubst(_)));
        assert!(matches!(
            word("$( (echo a); (echo b) )").parts[0],
            WordPart::CommandSubst { .. }
        ));
    }

    #[test]
    fn test_tilde_prefix() {
        assert_eq!(word("~/x").parts[0], WordPart::Tilde(None));
        assert_eq!(word("~root/x").parts[0], WordPart::Tilde(Some("root".into())));
        // Not at word start: literal.
        let w = word("a~b");
        assert_eq!(w.parts[0], WordPart::Literal("a~b".into()));
    }

    #[test]
    fn test_brace_candidates() {
        assert!(matches!(word("{a,b}").parts[0], WordPart::Brace(_)));
        assert!(matches!(word("{1..5}").parts[0], WordPart::Brace(_)));
        // No comma, no range: literal.
        assert_eq!(word("{abc}").parts[0], WordPart::Literal("{".into()));
    }

    #[test]
    fn test_range_zero_pad() {
        match &word("{01..10}").parts[0] {
            WordPart::Brace(items) => match &items[0] {
                BraceItem::Range { start, end, width, .. } => {
                    assert_eq!((*start, *end, *width), (1, 10, 2));
                }
                other => panic!("expected range, got {:?}", other),
            },
            other => panic!("expected brace, got {:?}", other),
        }
    }

    #[test]
    fn test_ansi_c() {
        assert_eq!(resolve_ansi_c("a\\nb"), "a\nb");
        assert_eq!(resolve_ansi_c("\\x41\\102"), "AB");
        assert_eq!(resolve_ansi_c("\\u0041"), "A");
    }

    #[test]
    fn test_backquote_unescaping() {
        let w = word("`echo \\$HOME`");
        match &w.parts[0] {
            WordPart::CommandSubst { backquoted, .. } => assert!(*backquoted),
            other => panic!("expected command subst, got {:?}", other),
        }
    }

    #[test]
    fn test_heredoc_body_mode() {
        let w = parse_heredoc_body("line $X\n'not quoted'\n", 1).unwrap();
        assert!(matches!(&w.parts[1], WordPart::Parameter(_)));
        // Single quotes are plain characters in heredoc bodies.
        assert!(w
            .parts
            .iter()
            .any(|p| matches!(p, WordPart::Literal(l) if l.contains('\''))));
    }
}

//! Brace expansion: the very first pass, before any other expansion.
//!
//! `{a,b}{1,2}` products, `{1..5}` and `{a..e}` ranges with optional
//! step and zero-pad carry-over. Non-matching `{...}` was already left
//! literal by the word parser.

use crate::ast::types::{BraceItem, WordNode, WordPart};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

/// Expand the first brace group; recurse for the rest (outermost-first,
/// cartesian across groups).
pub fn brace_expand_word(word: &WordNode) -> Vec<WordNode> {
    let brace_at = word.parts.iter().position(|p| matches!(p, WordPart::Brace(_)));
    let idx = match brace_at {
        Some(i) => i,
        None => return vec![word.clone()],
    };
    let items = match &word.parts[idx] {
        WordPart::Brace(items) => items,
        _ => unreachable!(),
    };

    let prefix = &word.parts[..idx];
    let suffix = &word.parts[idx + 1..];
    let mut out = Vec::new();
    for expansion in expand_items(items) {
        let mut parts = prefix.to_vec();
        parts.extend(expansion);
        parts.extend(suffix.to_vec());
        // The suffix may hold further groups.
        out.extend(brace_expand_word(&WordNode { parts }));
    }
    out
}

fn expand_items(items: &[BraceItem]) -> Vec<Vec<WordPart>> {
    let mut out = Vec::new();
    for item in items {
        match item {
            BraceItem::Word(w) => out.push(w.parts.clone()),
            BraceItem::Range { start, end, step, width, chars } => {
                for text in range_values(*start, *end, *step, *width, *chars) {
                    out.push(vec![WordPart::Literal(text)]);
                }
            }
        }
    }
    out
}

fn range_values(start: i64, end: i64, step: i64, width: usize, chars: bool) -> Vec<String> {
    let mut out = Vec::new();
    if step == 0 {
        return out;
    }
    let mut v = start;
    loop {
        if (step > 0 && v > end) || (step < 0 && v < end) {
            break;
        }
        if chars {
            if let Some(c) = char::from_u32(v as u32) {
                out.push(c.to_string());
            }
        } else if width > 0 {
            let sign = if v < 0 { "-" } else { "" };
            out.push(format!("{}{:0>pad$}", sign, v.abs(), pad = width.saturating_sub(sign.len())));
        } else {
            out.push(v.to_string());
        }
        v += step;
        // Bounded by the i64 walk; a pathological step cannot loop.
        if out.len() > 100_000 {
            break;
        }
    }
    out
}

impl Interpreter {
    /// Render a brace group back to literal text for contexts that do not
    /// brace-expand (assignment values, case subjects).
    pub(crate) fn render_brace_literal(&mut self, items: &[BraceItem]) -> Result<String, ExecError> {
        let mut rendered = Vec::new();
        for item in items {
            match item {
                BraceItem::Word(w) => rendered.push(self.expand_word_unsplit(w)?),
                BraceItem::Range { start, end, step, chars, .. } => {
                    let show = |v: i64| {
                        if *chars {
                            char::from_u32(v as u32).map(|c| c.to_string()).unwrap_or_default()
                        } else {
                            v.to_string()
                        }
                    };
                    let mut text = format!("{}..{}", show(*start), show(*end));
                    if step.abs() != 1 {
                        text.push_str(&format!("..{}", step.abs()));
                    }
                    rendered.push(text);
                }
            }
        }
        Ok(format!("{{{}}}", rendered.join(",")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::word_parser::parse_word;

    fn expand(raw: &str) -> Vec<String> {
        let word = parse_word(raw, 1, false).unwrap();
        brace_expand_word(&word)
            .into_iter()
            .map(|w| {
                w.parts
                    .iter()
                    .map(|p| match p {
                        WordPart::Literal(s) => s.clone(),
                        WordPart::SingleQuoted(s) => s.clone(),
                        other => panic!("unexpected part {:?}", other),
                    })
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn test_simple_product() {
        assert_eq!(expand("{a,b}{1,2}"), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn test_prefix_suffix() {
        assert_eq!(expand("x{a,b}y"), vec!["xay", "xby"]);
    }

    #[test]
    fn test_numeric_range() {
        assert_eq!(expand("{1..4}"), vec!["1", "2", "3", "4"]);
        assert_eq!(expand("{4..1}"), vec!["4", "3", "2", "1"]);
        assert_eq!(expand("{1..10..3}"), vec!["1", "4", "7", "10"]);
    }

    #[test]
    fn test_zero_pad() {
        assert_eq!(expand("{08..10}"), vec!["08", "09", "10"]);
    }

    #[test]
    fn test_char_range() {
        assert_eq!(expand("{a..e}"), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_nested() {
        assert_eq!(expand("{a,{b,c}}"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_braces_is_identity() {
        assert_eq!(expand("plain"), vec!["plain"]);
    }
}

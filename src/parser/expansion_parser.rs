//! `${...}` parameter expansion grammar.
//!
//! Parses the text between the braces into a `ParamExpPart`: parameter
//! name, optional subscript, indirection, and the operation suffix
//! (defaults, substring, pattern ops, case conversion, transforms,
//! name/key listings).

use crate::ast::types::{
    CaseConvertKind, ParamExpPart, ParamOp, ParamSubscript, PatternAnchor,
};
use crate::parser::arithmetic_parser::parse_arith;
use crate::parser::types::ParseError;
use crate::parser::word_parser::parse_word;

pub fn parse_param_inner(inner: &str, line: usize) -> Result<ParamExpPart, ParseError> {
    if inner.is_empty() {
        return Err(bad_subst(inner, line));
    }
    let chars: Vec<char> = inner.chars().collect();

    // ${#...} - length, or the parameters `#`, `##`-less forms.
    if chars[0] == '#' && chars.len() > 1 {
        let rest: String = chars[1..].iter().collect();
        let (name, subscript, consumed) = parse_param_ref(&rest, line)?;
        if consumed == rest.chars().count() {
            return Ok(ParamExpPart {
                name,
                subscript,
                indirect: false,
                op: Some(ParamOp::Length),
            });
        }
        return Err(bad_subst(inner, line));
    }

    // ${!...} - indirection, name listing, or key listing.
    if chars[0] == '!' && chars.len() > 1 {
        let rest: String = chars[1..].iter().collect();
        let rest_chars: Vec<char> = rest.chars().collect();
        let last = rest_chars[rest_chars.len() - 1];
        // ${!prefix*} / ${!prefix@}
        if (last == '*' || last == '@') && rest_chars.len() > 1 {
            let prefix: String = rest_chars[..rest_chars.len() - 1].iter().collect();
            if prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Ok(ParamExpPart {
                    name: prefix,
                    subscript: None,
                    indirect: false,
                    op: Some(ParamOp::Names { star: last == '*' }),
                });
            }
        }
        let (name, subscript, consumed) = parse_param_ref(&rest, line)?;
        // ${!arr[@]} / ${!arr[*]}
        if consumed == rest.chars().count() {
            if let Some(ParamSubscript::At) = subscript {
                return Ok(ParamExpPart {
                    name,
                    subscript: None,
                    indirect: false,
                    op: Some(ParamOp::Keys { star: false }),
                });
            }
            if let Some(ParamSubscript::Star) = subscript {
                return Ok(ParamExpPart {
                    name,
                    subscript: None,
                    indirect: false,
                    op: Some(ParamOp::Keys { star: true }),
                });
            }
            return Ok(ParamExpPart { name, subscript, indirect: true, op: None });
        }
        let op_text: String = rest_chars[consumed..].iter().collect();
        let op = parse_op(&op_text, line)?;
        return Ok(ParamExpPart { name, subscript, indirect: true, op: Some(op) });
    }

    let (name, subscript, consumed) = parse_param_ref(inner, line)?;
    if consumed == chars.len() {
        return Ok(ParamExpPart { name, subscript, indirect: false, op: None });
    }
    let op_text: String = chars[consumed..].iter().collect();
    let op = parse_op(&op_text, line)?;
    Ok(ParamExpPart { name, subscript, indirect: false, op: Some(op) })
}

fn bad_subst(inner: &str, line: usize) -> ParseError {
    ParseError::new(format!("${{{}}}: bad substitution", inner), line, 0)
}

/// Parse a parameter reference: name (or special char or digits) plus an
/// optional `[subscript]`. Returns (name, subscript, chars consumed).
fn parse_param_ref(
    s: &str,
    line: usize,
) -> Result<(String, Option<ParamSubscript>, usize), ParseError> {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        return Err(bad_subst(s, line));
    }
    let (name, mut i) = if chars[0].is_ascii_alphabetic() || chars[0] == '_' {
        let mut j = 0usize;
        while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
            j += 1;
        }
        (chars[..j].iter().collect::<String>(), j)
    } else if chars[0].is_ascii_digit() {
        let mut j = 0usize;
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        (chars[..j].iter().collect::<String>(), j)
    } else if matches!(chars[0], '@' | '*' | '#' | '?' | '$' | '!' | '-') {
        (chars[0].to_string(), 1)
    } else {
        return Err(bad_subst(s, line));
    };

    let mut subscript = None;
    if chars.get(i) == Some(&'[') {
        let mut depth = 0i32;
        let mut j = i;
        let mut close = None;
        while j < chars.len() {
            match chars[j] {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(j);
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        let close = close.ok_or_else(|| bad_subst(s, line))?;
        let sub: String = chars[i + 1..close].iter().collect();
        subscript = Some(match sub.as_str() {
            "@" => ParamSubscript::At,
            "*" => ParamSubscript::Star,
            _ => ParamSubscript::Index(sub),
        });
        i = close + 1;
    }
    Ok((name, subscript, i))
}

/// Parse the operation suffix that follows the parameter reference.
fn parse_op(op: &str, line: usize) -> Result<ParamOp, ParseError> {
    let chars: Vec<char> = op.chars().collect();
    let word_of = |s: &str| parse_word(s, line, false);

    match chars[0] {
        ':' => match chars.get(1) {
            Some('-') => Ok(ParamOp::Default { word: word_of(&op[2..])?, colon: true }),
            Some('=') => Ok(ParamOp::Assign { word: word_of(&op[2..])?, colon: true }),
            Some('?') => Ok(ParamOp::Error {
                word: if op.len() > 2 { Some(word_of(&op[2..])?) } else { None },
                colon: true,
            }),
            Some('+') => Ok(ParamOp::Alternative { word: word_of(&op[2..])?, colon: true }),
            _ => {
                // Substring: ${x:offset} / ${x:offset:length}.
                let rest = &op[1..];
                let (off_text, len_text) = split_substring(rest);
                let offset = parse_arith(&off_text, line)?;
                let length = match len_text {
                    Some(t) => Some(parse_arith(&t, line)?),
                    None => None,
                };
                Ok(ParamOp::Substring { offset, length })
            }
        },
        '-' => Ok(ParamOp::Default { word: word_of(&op[1..])?, colon: false }),
        '=' => Ok(ParamOp::Assign { word: word_of(&op[1..])?, colon: false }),
        '?' => Ok(ParamOp::Error {
            word: if op.len() > 1 { Some(word_of(&op[1..])?) } else { None },
            colon: false,
        }),
        '+' => Ok(ParamOp::Alternative { word: word_of(&op[1..])?, colon: false }),
        '#' => {
            let greedy = chars.get(1) == Some(&'#');
            let rest = if greedy { &op[2..] } else { &op[1..] };
            Ok(ParamOp::RemovePattern { pattern: word_of(rest)?, from_end: false, greedy })
        }
        '%' => {
            let greedy = chars.get(1) == Some(&'%');
            let rest = if greedy { &op[2..] } else { &op[1..] };
            Ok(ParamOp::RemovePattern { pattern: word_of(rest)?, from_end: true, greedy })
        }
        '/' => parse_replacement(&chars, line),
        '^' => {
            let all = chars.get(1) == Some(&'^');
            let rest = if all { &op[2..] } else { &op[1..] };
            Ok(ParamOp::CaseConvert {
                kind: CaseConvertKind::Upper,
                all,
                pattern: if rest.is_empty() { None } else { Some(word_of(rest)?) },
            })
        }
        ',' => {
            let all = chars.get(1) == Some(&',');
            let rest = if all { &op[2..] } else { &op[1..] };
            Ok(ParamOp::CaseConvert {
                kind: CaseConvertKind::Lower,
                all,
                pattern: if rest.is_empty() { None } else { Some(word_of(rest)?) },
            })
        }
        '~' => {
            let all = chars.get(1) == Some(&'~');
            let rest = if all { &op[2..] } else { &op[1..] };
            Ok(ParamOp::CaseConvert {
                kind: CaseConvertKind::Toggle,
                all,
                pattern: if rest.is_empty() { None } else { Some(word_of(rest)?) },
            })
        }
        '@' => {
            if chars.len() == 2 && "ULuQEPAaKk".contains(chars[1]) {
                Ok(ParamOp::Transform(chars[1]))
            } else {
                Err(ParseError::new(format!("{}: bad substitution", op), line, 0))
            }
        }
        _ => Err(ParseError::new(format!("{}: bad substitution", op), line, 0)),
    }
}

/// `${x/pat/rep}` family: `/` all, `#`/`%` anchors, replacement optional.
fn parse_replacement(chars: &[char], line: usize) -> Result<ParamOp, ParseError> {
    let mut i = 1usize;
    let mut all = false;
    let mut anchor = None;
    match chars.get(i) {
        Some('/') => {
            all = true;
            i += 1;
        }
        Some('#') => {
            anchor = Some(PatternAnchor::Start);
            i += 1;
        }
        Some('%') => {
            anchor = Some(PatternAnchor::End);
            i += 1;
        }
        _ => {}
    }
    // Pattern runs to the first unescaped `/`.
    let mut pattern = String::new();
    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1) == Some(&'/') => {
                pattern.push_str("\\/");
                i += 2;
            }
            '\\' => {
                pattern.push('\\');
                if let Some(&n) = chars.get(i + 1) {
                    pattern.push(n);
                    i += 1;
                }
                i += 1;
            }
            '/' => break,
            c => {
                pattern.push(c);
                i += 1;
            }
        }
    }
    let replacement = if chars.get(i) == Some(&'/') {
        let rep: String = chars[i + 1..].iter().collect();
        Some(parse_word(&rep, line, false)?)
    } else {
        None
    };
    // Unescape the `/` protections in the pattern text.
    let pattern_text = pattern.replace("\\/", "/");
    Ok(ParamOp::ReplacePattern {
        pattern: parse_word(&pattern_text, line, false)?,
        replacement,
        all,
        anchor,
    })
}

/// Split `offset[:length]` at the top-level colon, ignoring colons inside
/// parentheses and `?:` ternaries.
fn split_substring(s: &str) -> (String, Option<String>) {
    let chars: Vec<char> = s.chars().collect();
    let mut depth = 0i32;
    let mut ternary = 0i32;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '?' => ternary += 1,
            ':' if depth == 0 && ternary > 0 => ternary -= 1,
            ':' if depth == 0 => {
                let off: String = chars[..i].iter().collect();
                let len: String = chars[i + 1..].iter().collect();
                return (off, Some(len));
            }
            _ => {}
        }
    }
    (s.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let p = parse_param_inner("HOME", 1).unwrap();
        assert_eq!(p.name, "HOME");
        assert!(p.op.is_none());
        assert!(!p.indirect);
    }

    #[test]
    fn test_default_value() {
        let p = parse_param_inner("x:-fallback", 1).unwrap();
        match p.op.unwrap() {
            ParamOp::Default { colon, .. } => assert!(colon),
            other => panic!("expected default, got {:?}", other),
        }
        let p = parse_param_inner("x-fallback", 1).unwrap();
        match p.op.unwrap() {
            ParamOp::Default { colon, .. } => assert!(!colon),
            other => panic!("expected default, got {:?}", other),
        }
    }

    #[test]
    fn test_length() {
        let p = parse_param_inner("#var", 1).unwrap();
        assert_eq!(p.name, "var");
        assert!(matches!(p.op, Some(ParamOp::Length)));
    }

    #[test]
    fn test_substring() {
        let p = parse_param_inner("x:1:3", 1).unwrap();
        match p.op.unwrap() {
            ParamOp::Substring { length, .. } => assert!(length.is_some()),
            other => panic!("expected substring, got {:?}", other),
        }
        // Negative length needs the parenthesis or space form.
        let p = parse_param_inner("x: -2", 1).unwrap();
        assert!(matches!(p.op, Some(ParamOp::Substring { .. })));
    }

    #[test]
    fn test_pattern_removal() {
        let p = parse_param_inner("path##*/", 1).unwrap();
        match p.op.unwrap() {
            ParamOp::RemovePattern { from_end, greedy, .. } => {
                assert!(!from_end);
                assert!(greedy);
            }
            other => panic!("expected removal, got {:?}", other),
        }
    }

    #[test]
    fn test_replacement() {
        let p = parse_param_inner("x/a/b", 1).unwrap();
        match p.op.unwrap() {
            ParamOp::ReplacePattern { all, anchor, replacement, .. } => {
                assert!(!all);
                assert!(anchor.is_none());
                assert!(replacement.is_some());
            }
            other => panic!("expected replacement, got {:?}", other),
        }
        let p = parse_param_inner("x//a", 1).unwrap();
        match p.op.unwrap() {
            ParamOp::ReplacePattern { all, replacement, .. } => {
                assert!(all);
                assert!(replacement.is_none());
            }
            other => panic!("expected replacement, got {:?}", other),
        }
    }

    #[test]
    fn test_indirection_and_listings() {
        let p = parse_param_inner("!ref", 1).unwrap();
        assert!(p.indirect);
        let p = parse_param_inner("!pre*", 1).unwrap();
        assert!(matches!(p.op, Some(ParamOp::Names { star: true })));
        let p = parse_param_inner("!arr[@]", 1).unwrap();
        assert!(matches!(p.op, Some(ParamOp::Keys { star: false })));
    }

    #[test]
    fn test_array_subscripts() {
        let p = parse_param_inner("arr[2]", 1).unwrap();
        assert!(matches!(p.subscript, Some(ParamSubscript::Index(ref s)) if s == "2"));
        let p = parse_param_inner("arr[@]", 1).unwrap();
        assert!(matches!(p.subscript, Some(ParamSubscript::At)));
    }

    #[test]
    fn test_case_and_transform() {
        let p = parse_param_inner("x^^", 1).unwrap();
        assert!(matches!(
            p.op,
            Some(ParamOp::CaseConvert { kind: CaseConvertKind::Upper, all: true, .. })
        ));
        let p = parse_param_inner("x@Q", 1).unwrap();
        assert!(matches!(p.op, Some(ParamOp::Transform('Q'))));
    }

    #[test]
    fn test_bad_substitution() {
        assert!(parse_param_inner("x!!", 1).is_err());
        assert!(parse_param_inner("", 1).is_err());
    }
}

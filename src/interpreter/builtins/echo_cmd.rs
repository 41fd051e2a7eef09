//! echo - write arguments joined by spaces.
//!
//! `-n` suppresses the newline; `-e`/`-E` toggle backslash-escape
//! interpretation. Flag parsing stops at the first argument that is not
//! exclusively recognized flags.

use std::io::Write;

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_echo(_interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut newline = true;
    let mut escapes = false;
    let mut start = 0usize;

    for arg in args {
        let body = match arg.strip_prefix('-') {
            Some(b) if !b.is_empty() && b.chars().all(|c| matches!(c, 'n' | 'e' | 'E')) => b,
            _ => break,
        };
        for c in body.chars() {
            match c {
                'n' => newline = false,
                'e' => escapes = true,
                'E' => escapes = false,
                _ => unreachable!(),
            }
        }
        start += 1;
    }

    let mut out = String::new();
    let mut suppress_rest = false;
    for (i, arg) in args[start..].iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if escapes {
            let (text, stop) = expand_escapes(arg);
            out.push_str(&text);
            if stop {
                suppress_rest = true;
                break;
            }
        } else {
            out.push_str(arg);
        }
    }
    if newline && !suppress_rest {
        out.push('\n');
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = handle.write_all(out.as_bytes());
    let _ = handle.flush();
    Ok(ExecOutcome::success())
}

/// Resolve `echo -e` escapes. The bool is true when `\c` ended output.
pub fn expand_escapes(s: &str) -> (String, bool) {
    let chars: Vec<char> = s.chars().collect();
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
            'c' => return (out, true),
            'e' | 'E' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            '0' => {
                let mut val = 0u32;
                let mut used = 0;
                while used < 3 {
                    match chars.get(i).and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            val = val * 8 + d;
                            i += 1;
                            used += 1;
                        }
                        None => break,
                    }
                }
                out.push((val & 0xff) as u8 as char);
            }
            'x' => {
                let mut val = 0u32;
                let mut used = 0;
                while used < 2 {
                    match chars.get(i).and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            val = val * 16 + d;
                            i += 1;
                            used += 1;
                        }
                        None => break,
                    }
                }
                if used == 0 {
                    out.push_str("\\x");
                } else {
                    out.push(val as u8 as char);
                }
            }
            'u' => {
                let mut val = 0u32;
                let mut used = 0;
                while used < 4 {
                    match chars.get(i).and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            val = val * 16 + d;
                            i += 1;
                            used += 1;
                        }
                        None => break,
                    }
                }
                if used == 0 {
                    out.push_str("\\u");
                } else {
                    out.push(char::from_u32(val).unwrap_or('\u{fffd}'));
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    (out, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes() {
        assert_eq!(expand_escapes("a\\tb"), ("a\tb".to_string(), false));
        assert_eq!(expand_escapes("x\\n"), ("x\n".to_string(), false));
        assert_eq!(expand_escapes("a\\cb"), ("a".to_string(), true));
        assert_eq!(expand_escapes("\\x41"), ("A".to_string(), false));
        assert_eq!(expand_escapes("\\052"), ("*".to_string(), false));
    }
}

//! printf - formatted output.
//!
//! The format string is reused until the arguments are exhausted (and
//! applied once with empty arguments when there are none). `-v VAR`
//! captures the output into a variable instead of writing it.

use std::io::Write;

use crate::interpreter::builtins::echo_cmd::expand_escapes;
use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::expansion::quoting::shell_quote;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_printf(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut args = args;
    let mut capture: Option<String> = None;
    if args.first().map(|a| a.as_str()) == Some("-v") {
        match args.get(1) {
            Some(name) => {
                capture = Some(name.clone());
                args = &args[2..];
            }
            None => return usage_error(interp, "printf: -v: option requires an argument"),
        }
    }
    let format = match args.first() {
        Some(f) => f.clone(),
        None => return usage_error(interp, "printf: usage: printf [-v var] format [arguments]"),
    };
    let mut operands = args[1..].iter();

    let mut out = String::new();
    let mut status = 0;
    loop {
        let mut consumed_any = false;
        let result = render_format(&format, &mut operands, &mut consumed_any);
        match result {
            Ok(rendered) => out.push_str(&rendered),
            Err(msg) => {
                interp.diagnostic(&format!("printf: {}", msg));
                status = 1;
                break;
            }
        }
        // Reuse the format while arguments remain.
        if !consumed_any || operands.len() == 0 {
            break;
        }
    }

    match capture {
        Some(name) => {
            if let Err(e) = interp.env.set_scalar(&name, out) {
                interp.diagnostic(&format!("printf: {}", e));
                return Ok(ExecOutcome::status(1));
            }
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            let _ = handle.write_all(out.as_bytes());
            let _ = handle.flush();
        }
    }
    Ok(ExecOutcome::status(status))
}

fn render_format<'a>(
    format: &str,
    operands: &mut std::slice::Iter<'a, String>,
    consumed_any: &mut bool,
) -> Result<String, String> {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;
    let mut next = |consumed: &mut bool| -> &'a str {
        match operands.next() {
            Some(s) => {
                *consumed = true;
                s.as_str()
            }
            None => "",
        }
    };

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let len = escape_len(&chars, i);
                let segment: String = chars[i..i + len].iter().collect();
                let (text, _) = expand_escapes(&segment);
                out.push_str(&text);
                i += len;
            }
            '%' => {
                if chars.get(i + 1) == Some(&'%') {
                    out.push('%');
                    i += 2;
                    continue;
                }
                let (spec, end) = parse_spec(&chars, i)?;
                i = end;
                let arg = next(consumed_any);
                out.push_str(&apply_spec(&spec, arg)?);
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn escape_len(chars: &[char], i: usize) -> usize {
    // `\` plus its escape body; octal/hex runs are bounded.
    match chars.get(i + 1) {
        None => 1,
        Some('0') => {
            let mut len = 2;
            while len < 5 && chars.get(i + len).map(|c| c.is_digit(8)).unwrap_or(false) {
                len += 1;
            }
            len
        }
        Some('x') => {
            let mut len = 2;
            while len < 4 && chars.get(i + len).map(|c| c.is_ascii_hexdigit()).unwrap_or(false) {
                len += 1;
            }
            len
        }
        Some(_) => 2,
    }
}

struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conv: char,
}

fn parse_spec(chars: &[char], start: usize) -> Result<(Spec, usize), String> {
    let mut spec = Spec {
        minus: false,
        plus: false,
        space: false,
        zero: false,
        alt: false,
        width: None,
        precision: None,
        conv: 's',
    };
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            Some('-') => spec.minus = true,
            Some('+') => spec.plus = true,
            Some(' ') => spec.space = true,
            Some('0') => spec.zero = true,
            Some('#') => spec.alt = true,
            _ => break,
        }
        i += 1;
    }
    let mut width = String::new();
    while chars.get(i).map(|c| c.is_ascii_digit()).unwrap_or(false) {
        width.push(chars[i]);
        i += 1;
    }
    if !width.is_empty() {
        spec.width = width.parse().ok();
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let mut prec = String::new();
        while chars.get(i).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            prec.push(chars[i]);
            i += 1;
        }
        spec.precision = Some(prec.parse().unwrap_or(0));
    }
    match chars.get(i) {
        Some(&c) if "sbqdiuoxXcefgEGa".contains(c) => {
            spec.conv = c;
            Ok((spec, i + 1))
        }
        Some(&c) => Err(format!("`{}': invalid format character", c)),
        None => Err("missing format character".to_string()),
    }
}

fn apply_spec(spec: &Spec, arg: &str) -> Result<String, String> {
    let body = match spec.conv {
        's' => {
            let mut s = arg.to_string();
            if let Some(p) = spec.precision {
                s = s.chars().take(p).collect();
            }
            s
        }
        'b' => expand_escapes(arg).0,
        'q' => shell_quote(arg),
        'c' => arg.chars().next().map(|c| c.to_string()).unwrap_or_default(),
        'd' | 'i' => {
            let n = parse_int(arg)?;
            let mut s = n.abs().to_string();
            if let Some(p) = spec.precision {
                while s.len() < p {
                    s.insert(0, '0');
                }
            }
            if n < 0 {
                format!("-{}", s)
            } else if spec.plus {
                format!("+{}", s)
            } else if spec.space {
                format!(" {}", s)
            } else {
                s
            }
        }
        'u' => (parse_int(arg)? as u64).to_string(),
        'o' => {
            let n = parse_int(arg)? as u64;
            if spec.alt {
                format!("0{:o}", n)
            } else {
                format!("{:o}", n)
            }
        }
        'x' => {
            let n = parse_int(arg)? as u64;
            if spec.alt {
                format!("0x{:x}", n)
            } else {
                format!("{:x}", n)
            }
        }
        'X' => {
            let n = parse_int(arg)? as u64;
            if spec.alt {
                format!("0X{:X}", n)
            } else {
                format!("{:X}", n)
            }
        }
        'e' | 'E' | 'f' | 'g' | 'G' | 'a' => {
            let v: f64 = if arg.is_empty() {
                0.0
            } else {
                arg.trim().parse().map_err(|_| format!("{}: invalid number", arg))?
            };
            let p = spec.precision.unwrap_or(6);
            match spec.conv {
                'f' => format!("{:.*}", p, v),
                'e' => format!("{:.*e}", p, v),
                'E' => format!("{:.*E}", p, v),
                _ => format!("{}", v),
            }
        }
        _ => arg.to_string(),
    };

    Ok(pad(body, spec))
}

fn pad(body: String, spec: &Spec) -> String {
    let width = match spec.width {
        Some(w) => w,
        None => return body,
    };
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if spec.minus {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.zero && !body.starts_with('-') && body.chars().all(|c| !c.is_alphabetic() || c.is_ascii_hexdigit()) {
        format!("{}{}", "0".repeat(fill), body)
    } else if spec.zero && body.starts_with('-') {
        format!("-{}{}", "0".repeat(fill), &body[1..])
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

/// Integer operand: decimal, 0x hex, leading-0 octal, or 'c for a
/// character code.
fn parse_int(arg: &str) -> Result<i64, String> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Some(rest) = trimmed.strip_prefix('\'').or_else(|| trimmed.strip_prefix('"')) {
        return Ok(rest.chars().next().map(|c| c as i64).unwrap_or(0));
    }
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(d) => (-1i64, d),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    crate::parser::arithmetic_parser::number_from_str(digits)
        .map(|n| sign.wrapping_mul(n))
        .ok_or_else(|| format!("{}: invalid number", arg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, args: &[&str]) -> String {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut iter = owned.iter();
        let mut consumed = false;
        let mut out = String::new();
        loop {
            out.push_str(&render_format(format, &mut iter, &mut consumed).unwrap());
            if !consumed || iter.len() == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn test_basic() {
        assert_eq!(fmt("%s\n", &["hi"]), "hi\n");
        assert_eq!(fmt("%d+%d\n", &["1", "2"]), "1+2\n");
        assert_eq!(fmt("%x", &["255"]), "ff");
        assert_eq!(fmt("%o", &["8"]), "10");
    }

    #[test]
    fn test_format_reuse() {
        assert_eq!(fmt("%s\n", &["a", "b"]), "a\nb\n");
    }

    #[test]
    fn test_width_and_precision() {
        assert_eq!(fmt("%5s", &["ab"]), "   ab");
        assert_eq!(fmt("%-5s|", &["ab"]), "ab   |");
        assert_eq!(fmt("%05d", &["42"]), "00042");
        assert_eq!(fmt("%.2f", &["3.14159"]), "3.14");
        assert_eq!(fmt("%.3s", &["abcdef"]), "abc");
    }

    #[test]
    fn test_missing_args_are_empty() {
        assert_eq!(fmt("%s-%s", &["x"]), "x-");
        assert_eq!(fmt("%d", &[]), "0");
    }

    #[test]
    fn test_char_code() {
        assert_eq!(fmt("%d", &["'A"]), "65");
    }
}

//! read - read a line from a file descriptor into variables.

use std::os::fd::BorrowedFd;

use nix::poll::{poll, PollFd, PollFlags};

use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::expansion::word_split::split_fields;
use crate::interpreter::interpreter::Interpreter;

struct ReadOptions {
    raw: bool,
    prompt: Option<String>,
    max_chars: Option<usize>,
    delimiter: u8,
    array: Option<String>,
    timeout: Option<f64>,
    fd: i32,
}

pub fn handle_read(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut opts = ReadOptions {
        raw: false,
        prompt: None,
        max_chars: None,
        delimiter: b'\n',
        array: None,
        timeout: None,
        fd: 0,
    };
    let mut names: Vec<String> = Vec::new();

    let mut i = 0usize;
    while i < args.len() {
        let arg = &args[i];
        if !arg.starts_with('-') || arg == "-" || arg == "--" {
            if arg == "--" {
                i += 1;
            }
            names.extend(args[i..].iter().cloned());
            break;
        }
        let mut take_value = |i: &mut usize| -> Option<String> {
            *i += 1;
            args.get(*i).cloned()
        };
        match arg.as_str() {
            "-r" => opts.raw = true,
            // -s (silent) needs terminal modes; accepted and ignored.
            "-s" => {}
            "-p" => match take_value(&mut i) {
                Some(v) => opts.prompt = Some(v),
                None => return usage_error(interp, "read: -p: option requires an argument"),
            },
            "-n" | "-N" => match take_value(&mut i).and_then(|v| v.parse().ok()) {
                Some(n) => opts.max_chars = Some(n),
                None => return usage_error(interp, "read: -n: numeric argument required"),
            },
            "-d" => match take_value(&mut i) {
                Some(v) => opts.delimiter = v.bytes().next().unwrap_or(0),
                None => return usage_error(interp, "read: -d: option requires an argument"),
            },
            "-a" => match take_value(&mut i) {
                Some(v) => opts.array = Some(v),
                None => return usage_error(interp, "read: -a: option requires an argument"),
            },
            "-t" => match take_value(&mut i).and_then(|v| v.parse().ok()) {
                Some(t) => opts.timeout = Some(t),
                None => return usage_error(interp, "read: -t: numeric argument required"),
            },
            "-u" => match take_value(&mut i).and_then(|v| v.parse().ok()) {
                Some(fd) => opts.fd = fd,
                None => return usage_error(interp, "read: -u: numeric argument required"),
            },
            other => {
                return usage_error(interp, &format!("read: {}: invalid option", other));
            }
        }
        i += 1;
    }

    if let Some(prompt) = &opts.prompt {
        eprint!("{}", prompt);
    }

    let (raw_line, eof, timed_out) = read_until(&opts);
    if timed_out {
        return Ok(ExecOutcome::status(142));
    }

    // Backslash processing unless -r: escaped delimiters and
    // line continuations are resolved before splitting.
    let (line, protected) = if opts.raw {
        (raw_line.clone(), vec![false; raw_line.chars().count()])
    } else {
        process_backslashes(&raw_line)
    };

    let ifs = interp.env.ifs();

    if let Some(array) = &opts.array {
        let (fields, _, _) = split_fields(&line, &ifs);
        let value = crate::environment::value::Value::indexed_from(fields);
        if let Err(e) = interp.env.set_value(array, value, crate::environment::SetScope::Normal) {
            interp.diagnostic(&format!("read: {}", e));
            return Ok(ExecOutcome::status(1));
        }
        return Ok(ExecOutcome::status(if eof && line.is_empty() { 1 } else { 0 }));
    }

    if names.is_empty() {
        let trimmed = trim_ifs_ws(&line, &ifs);
        if let Err(e) = interp.env.set_scalar("REPLY", trimmed) {
            interp.diagnostic(&format!("read: {}", e));
            return Ok(ExecOutcome::status(1));
        }
        return Ok(ExecOutcome::status(if eof && line.is_empty() { 1 } else { 0 }));
    }

    let assignments = split_for_names(&line, &protected, &ifs, names.len());
    for (name, value) in names.iter().zip(assignments.iter()) {
        if let Err(e) = interp.env.set_scalar(name, value.clone()) {
            interp.diagnostic(&format!("read: {}", e));
            return Ok(ExecOutcome::status(1));
        }
    }
    for name in names.iter().skip(assignments.len()) {
        let _ = interp.env.set_scalar(name, "");
    }

    Ok(ExecOutcome::status(if eof && line.is_empty() { 1 } else { 0 }))
}

/// Read bytes one at a time until delimiter / count / EOF, honoring -t.
fn read_until(opts: &ReadOptions) -> (String, bool, bool) {
    let mut bytes: Vec<u8> = Vec::new();
    let mut eof = false;
    loop {
        if let Some(max) = opts.max_chars {
            if bytes.len() >= max {
                break;
            }
        }
        if let Some(secs) = opts.timeout {
            let fd = unsafe { BorrowedFd::borrow_raw(opts.fd) };
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
            let millis = (secs * 1000.0) as i32;
            let timeout: nix::poll::PollTimeout = millis.max(0).try_into().unwrap_or(nix::poll::PollTimeout::MAX);
            match poll(&mut fds, timeout) {
                Ok(0) => return (String::from_utf8_lossy(&bytes).into_owned(), false, true),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        let mut byte = [0u8; 1];
        match nix::unistd::read(opts.fd, &mut byte) {
            Ok(0) => {
                eof = true;
                break;
            }
            Ok(_) => {
                if byte[0] == opts.delimiter {
                    break;
                }
                bytes.push(byte[0]);
            }
            Err(_) => {
                eof = true;
                break;
            }
        }
    }
    (String::from_utf8_lossy(&bytes).into_owned(), eof, false)
}

/// Resolve `\X` pairs; returns the text and a per-char "protected from
/// IFS splitting" mask.
fn process_backslashes(s: &str) -> (String, Vec<bool>) {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::new();
    let mut mask = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            mask.push(true);
            i += 2;
        } else if chars[i] == '\\' {
            i += 1;
        } else {
            out.push(chars[i]);
            mask.push(false);
            i += 1;
        }
    }
    (out, mask)
}

fn trim_ifs_ws(s: &str, ifs: &str) -> String {
    let ws: Vec<char> = ifs.chars().filter(|c| matches!(c, ' ' | '\t' | '\n')).collect();
    s.trim_matches(|c| ws.contains(&c)).to_string()
}

/// Split into at most `n` fields; the last field keeps the remaining
/// text with trailing IFS whitespace removed.
fn split_for_names(line: &str, protected: &[bool], ifs: &str, n: usize) -> Vec<String> {
    if n == 1 {
        return vec![trim_ifs_ws(line, ifs)];
    }
    let chars: Vec<char> = line.chars().collect();
    let is_ifs = |i: usize| {
        !protected.get(i).copied().unwrap_or(false) && ifs.contains(chars[i])
    };
    let mut fields = Vec::new();
    let mut i = 0usize;
    // Leading IFS whitespace never opens a field.
    while i < chars.len() && is_ifs(i) && chars[i].is_whitespace() {
        i += 1;
    }
    let mut current = String::new();
    while i < chars.len() {
        if fields.len() == n - 1 {
            // Last name: the rest of the line.
            let rest: String = chars[i..].iter().collect();
            current.push_str(&rest);
            break;
        }
        if is_ifs(i) {
            fields.push(std::mem::take(&mut current));
            while i < chars.len() && is_ifs(i) && chars[i].is_whitespace() {
                i += 1;
            }
            if i < chars.len() && is_ifs(i) && !chars[i].is_whitespace() {
                i += 1;
                while i < chars.len() && is_ifs(i) && chars[i].is_whitespace() {
                    i += 1;
                }
            }
            continue;
        }
        current.push(chars[i]);
        i += 1;
    }
    fields.push(trim_ifs_ws(&current, ifs));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_for_names() {
        let line = "a b c d";
        let mask = vec![false; line.len()];
        assert_eq!(split_for_names(line, &mask, " \t\n", 2), vec!["a", "b c d"]);
        assert_eq!(split_for_names(line, &mask, " \t\n", 4), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_backslash_processing() {
        let (text, mask) = process_backslashes("a\\ b");
        assert_eq!(text, "a b");
        assert!(mask[1]);
        let fields = split_for_names(&text, &mask, " \t\n", 2);
        assert_eq!(fields, vec!["a b"]);
    }
}

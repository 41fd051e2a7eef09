//! set, shift, shopt.

use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_set(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.is_empty() {
        // Visible variables, sorted name=value.
        let mut entries: Vec<String> = interp
            .env
            .scopes
            .visible()
            .into_iter()
            .filter_map(|(name, b)| {
                b.value.as_ref().map(|v| format!("{}={}", name, v.to_scalar()))
            })
            .collect();
        entries.sort();
        for line in entries {
            println!("{}", line);
        }
        return Ok(ExecOutcome::success());
    }

    let mut i = 0usize;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--" => {
                i += 1;
                let rest: Vec<String> = args[i..].to_vec();
                interp.env.set_positionals(rest);
                return Ok(ExecOutcome::success());
            }
            "-o" | "+o" => {
                let on = arg.starts_with('-');
                match args.get(i + 1) {
                    Some(name) => {
                        if let Err(e) = interp.env.options.set_by_name(name, on) {
                            interp.diagnostic(&format!("set: {}", e));
                            return Ok(ExecOutcome::status(2));
                        }
                        i += 2;
                    }
                    None => {
                        for (name, enabled) in interp.env.options.listing() {
                            if arg == "-o" {
                                println!("{:<15} {}", name, if enabled { "on" } else { "off" });
                            } else {
                                println!("set {}o {}", if enabled { "-" } else { "+" }, name);
                            }
                        }
                        i += 1;
                    }
                }
            }
            a if a.starts_with('-') || a.starts_with('+') => {
                let on = a.starts_with('-');
                for flag in a[1..].chars() {
                    if let Err(e) = interp.env.options.set_by_flag(flag, on) {
                        interp.diagnostic(&format!("set: {}", e));
                        return Ok(ExecOutcome::status(2));
                    }
                }
                i += 1;
            }
            _ => {
                // Remaining words rebind the positional parameters.
                let rest: Vec<String> = args[i..].to_vec();
                interp.env.set_positionals(rest);
                return Ok(ExecOutcome::success());
            }
        }
    }
    Ok(ExecOutcome::success())
}

pub fn handle_shift(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let n: usize = match args.first() {
        None => 1,
        Some(a) => match a.parse::<i64>() {
            Ok(v) if v >= 0 => v as usize,
            _ => {
                return usage_error(interp, &format!("shift: {}: numeric argument required", a));
            }
        },
    };
    if interp.env.shift(n) {
        Ok(ExecOutcome::success())
    } else {
        Ok(ExecOutcome::status(1))
    }
}

pub fn handle_shopt(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    const SHOPT_NAMES: &[&str] = &["expand_aliases", "nocasematch", "dotglob", "nullglob"];

    let mut mode: Option<bool> = None;
    let mut quiet = false;
    let mut names: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-s" => mode = Some(true),
            "-u" => mode = Some(false),
            "-q" => quiet = true,
            "--" => {}
            a if a.starts_with('-') => {
                return usage_error(interp, &format!("shopt: {}: invalid option", a));
            }
            _ => names.push(arg),
        }
    }

    if names.is_empty() {
        for name in SHOPT_NAMES {
            let on = interp.env.options.query(name).unwrap_or(false);
            let wanted = mode.map_or(true, |m| m == on);
            if wanted && !quiet {
                println!("{:<15} {}", name, if on { "on" } else { "off" });
            }
        }
        return Ok(ExecOutcome::success());
    }

    let mut status = 0;
    for name in names {
        if !SHOPT_NAMES.contains(&name.as_str()) {
            interp.diagnostic(&format!("shopt: {}: invalid shell option name", name));
            status = 1;
            continue;
        }
        match mode {
            Some(on) => {
                let _ = interp.env.options.set_by_name(name, on);
            }
            None => {
                let on = interp.env.options.query(name).unwrap_or(false);
                if !quiet {
                    println!("{:<15} {}", name, if on { "on" } else { "off" });
                }
                if !on {
                    status = 1;
                }
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

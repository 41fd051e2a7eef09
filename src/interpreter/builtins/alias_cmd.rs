//! alias / unalias, including the suffix-alias variants (`-s`).

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_alias(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut suffix = false;
    let mut operands: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-s" => suffix = true,
            "-p" | "--" => {}
            _ => operands.push(arg),
        }
    }

    if operands.is_empty() {
        if suffix {
            for (ext, cmd) in interp.env.aliases.iter_suffixes() {
                println!("alias -s {}='{}'", ext, cmd);
            }
        } else {
            for (name, replacement) in interp.env.aliases.iter() {
                println!("alias {}='{}'", name, replacement.replace('\'', "'\\''"));
            }
        }
        return Ok(ExecOutcome::success());
    }

    let mut status = 0;
    for operand in operands {
        match operand.split_once('=') {
            Some((name, replacement)) => {
                if suffix {
                    interp.env.aliases.define_suffix(name, replacement);
                } else {
                    interp.env.aliases.define(name, replacement);
                }
            }
            None => {
                let found = if suffix {
                    interp
                        .env
                        .aliases
                        .iter_suffixes()
                        .find(|(ext, _)| *ext == operand.as_str())
                        .map(|(ext, cmd)| format!("alias -s {}='{}'", ext, cmd))
                } else {
                    interp
                        .env
                        .aliases
                        .lookup(operand)
                        .map(|r| format!("alias {}='{}'", operand, r))
                };
                match found {
                    Some(line) => println!("{}", line),
                    None => {
                        interp.diagnostic(&format!("alias: {}: not found", operand));
                        status = 1;
                    }
                }
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

pub fn handle_unalias(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut suffix = false;
    let mut all = false;
    let mut names: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-a" => all = true,
            "-s" => suffix = true,
            "--" => {}
            _ => names.push(arg),
        }
    }
    if all {
        if suffix {
            interp.env.aliases.clear_suffixes();
        } else {
            interp.env.aliases.clear();
        }
        return Ok(ExecOutcome::success());
    }
    let mut status = 0;
    for name in names {
        let removed = if suffix {
            interp.env.aliases.remove_suffix(name)
        } else {
            interp.env.aliases.remove(name)
        };
        if !removed {
            interp.diagnostic(&format!("unalias: {}: not found", name));
            status = 1;
        }
    }
    Ok(ExecOutcome::status(status))
}

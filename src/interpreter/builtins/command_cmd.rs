//! command, type, hash.

use crate::interpreter::builtins::usage_error;
use crate::interpreter::command_resolution::Resolution;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_command(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut describe = false;
    let mut verbose = false;
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "-v" => describe = true,
            "-V" => {
                describe = true;
                verbose = true;
            }
            "-p" | "--" => {}
            a if a.starts_with('-') => {
                return usage_error(interp, &format!("command: {}: invalid option", a));
            }
            _ => break,
        }
        i += 1;
    }
    let rest = &args[i..];
    let name = match rest.first() {
        Some(n) => n.clone(),
        None => return Ok(ExecOutcome::success()),
    };

    if describe {
        return match interp.describe_command(&name, verbose) {
            Some(text) => {
                println!("{}", text);
                Ok(ExecOutcome::success())
            }
            None => Ok(ExecOutcome::status(1)),
        };
    }

    // Bypass functions; builtins and PATH remain visible.
    match interp.resolve_command(&name, true) {
        Ok(Resolution::Builtin(b)) => (b.run)(interp, &rest[1..]),
        Ok(Resolution::External(path)) => {
            Ok(interp.run_external(&path, rest, &[], &[]))
        }
        Ok(Resolution::SuffixAlias(prefix)) => {
            let mut argv = vec![prefix];
            argv.extend(rest.iter().cloned());
            match interp.resolve_external(&argv[0]) {
                Ok(path) => Ok(interp.run_external(&path, &argv, &[], &[])),
                Err(e) => Ok(interp.report(e)),
            }
        }
        Ok(Resolution::Function(_)) => unreachable!("functions skipped"),
        Err(e) => Ok(interp.report(e)),
    }
}

pub fn handle_type(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut status = 0;
    for name in args.iter().filter(|a| !a.starts_with('-')) {
        match interp.describe_command(name, true) {
            Some(text) => println!("{}", text),
            None => {
                interp.diagnostic(&format!("type: {}: not found", name));
                status = 1;
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

pub fn handle_hash(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.iter().any(|a| a == "-r") {
        interp.hash_table.clear();
        return Ok(ExecOutcome::success());
    }
    if args.is_empty() {
        if interp.hash_table.is_empty() {
            println!("hash: hash table empty");
            return Ok(ExecOutcome::success());
        }
        let mut entries: Vec<(&String, &String)> = interp.hash_table.iter().collect();
        entries.sort();
        for (name, path) in entries {
            println!("{}\t{}", name, path);
        }
        return Ok(ExecOutcome::success());
    }
    let mut status = 0;
    for name in args.iter().filter(|a| !a.starts_with('-')) {
        if let Err(e) = interp.resolve_external(name) {
            interp.diagnostic(&format!("hash: {}", e));
            status = 1;
        }
    }
    Ok(ExecOutcome::status(status))
}

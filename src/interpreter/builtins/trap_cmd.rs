//! trap - install, list and reset signal handlers.

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::signals::signal_listing;
use crate::interpreter::traps::TrapKey;

pub fn handle_trap(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut rest: Vec<&String> = Vec::new();
    let mut print = args.is_empty();
    for arg in args {
        match arg.as_str() {
            "-p" => print = true,
            "-l" => {
                let listing = signal_listing();
                for chunk in listing.chunks(5) {
                    let line: Vec<String> =
                        chunk.iter().map(|(n, name)| format!("{:>2}) SIG{}", n, name)).collect();
                    println!("{}", line.join("\t"));
                }
                return Ok(ExecOutcome::success());
            }
            "--" => {}
            _ => rest.push(arg),
        }
    }

    if print || rest.is_empty() {
        for (name, action) in interp.traps.listing() {
            println!("trap -- '{}' {}", action.replace('\'', "'\\''"), name);
        }
        return Ok(ExecOutcome::success());
    }

    // `trap ACTION SIGS...`; a bare `-` action resets.
    let (action, specs) = rest.split_first().map(|(a, s)| (a.as_str(), s)).unwrap_or(("", &[]));

    // POSIX allows `trap N...` with a leading signal number: reset form.
    let (action, specs): (Option<String>, &[&String]) =
        if action == "-" {
            (None, specs)
        } else if specs.is_empty() && TrapKey::parse(action).is_some() {
            (None, &rest[..])
        } else {
            (Some(action.to_string()), specs)
        };

    let mut status = 0;
    for spec in specs {
        match TrapKey::parse(spec) {
            Some(key) => interp.traps.set(key, action.clone()),
            None => {
                interp.diagnostic(&format!("trap: {}: invalid signal specification", spec));
                status = 1;
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

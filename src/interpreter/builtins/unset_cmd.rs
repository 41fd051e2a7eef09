//! unset - remove variables or functions.

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_unset(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut functions = false;
    let mut variables = false;
    let mut names: Vec<&String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-f" => functions = true,
            "-v" => variables = true,
            "--" => {}
            _ => names.push(arg),
        }
    }

    let mut status = 0;
    for name in names {
        if functions {
            interp.env.functions.remove(name);
            continue;
        }
        // Without -f or -v, a variable is tried first, then a function.
        match interp.env.unset(name) {
            Ok(removed) => {
                if !removed && !variables {
                    interp.env.functions.remove(name);
                }
            }
            Err(e) => {
                interp.diagnostic(&format!("unset: {}", e));
                status = 1;
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

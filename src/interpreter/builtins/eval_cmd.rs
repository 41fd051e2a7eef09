//! eval and source / `.` - re-enter the parser in the current scope.

use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::{ControlFlow, ExecOutcome};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_eval(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.is_empty() {
        return Ok(ExecOutcome::success());
    }
    let source = args.join(" ");
    match interp.run_string(&source) {
        Ok(out) => Ok(out),
        Err(e) => Ok(interp.report(e)),
    }
}

pub fn handle_source(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let path_arg = match args.first() {
        Some(p) => p.clone(),
        None => return usage_error(interp, "source: filename argument required"),
    };

    // Bare names search PATH, then the current directory.
    let path = if path_arg.contains('/') {
        path_arg.clone()
    } else {
        let path_var = interp.env.get_scalar("PATH").unwrap_or_default();
        path_var
            .split(':')
            .map(|dir| {
                let dir = if dir.is_empty() { "." } else { dir };
                format!("{}/{}", dir, path_arg)
            })
            .find(|candidate| std::path::Path::new(candidate).is_file())
            .unwrap_or(path_arg.clone())
    };

    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            interp.diagnostic(&format!("source: {}: {}", path_arg, e));
            return Ok(ExecOutcome::status(1));
        }
    };

    // Extra arguments temporarily replace the positional parameters.
    let saved_positionals = if args.len() > 1 {
        let saved = interp.env.positional_params().to_vec();
        interp.env.set_positionals(args[1..].to_vec());
        Some(saved)
    } else {
        None
    };

    interp.source_depth += 1;
    let result = interp.run_string(&text);
    interp.source_depth -= 1;

    if let Some(saved) = saved_positionals {
        interp.env.set_positionals(saved);
    }

    let mut out = match result {
        Ok(out) => out,
        Err(e) => interp.report(e),
    };
    // `return` inside a sourced script unwinds exactly to here.
    if out.flow == ControlFlow::Return {
        out.flow = ControlFlow::None;
    }
    Ok(out)
}

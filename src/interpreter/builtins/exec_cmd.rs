//! exec - replace the shell, or make the command's redirections
//! permanent when called without arguments.

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::process::exec_external;

pub fn handle_exec(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let args: Vec<&String> = args.iter().filter(|a| a.as_str() != "--").collect();
    if args.is_empty() {
        // The redirections already applied for this command stay.
        interp.exec_redirs_persist = true;
        return Ok(ExecOutcome::success());
    }

    let argv: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let path = match interp.resolve_external(&argv[0]) {
        Ok(p) => p,
        Err(e) => {
            let out = interp.report(e);
            // A failed exec terminates a non-interactive shell.
            if !interp.interactive {
                return Ok(ExecOutcome::exit(out.status));
            }
            return Ok(out);
        }
    };

    let env_map = interp.env.export_map();
    let err = exec_external(&path, &argv, &env_map);
    let out = interp.report(err);
    if !interp.interactive {
        return Ok(ExecOutcome::exit(out.status));
    }
    Ok(out)
}

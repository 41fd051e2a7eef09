//! let - arithmetic evaluation; status 0 iff the last expression is
//! non-zero.

use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::parser::arithmetic_parser::parse_arith;

pub fn handle_let(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.is_empty() {
        return usage_error(interp, "let: expression expected");
    }
    let mut last = 0i64;
    for expr in args {
        let node = match parse_arith(expr, 0) {
            Ok(n) => n,
            Err(e) => {
                interp.diagnostic(&format!("let: {}", e.message));
                return Ok(ExecOutcome::status(1));
            }
        };
        last = match interp.eval_arith(&node) {
            Ok(v) => v,
            Err(e) => {
                interp.diagnostic(&format!("let: {}", e));
                return Ok(ExecOutcome::status(1));
            }
        };
    }
    Ok(ExecOutcome::status(if last != 0 { 0 } else { 1 }))
}

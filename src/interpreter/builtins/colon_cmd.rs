//! `:`, `true`, `false`.

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_colon(_interp: &mut Interpreter, _args: &[String]) -> Result<ExecOutcome, ExecError> {
    Ok(ExecOutcome::success())
}

pub fn handle_true(_interp: &mut Interpreter, _args: &[String]) -> Result<ExecOutcome, ExecError> {
    Ok(ExecOutcome::success())
}

pub fn handle_false(_interp: &mut Interpreter, _args: &[String]) -> Result<ExecOutcome, ExecError> {
    Ok(ExecOutcome::status(1))
}

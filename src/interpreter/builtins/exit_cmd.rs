//! exit, return, break, continue.

use crate::interpreter::control_flow::{ControlFlow, ExecOutcome};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_exit(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let status = match args.first() {
        None => interp.env.last_status,
        Some(a) => match a.parse::<i64>() {
            Ok(n) => (n & 0xff) as i32,
            Err(_) => {
                interp.diagnostic(&format!("exit: {}: numeric argument required", a));
                2
            }
        },
    };
    Ok(ExecOutcome::exit(status))
}

pub fn handle_return(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if interp.func_depth == 0 && interp.source_depth == 0 {
        interp.diagnostic("return: can only `return' from a function or sourced script");
        return Ok(ExecOutcome::status(1));
    }
    let status = match args.first() {
        None => interp.env.last_status,
        Some(a) => match a.parse::<i64>() {
            Ok(n) => (n & 0xff) as i32,
            Err(_) => {
                interp.diagnostic(&format!("return: {}: numeric argument required", a));
                return Ok(ExecOutcome::status(2));
            }
        },
    };
    Ok(ExecOutcome { status, flow: ControlFlow::Return })
}

pub fn handle_break(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    loop_control(interp, args, "break")
}

pub fn handle_continue(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    loop_control(interp, args, "continue")
}

fn loop_control(
    interp: &mut Interpreter,
    args: &[String],
    which: &str,
) -> Result<ExecOutcome, ExecError> {
    let n: i64 = match args.first() {
        None => 1,
        Some(a) => match a.parse() {
            Ok(v) => v,
            Err(_) => {
                interp.diagnostic(&format!("{}: {}: numeric argument required", which, a));
                return Ok(ExecOutcome::status(2));
            }
        },
    };
    if n < 1 {
        interp.diagnostic(&format!("{}: {}: loop count out of range", which, n));
        return Ok(ExecOutcome::status(1));
    }
    if interp.loop_depth == 0 {
        interp.diagnostic(&format!(
            "{}: only meaningful in a `for', `while', or `until' loop",
            which
        ));
        return Ok(ExecOutcome::success());
    }
    let levels = (n as u32).min(interp.loop_depth);
    let flow = if which == "break" {
        ControlFlow::Break(levels)
    } else {
        ControlFlow::Continue(levels)
    };
    Ok(ExecOutcome { status: 0, flow })
}

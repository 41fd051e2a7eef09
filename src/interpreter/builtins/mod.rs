//! Builtin commands.
//!
//! Each builtin is a plain function over the interpreter and its
//! (already expanded) arguments; stdout/stderr are the process's real,
//! post-redirection descriptors. Usage errors are status 2. Special
//! builtins follow POSIX: assignment prefixes on them persist.

pub mod alias_cmd;
pub mod cd_cmd;
pub mod colon_cmd;
pub mod command_cmd;
pub mod declare_cmd;
pub mod echo_cmd;
pub mod eval_cmd;
pub mod exec_cmd;
pub mod exit_cmd;
pub mod getopts_cmd;
pub mod jobs_cmd;
pub mod let_cmd;
pub mod printf_cmd;
pub mod read_cmd;
pub mod set_cmd;
pub mod test_cmd;
pub mod trap_cmd;
pub mod umask_cmd;
pub mod unset_cmd;

use std::collections::HashMap;

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub type BuiltinFn = fn(&mut Interpreter, &[String]) -> Result<ExecOutcome, ExecError>;

pub struct Builtin {
    pub name: &'static str,
    pub special: bool,
    pub run: BuiltinFn,
}

macro_rules! builtin {
    ($name:literal, $special:literal, $f:path) => {
        Builtin { name: $name, special: $special, run: $f }
    };
}

static BUILTINS: &[Builtin] = &[
    builtin!(":", true, colon_cmd::handle_colon),
    builtin!("true", false, colon_cmd::handle_true),
    builtin!("false", false, colon_cmd::handle_false),
    builtin!("echo", false, echo_cmd::handle_echo),
    builtin!("printf", false, printf_cmd::handle_printf),
    builtin!("read", false, read_cmd::handle_read),
    builtin!("cd", false, cd_cmd::handle_cd),
    builtin!("pwd", false, cd_cmd::handle_pwd),
    builtin!("export", true, declare_cmd::handle_export),
    builtin!("readonly", true, declare_cmd::handle_readonly),
    builtin!("declare", false, declare_cmd::handle_declare),
    builtin!("typeset", false, declare_cmd::handle_declare),
    builtin!("local", false, declare_cmd::handle_local),
    builtin!("unset", true, unset_cmd::handle_unset),
    builtin!("alias", false, alias_cmd::handle_alias),
    builtin!("unalias", false, alias_cmd::handle_unalias),
    builtin!("set", true, set_cmd::handle_set),
    builtin!("shopt", false, set_cmd::handle_shopt),
    builtin!("shift", true, set_cmd::handle_shift),
    builtin!("test", false, test_cmd::handle_test),
    builtin!("[", false, test_cmd::handle_bracket),
    builtin!("eval", true, eval_cmd::handle_eval),
    builtin!("source", false, eval_cmd::handle_source),
    builtin!(".", true, eval_cmd::handle_source),
    builtin!("command", false, command_cmd::handle_command),
    builtin!("type", false, command_cmd::handle_type),
    builtin!("hash", false, command_cmd::handle_hash),
    builtin!("exit", true, exit_cmd::handle_exit),
    builtin!("return", true, exit_cmd::handle_return),
    builtin!("break", true, exit_cmd::handle_break),
    builtin!("continue", true, exit_cmd::handle_continue),
    builtin!("trap", true, trap_cmd::handle_trap),
    builtin!("wait", false, jobs_cmd::handle_wait),
    builtin!("jobs", false, jobs_cmd::handle_jobs),
    builtin!("fg", false, jobs_cmd::handle_fg),
    builtin!("bg", false, jobs_cmd::handle_bg),
    builtin!("disown", false, jobs_cmd::handle_disown),
    builtin!("kill", false, jobs_cmd::handle_kill),
    builtin!("suspend", false, jobs_cmd::handle_suspend),
    builtin!("exec", true, exec_cmd::handle_exec),
    builtin!("let", false, let_cmd::handle_let),
    builtin!("getopts", false, getopts_cmd::handle_getopts),
    builtin!("umask", false, umask_cmd::handle_umask),
];

lazy_static::lazy_static! {
    static ref REGISTRY: HashMap<&'static str, &'static Builtin> =
        BUILTINS.iter().map(|b| (b.name, b)).collect();
}

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    REGISTRY.get(name).copied()
}

pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = BUILTINS.iter().map(|b| b.name).collect();
    names.sort();
    names
}

/// `name: usage` diagnostic with status 2.
pub fn usage_error(interp: &mut Interpreter, message: &str) -> Result<ExecOutcome, ExecError> {
    interp.diagnostic(message);
    Ok(ExecOutcome::status(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(lookup("cd").is_some());
        assert!(lookup(":").unwrap().special);
        assert!(!lookup("echo").unwrap().special);
        assert!(lookup("nosuch").is_none());
    }
}

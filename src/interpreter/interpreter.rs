//! Interpreter state.
//!
//! One `Interpreter` owns the environment, job table and trap state, and
//! is threaded mutably through execution and expansion. Subshells are
//! forked processes, so the child's copy is free.

use std::collections::HashMap;
use std::io::IsTerminal;
use std::os::fd::OwnedFd;

use crate::ast::types::ScriptNode;
use crate::environment::Environment;
use crate::interpreter::control_flow::{ControlFlow, ExecOutcome};
use crate::interpreter::errors::ExecError;
use crate::interpreter::job_control::JobTable;
use crate::interpreter::traps::TrapState;

/// A live process substitution: keep the fd open and the child tracked
/// for the duration of the enclosing simple command.
pub struct ProcSub {
    pub fd: OwnedFd,
    pub pid: i32,
}

pub struct Interpreter {
    pub env: Environment,
    pub jobs: JobTable,
    pub traps: TrapState,

    /// Loop nesting for break/continue.
    pub loop_depth: u32,
    /// Checked context: condition of if/while/until, `&&`/`||` operand,
    /// `!`-negated - errexit does not fire here.
    pub in_condition: bool,
    /// Nesting of `source`d scripts (return unwinds one level).
    pub source_depth: u32,
    /// Depth of function calls (for RETURN traps and `local`).
    pub func_depth: u32,

    /// `hash` builtin: remembered PATH lookups.
    pub hash_table: HashMap<String, String>,

    /// Process substitutions of the command being assembled.
    pub procsubs: Vec<ProcSub>,

    /// Status of the last command substitution in the current simple
    /// command (the status of an assignment-only command).
    pub last_subst_status: Option<i32>,

    /// This process is a forked subshell; `exit` semantics differ.
    pub in_subshell: bool,
    /// Reading commands from a terminal.
    pub interactive: bool,
    /// EXIT trap currently running (prevents recursion).
    pub exiting: bool,
    /// Set by `exec` without argv: keep the command's redirections.
    pub exec_redirs_persist: bool,
    /// getopts cluster position: (OPTIND snapshot, char offset).
    pub getopts_state: (i64, usize),

    pub shell_pgid: i32,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
            jobs: JobTable::default(),
            traps: TrapState::default(),
            loop_depth: 0,
            in_condition: false,
            source_depth: 0,
            func_depth: 0,
            hash_table: HashMap::new(),
            procsubs: Vec::new(),
            last_subst_status: None,
            in_subshell: false,
            interactive: false,
            exiting: false,
            exec_redirs_persist: false,
            getopts_state: (1, 0),
            shell_pgid: nix::unistd::getpgrp().as_raw(),
        }
    }

    /// Job control is on when `monitor` is set and stdin is a terminal.
    pub fn job_control_active(&self) -> bool {
        self.env.options.monitor && std::io::stdin().is_terminal()
    }

    /// Write a diagnostic the way the shell reports everything.
    pub fn diagnostic(&self, message: &str) {
        eprintln!("marsh: {}", message);
    }

    /// Convert an error into its reported outcome at a command boundary.
    pub fn report(&mut self, err: ExecError) -> ExecOutcome {
        let status = err.status();
        self.diagnostic(&err.to_string());
        if err.is_fatal(self.interactive) {
            return ExecOutcome { status, flow: ControlFlow::Exit };
        }
        ExecOutcome::status(status)
    }

    /// Parse and run a trap action or `eval` body in the current scope.
    pub fn run_string(&mut self, source: &str) -> Result<ExecOutcome, ExecError> {
        let aliases = if self.env.options.expand_aliases {
            Some(self.env.aliases.clone())
        } else {
            None
        };
        let script: ScriptNode = crate::parser::parse_script(source, aliases.as_ref())?;
        self.run_script(&script)
    }

    /// Drop fds and reap children of finished process substitutions.
    pub fn close_procsubs(&mut self) {
        for ps in self.procsubs.drain(..) {
            drop(ps.fd);
            let _ = nix::sys::wait::waitpid(nix::unistd::Pid::from_raw(ps.pid), None);
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

//! `( list )` and `{ list; }`.

use crate::ast::types::{GroupNode, SubshellNode};
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::process::{fork_process, ForkOutcome};
use crate::interpreter::signals;

impl Interpreter {
    /// Subshell: forked child, all state changes discarded on return.
    pub(crate) fn run_subshell(&mut self, node: &SubshellNode) -> Result<ExecOutcome, ExecError> {
        match fork_process()? {
            ForkOutcome::Child => {
                signals::restore_child_handlers();
                self.become_subshell();
                if let Err(e) = self.apply_redirections_permanent(&node.redirections) {
                    let r = self.report(e);
                    std::process::exit(r.status);
                }
                let status = self.run_list_to_status(&node.body);
                std::process::exit(status);
            }
            ForkOutcome::Parent(pid) => {
                let statuses = self.wait_foreground(&[pid], pid, "( ... )");
                Ok(ExecOutcome::status(statuses[0]))
            }
        }
    }

    /// Group: current shell, redirections scoped to the body.
    pub(crate) fn run_group(&mut self, node: &GroupNode) -> Result<ExecOutcome, ExecError> {
        let guard = match self.apply_redirections(&node.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        let out = self.run_list(&node.body);
        guard.restore();
        out
    }
}

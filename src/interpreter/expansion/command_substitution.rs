//! Command and process substitution.
//!
//! `$(cmd)` forks a child that runs the parsed body with stdout on a
//! pipe; the parent captures the bytes, strips trailing newlines and
//! discards NULs. `<(cmd)` / `>(cmd)` wire a child to one end of a pipe
//! and substitute `/dev/fd/N` for the other end, which stays open until
//! the enclosing simple command finishes.

use std::io::Read;
use std::os::fd::AsRawFd;

use nix::unistd;

use crate::ast::types::{ProcessDirection, ScriptNode};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::{Interpreter, ProcSub};
use crate::interpreter::process::{fork_process, wait_for_pid, ForkOutcome};
use crate::interpreter::signals;

impl Interpreter {
    /// Run `body` in a forked subshell and capture its stdout.
    pub fn command_substitute(&mut self, body: &ScriptNode) -> Result<String, ExecError> {
        let (read_end, write_end) = unistd::pipe()?;
        match fork_process()? {
            ForkOutcome::Child => {
                drop(read_end);
                let _ = unistd::dup2(write_end.as_raw_fd(), 1);
                drop(write_end);
                signals::restore_child_handlers();
                self.become_subshell();
                let status = self.run_script_to_status(body);
                std::process::exit(status);
            }
            ForkOutcome::Parent(child) => {
                drop(write_end);
                let mut output = Vec::new();
                let mut file = std::fs::File::from(read_end);
                let _ = file.read_to_end(&mut output);
                drop(file);
                let status = wait_for_pid(child);
                self.env.last_status = status;
                self.last_subst_status = Some(status);

                // Embedded NULs are discarded, trailing newlines stripped.
                output.retain(|b| *b != 0);
                let mut text = String::from_utf8_lossy(&output).into_owned();
                while text.ends_with('\n') {
                    text.pop();
                }
                Ok(text)
            }
        }
    }

    /// Set up `<(cmd)` / `>(cmd)`: returns the `/dev/fd/N` path to splice
    /// into the argv. The kept fd and child pid live in `procsubs` until
    /// the command completes.
    pub fn setup_process_substitution(
        &mut self,
        body: &ScriptNode,
        direction: ProcessDirection,
    ) -> Result<String, ExecError> {
        let (read_end, write_end) = unistd::pipe()?;
        match fork_process()? {
            ForkOutcome::Child => {
                match direction {
                    ProcessDirection::Read => {
                        // Child writes; the command reads /dev/fd/N.
                        drop(read_end);
                        let _ = unistd::dup2(write_end.as_raw_fd(), 1);
                        drop(write_end);
                    }
                    ProcessDirection::Write => {
                        drop(write_end);
                        let _ = unistd::dup2(read_end.as_raw_fd(), 0);
                        drop(read_end);
                    }
                }
                signals::restore_child_handlers();
                self.become_subshell();
                let status = self.run_script_to_status(body);
                std::process::exit(status);
            }
            ForkOutcome::Parent(child) => {
                let keep = match direction {
                    ProcessDirection::Read => {
                        drop(write_end);
                        read_end
                    }
                    ProcessDirection::Write => {
                        drop(read_end);
                        write_end
                    }
                };
                // The fd must survive into exec'd children: clear CLOEXEC
                // is the default for pipe(2), nothing more to do.
                let raw = keep.as_raw_fd();
                let path = format!("/dev/fd/{}", raw);
                self.procsubs.push(ProcSub { fd: keep, pid: child });
                Ok(path)
            }
        }
    }
}

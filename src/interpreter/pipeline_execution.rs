//! Pipeline execution.
//!
//! All stages are started before any is waited on; the shell waits in
//! stage order. Every stage except possibly the last runs in a forked
//! child. The last stage runs in the parent when it is a compound
//! command or a builtin, so `... | while read x` mutates parent state;
//! external last stages fork like the rest.

use std::os::fd::{AsRawFd, OwnedFd};

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};

use crate::ast::types::{CommandNode, PipelineNode};
use crate::interpreter::builtins;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::execution_engine::describe_pipeline;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::job_control::{give_terminal_to, JobState};
use crate::interpreter::process::{decode_wait_status, fork_process, ForkOutcome};
use crate::interpreter::signals;

impl Interpreter {
    pub(crate) fn run_pipeline_node(&mut self, p: &PipelineNode) -> Result<ExecOutcome, ExecError> {
        if p.stages.len() == 1 {
            let out = self.run_command(&p.stages[0])?;
            self.env.pipestatus = vec![out.status];
            return Ok(out);
        }
        self.run_multi_stage(p)
    }

    fn run_multi_stage(&mut self, p: &PipelineNode) -> Result<ExecOutcome, ExecError> {
        let n = p.stages.len();
        let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::with_capacity(n - 1);
        for _ in 0..n - 1 {
            pipes.push(unistd::pipe()?);
        }

        let job_control = self.job_control_active();
        let last_in_parent = stage_runs_in_parent(&p.stages[n - 1]);
        let mut pgid: i32 = 0;
        let mut pids: Vec<i32> = Vec::new();

        let forked_stages = if last_in_parent { n - 1 } else { n };
        for i in 0..forked_stages {
            match fork_process()? {
                ForkOutcome::Child => {
                    if job_control {
                        let own = unistd::getpid();
                        let target = if pgid == 0 { own } else { Pid::from_raw(pgid) };
                        let _ = unistd::setpgid(own, target);
                    }
                    // Wire this stage's ends, then close every pipe fd.
                    if i > 0 {
                        let _ = unistd::dup2(pipes[i - 1].0.as_raw_fd(), 0);
                    }
                    if i < n - 1 {
                        let _ = unistd::dup2(pipes[i].1.as_raw_fd(), 1);
                        if p.stderr_pipes.get(i).copied().unwrap_or(false) {
                            let _ = unistd::dup2(1, 2);
                        }
                    }
                    drop(pipes);
                    signals::restore_child_handlers();
                    self.become_subshell();
                    let status = match self.run_command(&p.stages[i]) {
                        Ok(o) => o.status,
                        Err(e) => self.report(e).status,
                    };
                    std::process::exit(status);
                }
                ForkOutcome::Parent(pid) => {
                    if pgid == 0 {
                        pgid = pid;
                    }
                    if job_control {
                        let _ = unistd::setpgid(Pid::from_raw(pid), Pid::from_raw(pgid));
                    }
                    pids.push(pid);
                }
            }
        }

        if job_control {
            give_terminal_to(pgid);
        }

        let text = describe_pipeline(p);
        let mut statuses;
        let mut parent_out = None;

        if last_in_parent {
            // Keep only the final read end; everything else must close so
            // the parent stage sees EOF.
            let (last_read, last_write) = pipes
                .pop()
                .ok_or_else(|| ExecError::Expansion("pipeline without pipes".into()))?;
            drop(last_write);
            drop(pipes);

            let saved_stdin = nix::fcntl::fcntl(0, nix::fcntl::FcntlArg::F_DUPFD_CLOEXEC(10)).ok();
            let _ = unistd::dup2(last_read.as_raw_fd(), 0);
            drop(last_read);

            let out = self.run_command(&p.stages[n - 1]);

            if let Some(saved) = saved_stdin {
                let _ = unistd::dup2(saved, 0);
                let _ = unistd::close(saved);
            }

            statuses = self.wait_foreground(&pids, pgid, &text);
            match out {
                Ok(o) => {
                    statuses.push(o.status);
                    parent_out = Some(o);
                }
                Err(e) => {
                    let r = self.report(e);
                    statuses.push(r.status);
                    parent_out = Some(r);
                }
            }
        } else {
            drop(pipes);
            statuses = self.wait_foreground(&pids, pgid, &text);
        }

        if job_control {
            give_terminal_to(self.shell_pgid);
        }

        self.env.pipestatus = statuses.clone();
        let status = if self.env.options.pipefail {
            statuses.iter().rev().find(|s| **s != 0).copied().unwrap_or(0)
        } else {
            *statuses.last().unwrap_or(&0)
        };

        // Control flow from a parent-run last stage survives the pipeline.
        match parent_out {
            Some(mut o) => {
                o.status = status;
                Ok(o)
            }
            None => Ok(ExecOutcome::status(status)),
        }
    }

    /// Wait for foreground pids in stage order. A stop turns the whole
    /// pipeline into a stopped job.
    pub(crate) fn wait_foreground(&mut self, pids: &[i32], pgid: i32, text: &str) -> Vec<i32> {
        let mut statuses: Vec<Option<i32>> = vec![None; pids.len()];
        let mut stopped = false;
        for (i, pid) in pids.iter().enumerate() {
            if stopped {
                break;
            }
            loop {
                match waitpid(Pid::from_raw(*pid), Some(WaitPidFlag::WUNTRACED)) {
                    Ok(WaitStatus::Stopped(..)) => {
                        stopped = true;
                        break;
                    }
                    Ok(ws @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                        statuses[i] = Some(decode_wait_status(ws));
                        break;
                    }
                    Ok(_) => continue,
                    Err(_) => {
                        statuses[i] = Some(127);
                        break;
                    }
                }
            }
        }
        if stopped {
            let stop_status = 128 + nix::sys::signal::Signal::SIGTSTP as i32;
            let id = self.jobs.add(pgid, pids.to_vec(), text.to_string());
            if let Some(job) = self.jobs.get_mut(id) {
                job.state = JobState::Stopped;
                job.notify = true;
                for (i, s) in statuses.iter().enumerate() {
                    if let Some(code) = s {
                        job.statuses[i] = Some(*code);
                    }
                }
            }
            return statuses.into_iter().map(|s| s.unwrap_or(stop_status)).collect();
        }
        statuses.into_iter().map(|s| s.unwrap_or(0)).collect()
    }
}

/// The documented lastpipe choice: compounds and builtins run in the
/// parent shell; externals and functions fork.
fn stage_runs_in_parent(stage: &CommandNode) -> bool {
    match stage {
        CommandNode::Compound(_) => true,
        CommandNode::Simple(c) => match c.words.first() {
            Some(w) if w.is_static() => {
                let name: String = w
                    .parts
                    .iter()
                    .map(|p| match p {
                        crate::ast::types::WordPart::Literal(s)
                        | crate::ast::types::WordPart::SingleQuoted(s)
                        | crate::ast::types::WordPart::AnsiC(s)
                        | crate::ast::types::WordPart::Escaped(s) => s.clone(),
                        _ => String::new(),
                    })
                    .collect();
                builtins::lookup(&name).is_some()
            }
            _ => false,
        },
        CommandNode::FunctionDef(_) => true,
    }
}

//! Job table and terminal handoff.
//!
//! Jobs are insertion-ordered; ids are the smallest unused positive
//! integers and are reused once a job has been reaped *and* reported.
//! Asynchronous state changes are collected by a WNOHANG reap loop at
//! safe points and reported at prompt time.

use std::io::IsTerminal;

use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub pgid: i32,
    pub pids: Vec<i32>,
    /// Exit status per pid once reaped.
    pub statuses: Vec<Option<i32>>,
    pub state: JobState,
    pub command: String,
    /// State change not yet shown to the user.
    pub notify: bool,
}

impl Job {
    pub fn status(&self) -> i32 {
        self.statuses.last().and_then(|s| *s).unwrap_or(0)
    }

    pub fn state_label(&self) -> &'static str {
        match self.state {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
        }
    }
}

#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn add(&mut self, pgid: i32, pids: Vec<i32>, command: String) -> usize {
        let id = self.next_id();
        let statuses = vec![None; pids.len()];
        self.jobs.push(Job {
            id,
            pgid,
            pids,
            statuses,
            state: JobState::Running,
            command,
            notify: false,
        });
        id
    }

    fn next_id(&self) -> usize {
        let mut id = 1;
        while self.jobs.iter().any(|j| j.id == id) {
            id += 1;
        }
        id
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn remove(&mut self, id: usize) {
        self.jobs.retain(|j| j.id != id);
    }

    /// Most recent job (`%%`, `%+`) and its predecessor (`%-`).
    pub fn current(&self) -> Option<&Job> {
        self.jobs.last()
    }

    pub fn previous(&self) -> Option<&Job> {
        if self.jobs.len() >= 2 {
            self.jobs.get(self.jobs.len() - 2)
        } else {
            None
        }
    }

    /// Resolve a `%` jobspec: `%n`, `%%`, `%+`, `%-`, `%string`.
    pub fn resolve_spec(&self, spec: &str) -> Option<usize> {
        let body = spec.strip_prefix('%')?;
        match body {
            "" | "%" | "+" => self.current().map(|j| j.id),
            "-" => self.previous().map(|j| j.id),
            _ => {
                if let Ok(n) = body.parse::<usize>() {
                    self.get(n).map(|j| j.id)
                } else {
                    self.jobs.iter().find(|j| j.command.starts_with(body)).map(|j| j.id)
                }
            }
        }
    }

    /// Non-blocking reap: fold every waitable child status into the table.
    pub fn reap(&mut self) {
        loop {
            match waitpid(
                Pid::from_raw(-1),
                Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED),
            ) {
                Ok(WaitStatus::Exited(pid, code)) => self.record(pid.as_raw(), Some(code), JobState::Done),
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    self.record(pid.as_raw(), Some(128 + sig as i32), JobState::Done)
                }
                Ok(WaitStatus::Stopped(pid, _)) => self.record(pid.as_raw(), None, JobState::Stopped),
                Ok(WaitStatus::Continued(pid)) => self.record(pid.as_raw(), None, JobState::Running),
                Ok(WaitStatus::StillAlive) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    }

    fn record(&mut self, pid: i32, status: Option<i32>, state: JobState) {
        for job in &mut self.jobs {
            if let Some(idx) = job.pids.iter().position(|p| *p == pid) {
                if let Some(code) = status {
                    job.statuses[idx] = Some(code);
                }
                match state {
                    JobState::Done => {
                        if job.statuses.iter().all(|s| s.is_some()) {
                            job.state = JobState::Done;
                            job.notify = true;
                        }
                    }
                    JobState::Stopped => {
                        job.state = JobState::Stopped;
                        job.notify = true;
                    }
                    JobState::Running => job.state = JobState::Running,
                }
                return;
            }
        }
    }

    /// Blocking wait for one job to finish or stop; returns its status.
    pub fn wait_job(&mut self, id: usize) -> i32 {
        loop {
            let job = match self.get(id) {
                Some(j) => j.clone(),
                None => return 127,
            };
            if job.state == JobState::Done {
                let status = job.status();
                self.remove(id);
                return status;
            }
            if job.state == JobState::Stopped {
                return 128 + Signal::SIGTSTP as i32;
            }
            // Wait on the first unreaped pid; the job may have no process
            // group of its own when job control is off.
            let next = job
                .pids
                .iter()
                .zip(job.statuses.iter())
                .find(|(_, s)| s.is_none())
                .map(|(p, _)| *p);
            let pid = match next {
                Some(p) => p,
                None => continue,
            };
            match waitpid(Pid::from_raw(pid), Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(pid, code)) => self.record(pid.as_raw(), Some(code), JobState::Done),
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    self.record(pid.as_raw(), Some(128 + sig as i32), JobState::Done)
                }
                Ok(WaitStatus::Stopped(pid, _)) => self.record(pid.as_raw(), None, JobState::Stopped),
                Ok(_) => {}
                Err(_) => {
                    self.remove(id);
                    return 127;
                }
            }
        }
    }

    /// Pending notifications: `[id]+ State  command`, cleared on return.
    pub fn take_notifications(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let current = self.jobs.last().map(|j| j.id);
        for job in &mut self.jobs {
            if job.notify {
                job.notify = false;
                let marker = if Some(job.id) == current { '+' } else { '-' };
                lines.push(format!(
                    "[{}]{}  {}                    {}",
                    job.id,
                    marker,
                    job.state_label(),
                    job.command
                ));
            }
        }
        self.jobs.retain(|j| j.state != JobState::Done);
        lines
    }

    pub fn signal_job(&self, id: usize, sig: Signal) -> nix::Result<()> {
        match self.get(id) {
            Some(job) => killpg(Pid::from_raw(job.pgid), sig),
            None => Err(nix::errno::Errno::ESRCH),
        }
    }
}

/// Hand the terminal to `pgid` (foreground), ignoring failures when there
/// is no controlling terminal.
pub fn give_terminal_to(pgid: i32) {
    if std::io::stdin().is_terminal() {
        let _ = nix::unistd::tcsetpgrp(std::io::stdin(), Pid::from_raw(pgid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_smallest_unused() {
        let mut t = JobTable::default();
        let a = t.add(100, vec![100], "a".into());
        let b = t.add(200, vec![200], "b".into());
        assert_eq!((a, b), (1, 2));
        t.remove(1);
        let c = t.add(300, vec![300], "c".into());
        assert_eq!(c, 1);
    }

    #[test]
    fn test_resolve_spec() {
        let mut t = JobTable::default();
        t.add(100, vec![100], "sleep 100".into());
        t.add(200, vec![200], "make -j".into());
        assert_eq!(t.resolve_spec("%1"), Some(1));
        assert_eq!(t.resolve_spec("%%"), Some(2));
        assert_eq!(t.resolve_spec("%-"), Some(1));
        assert_eq!(t.resolve_spec("%make"), Some(2));
        assert_eq!(t.resolve_spec("%9"), None);
        assert_eq!(t.resolve_spec("nope"), None);
    }

    #[test]
    fn test_record_completion() {
        let mut t = JobTable::default();
        let id = t.add(100, vec![100, 101], "p | q".into());
        t.record(100, Some(0), JobState::Done);
        assert_eq!(t.get(id).unwrap().state, JobState::Running);
        t.record(101, Some(3), JobState::Done);
        let job = t.get(id).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.status(), 3);
    }
}

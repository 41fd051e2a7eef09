//! Job-control builtins: jobs, fg, bg, wait, disown, kill, suspend.

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::job_control::{give_terminal_to, JobState};
use crate::interpreter::signals::{resolve_signal, signal_listing};

pub fn handle_jobs(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    interp.jobs.reap();
    let pids_only = args.iter().any(|a| a == "-p");
    let long = args.iter().any(|a| a == "-l");
    let current = interp.jobs.current().map(|j| j.id);
    let previous = interp.jobs.previous().map(|j| j.id);
    for job in interp.jobs.jobs() {
        if pids_only {
            println!("{}", job.pgid);
            continue;
        }
        let marker = if Some(job.id) == current {
            '+'
        } else if Some(job.id) == previous {
            '-'
        } else {
            ' '
        };
        if long {
            println!(
                "[{}]{} {} {:<24} {}",
                job.id, marker, job.pgid, job.state_label(), job.command
            );
        } else {
            println!("[{}]{}  {:<24} {}", job.id, marker, job.state_label(), job.command);
        }
    }
    Ok(ExecOutcome::success())
}

fn resolve_job(interp: &mut Interpreter, spec: Option<&String>) -> Option<usize> {
    match spec {
        None => interp.jobs.current().map(|j| j.id),
        Some(s) if s.starts_with('%') => interp.jobs.resolve_spec(s),
        Some(s) => {
            // A plain pid belonging to a job.
            let pid: i32 = s.parse().ok()?;
            interp.jobs.jobs().iter().find(|j| j.pids.contains(&pid)).map(|j| j.id)
        }
    }
}

pub fn handle_fg(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    interp.jobs.reap();
    let id = match resolve_job(interp, args.first()) {
        Some(id) => id,
        None => {
            interp.diagnostic("fg: no current job");
            return Ok(ExecOutcome::status(1));
        }
    };
    let (pgid, command) = match interp.jobs.get(id) {
        Some(j) => (j.pgid, j.command.clone()),
        None => return Ok(ExecOutcome::status(1)),
    };
    println!("{}", command);
    give_terminal_to(pgid);
    let _ = killpg(Pid::from_raw(pgid), Signal::SIGCONT);
    if let Some(job) = interp.jobs.get_mut(id) {
        job.state = JobState::Running;
    }
    let status = interp.jobs.wait_job(id);
    give_terminal_to(interp.shell_pgid);
    Ok(ExecOutcome::status(status))
}

pub fn handle_bg(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    interp.jobs.reap();
    let id = match resolve_job(interp, args.first()) {
        Some(id) => id,
        None => {
            interp.diagnostic("bg: no current job");
            return Ok(ExecOutcome::status(1));
        }
    };
    match interp.jobs.get_mut(id) {
        Some(job) => {
            job.state = JobState::Running;
            let pgid = job.pgid;
            let command = job.command.clone();
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGCONT);
            println!("[{}]+ {} &", id, command);
            Ok(ExecOutcome::success())
        }
        None => Ok(ExecOutcome::status(1)),
    }
}

pub fn handle_wait(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.is_empty() {
        // Wait for every child.
        loop {
            match nix::sys::wait::wait() {
                Ok(status) => {
                    let code = crate::interpreter::process::decode_wait_status(status);
                    interp.env.last_status = code;
                }
                Err(_) => break,
            }
        }
        let ids: Vec<usize> = interp.jobs.jobs().iter().map(|j| j.id).collect();
        for id in ids {
            interp.jobs.remove(id);
        }
        return Ok(ExecOutcome::success());
    }

    let mut status = 0;
    for spec in args {
        match resolve_job(interp, Some(spec)) {
            Some(id) => status = interp.jobs.wait_job(id),
            None => {
                // A raw pid that never became a job.
                match spec.parse::<i32>() {
                    Ok(pid) => status = crate::interpreter::process::wait_for_pid(pid),
                    Err(_) => {
                        interp.diagnostic(&format!("wait: {}: not a pid or valid job spec", spec));
                        status = 127;
                    }
                }
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

pub fn handle_disown(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.iter().any(|a| a == "-a") {
        let ids: Vec<usize> = interp.jobs.jobs().iter().map(|j| j.id).collect();
        for id in ids {
            interp.jobs.remove(id);
        }
        return Ok(ExecOutcome::success());
    }
    let mut status = 0;
    let specs: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    if specs.is_empty() {
        match interp.jobs.current().map(|j| j.id) {
            Some(id) => interp.jobs.remove(id),
            None => {
                interp.diagnostic("disown: no current job");
                status = 1;
            }
        }
        return Ok(ExecOutcome::status(status));
    }
    for spec in specs {
        match resolve_job(interp, Some(spec)) {
            Some(id) => interp.jobs.remove(id),
            None => {
                interp.diagnostic(&format!("disown: {}: no such job", spec));
                status = 1;
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

pub fn handle_kill(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.first().map(|a| a.as_str()) == Some("-l") {
        match args.get(1) {
            Some(spec) => match resolve_signal(spec) {
                Some(sig) => println!("{}", sig.as_str().trim_start_matches("SIG")),
                None => {
                    // A 128+N exit status maps back to its signal name.
                    let n: i32 = spec.parse().unwrap_or(-1);
                    match Signal::try_from(if n > 128 { n - 128 } else { n }) {
                        Ok(sig) => println!("{}", sig.as_str().trim_start_matches("SIG")),
                        Err(_) => {
                            interp.diagnostic(&format!("kill: {}: invalid signal spec", spec));
                            return Ok(ExecOutcome::status(1));
                        }
                    }
                }
            },
            None => {
                let listing = signal_listing();
                for chunk in listing.chunks(5) {
                    let line: Vec<String> =
                        chunk.iter().map(|(n, name)| format!("{:>2}) SIG{}", n, name)).collect();
                    println!("{}", line.join("\t"));
                }
            }
        }
        return Ok(ExecOutcome::success());
    }

    let mut signal = Signal::SIGTERM;
    let mut targets: Vec<&String> = Vec::new();
    let mut i = 0usize;
    while i < args.len() {
        let arg = &args[i];
        if arg == "-s" || arg == "-n" {
            match args.get(i + 1).and_then(|s| resolve_signal(s)) {
                Some(sig) => signal = sig,
                None => return usage_error(interp, "kill: invalid signal specification"),
            }
            i += 2;
            continue;
        }
        if arg == "--" {
            targets.extend(args[i + 1..].iter());
            break;
        }
        if let Some(spec) = arg.strip_prefix('-') {
            if !spec.is_empty() {
                if let Some(sig) = resolve_signal(spec) {
                    signal = sig;
                    i += 1;
                    continue;
                }
            }
        }
        targets.push(arg);
        i += 1;
    }

    if targets.is_empty() {
        return usage_error(interp, "kill: usage: kill [-s sigspec | -sigspec] pid | %job ...");
    }

    let mut status = 0;
    for target in targets {
        if target.starts_with('%') {
            match interp.jobs.resolve_spec(target) {
                Some(id) => {
                    if let Err(e) = interp.jobs.signal_job(id, signal) {
                        interp.diagnostic(&format!("kill: {}: {}", target, e.desc()));
                        status = 1;
                    }
                }
                None => {
                    interp.diagnostic(&format!("kill: {}: no such job", target));
                    status = 1;
                }
            }
            continue;
        }
        match target.parse::<i32>() {
            Ok(pid) => {
                if let Err(e) = kill(Pid::from_raw(pid), signal) {
                    interp.diagnostic(&format!("kill: ({}) - {}", pid, e.desc()));
                    status = 1;
                }
            }
            Err(_) => {
                interp.diagnostic(&format!("kill: {}: arguments must be process or job IDs", target));
                status = 1;
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

pub fn handle_suspend(interp: &mut Interpreter, _args: &[String]) -> Result<ExecOutcome, ExecError> {
    if let Err(e) = kill(nix::unistd::getpid(), Signal::SIGSTOP) {
        interp.diagnostic(&format!("suspend: {}", e.desc()));
        return Ok(ExecOutcome::status(1));
    }
    Ok(ExecOutcome::success())
}

//! Process primitives: fork, exec, PATH resolution, status decoding.

use std::ffi::CString;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::environment::scope::FrameKind;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::job_control::JobTable;

pub enum ForkOutcome {
    Parent(i32),
    Child,
}

/// Fork with stdio flushed so buffered output is not duplicated.
pub fn fork_process() -> Result<ForkOutcome, ExecError> {
    use std::io::Write;
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    match unsafe { unistd::fork() }? {
        ForkResult::Parent { child } => Ok(ForkOutcome::Parent(child.as_raw())),
        ForkResult::Child => Ok(ForkOutcome::Child),
    }
}

/// Exit status from a wait result: natural exits 0..255, signal deaths
/// 128+signum.
pub fn decode_wait_status(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
        WaitStatus::Stopped(_, sig) => 128 + sig as i32,
        _ => 0,
    }
}

/// Blocking wait for one pid.
pub fn wait_for_pid(pid: i32) -> i32 {
    match waitpid(Pid::from_raw(pid), None) {
        Ok(status) => decode_wait_status(status),
        Err(_) => 127,
    }
}

fn is_executable_file(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(md) => md.is_file() && md.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

impl Interpreter {
    /// Resolve a command name to an executable path: explicit paths pass
    /// through, bare names go through the hash cache and then PATH.
    pub fn resolve_external(&mut self, name: &str) -> Result<String, ExecError> {
        if name.contains('/') {
            let path = Path::new(name);
            if !path.exists() {
                return Err(ExecError::NotFound { name: name.to_string() });
            }
            if !is_executable_file(path) {
                return Err(ExecError::NotExecutable {
                    name: name.to_string(),
                    reason: "Permission denied".to_string(),
                });
            }
            return Ok(name.to_string());
        }
        if let Some(path) = self.hash_table.get(name) {
            if is_executable_file(Path::new(path)) {
                return Ok(path.clone());
            }
            self.hash_table.remove(name);
        }
        let path_var = self.env.get_scalar("PATH").unwrap_or_default();
        let mut found_nonexec = false;
        for dir in path_var.split(':') {
            let dir = if dir.is_empty() { "." } else { dir };
            let candidate = Path::new(dir).join(name);
            if candidate.is_file() {
                if is_executable_file(&candidate) {
                    let path = candidate.to_string_lossy().into_owned();
                    self.hash_table.insert(name.to_string(), path.clone());
                    return Ok(path);
                }
                found_nonexec = true;
            }
        }
        if found_nonexec {
            Err(ExecError::NotExecutable {
                name: name.to_string(),
                reason: "Permission denied".to_string(),
            })
        } else {
            Err(ExecError::NotFound { name: name.to_string() })
        }
    }

    /// Turn this process into a subshell: own pid, fresh jobs, reset
    /// traps, and a scope frame whose changes die with the process.
    pub fn become_subshell(&mut self) {
        self.in_subshell = true;
        self.interactive = false;
        self.env.current_pid = unistd::getpid().as_raw();
        self.env.push_scope(FrameKind::Subshell);
        self.env.options.monitor = false;
        self.traps.reset_for_subshell();
        self.jobs = JobTable::default();
    }
}

/// Replace the current process image. Only returns on failure.
pub fn exec_external(path: &str, argv: &[String], env: &[(String, String)]) -> ExecError {
    let c_path = match CString::new(path) {
        Ok(p) => p,
        Err(_) => return ExecError::NotFound { name: path.to_string() },
    };
    let c_argv: Vec<CString> = argv
        .iter()
        .filter_map(|a| CString::new(a.as_str()).ok())
        .collect();
    let c_env: Vec<CString> = env
        .iter()
        .filter_map(|(k, v)| CString::new(format!("{}={}", k, v)).ok())
        .collect();
    match unistd::execve(&c_path, &c_argv, &c_env) {
        Err(nix::errno::Errno::EACCES) => ExecError::NotExecutable {
            name: path.to_string(),
            reason: "Permission denied".to_string(),
        },
        Err(nix::errno::Errno::ENOEXEC) => ExecError::NotExecutable {
            name: path.to_string(),
            reason: "cannot execute binary file".to_string(),
        },
        Err(e) => ExecError::Sys(e),
        Ok(_) => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute() {
        let mut interp = Interpreter::new();
        assert!(interp.resolve_external("/bin/sh").is_ok());
        assert!(matches!(
            interp.resolve_external("/no/such/binary"),
            Err(ExecError::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_from_path_caches() {
        let mut interp = Interpreter::new();
        interp.env.set_scalar("PATH", "/usr/bin:/bin").unwrap();
        let path = interp.resolve_external("sh").unwrap();
        assert!(path.ends_with("/sh"));
        assert_eq!(interp.hash_table.get("sh"), Some(&path));
    }

    #[test]
    fn test_resolve_not_found() {
        let mut interp = Interpreter::new();
        interp.env.set_scalar("PATH", "/nonexistent-dir").unwrap();
        assert!(matches!(
            interp.resolve_external("no-such-command-xyz"),
            Err(ExecError::NotFound { .. })
        ));
    }
}

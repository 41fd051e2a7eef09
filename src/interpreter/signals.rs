//! Signal plumbing.
//!
//! Handlers only set flags (signal-hook); everything observable happens at
//! safe points between commands. The shell itself ignores the job-control
//! signals while interactive; children reset them to the defaults before
//! exec.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::sys::signal::{self, SigHandler, Signal};

lazy_static::lazy_static! {
    /// SIGCHLD arrived; reap at the next safe point.
    pub static ref CHILD_PENDING: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
    /// SIGINT arrived at the prompt (interactive).
    pub static ref INTERRUPT_PENDING: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}

/// Signals an interactive shell keeps away from itself.
const SHELL_IGNORED: &[Signal] = &[
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// Install the shell's own dispositions. `interactive` additionally
/// ignores the terminal-generated signals and routes SIGINT to a flag.
pub fn install_shell_handlers(interactive: bool) {
    let _ = signal_hook::flag::register(libc::SIGCHLD, Arc::clone(&CHILD_PENDING));
    if interactive {
        let _ = signal_hook::flag::register(libc::SIGINT, Arc::clone(&INTERRUPT_PENDING));
        for sig in SHELL_IGNORED {
            if *sig == Signal::SIGINT {
                continue;
            }
            unsafe {
                let _ = signal::signal(*sig, SigHandler::SigIgn);
            }
        }
    }
}

/// Reset dispositions in a forked child before exec or subshell body.
pub fn restore_child_handlers() {
    for sig in SHELL_IGNORED {
        unsafe {
            let _ = signal::signal(*sig, SigHandler::SigDfl);
        }
    }
    unsafe {
        let _ = signal::signal(Signal::SIGCHLD, SigHandler::SigDfl);
    }
}

pub fn take_child_pending() -> bool {
    CHILD_PENDING.swap(false, Ordering::SeqCst)
}

pub fn take_interrupt() -> bool {
    INTERRUPT_PENDING.swap(false, Ordering::SeqCst)
}

/// Resolve "INT", "SIGINT", "2" and friends to a signal.
pub fn resolve_signal(spec: &str) -> Option<Signal> {
    if let Ok(n) = spec.parse::<i32>() {
        return Signal::try_from(n).ok();
    }
    let upper = spec.to_uppercase();
    let name = if upper.starts_with("SIG") { upper } else { format!("SIG{}", upper) };
    Signal::iterator().find(|s| s.as_str() == name)
}

/// `kill -l` listing: (number, short name) in signal order.
pub fn signal_listing() -> Vec<(i32, String)> {
    Signal::iterator()
        .map(|s| (s as i32, s.as_str().trim_start_matches("SIG").to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_signal() {
        assert_eq!(resolve_signal("INT"), Some(Signal::SIGINT));
        assert_eq!(resolve_signal("SIGTERM"), Some(Signal::SIGTERM));
        assert_eq!(resolve_signal("9"), Some(Signal::SIGKILL));
        assert_eq!(resolve_signal("nosuch"), None);
    }

    #[test]
    fn test_signal_listing_contains_common() {
        let listing = signal_listing();
        assert!(listing.iter().any(|(n, name)| *n == 2 && name == "INT"));
        assert!(listing.iter().any(|(_, name)| name == "KILL"));
    }
}

//! Trap bookkeeping.
//!
//! Stores handler strings for OS signals and the EXIT / ERR / DEBUG /
//! RETURN pseudo-signals. Delivery is deferred: signal handlers set a
//! flag, and the executor runs pending handlers between commands,
//! coalescing multiple deliveries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nix::sys::signal::{self, SigHandler, Signal};
use signal_hook::SigId;

use crate::interpreter::signals::resolve_signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapKey {
    Exit,
    Err,
    Debug,
    Return,
    Sig(i32),
}

impl TrapKey {
    pub fn parse(spec: &str) -> Option<TrapKey> {
        match spec.to_uppercase().as_str() {
            "EXIT" | "0" => Some(TrapKey::Exit),
            "ERR" => Some(TrapKey::Err),
            "DEBUG" => Some(TrapKey::Debug),
            "RETURN" => Some(TrapKey::Return),
            _ => resolve_signal(spec).map(|s| TrapKey::Sig(s as i32)),
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            TrapKey::Exit => "EXIT".to_string(),
            TrapKey::Err => "ERR".to_string(),
            TrapKey::Debug => "DEBUG".to_string(),
            TrapKey::Return => "RETURN".to_string(),
            TrapKey::Sig(n) => Signal::try_from(*n)
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|_| n.to_string()),
        }
    }
}

#[derive(Default)]
pub struct TrapState {
    actions: HashMap<TrapKey, String>,
    /// Live flag registrations for trapped OS signals.
    flags: HashMap<i32, (SigId, Arc<AtomicBool>)>,
    /// Re-entrancy guard: no traps while a trap handler runs.
    pub running: bool,
}

impl TrapState {
    /// `trap 'cmd' SIG`. `action` None resets to default; empty string
    /// ignores the signal.
    pub fn set(&mut self, key: TrapKey, action: Option<String>) {
        match action {
            None => {
                self.actions.remove(&key);
                if let TrapKey::Sig(n) = key {
                    self.unregister(n);
                    if let Ok(sig) = Signal::try_from(n) {
                        unsafe {
                            let _ = signal::signal(sig, SigHandler::SigDfl);
                        }
                    }
                }
            }
            Some(cmd) => {
                if let TrapKey::Sig(n) = key {
                    if cmd.is_empty() {
                        self.unregister(n);
                        if let Ok(sig) = Signal::try_from(n) {
                            unsafe {
                                let _ = signal::signal(sig, SigHandler::SigIgn);
                            }
                        }
                    } else {
                        self.register(n);
                    }
                }
                self.actions.insert(key, cmd);
            }
        }
    }

    pub fn get(&self, key: TrapKey) -> Option<&str> {
        self.actions.get(&key).map(|s| s.as_str())
    }

    /// Non-empty handler for `key`, if any.
    pub fn action_of(&self, key: TrapKey) -> Option<String> {
        self.actions.get(&key).filter(|a| !a.is_empty()).cloned()
    }

    /// `trap -p` listing in a stable order.
    pub fn listing(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .actions
            .iter()
            .map(|(k, v)| (k.display_name(), v.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// Drain trapped signals whose flags fired since the last safe point.
    /// Coalesced: each returns at most once per drain.
    pub fn take_pending(&mut self) -> Vec<i32> {
        let mut fired = Vec::new();
        for (sig, (_, flag)) in &self.flags {
            if flag.swap(false, Ordering::SeqCst) {
                fired.push(*sig);
            }
        }
        fired.sort();
        fired
    }

    /// Drop all handlers (subshells reset traps to default).
    pub fn reset_for_subshell(&mut self) {
        let signals: Vec<i32> = self.flags.keys().copied().collect();
        for n in signals {
            self.unregister(n);
        }
        self.actions.clear();
    }

    fn register(&mut self, sig: i32) {
        if self.flags.contains_key(&sig) {
            return;
        }
        let flag = Arc::new(AtomicBool::new(false));
        if let Ok(id) = signal_hook::flag::register(sig, Arc::clone(&flag)) {
            self.flags.insert(sig, (id, flag));
        }
    }

    fn unregister(&mut self, sig: i32) {
        if let Some((id, _)) = self.flags.remove(&sig) {
            signal_hook::low_level::unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys() {
        assert_eq!(TrapKey::parse("EXIT"), Some(TrapKey::Exit));
        assert_eq!(TrapKey::parse("0"), Some(TrapKey::Exit));
        assert_eq!(TrapKey::parse("err"), Some(TrapKey::Err));
        assert_eq!(TrapKey::parse("USR1"), Some(TrapKey::Sig(libc::SIGUSR1)));
        assert_eq!(TrapKey::parse("bogus"), None);
    }

    #[test]
    fn test_set_get_reset() {
        let mut t = TrapState::default();
        t.set(TrapKey::Exit, Some("echo bye".into()));
        assert_eq!(t.get(TrapKey::Exit), Some("echo bye"));
        t.set(TrapKey::Exit, None);
        assert!(t.get(TrapKey::Exit).is_none());
    }

    #[test]
    fn test_ignored_trap_has_no_action() {
        let mut t = TrapState::default();
        t.set(TrapKey::Exit, Some(String::new()));
        assert_eq!(t.get(TrapKey::Exit), Some(""));
        assert!(t.action_of(TrapKey::Exit).is_none());
    }
}

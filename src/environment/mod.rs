//! The environment: every piece of mutable shell state outside the AST
//! and outside file descriptors.
//!
//! Variables (typed, attributed, scoped), positional parameters, shell
//! options, aliases, functions, and the special-variable views.

pub mod aliases;
pub mod functions;
pub mod options;
pub mod scope;
pub mod special;
pub mod value;

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::parser::types::is_valid_name;
use aliases::AliasTable;
use functions::FunctionTable;
use options::ShellOptions;
use scope::{FrameKind, ScopeStack};
use value::{apply_case_attrs, Attributes, Binding, Value};

#[derive(Debug, Clone, Error)]
pub enum EnvError {
    #[error("{0}: readonly variable")]
    Readonly(String),
    #[error("`{0}': not a valid identifier")]
    InvalidName(String),
    #[error("{0}: unbound variable")]
    Unset(String),
}

/// Where a `set` should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetScope {
    /// Topmost frame holding the name, else global.
    Normal,
    /// Innermost function frame (`local`).
    Local,
    /// Global frame (`declare -g`).
    Global,
    /// Topmost frame unconditionally (TempAssign overlays).
    Top,
}

pub struct Environment {
    pub scopes: ScopeStack,
    pub options: ShellOptions,
    pub aliases: AliasTable,
    pub functions: FunctionTable,

    positional: Vec<String>,
    pub arg0: String,

    pub last_status: i32,
    pub pipestatus: Vec<i32>,
    pub last_bg_pid: Option<i32>,

    pub shell_pid: i32,
    pub current_pid: i32,
    pub ppid: i32,
    pub current_line: u32,

    pub rematch: Vec<String>,
    pub func_stack: Vec<String>,

    start_time: Instant,
    seconds_offset: i64,
    pub(crate) rng: StdRng,
    pub(crate) random_disabled: bool,
    pub(crate) seconds_disabled: bool,
}

impl Environment {
    pub fn new() -> Self {
        let pid = std::process::id() as i32;
        Self {
            scopes: ScopeStack::default(),
            options: ShellOptions::default(),
            aliases: AliasTable::default(),
            functions: FunctionTable::default(),
            positional: Vec::new(),
            arg0: "marsh".to_string(),
            last_status: 0,
            pipestatus: Vec::new(),
            last_bg_pid: None,
            shell_pid: pid,
            current_pid: pid,
            ppid: nix::unistd::getppid().as_raw(),
            current_line: 0,
            rematch: Vec::new(),
            func_stack: Vec::new(),
            start_time: Instant::now(),
            seconds_offset: 0,
            rng: StdRng::from_entropy(),
            random_disabled: false,
            seconds_disabled: false,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value of `name`, serving dynamic specials first.
    pub fn value_of(&mut self, name: &str) -> Option<Value> {
        if let Some(v) = special::dynamic_value(self, name) {
            return Some(v);
        }
        self.scopes.lookup(name).and_then(|b| b.value.clone())
    }

    pub fn get_scalar(&mut self, name: &str) -> Option<String> {
        self.value_of(name).map(|v| v.to_scalar())
    }

    pub fn is_set(&mut self, name: &str) -> bool {
        self.value_of(name).is_some()
    }

    pub fn attrs_of(&self, name: &str) -> Attributes {
        self.scopes.lookup(name).map(|b| b.attrs).unwrap_or_default()
    }

    /// IFS with the POSIX default when unset.
    pub fn ifs(&mut self) -> String {
        match self.value_of("IFS") {
            Some(v) => v.to_scalar(),
            None => " \t\n".to_string(),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn set_scalar(&mut self, name: &str, value: impl Into<String>) -> Result<(), EnvError> {
        self.set_value(name, Value::Scalar(value.into()), SetScope::Normal)
    }

    pub fn set_value(&mut self, name: &str, value: Value, scope: SetScope) -> Result<(), EnvError> {
        if !is_valid_name(name) {
            return Err(EnvError::InvalidName(name.to_string()));
        }
        if self.attrs_of(name).readonly {
            return Err(EnvError::Readonly(name.to_string()));
        }

        // SECONDS and RANDOM assignments adjust the dynamic state.
        if name == "SECONDS" && !self.seconds_disabled {
            let target: i64 = value.to_scalar().parse().unwrap_or(0);
            self.seconds_offset = target - self.start_time.elapsed().as_secs() as i64;
            return Ok(());
        }
        if name == "RANDOM" && !self.random_disabled {
            let seed: u64 = value.to_scalar().parse().unwrap_or(0);
            self.rng = StdRng::seed_from_u64(seed);
            return Ok(());
        }

        let allexport = self.options.allexport;
        let binding = self.binding_for(name, scope);
        let attrs = binding.attrs;
        binding.value = Some(apply_case_attrs(attrs, value));
        if allexport {
            binding.attrs.exported = true;
        }
        Ok(())
    }

    fn binding_for(&mut self, name: &str, scope: SetScope) -> &mut Binding {
        match scope {
            SetScope::Normal => self.scopes.binding_for_set(name),
            SetScope::Global => self.scopes.binding_for_global(name),
            SetScope::Top => self.scopes.binding_for_top(name),
            SetScope::Local => {
                if self.scopes.binding_for_local(name).is_some() {
                    self.scopes.binding_for_local(name).unwrap()
                } else {
                    self.scopes.binding_for_global(name)
                }
            }
        }
    }

    /// `+=`: scalar append, integer add handled by the caller, array push.
    pub fn append_scalar(&mut self, name: &str, value: &str) -> Result<(), EnvError> {
        let existing = self.value_of(name);
        match existing {
            Some(Value::Indexed(mut map)) => {
                let next = map.keys().next_back().map(|k| k + 1).unwrap_or(0);
                map.insert(next, value.to_string());
                self.set_value(name, Value::Indexed(map), SetScope::Normal)
            }
            Some(Value::Scalar(s)) => self.set_scalar(name, format!("{}{}", s, value)),
            Some(Value::Assoc(_)) => Err(EnvError::InvalidName(name.to_string())),
            None => self.set_scalar(name, value),
        }
    }

    /// Assign one array element, creating an indexed array as needed.
    pub fn set_element(&mut self, name: &str, key: &str, index: i64, value: &str) -> Result<(), EnvError> {
        if self.attrs_of(name).readonly {
            return Err(EnvError::Readonly(name.to_string()));
        }
        let current = self.scopes.lookup(name).and_then(|b| b.value.clone());
        let updated = match current {
            Some(Value::Assoc(mut map)) => {
                map.insert(key.to_string(), value.to_string());
                Value::Assoc(map)
            }
            Some(Value::Indexed(mut map)) => {
                map.insert(index, value.to_string());
                Value::Indexed(map)
            }
            Some(Value::Scalar(s)) => {
                // Subscripting a scalar promotes it to an indexed array with
                // the old value at 0.
                let mut map = std::collections::BTreeMap::new();
                if !s.is_empty() || index != 0 {
                    map.insert(0, s);
                }
                map.insert(index, value.to_string());
                Value::Indexed(map)
            }
            None => {
                let mut map = std::collections::BTreeMap::new();
                map.insert(index, value.to_string());
                Value::Indexed(map)
            }
        };
        self.set_value(name, updated, SetScope::Normal)
    }

    pub fn unset(&mut self, name: &str) -> Result<bool, EnvError> {
        if self.attrs_of(name).readonly {
            return Err(EnvError::Readonly(name.to_string()));
        }
        match name {
            "RANDOM" => self.random_disabled = true,
            "SECONDS" => self.seconds_disabled = true,
            _ => {}
        }
        Ok(self.scopes.remove(name))
    }

    /// Adjust attributes, creating a valueless binding when absent.
    pub fn modify_attrs(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Attributes),
    ) -> Result<(), EnvError> {
        if !is_valid_name(name) {
            return Err(EnvError::InvalidName(name.to_string()));
        }
        let binding = self.scopes.binding_for_set(name);
        // Removing readonly is refused; everything else is fair.
        let was_readonly = binding.attrs.readonly;
        f(&mut binding.attrs);
        if was_readonly && !binding.attrs.readonly {
            binding.attrs.readonly = true;
            return Err(EnvError::Readonly(name.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Positional parameters
    // =========================================================================

    pub fn positional_params(&self) -> &[String] {
        &self.positional
    }

    pub fn set_positionals(&mut self, params: Vec<String>) {
        self.positional = params;
    }

    pub fn num_positional(&self) -> usize {
        self.positional.len()
    }

    pub fn get_positional(&self, n: usize) -> Option<String> {
        if n == 0 {
            return Some(self.arg0.clone());
        }
        self.positional.get(n - 1).cloned()
    }

    pub fn shift(&mut self, n: usize) -> bool {
        if n > self.positional.len() {
            return false;
        }
        self.positional.drain(..n);
        true
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    pub fn push_scope(&mut self, kind: FrameKind) {
        self.scopes.push(kind);
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Run `f` with an option temporarily forced to `value`.
    pub fn with_option<T>(
        &mut self,
        name: &str,
        value: bool,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let prev = self.options.query(name);
        let _ = self.options.set_by_name(name, value);
        let out = f(self);
        if let Some(prev) = prev {
            let _ = self.options.set_by_name(name, prev);
        }
        out
    }

    // =========================================================================
    // Exported environment
    // =========================================================================

    /// Exported scalar bindings for a child's environment. Arrays are not
    /// exported.
    pub fn export_map(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .scopes
            .visible()
            .into_iter()
            .filter(|(_, b)| b.attrs.exported)
            .filter_map(|(name, b)| match &b.value {
                Some(Value::Scalar(s)) => Some((name.to_string(), s.clone())),
                _ => None,
            })
            .collect();
        out.sort();
        out
    }

    /// Variable names starting with `prefix`, sorted (`${!prefix*}`).
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .scopes
            .visible()
            .into_iter()
            .filter(|(name, b)| name.starts_with(prefix) && b.value.is_some())
            .map(|(name, _)| name.to_string())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn seconds(&self) -> i64 {
        self.start_time.elapsed().as_secs() as i64 + self.seconds_offset
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let mut env = Environment::new();
        env.set_scalar("x", "value").unwrap();
        assert_eq!(env.get_scalar("x").as_deref(), Some("value"));
    }

    #[test]
    fn test_invalid_name() {
        let mut env = Environment::new();
        assert!(matches!(env.set_scalar("9x", "v"), Err(EnvError::InvalidName(_))));
        assert!(matches!(env.set_scalar("a-b", "v"), Err(EnvError::InvalidName(_))));
    }

    #[test]
    fn test_readonly_refuses_set_and_unset() {
        let mut env = Environment::new();
        env.set_scalar("x", "1").unwrap();
        env.modify_attrs("x", |a| a.readonly = true).unwrap();
        assert!(matches!(env.set_scalar("x", "2"), Err(EnvError::Readonly(_))));
        assert!(matches!(env.unset("x"), Err(EnvError::Readonly(_))));
    }

    #[test]
    fn test_case_attribute_transform() {
        let mut env = Environment::new();
        env.modify_attrs("x", |a| a.upper = true).unwrap();
        env.set_scalar("x", "hello").unwrap();
        assert_eq!(env.get_scalar("x").as_deref(), Some("HELLO"));
    }

    #[test]
    fn test_special_status_and_pid() {
        let mut env = Environment::new();
        env.last_status = 42;
        assert_eq!(env.get_scalar("?").as_deref(), Some("42"));
        assert_eq!(env.get_scalar("$").unwrap(), std::process::id().to_string());
    }

    #[test]
    fn test_positionals_and_shift() {
        let mut env = Environment::new();
        env.set_positionals(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(env.get_scalar("#").as_deref(), Some("3"));
        assert_eq!(env.get_positional(2).as_deref(), Some("b"));
        assert!(env.shift(2));
        assert_eq!(env.get_positional(1).as_deref(), Some("c"));
        assert!(!env.shift(5));
    }

    #[test]
    fn test_seconds_assignment() {
        let mut env = Environment::new();
        env.set_scalar("SECONDS", "100").unwrap();
        let s: i64 = env.get_scalar("SECONDS").unwrap().parse().unwrap();
        assert!((100..103).contains(&s));
    }

    #[test]
    fn test_random_range_and_seeding() {
        let mut env = Environment::new();
        for _ in 0..100 {
            let r: i64 = env.get_scalar("RANDOM").unwrap().parse().unwrap();
            assert!((0..32768).contains(&r));
        }
        env.set_scalar("RANDOM", "7").unwrap();
        let a = env.get_scalar("RANDOM").unwrap();
        env.set_scalar("RANDOM", "7").unwrap();
        let b = env.get_scalar("RANDOM").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_element_assignment_promotes_scalar() {
        let mut env = Environment::new();
        env.set_scalar("a", "zero").unwrap();
        env.set_element("a", "", 2, "two").unwrap();
        match env.value_of("a").unwrap() {
            Value::Indexed(map) => {
                assert_eq!(map.get(&0).map(|s| s.as_str()), Some("zero"));
                assert_eq!(map.get(&2).map(|s| s.as_str()), Some("two"));
            }
            other => panic!("expected indexed array, got {:?}", other),
        }
    }

    #[test]
    fn test_append() {
        let mut env = Environment::new();
        env.set_scalar("s", "ab").unwrap();
        env.append_scalar("s", "cd").unwrap();
        assert_eq!(env.get_scalar("s").as_deref(), Some("abcd"));

        env.set_value("arr", Value::indexed_from(vec!["x".into()]), SetScope::Normal).unwrap();
        env.append_scalar("arr", "y").unwrap();
        assert_eq!(env.value_of("arr").unwrap().elements(), vec!["x", "y"]);
    }

    #[test]
    fn test_export_map_excludes_arrays() {
        let mut env = Environment::new();
        env.set_scalar("S", "v").unwrap();
        env.modify_attrs("S", |a| a.exported = true).unwrap();
        env.set_value("A", Value::indexed_from(vec!["x".into()]), SetScope::Normal).unwrap();
        env.modify_attrs("A", |a| a.exported = true).unwrap();
        let map = env.export_map();
        assert!(map.iter().any(|(k, _)| k == "S"));
        assert!(!map.iter().any(|(k, _)| k == "A"));
    }
}

//! Scope stack: global frame plus Function / Subshell / TempAssign
//! overlays.
//!
//! Lookup walks top-down until found. Assignment targets the topmost
//! frame holding the name, else the global frame; `local` declarations
//! write into the innermost Function frame.

use std::collections::HashMap;

use super::value::Binding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Global,
    Function,
    Subshell,
    TempAssign,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub vars: HashMap<String, Binding>,
}

impl Frame {
    pub fn new(kind: FrameKind) -> Self {
        Self { kind, vars: HashMap::new() }
    }
}

#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self { frames: vec![Frame::new(FrameKind::Global)] }
    }
}

impl ScopeStack {
    pub fn push(&mut self, kind: FrameKind) {
        self.frames.push(Frame::new(kind));
    }

    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.vars.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.frames.iter_mut().rev().find_map(|f| f.vars.get_mut(name))
    }

    /// The binding slot an assignment should write: the topmost frame that
    /// already holds the name, else the global frame.
    pub fn binding_for_set(&mut self, name: &str) -> &mut Binding {
        let idx = self
            .frames
            .iter()
            .rposition(|f| f.vars.contains_key(name))
            .unwrap_or(0);
        self.frames[idx].vars.entry(name.to_string()).or_default()
    }

    /// Declare into the innermost Function frame (`local`).
    pub fn binding_for_local(&mut self, name: &str) -> Option<&mut Binding> {
        let idx = self.frames.iter().rposition(|f| f.kind == FrameKind::Function)?;
        Some(self.frames[idx].vars.entry(name.to_string()).or_default())
    }

    /// Declare into the global frame (`declare -g`, function-less declare).
    pub fn binding_for_global(&mut self, name: &str) -> &mut Binding {
        self.frames[0].vars.entry(name.to_string()).or_default()
    }

    /// Write into the topmost frame unconditionally (TempAssign overlays).
    pub fn binding_for_top(&mut self, name: &str) -> &mut Binding {
        let idx = self.frames.len() - 1;
        self.frames[idx].vars.entry(name.to_string()).or_default()
    }

    pub fn in_function(&self) -> bool {
        self.frames.iter().any(|f| f.kind == FrameKind::Function)
    }

    /// Remove the topmost binding for `name`; true when something was
    /// removed.
    pub fn remove(&mut self, name: &str) -> bool {
        for f in self.frames.iter_mut().rev() {
            if f.vars.remove(name).is_some() {
                return true;
            }
        }
        false
    }

    /// Visible bindings, top frame shadowing lower ones.
    pub fn visible(&self) -> HashMap<&str, &Binding> {
        let mut out: HashMap<&str, &Binding> = HashMap::new();
        for f in &self.frames {
            for (k, v) in &f.vars {
                out.insert(k.as_str(), v);
            }
        }
        out
    }

    pub fn top_kind(&self) -> FrameKind {
        self.frames.last().map(|f| f.kind).unwrap_or(FrameKind::Global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::value::Value;

    fn set(stack: &mut ScopeStack, name: &str, v: &str) {
        stack.binding_for_set(name).value = Some(Value::scalar(v));
    }

    fn get(stack: &ScopeStack, name: &str) -> Option<String> {
        stack.lookup(name).and_then(|b| b.value.as_ref()).map(|v| v.to_scalar())
    }

    #[test]
    fn test_global_set_get() {
        let mut s = ScopeStack::default();
        set(&mut s, "x", "1");
        assert_eq!(get(&s, "x").as_deref(), Some("1"));
    }

    #[test]
    fn test_local_shadows_and_restores() {
        let mut s = ScopeStack::default();
        set(&mut s, "x", "outer");
        s.push(FrameKind::Function);
        s.binding_for_local("x").unwrap().value = Some(Value::scalar("inner"));
        assert_eq!(get(&s, "x").as_deref(), Some("inner"));
        s.pop();
        assert_eq!(get(&s, "x").as_deref(), Some("outer"));
    }

    #[test]
    fn test_assignment_without_local_hits_outer() {
        let mut s = ScopeStack::default();
        set(&mut s, "x", "outer");
        s.push(FrameKind::Function);
        set(&mut s, "x", "changed");
        s.pop();
        assert_eq!(get(&s, "x").as_deref(), Some("changed"));
    }

    #[test]
    fn test_temp_assign_overlay() {
        let mut s = ScopeStack::default();
        set(&mut s, "x", "orig");
        s.push(FrameKind::TempAssign);
        s.binding_for_top("x").value = Some(Value::scalar("temp"));
        assert_eq!(get(&s, "x").as_deref(), Some("temp"));
        s.pop();
        assert_eq!(get(&s, "x").as_deref(), Some("orig"));
    }

    #[test]
    fn test_global_frame_never_popped() {
        let mut s = ScopeStack::default();
        assert!(s.pop().is_none());
        assert_eq!(s.depth(), 1);
    }
}

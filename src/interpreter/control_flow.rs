//! Non-local control flow as plain values.
//!
//! `break`, `continue`, `return` and `exit` bubble up the executor
//! recursion as `ControlFlow` markers on an otherwise ordinary outcome,
//! distinct from errors.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    None,
    /// Unwind `n` enclosing loops.
    Break(u32),
    /// Unwind to the top of the `n`th enclosing loop.
    Continue(u32),
    /// Unwind to the enclosing function call or sourced script.
    Return,
    /// Terminate the shell (EXIT trap still runs).
    Exit,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecOutcome {
    pub status: i32,
    pub flow: ControlFlow,
}

impl ExecOutcome {
    pub fn status(status: i32) -> Self {
        Self { status, flow: ControlFlow::None }
    }

    pub fn success() -> Self {
        Self::status(0)
    }

    pub fn exit(status: i32) -> Self {
        Self { status, flow: ControlFlow::Exit }
    }

    pub fn is_unwinding(&self) -> bool {
        self.flow != ControlFlow::None
    }
}

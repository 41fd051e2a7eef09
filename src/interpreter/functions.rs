//! Function invocation.

use std::rc::Rc;

use crate::ast::types::FunctionDefNode;
use crate::environment::scope::FrameKind;
use crate::interpreter::control_flow::{ControlFlow, ExecOutcome};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::traps::TrapKey;

const MAX_CALL_DEPTH: u32 = 1000;

impl Interpreter {
    /// Call a function with `args` as its positional parameters. The
    /// caller has already pushed any TempAssign frame.
    pub fn call_function(
        &mut self,
        def: Rc<FunctionDefNode>,
        args: &[String],
    ) -> Result<ExecOutcome, ExecError> {
        if self.func_depth >= MAX_CALL_DEPTH {
            return Err(ExecError::Expansion(format!(
                "{}: maximum function nesting level exceeded",
                def.name
            )));
        }

        let saved_positionals = self.env.positional_params().to_vec();
        self.env.set_positionals(args.to_vec());
        self.env.push_scope(FrameKind::Function);
        self.env.func_stack.push(def.name.clone());
        self.func_depth += 1;

        let result = self.run_command(&def.body);

        self.func_depth -= 1;
        self.env.func_stack.pop();
        self.env.pop_scope();
        self.env.set_positionals(saved_positionals);

        let mut out = result?;
        // `return` unwinds exactly to here.
        if out.flow == ControlFlow::Return {
            out.flow = ControlFlow::None;
        }
        self.run_trap(TrapKey::Return);
        Ok(out)
    }
}

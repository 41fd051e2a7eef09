//! Command-name resolution.
//!
//! Precedence is data, not inheritance: function → special builtin →
//! regular builtin → suffix alias → PATH search.

use std::rc::Rc;

use crate::ast::types::FunctionDefNode;
use crate::interpreter::builtins::{self, Builtin};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub enum Resolution {
    Function(Rc<FunctionDefNode>),
    Builtin(&'static Builtin),
    /// Rewrites argv to `[prefix, original_argv0, rest...]`.
    SuffixAlias(String),
    External(String),
}

impl Interpreter {
    pub fn resolve_command(
        &mut self,
        name: &str,
        skip_functions: bool,
    ) -> Result<Resolution, ExecError> {
        if !skip_functions {
            if let Some(def) = self.env.functions.lookup(name) {
                return Ok(Resolution::Function(def));
            }
        }
        if let Some(b) = builtins::lookup(name) {
            return Ok(Resolution::Builtin(b));
        }
        if !name.contains('/') {
            if let Some(prefix) = self.env.aliases.lookup_suffix(name) {
                return Ok(Resolution::SuffixAlias(prefix.to_string()));
            }
        }
        Ok(Resolution::External(self.resolve_external(name)?))
    }

    /// `type`/`command -v` style description of what a name resolves to.
    pub fn describe_command(&mut self, name: &str, verbose: bool) -> Option<String> {
        if self.env.aliases.lookup(name).is_some() {
            let replacement = self.env.aliases.lookup(name).unwrap_or_default().to_string();
            return Some(if verbose {
                format!("{} is aliased to `{}'", name, replacement)
            } else {
                format!("alias {}='{}'", name, replacement)
            });
        }
        if self.env.functions.contains(name) {
            return Some(if verbose {
                format!("{} is a function", name)
            } else {
                name.to_string()
            });
        }
        if builtins::lookup(name).is_some() {
            return Some(if verbose {
                format!("{} is a shell builtin", name)
            } else {
                name.to_string()
            });
        }
        match self.resolve_external(name) {
            Ok(path) => Some(if verbose {
                format!("{} is {}", name, path)
            } else {
                path
            }),
            Err(_) => None,
        }
    }
}

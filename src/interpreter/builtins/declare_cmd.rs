//! declare / typeset / local / export / readonly.
//!
//! Attribute manipulation plus optional assignment, and the `-p`
//! listings that `eval "$(declare -p X)"` round-trips through.

use crate::environment::value::{Attributes, Value};
use crate::environment::SetScope;
use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::parser::parser::parse_assignment_text;
use crate::parser::types::is_valid_name;

#[derive(Default)]
struct DeclareFlags {
    indexed: bool,
    assoc: bool,
    integer: Option<bool>,
    lower: Option<bool>,
    upper: Option<bool>,
    readonly: Option<bool>,
    export: Option<bool>,
    global: bool,
    print: bool,
    functions: bool,
    function_names: bool,
}

fn parse_flags<'a>(
    args: &'a [String],
) -> Result<(DeclareFlags, &'a [String]), String> {
    let mut flags = DeclareFlags::default();
    let mut i = 0usize;
    while i < args.len() {
        let arg = &args[i];
        let (on, body) = if let Some(b) = arg.strip_prefix('-') {
            (true, b)
        } else if let Some(b) = arg.strip_prefix('+') {
            (false, b)
        } else {
            break;
        };
        if body.is_empty() || body == "-" {
            i += 1;
            break;
        }
        for c in body.chars() {
            match c {
                'a' => flags.indexed = on,
                'A' => flags.assoc = on,
                'i' => flags.integer = Some(on),
                'l' => flags.lower = Some(on),
                'u' => flags.upper = Some(on),
                'r' => flags.readonly = Some(on),
                'x' => flags.export = Some(on),
                'g' => flags.global = on,
                'p' => flags.print = true,
                'f' => flags.functions = true,
                'F' => flags.function_names = true,
                'n' | 't' => {}
                other => return Err(format!("-{}: invalid option", other)),
            }
        }
        i += 1;
    }
    Ok((flags, &args[i..]))
}

pub fn handle_declare(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    declare_impl(interp, args, "declare", false)
}

pub fn handle_local(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if interp.func_depth == 0 {
        interp.diagnostic("local: can only be used in a function");
        return Ok(ExecOutcome::status(1));
    }
    declare_impl(interp, args, "local", true)
}

fn declare_impl(
    interp: &mut Interpreter,
    args: &[String],
    name: &str,
    local: bool,
) -> Result<ExecOutcome, ExecError> {
    let (flags, operands) = match parse_flags(args) {
        Ok(parsed) => parsed,
        Err(msg) => return usage_error(interp, &format!("{}: {}", name, msg)),
    };

    if flags.functions || flags.function_names {
        return list_functions(interp, operands, flags.function_names);
    }
    if operands.is_empty() {
        return print_variables(interp, &[], flags.print);
    }
    if flags.print {
        return print_variables(interp, operands, true);
    }

    let scope = if local {
        SetScope::Local
    } else if flags.global {
        SetScope::Global
    } else if interp.func_depth > 0 && name == "declare" {
        // declare inside a function declares a local, like bash.
        SetScope::Local
    } else {
        SetScope::Normal
    };

    let mut status = 0;
    for operand in operands {
        let assignment = parse_assignment_text(operand, 0);
        let var_name = match &assignment {
            Some(Ok(a)) => a.name.clone(),
            Some(Err(_)) => {
                interp.diagnostic(&format!("{}: {}: invalid assignment", name, operand));
                status = 1;
                continue;
            }
            None => operand.clone(),
        };
        if !is_valid_name(&var_name) {
            interp.diagnostic(&format!("{}: `{}': not a valid identifier", name, operand));
            status = 1;
            continue;
        }

        // Declaring in local scope creates the binding slot up front.
        if scope == SetScope::Local {
            let _ = interp.env.scopes.binding_for_local(&var_name);
        }

        if let Err(e) = apply_attrs(interp, &var_name, &flags, scope) {
            interp.diagnostic(&format!("{}: {}", name, e));
            status = 1;
            continue;
        }

        // Array flavor markers so later subscript assignments know.
        if flags.assoc && !matches!(interp.env.value_of(&var_name), Some(Value::Assoc(_))) {
            let _ = interp.env.set_value(&var_name, Value::Assoc(Default::default()), scope);
        } else if flags.indexed
            && !matches!(interp.env.value_of(&var_name), Some(Value::Indexed(_)))
            && assignment.is_none()
        {
            let has_value = interp.env.is_set(&var_name);
            if !has_value {
                let _ = interp.env.set_value(&var_name, Value::Indexed(Default::default()), scope);
            }
        }

        if let Some(Ok(a)) = assignment {
            if let Err(e) = interp.eval_assignment(&a, scope, false) {
                interp.diagnostic(&format!("{}: {}", name, e));
                status = 1;
            }
        }
    }
    Ok(ExecOutcome::status(status))
}

fn apply_attrs(
    interp: &mut Interpreter,
    name: &str,
    flags: &DeclareFlags,
    scope: SetScope,
) -> Result<(), crate::environment::EnvError> {
    // Make sure a binding exists in the requested scope first.
    if scope == SetScope::Local {
        let _ = interp.env.scopes.binding_for_local(name);
    }
    interp.env.modify_attrs(name, |attrs| {
        if let Some(v) = flags.integer {
            attrs.integer = v;
        }
        if let Some(v) = flags.lower {
            attrs.lower = v;
            if v {
                attrs.upper = false;
            }
        }
        if let Some(v) = flags.upper {
            attrs.upper = v;
            if v {
                attrs.lower = false;
            }
        }
        if let Some(v) = flags.export {
            attrs.exported = v;
        }
        if flags.readonly == Some(true) {
            attrs.readonly = true;
        }
    })
}

// =============================================================================
// export / readonly
// =============================================================================

pub fn handle_export(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    attr_builtin(interp, args, "export", |attrs, on| attrs.exported = on)
}

pub fn handle_readonly(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    attr_builtin(interp, args, "readonly", |attrs, on| {
        if on {
            attrs.readonly = true;
        }
    })
}

fn attr_builtin(
    interp: &mut Interpreter,
    args: &[String],
    name: &str,
    set: impl Fn(&mut Attributes, bool),
) -> Result<ExecOutcome, ExecError> {
    let mut operands: Vec<(&str, bool)> = Vec::new();
    let mut list_only = args.is_empty();
    for arg in args {
        match arg.as_str() {
            "-p" => list_only = true,
            "-n" if name == "export" => {}
            "--" => {}
            a if a.starts_with('-') && a.len() > 1 => {
                return usage_error(interp, &format!("{}: {}: invalid option", name, a));
            }
            a => operands.push((a, !args.iter().any(|x| x == "-n"))),
        }
    }

    if list_only && operands.is_empty() {
        let mut entries: Vec<String> = Vec::new();
        let visible: Vec<(String, Option<Value>, Attributes)> = interp
            .env
            .scopes
            .visible()
            .into_iter()
            .map(|(n, b)| (n.to_string(), b.value.clone(), b.attrs))
            .collect();
        for (var, value, attrs) in visible {
            let wanted = match name {
                "export" => attrs.exported,
                _ => attrs.readonly,
            };
            if wanted {
                entries.push(declare_p_line(&var, value.as_ref(), attrs));
            }
        }
        entries.sort();
        for line in entries {
            println!("{}", line);
        }
        return Ok(ExecOutcome::success());
    }

    let mut status = 0;
    for (operand, on) in operands {
        let (var_name, assignment) = match parse_assignment_text(operand, 0) {
            Some(Ok(a)) => (a.name.clone(), Some(a)),
            Some(Err(_)) => {
                interp.diagnostic(&format!("{}: {}: invalid assignment", name, operand));
                status = 1;
                continue;
            }
            None => (operand.to_string(), None),
        };
        if !is_valid_name(&var_name) {
            interp.diagnostic(&format!("{}: `{}': not a valid identifier", name, operand));
            status = 1;
            continue;
        }
        if let Some(a) = assignment {
            if let Err(e) = interp.eval_assignment(&a, SetScope::Normal, false) {
                interp.diagnostic(&format!("{}: {}", name, e));
                status = 1;
                continue;
            }
        }
        if let Err(e) = interp.env.modify_attrs(&var_name, |attrs| set(attrs, on)) {
            interp.diagnostic(&format!("{}: {}", name, e));
            status = 1;
        }
    }
    Ok(ExecOutcome::status(status))
}

// =============================================================================
// Listings
// =============================================================================

fn print_variables(
    interp: &mut Interpreter,
    names: &[String],
    _declare_p: bool,
) -> Result<ExecOutcome, ExecError> {
    if names.is_empty() {
        let mut entries: Vec<String> = interp
            .env
            .scopes
            .visible()
            .into_iter()
            .filter(|(_, b)| b.value.is_some())
            .map(|(n, b)| declare_p_line(n, b.value.as_ref(), b.attrs))
            .collect();
        entries.sort();
        for line in entries {
            println!("{}", line);
        }
        return Ok(ExecOutcome::success());
    }
    let mut status = 0;
    for name in names {
        let value = interp.env.value_of(name);
        let attrs = interp.env.attrs_of(name);
        if value.is_none() && attrs == Attributes::default() {
            interp.diagnostic(&format!("declare: {}: not found", name));
            status = 1;
            continue;
        }
        println!("{}", declare_p_line(name, value.as_ref(), attrs));
    }
    Ok(ExecOutcome::status(status))
}

fn list_functions(
    interp: &mut Interpreter,
    names: &[String],
    names_only: bool,
) -> Result<ExecOutcome, ExecError> {
    let mut status = 0;
    let selected: Vec<String> = if names.is_empty() {
        interp.env.functions.names()
    } else {
        names.to_vec()
    };
    for name in selected {
        match interp.env.functions.lookup(&name) {
            Some(def) => {
                if names_only {
                    println!("declare -f {}", name);
                } else {
                    println!("{}", def.text);
                }
            }
            None => status = 1,
        }
    }
    Ok(ExecOutcome::status(status))
}

/// One `declare -p` line.
pub fn declare_p_line(name: &str, value: Option<&Value>, attrs: Attributes) -> String {
    let flags = attrs.flag_string(value);
    match value {
        None => format!("declare {} {}", flags, name),
        Some(Value::Scalar(s)) => format!("declare {} {}={}", flags, name, quote_declare(s)),
        Some(Value::Indexed(map)) => {
            let body: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("[{}]={}", k, quote_declare(v)))
                .collect();
            format!("declare {} {}=({})", flags, name, body.join(" "))
        }
        Some(Value::Assoc(map)) => {
            let body: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("[{}]={}", quote_declare(k), quote_declare(v)))
                .collect();
            format!("declare {} {}=({})", flags, name, body.join(" "))
        }
    }
}

fn quote_declare(s: &str) -> String {
    let mut out = String::from("\"");
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_p_line() {
        let attrs = Attributes { readonly: true, ..Default::default() };
        assert_eq!(
            declare_p_line("x", Some(&Value::scalar("a\"b")), attrs),
            "declare -r x=\"a\\\"b\""
        );
        let arr = Value::indexed_from(vec!["1".into(), "2".into()]);
        assert_eq!(
            declare_p_line("a", Some(&arr), Attributes::default()),
            "declare -a a=([0]=\"1\" [1]=\"2\")"
        );
    }
}

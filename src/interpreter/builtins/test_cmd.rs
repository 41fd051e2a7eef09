//! test / [ - POSIX conditional evaluation over plain arguments.
//!
//! Unlike `[[ ]]`, everything here arrives already expanded; this is a
//! tiny recursive-descent evaluator over the argv with `-a`, `-o`, `!`
//! and parentheses.

use crate::ast::types::CondBinaryOp;
use crate::interpreter::builtins::usage_error;
use crate::interpreter::conditionals::{binary_file_test, unary_file_test};
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_test(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    run_test(interp, args)
}

pub fn handle_bracket(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    match args.last() {
        Some(close) if close == "]" => run_test(interp, &args[..args.len() - 1]),
        _ => usage_error(interp, "[: missing `]'"),
    }
}

fn run_test(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    if args.is_empty() {
        return Ok(ExecOutcome::status(1));
    }
    let mut p = TestParser { interp, args, pos: 0 };
    match p.parse_or() {
        Ok(result) => {
            if p.pos != args.len() {
                let msg = format!("test: {}: unexpected operand", args[p.pos]);
                p.interp.diagnostic(&msg);
                return Ok(ExecOutcome::status(2));
            }
            Ok(ExecOutcome::status(if result { 0 } else { 1 }))
        }
        Err(msg) => {
            p.interp.diagnostic(&format!("test: {}", msg));
            Ok(ExecOutcome::status(2))
        }
    }
}

struct TestParser<'a> {
    interp: &'a mut Interpreter,
    args: &'a [String],
    pos: usize,
}

impl<'a> TestParser<'a> {
    fn peek(&self) -> Option<&str> {
        self.args.get(self.pos).map(|s| s.as_str())
    }

    fn next(&mut self) -> Option<&'a str> {
        let v = self.args.get(self.pos).map(|s| s.as_str());
        if v.is_some() {
            self.pos += 1;
        }
        v
    }

    fn parse_or(&mut self) -> Result<bool, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some("-o") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = left || right;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<bool, String> {
        let mut left = self.parse_not()?;
        while self.peek() == Some("-a") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = left && right;
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<bool, String> {
        // `!` is negation only when an operand follows.
        if self.peek() == Some("!") && self.pos + 1 < self.args.len() {
            self.pos += 1;
            return Ok(!self.parse_not()?);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<bool, String> {
        if self.peek() == Some("(") {
            self.pos += 1;
            let inner = self.parse_or()?;
            match self.next() {
                Some(")") => return Ok(inner),
                _ => return Err("missing `)'".to_string()),
            }
        }

        let first = self.next().ok_or_else(|| "argument expected".to_string())?;

        // Binary operator?
        if let Some(op) = self.peek().and_then(binary_op) {
            // Not when this would consume the closing of `( x )`.
            let second_is_operand = self.pos + 1 < self.args.len();
            if second_is_operand {
                self.pos += 1;
                let right = self.next().ok_or_else(|| "argument expected".to_string())?;
                return self.eval_binary(op, first, right);
            }
        }

        // Unary operator with operand.
        if first.len() == 2 && first.starts_with('-') && self.peek().is_some() {
            let op = first.chars().nth(1).unwrap_or(' ');
            if "abcdefghkprstuwxGLNOSozvn".contains(op) {
                let operand = self.next().unwrap_or("");
                return Ok(self.eval_unary(op, operand));
            }
        }

        // Bare string: true when non-empty.
        Ok(!first.is_empty())
    }

    fn eval_unary(&mut self, op: char, operand: &str) -> bool {
        match op {
            'z' => operand.is_empty(),
            'n' => !operand.is_empty(),
            'o' => self.interp.env.options.query(operand).unwrap_or(false),
            'v' => self.interp.env.is_set(operand),
            't' => {
                let fd: i32 = operand.parse().unwrap_or(-1);
                fd >= 0 && nix::unistd::isatty(fd).unwrap_or(false)
            }
            _ => unary_file_test(op, operand),
        }
    }

    fn eval_binary(&mut self, op: &str, left: &str, right: &str) -> Result<bool, String> {
        match op {
            "=" | "==" => Ok(left == right),
            "!=" => Ok(left != right),
            "<" => Ok(left < right),
            ">" => Ok(left > right),
            "-nt" => Ok(binary_file_test(CondBinaryOp::NewerThan, left, right)),
            "-ot" => Ok(binary_file_test(CondBinaryOp::OlderThan, left, right)),
            "-ef" => Ok(binary_file_test(CondBinaryOp::SameFile, left, right)),
            _ => {
                let l = parse_test_int(left)?;
                let r = parse_test_int(right)?;
                Ok(match op {
                    "-eq" => l == r,
                    "-ne" => l != r,
                    "-lt" => l < r,
                    "-le" => l <= r,
                    "-gt" => l > r,
                    "-ge" => l >= r,
                    _ => return Err(format!("{}: binary operator expected", op)),
                })
            }
        }
    }
}

fn binary_op(s: &str) -> Option<&'static str> {
    const OPS: &[&str] = &[
        "=", "==", "!=", "<", ">", "-eq", "-ne", "-lt", "-le", "-gt", "-ge", "-nt", "-ot", "-ef",
    ];
    OPS.iter().find(|op| **op == s).copied()
}

fn parse_test_int(s: &str) -> Result<i64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("{}: integer expression expected", s))
}

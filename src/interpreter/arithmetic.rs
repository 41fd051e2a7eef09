//! Arithmetic evaluation over the environment.
//!
//! Signed 64-bit with two's-complement wrapping. Bare identifiers read
//! the environment; a scalar value that is itself an expression is
//! evaluated recursively (depth-limited). Assignments and `++`/`--`
//! write back through the environment.

use crate::ast::types::{
    ArithBinaryOp, ArithExpr, ArithExprNode, ArithLvalue, ArithUnaryOp,
};
use crate::environment::value::Value;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::parser::arithmetic_parser::{number_from_str, parse_arith};

const MAX_RECURSION: u32 = 128;

impl Interpreter {
    pub fn eval_arith(&mut self, node: &ArithExprNode) -> Result<i64, ExecError> {
        self.eval_arith_expr(&node.expr, 0)
    }

    fn eval_arith_expr(&mut self, expr: &ArithExpr, depth: u32) -> Result<i64, ExecError> {
        if depth > MAX_RECURSION {
            return Err(ExecError::Arith("expression recursion level exceeded".into()));
        }
        match expr {
            ArithExpr::Number(n) => Ok(*n),
            ArithExpr::Var(lv) => self.arith_read(lv, depth),
            ArithExpr::Unary { op, operand } => {
                let v = self.eval_arith_expr(operand, depth + 1)?;
                Ok(match op {
                    ArithUnaryOp::Neg => v.wrapping_neg(),
                    ArithUnaryOp::Pos => v,
                    ArithUnaryOp::Not => (v == 0) as i64,
                    ArithUnaryOp::BitNot => !v,
                })
            }
            ArithExpr::IncDec { inc, prefix, target } => {
                let old = self.arith_read(target, depth)?;
                let new = if *inc { old.wrapping_add(1) } else { old.wrapping_sub(1) };
                self.arith_write(target, new)?;
                Ok(if *prefix { new } else { old })
            }
            ArithExpr::Binary { op, left, right } => match op {
                ArithBinaryOp::LogAnd => {
                    let l = self.eval_arith_expr(left, depth + 1)?;
                    if l == 0 {
                        return Ok(0);
                    }
                    Ok((self.eval_arith_expr(right, depth + 1)? != 0) as i64)
                }
                ArithBinaryOp::LogOr => {
                    let l = self.eval_arith_expr(left, depth + 1)?;
                    if l != 0 {
                        return Ok(1);
                    }
                    Ok((self.eval_arith_expr(right, depth + 1)? != 0) as i64)
                }
                ArithBinaryOp::Comma => {
                    self.eval_arith_expr(left, depth + 1)?;
                    self.eval_arith_expr(right, depth + 1)
                }
                _ => {
                    let l = self.eval_arith_expr(left, depth + 1)?;
                    let r = self.eval_arith_expr(right, depth + 1)?;
                    apply_binary(*op, l, r)
                }
            },
            ArithExpr::Ternary { cond, then, otherwise } => {
                if self.eval_arith_expr(cond, depth + 1)? != 0 {
                    self.eval_arith_expr(then, depth + 1)
                } else {
                    self.eval_arith_expr(otherwise, depth + 1)
                }
            }
            ArithExpr::Assign { op, target, value } => {
                let rhs = self.eval_arith_expr(value, depth + 1)?;
                let new = match op {
                    None => rhs,
                    Some(binop) => {
                        let old = self.arith_read(target, depth)?;
                        apply_binary(*binop, old, rhs)?
                    }
                };
                self.arith_write(target, new)?;
                Ok(new)
            }
            ArithExpr::CmdSubst(script) => {
                let output = self.command_substitute(script)?;
                let trimmed = output.trim();
                if trimmed.is_empty() {
                    return Ok(0);
                }
                number_from_str(trimmed)
                    .ok_or_else(|| ExecError::Arith(format!("invalid number: {}", trimmed)))
            }
        }
    }

    fn arith_read(&mut self, lv: &ArithLvalue, depth: u32) -> Result<i64, ExecError> {
        let text = match (&lv.subscript, &lv.key) {
            (None, None) => match self.env.value_of(&lv.name) {
                Some(v) => v.to_scalar(),
                None => {
                    if self.env.options.nounset {
                        return Err(ExecError::Unbound(lv.name.clone()));
                    }
                    return Ok(0);
                }
            },
            _ => self.arith_element(lv, depth)?,
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        if let Some(n) = number_from_str(trimmed) {
            return Ok(n);
        }
        // A scalar holding an expression evaluates recursively.
        let node = parse_arith(trimmed, 0).map_err(|e| ExecError::Arith(e.message))?;
        self.eval_arith_expr(&node.expr, depth + 1)
    }

    fn arith_element(&mut self, lv: &ArithLvalue, depth: u32) -> Result<String, ExecError> {
        match self.env.value_of(&lv.name) {
            Some(Value::Assoc(map)) => {
                let key = match &lv.key {
                    Some(raw) => self.expand_subscript_key(raw)?,
                    None => String::new(),
                };
                Ok(map.get(&key).cloned().unwrap_or_default())
            }
            Some(Value::Indexed(map)) => {
                let mut idx = match &lv.subscript {
                    Some(e) => self.eval_arith_expr(e, depth + 1)?,
                    None => 0,
                };
                if idx < 0 {
                    idx += map.keys().next_back().copied().unwrap_or(-1) + 1;
                }
                Ok(map.get(&idx).cloned().unwrap_or_default())
            }
            Some(Value::Scalar(s)) => {
                let idx = match &lv.subscript {
                    Some(e) => self.eval_arith_expr(e, depth + 1)?,
                    None => 0,
                };
                Ok(if idx == 0 { s } else { String::new() })
            }
            None => Ok(String::new()),
        }
    }

    fn arith_write(&mut self, lv: &ArithLvalue, value: i64) -> Result<(), ExecError> {
        let text = value.to_string();
        match (&lv.subscript, &lv.key) {
            (None, None) => {
                self.env.set_scalar(&lv.name, text)?;
            }
            _ => {
                let is_assoc = matches!(self.env.value_of(&lv.name), Some(Value::Assoc(_)));
                if is_assoc {
                    let key = match &lv.key {
                        Some(raw) => self.expand_subscript_key(raw)?,
                        None => String::new(),
                    };
                    self.env.set_element(&lv.name, &key, 0, &text)?;
                } else {
                    let idx = match &lv.subscript {
                        Some(e) => self.eval_arith_expr(e, 0)?,
                        None => 0,
                    };
                    self.env.set_element(&lv.name, "", idx, &text)?;
                }
            }
        }
        Ok(())
    }
}

fn apply_binary(op: ArithBinaryOp, l: i64, r: i64) -> Result<i64, ExecError> {
    Ok(match op {
        ArithBinaryOp::Add => l.wrapping_add(r),
        ArithBinaryOp::Sub => l.wrapping_sub(r),
        ArithBinaryOp::Mul => l.wrapping_mul(r),
        ArithBinaryOp::Div => {
            if r == 0 {
                return Err(ExecError::Arith("division by 0".into()));
            }
            l.wrapping_div(r)
        }
        ArithBinaryOp::Mod => {
            if r == 0 {
                return Err(ExecError::Arith("division by 0".into()));
            }
            l.wrapping_rem(r)
        }
        ArithBinaryOp::Pow => {
            if r < 0 {
                return Err(ExecError::Arith("exponent less than 0".into()));
            }
            let mut result: i64 = 1;
            let mut base = l;
            let mut exp = r as u64;
            while exp > 0 {
                if exp & 1 == 1 {
                    result = result.wrapping_mul(base);
                }
                base = base.wrapping_mul(base);
                exp >>= 1;
            }
            result
        }
        ArithBinaryOp::Shl => l.wrapping_shl(r as u32),
        ArithBinaryOp::Shr => l.wrapping_shr(r as u32),
        ArithBinaryOp::Lt => (l < r) as i64,
        ArithBinaryOp::Le => (l <= r) as i64,
        ArithBinaryOp::Gt => (l > r) as i64,
        ArithBinaryOp::Ge => (l >= r) as i64,
        ArithBinaryOp::Eq => (l == r) as i64,
        ArithBinaryOp::Ne => (l != r) as i64,
        ArithBinaryOp::BitAnd => l & r,
        ArithBinaryOp::BitXor => l ^ r,
        ArithBinaryOp::BitOr => l | r,
        ArithBinaryOp::LogAnd | ArithBinaryOp::LogOr | ArithBinaryOp::Comma => unreachable!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(interp: &mut Interpreter, s: &str) -> i64 {
        let node = parse_arith(s, 1).unwrap();
        interp.eval_arith(&node).unwrap()
    }

    #[test]
    fn test_basic_arithmetic() {
        let mut i = Interpreter::new();
        assert_eq!(eval(&mut i, "1 + 2 * 3"), 7);
        assert_eq!(eval(&mut i, "(1 + 2) * 3"), 9);
        assert_eq!(eval(&mut i, "7 % 3"), 1);
        assert_eq!(eval(&mut i, "2 ** 10"), 1024);
        assert_eq!(eval(&mut i, "1 << 4"), 16);
        assert_eq!(eval(&mut i, "5 > 3 && 2 < 4"), 1);
        assert_eq!(eval(&mut i, "!5"), 0);
        assert_eq!(eval(&mut i, "~0"), -1);
    }

    #[test]
    fn test_wrapping_overflow() {
        let mut i = Interpreter::new();
        // 2^62 + 2^62 wraps to i64::MIN.
        assert_eq!(eval(&mut i, "2**62 + 2**62"), i64::MIN);
    }

    #[test]
    fn test_variables_and_assignment() {
        let mut i = Interpreter::new();
        i.env.set_scalar("x", "5").unwrap();
        assert_eq!(eval(&mut i, "x * 3"), 15);
        assert_eq!(eval(&mut i, "x *= 3"), 15);
        assert_eq!(i.env.get_scalar("x").as_deref(), Some("15"));
        assert_eq!(eval(&mut i, "y = x + 1"), 16);
        assert_eq!(i.env.get_scalar("y").as_deref(), Some("16"));
    }

    #[test]
    fn test_unset_is_zero() {
        let mut i = Interpreter::new();
        assert_eq!(eval(&mut i, "unsetvar + 1"), 1);
    }

    #[test]
    fn test_recursive_value() {
        let mut i = Interpreter::new();
        i.env.set_scalar("e", "1+2").unwrap();
        assert_eq!(eval(&mut i, "e * 2"), 6);
    }

    #[test]
    fn test_inc_dec() {
        let mut i = Interpreter::new();
        i.env.set_scalar("n", "5").unwrap();
        assert_eq!(eval(&mut i, "n++"), 5);
        assert_eq!(i.env.get_scalar("n").as_deref(), Some("6"));
        assert_eq!(eval(&mut i, "++n"), 7);
        assert_eq!(eval(&mut i, "--n, n"), 6);
    }

    #[test]
    fn test_ternary_lazy() {
        let mut i = Interpreter::new();
        // The false branch would divide by zero if evaluated.
        assert_eq!(eval(&mut i, "1 ? 5 : 1/0"), 5);
    }

    #[test]
    fn test_division_by_zero() {
        let mut i = Interpreter::new();
        let node = parse_arith("1/0", 1).unwrap();
        assert!(matches!(i.eval_arith(&node), Err(ExecError::Arith(_))));
    }

    #[test]
    fn test_array_elements() {
        let mut i = Interpreter::new();
        i.env
            .set_value(
                "a",
                Value::indexed_from(vec!["10".into(), "20".into(), "30".into()]),
                crate::environment::SetScope::Normal,
            )
            .unwrap();
        assert_eq!(eval(&mut i, "a[1] + a[2]"), 50);
        assert_eq!(eval(&mut i, "a[-1]"), 30);
        assert_eq!(eval(&mut i, "a[0]++"), 10);
        assert_eq!(eval(&mut i, "a[0]"), 11);
    }
}

//! `[[ ... ]]` evaluation and the file/string/numeric test primitives
//! shared with the `test` / `[` builtins.

use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};

use regex_lite::Regex;

use crate::ast::types::{CondBinaryOp, CondExprNode, WordNode};
use crate::interpreter::errors::ExecError;
use crate::interpreter::expansion::pattern::pattern_matches;
use crate::interpreter::interpreter::Interpreter;

impl Interpreter {
    /// Evaluate a `[[ ]]` expression to a boolean.
    pub fn eval_cond(&mut self, expr: &CondExprNode) -> Result<bool, ExecError> {
        match expr {
            CondExprNode::And(l, r) => Ok(self.eval_cond(l)? && self.eval_cond(r)?),
            CondExprNode::Or(l, r) => Ok(self.eval_cond(l)? || self.eval_cond(r)?),
            CondExprNode::Not(e) => Ok(!self.eval_cond(e)?),
            CondExprNode::Word(w) => {
                let text = self.expand_word_unsplit(w)?;
                Ok(!text.is_empty())
            }
            CondExprNode::Unary { op, operand } => self.eval_cond_unary(*op, operand),
            CondExprNode::Binary { op, left, right } => self.eval_cond_binary(*op, left, right),
        }
    }

    fn eval_cond_unary(&mut self, op: char, operand: &WordNode) -> Result<bool, ExecError> {
        match op {
            'o' => {
                let name = self.expand_word_unsplit(operand)?;
                Ok(self.env.options.query(&name).unwrap_or(false))
            }
            'v' => {
                let name = self.expand_word_unsplit(operand)?;
                Ok(self.env.is_set(&name))
            }
            'z' => {
                let text = self.expand_word_unsplit(operand)?;
                Ok(text.is_empty())
            }
            'n' => {
                let text = self.expand_word_unsplit(operand)?;
                Ok(!text.is_empty())
            }
            't' => {
                let text = self.expand_word_unsplit(operand)?;
                let fd: i32 = text.parse().unwrap_or(-1);
                Ok(fd >= 0 && nix::unistd::isatty(fd).unwrap_or(false))
            }
            _ => {
                let path = self.expand_word_unsplit(operand)?;
                Ok(unary_file_test(op, &path))
            }
        }
    }

    fn eval_cond_binary(
        &mut self,
        op: CondBinaryOp,
        left: &WordNode,
        right: &WordNode,
    ) -> Result<bool, ExecError> {
        match op {
            CondBinaryOp::Eq | CondBinaryOp::Ne => {
                let subject = self.expand_word_unsplit(left)?;
                let pattern = self.expand_pattern_word(right)?;
                let matched = pattern_matches(&pattern, &subject, self.env.options.nocasematch);
                Ok(if op == CondBinaryOp::Eq { matched } else { !matched })
            }
            CondBinaryOp::Match => {
                let subject = self.expand_word_unsplit(left)?;
                let regex_src = self.regex_text(right)?;
                let regex = Regex::new(&regex_src)
                    .map_err(|_| ExecError::Expansion(format!("invalid regex: {}", regex_src)))?;
                match regex.captures(&subject) {
                    Some(caps) => {
                        self.env.rematch = caps
                            .iter()
                            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                            .collect();
                        Ok(true)
                    }
                    None => {
                        self.env.rematch.clear();
                        Ok(false)
                    }
                }
            }
            CondBinaryOp::Lt | CondBinaryOp::Gt => {
                let l = self.expand_word_unsplit(left)?;
                let r = self.expand_word_unsplit(right)?;
                Ok(if op == CondBinaryOp::Lt { l < r } else { l > r })
            }
            CondBinaryOp::NumEq
            | CondBinaryOp::NumNe
            | CondBinaryOp::NumLt
            | CondBinaryOp::NumLe
            | CondBinaryOp::NumGt
            | CondBinaryOp::NumGe => {
                // Operands of the numeric comparators are arithmetic.
                let l = self.cond_arith(left)?;
                let r = self.cond_arith(right)?;
                Ok(match op {
                    CondBinaryOp::NumEq => l == r,
                    CondBinaryOp::NumNe => l != r,
                    CondBinaryOp::NumLt => l < r,
                    CondBinaryOp::NumLe => l <= r,
                    CondBinaryOp::NumGt => l > r,
                    _ => l >= r,
                })
            }
            CondBinaryOp::NewerThan | CondBinaryOp::OlderThan | CondBinaryOp::SameFile => {
                let l = self.expand_word_unsplit(left)?;
                let r = self.expand_word_unsplit(right)?;
                Ok(binary_file_test(op, &l, &r))
            }
        }
    }

    fn cond_arith(&mut self, word: &WordNode) -> Result<i64, ExecError> {
        let text = self.expand_word_unsplit(word)?;
        let node = crate::parser::arithmetic_parser::parse_arith(&text, 0)
            .map_err(|e| ExecError::Arith(e.message))?;
        self.eval_arith(&node)
    }

    /// `=~` right side: quoted segments match literally, the rest is raw
    /// regex syntax.
    fn regex_text(&mut self, word: &WordNode) -> Result<String, ExecError> {
        let escaped = self.expand_pattern_word(word)?;
        let chars: Vec<char> = escaped.chars().collect();
        let mut out = String::new();
        let mut i = 0usize;
        while i < chars.len() {
            if chars[i] == '\\' && i + 1 < chars.len() {
                let c = chars[i + 1];
                if c.is_ascii_alphanumeric() {
                    out.push(c);
                } else {
                    out.push('\\');
                    out.push(c);
                }
                i += 2;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        Ok(out)
    }
}

/// One-argument file tests shared between `[[ ]]` and `test`.
pub fn unary_file_test(op: char, path: &str) -> bool {
    use std::fs;
    let md = fs::metadata(path);
    let lmd = fs::symlink_metadata(path);
    match op {
        'e' | 'a' => md.is_ok() || lmd.is_ok(),
        'f' => md.map(|m| m.is_file()).unwrap_or(false),
        'd' => md.map(|m| m.is_dir()).unwrap_or(false),
        'h' | 'L' => lmd.map(|m| m.file_type().is_symlink()).unwrap_or(false),
        's' => md.map(|m| m.len() > 0).unwrap_or(false),
        'r' => nix::unistd::access(path, nix::unistd::AccessFlags::R_OK).is_ok(),
        'w' => nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok(),
        'x' => nix::unistd::access(path, nix::unistd::AccessFlags::X_OK).is_ok(),
        'b' => md.map(|m| m.file_type().is_block_device()).unwrap_or(false),
        'c' => md.map(|m| m.file_type().is_char_device()).unwrap_or(false),
        'p' => md.map(|m| m.file_type().is_fifo()).unwrap_or(false),
        'S' => md.map(|m| m.file_type().is_socket()).unwrap_or(false),
        'g' => md.map(|m| m.permissions().mode() & 0o2000 != 0).unwrap_or(false),
        'u' => md.map(|m| m.permissions().mode() & 0o4000 != 0).unwrap_or(false),
        'k' => md.map(|m| m.permissions().mode() & 0o1000 != 0).unwrap_or(false),
        'O' => md.map(|m| m.uid() == nix::unistd::geteuid().as_raw()).unwrap_or(false),
        'G' => md.map(|m| m.gid() == nix::unistd::getegid().as_raw()).unwrap_or(false),
        'N' => md.map(|m| m.mtime() > m.atime()).unwrap_or(false),
        _ => false,
    }
}

/// `-nt`, `-ot`, `-ef`.
pub fn binary_file_test(op: CondBinaryOp, left: &str, right: &str) -> bool {
    use std::fs;
    let l = fs::metadata(left);
    let r = fs::metadata(right);
    match op {
        CondBinaryOp::NewerThan => match (l, r) {
            (Ok(l), Ok(r)) => l.mtime() > r.mtime(),
            (Ok(_), Err(_)) => true,
            _ => false,
        },
        CondBinaryOp::OlderThan => match (l, r) {
            (Ok(l), Ok(r)) => l.mtime() < r.mtime(),
            (Err(_), Ok(_)) => true,
            _ => false,
        },
        CondBinaryOp::SameFile => match (l, r) {
            (Ok(l), Ok(r)) => l.dev() == r.dev() && l.ino() == r.ino(),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_tests() {
        assert!(unary_file_test('e', "/"));
        assert!(unary_file_test('d', "/"));
        assert!(!unary_file_test('f', "/"));
        assert!(!unary_file_test('e', "/no/such/path"));
    }

    #[test]
    fn test_same_file() {
        assert!(binary_file_test(CondBinaryOp::SameFile, "/", "/"));
        assert!(!binary_file_test(CondBinaryOp::SameFile, "/", "/tmp"));
    }
}

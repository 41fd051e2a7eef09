//! `[[ ... ]]` conditional expression grammar.
//!
//! Inside the brackets `&&`, `||`, `!` and parentheses combine tests;
//! `<` and `>` arrive as operator tokens and mean lexicographic
//! comparison; everything else is word material.

use crate::ast::types::{CondBinaryOp, CondExprNode, WordNode};
use crate::parser::lexer::TokenType;
use crate::parser::parser::Parser;
use crate::parser::types::ParseError;
use crate::parser::word_parser::parse_word;

const UNARY_OPS: &str = "abcdefghkprstuwxGLNOSozvnR";

impl Parser {
    pub(crate) fn parse_cond(&mut self) -> Result<CondExprNode, ParseError> {
        self.parse_cond_or()
    }

    fn parse_cond_or(&mut self) -> Result<CondExprNode, ParseError> {
        let mut left = self.parse_cond_and()?;
        loop {
            self.skip_newlines();
            if self.cur_type() != TokenType::OrOr {
                break;
            }
            self.advance();
            self.skip_newlines();
            let right = self.parse_cond_and()?;
            left = CondExprNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_and(&mut self) -> Result<CondExprNode, ParseError> {
        let mut left = self.parse_cond_not()?;
        loop {
            self.skip_newlines();
            if self.cur_type() != TokenType::AndAnd {
                break;
            }
            self.advance();
            self.skip_newlines();
            let right = self.parse_cond_not()?;
            left = CondExprNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_not(&mut self) -> Result<CondExprNode, ParseError> {
        self.skip_newlines();
        if self.cond_word_is("!") {
            self.advance();
            let operand = self.parse_cond_not()?;
            return Ok(CondExprNode::Not(Box::new(operand)));
        }
        if self.cur_type() == TokenType::LParen {
            self.advance();
            let inner = self.parse_cond()?;
            self.skip_newlines();
            self.expect(TokenType::RParen)?;
            return Ok(inner);
        }
        self.parse_cond_primary()
    }

    fn parse_cond_primary(&mut self) -> Result<CondExprNode, ParseError> {
        // Unary operator with an operand following.
        if let Some(op) = self.cond_unary_op() {
            if self.cond_operand_follows(1) {
                self.advance();
                let operand = self.cond_word()?;
                return Ok(CondExprNode::Unary { op, operand });
            }
        }

        let left = self.cond_word()?;
        let binop = match self.cur_type() {
            TokenType::Less => Some(CondBinaryOp::Lt),
            TokenType::Great => Some(CondBinaryOp::Gt),
            TokenType::Word => match self.cur().value.as_str() {
                "=" | "==" => Some(CondBinaryOp::Eq),
                "!=" => Some(CondBinaryOp::Ne),
                "=~" => Some(CondBinaryOp::Match),
                "-eq" => Some(CondBinaryOp::NumEq),
                "-ne" => Some(CondBinaryOp::NumNe),
                "-lt" => Some(CondBinaryOp::NumLt),
                "-le" => Some(CondBinaryOp::NumLe),
                "-gt" => Some(CondBinaryOp::NumGt),
                "-ge" => Some(CondBinaryOp::NumGe),
                "-nt" => Some(CondBinaryOp::NewerThan),
                "-ot" => Some(CondBinaryOp::OlderThan),
                "-ef" => Some(CondBinaryOp::SameFile),
                _ => None,
            },
            _ => None,
        };
        match binop {
            Some(op) => {
                self.advance();
                let right = if op == CondBinaryOp::Match {
                    self.cond_regex_word()?
                } else {
                    self.cond_word()?
                };
                Ok(CondExprNode::Binary { op, left, right })
            }
            None => Ok(CondExprNode::Word(left)),
        }
    }

    /// The right side of `=~` is raw regex text: parens, `|` and friends
    /// arrive as operator tokens, so take the source slice up to the next
    /// connective or `]]` (balancing parentheses).
    fn cond_regex_word(&mut self) -> Result<WordNode, ParseError> {
        let start_token = self.cur().clone();
        let start = start_token.start;
        let mut end = start;
        let mut depth = 0i32;
        let mut consumed = 0usize;
        loop {
            match self.cur_type() {
                TokenType::DBrackEnd | TokenType::AndAnd | TokenType::OrOr
                | TokenType::Newline | TokenType::Eof => break,
                TokenType::LParen => depth += 1,
                TokenType::RParen => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            let t = self.advance();
            end = t.end;
            consumed += 1;
        }
        if consumed == 0 {
            return Err(self.unexpected("expected a regular expression"));
        }
        let text = self.source_slice(start, end);
        parse_word(text.trim_end(), start_token.line, false)
    }

    fn cond_word_is(&self, s: &str) -> bool {
        self.cur_type() == TokenType::Word && !self.cur().quoted && self.cur().value == s
    }

    fn cond_unary_op(&self) -> Option<char> {
        if self.cur_type() != TokenType::Word || self.cur().quoted {
            return None;
        }
        let v = &self.cur().value;
        let mut chars = v.chars();
        if chars.next() != Some('-') {
            return None;
        }
        let op = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        UNARY_OPS.contains(op).then_some(op)
    }

    /// A word-ish token `n` ahead that can serve as an operand.
    fn cond_operand_follows(&self, n: usize) -> bool {
        matches!(
            self.tokens.get(self.pos + n).map(|t| t.token_type),
            Some(TokenType::Word) | Some(TokenType::AssignmentWord) | Some(TokenType::Number)
        )
    }

    fn cond_word(&mut self) -> Result<WordNode, ParseError> {
        match self.cur_type() {
            TokenType::Word | TokenType::AssignmentWord | TokenType::Number => {
                let t = self.advance();
                parse_word(&t.value, t.line, false)
            }
            _ => Err(self.unexpected("expected a conditional operand")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{CommandNode, CompoundCommandNode};
    use crate::parser::parse_script;

    fn cond(src: &str) -> CondExprNode {
        let s = parse_script(src, None).unwrap();
        match &s.lists[0].items[0].first.stages[0] {
            CommandNode::Compound(CompoundCommandNode::Cond(c)) => c.expression.clone(),
            other => panic!("expected cond command, got {:?}", other),
        }
    }

    #[test]
    fn test_unary() {
        assert!(matches!(cond("[[ -f /etc/passwd ]]"), CondExprNode::Unary { op: 'f', .. }));
        assert!(matches!(cond("[[ -z $x ]]"), CondExprNode::Unary { op: 'z', .. }));
    }

    #[test]
    fn test_binary() {
        assert!(matches!(
            cond("[[ $a == b* ]]"),
            CondExprNode::Binary { op: CondBinaryOp::Eq, .. }
        ));
        assert!(matches!(
            cond("[[ $a =~ ^h.*o$ ]]"),
            CondExprNode::Binary { op: CondBinaryOp::Match, .. }
        ));
        assert!(matches!(
            cond("[[ 1 -lt 2 ]]"),
            CondExprNode::Binary { op: CondBinaryOp::NumLt, .. }
        ));
    }

    #[test]
    fn test_lexicographic() {
        assert!(matches!(
            cond("[[ a < b ]]"),
            CondExprNode::Binary { op: CondBinaryOp::Lt, .. }
        ));
    }

    #[test]
    fn test_connectives() {
        assert!(matches!(cond("[[ -n $a && -n $b ]]"), CondExprNode::And(..)));
        assert!(matches!(cond("[[ -n $a || -n $b ]]"), CondExprNode::Or(..)));
        assert!(matches!(cond("[[ ! -f x ]]"), CondExprNode::Not(_)));
        assert!(matches!(cond("[[ ( -n $a || -n $b ) && -n $c ]]"), CondExprNode::And(..)));
    }

    #[test]
    fn test_bare_word() {
        assert!(matches!(cond("[[ $x ]]"), CondExprNode::Word(_)));
        // A lone `-f` is a non-empty word, not an operator.
        assert!(matches!(cond("[[ -f ]]"), CondExprNode::Word(_)));
    }
}

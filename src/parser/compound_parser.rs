//! Compound commands and function definitions.

use crate::ast::types::*;
use crate::parser::lexer::TokenType;
use crate::parser::parser::Parser;
use crate::parser::types::{is_valid_name, ParseError};
use crate::parser::word_parser::parse_word;
use crate::parser::arithmetic_parser::parse_arith;

impl Parser {
    pub(crate) fn parse_compound(&mut self) -> Result<CommandNode, ParseError> {
        let node = match self.cur_type() {
            TokenType::If => CompoundCommandNode::If(self.parse_if()?),
            TokenType::While => CompoundCommandNode::While(self.parse_while(false)?),
            TokenType::Until => CompoundCommandNode::While(self.parse_while(true)?),
            TokenType::For => self.parse_for()?,
            TokenType::Case => CompoundCommandNode::Case(self.parse_case()?),
            TokenType::LParen => CompoundCommandNode::Subshell(self.parse_subshell()?),
            TokenType::LBrace => CompoundCommandNode::Group(self.parse_group()?),
            TokenType::DParenStart => CompoundCommandNode::Arith(self.parse_arith_command()?),
            TokenType::DBrackStart => CompoundCommandNode::Cond(self.parse_cond_command()?),
            _ => return Err(self.unexpected("expected a compound command")),
        };
        Ok(CommandNode::Compound(node))
    }

    fn parse_if(&mut self) -> Result<IfNode, ParseError> {
        self.expect(TokenType::If)?;
        let mut branches = Vec::new();
        let cond = self.parse_list(&[TokenType::Then])?;
        self.expect(TokenType::Then)?;
        let body = self.parse_list(&[TokenType::Elif, TokenType::Else, TokenType::Fi])?;
        branches.push((cond, body));
        while self.cur_type() == TokenType::Elif {
            self.advance();
            let cond = self.parse_list(&[TokenType::Then])?;
            self.expect(TokenType::Then)?;
            let body = self.parse_list(&[TokenType::Elif, TokenType::Else, TokenType::Fi])?;
            branches.push((cond, body));
        }
        let else_body = if self.cur_type() == TokenType::Else {
            self.advance();
            Some(self.parse_list(&[TokenType::Fi])?)
        } else {
            None
        };
        self.expect(TokenType::Fi)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(IfNode { branches, else_body, redirections })
    }

    fn parse_while(&mut self, until: bool) -> Result<WhileNode, ParseError> {
        self.advance(); // while / until
        let condition = self.parse_list(&[TokenType::Do])?;
        self.expect(TokenType::Do)?;
        let body = self.parse_list(&[TokenType::Done])?;
        self.expect(TokenType::Done)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(WhileNode { condition, body, until, redirections })
    }

    fn parse_for(&mut self) -> Result<CompoundCommandNode, ParseError> {
        self.expect(TokenType::For)?;

        // C-style: for ((init; cond; post))
        if self.cur_type() == TokenType::DParenStart {
            self.advance();
            let text = if self.cur_type() == TokenType::ArithText {
                self.advance().value
            } else {
                String::new()
            };
            let line = self.cur().line;
            self.expect(TokenType::DParenEnd)?;
            let sections = split_cfor_sections(&text);
            if sections.len() != 3 {
                return Err(ParseError::new(
                    "syntax error: expected `((init; cond; post))'",
                    line,
                    0,
                ));
            }
            let section = |s: &str| -> Result<Option<ArithExprNode>, ParseError> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(parse_arith(trimmed, line)?))
                }
            };
            let init = section(&sections[0])?;
            let condition = section(&sections[1])?;
            let update = section(&sections[2])?;
            if self.cur_type() == TokenType::Semicolon {
                self.advance();
            }
            self.skip_newlines();
            self.expect(TokenType::Do)?;
            let body = self.parse_list(&[TokenType::Done])?;
            self.expect(TokenType::Done)?;
            let redirections = self.parse_trailing_redirections()?;
            return Ok(CompoundCommandNode::CFor(CForNode {
                init,
                condition,
                update,
                body,
                redirections,
            }));
        }

        let name_token = self.expect(TokenType::Word).map_err(|_| self.unexpected("expected a name after `for'"))?;
        if !is_valid_name(&name_token.value) {
            return Err(ParseError::new(
                format!("`{}': not a valid identifier", name_token.value),
                name_token.line,
                name_token.column,
            ));
        }

        self.skip_newlines();
        let words = if self.cur_type() == TokenType::In {
            self.advance();
            let mut words = Vec::new();
            loop {
                match self.cur_type() {
                    TokenType::Word | TokenType::AssignmentWord | TokenType::Number => {
                        let t = self.advance();
                        words.push(parse_word(&t.value, t.line, false)?);
                    }
                    _ => break,
                }
            }
            Some(words)
        } else {
            None
        };
        if self.cur_type() == TokenType::Semicolon {
            self.advance();
        }
        self.skip_newlines();
        self.expect(TokenType::Do)?;
        let body = self.parse_list(&[TokenType::Done])?;
        self.expect(TokenType::Done)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommandNode::For(ForNode {
            variable: name_token.value,
            words,
            body,
            redirections,
        }))
    }

    fn parse_case(&mut self) -> Result<CaseNode, ParseError> {
        self.expect(TokenType::Case)?;
        let subject_token = self.expect(TokenType::Word)?;
        let subject = parse_word(&subject_token.value, subject_token.line, false)?;
        self.skip_newlines();
        self.expect(TokenType::In)?;
        self.skip_newlines();

        let mut clauses = Vec::new();
        loop {
            if self.at_esac() {
                self.advance();
                break;
            }
            if self.cur_type() == TokenType::LParen {
                self.advance();
            }
            let mut patterns = Vec::new();
            loop {
                let t = self.cur().clone();
                match t.token_type {
                    TokenType::Word
                    | TokenType::AssignmentWord
                    | TokenType::Number
                    | TokenType::If
                    | TokenType::Then
                    | TokenType::Else
                    | TokenType::Elif
                    | TokenType::Fi
                    | TokenType::For
                    | TokenType::While
                    | TokenType::Until
                    | TokenType::Do
                    | TokenType::Done
                    | TokenType::Case
                    | TokenType::In
                    | TokenType::Function
                    | TokenType::Bang => {
                        self.advance();
                        patterns.push(parse_word(&t.value, t.line, false)?);
                    }
                    _ => return Err(self.unexpected("expected a case pattern")),
                }
                if self.cur_type() == TokenType::Pipe {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(TokenType::RParen)?;
            self.skip_newlines();

            let stops = [
                TokenType::DSemi,
                TokenType::SemiAnd,
                TokenType::SemiSemiAnd,
                TokenType::Esac,
            ];
            let body = if stops.contains(&self.cur_type()) || self.at_esac() {
                ListNode { items: Vec::new(), separators: Vec::new() }
            } else {
                self.parse_list(&stops)?
            };

            let terminator = match self.cur_type() {
                TokenType::DSemi => {
                    self.advance();
                    CaseTerminator::Break
                }
                TokenType::SemiAnd => {
                    self.advance();
                    CaseTerminator::FallThrough
                }
                TokenType::SemiSemiAnd => {
                    self.advance();
                    CaseTerminator::Continue
                }
                _ => CaseTerminator::Break,
            };
            clauses.push(CaseClauseNode { patterns, body, terminator });
            self.skip_newlines();
        }
        let redirections = self.parse_trailing_redirections()?;
        Ok(CaseNode { subject, clauses, redirections })
    }

    /// `esac` right after `in` is lexed as a plain word; accept both forms.
    fn at_esac(&self) -> bool {
        match self.cur_type() {
            TokenType::Esac => true,
            TokenType::Word => !self.cur().quoted && self.cur().value == "esac",
            _ => false,
        }
    }

    fn parse_subshell(&mut self) -> Result<SubshellNode, ParseError> {
        self.expect(TokenType::LParen)?;
        let body = self.parse_list(&[TokenType::RParen])?;
        self.expect(TokenType::RParen)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(SubshellNode { body, redirections })
    }

    fn parse_group(&mut self) -> Result<GroupNode, ParseError> {
        self.expect(TokenType::LBrace)?;
        let body = self.parse_list(&[TokenType::RBrace])?;
        self.expect(TokenType::RBrace)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(GroupNode { body, redirections })
    }

    fn parse_arith_command(&mut self) -> Result<ArithCommandNode, ParseError> {
        let line = self.cur().line as u32;
        self.expect(TokenType::DParenStart)?;
        let text = if self.cur_type() == TokenType::ArithText {
            self.advance().value
        } else {
            String::new()
        };
        self.expect(TokenType::DParenEnd)?;
        let expression = parse_arith(&text, line as usize)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(ArithCommandNode { expression, redirections, line })
    }

    fn parse_cond_command(&mut self) -> Result<CondCommandNode, ParseError> {
        let line = self.cur().line as u32;
        self.expect(TokenType::DBrackStart)?;
        let expression = self.parse_cond()?;
        self.expect(TokenType::DBrackEnd)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CondCommandNode { expression, redirections, line })
    }

    pub(crate) fn parse_function_def(&mut self) -> Result<CommandNode, ParseError> {
        let start = self.cur().start;
        let name = if self.cur_type() == TokenType::Function {
            self.advance();
            let t = self.expect(TokenType::Word)?;
            if self.cur_type() == TokenType::LParen {
                self.advance();
                self.expect(TokenType::RParen)?;
            }
            t.value
        } else {
            let t = self.expect(TokenType::Word)?;
            self.expect(TokenType::LParen)?;
            self.expect(TokenType::RParen)?;
            t.value
        };
        if !is_valid_name(&name) {
            return Err(ParseError::new(
                format!("`{}': not a valid function name", name),
                self.cur().line,
                self.cur().column,
            ));
        }
        self.skip_newlines();
        let body = self.parse_command()?;
        if matches!(body, CommandNode::Simple(_)) {
            return Err(self.unexpected("function body must be a compound command"));
        }
        let end = self.tokens[self.pos.saturating_sub(1)].end;
        let text = self.source_slice(start, end);
        Ok(CommandNode::FunctionDef(FunctionDefNode {
            name,
            body: Box::new(body),
            redirections: Vec::new(),
            text,
        }))
    }
}

/// Split the `((init; cond; post))` capture on top-level semicolons.
fn split_cfor_sections(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for &c in &chars {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ';' if depth == 0 => sections.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    sections.push(current);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;

    fn first_compound(src: &str) -> CompoundCommandNode {
        let s = parse_script(src, None).unwrap();
        match &s.lists[0].items[0].first.stages[0] {
            CommandNode::Compound(c) => c.clone(),
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn test_if_elif_else() {
        match first_compound("if a; then b; elif c; then d; else e; fi") {
            CompoundCommandNode::If(n) => {
                assert_eq!(n.branches.len(), 2);
                assert!(n.else_body.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_while_and_until() {
        assert!(matches!(
            first_compound("while a; do b; done"),
            CompoundCommandNode::While(WhileNode { until: false, .. })
        ));
        assert!(matches!(
            first_compound("until a; do b; done"),
            CompoundCommandNode::While(WhileNode { until: true, .. })
        ));
    }

    #[test]
    fn test_for_in_words() {
        match first_compound("for x in a b c; do echo $x; done") {
            CompoundCommandNode::For(n) => {
                assert_eq!(n.variable, "x");
                assert_eq!(n.words.as_ref().unwrap().len(), 3);
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_for_without_words() {
        match first_compound("for x; do echo $x; done") {
            CompoundCommandNode::For(n) => assert!(n.words.is_none()),
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_c_style_for() {
        match first_compound("for ((i=0; i<3; i++)); do echo $i; done") {
            CompoundCommandNode::CFor(n) => {
                assert!(n.init.is_some());
                assert!(n.condition.is_some());
                assert!(n.update.is_some());
            }
            other => panic!("expected cfor, got {:?}", other),
        }
    }

    #[test]
    fn test_case_terminators() {
        match first_compound("case $x in a) echo a;; b) echo b;& c) echo c;;& esac") {
            CompoundCommandNode::Case(n) => {
                assert_eq!(n.clauses.len(), 3);
                assert_eq!(n.clauses[0].terminator, CaseTerminator::Break);
                assert_eq!(n.clauses[1].terminator, CaseTerminator::FallThrough);
                assert_eq!(n.clauses[2].terminator, CaseTerminator::Continue);
            }
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn test_case_multiple_patterns() {
        match first_compound("case x in a|b|c) : ;; esac") {
            CompoundCommandNode::Case(n) => assert_eq!(n.clauses[0].patterns.len(), 3),
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_case() {
        match first_compound("case x in esac") {
            CompoundCommandNode::Case(n) => assert!(n.clauses.is_empty()),
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn test_subshell_vs_group() {
        assert!(matches!(first_compound("(a; b)"), CompoundCommandNode::Subshell(_)));
        assert!(matches!(first_compound("{ a; b; }"), CompoundCommandNode::Group(_)));
    }

    #[test]
    fn test_group_trailing_redirection() {
        match first_compound("{ a; b; } >out") {
            CompoundCommandNode::Group(n) => assert_eq!(n.redirections.len(), 1),
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_arith_command() {
        assert!(matches!(first_compound("((x > 1))"), CompoundCommandNode::Arith(_)));
    }

    #[test]
    fn test_function_keyword_form() {
        let s = parse_script("function greet { echo hi; }", None).unwrap();
        match &s.lists[0].items[0].first.stages[0] {
            CommandNode::FunctionDef(f) => {
                assert_eq!(f.name, "greet");
                assert!(f.text.contains("function greet"));
            }
            other => panic!("expected funcdef, got {:?}", other),
        }
    }
}

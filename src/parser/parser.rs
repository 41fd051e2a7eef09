//! Recursive-descent parser: tokens → command tree.
//!
//! Layering: this file owns lists, and-or chains, pipelines, simple
//! commands and redirections; `compound_parser` owns the compound
//! commands and function definitions; `conditional_parser` owns `[[ ]]`.

use std::collections::{HashMap, VecDeque};

use crate::ast::types::*;
use crate::parser::lexer::{Token, TokenType};
use crate::parser::types::{is_valid_name, ParseError, MAX_PARSER_DEPTH};
use crate::parser::word_parser::{parse_heredoc_body, parse_word};

pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) depth: usize,
    /// Original source, for function-definition text capture.
    source: String,
    /// DLess operator token index → collected heredoc body.
    heredoc_bodies: HashMap<usize, String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source: &str) -> Self {
        let heredoc_bodies = match_heredoc_bodies(&tokens);
        Self { tokens, pos: 0, depth: 0, source: source.to_string(), heredoc_bodies }
    }

    // =========================================================================
    // Cursor helpers
    // =========================================================================

    pub(crate) fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn cur_type(&self) -> TokenType {
        self.cur().token_type
    }

    pub(crate) fn advance(&mut self) -> Token {
        let t = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        // Heredoc bodies were consumed by the pre-pass.
        while self.cur_type() == TokenType::HeredocBody {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn expect(&mut self, tt: TokenType) -> Result<Token, ParseError> {
        if self.cur_type() == tt {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected `{}'", tt.as_str())))
        }
    }

    pub(crate) fn unexpected(&self, context: &str) -> ParseError {
        let t = self.cur();
        if t.token_type == TokenType::Eof {
            ParseError::incomplete(
                format!("unexpected end of file ({})", context),
                t.line,
                t.column,
            )
        } else {
            ParseError::new(
                format!("syntax error near unexpected token `{}' ({})", t.value, context),
                t.line,
                t.column,
            )
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while matches!(self.cur_type(), TokenType::Newline | TokenType::HeredocBody) {
            if self.pos >= self.tokens.len() - 1 {
                break;
            }
            self.pos += 1;
        }
    }

    pub(crate) fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            return Err(self.unexpected("maximum nesting depth exceeded"));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn source_slice(&self, start: usize, end: usize) -> String {
        self.source.chars().skip(start).take(end.saturating_sub(start)).collect()
    }

    // =========================================================================
    // Top level
    // =========================================================================

    pub fn parse_script(mut self) -> Result<ScriptNode, ParseError> {
        self.skip_newlines();
        let mut lists = Vec::new();
        if self.cur_type() != TokenType::Eof {
            lists.push(self.parse_list(&[])?);
        }
        if self.cur_type() != TokenType::Eof {
            return Err(self.unexpected("at top level"));
        }
        Ok(ScriptNode { lists })
    }

    /// Parse a list until one of `stops` (or EOF). Newlines separate items
    /// like `;`.
    pub(crate) fn parse_list(&mut self, stops: &[TokenType]) -> Result<ListNode, ParseError> {
        self.enter()?;
        let mut items = Vec::new();
        let mut separators = Vec::new();
        self.skip_newlines();
        loop {
            if self.cur_type() == TokenType::Eof || stops.contains(&self.cur_type()) {
                break;
            }
            items.push(self.parse_and_or()?);
            match self.cur_type() {
                TokenType::Semicolon => {
                    self.advance();
                    separators.push(ListSeparator::Semi);
                }
                TokenType::Amp => {
                    self.advance();
                    separators.push(ListSeparator::Amp);
                }
                TokenType::Newline => {
                    separators.push(ListSeparator::Semi);
                }
                _ => {
                    separators.push(ListSeparator::Semi);
                    break;
                }
            }
            self.skip_newlines();
        }
        self.leave();
        if items.is_empty() {
            return Err(self.unexpected("expected a command"));
        }
        Ok(ListNode { items, separators })
    }

    pub(crate) fn parse_and_or(&mut self) -> Result<AndOrNode, ParseError> {
        let first = self.parse_pipeline()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.cur_type() {
                TokenType::AndAnd => AndOr::And,
                TokenType::OrOr => AndOr::Or,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            rest.push((op, self.parse_pipeline()?));
        }
        Ok(AndOrNode { first, rest })
    }

    pub(crate) fn parse_pipeline(&mut self) -> Result<PipelineNode, ParseError> {
        let mut negated = false;
        while self.cur_type() == TokenType::Bang {
            self.advance();
            negated = !negated;
        }
        let mut stages = vec![self.parse_command()?];
        let mut stderr_pipes = Vec::new();
        loop {
            let stderr = match self.cur_type() {
                TokenType::Pipe => false,
                TokenType::PipeAmp => true,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            stderr_pipes.push(stderr);
            stages.push(self.parse_command()?);
        }
        Ok(PipelineNode { stages, negated, stderr_pipes })
    }

    pub(crate) fn parse_command(&mut self) -> Result<CommandNode, ParseError> {
        self.enter()?;
        let result = match self.cur_type() {
            TokenType::If
            | TokenType::While
            | TokenType::Until
            | TokenType::For
            | TokenType::Case
            | TokenType::LBrace
            | TokenType::LParen
            | TokenType::DParenStart
            | TokenType::DBrackStart => self.parse_compound(),
            TokenType::Function => self.parse_function_def(),
            TokenType::Word if self.is_function_def_start() => self.parse_function_def(),
            TokenType::Word | TokenType::AssignmentWord | TokenType::Number => {
                self.parse_simple_command()
            }
            _ if is_redirection_start(self.cur_type()) => self.parse_simple_command(),
            _ => Err(self.unexpected("expected a command")),
        };
        self.leave();
        result
    }

    /// `name ( )` introduces a function definition.
    fn is_function_def_start(&self) -> bool {
        let t = self.cur();
        if t.quoted || !is_valid_name(&t.value) {
            return false;
        }
        let next = self.tokens.get(self.pos + 1).map(|t| t.token_type);
        let after = self.tokens.get(self.pos + 2).map(|t| t.token_type);
        next == Some(TokenType::LParen) && after == Some(TokenType::RParen)
    }

    // =========================================================================
    // Simple commands
    // =========================================================================

    pub(crate) fn parse_simple_command(&mut self) -> Result<CommandNode, ParseError> {
        let mut assignments = Vec::new();
        let mut words = Vec::new();
        let mut redirections = Vec::new();
        let line = self.cur().line as u32;

        loop {
            match self.cur_type() {
                TokenType::AssignmentWord if words.is_empty() => {
                    let t = self.advance();
                    assignments.push(self.parse_assignment_word(&t)?);
                }
                TokenType::Word | TokenType::AssignmentWord => {
                    let t = self.advance();
                    words.push(parse_word(&t.value, t.line, false)?);
                }
                TokenType::Number => {
                    // Only an fd when a redirection operator follows.
                    let next = self.tokens.get(self.pos + 1).map(|t| t.token_type);
                    if next.map(is_redirection_op).unwrap_or(false) {
                        redirections.push(self.parse_redirection()?);
                    } else {
                        let t = self.advance();
                        words.push(parse_word(&t.value, t.line, false)?);
                    }
                }
                tt if is_redirection_op(tt) => {
                    redirections.push(self.parse_redirection()?);
                }
                _ => break,
            }
        }

        if assignments.is_empty() && words.is_empty() && redirections.is_empty() {
            return Err(self.unexpected("expected a command"));
        }
        Ok(CommandNode::Simple(SimpleCommandNode { assignments, words, redirections, line }))
    }

    /// Split a raw `name[sub]+=value` token into an AssignmentNode.
    pub(crate) fn parse_assignment_word(&mut self, t: &Token) -> Result<AssignmentNode, ParseError> {
        parse_assignment_text(&t.value, t.line)
            .ok_or_else(|| self.unexpected("malformed assignment"))?
    }

    // =========================================================================
    // Redirections
    // =========================================================================

    pub(crate) fn parse_redirection(&mut self) -> Result<RedirectionNode, ParseError> {
        let fd = if self.cur_type() == TokenType::Number {
            let t = self.advance();
            Some(t.value.parse::<i32>().map_err(|_| {
                ParseError::new(format!("{}: bad file descriptor", t.value), t.line, t.column)
            })?)
        } else {
            None
        };

        let op_index = self.pos;
        let op_token = self.advance();
        let operator = match op_token.token_type {
            TokenType::Less => RedirOp::Less,
            TokenType::Great => RedirOp::Great,
            TokenType::DGreat => RedirOp::DGreat,
            TokenType::LessAnd => RedirOp::LessAnd,
            TokenType::GreatAnd => RedirOp::GreatAnd,
            TokenType::LessGreat => RedirOp::LessGreat,
            TokenType::Clobber => RedirOp::Clobber,
            TokenType::AndGreat => RedirOp::AndGreat,
            TokenType::AndDGreat => RedirOp::AndDGreat,
            TokenType::TLess => RedirOp::HereString,
            TokenType::DLess => RedirOp::HereDoc,
            TokenType::DLessDash => RedirOp::HereDocDash,
            _ => return Err(self.unexpected("expected a redirection operator")),
        };

        if matches!(operator, RedirOp::HereDoc | RedirOp::HereDocDash) {
            let delim_token = self.expect(TokenType::Word)?;
            let quoted = delim_token.quoted;
            let raw_body = self.heredoc_bodies.get(&op_index).cloned().unwrap_or_default();
            let body = if quoted {
                WordNode { parts: vec![WordPart::Literal(raw_body)] }
            } else {
                parse_heredoc_body(&raw_body, delim_token.line)?
            };
            let delimiter = crate::parser::lexer::strip_word_quotes(&delim_token.value);
            return Ok(RedirectionNode {
                fd,
                operator,
                target: RedirTarget::HereDoc(HereDocNode {
                    delimiter,
                    body,
                    strip_tabs: operator == RedirOp::HereDocDash,
                    quoted,
                }),
            });
        }

        let target = match self.cur_type() {
            TokenType::Word | TokenType::AssignmentWord | TokenType::Number => {
                let t = self.advance();
                parse_word(&t.value, t.line, false)?
            }
            _ => return Err(self.unexpected("expected a redirection target")),
        };
        Ok(RedirectionNode { fd, operator, target: RedirTarget::Word(target) })
    }

    /// Trailing redirections after a compound command.
    pub(crate) fn parse_trailing_redirections(
        &mut self,
    ) -> Result<Vec<RedirectionNode>, ParseError> {
        let mut redirs = Vec::new();
        loop {
            match self.cur_type() {
                TokenType::Number => {
                    let next = self.tokens.get(self.pos + 1).map(|t| t.token_type);
                    if next.map(is_redirection_op).unwrap_or(false) {
                        redirs.push(self.parse_redirection()?);
                    } else {
                        break;
                    }
                }
                tt if is_redirection_op(tt) => redirs.push(self.parse_redirection()?),
                _ => break,
            }
        }
        Ok(redirs)
    }
}

/// Pair DLess operators with the HeredocBody tokens that follow their
/// newline, in FIFO order.
fn match_heredoc_bodies(tokens: &[Token]) -> HashMap<usize, String> {
    let mut pending: VecDeque<usize> = VecDeque::new();
    let mut map = HashMap::new();
    for (i, t) in tokens.iter().enumerate() {
        match t.token_type {
            TokenType::DLess | TokenType::DLessDash => pending.push_back(i),
            TokenType::HeredocBody => {
                if let Some(op) = pending.pop_front() {
                    map.insert(op, t.value.clone());
                }
            }
            _ => {}
        }
    }
    map
}

/// Parse `name[sub]+=value` / `name=(elems)` text into an AssignmentNode.
/// Used by the parser for assignment tokens and by `declare`-family
/// builtins for their operands. None when the text is not an assignment.
pub fn parse_assignment_text(text: &str, line: usize) -> Option<Result<AssignmentNode, ParseError>> {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 0i32;
    let mut eq = None;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            '=' if depth == 0 => {
                eq = Some(i);
                break;
            }
            _ => {}
        }
    }
    let eq = eq?;
    let append = eq > 0 && chars[eq - 1] == '+';
    let lhs_end = if append { eq - 1 } else { eq };
    let lhs: String = chars[..lhs_end].iter().collect();
    let (name, subscript) = match lhs.find('[') {
        Some(b) => {
            let name = lhs[..b].to_string();
            let sub = lhs[b + 1..lhs.len() - 1].to_string();
            (name, Some(sub))
        }
        None => (lhs, None),
    };
    let rhs: String = chars[eq + 1..].iter().collect();

    // Array literal: NAME=(elem ...)
    if subscript.is_none() && rhs.starts_with('(') && rhs.ends_with(')') {
        let inner = &rhs[1..rhs.len() - 1];
        let mut elems = Vec::new();
        for raw in split_array_elements(inner) {
            match parse_word(&raw, line, true) {
                Ok(w) => elems.push(w),
                Err(e) => return Some(Err(e)),
            }
        }
        return Some(Ok(AssignmentNode {
            name,
            subscript: None,
            value: None,
            append,
            array: Some(elems),
        }));
    }

    let value = if rhs.is_empty() {
        None
    } else {
        match parse_word(&rhs, line, true) {
            Ok(w) => Some(w),
            Err(e) => return Some(Err(e)),
        }
    };
    Some(Ok(AssignmentNode { name, subscript, value, append, array: None }))
}

pub(crate) fn is_redirection_op(tt: TokenType) -> bool {
    matches!(
        tt,
        TokenType::Less
            | TokenType::Great
            | TokenType::DGreat
            | TokenType::LessAnd
            | TokenType::GreatAnd
            | TokenType::LessGreat
            | TokenType::Clobber
            | TokenType::AndGreat
            | TokenType::AndDGreat
            | TokenType::TLess
            | TokenType::DLess
            | TokenType::DLessDash
    )
}

fn is_redirection_start(tt: TokenType) -> bool {
    is_redirection_op(tt)
}

/// Split an array literal body into raw element words (blank and newline
/// separated, quote-aware).
fn split_array_elements(inner: &str) -> Vec<String> {
    let chars: Vec<char> = inner.chars().collect();
    let mut elems = Vec::new();
    let mut current = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => {
                if !current.is_empty() {
                    elems.push(std::mem::take(&mut current));
                }
                i += 1;
            }
            '\'' => {
                current.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    current.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    current.push('\'');
                    i += 1;
                }
            }
            '"' => {
                current.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        current.push(chars[i]);
                        current.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    current.push('"');
                    i += 1;
                }
            }
            '\\' => {
                current.push(c);
                if i + 1 < chars.len() {
                    current.push(chars[i + 1]);
                }
                i += 2;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    if !current.is_empty() {
        elems.push(current);
    }
    elems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;

    fn script(src: &str) -> ScriptNode {
        parse_script(src, None).unwrap()
    }

    fn first_command(src: &str) -> CommandNode {
        script(src).lists[0].items[0].first.stages[0].clone()
    }

    #[test]
    fn test_simple_command() {
        match first_command("echo hello world") {
            CommandNode::Simple(c) => {
                assert_eq!(c.words.len(), 3);
                assert!(c.assignments.is_empty());
            }
            other => panic!("expected simple, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_prefix() {
        match first_command("X=1 Y=2 env") {
            CommandNode::Simple(c) => {
                assert_eq!(c.assignments.len(), 2);
                assert_eq!(c.assignments[0].name, "X");
                assert_eq!(c.words.len(), 1);
            }
            other => panic!("expected simple, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_only() {
        match first_command("X=1") {
            CommandNode::Simple(c) => {
                assert_eq!(c.assignments.len(), 1);
                assert!(c.words.is_empty());
            }
            other => panic!("expected simple, got {:?}", other),
        }
    }

    #[test]
    fn test_array_literal() {
        match first_command("arr=(a b 'c d')") {
            CommandNode::Simple(c) => {
                let arr = c.assignments[0].array.as_ref().unwrap();
                assert_eq!(arr.len(), 3);
            }
            other => panic!("expected simple, got {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_and_negation() {
        let s = script("! a | b |& c");
        let p = &s.lists[0].items[0].first;
        assert!(p.negated);
        assert_eq!(p.stages.len(), 3);
        assert_eq!(p.stderr_pipes, vec![false, true]);
    }

    #[test]
    fn test_and_or_chain() {
        let s = script("a && b || c");
        let ao = &s.lists[0].items[0];
        assert_eq!(ao.rest.len(), 2);
        assert_eq!(ao.rest[0].0, AndOr::And);
        assert_eq!(ao.rest[1].0, AndOr::Or);
    }

    #[test]
    fn test_background_separator() {
        let s = script("sleep 5 & echo done");
        let l = &s.lists[0];
        assert_eq!(l.separators[0], ListSeparator::Amp);
        assert_eq!(l.separators[1], ListSeparator::Semi);
    }

    #[test]
    fn test_redirections() {
        match first_command("cmd <in >out 2>&1") {
            CommandNode::Simple(c) => {
                assert_eq!(c.redirections.len(), 3);
                assert_eq!(c.redirections[2].fd, Some(2));
                assert_eq!(c.redirections[2].operator, RedirOp::GreatAnd);
            }
            other => panic!("expected simple, got {:?}", other),
        }
    }

    #[test]
    fn test_heredoc_attachment() {
        match first_command("cat <<EOF\nline one\nEOF\n") {
            CommandNode::Simple(c) => match &c.redirections[0].target {
                RedirTarget::HereDoc(h) => {
                    assert_eq!(h.delimiter, "EOF");
                    assert!(!h.quoted);
                }
                other => panic!("expected heredoc, got {:?}", other),
            },
            other => panic!("expected simple, got {:?}", other),
        }
    }

    #[test]
    fn test_function_def_shorthand() {
        match first_command("greet() { echo hi; }") {
            CommandNode::FunctionDef(f) => {
                assert_eq!(f.name, "greet");
                assert!(matches!(
                    *f.body,
                    CommandNode::Compound(CompoundCommandNode::Group(_))
                ));
            }
            other => panic!("expected funcdef, got {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_input() {
        let err = parse_script("if true; then echo", None).unwrap_err();
        assert!(err.needs_more_input);
        let err = parse_script("echo 'open", None).unwrap_err();
        assert!(err.needs_more_input);
    }

    #[test]
    fn test_hard_syntax_error() {
        let err = parse_script("echo hi; fi", None).unwrap_err();
        assert!(!err.needs_more_input);
    }
}

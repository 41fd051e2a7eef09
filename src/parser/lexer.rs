//! Context-sensitive lexer.
//!
//! Turns a byte source into a token stream:
//! - operators by maximal munch, with `[[ ]]` and `(( ))` gated on context
//! - raw words whose text still carries quotes and balanced substitution
//!   syntax (the word parser segments them later)
//! - heredoc bodies collected after the newline that ends their command line
//! - alias expansion at command position, with pushback and recursion
//!   blocking
//!
//! Metacharacters (`| & ; ( ) < > space tab newline`) only separate words
//! outside quotes and outside balanced `$()`, `${}`, backquote, `<()` and
//! array-literal spans.

use std::collections::HashMap;

use crate::environment::aliases::AliasTable;
use crate::parser::types::{is_valid_assignment_lhs, ParseError, MAX_INPUT_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Eof,
    Newline,

    Semicolon, // ;
    Amp,       // &
    Pipe,      // |
    PipeAmp,   // |&
    AndAnd,    // &&
    OrOr,      // ||
    Bang,      // !

    Less,      // <
    Great,     // >
    DLess,     // <<
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    DLessDash, // <<-
    Clobber,   // >|
    TLess,     // <<<
    AndGreat,  // &>
    AndDGreat, // &>>

    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }

    DSemi,       // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&

    DBrackStart, // [[
    DBrackEnd,   // ]]
    DParenStart, // ((
    DParenEnd,   // ))

    If,
    Then,
    Else,
    Elif,
    Fi,
    For,
    While,
    Until,
    Do,
    Done,
    Case,
    Esac,
    In,
    Function,

    Word,
    Number,         // digits immediately before a redirection operator
    AssignmentWord, // NAME=..., NAME+=..., NAME[sub]=...

    /// Raw text between `((` and `))`.
    ArithText,
    /// Collected heredoc body, emitted right after the newline.
    HeredocBody,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Newline => "newline",
            Self::Semicolon => ";",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::PipeAmp => "|&",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Bang => "!",
            Self::Less => "<",
            Self::Great => ">",
            Self::DLess => "<<",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::LessGreat => "<>",
            Self::DLessDash => "<<-",
            Self::Clobber => ">|",
            Self::TLess => "<<<",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::DSemi => ";;",
            Self::SemiAnd => ";&",
            Self::SemiSemiAnd => ";;&",
            Self::DBrackStart => "[[",
            Self::DBrackEnd => "]]",
            Self::DParenStart => "((",
            Self::DParenEnd => "))",
            Self::If => "if",
            Self::Then => "then",
            Self::Else => "else",
            Self::Elif => "elif",
            Self::Fi => "fi",
            Self::For => "for",
            Self::While => "while",
            Self::Until => "until",
            Self::Do => "do",
            Self::Done => "done",
            Self::Case => "case",
            Self::Esac => "esac",
            Self::In => "in",
            Self::Function => "function",
            Self::Word => "word",
            Self::Number => "number",
            Self::AssignmentWord => "assignment",
            Self::ArithText => "arithmetic",
            Self::HeredocBody => "here-document",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// Any quoting occurred inside the word text.
    pub quoted: bool,
}

impl Token {
    fn new(token_type: TokenType, value: impl Into<String>, start: usize, end: usize, line: usize, column: usize) -> Self {
        Self { token_type, value: value.into(), start, end, line, column, quoted: false }
    }
}

lazy_static::lazy_static! {
    static ref RESERVED_WORDS: HashMap<&'static str, TokenType> = {
        let mut m = HashMap::new();
        m.insert("if", TokenType::If);
        m.insert("then", TokenType::Then);
        m.insert("else", TokenType::Else);
        m.insert("elif", TokenType::Elif);
        m.insert("fi", TokenType::Fi);
        m.insert("for", TokenType::For);
        m.insert("while", TokenType::While);
        m.insert("until", TokenType::Until);
        m.insert("do", TokenType::Do);
        m.insert("done", TokenType::Done);
        m.insert("case", TokenType::Case);
        m.insert("esac", TokenType::Esac);
        m.insert("function", TokenType::Function);
        m
    };
}

const THREE_CHAR_OPS: &[(&str, TokenType)] = &[
    (";;&", TokenType::SemiSemiAnd),
    ("<<<", TokenType::TLess),
    ("<<-", TokenType::DLessDash),
    ("&>>", TokenType::AndDGreat),
];

const TWO_CHAR_OPS: &[(&str, TokenType)] = &[
    ("&&", TokenType::AndAnd),
    ("||", TokenType::OrOr),
    (";;", TokenType::DSemi),
    (";&", TokenType::SemiAnd),
    ("|&", TokenType::PipeAmp),
    ("<<", TokenType::DLess),
    (">>", TokenType::DGreat),
    ("<&", TokenType::LessAnd),
    (">&", TokenType::GreatAnd),
    ("<>", TokenType::LessGreat),
    (">|", TokenType::Clobber),
    ("&>", TokenType::AndGreat),
];

fn single_char_op(c: char) -> Option<TokenType> {
    match c {
        '|' => Some(TokenType::Pipe),
        '&' => Some(TokenType::Amp),
        ';' => Some(TokenType::Semicolon),
        '(' => Some(TokenType::LParen),
        ')' => Some(TokenType::RParen),
        '<' => Some(TokenType::Less),
        '>' => Some(TokenType::Great),
        _ => None,
    }
}

fn is_metachar(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[derive(Debug, Clone)]
struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
}

/// Alias replacement span: the named alias stays blocked from re-expansion
/// while the lexer position is inside the span.
#[derive(Debug, Clone)]
struct ActiveAlias {
    name: String,
    end: usize,
}

pub struct Lexer<'a> {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    pending_heredocs: Vec<PendingHeredoc>,
    /// The next word is in command position (reserved words, aliases).
    command_pos: bool,
    /// `in` is acceptable as a reserved word (after `for NAME`, `case WORD`).
    expect_in: bool,
    /// Inside `[[ ... ]]`.
    in_cond: bool,
    /// Alias expansion continues to the word after a replacement that ends
    /// in a blank.
    alias_next_word: bool,
    aliases: Option<&'a AliasTable>,
    active_aliases: Vec<ActiveAlias>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, aliases: Option<&'a AliasTable>) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
            command_pos: true,
            expect_in: false,
            in_cond: false,
            alias_next_word: false,
            aliases,
            active_aliases: Vec::new(),
        }
    }

    fn cur(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.cur()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn matches_at(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.line, self.column)
    }

    fn incomplete(&self, msg: impl Into<String>) -> ParseError {
        ParseError::incomplete(msg, self.line, self.column)
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        if self.input.len() > MAX_INPUT_SIZE {
            return Err(self.error("input too long"));
        }

        while self.pos < self.input.len() {
            // Heredoc bodies start on the line after their redirection.
            if !self.pending_heredocs.is_empty()
                && self.tokens.last().map(|t| t.token_type) == Some(TokenType::Newline)
            {
                self.read_heredoc_bodies()?;
                continue;
            }

            let c = match self.cur() {
                Some(c) => c,
                None => break,
            };

            if is_blank(c) {
                self.advance();
                continue;
            }

            // Line continuation between tokens.
            if c == '\\' && self.peek(1) == Some('\n') {
                self.advance();
                self.advance();
                continue;
            }

            if c == '\n' {
                let (start, line, col) = (self.pos, self.line, self.column);
                self.advance();
                self.push(Token::new(TokenType::Newline, "\n", start, start + 1, line, col));
                continue;
            }

            if c == '#' {
                while let Some(c) = self.cur() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            // `((` opens an arithmetic command at command position or after
            // `for`; `( (` stays two subshell opens.
            if self.matches_at("((")
                && (self.command_pos
                    || self.tokens.last().map(|t| t.token_type) == Some(TokenType::For))
            {
                self.read_arith_span()?;
                continue;
            }

            // `[[` is a reserved word, so command position only.
            if self.matches_at("[[") && self.command_pos && self.ends_word_at(self.pos + 2) {
                self.push_op(TokenType::DBrackStart, 2);
                self.in_cond = true;
                self.command_pos = false;
                continue;
            }
            if self.in_cond && self.matches_at("]]") && self.ends_word_at(self.pos + 2) {
                self.push_op(TokenType::DBrackEnd, 2);
                self.in_cond = false;
                continue;
            }

            if let Some(tt) = self.try_operator()? {
                // Heredoc operators grab their delimiter word immediately.
                if tt == TokenType::DLess || tt == TokenType::DLessDash {
                    self.read_heredoc_delimiter(tt == TokenType::DLessDash)?;
                }
                continue;
            }

            self.read_word_token()?;
        }

        if !self.pending_heredocs.is_empty() {
            return Err(self.incomplete(format!(
                "here-document delimited by end-of-file (wanted `{}')",
                self.pending_heredocs[0].delimiter
            )));
        }
        if self.in_cond {
            return Err(self.incomplete("unexpected end of input while looking for `]]'"));
        }

        let (pos, line, col) = (self.pos, self.line, self.column);
        self.push(Token::new(TokenType::Eof, "", pos, pos, line, col));
        Ok(self.tokens)
    }

    /// A `[[`/`]]` candidate must be delimited like a word.
    fn ends_word_at(&self, pos: usize) -> bool {
        match self.input.get(pos) {
            None => true,
            Some(&c) => is_metachar(c),
        }
    }

    fn push(&mut self, token: Token) {
        self.command_pos = matches!(
            token.token_type,
            TokenType::Newline
                | TokenType::Semicolon
                | TokenType::Amp
                | TokenType::Pipe
                | TokenType::PipeAmp
                | TokenType::AndAnd
                | TokenType::OrOr
                | TokenType::DSemi
                | TokenType::SemiAnd
                | TokenType::SemiSemiAnd
                | TokenType::LParen
                | TokenType::LBrace
                | TokenType::Bang
                | TokenType::If
                | TokenType::Then
                | TokenType::Else
                | TokenType::Elif
                | TokenType::While
                | TokenType::Until
                | TokenType::Do
                | TokenType::RParen
        ) && !self.in_cond;
        // `)` closes a case pattern list as well as a subshell; both are
        // followed by a command.
        if matches!(
            token.token_type,
            TokenType::Semicolon | TokenType::Do | TokenType::LBrace | TokenType::DSemi
        ) {
            self.expect_in = false;
        }
        self.tokens.push(token);
    }

    fn push_op(&mut self, tt: TokenType, len: usize) {
        let (start, line, col) = (self.pos, self.line, self.column);
        let value: String = self.input[self.pos..self.pos + len].iter().collect();
        for _ in 0..len {
            self.advance();
        }
        self.push(Token::new(tt, value, start, start + len, line, col));
    }

    fn try_operator(&mut self) -> Result<Option<TokenType>, ParseError> {
        for (text, tt) in THREE_CHAR_OPS {
            if self.matches_at(text) {
                self.push_op(*tt, 3);
                return Ok(Some(*tt));
            }
        }
        for (text, tt) in TWO_CHAR_OPS {
            if self.matches_at(text) {
                self.push_op(*tt, 2);
                return Ok(Some(*tt));
            }
        }
        let c = match self.cur() {
            Some(c) => c,
            None => return Ok(None),
        };
        // <(cmd) and >(cmd) are word material, not redirections.
        if (c == '<' || c == '>') && self.peek(1) == Some('(') {
            return Ok(None);
        }
        if let Some(tt) = single_char_op(c) {
            self.push_op(tt, 1);
            return Ok(Some(tt));
        }
        Ok(None)
    }

    // =========================================================================
    // Words
    // =========================================================================

    fn read_word_token(&mut self) -> Result<(), ParseError> {
        let (start, line, col) = (self.pos, self.line, self.column);
        let (value, quoted) = self.read_word_text()?;
        if value.is_empty() {
            // Defensive: never loop without consuming.
            self.advance();
            return Ok(());
        }

        // fd number immediately preceding a redirection operator.
        if !quoted
            && value.chars().all(|c| c.is_ascii_digit())
            && matches!(self.cur(), Some('<') | Some('>'))
        {
            let mut t = Token::new(TokenType::Number, value, start, self.pos, line, col);
            t.quoted = false;
            // A redirection target word follows; not a command word.
            self.tokens.push(t);
            self.command_pos = false;
            return Ok(());
        }

        // Reserved words, `{`, `}`, `!` at command position.
        if !quoted {
            if self.command_pos {
                if value == "{" {
                    self.push(Token::new(TokenType::LBrace, value, start, self.pos, line, col));
                    return Ok(());
                }
                if value == "}" {
                    self.push(Token::new(TokenType::RBrace, value, start, self.pos, line, col));
                    return Ok(());
                }
                if value == "!" {
                    self.push(Token::new(TokenType::Bang, value, start, self.pos, line, col));
                    return Ok(());
                }
                if let Some(&tt) = RESERVED_WORDS.get(value.as_str()) {
                    let token = Token::new(tt, value, start, self.pos, line, col);
                    self.push(token);
                    self.expect_in = matches!(tt, TokenType::For | TokenType::Case);
                    return Ok(());
                }
            } else if value == "in" && self.expect_in {
                self.push(Token::new(TokenType::In, value, start, self.pos, line, col));
                self.expect_in = false;
                self.command_pos = false;
                return Ok(());
            }
        }

        // Alias expansion: splice the replacement back into the input.
        if (self.command_pos || self.alias_next_word) && !quoted {
            if let Some(replacement) = self.alias_lookup(&value) {
                self.alias_next_word = replacement.ends_with(' ') || replacement.ends_with('\t');
                self.splice_alias(&value, &replacement, start);
                return Ok(());
            }
        }
        self.alias_next_word = false;

        // Quoting in the value does not stop assignment recognition; quoting
        // in the name does (is_assignment_word checks the prefix).
        let tt = if self.command_pos && is_assignment_word(&value) {
            TokenType::AssignmentWord
        } else {
            TokenType::Word
        };

        let keep_command_pos = tt == TokenType::AssignmentWord && self.command_pos;
        let mut token = Token::new(tt, value, start, self.pos, line, col);
        token.quoted = quoted;
        self.tokens.push(token);
        // Assignment prefixes leave the command word still to come.
        self.command_pos = keep_command_pos;
        Ok(())
    }

    fn alias_lookup(&self, name: &str) -> Option<String> {
        let table = self.aliases?;
        if self.active_aliases.iter().any(|a| a.name == name && self.pos <= a.end) {
            return None;
        }
        table.lookup(name).map(|s| s.to_string())
    }

    fn splice_alias(&mut self, name: &str, replacement: &str, word_start: usize) {
        // Drop the alias word we just consumed and insert the replacement.
        let consumed = self.pos - word_start;
        let rep: Vec<char> = replacement.chars().collect();
        let delta = rep.len();
        self.input.splice(word_start..self.pos, rep);
        self.pos = word_start;
        for a in &mut self.active_aliases {
            if a.end >= word_start + consumed {
                a.end = a.end - consumed + delta;
            } else if a.end > word_start {
                a.end = word_start + delta;
            }
        }
        self.active_aliases.retain(|a| a.end > word_start);
        self.active_aliases.push(ActiveAlias { name: name.to_string(), end: word_start + delta });
    }

    /// Scan one word's raw text, consuming quoted and balanced substitution
    /// spans wholesale.
    fn read_word_text(&mut self) -> Result<(String, bool), ParseError> {
        let mut buf = String::new();
        let mut quoted = false;

        while let Some(c) = self.cur() {
            match c {
                c if is_metachar(c) => {
                    // Process substitution continues the word.
                    if (c == '<' || c == '>') && self.peek(1) == Some('(') {
                        buf.push(c);
                        self.advance();
                        self.consume_balanced_parens(&mut buf)?;
                        continue;
                    }
                    // Array literal `name=( ... )` continues the word.
                    if c == '(' && buf.ends_with('=') && {
                        let lhs = &buf[..buf.len() - 1];
                        let lhs = lhs.strip_suffix('+').unwrap_or(lhs);
                        is_valid_assignment_lhs(lhs)
                    } {
                        self.consume_balanced_parens(&mut buf)?;
                        continue;
                    }
                    break;
                }
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.advance();
                        self.advance();
                        continue;
                    }
                    quoted = true;
                    buf.push(c);
                    self.advance();
                    if let Some(next) = self.cur() {
                        buf.push(next);
                        self.advance();
                    }
                }
                '\'' => {
                    quoted = true;
                    self.consume_single_quote(&mut buf)?;
                }
                '"' => {
                    quoted = true;
                    self.consume_double_quote(&mut buf)?;
                }
                '`' => {
                    self.consume_backquote(&mut buf)?;
                }
                '$' => match self.peek(1) {
                    Some('\'') => {
                        quoted = true;
                        buf.push('$');
                        self.advance();
                        self.consume_single_quote_escaped(&mut buf)?;
                    }
                    Some('"') => {
                        quoted = true;
                        buf.push('$');
                        self.advance();
                        self.consume_double_quote(&mut buf)?;
                    }
                    Some('(') => {
                        buf.push('$');
                        self.advance();
                        self.consume_balanced_parens(&mut buf)?;
                    }
                    Some('{') => {
                        buf.push('$');
                        self.advance();
                        self.consume_balanced_braces(&mut buf)?;
                    }
                    _ => {
                        buf.push('$');
                        self.advance();
                    }
                },
                _ => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
        Ok((buf, quoted))
    }

    fn consume_single_quote(&mut self, buf: &mut String) -> Result<(), ParseError> {
        buf.push('\'');
        self.advance();
        loop {
            match self.cur() {
                None => return Err(self.incomplete("unexpected EOF while looking for matching `''")),
                Some('\'') => {
                    buf.push('\'');
                    self.advance();
                    return Ok(());
                }
                Some(c) => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
    }

    /// $'...': backslash may escape the closing quote.
    fn consume_single_quote_escaped(&mut self, buf: &mut String) -> Result<(), ParseError> {
        buf.push('\'');
        self.advance();
        loop {
            match self.cur() {
                None => return Err(self.incomplete("unexpected EOF while looking for matching `''")),
                Some('\\') => {
                    buf.push('\\');
                    self.advance();
                    if let Some(c) = self.cur() {
                        buf.push(c);
                        self.advance();
                    }
                }
                Some('\'') => {
                    buf.push('\'');
                    self.advance();
                    return Ok(());
                }
                Some(c) => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
    }

    fn consume_double_quote(&mut self, buf: &mut String) -> Result<(), ParseError> {
        buf.push('"');
        self.advance();
        loop {
            match self.cur() {
                None => return Err(self.incomplete("unexpected EOF while looking for matching `\"'")),
                Some('"') => {
                    buf.push('"');
                    self.advance();
                    return Ok(());
                }
                Some('\\') => {
                    buf.push('\\');
                    self.advance();
                    if let Some(c) = self.cur() {
                        buf.push(c);
                        self.advance();
                    }
                }
                Some('`') => {
                    self.consume_backquote(buf)?;
                }
                Some('$') => match self.peek(1) {
                    Some('(') => {
                        buf.push('$');
                        self.advance();
                        self.consume_balanced_parens(buf)?;
                    }
                    Some('{') => {
                        buf.push('$');
                        self.advance();
                        self.consume_balanced_braces(buf)?;
                    }
                    _ => {
                        buf.push('$');
                        self.advance();
                    }
                },
                Some(c) => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
    }

    fn consume_backquote(&mut self, buf: &mut String) -> Result<(), ParseError> {
        buf.push('`');
        self.advance();
        loop {
            match self.cur() {
                None => return Err(self.incomplete("unexpected EOF while looking for matching ``'")),
                Some('\\') => {
                    buf.push('\\');
                    self.advance();
                    if let Some(c) = self.cur() {
                        buf.push(c);
                        self.advance();
                    }
                }
                Some('`') => {
                    buf.push('`');
                    self.advance();
                    return Ok(());
                }
                Some(c) => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
    }

    /// Consume from an opening `(` through its balanced close, respecting
    /// quotes, nested substitutions and `#` comments.
    fn consume_balanced_parens(&mut self, buf: &mut String) -> Result<(), ParseError> {
        buf.push('(');
        self.advance();
        let mut depth = 1usize;
        let mut at_token_start = true;
        while depth > 0 {
            let c = match self.cur() {
                Some(c) => c,
                None => return Err(self.incomplete("unexpected EOF while looking for matching `)'")),
            };
            match c {
                '(' => {
                    depth += 1;
                    buf.push(c);
                    self.advance();
                }
                ')' => {
                    depth -= 1;
                    buf.push(c);
                    self.advance();
                }
                '\'' => self.consume_single_quote(buf)?,
                '"' => self.consume_double_quote(buf)?,
                '`' => self.consume_backquote(buf)?,
                '\\' => {
                    buf.push('\\');
                    self.advance();
                    if let Some(n) = self.cur() {
                        buf.push(n);
                        self.advance();
                    }
                }
                '#' if at_token_start => {
                    while let Some(n) = self.cur() {
                        if n == '\n' {
                            break;
                        }
                        buf.push(n);
                        self.advance();
                    }
                }
                _ => {
                    buf.push(c);
                    self.advance();
                }
            }
            at_token_start = matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(');
        }
        Ok(())
    }

    fn consume_balanced_braces(&mut self, buf: &mut String) -> Result<(), ParseError> {
        buf.push('{');
        self.advance();
        let mut depth = 1usize;
        while depth > 0 {
            let c = match self.cur() {
                Some(c) => c,
                None => return Err(self.incomplete("unexpected EOF while looking for matching `}'")),
            };
            match c {
                '{' => {
                    depth += 1;
                    buf.push(c);
                    self.advance();
                }
                '}' => {
                    depth -= 1;
                    buf.push(c);
                    self.advance();
                }
                '\'' => self.consume_single_quote(buf)?,
                '"' => self.consume_double_quote(buf)?,
                '`' => self.consume_backquote(buf)?,
                '$' if self.peek(1) == Some('(') => {
                    buf.push('$');
                    self.advance();
                    self.consume_balanced_parens(buf)?;
                }
                '\\' => {
                    buf.push('\\');
                    self.advance();
                    if let Some(n) = self.cur() {
                        buf.push(n);
                        self.advance();
                    }
                }
                _ => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Arithmetic spans
    // =========================================================================

    /// `(( expr ))` → DParenStart, ArithText, DParenEnd.
    fn read_arith_span(&mut self) -> Result<(), ParseError> {
        self.push_op(TokenType::DParenStart, 2);
        let (start, line, col) = (self.pos, self.line, self.column);
        let mut buf = String::new();
        let mut depth = 0usize;
        loop {
            let c = match self.cur() {
                Some(c) => c,
                None => return Err(self.incomplete("unexpected EOF while looking for matching `))'")),
            };
            match c {
                '(' => {
                    depth += 1;
                    buf.push(c);
                    self.advance();
                }
                ')' => {
                    if depth == 0 {
                        if self.peek(1) == Some(')') {
                            break;
                        }
                        return Err(self.error("syntax error near unexpected token `)'"));
                    }
                    depth -= 1;
                    buf.push(c);
                    self.advance();
                }
                '\'' => self.consume_single_quote(&mut buf)?,
                '"' => self.consume_double_quote(&mut buf)?,
                _ => {
                    buf.push(c);
                    self.advance();
                }
            }
        }
        let end = self.pos;
        self.tokens.push(Token::new(TokenType::ArithText, buf, start, end, line, col));
        self.push_op(TokenType::DParenEnd, 2);
        self.command_pos = false;
        Ok(())
    }

    // =========================================================================
    // Heredocs
    // =========================================================================

    fn read_heredoc_delimiter(&mut self, strip_tabs: bool) -> Result<(), ParseError> {
        while let Some(c) = self.cur() {
            if is_blank(c) {
                self.advance();
            } else {
                break;
            }
        }
        let (start, line, col) = (self.pos, self.line, self.column);
        let (raw, quoted) = self.read_word_text()?;
        if raw.is_empty() {
            return Err(self.error("syntax error near unexpected token `newline'"));
        }
        let delimiter = strip_word_quotes(&raw);
        let mut token = Token::new(TokenType::Word, raw, start, self.pos, line, col);
        token.quoted = quoted;
        self.tokens.push(token);
        self.command_pos = false;
        self.pending_heredocs.push(PendingHeredoc { delimiter, strip_tabs });
        Ok(())
    }

    fn read_heredoc_bodies(&mut self) -> Result<(), ParseError> {
        let pending = std::mem::take(&mut self.pending_heredocs);
        for heredoc in pending {
            let (start, line, col) = (self.pos, self.line, self.column);
            let mut body = String::new();
            let mut found = false;
            while self.pos < self.input.len() {
                let raw_line = self.read_raw_line();
                let candidate = if heredoc.strip_tabs {
                    raw_line.trim_start_matches('\t').to_string()
                } else {
                    raw_line.clone()
                };
                if candidate == heredoc.delimiter {
                    found = true;
                    break;
                }
                if heredoc.strip_tabs {
                    body.push_str(raw_line.trim_start_matches('\t'));
                } else {
                    body.push_str(&raw_line);
                }
                body.push('\n');
            }
            if !found {
                return Err(ParseError::incomplete(
                    format!("here-document delimited by end-of-file (wanted `{}')", heredoc.delimiter),
                    self.line,
                    self.column,
                ));
            }
            self.tokens.push(Token::new(TokenType::HeredocBody, body, start, self.pos, line, col));
        }
        Ok(())
    }

    /// Read through the next newline; the newline is consumed, not returned.
    fn read_raw_line(&mut self) -> String {
        let mut line = String::new();
        while let Some(c) = self.cur() {
            self.advance();
            if c == '\n' {
                break;
            }
            line.push(c);
        }
        line
    }
}

/// Remove quoting syntax from a heredoc delimiter word.
pub fn strip_word_quotes(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                if i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            '\'' => {
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    out.push(chars[i]);
                    i += 1;
                }
                i += 1;
            }
            '"' => {
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i + 1]);
                        i += 2;
                    } else {
                        out.push(chars[i]);
                        i += 1;
                    }
                }
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// A raw word is an assignment word when its unquoted prefix up to `=` is a
/// valid LHS (`name`, `name+`, `name[sub]`).
pub fn is_assignment_word(value: &str) -> bool {
    let eq = match value.find('=') {
        Some(i) => i,
        None => return false,
    };
    // Walk for the first `=` outside brackets.
    let mut depth = 0i32;
    let mut eq_index = None;
    for (i, c) in value.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            '=' if depth == 0 => {
                eq_index = Some(i);
                break;
            }
            '\'' | '"' | '\\' if depth == 0 => return false,
            _ => {}
        }
    }
    let eq = eq_index.unwrap_or(eq);
    let lhs = &value[..eq];
    let lhs = lhs.strip_suffix('+').unwrap_or(lhs);
    is_valid_assignment_lhs(lhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input, None).tokenize().unwrap()
    }

    fn types(input: &str) -> Vec<TokenType> {
        lex(input).into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(
            types("echo hello world"),
            vec![TokenType::Word, TokenType::Word, TokenType::Word, TokenType::Eof]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            types("a && b || c | d;"),
            vec![
                TokenType::Word,
                TokenType::AndAnd,
                TokenType::Word,
                TokenType::OrOr,
                TokenType::Word,
                TokenType::Pipe,
                TokenType::Word,
                TokenType::Semicolon,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn test_reserved_only_in_command_position() {
        let toks = lex("echo if");
        assert_eq!(toks[0].token_type, TokenType::Word);
        assert_eq!(toks[1].token_type, TokenType::Word);
        let toks = lex("if true; then :; fi");
        assert_eq!(toks[0].token_type, TokenType::If);
    }

    #[test]
    fn test_quoted_word_stays_single_token() {
        let toks = lex("echo 'a b; c'");
        assert_eq!(toks.len(), 3); // word, word, eof
        assert_eq!(toks[1].value, "'a b; c'");
        assert!(toks[1].quoted);
    }

    #[test]
    fn test_command_subst_word() {
        let toks = lex("echo \"$(echo 'a)b')\"");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[1].value, "\"$(echo 'a)b')\"");
    }

    #[test]
    fn test_io_number() {
        let toks = lex("foo 2>err");
        assert_eq!(toks[1].token_type, TokenType::Number);
        assert_eq!(toks[2].token_type, TokenType::Great);
        // Trailing digits of a longer word do not become an fd.
        let toks = lex("foo2>err");
        assert_eq!(toks[0].token_type, TokenType::Word);
        assert_eq!(toks[0].value, "foo2");
    }

    #[test]
    fn test_assignment_word() {
        let toks = lex("X=1 y=2 echo a=b");
        assert_eq!(toks[0].token_type, TokenType::AssignmentWord);
        assert_eq!(toks[1].token_type, TokenType::AssignmentWord);
        assert_eq!(toks[2].token_type, TokenType::Word);
        assert_eq!(toks[3].token_type, TokenType::Word); // a=b after command
    }

    #[test]
    fn test_array_literal_assignment() {
        let toks = lex("arr=(1 2 3)");
        assert_eq!(toks[0].token_type, TokenType::AssignmentWord);
        assert_eq!(toks[0].value, "arr=(1 2 3)");
    }

    #[test]
    fn test_arith_command_capture() {
        let toks = lex("((x + (y*2)))");
        assert_eq!(toks[0].token_type, TokenType::DParenStart);
        assert_eq!(toks[1].token_type, TokenType::ArithText);
        assert_eq!(toks[1].value, "x + (y*2)");
        assert_eq!(toks[2].token_type, TokenType::DParenEnd);
    }

    #[test]
    fn test_adjacent_parens_vs_spaced() {
        assert_eq!(types("((1))")[0], TokenType::DParenStart);
        assert_eq!(types("( (true) )")[0], TokenType::LParen);
    }

    #[test]
    fn test_heredoc() {
        let toks = lex("cat <<EOF\nhello\n$HOME\nEOF\n");
        let body = toks.iter().find(|t| t.token_type == TokenType::HeredocBody).unwrap();
        assert_eq!(body.value, "hello\n$HOME\n");
    }

    #[test]
    fn test_heredoc_strip_tabs() {
        let toks = lex("cat <<-EOF\n\t\thello\n\tEOF\n");
        let body = toks.iter().find(|t| t.token_type == TokenType::HeredocBody).unwrap();
        assert_eq!(body.value, "hello\n");
    }

    #[test]
    fn test_heredoc_quoted_delimiter() {
        let toks = lex("cat <<'EOF'\nbody\nEOF\n");
        let delim = &toks[2];
        assert!(delim.quoted);
        assert_eq!(delim.value, "'EOF'");
    }

    #[test]
    fn test_unterminated_quote_is_incomplete() {
        let err = Lexer::new("echo 'abc", None).tokenize().unwrap_err();
        assert!(err.needs_more_input);
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(
            types("echo a\\\nb"),
            vec![TokenType::Word, TokenType::Word, TokenType::Eof]
        );
        let toks = lex("echo a\\\nb");
        assert_eq!(toks[1].value, "ab");
    }

    #[test]
    fn test_cond_brackets() {
        let toks = lex("[[ -f x ]]");
        assert_eq!(toks[0].token_type, TokenType::DBrackStart);
        assert_eq!(toks[3].token_type, TokenType::DBrackEnd);
    }

    #[test]
    fn test_alias_expansion() {
        let mut aliases = AliasTable::default();
        aliases.define("ll", "ls -l");
        let toks = Lexer::new("ll /tmp", Some(&aliases)).tokenize().unwrap();
        let words: Vec<&str> = toks
            .iter()
            .filter(|t| t.token_type == TokenType::Word)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(words, vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn test_alias_self_recursion_blocked() {
        let mut aliases = AliasTable::default();
        aliases.define("ls", "ls --color");
        let toks = Lexer::new("ls", Some(&aliases)).tokenize().unwrap();
        let words: Vec<&str> = toks
            .iter()
            .filter(|t| t.token_type == TokenType::Word)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(words, vec!["ls", "--color"]);
    }

    #[test]
    fn test_process_subst_in_word() {
        let toks = lex("diff <(sort a) <(sort b)");
        assert_eq!(toks[1].value, "<(sort a)");
        assert_eq!(toks[2].value, "<(sort b)");
    }

    #[test]
    fn test_case_in_reserved() {
        let toks = lex("case x in a) echo hi;; esac");
        assert_eq!(toks[0].token_type, TokenType::Case);
        assert_eq!(toks[2].token_type, TokenType::In);
        assert_eq!(toks[toks.len() - 2].token_type, TokenType::Esac);
    }
}

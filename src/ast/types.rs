//! AST types for the shell grammar.
//!
//! One node struct per construct. The tree is owned top-down; recursion
//! during execution is by traversal state, never by shared references.
//! Function bodies are cloned into the function table at definition time.

use std::fmt;

// =============================================================================
// SCRIPT & LISTS
// =============================================================================

/// Root node: one complete command unit (possibly several lines).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptNode {
    pub lists: Vec<ListNode>,
}

/// A list: and-or chains joined by `;`, `&`, or newlines.
#[derive(Debug, Clone, PartialEq)]
pub struct ListNode {
    pub items: Vec<AndOrNode>,
    /// One separator per item; the separator after the final item may be
    /// implicit (`Semi`).
    pub separators: Vec<ListSeparator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSeparator {
    Semi, // ; or newline
    Amp,  // & - run the preceding and-or chain in the background
}

/// Pipelines joined by `&&` and `||`.
#[derive(Debug, Clone, PartialEq)]
pub struct AndOrNode {
    pub first: PipelineNode,
    pub rest: Vec<(AndOr, PipelineNode)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOr {
    And, // &&
    Or,  // ||
}

// =============================================================================
// PIPELINES & COMMANDS
// =============================================================================

/// A pipeline: one or more commands connected by `|` or `|&`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineNode {
    pub stages: Vec<CommandNode>,
    /// `!` prefix - invert the pipeline's exit status.
    pub negated: bool,
    /// For each pipe between stages, whether it is `|&` (stderr follows).
    pub stderr_pipes: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandNode {
    Simple(SimpleCommandNode),
    Compound(CompoundCommandNode),
    FunctionDef(FunctionDefNode),
}

/// Simple command: assignment prefixes, argv words, redirections.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCommandNode {
    pub assignments: Vec<AssignmentNode>,
    pub words: Vec<WordNode>,
    pub redirections: Vec<RedirectionNode>,
    /// Source line of the command name, for $LINENO and diagnostics.
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompoundCommandNode {
    If(IfNode),
    For(ForNode),
    CFor(CForNode),
    While(WhileNode),
    Case(CaseNode),
    Subshell(SubshellNode),
    Group(GroupNode),
    Arith(ArithCommandNode),
    Cond(CondCommandNode),
}

// =============================================================================
// COMPOUND COMMANDS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    /// `if`/`elif` branches: (condition, body).
    pub branches: Vec<(ListNode, ListNode)>,
    pub else_body: Option<ListNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// `for NAME [in words]; do body; done`. Missing `in words` iterates "$@".
#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub variable: String,
    pub words: Option<Vec<WordNode>>,
    pub body: ListNode,
    pub redirections: Vec<RedirectionNode>,
}

/// C-style `for ((init; cond; post)); do body; done`.
#[derive(Debug, Clone, PartialEq)]
pub struct CForNode {
    pub init: Option<ArithExprNode>,
    pub condition: Option<ArithExprNode>,
    pub update: Option<ArithExprNode>,
    pub body: ListNode,
    pub redirections: Vec<RedirectionNode>,
}

/// `while`/`until` loop; `until` inverts the condition test.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileNode {
    pub condition: ListNode,
    pub body: ListNode,
    pub until: bool,
    pub redirections: Vec<RedirectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseNode {
    pub subject: WordNode,
    pub clauses: Vec<CaseClauseNode>,
    pub redirections: Vec<RedirectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClauseNode {
    pub patterns: Vec<WordNode>,
    pub body: ListNode,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerminator {
    /// `;;` - leave the case statement.
    Break,
    /// `;&` - fall through into the next clause body unconditionally.
    FallThrough,
    /// `;;&` - keep testing the following clauses.
    Continue,
}

/// `( list )` - executes in a forked child.
#[derive(Debug, Clone, PartialEq)]
pub struct SubshellNode {
    pub body: ListNode,
    pub redirections: Vec<RedirectionNode>,
}

/// `{ list; }` - executes in the current shell.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub body: ListNode,
    pub redirections: Vec<RedirectionNode>,
}

/// `(( expr ))` - status 0 iff the expression is non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithCommandNode {
    pub expression: ArithExprNode,
    pub redirections: Vec<RedirectionNode>,
    pub line: u32,
}

/// `[[ expr ]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CondCommandNode {
    pub expression: CondExprNode,
    pub redirections: Vec<RedirectionNode>,
    pub line: u32,
}

/// Function definition. `text` is the original source of the whole
/// definition, kept for `declare -f`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefNode {
    pub name: String,
    pub body: Box<CommandNode>,
    pub redirections: Vec<RedirectionNode>,
    pub text: String,
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// `NAME=value`, `NAME+=value`, `NAME[sub]=value`, or `NAME=(elems)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentNode {
    pub name: String,
    /// Raw subscript text between `[` and `]`, evaluated at assignment time
    /// (arithmetic for indexed arrays, expanded word for associative).
    pub subscript: Option<String>,
    pub value: Option<WordNode>,
    pub append: bool,
    /// Array literal `NAME=(a b [k]=v ...)`.
    pub array: Option<Vec<WordNode>>,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectionNode {
    /// Explicit leading fd (`2>` ...); None means the operator's default.
    pub fd: Option<i32>,
    pub operator: RedirOp,
    pub target: RedirTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirTarget {
    Word(WordNode),
    HereDoc(HereDocNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirOp {
    Less,      // <
    Great,     // >
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    Clobber,   // >|
    AndGreat,  // &>
    AndDGreat, // &>>
    HereString, // <<<
    HereDoc,    // <<
    HereDocDash, // <<-
}

impl RedirOp {
    /// Default fd the operator applies to when no number is given.
    pub fn default_fd(self) -> i32 {
        match self {
            RedirOp::Less
            | RedirOp::LessAnd
            | RedirOp::LessGreat
            | RedirOp::HereString
            | RedirOp::HereDoc
            | RedirOp::HereDocDash => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for RedirOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RedirOp::Less => "<",
            RedirOp::Great => ">",
            RedirOp::DGreat => ">>",
            RedirOp::LessAnd => "<&",
            RedirOp::GreatAnd => ">&",
            RedirOp::LessGreat => "<>",
            RedirOp::Clobber => ">|",
            RedirOp::AndGreat => "&>",
            RedirOp::AndDGreat => "&>>",
            RedirOp::HereString => "<<<",
            RedirOp::HereDoc => "<<",
            RedirOp::HereDocDash => "<<-",
        };
        f.write_str(s)
    }
}

/// Here-document. The body is parsed as a word in heredoc mode (only `$`,
/// backquote and backslash are special) unless the delimiter was quoted.
#[derive(Debug, Clone, PartialEq)]
pub struct HereDocNode {
    pub delimiter: String,
    pub body: WordNode,
    pub strip_tabs: bool,
    pub quoted: bool,
}

// =============================================================================
// WORDS
// =============================================================================

/// A word: ordered sequence of parts that concatenate into one argv
/// template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordNode {
    pub parts: Vec<WordPart>,
}

impl WordNode {
    pub fn literal(value: impl Into<String>) -> Self {
        WordNode { parts: vec![WordPart::Literal(value.into())] }
    }

    /// True when every part is quoting-inert (no expansion can occur).
    pub fn is_static(&self) -> bool {
        self.parts.iter().all(|p| {
            matches!(
                p,
                WordPart::Literal(_)
                    | WordPart::SingleQuoted(_)
                    | WordPart::AnsiC(_)
                    | WordPart::Escaped(_)
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    /// Unquoted literal text.
    Literal(String),
    /// 'single quoted' - fully inert.
    SingleQuoted(String),
    /// "double quoted" - expansions allowed, no splitting or globbing.
    DoubleQuoted(Vec<WordPart>),
    /// $'ansi-c' with escapes already resolved.
    AnsiC(String),
    /// Backslash-escaped character (outside quotes).
    Escaped(String),
    /// $NAME, ${NAME...}.
    Parameter(ParamExpPart),
    /// $(cmd) or `cmd`.
    CommandSubst { body: ScriptNode, backquoted: bool },
    /// $((expr)).
    ArithSubst(ArithExprNode),
    /// <(cmd) or >(cmd).
    ProcessSubst { body: ScriptNode, direction: ProcessDirection },
    /// Leading ~ or ~user (word start or after : / = in assignments).
    Tilde(Option<String>),
    /// {a,b,c} / {1..9} group, expanded before everything else.
    Brace(Vec<BraceItem>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessDirection {
    /// <(cmd): the command writes, the path is read.
    Read,
    /// >(cmd): the command reads, the path is written.
    Write,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BraceItem {
    Word(WordNode),
    Range {
        start: i64,
        end: i64,
        step: i64,
        /// Zero-pad width carried over from `{01..10}` style endpoints.
        width: usize,
        /// Character range `{a..e}`.
        chars: bool,
    },
}

// =============================================================================
// PARAMETER EXPANSION
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ParamExpPart {
    pub name: String,
    pub subscript: Option<ParamSubscript>,
    /// ${!name...} indirection.
    pub indirect: bool,
    pub op: Option<ParamOp>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamSubscript {
    /// [@]
    At,
    /// [*]
    Star,
    /// [expr] - raw text, evaluated per the array flavor.
    Index(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamOp {
    /// ${x:-w} / ${x-w}
    Default { word: WordNode, colon: bool },
    /// ${x:=w} / ${x=w}
    Assign { word: WordNode, colon: bool },
    /// ${x:?w} / ${x?w}
    Error { word: Option<WordNode>, colon: bool },
    /// ${x:+w} / ${x+w}
    Alternative { word: WordNode, colon: bool },
    /// ${#x}
    Length,
    /// ${x:off[:len]}
    Substring { offset: ArithExprNode, length: Option<ArithExprNode> },
    /// ${x#p} ${x##p} ${x%p} ${x%%p}
    RemovePattern { pattern: WordNode, from_end: bool, greedy: bool },
    /// ${x/p/r} ${x//p/r} ${x/#p/r} ${x/%p/r}
    ReplacePattern {
        pattern: WordNode,
        replacement: Option<WordNode>,
        all: bool,
        anchor: Option<PatternAnchor>,
    },
    /// ${x^p} ${x^^p} ${x,p} ${x,,p} ${x~p} ${x~~p}
    CaseConvert { kind: CaseConvertKind, all: bool, pattern: Option<WordNode> },
    /// ${x@Q} and friends.
    Transform(char),
    /// ${!prefix*} / ${!prefix@}
    Names { star: bool },
    /// ${!arr[@]} / ${!arr[*]}
    Keys { star: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternAnchor {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseConvertKind {
    Upper,
    Lower,
    Toggle,
}

// =============================================================================
// ARITHMETIC
// =============================================================================

/// Parsed arithmetic expression plus its original text for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithExprNode {
    pub expr: ArithExpr,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(i64),
    /// Variable or array-element reference; values are themselves evaluated
    /// recursively as expressions, as bash does.
    Var(ArithLvalue),
    Unary { op: ArithUnaryOp, operand: Box<ArithExpr> },
    IncDec { inc: bool, prefix: bool, target: ArithLvalue },
    Binary { op: ArithBinaryOp, left: Box<ArithExpr>, right: Box<ArithExpr> },
    Ternary { cond: Box<ArithExpr>, then: Box<ArithExpr>, otherwise: Box<ArithExpr> },
    Assign { op: Option<ArithBinaryOp>, target: ArithLvalue, value: Box<ArithExpr> },
    /// $(cmd) embedded in an arithmetic context.
    CmdSubst(ScriptNode),
}

/// Assignable reference inside arithmetic: `name` or `name[subscript]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithLvalue {
    pub name: String,
    pub subscript: Option<Box<ArithExpr>>,
    /// Raw subscript text for associative arrays.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinaryOp {
    Add, Sub, Mul, Div, Mod, Pow,
    Shl, Shr,
    Lt, Le, Gt, Ge, Eq, Ne,
    BitAnd, BitXor, BitOr,
    LogAnd, LogOr,
    Comma,
}

// =============================================================================
// CONDITIONAL EXPRESSIONS ([[ ]])
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CondExprNode {
    And(Box<CondExprNode>, Box<CondExprNode>),
    Or(Box<CondExprNode>, Box<CondExprNode>),
    Not(Box<CondExprNode>),
    Unary { op: char, operand: WordNode },
    Binary { op: CondBinaryOp, left: WordNode, right: WordNode },
    /// Bare word: true iff it expands non-empty.
    Word(WordNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondBinaryOp {
    Eq,      // = / ==  (glob match)
    Ne,      // !=      (glob non-match)
    Match,   // =~      (regex, fills BASH_REMATCH)
    Lt,      // <       (lexicographic)
    Gt,      // >
    NumEq,   // -eq
    NumNe,   // -ne
    NumLt,   // -lt
    NumLe,   // -le
    NumGt,   // -gt
    NumGe,   // -ge
    NewerThan, // -nt
    OlderThan, // -ot
    SameFile,  // -ef
}

// skiff-parser - AST for Skiff
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Abstract syntax tree.
//!
//! A closed set of expression variants; the tree is a pure value with
//! strict parent→child ownership and a span on every node.

use std::fmt;

use crate::span::SourceSpan;

/// Binary operators that survive parsing. Compound assignment is desugared
/// by the parser and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    BitOr,
    BitXor,
    BitAnd,
    And,
    Or,
    Shl,
    Shr,
    /// Type/variant test, `a is T`.
    Is,
}

impl BinaryOp {
    /// Map an operator token's text to a binary operator.
    pub fn from_str(op: &str) -> Option<BinaryOp> {
        Some(match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Lte,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Gte,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Neq,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&" => BinaryOp::BitAnd,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "is" => BinaryOp::Is,
            _ => return None,
        })
    }
}

impl BinaryOp {
    /// The operator's source text.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Is => "is",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One part of an interpolated string template.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolatedPart {
    Text { value: String, span: SourceSpan },
    Expr(Expr),
}

/// A `match` arm pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `_`
    Discard { span: SourceSpan },
    /// A constant expression compared against the subject.
    Constant(Expr),
    /// `Name` or `Name(part, ...)`: a union variant (or type) test with
    /// optional positional parts that are either literals or binders.
    Variant {
        name: String,
        span: SourceSpan,
        parts: Option<Vec<Expr>>,
    },
}

impl Pattern {
    pub fn span(&self) -> &SourceSpan {
        match self {
            Pattern::Discard { span } => span,
            Pattern::Constant(expr) => expr.span(),
            Pattern::Variant { span, .. } => span,
        }
    }
}

/// One `pattern => body` arm of a `match`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: SourceSpan,
}

/// A function parameter: `name: Type`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: String,
    pub span: SourceSpan,
}

/// A named function definition (`fun`), free-standing or as a method.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub name_span: SourceSpan,
    /// Whether the parameter list started with `self`.
    pub has_self: bool,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Vec<Expr>,
    pub span: SourceSpan,
}

/// A field in a type definition: `pub mut name: Type = default`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub public: bool,
    pub mutable: bool,
    pub name: String,
    pub ty: String,
    pub default: Option<Expr>,
    pub span: SourceSpan,
}

/// A function signature inside a trait definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitFn {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub span: SourceSpan,
}

/// One variant of a union definition: `Name` or `Name(field, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    pub name: String,
    pub fields: Vec<String>,
    pub span: SourceSpan,
}

/// A `name = value` (or shorthand `name`) entry in an object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub name: String,
    pub value: Option<Expr>,
    pub span: SourceSpan,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int {
        value: i64,
        span: SourceSpan,
    },
    Double {
        value: f64,
        span: SourceSpan,
    },
    Str {
        value: String,
        span: SourceSpan,
    },
    Char {
        value: char,
        span: SourceSpan,
    },
    Bool {
        value: bool,
        span: SourceSpan,
    },
    Identifier {
        name: String,
        span: SourceSpan,
    },
    /// A keyword used in expression position (`self`, `clear`, `new`, ...).
    Keyword {
        name: String,
        span: SourceSpan,
    },
    /// A bare operator in value position.
    OperatorLit {
        text: String,
        span: SourceSpan,
    },
    /// A bare `.` in value position (shell-style path).
    Dot {
        span: SourceSpan,
    },
    Interpolated {
        parts: Vec<InterpolatedPart>,
        span: SourceSpan,
    },
    /// `(a, b, c)`: named tuple of identifiers.
    Tuple {
        parts: Vec<Expr>,
        span: SourceSpan,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        op_span: SourceSpan,
        right: Box<Expr>,
        span: SourceSpan,
    },
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
        span: SourceSpan,
    },
    Range {
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        inclusive: bool,
        span: SourceSpan,
    },
    /// Postfix `?`.
    InlineTry {
        body: Box<Expr>,
        span: SourceSpan,
    },
    /// Postfix `++`.
    Increment {
        target: Box<Expr>,
        span: SourceSpan,
    },
    /// Postfix `--`.
    Decrement {
        target: Box<Expr>,
        span: SourceSpan,
    },
    MemberAccess {
        object: Box<Expr>,
        property: Box<Expr>,
        span: SourceSpan,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: SourceSpan,
    },
    Block {
        body: Vec<Expr>,
        span: SourceSpan,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
        span: SourceSpan,
    },
    While {
        condition: Box<Expr>,
        body: Vec<Expr>,
        span: SourceSpan,
    },
    /// `for name in iterable { body }`
    For {
        binding: String,
        binding_span: SourceSpan,
        iterable: Box<Expr>,
        body: Vec<Expr>,
        span: SourceSpan,
    },
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
        span: SourceSpan,
    },
    Try {
        body: Box<Expr>,
        span: SourceSpan,
    },
    Defer {
        body: Box<Expr>,
        span: SourceSpan,
    },
    Return {
        value: Option<Box<Expr>>,
        span: SourceSpan,
    },
    Let {
        mutable: bool,
        name: String,
        name_span: SourceSpan,
        ty: Option<String>,
        value: Box<Expr>,
        span: SourceSpan,
    },
    Function(FunctionDef),
    /// `param => body` lambda in argument position.
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
        span: SourceSpan,
    },
    TypeDef {
        name: String,
        name_span: SourceSpan,
        fields: Vec<FieldDef>,
        methods: Vec<FunctionDef>,
        span: SourceSpan,
    },
    TraitDef {
        name: String,
        associated_types: Vec<String>,
        functions: Vec<TraitFn>,
        span: SourceSpan,
    },
    ImplBlock {
        trait_name: String,
        type_name: String,
        functions: Vec<FunctionDef>,
        span: SourceSpan,
    },
    UnionDef {
        name: String,
        variants: Vec<UnionVariant>,
        span: SourceSpan,
    },
    /// `[a, b, c]`
    ArrayLit {
        elements: Vec<Expr>,
        span: SourceSpan,
    },
    /// `{ a = 1, b }`: anonymous object.
    ObjectLit {
        fields: Vec<ObjectField>,
        span: SourceSpan,
    },
    /// `TypeName { a = 1 }`: typed object instantiation.
    Instantiate {
        type_name: String,
        type_span: SourceSpan,
        fields: Vec<ObjectField>,
        span: SourceSpan,
    },
    Use {
        path: String,
        span: SourceSpan,
    },
    Module {
        name: String,
        span: SourceSpan,
    },
    Open {
        path: String,
        span: SourceSpan,
    },
    /// `#name@version` package tag.
    Tag {
        name: String,
        version: Option<String>,
        span: SourceSpan,
    },
    Comment {
        text: String,
        span: SourceSpan,
    },
}

impl Expr {
    /// The source span of this node.
    pub fn span(&self) -> &SourceSpan {
        match self {
            Expr::Int { span, .. }
            | Expr::Double { span, .. }
            | Expr::Str { span, .. }
            | Expr::Char { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Keyword { span, .. }
            | Expr::OperatorLit { span, .. }
            | Expr::Dot { span }
            | Expr::Interpolated { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assignment { span, .. }
            | Expr::Range { span, .. }
            | Expr::InlineTry { span, .. }
            | Expr::Increment { span, .. }
            | Expr::Decrement { span, .. }
            | Expr::MemberAccess { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Block { span, .. }
            | Expr::If { span, .. }
            | Expr::While { span, .. }
            | Expr::For { span, .. }
            | Expr::Match { span, .. }
            | Expr::Try { span, .. }
            | Expr::Defer { span, .. }
            | Expr::Return { span, .. }
            | Expr::Let { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::TypeDef { span, .. }
            | Expr::TraitDef { span, .. }
            | Expr::ImplBlock { span, .. }
            | Expr::UnionDef { span, .. }
            | Expr::ArrayLit { span, .. }
            | Expr::ObjectLit { span, .. }
            | Expr::Instantiate { span, .. }
            | Expr::Use { span, .. }
            | Expr::Module { span, .. }
            | Expr::Open { span, .. }
            | Expr::Tag { span, .. }
            | Expr::Comment { span, .. } => span,
            Expr::Function(def) => &def.span,
        }
    }

    /// A short human-readable description, used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Expr::Int { .. } => "int literal",
            Expr::Double { .. } => "double literal",
            Expr::Str { .. } => "string literal",
            Expr::Char { .. } => "char literal",
            Expr::Bool { .. } => "boolean literal",
            Expr::Identifier { .. } => "identifier",
            Expr::Keyword { .. } => "keyword",
            Expr::OperatorLit { .. } => "operator",
            Expr::Dot { .. } => "dot",
            Expr::Interpolated { .. } => "string template",
            Expr::Tuple { .. } => "tuple",
            Expr::Binary { .. } => "binary expression",
            Expr::Assignment { .. } => "assignment",
            Expr::Range { .. } => "range",
            Expr::InlineTry { .. } => "inline try",
            Expr::Increment { .. } => "increment",
            Expr::Decrement { .. } => "decrement",
            Expr::MemberAccess { .. } => "member access",
            Expr::Call { .. } => "call",
            Expr::Index { .. } => "index expression",
            Expr::Block { .. } => "block",
            Expr::If { .. } => "if expression",
            Expr::While { .. } => "while loop",
            Expr::For { .. } => "for loop",
            Expr::Match { .. } => "match expression",
            Expr::Try { .. } => "try expression",
            Expr::Defer { .. } => "defer expression",
            Expr::Return { .. } => "return",
            Expr::Let { .. } => "let binding",
            Expr::Function(_) => "function definition",
            Expr::Lambda { .. } => "lambda",
            Expr::TypeDef { .. } => "type definition",
            Expr::TraitDef { .. } => "trait definition",
            Expr::ImplBlock { .. } => "impl block",
            Expr::UnionDef { .. } => "union definition",
            Expr::ArrayLit { .. } => "array literal",
            Expr::ObjectLit { .. } => "object literal",
            Expr::Instantiate { .. } => "object instantiation",
            Expr::Use { .. } => "use declaration",
            Expr::Module { .. } => "module declaration",
            Expr::Open { .. } => "open expression",
            Expr::Tag { .. } => "package tag",
            Expr::Comment { .. } => "comment",
        }
    }
}

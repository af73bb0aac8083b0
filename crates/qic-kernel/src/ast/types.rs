//! AST type definitions.

use std::fmt;
use std::rc::Rc;

/// A parsed block of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Bare expression, evaluated for its side effects.
    Expr(Expr),
    /// `a = b = value`: every target receives the value.
    Assign { targets: Vec<Target>, value: Expr },
    /// `target op= value`
    AugAssign { target: Target, op: BinaryOp, value: Expr },
    /// `del a, b['k']`
    Del(Vec<Target>),
    Pass,
    Break,
    Continue,
    Return(Option<Expr>),
    /// `import m [as n], ...`
    Import(Vec<ImportName>),
    /// `from m import a [as b], ...`
    FromImport { module: String, names: Vec<ImportName> },
    If(IfStmt),
    For(ForLoop),
    While(WhileLoop),
    /// `def name(params): body`
    Def(Rc<FunctionDef>),
}

/// A module or member name with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportName {
    /// The name bound in scope.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Conditional statement. `elif` chains nest in the else branch.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Vec<Stmt>,
    pub else_branch: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub target: Target,
    pub iter: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// A `def` or `lambda` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Lambda body: the expression's value is returned.
    Expr(Expr),
}

/// Something that can be assigned to or deleted.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Subscript { object: Box<Expr>, index: Box<Expr> },
    Tuple(Vec<Target>),
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    List(Vec<Expr>),
    /// Tuples evaluate to sequences.
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// `[element for ... if ...]`, also used for generator expressions.
    ListComp { element: Box<Expr>, clauses: Vec<CompClause> },
    DictComp { key: Box<Expr>, value: Box<Expr>, clauses: Vec<CompClause> },
    Attribute { object: Box<Expr>, name: String },
    Subscript { object: Box<Expr>, index: Box<Expr> },
    Slice {
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call { func: Box<Expr>, args: Vec<Arg> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    /// Short-circuit `and` / `or`.
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Not(Box<Expr>),
    /// Chained comparison: `a < b <= c`.
    Compare { left: Box<Expr>, rest: Vec<(CmpOp, Expr)> },
    Ternary { condition: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    Lambda(Rc<FunctionDef>),
}

impl Expr {
    /// True for names and subscript or attribute chains without calls.
    pub fn is_reference(&self) -> bool {
        match self {
            Expr::Name(_) => true,
            Expr::Attribute { object, .. } => object.is_reference(),
            Expr::Subscript { object, index } => {
                object.is_reference() && matches!(index.as_ref(), Expr::Literal(_))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompClause {
    For { target: Target, iter: Expr },
    If(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
    NotIn,
    Is,
    IsNot,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::LtEq => "<=",
            CmpOp::GtEq => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        })
    }
}

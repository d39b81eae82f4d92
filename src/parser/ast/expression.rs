use crate::{catalog::DataType, parser::ast::{Literal, SelectStatement}};

/// Binary operators as written; the planner maps them onto arithmetic,
/// comparison and logical nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixOperator {
    Minus,
    Plus,
    Not,
}

/// A parsed expression plus the optional `::type` written after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub type_cast: Option<DataType>,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self { kind, type_cast: None }
    }

    pub fn boxed(kind: ExpressionKind) -> Box<Self> {
        Box::new(Self::new(kind))
    }

    pub fn literal(value: Literal) -> Self {
        Self::new(ExpressionKind::Literal(value))
    }

    pub fn column(table: Option<&str>, column: &str) -> Self {
        Self::new(ExpressionKind::Column { table: table.map(str::to_string), column: column.to_string() })
    }
}

/// Call of a built-in function or a procedure, `name(args)`.
///
/// A foreign procedure call carries its `[dbid, procedure]` context:
/// `name['dbid', 'proc'](args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub distinct: bool,
    pub star: bool,
    pub foreign: Option<ForeignContext>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignContext {
    pub dbid: Box<Expression>,
    pub procedure: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenThen {
    pub when: Expression,
    pub then: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Literal(Literal),
    /// `$name` or `@name`, prefix included.
    Variable(String),
    Column { table: Option<String>, column: String },
    FunctionCall(FunctionCall),
    Binary { left: Box<Expression>, op: BinaryOperator, right: Box<Expression> },
    Prefix { op: PrefixOperator, expr: Box<Expression> },
    Between { expr: Box<Expression>, not: bool, lower: Box<Expression>, upper: Box<Expression> },
    /// `left IS [NOT] right` or `left IS [NOT] DISTINCT FROM right`.
    Is { left: Box<Expression>, not: bool, distinct: bool, right: Box<Expression> },
    InList { expr: Box<Expression>, not: bool, list: Vec<Expression> },
    InSubquery { expr: Box<Expression>, not: bool, subquery: Box<SelectStatement> },
    Like { expr: Box<Expression>, not: bool, case_insensitive: bool, pattern: Box<Expression> },
    Collate { expr: Box<Expression>, collation: String },
    Case { operand: Option<Box<Expression>>, branches: Vec<WhenThen>, else_expr: Option<Box<Expression>> },
    /// `(select ..)`, `EXISTS (select ..)` or `NOT EXISTS (select ..)`.
    Subquery { query: Box<SelectStatement>, exists: bool, not: bool },
    Parenthesized(Box<Expression>),
    Array(Vec<Expression>),
    ArrayAccess { array: Box<Expression>, index: Box<Expression> },
    FieldAccess { object: Box<Expression>, field: String },
}

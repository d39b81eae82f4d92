use crate::parser::ast::{Expression, FunctionCall};

/// A full statement with its optional `WITH` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub ctes: Vec<CommonTableExpression>,
    pub body: StatementBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementBody {
    Select(SelectStatement),
    /// DML statements are only recognized by their target table.
    Insert { table: String },
    Update { table: String },
    Delete { table: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommonTableExpression {
    pub name: String,
    pub columns: Vec<String>,
    pub query: SelectStatement,
}

/// One or more select cores joined by compound operators, then ordering and limit.
///
/// `compound_ops[i]` joins `cores[i]` and `cores[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub cores: Vec<SelectCore>,
    pub compound_ops: Vec<CompoundOperator>,
    pub ordering: Vec<OrderingTerm>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectCore {
    pub distinct: bool,
    pub columns: Vec<ResultColumn>,
    pub from: Option<TableSource>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultColumn {
    Expression { expr: Expression, alias: Option<String> },
    /// `*` or `table.*`
    Wildcard { table: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table { name: String, alias: Option<String> },
    Subquery { query: Box<SelectStatement>, alias: Option<String> },
    FunctionCall { call: FunctionCall, alias: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub source: TableSource,
    pub on: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderingTerm {
    pub expr: Expression,
    pub order: Option<OrderType>,
    pub nulls: Option<NullOrder>,
}

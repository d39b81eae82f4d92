use std::fmt::{self, Display};

use crate::{
    catalog::DataType,
    parser::ast::Literal,
    planner::{ArithmeticOperator, ComparisonOperator, LogicalOperator, LogicalPlan, SubqueryKind, UnaryOperator},
};

/// Reference to a column, optionally qualified by its relation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub parent: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(parent: Option<&str>, column: &str) -> Self {
        Self { parent: parent.map(str::to_string), column: column.to_string() }
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}.{}", parent, self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// A query used as a value.
///
/// `correlated` lists the outer columns this subquery reads. It is empty
/// when planned and filled in by the relation evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubqueryExpr {
    pub kind: SubqueryKind,
    pub plan: Box<LogicalPlan>,
    pub correlated: Vec<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalExpr {
    Literal {
        value: Literal,
        data_type: DataType,
    },

    /// `$name` / `@name`, prefix included.
    Variable {
        name: String,
    },

    ColumnRef(ColumnRef),

    AggregateFunctionCall {
        name: String,
        args: Vec<LogicalExpr>,
        star: bool,
        distinct: bool,
    },

    ScalarFunctionCall {
        name: String,
        args: Vec<LogicalExpr>,
    },

    /// Call of a schema procedure. Foreign calls carry `[dbid, procedure]`
    /// as their two contextual arguments.
    ProcedureCall {
        name: String,
        foreign: bool,
        args: Vec<LogicalExpr>,
        contextual_args: Vec<LogicalExpr>,
    },

    ArithmeticOp {
        left: Box<LogicalExpr>,
        op: ArithmeticOperator,
        right: Box<LogicalExpr>,
    },

    ComparisonOp {
        left: Box<LogicalExpr>,
        op: ComparisonOperator,
        right: Box<LogicalExpr>,
    },

    LogicalOp {
        left: Box<LogicalExpr>,
        op: LogicalOperator,
        right: Box<LogicalExpr>,
    },

    UnaryOp {
        op: UnaryOperator,
        expr: Box<LogicalExpr>,
    },

    TypeCast {
        expr: Box<LogicalExpr>,
        data_type: DataType,
    },

    Alias {
        expr: Box<LogicalExpr>,
        alias: String,
    },

    ArrayAccess {
        array: Box<LogicalExpr>,
        index: Box<LogicalExpr>,
    },

    ArrayConstructor {
        elements: Vec<LogicalExpr>,
    },

    FieldAccess {
        object: Box<LogicalExpr>,
        field: String,
    },

    Subquery(SubqueryExpr),
}

impl LogicalExpr {
    pub fn literal(value: Literal) -> Self {
        let data_type = value.data_type();
        LogicalExpr::Literal { value, data_type }
    }

    pub fn column(parent: Option<&str>, column: &str) -> Self {
        LogicalExpr::ColumnRef(ColumnRef::new(parent, column))
    }

    pub fn comparison(left: LogicalExpr, op: ComparisonOperator, right: LogicalExpr) -> Self {
        LogicalExpr::ComparisonOp { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn logical(left: LogicalExpr, op: LogicalOperator, right: LogicalExpr) -> Self {
        LogicalExpr::LogicalOp { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn not(expr: LogicalExpr) -> Self {
        LogicalExpr::UnaryOp { op: UnaryOperator::Not, expr: Box::new(expr) }
    }

    pub fn is_aggregate_call(&self) -> bool {
        matches!(self, LogicalExpr::AggregateFunctionCall { .. })
    }

    /// Direct sub-expressions, in rewrite order. Nested plans are not included.
    pub fn sub_exprs(&self) -> Vec<&LogicalExpr> {
        match self {
            LogicalExpr::Literal { .. }
            | LogicalExpr::Variable { .. }
            | LogicalExpr::ColumnRef(_)
            | LogicalExpr::Subquery(_) => vec![],
            LogicalExpr::AggregateFunctionCall { args, .. } | LogicalExpr::ScalarFunctionCall { args, .. } => {
                args.iter().collect()
            }
            LogicalExpr::ProcedureCall { args, contextual_args, .. } => {
                contextual_args.iter().chain(args.iter()).collect()
            }
            LogicalExpr::ArithmeticOp { left, right, .. }
            | LogicalExpr::ComparisonOp { left, right, .. }
            | LogicalExpr::LogicalOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            LogicalExpr::UnaryOp { expr, .. }
            | LogicalExpr::TypeCast { expr, .. }
            | LogicalExpr::Alias { expr, .. } => vec![expr.as_ref()],
            LogicalExpr::ArrayAccess { array, index } => vec![array.as_ref(), index.as_ref()],
            LogicalExpr::ArrayConstructor { elements } => elements.iter().collect(),
            LogicalExpr::FieldAccess { object, .. } => vec![object.as_ref()],
        }
    }

    /// Plans nested anywhere inside this expression, outermost first.
    pub fn plans(&self) -> Vec<&LogicalPlan> {
        if let LogicalExpr::Subquery(subquery) = self {
            return vec![subquery.plan.as_ref()];
        }
        self.sub_exprs().into_iter().flat_map(|e| e.plans()).collect()
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[LogicalExpr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", expr)?;
    }
    Ok(())
}

impl Display for LogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalExpr::Literal { value, .. } => write!(f, "{}", value),
            LogicalExpr::Variable { name } => f.write_str(name),
            LogicalExpr::ColumnRef(column) => write!(f, "{}", column),
            LogicalExpr::AggregateFunctionCall { name, args, star, distinct } => {
                write!(f, "{}(", name)?;
                if *star {
                    f.write_str("*")?;
                } else {
                    if *distinct {
                        f.write_str("distinct ")?;
                    }
                    write_list(f, args)?;
                }
                f.write_str(")")
            }
            LogicalExpr::ScalarFunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            LogicalExpr::ProcedureCall { name, foreign, args, contextual_args } => {
                f.write_str(name)?;
                if *foreign {
                    f.write_str("[")?;
                    write_list(f, contextual_args)?;
                    f.write_str("]")?;
                }
                f.write_str("(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            LogicalExpr::ArithmeticOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            LogicalExpr::ComparisonOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            LogicalExpr::LogicalOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            LogicalExpr::UnaryOp { op, expr } => write!(f, "{}{}", op, expr),
            LogicalExpr::TypeCast { expr, data_type } => write!(f, "{}::{}", expr, data_type),
            LogicalExpr::Alias { expr, alias } => write!(f, "{} AS {}", expr, alias),
            LogicalExpr::ArrayAccess { array, index } => write!(f, "{}[{}]", array, index),
            LogicalExpr::ArrayConstructor { elements } => {
                f.write_str("[")?;
                write_list(f, elements)?;
                f.write_str("]")
            }
            LogicalExpr::FieldAccess { object, field } => write!(f, "{}.{}", object, field),
            LogicalExpr::Subquery(subquery) => {
                write!(f, "[subquery ({}) ", subquery.kind)?;
                write_correlation(f, &subquery.correlated)?;
                f.write_str("]")
            }
        }
    }
}

/// `(uncorrelated)` or `(correlated: a.b, c)`.
pub(crate) fn write_correlation(f: &mut fmt::Formatter<'_>, correlated: &[ColumnRef]) -> fmt::Result {
    if correlated.is_empty() {
        return f.write_str("(uncorrelated)");
    }
    f.write_str("(correlated: ")?;
    for (i, column) in correlated.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", column)?;
    }
    f.write_str(")")
}

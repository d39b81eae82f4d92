use std::fmt::{self, Display};

use crate::planner::{logical_expr::write_correlation, ColumnRef, JoinType, LogicalExpr, SetOperationType};

/// Relational operator tree produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalPlan {
    /// Produces a single row with no columns (`SELECT 1`).
    EmptyScan,

    /// Reads a source under a visible relation name.
    Scan {
        source: ScanSource,
        alias: String,
    },

    /// Output expressions in SELECT order.
    Project {
        exprs: Vec<LogicalExpr>,
        child: Box<LogicalPlan>,
    },

    /// Row-level filter (WHERE or HAVING depending on position in the tree).
    Filter {
        condition: LogicalExpr,
        child: Box<LogicalPlan>,
    },

    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        condition: LogicalExpr,
    },

    Sort {
        sort_exprs: Vec<SortExpression>,
        child: Box<LogicalPlan>,
    },

    /// LIMIT / OFFSET
    Limit {
        limit: LogicalExpr,
        offset: Option<LogicalExpr>,
        child: Box<LogicalPlan>,
    },

    Distinct {
        child: Box<LogicalPlan>,
    },

    SetOperation {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        op: SetOperationType,
    },

    /// Group-by aggregation. No grouping expressions means one group.
    Aggregate {
        group_exprs: Vec<LogicalExpr>,
        aggregate_exprs: Vec<LogicalExpr>,
        child: Box<LogicalPlan>,
    },
}

/// Where a scan reads its rows from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScanSource {
    Table {
        table: String,
    },

    /// A table-returning procedure. Foreign procedures carry exactly two
    /// text contextual arguments, `[dbid, procedure]`.
    Procedure {
        procedure: String,
        args: Vec<LogicalExpr>,
        contextual_args: Vec<LogicalExpr>,
        foreign: bool,
    },

    /// A nested query; `correlated` is filled in by the relation evaluator.
    Subquery {
        plan: Box<LogicalPlan>,
        correlated: Vec<ColumnRef>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortExpression {
    pub expr: LogicalExpr,
    pub ascending: bool,
    pub nulls_last: bool,
}

impl LogicalPlan {
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    /// Plans directly below this one: input plans first, then plans nested
    /// in expressions and scan sources, in field order.
    pub fn plans(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::EmptyScan => vec![],
            LogicalPlan::Scan { source, .. } => source.plans(),
            LogicalPlan::Project { exprs, child } => {
                let mut plans = vec![child.as_ref()];
                plans.extend(exprs.iter().flat_map(|e| e.plans()));
                plans
            }
            LogicalPlan::Filter { condition, child } => {
                let mut plans = vec![child.as_ref()];
                plans.extend(condition.plans());
                plans
            }
            LogicalPlan::Join { left, right, condition, .. } => {
                let mut plans = vec![left.as_ref(), right.as_ref()];
                plans.extend(condition.plans());
                plans
            }
            LogicalPlan::Sort { sort_exprs, child } => {
                let mut plans = vec![child.as_ref()];
                plans.extend(sort_exprs.iter().flat_map(|s| s.expr.plans()));
                plans
            }
            LogicalPlan::Limit { limit, offset, child } => {
                let mut plans = vec![child.as_ref()];
                plans.extend(limit.plans());
                if let Some(offset) = offset {
                    plans.extend(offset.plans());
                }
                plans
            }
            LogicalPlan::Distinct { child } => vec![child.as_ref()],
            LogicalPlan::SetOperation { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            LogicalPlan::Aggregate { group_exprs, aggregate_exprs, child } => {
                let mut plans = vec![child.as_ref()];
                plans.extend(group_exprs.iter().flat_map(|e| e.plans()));
                plans.extend(aggregate_exprs.iter().flat_map(|e| e.plans()));
                plans
            }
        }
    }
}

impl ScanSource {
    pub fn plans(&self) -> Vec<&LogicalPlan> {
        match self {
            ScanSource::Table { .. } => vec![],
            ScanSource::Procedure { args, contextual_args, .. } => {
                contextual_args.iter().chain(args.iter()).flat_map(|e| e.plans()).collect()
            }
            ScanSource::Subquery { plan, .. } => vec![plan.as_ref()],
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ScanSource::Table { .. } => "Table",
            ScanSource::Procedure { .. } => "Procedure",
            ScanSource::Subquery { .. } => "Subquery",
        }
    }
}

fn join_exprs(exprs: &[LogicalExpr], separator: &str) -> String {
    exprs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(separator)
}

impl Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanSource::Table { table } => f.write_str(table),
            ScanSource::Procedure { procedure, args, contextual_args, foreign } => {
                write!(f, "[foreign={}] ", foreign)?;
                if *foreign && contextual_args.len() == 2 {
                    write!(f, "[dbid={}] [proc={}] ", contextual_args[0], contextual_args[1])?;
                }
                write!(f, "{}({})", procedure, join_exprs(args, ", "))
            }
            ScanSource::Subquery { correlated, .. } => write_correlation(f, correlated),
        }
    }
}

impl Display for LogicalPlan {
    /// One line describing this node only; children are rendered by [`crate::planner::format`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalPlan::EmptyScan => f.write_str("Empty Scan"),
            LogicalPlan::Scan { source: source @ ScanSource::Subquery { .. }, alias } => {
                write!(f, "Scan Subquery [alias={}] {}", alias, source)
            }
            LogicalPlan::Scan { source, alias } => {
                write!(f, "Scan {} [alias={}]: {}", source.kind(), alias, source)
            }
            LogicalPlan::Project { exprs, .. } => write!(f, "Projection: {}", join_exprs(exprs, ", ")),
            LogicalPlan::Filter { condition, .. } => write!(f, "Filter: {}", condition),
            LogicalPlan::Join { join_type, condition, .. } => write!(f, "Join [{}]: {}", join_type, condition),
            LogicalPlan::Sort { sort_exprs, .. } => {
                f.write_str("Sort:")?;
                for (i, sort) in sort_exprs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(
                        f,
                        " [{}] {} nulls {}",
                        sort.expr,
                        if sort.ascending { "asc" } else { "desc" },
                        if sort.nulls_last { "last" } else { "first" }
                    )?;
                }
                Ok(())
            }
            LogicalPlan::Limit { limit, offset, .. } => {
                f.write_str("Limit")?;
                if let Some(offset) = offset {
                    write!(f, " [offset={}]", offset)?;
                }
                write!(f, ": {}", limit)
            }
            LogicalPlan::Distinct { .. } => f.write_str("Distinct"),
            LogicalPlan::SetOperation { op, .. } => write!(f, "Set: {}", op),
            LogicalPlan::Aggregate { group_exprs, aggregate_exprs, .. } => {
                f.write_str("Aggregate")?;
                for expr in group_exprs {
                    write!(f, " [{}]", expr)?;
                }
                if !aggregate_exprs.is_empty() {
                    write!(f, ": {}", join_exprs(aggregate_exprs, "; "))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Literal;

    fn scan(table: &str) -> LogicalPlan {
        LogicalPlan::Scan { source: ScanSource::Table { table: table.into() }, alias: table.into() }
    }

    fn text(s: &str) -> LogicalExpr {
        LogicalExpr::literal(Literal::Text(s.into()))
    }

    #[test]
    fn node_lines() {
        assert_eq!(scan("users").to_string(), "Scan Table [alias=users]: users");

        let sort = LogicalPlan::Sort {
            sort_exprs: vec![
                SortExpression { expr: LogicalExpr::column(None, "a"), ascending: true, nulls_last: true },
                SortExpression { expr: LogicalExpr::column(None, "b"), ascending: false, nulls_last: false },
            ],
            child: scan("t").boxed(),
        };
        assert_eq!(sort.to_string(), "Sort: [a] asc nulls last; [b] desc nulls first");

        let limit = LogicalPlan::Limit {
            limit: LogicalExpr::literal(Literal::Int(10)),
            offset: Some(LogicalExpr::literal(Literal::Int(5))),
            child: scan("t").boxed(),
        };
        assert_eq!(limit.to_string(), "Limit [offset=5]: 10");

        let agg = LogicalPlan::Aggregate {
            group_exprs: vec![LogicalExpr::column(Some("a"), "c")],
            aggregate_exprs: vec![],
            child: scan("a").boxed(),
        };
        assert_eq!(agg.to_string(), "Aggregate [a.c]");
    }

    #[test]
    fn procedure_scans_show_foreign_context() {
        let local = LogicalPlan::Scan {
            source: ScanSource::Procedure {
                procedure: "owned".into(),
                args: vec![text("bob")],
                contextual_args: vec![],
                foreign: false,
            },
            alias: "o".into(),
        };
        assert_eq!(local.to_string(), "Scan Procedure [alias=o]: [foreign=false] owned('bob')");

        let foreign = LogicalPlan::Scan {
            source: ScanSource::Procedure {
                procedure: "owned".into(),
                args: vec![],
                contextual_args: vec![text("x"), text("y")],
                foreign: true,
            },
            alias: "o".into(),
        };
        assert_eq!(
            foreign.to_string(),
            "Scan Procedure [alias=o]: [foreign=true] [dbid='x'] [proc='y'] owned()"
        );
    }

    #[test]
    fn plans_lists_inputs_before_nested_queries() {
        let filter = LogicalPlan::Filter {
            condition: LogicalExpr::Subquery(crate::planner::SubqueryExpr {
                kind: crate::planner::SubqueryKind::Exists,
                plan: scan("inner").boxed(),
                correlated: vec![],
            }),
            child: scan("outer").boxed(),
        };
        let plans = filter.plans();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0], &scan("outer"));
        assert_eq!(plans[1], &scan("inner"));
    }
}

use tracing::debug;

use crate::{
    error::{PlanError, PlanResult},
    planner::{LogicalExpr, LogicalNode, LogicalPlan, ScanSource, SortExpression, SubqueryExpr},
};

pub type ExprCallback<'c> = Box<dyn Fn(LogicalExpr) -> PlanResult<LogicalExpr> + 'c>;
pub type PlanCallback<'c> = Box<dyn Fn(LogicalPlan) -> PlanResult<LogicalPlan> + 'c>;
pub type ScanSourceCallback<'c> = Box<dyn Fn(ScanSource) -> PlanResult<ScanSource> + 'c>;

/// Controls a [`rewrite`] pass. Missing callbacks leave their nodes unchanged.
#[derive(Default)]
pub struct RewriteConfig<'c> {
    pub expr_callback: Option<ExprCallback<'c>>,
    pub plan_callback: Option<PlanCallback<'c>>,
    pub scan_source_callback: Option<ScanSourceCallback<'c>>,
    /// Run a node's callback before its children are rewritten instead of after.
    pub callback_before_visit: bool,
    /// Visit a node's children in reverse field order.
    pub post_order_visit: bool,
}

impl<'c> RewriteConfig<'c> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expr_callback(mut self, callback: impl Fn(LogicalExpr) -> PlanResult<LogicalExpr> + 'c) -> Self {
        self.expr_callback = Some(Box::new(callback));
        self
    }

    pub fn with_plan_callback(mut self, callback: impl Fn(LogicalPlan) -> PlanResult<LogicalPlan> + 'c) -> Self {
        self.plan_callback = Some(Box::new(callback));
        self
    }

    pub fn with_scan_source_callback(
        mut self,
        callback: impl Fn(ScanSource) -> PlanResult<ScanSource> + 'c,
    ) -> Self {
        self.scan_source_callback = Some(Box::new(callback));
        self
    }

    pub fn callback_before_visit(mut self, before: bool) -> Self {
        self.callback_before_visit = before;
        self
    }

    pub fn post_order_visit(mut self, post_order: bool) -> Self {
        self.post_order_visit = post_order;
        self
    }
}

/// Rebuilds a tree, passing every node through the configured callbacks.
///
/// The input is consumed and the rebuilt tree returned. The first callback
/// error aborts the pass and is returned as is.
pub fn rewrite(node: LogicalNode, config: &RewriteConfig<'_>) -> PlanResult<LogicalNode> {
    debug!(
        before = config.callback_before_visit,
        post_order = config.post_order_visit,
        "rewriting logical tree"
    );
    Rewriter { config }.node(node)
}

pub fn rewrite_plan(plan: LogicalPlan, config: &RewriteConfig<'_>) -> PlanResult<LogicalPlan> {
    Rewriter { config }.plan(plan)
}

pub fn rewrite_expr(expr: LogicalExpr, config: &RewriteConfig<'_>) -> PlanResult<LogicalExpr> {
    Rewriter { config }.expr(expr)
}

struct Rewriter<'r, 'c> {
    config: &'r RewriteConfig<'c>,
}

impl Rewriter<'_, '_> {
    fn node(&self, node: LogicalNode) -> PlanResult<LogicalNode> {
        match node {
            LogicalNode::Plan(plan) => self.plan(plan).map(LogicalNode::Plan),
            LogicalNode::Expr(expr) => self.expr(expr).map(LogicalNode::Expr),
            LogicalNode::Source(source) => self.source(source).map(LogicalNode::Source),
        }
    }

    fn plan(&self, plan: LogicalPlan) -> PlanResult<LogicalPlan> {
        let callback = |plan| match &self.config.plan_callback {
            Some(callback) => callback(plan),
            None => Ok(plan),
        };

        if self.config.callback_before_visit {
            self.plan_fields(callback(plan)?)
        } else {
            callback(self.plan_fields(plan)?)
        }
    }

    fn expr(&self, expr: LogicalExpr) -> PlanResult<LogicalExpr> {
        let callback = |expr| match &self.config.expr_callback {
            Some(callback) => callback(expr),
            None => Ok(expr),
        };

        if self.config.callback_before_visit {
            self.expr_fields(callback(expr)?)
        } else {
            callback(self.expr_fields(expr)?)
        }
    }

    fn source(&self, source: ScanSource) -> PlanResult<ScanSource> {
        let callback = |source| match &self.config.scan_source_callback {
            Some(callback) => callback(source),
            None => Ok(source),
        };

        if self.config.callback_before_visit {
            self.source_fields(callback(source)?)
        } else {
            callback(self.source_fields(source)?)
        }
    }

    /// Rewrites `fields` in the configured order, returning them in their original positions.
    fn visit(&self, fields: Vec<LogicalNode>) -> PlanResult<std::vec::IntoIter<LogicalNode>> {
        let mut slots: Vec<Option<LogicalNode>> = fields.into_iter().map(Some).collect();
        let order: Vec<usize> = if self.config.post_order_visit {
            (0..slots.len()).rev().collect()
        } else {
            (0..slots.len()).collect()
        };

        for i in order {
            if let Some(node) = slots[i].take() {
                slots[i] = Some(self.node(node)?);
            }
        }

        Ok(slots.into_iter().flatten().collect::<Vec<_>>().into_iter())
    }

    fn plan_fields(&self, plan: LogicalPlan) -> PlanResult<LogicalPlan> {
        Ok(match plan {
            LogicalPlan::EmptyScan => LogicalPlan::EmptyScan,
            LogicalPlan::Scan { source, alias } => {
                let mut fields = self.visit(vec![source.into()])?;
                LogicalPlan::Scan { source: take_source(&mut fields)?, alias }
            }
            LogicalPlan::Project { exprs, child } => {
                let count = exprs.len();
                let mut fields = self.visit(with_child(*child, exprs))?;
                let child = take_plan(&mut fields)?.boxed();
                LogicalPlan::Project { exprs: take_exprs(&mut fields, count)?, child }
            }
            LogicalPlan::Filter { condition, child } => {
                let mut fields = self.visit(vec![(*child).into(), condition.into()])?;
                let child = take_plan(&mut fields)?.boxed();
                LogicalPlan::Filter { condition: take_expr(&mut fields)?, child }
            }
            LogicalPlan::Join { left, right, join_type, condition } => {
                let mut fields = self.visit(vec![(*left).into(), (*right).into(), condition.into()])?;
                LogicalPlan::Join {
                    left: take_plan(&mut fields)?.boxed(),
                    right: take_plan(&mut fields)?.boxed(),
                    join_type,
                    condition: take_expr(&mut fields)?,
                }
            }
            LogicalPlan::Sort { sort_exprs, child } => {
                let directions: Vec<(bool, bool)> = sort_exprs.iter().map(|s| (s.ascending, s.nulls_last)).collect();
                let exprs = sort_exprs.into_iter().map(|s| s.expr).collect();
                let mut fields = self.visit(with_child(*child, exprs))?;
                let child = take_plan(&mut fields)?.boxed();
                let sort_exprs = directions
                    .into_iter()
                    .map(|(ascending, nulls_last)| {
                        Ok(SortExpression { expr: take_expr(&mut fields)?, ascending, nulls_last })
                    })
                    .collect::<PlanResult<Vec<_>>>()?;
                LogicalPlan::Sort { sort_exprs, child }
            }
            LogicalPlan::Limit { limit, offset, child } => {
                let has_offset = offset.is_some();
                let mut nodes = vec![(*child).into(), limit.into()];
                nodes.extend(offset.map(LogicalNode::Expr));
                let mut fields = self.visit(nodes)?;
                let child = take_plan(&mut fields)?.boxed();
                let limit = take_expr(&mut fields)?;
                let offset = if has_offset { Some(take_expr(&mut fields)?) } else { None };
                LogicalPlan::Limit { limit, offset, child }
            }
            LogicalPlan::Distinct { child } => {
                let mut fields = self.visit(vec![(*child).into()])?;
                LogicalPlan::Distinct { child: take_plan(&mut fields)?.boxed() }
            }
            LogicalPlan::SetOperation { left, right, op } => {
                let mut fields = self.visit(vec![(*left).into(), (*right).into()])?;
                LogicalPlan::SetOperation {
                    left: take_plan(&mut fields)?.boxed(),
                    right: take_plan(&mut fields)?.boxed(),
                    op,
                }
            }
            LogicalPlan::Aggregate { group_exprs, aggregate_exprs, child } => {
                let (groups, aggregates) = (group_exprs.len(), aggregate_exprs.len());
                let mut exprs = group_exprs;
                exprs.extend(aggregate_exprs);
                let mut fields = self.visit(with_child(*child, exprs))?;
                let child = take_plan(&mut fields)?.boxed();
                LogicalPlan::Aggregate {
                    group_exprs: take_exprs(&mut fields, groups)?,
                    aggregate_exprs: take_exprs(&mut fields, aggregates)?,
                    child,
                }
            }
        })
    }

    fn source_fields(&self, source: ScanSource) -> PlanResult<ScanSource> {
        Ok(match source {
            ScanSource::Table { table } => ScanSource::Table { table },
            ScanSource::Procedure { procedure, args, contextual_args, foreign } => {
                let (contextual, count) = (contextual_args.len(), args.len());
                let mut exprs = contextual_args;
                exprs.extend(args);
                let mut fields = self.visit(exprs.into_iter().map(LogicalNode::Expr).collect())?;
                ScanSource::Procedure {
                    procedure,
                    contextual_args: take_exprs(&mut fields, contextual)?,
                    args: take_exprs(&mut fields, count)?,
                    foreign,
                }
            }
            ScanSource::Subquery { plan, correlated } => {
                let mut fields = self.visit(vec![(*plan).into()])?;
                ScanSource::Subquery { plan: take_plan(&mut fields)?.boxed(), correlated }
            }
        })
    }

    fn expr_fields(&self, expr: LogicalExpr) -> PlanResult<LogicalExpr> {
        Ok(match expr {
            LogicalExpr::Literal { .. } | LogicalExpr::Variable { .. } | LogicalExpr::ColumnRef(_) => expr,
            LogicalExpr::AggregateFunctionCall { name, args, star, distinct } => {
                let args = self.expr_list(args)?;
                LogicalExpr::AggregateFunctionCall { name, args, star, distinct }
            }
            LogicalExpr::ScalarFunctionCall { name, args } => {
                LogicalExpr::ScalarFunctionCall { name, args: self.expr_list(args)? }
            }
            LogicalExpr::ProcedureCall { name, foreign, args, contextual_args } => {
                let (contextual, count) = (contextual_args.len(), args.len());
                let mut exprs = contextual_args;
                exprs.extend(args);
                let mut fields = self.visit(exprs.into_iter().map(LogicalNode::Expr).collect())?;
                LogicalExpr::ProcedureCall {
                    name,
                    foreign,
                    contextual_args: take_exprs(&mut fields, contextual)?,
                    args: take_exprs(&mut fields, count)?,
                }
            }
            LogicalExpr::ArithmeticOp { left, op, right } => {
                let (left, right) = self.pair(*left, *right)?;
                LogicalExpr::ArithmeticOp { left, op, right }
            }
            LogicalExpr::ComparisonOp { left, op, right } => {
                let (left, right) = self.pair(*left, *right)?;
                LogicalExpr::ComparisonOp { left, op, right }
            }
            LogicalExpr::LogicalOp { left, op, right } => {
                let (left, right) = self.pair(*left, *right)?;
                LogicalExpr::LogicalOp { left, op, right }
            }
            LogicalExpr::UnaryOp { op, expr } => LogicalExpr::UnaryOp { op, expr: Box::new(self.expr(*expr)?) },
            LogicalExpr::TypeCast { expr, data_type } => {
                LogicalExpr::TypeCast { expr: Box::new(self.expr(*expr)?), data_type }
            }
            LogicalExpr::Alias { expr, alias } => LogicalExpr::Alias { expr: Box::new(self.expr(*expr)?), alias },
            LogicalExpr::ArrayAccess { array, index } => {
                let (array, index) = self.pair(*array, *index)?;
                LogicalExpr::ArrayAccess { array, index }
            }
            LogicalExpr::ArrayConstructor { elements } => {
                LogicalExpr::ArrayConstructor { elements: self.expr_list(elements)? }
            }
            LogicalExpr::FieldAccess { object, field } => {
                LogicalExpr::FieldAccess { object: Box::new(self.expr(*object)?), field }
            }
            LogicalExpr::Subquery(SubqueryExpr { kind, plan, correlated }) => {
                let plan = self.plan(*plan)?.boxed();
                LogicalExpr::Subquery(SubqueryExpr { kind, plan, correlated })
            }
        })
    }

    fn expr_list(&self, exprs: Vec<LogicalExpr>) -> PlanResult<Vec<LogicalExpr>> {
        let count = exprs.len();
        let mut fields = self.visit(exprs.into_iter().map(LogicalNode::Expr).collect())?;
        take_exprs(&mut fields, count)
    }

    fn pair(&self, left: LogicalExpr, right: LogicalExpr) -> PlanResult<(Box<LogicalExpr>, Box<LogicalExpr>)> {
        let mut fields = self.visit(vec![left.into(), right.into()])?;
        Ok((Box::new(take_expr(&mut fields)?), Box::new(take_expr(&mut fields)?)))
    }
}

fn with_child(child: LogicalPlan, exprs: Vec<LogicalExpr>) -> Vec<LogicalNode> {
    let mut nodes = Vec::with_capacity(exprs.len() + 1);
    nodes.push(LogicalNode::Plan(child));
    nodes.extend(exprs.into_iter().map(LogicalNode::Expr));
    nodes
}

fn take_plan(fields: &mut impl Iterator<Item = LogicalNode>) -> PlanResult<LogicalPlan> {
    fields
        .next()
        .and_then(LogicalNode::into_plan)
        .ok_or_else(|| PlanError::Rewrite("expected a plan in this position".into()))
}

fn take_expr(fields: &mut impl Iterator<Item = LogicalNode>) -> PlanResult<LogicalExpr> {
    fields
        .next()
        .and_then(LogicalNode::into_expr)
        .ok_or_else(|| PlanError::Rewrite("expected an expression in this position".into()))
}

fn take_source(fields: &mut impl Iterator<Item = LogicalNode>) -> PlanResult<ScanSource> {
    fields
        .next()
        .and_then(LogicalNode::into_source)
        .ok_or_else(|| PlanError::Rewrite("expected a scan source in this position".into()))
}

fn take_exprs(fields: &mut impl Iterator<Item = LogicalNode>, count: usize) -> PlanResult<Vec<LogicalExpr>> {
    (0..count).map(|_| take_expr(fields)).collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        parser::ast::Literal,
        planner::{format, ArithmeticOperator, ColumnRef, ComparisonOperator},
    };

    fn scan(table: &str) -> LogicalPlan {
        LogicalPlan::Scan { source: ScanSource::Table { table: table.into() }, alias: table.into() }
    }

    fn int(i: i64) -> LogicalExpr {
        LogicalExpr::literal(Literal::Int(i))
    }

    fn add(left: LogicalExpr, right: LogicalExpr) -> LogicalExpr {
        LogicalExpr::ArithmeticOp { left: Box::new(left), op: ArithmeticOperator::Add, right: Box::new(right) }
    }

    fn sample() -> LogicalPlan {
        LogicalPlan::Project {
            exprs: vec![LogicalExpr::column(None, "id"), add(int(1), int(2))],
            child: LogicalPlan::Filter {
                condition: LogicalExpr::comparison(
                    LogicalExpr::column(None, "age"),
                    ComparisonOperator::GreaterThan,
                    int(18),
                ),
                child: scan("users").boxed(),
            }
            .boxed(),
        }
    }

    #[test]
    fn identity_rewrite_returns_the_same_tree() {
        let rewritten = rewrite(sample().into(), &RewriteConfig::new()).unwrap();
        assert_eq!(rewritten, LogicalNode::Plan(sample()));
    }

    #[test]
    fn expression_callback_qualifies_columns() {
        let config = RewriteConfig::new().with_expr_callback(|expr| {
            Ok(match expr {
                LogicalExpr::ColumnRef(ColumnRef { parent: None, column }) => {
                    LogicalExpr::ColumnRef(ColumnRef { parent: Some("users".into()), column })
                }
                other => other,
            })
        });

        let plan = rewrite_plan(sample(), &config).unwrap();
        assert_eq!(
            format(&plan, 0),
            "Projection: users.id, 1 + 2\n  Filter: users.age > 18\n    Scan Table [alias=users]: users\n"
        );
    }

    #[test]
    fn plan_callback_can_drop_nodes() {
        let config = RewriteConfig::new().with_plan_callback(|plan| {
            Ok(match plan {
                LogicalPlan::Filter { child, .. } => *child,
                other => other,
            })
        });

        let plan = rewrite_plan(sample(), &config).unwrap();
        assert_eq!(format(&plan, 0), "Projection: id, 1 + 2\n  Scan Table [alias=users]: users\n");
    }

    #[test]
    fn callback_errors_abort_the_rewrite() {
        let config = RewriteConfig::new().with_scan_source_callback(|source| match source {
            ScanSource::Table { table } if table == "users" => Err(PlanError::Rewrite("users is off limits".into())),
            other => Ok(other),
        });

        match rewrite_plan(sample(), &config) {
            Err(PlanError::Rewrite(msg)) => assert_eq!(msg, "users is off limits"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn visit_order_follows_configuration() {
        let expr = add(int(1), int(2));

        let run = |before: bool, post_order: bool| {
            let seen = RefCell::new(Vec::new());
            let config = RewriteConfig::new()
                .with_expr_callback(|e| {
                    seen.borrow_mut().push(e.to_string());
                    Ok(e)
                })
                .callback_before_visit(before)
                .post_order_visit(post_order);
            rewrite_expr(expr.clone(), &config).unwrap();
            drop(config);
            seen.into_inner()
        };

        assert_eq!(run(false, false), vec!["1", "2", "1 + 2"]);
        assert_eq!(run(true, false), vec!["1 + 2", "1", "2"]);
        assert_eq!(run(false, true), vec!["2", "1", "1 + 2"]);
    }

    #[test]
    fn nested_plans_are_rewritten() {
        let sub = LogicalExpr::Subquery(SubqueryExpr {
            kind: crate::planner::SubqueryKind::Scalar,
            plan: scan("posts").boxed(),
            correlated: vec![],
        });
        let plan = LogicalPlan::Project { exprs: vec![sub], child: LogicalPlan::EmptyScan.boxed() };

        let renamed = RewriteConfig::new().with_scan_source_callback(|source| {
            Ok(match source {
                ScanSource::Table { table } => ScanSource::Table { table: table.to_uppercase() },
                other => other,
            })
        });
        let plan = rewrite_plan(plan, &renamed).unwrap();
        assert_eq!(
            format(&plan, 0),
            "Projection: [subquery (scalar) (uncorrelated)]\n  Empty Scan\n  Scan Table [alias=posts]: POSTS\n"
        );
    }
}

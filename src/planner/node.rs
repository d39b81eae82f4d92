use std::fmt::{self, Display};

use crate::planner::{LogicalExpr, LogicalPlan, ScanSource};

/// Owned node of any IR category, the unit the rewrite engine works on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalNode {
    Plan(LogicalPlan),
    Expr(LogicalExpr),
    Source(ScanSource),
}

/// Borrowed view of a node, used for read-only traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    Plan(&'a LogicalPlan),
    Expr(&'a LogicalExpr),
    Source(&'a ScanSource),
}

impl LogicalNode {
    pub fn as_node_ref(&self) -> NodeRef<'_> {
        match self {
            LogicalNode::Plan(plan) => NodeRef::Plan(plan),
            LogicalNode::Expr(expr) => NodeRef::Expr(expr),
            LogicalNode::Source(source) => NodeRef::Source(source),
        }
    }

    pub fn children(&self) -> Vec<NodeRef<'_>> {
        self.as_node_ref().children()
    }

    pub fn into_plan(self) -> Option<LogicalPlan> {
        match self {
            LogicalNode::Plan(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn into_expr(self) -> Option<LogicalExpr> {
        match self {
            LogicalNode::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn into_source(self) -> Option<ScanSource> {
        match self {
            LogicalNode::Source(source) => Some(source),
            _ => None,
        }
    }
}

impl From<LogicalPlan> for LogicalNode {
    fn from(plan: LogicalPlan) -> Self {
        LogicalNode::Plan(plan)
    }
}

impl From<LogicalExpr> for LogicalNode {
    fn from(expr: LogicalExpr) -> Self {
        LogicalNode::Expr(expr)
    }
}

impl From<ScanSource> for LogicalNode {
    fn from(source: ScanSource) -> Self {
        LogicalNode::Source(source)
    }
}

impl<'a> NodeRef<'a> {
    /// Direct children in the order the rewrite engine visits them.
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        match *self {
            NodeRef::Plan(plan) => plan_children(plan),
            NodeRef::Expr(expr) => match expr {
                LogicalExpr::Subquery(subquery) => vec![NodeRef::Plan(&subquery.plan)],
                _ => expr.sub_exprs().into_iter().map(NodeRef::Expr).collect(),
            },
            NodeRef::Source(source) => match source {
                ScanSource::Table { .. } => vec![],
                ScanSource::Procedure { args, contextual_args, .. } => {
                    contextual_args.iter().chain(args.iter()).map(NodeRef::Expr).collect()
                }
                ScanSource::Subquery { plan, .. } => vec![NodeRef::Plan(plan)],
            },
        }
    }
}

fn exprs(list: &[LogicalExpr]) -> impl Iterator<Item = NodeRef<'_>> {
    list.iter().map(NodeRef::Expr)
}

fn plan_children(plan: &LogicalPlan) -> Vec<NodeRef<'_>> {
    match plan {
        LogicalPlan::EmptyScan => vec![],
        LogicalPlan::Scan { source, .. } => vec![NodeRef::Source(source)],
        LogicalPlan::Project { exprs: list, child } => {
            let mut children = vec![NodeRef::Plan(child)];
            children.extend(exprs(list));
            children
        }
        LogicalPlan::Filter { condition, child } => vec![NodeRef::Plan(child), NodeRef::Expr(condition)],
        LogicalPlan::Join { left, right, condition, .. } => {
            vec![NodeRef::Plan(left), NodeRef::Plan(right), NodeRef::Expr(condition)]
        }
        LogicalPlan::Sort { sort_exprs, child } => {
            let mut children = vec![NodeRef::Plan(child)];
            children.extend(sort_exprs.iter().map(|s| NodeRef::Expr(&s.expr)));
            children
        }
        LogicalPlan::Limit { limit, offset, child } => {
            let mut children = vec![NodeRef::Plan(child), NodeRef::Expr(limit)];
            if let Some(offset) = offset {
                children.push(NodeRef::Expr(offset));
            }
            children
        }
        LogicalPlan::Distinct { child } => vec![NodeRef::Plan(child)],
        LogicalPlan::SetOperation { left, right, .. } => vec![NodeRef::Plan(left), NodeRef::Plan(right)],
        LogicalPlan::Aggregate { group_exprs, aggregate_exprs, child } => {
            let mut children = vec![NodeRef::Plan(child)];
            children.extend(exprs(group_exprs));
            children.extend(exprs(aggregate_exprs));
            children
        }
    }
}

impl Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Plan(plan) => write!(f, "{}", plan),
            NodeRef::Expr(expr) => write!(f, "{}", expr),
            NodeRef::Source(source) => write!(f, "{}", source),
        }
    }
}

impl Display for LogicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_node_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::ast::Literal, planner::SortExpression};

    #[test]
    fn children_follow_field_order() {
        let limit = LogicalPlan::Limit {
            limit: LogicalExpr::literal(Literal::Int(1)),
            offset: Some(LogicalExpr::literal(Literal::Int(2))),
            child: LogicalPlan::EmptyScan.boxed(),
        };
        let node = LogicalNode::from(limit);
        let rendered: Vec<String> = node.children().iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec!["Empty Scan", "1", "2"]);
    }

    #[test]
    fn sort_children_are_sort_keys() {
        let sort = LogicalPlan::Sort {
            sort_exprs: vec![SortExpression { expr: LogicalExpr::column(None, "a"), ascending: true, nulls_last: true }],
            child: LogicalPlan::EmptyScan.boxed(),
        };
        let children = NodeRef::Plan(&sort).children();
        assert_eq!(children.len(), 2);
        assert!(matches!(children[1], NodeRef::Expr(LogicalExpr::ColumnRef(_))));
    }
}

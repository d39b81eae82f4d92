use std::collections::HashMap;

use crate::{
    error::{PlanError, PlanResult},
    planner::{ColumnRef, LogicalExpr},
};

type ColumnKey = (Option<String>, String);

/// Enforces GROUP BY rules on expressions computed over an aggregate.
///
/// Every GROUP BY expression is flattened in pre-order with its column
/// references stripped out and indexed under each column it reads. An
/// expression is legal when each column it reads outside an aggregate call
/// sits inside an exact copy of one of those flattened GROUP BY expressions.
#[derive(Debug, Default)]
pub struct AggregateChecker {
    // per column, flattened GROUP BY expressions, longest first
    included: HashMap<ColumnKey, Vec<Vec<LogicalExpr>>>,
}

impl AggregateChecker {
    pub fn new(group_by: &[LogicalExpr]) -> PlanResult<Self> {
        let mut included: HashMap<ColumnKey, Vec<Vec<LogicalExpr>>> = HashMap::new();

        for expr in group_by {
            let mut columns = Vec::new();
            let mut nodes = Vec::new();
            flatten_group_term(expr, &mut columns, &mut nodes)?;

            let owned: Vec<LogicalExpr> = nodes.into_iter().cloned().collect();
            for column in columns {
                included.entry(key(column)).or_default().push(owned.clone());
            }
        }

        for sequences in included.values_mut() {
            sequences.sort_by(|a, b| b.len().cmp(&a.len()));
        }

        Ok(Self { included })
    }

    pub fn check_many(&self, exprs: &[LogicalExpr]) -> PlanResult<()> {
        exprs.iter().try_for_each(|e| self.check(e))
    }

    pub fn check(&self, expr: &LogicalExpr) -> PlanResult<()> {
        let mut columns = Vec::new();
        let mut traversed = Vec::new();
        flatten_checked(expr, &mut columns, &mut traversed);

        if columns.is_empty() {
            return Ok(());
        }

        // cheap pass first: every column needs some GROUP BY entry at all
        if let Some(missing) = columns.iter().find(|c| !self.included.contains_key(&key(c))) {
            return Err(not_grouped(missing));
        }

        // one cut per occurrence, so a column read twice needs two matches
        for column in &columns {
            let sequences = self.included.get(&key(column)).map(Vec::as_slice).unwrap_or_default();
            let found = sequences.iter().any(|sequence| cut_from(&mut traversed, sequence, |a, b| *a == b));
            if !found {
                return Err(not_grouped(column));
            }
        }

        Ok(())
    }

    /// Columns a nested query reads from the grouped relation. Each one must
    /// be a GROUP BY term by itself, written qualified or bare.
    pub fn check_outer_columns(&self, columns: &[ColumnRef]) -> PlanResult<()> {
        match columns.iter().find(|c| !self.is_grouped(c) && !self.is_grouped(&ColumnRef::new(None, &c.column))) {
            Some(column) => Err(not_grouped(column)),
            None => Ok(()),
        }
    }

    fn is_grouped(&self, column: &ColumnRef) -> bool {
        self.included.get(&key(column)).is_some_and(|sequences| sequences.iter().any(Vec::is_empty))
    }
}

fn key(column: &ColumnRef) -> ColumnKey {
    (column.parent.clone(), column.column.clone())
}

fn not_grouped(column: &ColumnRef) -> PlanError {
    PlanError::Aggregation(format!("column {} must be included in GROUP BY clause", column))
}

fn flatten_group_term<'e>(
    expr: &'e LogicalExpr,
    columns: &mut Vec<&'e ColumnRef>,
    nodes: &mut Vec<&'e LogicalExpr>,
) -> PlanResult<()> {
    match expr {
        LogicalExpr::AggregateFunctionCall { .. } => {
            Err(PlanError::Aggregation("aggregate functions are not allowed in GROUP BY clause".into()))
        }
        LogicalExpr::Subquery(_) => Err(PlanError::Aggregation("subqueries are not allowed in GROUP BY clause".into())),
        LogicalExpr::ColumnRef(column) => {
            columns.push(column);
            Ok(())
        }
        _ => {
            nodes.push(expr);
            expr.sub_exprs().into_iter().try_for_each(|e| flatten_group_term(e, columns, nodes))
        }
    }
}

fn flatten_checked<'e>(expr: &'e LogicalExpr, columns: &mut Vec<&'e ColumnRef>, nodes: &mut Vec<&'e LogicalExpr>) {
    match expr {
        // whatever an aggregate reads is already legal
        LogicalExpr::AggregateFunctionCall { .. } => {}
        LogicalExpr::ColumnRef(column) => columns.push(column),
        _ => {
            nodes.push(expr);
            for sub in expr.sub_exprs() {
                flatten_checked(sub, columns, nodes);
            }
        }
    }
}

/// Removes the first contiguous run of `haystack` equal to `needle`.
/// Returns false and leaves `haystack` untouched when there is none.
pub(crate) fn cut_from<T, U>(haystack: &mut Vec<T>, needle: &[U], equal: impl Fn(&T, &U) -> bool) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }

    let found = (0..=haystack.len() - needle.len())
        .find(|&start| haystack[start..start + needle.len()].iter().zip(needle).all(|(a, b)| equal(a, b)));

    match found {
        Some(start) => {
            haystack.drain(start..start + needle.len());
            true
        }
        None => false,
    }
}

/// Top-level aggregate calls in `expr`, without looking inside other
/// aggregates or nested queries.
pub fn aggregate_terms(expr: &LogicalExpr) -> Vec<LogicalExpr> {
    let mut terms = Vec::new();
    collect_aggregates(expr, &mut terms);
    terms
}

fn collect_aggregates(expr: &LogicalExpr, terms: &mut Vec<LogicalExpr>) {
    match expr {
        LogicalExpr::AggregateFunctionCall { .. } => terms.push(expr.clone()),
        LogicalExpr::Subquery(_) => {}
        _ => {
            for sub in expr.sub_exprs() {
                collect_aggregates(sub, terms);
            }
        }
    }
}

/// Appends the calls of `b` that are not already in `a`.
///
/// Two calls are the same when their display strings match and their
/// flattened trees, ignoring nested queries, are equal.
pub fn merge_aggregates(a: Vec<LogicalExpr>, b: Vec<LogicalExpr>) -> Vec<LogicalExpr> {
    let mut merged = a;
    for candidate in b {
        let display = candidate.to_string();
        let flat = flatten_without_subqueries(&candidate);
        let duplicate = merged
            .iter()
            .any(|existing| existing.to_string() == display && flatten_without_subqueries(existing) == flat);
        if !duplicate {
            merged.push(candidate);
        }
    }
    merged
}

fn flatten_without_subqueries(expr: &LogicalExpr) -> Vec<&LogicalExpr> {
    fn walk<'e>(expr: &'e LogicalExpr, out: &mut Vec<&'e LogicalExpr>) {
        if let LogicalExpr::Subquery(_) = expr {
            return;
        }
        out.push(expr);
        for sub in expr.sub_exprs() {
            walk(sub, out);
        }
    }

    let mut out = Vec::new();
    walk(expr, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parser::ast::Literal,
        planner::{ArithmeticOperator, LogicalPlan, SubqueryExpr, SubqueryKind},
    };

    fn col(parent: &str, name: &str) -> LogicalExpr {
        LogicalExpr::column(Some(parent), name)
    }

    fn sum(arg: LogicalExpr) -> LogicalExpr {
        LogicalExpr::AggregateFunctionCall { name: "sum".into(), args: vec![arg], star: false, distinct: false }
    }

    fn add(left: LogicalExpr, right: LogicalExpr) -> LogicalExpr {
        LogicalExpr::ArithmeticOp { left: Box::new(left), op: ArithmeticOperator::Add, right: Box::new(right) }
    }

    fn int(i: i64) -> LogicalExpr {
        LogicalExpr::literal(Literal::Int(i))
    }

    #[test]
    fn grouped_column_with_aggregate_is_allowed() {
        let checker = AggregateChecker::new(&[col("a", "c")]).unwrap();
        checker.check(&add(col("a", "c"), sum(col("a", "b")))).unwrap();
        checker.check(&sum(col("a", "b"))).unwrap();
        checker.check(&int(1)).unwrap();
    }

    #[test]
    fn ungrouped_column_is_rejected() {
        let checker = AggregateChecker::new(&[col("a", "b")]).unwrap();
        match checker.check(&col("a", "c")) {
            Err(PlanError::Aggregation(msg)) => assert_eq!(msg, "column a.c must be included in GROUP BY clause"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn grouped_expression_must_appear_whole() {
        let checker = AggregateChecker::new(&[add(col("a", "c"), int(1))]).unwrap();

        checker.check(&add(col("a", "c"), int(1))).unwrap();
        // (a.c + 1) + 2 still contains the grouped expression
        checker.check(&add(add(col("a", "c"), int(1)), int(2))).unwrap();

        assert!(checker.check(&col("a", "c")).is_err());
        assert!(checker.check(&add(col("a", "c"), int(2))).is_err());
    }

    #[test]
    fn every_occurrence_needs_its_own_match() {
        let checker = AggregateChecker::new(&[add(col("a", "c"), int(1))]).unwrap();
        // the second bare a.c has nothing left to cut
        let twice = add(add(col("a", "c"), int(1)), col("a", "c"));
        assert!(checker.check(&twice).is_err());

        let both = add(add(col("a", "c"), int(1)), add(col("a", "c"), int(1)));
        checker.check(&both).unwrap();
    }

    #[test]
    fn group_by_rejects_aggregates_and_subqueries() {
        match AggregateChecker::new(&[sum(col("a", "b"))]) {
            Err(PlanError::Aggregation(msg)) => assert_eq!(msg, "aggregate functions are not allowed in GROUP BY clause"),
            other => panic!("unexpected {other:?}"),
        }

        let sub = LogicalExpr::Subquery(SubqueryExpr {
            kind: SubqueryKind::Scalar,
            plan: Box::new(LogicalPlan::EmptyScan),
            correlated: vec![],
        });
        match AggregateChecker::new(&[sub]) {
            Err(PlanError::Aggregation(msg)) => assert_eq!(msg, "subqueries are not allowed in GROUP BY clause"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn outer_columns_must_be_whole_group_terms() {
        let checker = AggregateChecker::new(&[col("u", "id"), LogicalExpr::column(None, "name")]).unwrap();

        checker.check_outer_columns(&[ColumnRef::new(Some("u"), "id")]).unwrap();
        // resolved as users.name, grouped bare
        checker.check_outer_columns(&[ColumnRef::new(Some("users"), "name")]).unwrap();
        checker.check_outer_columns(&[]).unwrap();

        match checker.check_outer_columns(&[ColumnRef::new(Some("u"), "id"), ColumnRef::new(Some("u"), "age")]) {
            Err(PlanError::Aggregation(msg)) => assert_eq!(msg, "column u.age must be included in GROUP BY clause"),
            other => panic!("unexpected {other:?}"),
        }

        let inside = AggregateChecker::new(&[add(col("u", "id"), int(1))]).unwrap();
        assert!(inside.check_outer_columns(&[ColumnRef::new(Some("u"), "id")]).is_err());
    }

    #[test]
    fn cut_removes_first_contiguous_match() {
        let mut items = vec![1, 2, 3, 2, 3];
        let eq = |a: &i32, b: &i32| a == b;
        assert!(cut_from(&mut items, &[2, 3], eq));
        assert_eq!(items, vec![1, 2, 3]);
        assert!(!cut_from(&mut items, &[3, 1], eq));
        assert_eq!(items, vec![1, 2, 3]);
        assert!(cut_from(&mut items, &[], eq));
    }

    #[test]
    fn aggregate_terms_stop_at_aggregates() {
        let nested = sum(add(col("a", "b"), sum(col("a", "c"))));
        let expr = add(nested.clone(), sum(col("a", "b")));
        let terms = aggregate_terms(&expr);
        assert_eq!(terms, vec![nested, sum(col("a", "b"))]);
    }

    #[test]
    fn merge_keeps_distinct_calls_once() {
        let merged = merge_aggregates(
            vec![sum(col("a", "b"))],
            vec![sum(col("a", "b")), sum(col("a", "c")), sum(col("a", "c"))],
        );
        assert_eq!(merged, vec![sum(col("a", "b")), sum(col("a", "c"))]);
    }
}

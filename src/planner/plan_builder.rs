use std::mem;

use tracing::{debug, trace};

use crate::{
    analyzer::{EvaluateContext, ObjectTypes, Relation, VariableTypes},
    catalog::SchemaProvider,
    error::{PlanError, PlanResult},
    functions::FUNCTIONS,
    parser::{
        ast::{
            self, BinaryOperator, CompoundOperator, Expression, ExpressionKind, FunctionCall, NullOrder, OrderType,
            PrefixOperator, ResultColumn, SelectCore, SelectStatement, SqlStatement, StatementBody, TableSource,
        },
        parse_sql,
    },
    planner::{
        merge_aggregates, aggregate_terms, AggregateChecker, ArithmeticOperator, ComparisonOperator, JoinType,
        LogicalExpr, LogicalOperator, LogicalPlan, ScanSource, SetOperationType, SortExpression, SubqueryExpr,
        SubqueryKind, UnaryOperator,
    },
};

/// Builds the logical plan of a parsed statement and validates it.
///
/// The finished plan has been type checked against `schema`, and every
/// correlated subquery carries the outer columns it reads.
pub fn plan(
    statement: &SqlStatement,
    schema: &dyn SchemaProvider,
    variables: &VariableTypes,
    objects: &ObjectTypes,
) -> PlanResult<LogicalPlan> {
    debug!(ctes = statement.ctes.len(), "planning statement");

    if !statement.ctes.is_empty() {
        return Err(PlanError::not_implemented("common table expressions are not yet supported"));
    }

    let select = match &statement.body {
        StatementBody::Select(select) => select,
        StatementBody::Insert { .. } => return Err(PlanError::not_implemented("INSERT statements")),
        StatementBody::Update { .. } => return Err(PlanError::not_implemented("UPDATE statements")),
        StatementBody::Delete { .. } => return Err(PlanError::not_implemented("DELETE statements")),
    };

    let mut context = PlanContext { schema, variables, objects, outer: Relation::new() };
    let mut plan = context.select(select)?;

    EvaluateContext::new(schema, variables, objects).eval_relation(&mut plan)?;
    Ok(plan)
}

/// Parses `sql` and plans it.
pub fn plan_sql(
    sql: &str,
    schema: &dyn SchemaProvider,
    variables: &VariableTypes,
    objects: &ObjectTypes,
) -> PlanResult<LogicalPlan> {
    let statement = parse_sql(sql)?;
    plan(&statement, schema, variables, objects)
}

/// Projection of one select core, applied by whoever combines the cores.
struct Projection {
    exprs: Vec<LogicalExpr>,
    distinct: bool,
}

impl Projection {
    fn apply(self, child: LogicalPlan) -> LogicalPlan {
        let plan = LogicalPlan::Project { exprs: self.exprs, child: child.boxed() };
        if self.distinct {
            LogicalPlan::Distinct { child: plan.boxed() }
        } else {
            plan
        }
    }
}

/// GROUP BY state of an aggregated core, kept so that terms planned after
/// the core (ORDER BY) are held to the same rules.
struct Grouping {
    checker: AggregateChecker,
    /// Columns of the enclosing queries, without the core's own.
    outer: Relation,
    /// The core's FROM and JOIN columns.
    relation: Relation,
}

struct PlannedCore {
    plan: LogicalPlan,
    projection: Projection,
    grouping: Option<Grouping>,
}

impl PlannedCore {
    fn project(self) -> LogicalPlan {
        self.projection.apply(self.plan)
    }
}

enum Output {
    Expr(LogicalExpr),
    Wildcard(Option<String>),
}

struct PlanContext<'a> {
    schema: &'a dyn SchemaProvider,
    variables: &'a VariableTypes,
    objects: &'a ObjectTypes,
    /// Columns of every enclosing query, innermost last.
    outer: Relation,
}

impl PlanContext<'_> {
    /// A lone core is projected after ORDER BY and LIMIT so they can use
    /// columns that are not selected. Compound statements project each core
    /// before combining them.
    fn select(&mut self, select: &SelectStatement) -> PlanResult<LogicalPlan> {
        if select.cores.len() != select.compound_ops.len() + 1 {
            return Err(PlanError::shape(format!(
                "{} select cores cannot be combined with {} compound operators",
                select.cores.len(),
                select.compound_ops.len()
            )));
        }

        let mut cores = select.cores.iter();
        let first = cores.next().ok_or_else(|| PlanError::shape("select statement has no select cores"))?;
        let first = self.core(first)?;

        let (mut plan, projection, grouping) = if select.cores.len() == 1 {
            (first.plan, Some(first.projection), first.grouping)
        } else {
            let mut plan = first.project();
            for (core, op) in cores.zip(&select.compound_ops) {
                let right = self.core(core)?.project();
                plan = LogicalPlan::SetOperation { left: plan.boxed(), right: right.boxed(), op: set_operation(*op) };
            }
            (plan, None, None)
        };

        if !select.ordering.is_empty() {
            let sort_exprs = select
                .ordering
                .iter()
                .map(|term| {
                    Ok(SortExpression {
                        expr: self.expr(&term.expr)?,
                        ascending: term.order != Some(OrderType::Desc),
                        nulls_last: term.nulls != Some(NullOrder::First),
                    })
                })
                .collect::<PlanResult<Vec<_>>>()?;
            if let Some(grouping) = &grouping {
                let keys: Vec<LogicalExpr> = sort_exprs.iter().map(|s| s.expr.clone()).collect();
                self.check_grouped(grouping, &keys)?;
            }
            plan = LogicalPlan::Sort { sort_exprs, child: plan.boxed() };
        }

        if let Some(limit) = &select.limit {
            let offset = select.offset.as_ref().map(|o| self.expr(o)).transpose()?;
            plan = LogicalPlan::Limit { limit: self.expr(limit)?, offset, child: plan.boxed() };
        }

        Ok(match projection {
            Some(projection) => projection.apply(plan),
            None => plan,
        })
    }

    fn core(&mut self, core: &SelectCore) -> PlanResult<PlannedCore> {
        trace!(columns = core.columns.len(), joins = core.joins.len(), "planning select core");

        let mut plan = match &core.from {
            Some(from) => self.source(from)?,
            None => {
                if core.columns.iter().any(|c| matches!(c, ResultColumn::Wildcard { .. })) {
                    return Err(PlanError::shape("wildcard \"*\" cannot be used without a FROM clause"));
                }
                LogicalPlan::EmptyScan
            }
        };

        for join in &core.joins {
            let right = self.source(&join.source)?;
            plan = LogicalPlan::Join {
                left: plan.boxed(),
                right: right.boxed(),
                join_type: join_type(join.join_type),
                condition: self.expr(&join.on)?,
            };
        }

        // the rest of the core, and its subqueries, can see the joined columns
        let from_relation = self.relation_of(&plan)?;
        let outer = mem::take(&mut self.outer);
        self.outer = outer.clone().join(from_relation.clone());
        let result = self.core_body(core, plan, &outer, from_relation);
        self.outer = outer;
        result
    }

    fn core_body(
        &mut self,
        core: &SelectCore,
        mut plan: LogicalPlan,
        outer: &Relation,
        from_relation: Relation,
    ) -> PlanResult<PlannedCore> {
        if let Some(condition) = &core.where_clause {
            plan = LogicalPlan::Filter { condition: self.expr(condition)?, child: plan.boxed() };
        }

        let mut outputs = Vec::with_capacity(core.columns.len());
        for column in &core.columns {
            outputs.push(match column {
                ResultColumn::Expression { expr, alias } => {
                    let expr = self.expr(expr)?;
                    Output::Expr(match alias {
                        Some(alias) => LogicalExpr::Alias { expr: Box::new(expr), alias: alias.clone() },
                        None => expr,
                    })
                }
                ResultColumn::Wildcard { table } => Output::Wildcard(table.clone()),
            });
        }

        let mut group_exprs: Vec<LogicalExpr> = Vec::new();
        for expr in &core.group_by {
            let expr = self.expr(expr)?;
            let display = expr.to_string();
            if !group_exprs.iter().any(|g| g.to_string() == display) {
                group_exprs.push(expr);
            }
        }

        let having = core.having.as_ref().map(|h| self.expr(h)).transpose()?;

        let mut aggregates = Vec::new();
        for output in &outputs {
            if let Output::Expr(expr) = output {
                aggregates = merge_aggregates(aggregates, aggregate_terms(expr));
            }
        }
        if let Some(having) = &having {
            aggregates = merge_aggregates(aggregates, aggregate_terms(having));
        }

        let aggregated = !group_exprs.is_empty() || !aggregates.is_empty() || having.is_some();
        if aggregated {
            debug!(groups = group_exprs.len(), aggregates = aggregates.len(), "inserting aggregate");
            plan = LogicalPlan::Aggregate {
                group_exprs: group_exprs.clone(),
                aggregate_exprs: aggregates,
                child: plan.boxed(),
            };
            if let Some(having) = &having {
                plan = LogicalPlan::Filter { condition: having.clone(), child: plan.boxed() };
            }
        }

        let mut exprs = Vec::with_capacity(outputs.len());
        for output in outputs {
            match output {
                Output::Expr(expr) => exprs.push(expr),
                Output::Wildcard(table) => exprs.extend(expand_wildcard(table.as_deref(), &from_relation, &group_exprs)?),
            }
        }

        let grouping = if aggregated {
            let grouping = Grouping {
                checker: AggregateChecker::new(&group_exprs)?,
                outer: outer.clone(),
                relation: from_relation,
            };
            self.check_grouped(&grouping, &exprs)?;
            if let Some(having) = &having {
                self.check_grouped(&grouping, std::slice::from_ref(having))?;
            }
            Some(grouping)
        } else {
            None
        };

        Ok(PlannedCore { plan, projection: Projection { exprs, distinct: core.distinct }, grouping })
    }

    /// Runs the GROUP BY check over `exprs`. Subqueries are evaluated against
    /// the grouped columns, and whichever of those they read must be grouped.
    fn check_grouped(&self, grouping: &Grouping, exprs: &[LogicalExpr]) -> PlanResult<()> {
        grouping.checker.check_many(exprs)?;

        for subquery in exprs.iter().flat_map(ungrouped_subqueries) {
            let mut copy = subquery.clone();
            EvaluateContext::new(self.schema, self.variables, self.objects)
                .with_outer(grouping.outer.clone())
                .eval_expression(&mut copy, &grouping.relation)?;
            if let LogicalExpr::Subquery(evaluated) = &copy {
                trace!(columns = evaluated.correlated.len(), "checking grouped subquery");
                grouping.checker.check_outer_columns(&evaluated.correlated)?;
            }
        }
        Ok(())
    }

    fn source(&mut self, source: &TableSource) -> PlanResult<LogicalPlan> {
        match source {
            TableSource::Table { name, alias } => {
                if self.schema.find_table(name).is_none() {
                    return Err(PlanError::UnknownTable(name.clone()));
                }
                Ok(LogicalPlan::Scan {
                    source: ScanSource::Table { table: name.clone() },
                    alias: alias.clone().unwrap_or_else(|| name.clone()),
                })
            }
            TableSource::Subquery { query, alias } => {
                let alias = alias.clone().ok_or_else(|| PlanError::shape("subquery must have an alias"))?;
                let plan = self.select(query)?;
                Ok(LogicalPlan::Scan { source: ScanSource::Subquery { plan: plan.boxed(), correlated: vec![] }, alias })
            }
            TableSource::FunctionCall { call, alias } => {
                let alias = alias.clone().ok_or_else(|| PlanError::shape("joins against function calls must have an alias"))?;
                Ok(LogicalPlan::Scan { source: self.procedure_source(call)?, alias })
            }
        }
    }

    fn procedure_source(&mut self, call: &FunctionCall) -> PlanResult<ScanSource> {
        if call.star {
            return Err(PlanError::shape("star (*) not allowed in procedure calls"));
        }
        if call.distinct {
            return Err(PlanError::shape("DISTINCT not allowed in procedure calls"));
        }

        let local = match &call.foreign {
            Some(_) => None,
            None => self.schema.find_procedure(&call.name),
        };
        let (returns, foreign) = match local {
            Some(procedure) => (procedure.returns.as_ref(), false),
            None => {
                let procedure = self.schema.find_foreign_procedure(&call.name).ok_or_else(|| match call.foreign {
                    Some(_) => PlanError::UnknownForeignProcedure(call.name.clone()),
                    None => PlanError::UnknownProcedure(call.name.clone()),
                })?;
                (procedure.returns.as_ref(), true)
            }
        };

        if !returns.is_some_and(|r| r.is_table) {
            return Err(PlanError::shape(format!("procedure \"{}\" does not return a table", call.name)));
        }

        Ok(ScanSource::Procedure {
            procedure: call.name.clone(),
            args: self.exprs(&call.args)?,
            contextual_args: self.contextual_args(call)?,
            foreign,
        })
    }

    fn contextual_args(&mut self, call: &FunctionCall) -> PlanResult<Vec<LogicalExpr>> {
        match &call.foreign {
            Some(context) => Ok(vec![self.expr(&context.dbid)?, self.expr(&context.procedure)?]),
            None => Ok(vec![]),
        }
    }

    fn exprs(&mut self, exprs: &[Expression]) -> PlanResult<Vec<LogicalExpr>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, expr: &Expression) -> PlanResult<LogicalExpr> {
        let planned = match &expr.kind {
            ExpressionKind::Literal(value) => LogicalExpr::literal(value.clone()),
            ExpressionKind::Variable(name) => LogicalExpr::Variable { name: name.clone() },
            ExpressionKind::Column { table, column } => LogicalExpr::column(table.as_deref(), column),
            ExpressionKind::FunctionCall(call) => self.function_call(call)?,
            ExpressionKind::Binary { left, op, right } => {
                let (left, right) = (self.expr(left)?, self.expr(right)?);
                binary(left, *op, right)
            }
            ExpressionKind::Prefix { op, expr } => {
                let op = match op {
                    PrefixOperator::Minus => UnaryOperator::Negate,
                    PrefixOperator::Plus => UnaryOperator::Positive,
                    PrefixOperator::Not => UnaryOperator::Not,
                };
                LogicalExpr::UnaryOp { op, expr: Box::new(self.expr(expr)?) }
            }
            ExpressionKind::Between { expr, not, lower, upper } => {
                let (low, high) = if *not {
                    (ComparisonOperator::LessThan, ComparisonOperator::GreaterThan)
                } else {
                    (ComparisonOperator::GreaterThanOrEqual, ComparisonOperator::LessThanOrEqual)
                };
                let value = self.expr(expr)?;
                LogicalExpr::logical(
                    LogicalExpr::comparison(value.clone(), low, self.expr(lower)?),
                    LogicalOperator::And,
                    LogicalExpr::comparison(value, high, self.expr(upper)?),
                )
            }
            ExpressionKind::Is { left, not, distinct, right } => {
                let op = match (*not, *distinct) {
                    (false, false) => ComparisonOperator::Is,
                    (true, false) => ComparisonOperator::IsNot,
                    (false, true) => ComparisonOperator::IsDistinctFrom,
                    (true, true) => ComparisonOperator::IsNotDistinctFrom,
                };
                LogicalExpr::comparison(self.expr(left)?, op, self.expr(right)?)
            }
            ExpressionKind::InList { expr, not, list } => {
                let value = self.expr(expr)?;
                let mut any: Option<LogicalExpr> = None;
                for item in list {
                    let equal = LogicalExpr::comparison(value.clone(), ComparisonOperator::Equal, self.expr(item)?);
                    any = Some(match any {
                        Some(left) => LogicalExpr::logical(left, LogicalOperator::Or, equal),
                        None => equal,
                    });
                }
                let any = any.ok_or_else(|| PlanError::shape("IN list must have at least one value"))?;
                if *not { LogicalExpr::not(any) } else { any }
            }
            ExpressionKind::InSubquery { .. } => return Err(PlanError::not_implemented("IN with a subquery")),
            ExpressionKind::Like { case_insensitive, .. } => {
                let what = if *case_insensitive { "ILIKE" } else { "LIKE" };
                return Err(PlanError::not_implemented(what));
            }
            ExpressionKind::Collate { .. } => return Err(PlanError::not_implemented("COLLATE")),
            ExpressionKind::Case { .. } => return Err(PlanError::not_implemented("CASE expressions")),
            ExpressionKind::Subquery { query, exists, not } => {
                let kind = match (*exists, *not) {
                    (true, true) => SubqueryKind::NotExists,
                    (true, false) => SubqueryKind::Exists,
                    (false, _) => SubqueryKind::Scalar,
                };
                let plan = self.select(query)?;
                LogicalExpr::Subquery(SubqueryExpr { kind, plan: plan.boxed(), correlated: vec![] })
            }
            ExpressionKind::Parenthesized(inner) => self.expr(inner)?,
            ExpressionKind::Array(elements) => LogicalExpr::ArrayConstructor { elements: self.exprs(elements)? },
            ExpressionKind::ArrayAccess { array, index } => LogicalExpr::ArrayAccess {
                array: Box::new(self.expr(array)?),
                index: Box::new(self.expr(index)?),
            },
            ExpressionKind::FieldAccess { object, field } => {
                LogicalExpr::FieldAccess { object: Box::new(self.expr(object)?), field: field.clone() }
            }
        };

        Ok(match expr.type_cast {
            Some(data_type) => LogicalExpr::TypeCast { expr: Box::new(planned), data_type },
            None => planned,
        })
    }

    /// Built-in functions win over procedures of the same name.
    fn function_call(&mut self, call: &FunctionCall) -> PlanResult<LogicalExpr> {
        if let Some(context) = &call.foreign {
            if self.schema.find_foreign_procedure(&call.name).is_none() {
                return Err(PlanError::UnknownForeignProcedure(call.name.clone()));
            }
            if call.star {
                return Err(PlanError::shape("star (*) not allowed in procedure calls"));
            }
            if call.distinct {
                return Err(PlanError::shape("DISTINCT not allowed in procedure calls"));
            }
            return Ok(LogicalExpr::ProcedureCall {
                name: call.name.clone(),
                foreign: true,
                args: self.exprs(&call.args)?,
                contextual_args: vec![self.expr(&context.dbid)?, self.expr(&context.procedure)?],
            });
        }

        let Some(definition) = FUNCTIONS.get(&call.name) else {
            if call.star {
                return Err(PlanError::shape("star (*) not allowed in procedure calls"));
            }
            if call.distinct {
                return Err(PlanError::shape("DISTINCT not allowed in procedure calls"));
            }
            if self.schema.find_procedure(&call.name).is_none() {
                return Err(PlanError::UnknownFunction(call.name.clone()));
            }
            return Ok(LogicalExpr::ProcedureCall {
                name: call.name.clone(),
                foreign: false,
                args: self.exprs(&call.args)?,
                contextual_args: vec![],
            });
        };

        if definition.is_aggregate {
            return Ok(LogicalExpr::AggregateFunctionCall {
                name: call.name.clone(),
                args: self.exprs(&call.args)?,
                star: call.star,
                distinct: call.distinct,
            });
        }

        if call.star {
            return Err(PlanError::shape("star (*) not allowed in non-aggregate function calls"));
        }
        if call.distinct {
            return Err(PlanError::shape("DISTINCT not allowed in non-aggregate function calls"));
        }
        Ok(LogicalExpr::ScalarFunctionCall { name: call.name.clone(), args: self.exprs(&call.args)? })
    }

    /// Output relation of a partial plan, evaluated on a copy so the plan
    /// itself stays as written.
    fn relation_of(&self, plan: &LogicalPlan) -> PlanResult<Relation> {
        let mut copy = plan.clone();
        EvaluateContext::new(self.schema, self.variables, self.objects)
            .with_outer(self.outer.clone())
            .eval_relation(&mut copy)
    }
}

/// Columns a `*` or `t.*` stands for. A column that is itself a GROUP BY
/// term keeps that term's unqualified form so the grouping check matches it.
fn expand_wildcard(table: Option<&str>, relation: &Relation, group_exprs: &[LogicalExpr]) -> PlanResult<Vec<LogicalExpr>> {
    let fields = match table {
        Some(table) => {
            let fields = relation.columns_by_parent(table);
            if fields.is_empty() {
                return Err(PlanError::UnknownTable(table.to_string()));
            }
            fields
        }
        None => relation.fields.iter().collect(),
    };
    trace!(table = table.unwrap_or("*"), columns = fields.len(), "expanding wildcard");

    Ok(fields
        .into_iter()
        .map(|field| {
            let bare = LogicalExpr::column(None, &field.name);
            let grouped = bare.to_string();
            if group_exprs.iter().any(|g| g.to_string() == grouped) {
                bare
            } else {
                LogicalExpr::column(field.parent.as_deref(), &field.name)
            }
        })
        .collect())
}

/// Subqueries in `expr` that are not inside an aggregate call.
fn ungrouped_subqueries(expr: &LogicalExpr) -> Vec<&LogicalExpr> {
    match expr {
        LogicalExpr::AggregateFunctionCall { .. } => vec![],
        LogicalExpr::Subquery(_) => vec![expr],
        _ => expr.sub_exprs().into_iter().flat_map(ungrouped_subqueries).collect(),
    }
}

fn binary(left: LogicalExpr, op: BinaryOperator, right: LogicalExpr) -> LogicalExpr {
    enum Kind {
        Arithmetic(ArithmeticOperator),
        Comparison(ComparisonOperator),
        Logical(LogicalOperator),
    }

    let kind = match op {
        BinaryOperator::Add => Kind::Arithmetic(ArithmeticOperator::Add),
        BinaryOperator::Subtract => Kind::Arithmetic(ArithmeticOperator::Subtract),
        BinaryOperator::Multiply => Kind::Arithmetic(ArithmeticOperator::Multiply),
        BinaryOperator::Divide => Kind::Arithmetic(ArithmeticOperator::Divide),
        BinaryOperator::Modulo => Kind::Arithmetic(ArithmeticOperator::Modulo),
        BinaryOperator::Equal => Kind::Comparison(ComparisonOperator::Equal),
        BinaryOperator::NotEqual => Kind::Comparison(ComparisonOperator::NotEqual),
        BinaryOperator::LessThan => Kind::Comparison(ComparisonOperator::LessThan),
        BinaryOperator::LessThanOrEqual => Kind::Comparison(ComparisonOperator::LessThanOrEqual),
        BinaryOperator::GreaterThan => Kind::Comparison(ComparisonOperator::GreaterThan),
        BinaryOperator::GreaterThanOrEqual => Kind::Comparison(ComparisonOperator::GreaterThanOrEqual),
        BinaryOperator::And => Kind::Logical(LogicalOperator::And),
        BinaryOperator::Or => Kind::Logical(LogicalOperator::Or),
    };

    let (left, right) = (Box::new(left), Box::new(right));
    match kind {
        Kind::Arithmetic(op) => LogicalExpr::ArithmeticOp { left, op, right },
        Kind::Comparison(op) => LogicalExpr::ComparisonOp { left, op, right },
        Kind::Logical(op) => LogicalExpr::LogicalOp { left, op, right },
    }
}

fn join_type(join_type: ast::JoinType) -> JoinType {
    match join_type {
        ast::JoinType::Inner => JoinType::Inner,
        ast::JoinType::Left => JoinType::Left,
        ast::JoinType::Right => JoinType::Right,
        ast::JoinType::Full => JoinType::Full,
    }
}

fn set_operation(op: CompoundOperator) -> SetOperationType {
    match op {
        CompoundOperator::Union => SetOperationType::Union,
        CompoundOperator::UnionAll => SetOperationType::UnionAll,
        CompoundOperator::Intersect => SetOperationType::Intersect,
        CompoundOperator::Except => SetOperationType::Except,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{fixtures, DataType, Schema},
        planner::format,
    };

    fn run(sql: &str) -> PlanResult<String> {
        run_with(sql, &VariableTypes::new())
    }

    fn run_with(sql: &str, variables: &VariableTypes) -> PlanResult<String> {
        let schema: Schema = fixtures::schema();
        plan_sql(sql, &schema, variables, &ObjectTypes::new()).map(|p| format(&p, 0))
    }

    fn lines(sql: &str) -> Vec<String> {
        match run(sql) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(err) => panic!("planning {sql:?} failed: {err}"),
        }
    }

    #[test]
    fn select_without_from_projects_over_empty_scan() {
        assert_eq!(run("select 1").unwrap(), "Projection: 1\n  Empty Scan\n");
    }

    #[test]
    fn filter_sits_between_projection_and_scan() {
        assert_eq!(
            run("select id, name from users where age > 18").unwrap(),
            "Projection: id, name\n  Filter: age > 18\n    Scan Table [alias=users]: users\n"
        );
    }

    #[test]
    fn subquery_join_nests_inner_plan() {
        assert_eq!(
            lines("select p.content, u.name from posts p join (select id, name from users) u on p.owner_id = u.id"),
            vec![
                "Projection: p.content, u.name",
                "  Join [inner]: p.owner_id = u.id",
                "    Scan Table [alias=p]: posts",
                "    Scan Subquery [alias=u] (uncorrelated)",
                "      Projection: id, name",
                "        Scan Table [alias=users]: users",
            ]
        );
    }

    #[test]
    fn group_by_inserts_aggregate() {
        assert_eq!(
            lines("select a.c + sum(a.b) from a group by a.c"),
            vec!["Projection: a.c + sum(a.b)", "  Aggregate [a.c]: sum(a.b)", "    Scan Table [alias=a]: a"]
        );
        assert_eq!(
            lines("select sum(a.b) from a"),
            vec!["Projection: sum(a.b)", "  Aggregate: sum(a.b)", "    Scan Table [alias=a]: a"]
        );
    }

    #[test]
    fn ungrouped_column_fails() {
        match run("select a.c from a group by a.b") {
            Err(PlanError::Aggregation(msg)) => assert_eq!(msg, "column a.c must be included in GROUP BY clause"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(run("select b, count(*) from a"), Err(PlanError::Aggregation(_))));
    }

    #[test]
    fn having_filters_the_aggregate() {
        assert_eq!(
            lines("select b, count(*) from a group by b, b having count(c) > 1"),
            vec![
                "Projection: b, count(*)",
                "  Filter: count(c) > 1",
                "    Aggregate [b]: count(*); count(c)",
                "      Scan Table [alias=a]: a",
            ]
        );
        assert!(matches!(run("select b from a group by b having c > 1"), Err(PlanError::Aggregation(_))));
    }

    #[test]
    fn subqueries_may_only_read_grouped_columns() {
        let not_grouped = Err(PlanError::Aggregation("column u.age must be included in GROUP BY clause".into()));

        assert_eq!(run("select (select u.age) from users u group by u.id"), not_grouped);
        assert_eq!(
            run("select u.id from users u group by u.id \
                 having exists (select 1 from posts p where p.owner_id = u.age)"),
            not_grouped
        );

        let plan = lines("select u.id, (select count(*) from posts p where p.owner_id = u.id) from users u group by u.id");
        assert_eq!(plan[0], "Projection: u.id, [subquery (scalar) (correlated: u.id)]");

        // inside an aggregate the subquery may read anything
        run("select count((select u.age)) from users u").unwrap();
    }

    #[test]
    fn order_by_follows_grouping() {
        assert_eq!(
            run("select count(*) from users order by name"),
            Err(PlanError::Aggregation("column name must be included in GROUP BY clause".into()))
        );
        assert_eq!(
            lines("select name, count(*) from users group by name order by name, count(*) desc")[1],
            "  Sort: [name] asc nulls last; [count(*)] desc nulls last"
        );
    }

    #[test]
    fn planning_is_deterministic() {
        let sql = "select u.id, count(*) from users u \
                   where exists (select 1 from posts p where p.owner_id = u.id) group by u.id \
                   union all select id, 1 from posts order by id";
        let schema: Schema = fixtures::schema();
        let (variables, objects) = (VariableTypes::new(), ObjectTypes::new());

        let first = plan_sql(sql, &schema, &variables, &objects).unwrap();
        let second = plan_sql(sql, &schema, &variables, &objects).unwrap();
        assert_eq!(first, second);
        assert_eq!(format(&first, 0), format(&second, 0));
        assert_eq!(format(&first, 0), format(&first, 0));
        assert!(format(&first, 0).contains("Filter: [subquery (exists) (correlated: u.id)]"));
    }

    #[test]
    fn scalar_subquery_must_return_one_column() {
        match run("select (select id, name from users) from posts") {
            Err(PlanError::Shape(msg)) => assert_eq!(msg, "subquery must return exactly one column, got 2"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn correlated_exists_records_outer_column() {
        assert_eq!(
            lines("select name from users u where exists (select 1 from posts p where p.owner_id = u.id)"),
            vec![
                "Projection: name",
                "  Filter: [subquery (exists) (correlated: u.id)]",
                "    Scan Table [alias=u]: users",
                "    Projection: 1",
                "      Filter: p.owner_id = u.id",
                "        Scan Table [alias=p]: posts",
            ]
        );
    }

    #[test]
    fn correlation_attaches_where_it_resolves() {
        let plan = lines(
            "select name from users u where not exists (\
                select 1 from posts p where exists (select 1 from a where a.b = u.id))",
        );
        assert_eq!(plan[1], "  Filter: [subquery (not exists) (correlated: u.id)]");
        assert_eq!(plan[4], "      Filter: [subquery (exists) (uncorrelated)]");
    }

    #[test]
    fn unqualified_outer_columns_are_qualified() {
        let plan = lines("select id, (select count(*) from posts where owner_id = age) from users");
        assert_eq!(plan[0], "Projection: id, [subquery (scalar) (correlated: users.age)]");
        assert_eq!(plan[4], "      Filter: owner_id = users.age");
    }

    #[test]
    fn wildcards_expand_to_qualified_columns() {
        assert_eq!(lines("select * from users")[0], "Projection: users.id, users.name, users.age");
        assert_eq!(
            lines("select p.* from posts p join users u on p.owner_id = u.id")[0],
            "Projection: p.id, p.owner_id, p.content"
        );
        assert_eq!(lines("select * from a group by b, c")[0], "Projection: b, c");

        match run("select *") {
            Err(PlanError::Shape(msg)) => assert_eq!(msg, "wildcard \"*\" cannot be used without a FROM clause"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn compound_statement_projects_each_core() {
        assert_eq!(
            lines("select id from users union select id from posts order by id desc limit 5 offset 2"),
            vec![
                "Limit [offset=2]: 5",
                "  Sort: [id] desc nulls last",
                "    Set: union",
                "      Projection: id",
                "        Scan Table [alias=users]: users",
                "      Projection: id",
                "        Scan Table [alias=posts]: posts",
            ]
        );
        match run("select id from users union select name from users") {
            Err(PlanError::Type(msg)) => assert_eq!(msg, "compound operations must have the same data types"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn single_core_sorts_before_projecting() {
        assert_eq!(
            lines("select distinct name from users order by age nulls first"),
            vec![
                "Distinct",
                "  Projection: name",
                "    Sort: [age] asc nulls first",
                "      Scan Table [alias=users]: users",
            ]
        );
    }

    #[test]
    fn between_in_and_is_desugar() {
        assert_eq!(lines("select id from users where age between 1 and 5")[1], "  Filter: age >= 1 AND age <= 5");
        assert_eq!(lines("select id from users where age not between 1 and 5")[1], "  Filter: age < 1 AND age > 5");
        assert_eq!(lines("select id from users where id in (1, 2)")[1], "  Filter: id = 1 OR id = 2");
        assert_eq!(
            lines("select id from users where name is not distinct from 'x'")[1],
            "  Filter: name IS NOT DISTINCT FROM 'x'"
        );
    }

    #[test]
    fn procedures_as_sources_and_values() {
        let mut variables = VariableTypes::new();
        variables.insert("$owner".into(), DataType::INT);
        let text = run_with("select * from get_posts($owner) as gp", &variables).unwrap();
        assert_eq!(
            text,
            "Projection: gp.id, gp.content\n  Scan Procedure [alias=gp]: [foreign=false] get_posts($owner)\n"
        );

        assert_eq!(lines("select remote_count['x', 'y'](1)")[0], "Projection: remote_count['x', 'y'](1)");
        assert_eq!(lines("select user_age(id) from users")[0], "Projection: user_age(id)");
    }

    #[test]
    fn source_errors() {
        assert_eq!(run("select * from cars"), Err(PlanError::UnknownTable("cars".into())));
        assert_eq!(run("select * from (select 1)"), Err(PlanError::shape("subquery must have an alias")));
        assert_eq!(
            run("select * from get_posts(1)"),
            Err(PlanError::shape("joins against function calls must have an alias"))
        );
        assert_eq!(
            run("select * from user_age(1) as x"),
            Err(PlanError::shape("procedure \"user_age\" does not return a table"))
        );
    }

    #[test]
    fn function_errors() {
        assert_eq!(run("select nope(1)"), Err(PlanError::UnknownFunction("nope".into())));
        assert_eq!(
            run("select abs(distinct age) from users"),
            Err(PlanError::shape("DISTINCT not allowed in non-aggregate function calls"))
        );
        assert_eq!(
            run("select user_age(distinct id) from users"),
            Err(PlanError::shape("DISTINCT not allowed in procedure calls"))
        );
        assert_eq!(run("select $missing"), Err(PlanError::UnknownVariable("$missing".into())));
    }

    #[test]
    fn unsupported_shapes_are_rejected() {
        for sql in [
            "with x as (select 1) select * from x",
            "select case when true then 1 end",
            "select id from users where name like 'a%'",
            "select id from users where id in (select id from posts)",
            "delete from users",
        ] {
            assert!(matches!(run(sql), Err(PlanError::NotImplemented(_))), "{sql}");
        }
    }
}

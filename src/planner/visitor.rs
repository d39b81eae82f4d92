use crate::{
    catalog::DataType,
    parser::ast::Literal,
    planner::{
        ArithmeticOperator, ColumnRef, ComparisonOperator, JoinType, LogicalExpr, LogicalOperator, LogicalPlan,
        ScanSource, SetOperationType, SortExpression, SubqueryExpr, UnaryOperator,
    },
};

/// One method per concrete plan, scan source and expression kind.
///
/// Nodes hand their fields to the matching method through `accept`; the
/// visitor decides whether and in which order to descend.
pub trait PlanVisitor {
    type Output;

    fn visit_empty_scan(&mut self) -> Self::Output;
    fn visit_scan(&mut self, source: &ScanSource, alias: &str) -> Self::Output;
    fn visit_project(&mut self, exprs: &[LogicalExpr], child: &LogicalPlan) -> Self::Output;
    fn visit_filter(&mut self, condition: &LogicalExpr, child: &LogicalPlan) -> Self::Output;
    fn visit_join(
        &mut self,
        left: &LogicalPlan,
        right: &LogicalPlan,
        join_type: JoinType,
        condition: &LogicalExpr,
    ) -> Self::Output;
    fn visit_sort(&mut self, sort_exprs: &[SortExpression], child: &LogicalPlan) -> Self::Output;
    fn visit_limit(&mut self, limit: &LogicalExpr, offset: Option<&LogicalExpr>, child: &LogicalPlan) -> Self::Output;
    fn visit_distinct(&mut self, child: &LogicalPlan) -> Self::Output;
    fn visit_set_operation(&mut self, left: &LogicalPlan, right: &LogicalPlan, op: SetOperationType) -> Self::Output;
    fn visit_aggregate(
        &mut self,
        group_exprs: &[LogicalExpr],
        aggregate_exprs: &[LogicalExpr],
        child: &LogicalPlan,
    ) -> Self::Output;

    fn visit_table_source(&mut self, table: &str) -> Self::Output;
    fn visit_procedure_source(
        &mut self,
        procedure: &str,
        args: &[LogicalExpr],
        contextual_args: &[LogicalExpr],
        foreign: bool,
    ) -> Self::Output;
    fn visit_subquery_source(&mut self, plan: &LogicalPlan, correlated: &[ColumnRef]) -> Self::Output;

    fn visit_literal(&mut self, value: &Literal, data_type: DataType) -> Self::Output;
    fn visit_variable(&mut self, name: &str) -> Self::Output;
    fn visit_column_ref(&mut self, column: &ColumnRef) -> Self::Output;
    fn visit_aggregate_call(&mut self, name: &str, args: &[LogicalExpr], star: bool, distinct: bool) -> Self::Output;
    fn visit_scalar_call(&mut self, name: &str, args: &[LogicalExpr]) -> Self::Output;
    fn visit_procedure_call(
        &mut self,
        name: &str,
        foreign: bool,
        args: &[LogicalExpr],
        contextual_args: &[LogicalExpr],
    ) -> Self::Output;
    fn visit_arithmetic(&mut self, left: &LogicalExpr, op: ArithmeticOperator, right: &LogicalExpr) -> Self::Output;
    fn visit_comparison(&mut self, left: &LogicalExpr, op: ComparisonOperator, right: &LogicalExpr) -> Self::Output;
    fn visit_logical(&mut self, left: &LogicalExpr, op: LogicalOperator, right: &LogicalExpr) -> Self::Output;
    fn visit_unary(&mut self, op: UnaryOperator, expr: &LogicalExpr) -> Self::Output;
    fn visit_type_cast(&mut self, expr: &LogicalExpr, data_type: DataType) -> Self::Output;
    fn visit_alias(&mut self, expr: &LogicalExpr, alias: &str) -> Self::Output;
    fn visit_array_access(&mut self, array: &LogicalExpr, index: &LogicalExpr) -> Self::Output;
    fn visit_array_constructor(&mut self, elements: &[LogicalExpr]) -> Self::Output;
    fn visit_field_access(&mut self, object: &LogicalExpr, field: &str) -> Self::Output;
    fn visit_subquery(&mut self, subquery: &SubqueryExpr) -> Self::Output;
}

impl LogicalPlan {
    pub fn accept<V: PlanVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            LogicalPlan::EmptyScan => visitor.visit_empty_scan(),
            LogicalPlan::Scan { source, alias } => visitor.visit_scan(source, alias),
            LogicalPlan::Project { exprs, child } => visitor.visit_project(exprs, child),
            LogicalPlan::Filter { condition, child } => visitor.visit_filter(condition, child),
            LogicalPlan::Join { left, right, join_type, condition } => {
                visitor.visit_join(left, right, *join_type, condition)
            }
            LogicalPlan::Sort { sort_exprs, child } => visitor.visit_sort(sort_exprs, child),
            LogicalPlan::Limit { limit, offset, child } => visitor.visit_limit(limit, offset.as_ref(), child),
            LogicalPlan::Distinct { child } => visitor.visit_distinct(child),
            LogicalPlan::SetOperation { left, right, op } => visitor.visit_set_operation(left, right, *op),
            LogicalPlan::Aggregate { group_exprs, aggregate_exprs, child } => {
                visitor.visit_aggregate(group_exprs, aggregate_exprs, child)
            }
        }
    }
}

impl ScanSource {
    pub fn accept<V: PlanVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            ScanSource::Table { table } => visitor.visit_table_source(table),
            ScanSource::Procedure { procedure, args, contextual_args, foreign } => {
                visitor.visit_procedure_source(procedure, args, contextual_args, *foreign)
            }
            ScanSource::Subquery { plan, correlated } => visitor.visit_subquery_source(plan, correlated),
        }
    }
}

impl LogicalExpr {
    pub fn accept<V: PlanVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self {
            LogicalExpr::Literal { value, data_type } => visitor.visit_literal(value, *data_type),
            LogicalExpr::Variable { name } => visitor.visit_variable(name),
            LogicalExpr::ColumnRef(column) => visitor.visit_column_ref(column),
            LogicalExpr::AggregateFunctionCall { name, args, star, distinct } => {
                visitor.visit_aggregate_call(name, args, *star, *distinct)
            }
            LogicalExpr::ScalarFunctionCall { name, args } => visitor.visit_scalar_call(name, args),
            LogicalExpr::ProcedureCall { name, foreign, args, contextual_args } => {
                visitor.visit_procedure_call(name, *foreign, args, contextual_args)
            }
            LogicalExpr::ArithmeticOp { left, op, right } => visitor.visit_arithmetic(left, *op, right),
            LogicalExpr::ComparisonOp { left, op, right } => visitor.visit_comparison(left, *op, right),
            LogicalExpr::LogicalOp { left, op, right } => visitor.visit_logical(left, *op, right),
            LogicalExpr::UnaryOp { op, expr } => visitor.visit_unary(*op, expr),
            LogicalExpr::TypeCast { expr, data_type } => visitor.visit_type_cast(expr, *data_type),
            LogicalExpr::Alias { expr, alias } => visitor.visit_alias(expr, alias),
            LogicalExpr::ArrayAccess { array, index } => visitor.visit_array_access(array, index),
            LogicalExpr::ArrayConstructor { elements } => visitor.visit_array_constructor(elements),
            LogicalExpr::FieldAccess { object, field } => visitor.visit_field_access(object, field),
            LogicalExpr::Subquery(subquery) => visitor.visit_subquery(subquery),
        }
    }
}

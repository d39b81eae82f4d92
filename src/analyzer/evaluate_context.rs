use std::mem;

use indexmap::IndexMap;
use tracing::trace;

use crate::{
    analyzer::{Field, Relation},
    catalog::{DataType, SchemaProvider, TypeKind},
    error::{PlanError, PlanResult},
    functions::FUNCTIONS,
    planner::{ColumnRef, LogicalExpr, LogicalPlan, ScanSource, SubqueryKind, UnaryOperator},
};

/// Types of the `$var` / `@var` values a query may reference, keyed by name
/// with its prefix.
pub type VariableTypes = IndexMap<String, DataType>;

/// Field types of the object variables a query may reference (`$obj.field`).
pub type ObjectTypes = IndexMap<String, IndexMap<String, DataType>>;

/// What evaluating a nested query yields.
struct SubqueryScope {
    relation: Relation,
    /// Outer columns resolved by the relation the subquery was evaluated against.
    attached: Vec<ColumnRef>,
    /// Every outer column the subquery read.
    referenced: Vec<ColumnRef>,
}

/// Walks a finished plan computing each node's output relation and checking
/// every expression's types against the schema.
///
/// Column references that miss the current relation are retried against the
/// outer relation; hits there are qualified in place and recorded as
/// correlations of the nearest enclosing subquery that can resolve them.
pub struct EvaluateContext<'a> {
    schema: &'a dyn SchemaProvider,
    variables: &'a VariableTypes,
    objects: &'a ObjectTypes,
    outer: Relation,
    correlations: Vec<ColumnRef>,
}

impl<'a> EvaluateContext<'a> {
    pub fn new(schema: &'a dyn SchemaProvider, variables: &'a VariableTypes, objects: &'a ObjectTypes) -> Self {
        Self { schema, variables, objects, outer: Relation::new(), correlations: Vec::new() }
    }

    /// Starts evaluation inside an enclosing query whose columns are visible.
    pub fn with_outer(mut self, outer: Relation) -> Self {
        self.outer = outer;
        self
    }

    /// Outer columns read by the evaluated plan that no subquery inside it resolved.
    pub fn correlations(&self) -> &[ColumnRef] {
        &self.correlations
    }

    pub fn eval_relation(&mut self, plan: &mut LogicalPlan) -> PlanResult<Relation> {
        match plan {
            LogicalPlan::EmptyScan => Ok(Relation::new()),
            LogicalPlan::Scan { source, alias } => Ok(self.eval_source(source)?.with_parent(alias)),
            LogicalPlan::Project { exprs, child } => {
                let rel = self.eval_relation(child)?;
                let mut fields = Vec::with_capacity(exprs.len());
                for expr in exprs.iter_mut() {
                    fields.push(self.eval_expression(expr, &rel)?);
                }
                Ok(Relation::from_fields(fields))
            }
            LogicalPlan::Filter { condition, child } => {
                let rel = self.eval_relation(child)?;
                self.evals_to(condition, DataType::BOOL, &rel)?;
                Ok(rel)
            }
            LogicalPlan::Join { left, right, condition, .. } => {
                let left = self.eval_relation(left)?;
                let right = self.eval_relation(right)?;
                let rel = left.join(right);
                self.evals_to(condition, DataType::BOOL, &rel)?;
                Ok(rel)
            }
            LogicalPlan::Sort { sort_exprs, child } => {
                let rel = self.eval_relation(child)?;
                for sort in sort_exprs.iter_mut() {
                    self.scalar_of(&mut sort.expr, &rel)?;
                }
                Ok(rel)
            }
            LogicalPlan::Limit { limit, offset, child } => {
                let rel = self.eval_relation(child)?;
                self.evals_to(limit, DataType::INT, &rel)?;
                if let Some(offset) = offset {
                    self.evals_to(offset, DataType::INT, &rel)?;
                }
                Ok(rel)
            }
            LogicalPlan::Distinct { child } => self.eval_relation(child),
            LogicalPlan::SetOperation { left, right, .. } => {
                let left = self.eval_relation(left)?;
                let right = self.eval_relation(right)?;
                if left.len() != right.len() {
                    return Err(PlanError::shape("set operations must have the same number of columns"));
                }
                for (l, r) in left.fields.iter().zip(right.fields.iter()) {
                    if !l.scalar()?.equals(&r.scalar()?) {
                        return Err(PlanError::type_err("compound operations must have the same data types"));
                    }
                }
                // relation names do not survive a set operation
                Ok(left.without_parents())
            }
            LogicalPlan::Aggregate { group_exprs, aggregate_exprs, child } => {
                let rel = self.eval_relation(child)?;
                self.many_scalar(group_exprs, &rel)?;
                self.many_scalar(aggregate_exprs, &rel)?;
                Ok(rel)
            }
        }
    }

    fn eval_source(&mut self, source: &mut ScanSource) -> PlanResult<Relation> {
        match source {
            ScanSource::Table { table } => {
                let table = self.schema.find_table(table.as_str()).ok_or_else(|| PlanError::UnknownTable(table.clone()))?;
                let fields = table
                    .columns
                    .iter()
                    .map(|c| Field::new(Some(&table.name), &c.name, c.data_type))
                    .collect();
                Ok(Relation::from_fields(fields))
            }
            ScanSource::Procedure { procedure, args, contextual_args, foreign } => {
                let (parameters, returns) = if *foreign {
                    let found = self
                        .schema
                        .find_foreign_procedure(procedure)
                        .ok_or_else(|| PlanError::UnknownForeignProcedure(procedure.clone()))?;
                    if contextual_args.len() != 2 {
                        return Err(PlanError::shape("foreign procedure requires 2 arguments"));
                    }
                    // nothing is in scope for a scan's arguments
                    self.many_eval_to(contextual_args, &[DataType::TEXT, DataType::TEXT], &Relation::new())?;
                    (found.parameters.clone(), found.returns.clone())
                } else {
                    let found = self
                        .schema
                        .find_procedure(procedure)
                        .ok_or_else(|| PlanError::UnknownProcedure(procedure.clone()))?;
                    (found.parameter_types(), found.returns.clone())
                };

                let Some(returns) = returns else {
                    return Err(PlanError::shape(format!("procedure \"{procedure}\" does not return anything")));
                };
                if !returns.is_table {
                    return Err(PlanError::shape(format!("procedure \"{procedure}\" does not return a table")));
                }

                self.many_eval_to(args, &parameters, &Relation::new())?;

                let fields = returns.fields.iter().map(|f| Field::new(None, &f.name, f.data_type)).collect();
                Ok(Relation::from_fields(fields))
            }
            ScanSource::Subquery { plan, correlated } => {
                let scope = self.eval_subquery(plan, &Relation::new())?;
                *correlated = scope.referenced;
                Ok(scope.relation)
            }
        }
    }

    /// Evaluates a nested query with `current` added to the visible outer columns.
    fn eval_subquery(&mut self, plan: &mut LogicalPlan, current: &Relation) -> PlanResult<SubqueryScope> {
        let outer = mem::take(&mut self.outer);
        let saved = mem::take(&mut self.correlations);
        self.outer = outer.clone().join(current.clone());

        let result = self.eval_relation(plan);

        let found = mem::replace(&mut self.correlations, saved);
        self.outer = outer;
        let relation = result?;

        let mut attached = Vec::new();
        let mut referenced: Vec<ColumnRef> = Vec::new();
        for column in found {
            match current.search(column.parent.as_deref(), &column.column) {
                Ok(_) => {
                    if !attached.contains(&column) {
                        attached.push(column.clone());
                    }
                }
                Err(err) if err.is_column_not_found() => {
                    trace!(column = %column, "correlation passed to the enclosing query");
                    if !self.correlations.contains(&column) {
                        self.correlations.push(column.clone());
                    }
                }
                Err(err) => return Err(err),
            }
            if !referenced.contains(&column) {
                referenced.push(column);
            }
        }

        Ok(SubqueryScope { relation, attached, referenced })
    }

    pub fn eval_expression(&mut self, expr: &mut LogicalExpr, current: &Relation) -> PlanResult<Field> {
        match expr {
            LogicalExpr::Literal { data_type, .. } => Ok(Field::anonymous(*data_type)),
            LogicalExpr::Variable { name } => self.eval_variable(name),
            LogicalExpr::ColumnRef(column) => {
                let field = match current.search(column.parent.as_deref(), &column.column) {
                    Ok(field) => field.clone(),
                    Err(err) if err.is_column_not_found() => {
                        let field = self.outer.search(column.parent.as_deref(), &column.column)?.clone();
                        column.parent = field.parent.clone();
                        if !self.correlations.contains(column) {
                            self.correlations.push(column.clone());
                        }
                        field
                    }
                    Err(err) => return Err(err),
                };
                field.scalar()?;
                Ok(field)
            }
            LogicalExpr::AggregateFunctionCall { name, args, .. } | LogicalExpr::ScalarFunctionCall { name, args } => {
                let definition = FUNCTIONS.get(name).ok_or_else(|| PlanError::UnknownFunction(name.clone()))?;
                let types = self.many_scalar(args, current)?;
                let returns = definition.validate(&types)?;
                Ok(Field::new(None, name, returns))
            }
            LogicalExpr::ProcedureCall { name, foreign, args, contextual_args } => {
                let (parameters, returns) = if *foreign {
                    let found = self
                        .schema
                        .find_foreign_procedure(name)
                        .ok_or_else(|| PlanError::UnknownForeignProcedure(name.clone()))?;
                    self.many_eval_to(contextual_args, &[DataType::TEXT, DataType::TEXT], current)?;
                    (found.parameters.clone(), found.returns.clone())
                } else {
                    let found = self.schema.find_procedure(name).ok_or_else(|| PlanError::UnknownProcedure(name.clone()))?;
                    (found.parameter_types(), found.returns.clone())
                };

                let Some(returns) = returns else {
                    return Err(PlanError::shape(format!("procedure \"{name}\" does not return anything")));
                };
                if returns.is_table {
                    return Err(PlanError::shape(format!(
                        "procedure \"{name}\" returns a table, use a procedure scan instead"
                    )));
                }
                if returns.fields.len() != 1 {
                    return Err(PlanError::shape(format!("procedure \"{name}\" must return exactly one column")));
                }

                self.many_eval_to(args, &parameters, current)?;
                Ok(Field::new(None, name, returns.fields[0].data_type))
            }
            LogicalExpr::ArithmeticOp { left, right, .. } => {
                let left = self.scalar_of(left, current)?;
                let right = self.scalar_of(right, current)?;
                if !left.is_numeric() {
                    return Err(PlanError::type_err(format!("arithmetic operation requires numeric types, got {left}")));
                }
                if !left.equals(&right) {
                    return Err(PlanError::type_err(format!(
                        "arithmetic operation requires the same data types, got {left} and {right}"
                    )));
                }
                Ok(Field::anonymous(if left.is_null() { right } else { left }))
            }
            LogicalExpr::ComparisonOp { left, right, .. } => {
                let left = self.scalar_of(left, current)?;
                let right = self.scalar_of(right, current)?;
                if !left.equals(&right) {
                    return Err(PlanError::type_err(format!(
                        "comparison operation requires the same data types, got {left} and {right}"
                    )));
                }
                Ok(Field::anonymous(DataType::BOOL))
            }
            LogicalExpr::LogicalOp { left, right, .. } => {
                self.evals_to(left, DataType::BOOL, current)?;
                self.evals_to(right, DataType::BOOL, current)?;
                Ok(Field::anonymous(DataType::BOOL))
            }
            LogicalExpr::UnaryOp { op, expr } => {
                let data_type = self.scalar_of(expr, current)?;
                match op {
                    UnaryOperator::Negate => {
                        if !data_type.is_numeric() {
                            return Err(PlanError::type_err(format!("negation requires a numeric type, got {data_type}")));
                        }
                        if data_type.kind == TypeKind::Uint256 {
                            return Err(PlanError::type_err(format!("negation is not supported for type {data_type}")));
                        }
                    }
                    UnaryOperator::Not => {
                        if !data_type.equals(&DataType::BOOL) {
                            return Err(PlanError::type_err(format!(
                                "logical negation requires a boolean type, got {data_type}"
                            )));
                        }
                    }
                    UnaryOperator::Positive => {
                        if !data_type.is_numeric() {
                            return Err(PlanError::type_err(format!(
                                "positive sign requires a numeric type, got {data_type}"
                            )));
                        }
                    }
                }
                Ok(Field::anonymous(data_type))
            }
            LogicalExpr::TypeCast { expr, data_type } => {
                // any scalar may be cast to any type
                self.scalar_of(expr, current)?;
                Ok(Field::anonymous(*data_type))
            }
            LogicalExpr::Alias { expr, alias } => {
                let mut field = self.eval_expression(expr, current)?;
                field.parent = None;
                field.name = alias.clone();
                Ok(field)
            }
            LogicalExpr::ArrayAccess { array, index } => {
                let data_type = self.scalar_of(array, current)?;
                if !data_type.is_array {
                    return Err(PlanError::type_err(format!(
                        "cannot access array elements of non-array type {data_type}"
                    )));
                }
                self.evals_to(index, DataType::INT, current)?;
                Ok(Field::anonymous(data_type.element()))
            }
            LogicalExpr::ArrayConstructor { elements } => {
                if elements.is_empty() {
                    return Err(PlanError::shape("array constructor must have at least one element"));
                }
                let types = self.many_scalar(elements, current)?;
                let first = types[0];
                if types.iter().any(|t| !t.equals(&first)) {
                    return Err(PlanError::type_err("all elements in array constructor must be of the same type"));
                }
                let element = types.iter().copied().find(|t| !t.is_null()).unwrap_or(first);
                Ok(Field::anonymous(element.array_of()))
            }
            LogicalExpr::FieldAccess { object, field } => {
                let value = self.eval_expression(object, current)?;
                let fields = value.as_object()?;
                let data_type = fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(field))
                    .map(|(_, t)| *t)
                    .ok_or_else(|| PlanError::type_err(format!("field \"{field}\" not found in object")))?;
                Ok(Field::anonymous(data_type))
            }
            LogicalExpr::Subquery(subquery) => {
                let scope = self.eval_subquery(&mut subquery.plan, current)?;
                subquery.correlated = scope.attached;

                if scope.relation.len() != 1 {
                    return Err(PlanError::shape(format!(
                        "subquery must return exactly one column, got {}",
                        scope.relation.len()
                    )));
                }
                let field = scope.relation.fields.into_iter().next().ok_or_else(|| {
                    PlanError::shape("subquery must return exactly one column, got 0")
                })?;
                field.scalar()?;

                match subquery.kind {
                    SubqueryKind::Exists | SubqueryKind::NotExists => Ok(Field::anonymous(DataType::BOOL)),
                    SubqueryKind::Scalar => Ok(field),
                }
            }
        }
    }

    fn eval_variable(&self, name: &str) -> PlanResult<Field> {
        if let Some(data_type) = lookup(self.variables, name) {
            return Ok(Field::anonymous(*data_type));
        }
        if let Some(fields) = lookup(self.objects, name) {
            return Ok(Field::object(name, fields.clone()));
        }
        Err(PlanError::UnknownVariable(name.to_string()))
    }

    fn scalar_of(&mut self, expr: &mut LogicalExpr, current: &Relation) -> PlanResult<DataType> {
        self.eval_expression(expr, current)?.scalar()
    }

    fn many_scalar(&mut self, exprs: &mut [LogicalExpr], current: &Relation) -> PlanResult<Vec<DataType>> {
        exprs.iter_mut().map(|e| self.scalar_of(e, current)).collect()
    }

    fn evals_to(&mut self, expr: &mut LogicalExpr, expected: DataType, current: &Relation) -> PlanResult<()> {
        let actual = self.scalar_of(expr, current)?;
        if !actual.equals(&expected) {
            return Err(PlanError::type_err(format!(
                "expected expression to be of type {expected}, got {actual}"
            )));
        }
        Ok(())
    }

    fn many_eval_to(&mut self, exprs: &mut [LogicalExpr], expected: &[DataType], current: &Relation) -> PlanResult<()> {
        if exprs.len() != expected.len() {
            return Err(PlanError::type_err(format!(
                "expected {} expressions, got {}",
                expected.len(),
                exprs.len()
            )));
        }
        for (expr, data_type) in exprs.iter_mut().zip(expected) {
            self.evals_to(expr, *data_type, current)?;
        }
        Ok(())
    }
}

/// Exact name first, then without the `$`/`@` prefix.
fn lookup<'m, T>(map: &'m IndexMap<String, T>, name: &str) -> Option<&'m T> {
    map.get(name).or_else(|| map.get(name.trim_start_matches(['$', '@'])))
}

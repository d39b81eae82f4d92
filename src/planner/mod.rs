pub mod operators;
pub use operators::*;

pub mod logical_expr;
pub use logical_expr::{ColumnRef, LogicalExpr, SubqueryExpr};

pub mod logical_plan;
pub use logical_plan::*;

pub mod node;
pub use node::*;

pub mod visitor;
pub use visitor::*;

pub mod format;
pub use format::format;

pub mod aggregate_checker;
pub use aggregate_checker::{aggregate_terms, merge_aggregates, AggregateChecker};

pub mod plan_builder;
pub use plan_builder::{plan, plan_sql};

pub mod rewrite;
pub use rewrite::*;

pub mod catalog;
pub use catalog::{DataType, Schema, SchemaProvider};

pub mod error;
pub use error::{PlanError, PlanResult};

pub mod functions;

pub mod parser;

pub mod analyzer;

pub mod planner;
pub use planner::{format, plan, plan_sql, rewrite, LogicalExpr, LogicalNode, LogicalPlan, RewriteConfig};

pub mod config;
pub use config::Config;

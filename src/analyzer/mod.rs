pub mod relation;
pub use relation::*;

pub mod evaluate_context;
pub use evaluate_context::*;

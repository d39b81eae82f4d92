pub mod literal;
pub use literal::*;

pub mod expression;
pub use expression::*;

pub mod statement;
pub use statement::*;

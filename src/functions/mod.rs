pub mod function_definition;
pub use function_definition::*;

pub mod function_registry;
pub use function_registry::*;

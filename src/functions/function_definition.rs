use crate::{catalog::DataType, error::{PlanError, PlanResult}};

/// Checks argument types and returns the call's result type.
pub type ValidateArgs = fn(&[DataType]) -> PlanResult<DataType>;

/// A built-in function known to the planner.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub is_aggregate: bool,
    pub validate_args: ValidateArgs,
}

impl FunctionDefinition {
    pub const fn scalar(name: &'static str, validate_args: ValidateArgs) -> Self {
        Self { name, is_aggregate: false, validate_args }
    }

    pub const fn aggregate(name: &'static str, validate_args: ValidateArgs) -> Self {
        Self { name, is_aggregate: true, validate_args }
    }

    pub fn validate(&self, args: &[DataType]) -> PlanResult<DataType> {
        (self.validate_args)(args)
    }
}

pub(crate) fn arg_count(expected: usize, args: &[DataType]) -> PlanResult<()> {
    if args.len() != expected {
        return Err(PlanError::type_err(format!("expected {expected}, got {}", args.len())));
    }
    Ok(())
}

pub(crate) fn arg_type(expected: DataType, got: DataType) -> PlanResult<()> {
    if !expected.equals(&got) {
        return Err(PlanError::type_err(format!("expected {expected}, got {got}")));
    }
    Ok(())
}

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::{
    catalog::{DataType, TypeKind, MAX_NUMERIC_PRECISION},
    error::{PlanError, PlanResult},
    functions::{arg_count, arg_type, FunctionDefinition},
};

/// Built-in functions, shared by every planning call.
pub static FUNCTIONS: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::default_function_registry);

/// Case-insensitive registry of built-in scalar and aggregate functions.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    by_name: HashMap<String, FunctionDefinition>,
}

impl FunctionRegistry {
    pub fn new() -> Self { Self { by_name: HashMap::new() } }

    pub fn register(&mut self, definition: FunctionDefinition) {
        self.by_name.insert(definition.name.to_ascii_lowercase(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDefinition> {
        self.by_name.get(&name.to_ascii_lowercase())
    }

    pub fn list(&self) -> Vec<String> {
        let mut v: Vec<_> = self.by_name.keys().cloned().collect();
        v.sort();
        v
    }

    pub fn default_function_registry() -> Self {
        let mut registry = Self::new();

        registry.register(FunctionDefinition::scalar("abs", abs));
        registry.register(FunctionDefinition::scalar("length", text_to_int));
        registry.register(FunctionDefinition::scalar("char_length", text_to_int));
        registry.register(FunctionDefinition::scalar("character_length", text_to_int));
        registry.register(FunctionDefinition::scalar("bit_length", text_to_int));
        registry.register(FunctionDefinition::scalar("octet_length", text_to_int));
        registry.register(FunctionDefinition::scalar("lower", text_to_text));
        registry.register(FunctionDefinition::scalar("upper", text_to_text));
        registry.register(FunctionDefinition::scalar("format", format));
        registry.register(FunctionDefinition::scalar("array_length", array_length));
        registry.register(FunctionDefinition::scalar("array_append", array_append));
        registry.register(FunctionDefinition::scalar("array_prepend", array_prepend));
        registry.register(FunctionDefinition::scalar("array_cat", array_cat));
        registry.register(FunctionDefinition::scalar("uuid_generate_v5", uuid_generate_v5));

        registry.register(FunctionDefinition::aggregate("count", count));
        registry.register(FunctionDefinition::aggregate("sum", sum));
        registry.register(FunctionDefinition::aggregate("min", min_max));
        registry.register(FunctionDefinition::aggregate("max", min_max));
        registry.register(FunctionDefinition::aggregate("avg", avg));

        registry
    }
}

fn abs(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(1, args)?;
    let arg = args[0];
    let ok = arg.equals(&DataType::INT) || (!arg.is_array && matches!(arg.kind, TypeKind::Numeric { .. }));
    if !ok {
        return Err(PlanError::type_err(format!("expected argument to be int or decimal, got {arg}")));
    }
    Ok(arg)
}

fn text_to_int(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(1, args)?;
    arg_type(DataType::TEXT, args[0])?;
    Ok(DataType::INT)
}

fn text_to_text(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(1, args)?;
    arg_type(DataType::TEXT, args[0])?;
    Ok(DataType::TEXT)
}

fn format(args: &[DataType]) -> PlanResult<DataType> {
    let Some(first) = args.first() else {
        return Err(PlanError::type_err("invalid number of arguments: expected at least 1, got 0"));
    };
    arg_type(DataType::TEXT, *first)?;
    Ok(DataType::TEXT)
}

fn array_length(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(1, args)?;
    if !args[0].is_array {
        return Err(PlanError::type_err(format!("expected argument to be an array, got {}", args[0])));
    }
    Ok(DataType::INT)
}

fn array_append(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(2, args)?;
    let (array, value) = (args[0], args[1]);
    if !array.is_array {
        return Err(PlanError::type_err(format!("expected first argument to be an array, got {array}")));
    }
    if value.is_array {
        return Err(PlanError::type_err(format!("expected second argument to be a scalar, got {value}")));
    }
    if !array.element().equals(&value) {
        return Err(PlanError::type_err(format!(
            "append type must be equal to scalar array type: array type: {} append type: {value}",
            array.element()
        )));
    }
    Ok(array)
}

fn array_prepend(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(2, args)?;
    let (value, array) = (args[0], args[1]);
    if value.is_array {
        return Err(PlanError::type_err(format!("expected first argument to be a scalar, got {value}")));
    }
    if !array.is_array {
        return Err(PlanError::type_err(format!("expected second argument to be an array, got {array}")));
    }
    if !array.element().equals(&value) {
        return Err(PlanError::type_err(format!(
            "prepend type must be equal to scalar array type: array type: {} prepend type: {value}",
            array.element()
        )));
    }
    Ok(array)
}

fn array_cat(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(2, args)?;
    let (left, right) = (args[0], args[1]);
    if !left.is_array {
        return Err(PlanError::type_err(format!("expected first argument to be an array, got {left}")));
    }
    if !right.is_array {
        return Err(PlanError::type_err(format!("expected second argument to be an array, got {right}")));
    }
    if !left.equals(&right) {
        return Err(PlanError::type_err(format!(
            "expected both arrays to be of the same scalar type, got {} and {}",
            left.element(),
            right.element()
        )));
    }
    Ok(left)
}

fn uuid_generate_v5(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(2, args)?;
    arg_type(DataType::UUID, args[0])?;
    arg_type(DataType::TEXT, args[1])?;
    Ok(DataType::UUID)
}

fn count(args: &[DataType]) -> PlanResult<DataType> {
    if args.len() > 1 {
        return Err(PlanError::type_err(format!(
            "invalid number of arguments: expected at most 1, got {}",
            args.len()
        )));
    }
    Ok(DataType::INT)
}

// sum widens to the maximum precision, keeping the scale of decimals.
fn sum(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(1, args)?;
    let arg = args[0];
    if !arg.is_numeric() {
        return Err(PlanError::type_err(format!("expected argument to be numeric, got {arg}")));
    }
    Ok(match arg.kind {
        TypeKind::Null => DataType::NULL,
        TypeKind::Numeric { scale, .. } => DataType::numeric(MAX_NUMERIC_PRECISION, scale),
        _ => DataType::numeric(MAX_NUMERIC_PRECISION, 0),
    })
}

fn min_max(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(1, args)?;
    let arg = args[0];
    if !arg.is_numeric() && !arg.equals(&DataType::TEXT) {
        return Err(PlanError::type_err(format!("expected argument to be numeric or text, got {arg}")));
    }
    Ok(arg)
}

fn avg(args: &[DataType]) -> PlanResult<DataType> {
    arg_count(1, args)?;
    let arg = args[0];
    if !arg.is_numeric() {
        return Err(PlanError::type_err(format!("expected argument to be numeric, got {arg}")));
    }
    Ok(DataType::numeric(MAX_NUMERIC_PRECISION, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_and_lookup_is_case_insensitive() {
        let names = FUNCTIONS.list();
        for name in ["abs", "array_cat", "avg", "count", "format", "lower", "max", "min", "sum", "upper"] {
            assert!(names.contains(&name.to_string()), "missing {name}");
        }

        assert!(FUNCTIONS.get("COUNT").unwrap().is_aggregate);
        assert!(!FUNCTIONS.get("Lower").unwrap().is_aggregate);
        assert!(FUNCTIONS.get("nope").is_none());
    }

    #[test]
    fn sum_widens_precision() {
        let sum = FUNCTIONS.get("sum").unwrap();
        assert_eq!(sum.validate(&[DataType::INT]).unwrap(), DataType::numeric(1000, 0));
        assert_eq!(sum.validate(&[DataType::UINT256]).unwrap(), DataType::numeric(1000, 0));
        assert_eq!(sum.validate(&[DataType::numeric(10, 2)]).unwrap(), DataType::numeric(1000, 2));

        match sum.validate(&[DataType::TEXT]) {
            Err(PlanError::Type(msg)) => assert_eq!(msg, "expected argument to be numeric, got text"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn count_accepts_star_or_single_argument() {
        let count = FUNCTIONS.get("count").unwrap();
        assert_eq!(count.validate(&[]).unwrap(), DataType::INT);
        assert_eq!(count.validate(&[DataType::TEXT]).unwrap(), DataType::INT);
        assert!(count.validate(&[DataType::TEXT, DataType::INT]).is_err());
    }

    #[test]
    fn min_max_keep_the_argument_type() {
        let min = FUNCTIONS.get("min").unwrap();
        assert_eq!(min.validate(&[DataType::TEXT]).unwrap(), DataType::TEXT);
        assert_eq!(min.validate(&[DataType::INT]).unwrap(), DataType::INT);
        assert!(min.validate(&[DataType::BOOL]).is_err());
    }

    #[test]
    fn scalar_argument_checks() {
        let lower = FUNCTIONS.get("lower").unwrap();
        assert_eq!(lower.validate(&[DataType::TEXT]).unwrap(), DataType::TEXT);
        match lower.validate(&[DataType::INT]) {
            Err(PlanError::Type(msg)) => assert_eq!(msg, "expected text, got int8"),
            other => panic!("unexpected {other:?}"),
        }
        match lower.validate(&[]) {
            Err(PlanError::Type(msg)) => assert_eq!(msg, "expected 1, got 0"),
            other => panic!("unexpected {other:?}"),
        }

        let append = FUNCTIONS.get("array_append").unwrap();
        assert_eq!(
            append.validate(&[DataType::INT.array_of(), DataType::INT]).unwrap(),
            DataType::INT.array_of()
        );
        assert!(append.validate(&[DataType::INT.array_of(), DataType::TEXT]).is_err());

        let abs = FUNCTIONS.get("abs").unwrap();
        assert_eq!(abs.validate(&[DataType::numeric(5, 1)]).unwrap(), DataType::numeric(5, 1));
        assert!(abs.validate(&[DataType::TEXT]).is_err());
    }
}

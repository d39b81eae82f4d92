use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Precision and scale given to `sum`/`avg` results over integers.
pub const MAX_NUMERIC_PRECISION: u16 = 1000;

static TYPE_NAME: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^([a-z][a-z0-9_]*)\s*(?:\(\s*(\d+)\s*,\s*(\d+)\s*\))?\s*(\[\])?$").ok()
});

/// Scalar kinds understood by the planner.
///
/// `Null` is the type of an untyped `NULL` literal; it compares equal to
/// every other kind so it can appear anywhere a value is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Untyped null
    Null,
    /// 64-bit signed integer (`int8`)
    Int,
    /// UTF-8 text
    Text,
    /// Boolean
    Bool,
    /// Byte array
    Blob,
    /// 16 byte UUID
    Uuid,
    /// Unsigned 256 bit integer
    Uint256,
    /// Fixed point decimal with precision and scale
    Numeric { precision: u16, scale: u16 },
}

impl TypeKind {
    fn name(&self) -> &'static str {
        match self {
            TypeKind::Null => "null",
            TypeKind::Int => "int8",
            TypeKind::Text => "text",
            TypeKind::Bool => "bool",
            TypeKind::Blob => "blob",
            TypeKind::Uuid => "uuid",
            TypeKind::Uint256 => "uint256",
            TypeKind::Numeric { .. } => "numeric",
        }
    }
}

/// A column, parameter or expression type: a scalar kind, optionally an array of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataType {
    pub kind: TypeKind,
    pub is_array: bool,
}

impl DataType {
    pub const NULL: DataType = DataType::scalar(TypeKind::Null);
    pub const INT: DataType = DataType::scalar(TypeKind::Int);
    pub const TEXT: DataType = DataType::scalar(TypeKind::Text);
    pub const BOOL: DataType = DataType::scalar(TypeKind::Bool);
    pub const BLOB: DataType = DataType::scalar(TypeKind::Blob);
    pub const UUID: DataType = DataType::scalar(TypeKind::Uuid);
    pub const UINT256: DataType = DataType::scalar(TypeKind::Uint256);

    pub const fn scalar(kind: TypeKind) -> Self {
        Self { kind, is_array: false }
    }

    pub const fn numeric(precision: u16, scale: u16) -> Self {
        Self::scalar(TypeKind::Numeric { precision, scale })
    }

    pub fn array_of(self) -> Self {
        Self { kind: self.kind, is_array: true }
    }

    pub fn element(self) -> Self {
        Self { kind: self.kind, is_array: false }
    }

    pub fn is_null(&self) -> bool {
        self.kind == TypeKind::Null
    }

    /// Numeric scalars: `int8`, `numeric(p,s)` and `uint256`.
    pub fn is_numeric(&self) -> bool {
        if self.is_array {
            return false;
        }
        matches!(self.kind, TypeKind::Null | TypeKind::Int | TypeKind::Uint256 | TypeKind::Numeric { .. })
    }

    /// Type equality used by every evaluator check. `null` matches anything.
    pub fn equals(&self, other: &DataType) -> bool {
        if self.is_null() || other.is_null() {
            return true;
        }
        self == other
    }

    /// Parses names such as `int`, `text[]`, `numeric(10,2)` or `decimal(10, 2)[]`.
    pub fn parse(name: &str) -> Result<Self, PlanError> {
        let lowered = name.trim().to_ascii_lowercase();
        let caps = TYPE_NAME
            .as_ref()
            .and_then(|re| re.captures(&lowered))
            .ok_or_else(|| PlanError::Schema(format!("invalid type name \"{name}\"")))?;

        let base = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let metadata = match (caps.get(2), caps.get(3)) {
            (Some(p), Some(s)) => {
                let precision = p.as_str().parse::<u16>()
                    .map_err(|_| PlanError::Schema(format!("invalid precision in \"{name}\"")))?;
                let scale = s.as_str().parse::<u16>()
                    .map_err(|_| PlanError::Schema(format!("invalid scale in \"{name}\"")))?;
                if scale > precision {
                    return Err(PlanError::Schema(format!("scale exceeds precision in \"{name}\"")));
                }
                Some((precision, scale))
            }
            _ => None,
        };

        let kind = match (base, metadata) {
            ("numeric" | "decimal", Some((precision, scale))) => TypeKind::Numeric { precision, scale },
            ("numeric" | "decimal", None) => TypeKind::Numeric { precision: MAX_NUMERIC_PRECISION, scale: 0 },
            (_, Some(_)) => {
                return Err(PlanError::Schema(format!("type \"{base}\" does not take precision and scale")));
            }
            ("int" | "int8" | "integer" | "bigint", None) => TypeKind::Int,
            ("text" | "string" | "varchar", None) => TypeKind::Text,
            ("bool" | "boolean", None) => TypeKind::Bool,
            ("blob" | "bytea", None) => TypeKind::Blob,
            ("uuid", None) => TypeKind::Uuid,
            ("uint256", None) => TypeKind::Uint256,
            ("null", None) => TypeKind::Null,
            _ => return Err(PlanError::Schema(format!("unknown type \"{base}\""))),
        };

        Ok(Self { kind, is_array: caps.get(4).is_some() })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.name())?;
        if let TypeKind::Numeric { precision, scale } = self.kind {
            write!(f, "({precision},{scale})")?;
        }
        if self.is_array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for DataType {
    type Error = PlanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DataType::parse(&value)
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases_and_arrays() {
        assert_eq!(DataType::parse("int").unwrap(), DataType::INT);
        assert_eq!(DataType::parse("INT8").unwrap(), DataType::INT);
        assert_eq!(DataType::parse("text[]").unwrap(), DataType::TEXT.array_of());
        assert_eq!(DataType::parse("decimal(10, 2)").unwrap(), DataType::numeric(10, 2));
        assert_eq!(DataType::parse("numeric").unwrap(), DataType::numeric(1000, 0));
    }

    #[test]
    fn parse_rejects_unknown_and_malformed() {
        assert!(DataType::parse("money").is_err());
        assert!(DataType::parse("int(1,2)").is_err());
        assert!(DataType::parse("numeric(2,5)").is_err());
        assert!(DataType::parse("").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for name in ["int8", "text[]", "numeric(10,2)", "uuid", "bool", "uint256[]"] {
            let dt = DataType::parse(name).unwrap();
            assert_eq!(dt.to_string(), name);
        }
    }

    #[test]
    fn null_matches_everything_else_is_strict() {
        assert!(DataType::NULL.equals(&DataType::TEXT));
        assert!(DataType::INT.equals(&DataType::NULL));
        assert!(!DataType::INT.equals(&DataType::numeric(1000, 0)));
        assert!(!DataType::INT.equals(&DataType::INT.array_of()));
        assert!(DataType::numeric(5, 2).equals(&DataType::numeric(5, 2)));
    }

    #[test]
    fn numeric_classification() {
        assert!(DataType::INT.is_numeric());
        assert!(DataType::UINT256.is_numeric());
        assert!(DataType::numeric(3, 1).is_numeric());
        assert!(!DataType::TEXT.is_numeric());
        assert!(!DataType::INT.array_of().is_numeric());
    }

    #[test]
    fn serde_uses_type_names() {
        let dt: DataType = serde_json::from_str("\"int[]\"").unwrap();
        assert_eq!(dt, DataType::INT.array_of());
        assert_eq!(serde_json::to_string(&DataType::numeric(4, 1)).unwrap(), "\"numeric(4,1)\"");
    }
}

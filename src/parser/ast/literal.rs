use ordered_float::NotNan;
use std::fmt::{self, Display};

use crate::catalog::DataType;

/// A constant written in the query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Text(String),
    Int(i64),
    /// Decimal literal with the precision and scale of its written digits.
    Decimal { value: NotNan<f64>, precision: u16, scale: u16 },
    Bool(bool),
    Blob(Vec<u8>),
    Null,
}

impl Literal {
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Text(_) => DataType::TEXT,
            Literal::Int(_) => DataType::INT,
            Literal::Decimal { precision, scale, .. } => DataType::numeric(*precision, *scale),
            Literal::Bool(_) => DataType::BOOL,
            Literal::Blob(_) => DataType::BLOB,
            Literal::Null => DataType::NULL,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Text(s) => write!(f, "'{}'", s),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Decimal { value, scale, .. } => write!(f, "{:.*}", *scale as usize, value.into_inner()),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Blob(bytes) => {
                f.write_str("0x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Literal::Null => write!(f, "NULL"),
        }
    }
}

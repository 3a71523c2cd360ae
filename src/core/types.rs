// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Core type definitions: DataType and comparison operators

use std::fmt;
use std::str::FromStr;

use super::error::Error;

/// Value data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DataType {
    /// NULL data type, used for unknown/unspecified types
    #[default]
    Null = 0,

    /// 64-bit signed integer
    Integer = 1,

    /// 64-bit floating point number
    Float = 2,

    /// UTF-8 text string
    Text = 3,

    /// Boolean true/false
    Boolean = 4,

    /// Timestamp with timezone (stored as UTC)
    Timestamp = 5,

    /// JSON document
    Json = 6,

    /// Lazy per-row value sequence of an ungrouped column
    Sequence = 7,

    /// Tuple valued
    Tuple = 8,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Json => write!(f, "JSON"),
            DataType::Sequence => write!(f, "SEQUENCE"),
            DataType::Tuple => write!(f, "TUPLE"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NULL" => Ok(DataType::Null),
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" => Ok(DataType::Integer),
            "FLOAT" | "DOUBLE" | "REAL" | "DECIMAL" | "NUMERIC" => Ok(DataType::Float),
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" => Ok(DataType::Text),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "TIMESTAMP" | "DATETIME" | "DATE" | "TIME" => Ok(DataType::Timestamp),
            "JSON" | "JSONB" => Ok(DataType::Json),
            _ => Err(Error::Type(format!("unknown data type '{}'", s))),
        }
    }
}

/// Comparison operators for binary predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    /// Equality (=)
    Eq = 0,

    /// Inequality (!=)
    Ne = 1,

    /// Greater than (>)
    Gt = 2,

    /// Greater than or equal (>=)
    Gte = 3,

    /// Less than (<)
    Lt = 4,

    /// Less than or equal (<=)
    Lte = 5,
}

impl Operator {
    /// Returns the operator with its operands swapped (a < b  <=>  b > a)
    pub fn swap(&self) -> Self {
        match self {
            Operator::Eq => Operator::Eq,
            Operator::Ne => Operator::Ne,
            Operator::Gt => Operator::Lt,
            Operator::Gte => Operator::Lte,
            Operator::Lt => Operator::Gt,
            Operator::Lte => Operator::Gte,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => write!(f, "="),
            Operator::Ne => write!(f, "!="),
            Operator::Gt => write!(f, ">"),
            Operator::Gte => write!(f, ">="),
            Operator::Lt => write!(f, "<"),
            Operator::Lte => write!(f, "<="),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parse() {
        assert_eq!("int".parse::<DataType>().unwrap(), DataType::Integer);
        assert_eq!("VARCHAR".parse::<DataType>().unwrap(), DataType::Text);
        assert!("blob".parse::<DataType>().is_err());
    }

    #[test]
    fn test_operator_swap() {
        assert_eq!(Operator::Lt.swap(), Operator::Gt);
        assert_eq!(Operator::Gte.swap(), Operator::Lte);
        assert_eq!(Operator::Eq.swap(), Operator::Eq);
        assert_eq!(Operator::Lte.to_string(), "<=");
    }
}

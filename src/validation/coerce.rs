//! Filter value coercion against a dimension's declared type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use super::{ValidationError, ValidationResult};
use crate::intent::FilterOperator;
use crate::model::{DataType, Dimension};
use crate::sql::Literal;

fn invalid(dim: &Dimension, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidFilterValue {
        dimension: dim.name.clone(),
        reason: reason.into(),
    }
}

/// Typed values for `op` on `dim`.
///
/// List operators accept an array or a single scalar; IS NULL and IS NOT
/// NULL ignore the value entirely.
pub(super) fn filter_values(
    dim: &Dimension,
    op: FilterOperator,
    value: &Value,
) -> ValidationResult<Vec<Literal>> {
    if op.is_nullary() {
        return Ok(Vec::new());
    }

    if op.takes_list() {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            scalar => vec![scalar],
        };
        if items.is_empty() {
            return Err(invalid(dim, format!("{} needs at least one value", op)));
        }
        if op == FilterOperator::Between && items.len() != 2 {
            return Err(invalid(
                dim,
                format!("BETWEEN takes exactly 2 values, got {}", items.len()),
            ));
        }
        return items.into_iter().map(|v| scalar(dim, v)).collect();
    }

    match value {
        Value::Array(_) => Err(invalid(dim, format!("{} takes a single value", op))),
        Value::Null => Err(invalid(dim, format!("{} needs a value", op))),
        v => {
            if op == FilterOperator::Like && dim.data_type != DataType::String {
                return Err(invalid(dim, "LIKE only applies to string dimensions"));
            }
            Ok(vec![scalar(dim, v)?])
        }
    }
}

fn scalar(dim: &Dimension, value: &Value) -> ValidationResult<Literal> {
    match (dim.data_type, value) {
        (DataType::String, Value::String(s)) => Ok(Literal::String(s.clone())),
        (DataType::String, Value::Number(n)) => Ok(Literal::String(n.to_string())),

        (DataType::Integer, Value::Number(n)) => n
            .as_i64()
            .map(Literal::Int)
            .ok_or_else(|| invalid(dim, format!("{} is not an integer", n))),
        (DataType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| invalid(dim, format!("'{}' is not an integer", s))),

        (DataType::Decimal, Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Literal::Int(i)),
            (None, Some(f)) => Ok(Literal::Float(f)),
            _ => Err(invalid(dim, format!("{} is out of range", n))),
        },
        (DataType::Decimal, Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Literal::Int)
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(Literal::Float)
                })
                .ok_or_else(|| invalid(dim, format!("'{}' is not a finite number", s)))
        }

        (DataType::Boolean, Value::Bool(b)) => Ok(Literal::Bool(*b)),
        (DataType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Literal::Bool(true)),
            "false" => Ok(Literal::Bool(false)),
            _ => Err(invalid(dim, format!("'{}' is not a boolean", s))),
        },

        (DataType::Date, Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Literal::Date)
            .map_err(|_| invalid(dim, format!("'{}' is not a YYYY-MM-DD date", s))),

        (DataType::Timestamp, Value::String(s)) => parse_timestamp(s.trim())
            .map(Literal::Timestamp)
            .ok_or_else(|| invalid(dim, format!("'{}' is not an ISO timestamp", s))),

        (data_type, other) => Err(invalid(
            dim,
            format!("{} does not fit a {} dimension", other, data_type),
        )),
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

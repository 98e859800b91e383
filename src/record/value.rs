use std::{cmp::Ordering, fmt, io, mem::size_of, sync::Arc};

use thiserror::Error;

use crate::serdes::{Decode, DecodeError, Encode};

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("incomparable types: {left} vs {right}")]
    Incomparable { left: ValueKind, right: ValueKind },
}

/// A boxed scalar used for ordering-field values and row payloads.
///
/// `StrView` is a reference to externally stored character data (e.g. a
/// shared buffer produced by a zero-copy decoder); it compares equal to a
/// plain `String` with identical contents.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null is less than any non-Null value.
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    StrView(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    StrView,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Float32 => "float32",
            ValueKind::Float64 => "float64",
            ValueKind::String => "string",
            ValueKind::StrView => "str-view",
        };
        write!(f, "{}", name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::String(_) => ValueKind::String,
            Value::StrView(_) => ValueKind::StrView,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Approximate in-memory footprint, fed into the spill trigger.
    pub fn size(&self) -> usize {
        match self {
            Value::Null | Value::Boolean(_) => 1,
            Value::Int32(_) | Value::Float32(_) => size_of::<u32>(),
            Value::Int64(_) | Value::Float64(_) => size_of::<u64>(),
            Value::String(v) => size_of::<String>() + v.len(),
            Value::StrView(v) => size_of::<Arc<str>>() + v.len(),
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            Value::StrView(v) => Some(v),
            _ => None,
        }
    }
}

/// Structural equality; `String` and `StrView` with identical contents are
/// equal, mirroring [`compare_values`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a.total_cmp(b) == Ordering::Equal,
            (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b) == Ordering::Equal,
            (a, b) => match (a.as_str(), b.as_str()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/// Total-order comparison over heterogeneous scalars.
///
/// Mixed integer widths widen to `i64`; if either operand is floating, both
/// widen to `f64` before comparing. There is no implicit
/// coercion between textual and numeric/boolean kinds: such pairings fail
/// with [`ValueError::Incomparable`]. `Null` orders below any present value.
pub fn compare_values(a: &Value, b: &Value) -> Result<Ordering, ValueError> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Null, _) => Ok(Ordering::Less),
        (_, Value::Null) => Ok(Ordering::Greater),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
        (a, b) => {
            if let (Some(a), Some(b)) = (a.as_str(), b.as_str()) {
                return Ok(a.as_bytes().cmp(b.as_bytes()));
            }
            match (numeric(a), numeric(b)) {
                (Some(a), Some(b)) => Ok(compare_numeric(a, b)),
                _ => Err(ValueError::Incomparable {
                    left: a.kind(),
                    right: b.kind(),
                }),
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Numeric {
    Int(i64),
    // Any float operand widens both sides to f64; an f32 would collapse
    // integers beyond 2^24 and let distinct ordering values tie.
    Float(f64),
}

fn numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Int32(v) => Some(Numeric::Int(*v as i64)),
        Value::Int64(v) => Some(Numeric::Int(*v)),
        Value::Float32(v) => Some(Numeric::Float(*v as f64)),
        Value::Float64(v) => Some(Numeric::Float(*v)),
        _ => None,
    }
}

fn compare_numeric(a: Numeric, b: Numeric) -> Ordering {
    use Numeric::*;

    match (a, b) {
        (Int(a), Int(b)) => a.cmp(&b),
        (Float(a), Float(b)) => a.total_cmp(&b),
        (Float(a), Int(b)) => a.total_cmp(&(b as f64)),
        (Int(a), Float(b)) => (a as f64).total_cmp(&b),
    }
}

impl Encode for Value {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Value::Null => 0_u8.encode(writer),
            Value::Boolean(v) => {
                1_u8.encode(writer)?;
                v.encode(writer)
            }
            Value::Int32(v) => {
                2_u8.encode(writer)?;
                v.encode(writer)
            }
            Value::Int64(v) => {
                3_u8.encode(writer)?;
                v.encode(writer)
            }
            Value::Float32(v) => {
                4_u8.encode(writer)?;
                v.encode(writer)
            }
            Value::Float64(v) => {
                5_u8.encode(writer)?;
                v.encode(writer)
            }
            Value::String(v) => {
                6_u8.encode(writer)?;
                v.encode(writer)
            }
            Value::StrView(v) => {
                7_u8.encode(writer)?;
                v.as_ref().encode(writer)
            }
        }
    }

    fn size(&self) -> usize {
        1 + match self {
            Value::Null => 0,
            Value::Boolean(v) => Encode::size(v),
            Value::Int32(v) => Encode::size(v),
            Value::Int64(v) => Encode::size(v),
            Value::Float32(v) => Encode::size(v),
            Value::Float64(v) => Encode::size(v),
            Value::String(v) => Encode::size(v),
            Value::StrView(v) => Encode::size(&v.as_ref()),
        }
    }
}

impl Decode for Value {
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let tag = u8::decode(reader)?;

        Ok(match tag {
            0 => Value::Null,
            1 => Value::Boolean(bool::decode(reader)?),
            2 => Value::Int32(i32::decode(reader)?),
            3 => Value::Int64(i64::decode(reader)?),
            4 => Value::Float32(f32::decode(reader)?),
            5 => Value::Float64(f64::decode(reader)?),
            6 => Value::String(String::decode(reader)?),
            7 => Value::StrView(Arc::from(String::decode(reader)?)),
            tag => return Err(DecodeError::InvalidTag(tag)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cmp::Ordering, io::Cursor, sync::Arc};

    use super::*;

    fn wrap(s: &str) -> Value {
        Value::StrView(Arc::from(s))
    }

    fn cmp(a: Value, b: Value) -> Ordering {
        compare_values(&a, &b).unwrap()
    }

    #[test]
    fn compare_same_kind() {
        assert_eq!(cmp(Value::Boolean(true), Value::Boolean(false)), Ordering::Greater);
        assert_eq!(cmp(Value::Boolean(true), Value::Boolean(true)), Ordering::Equal);
        assert_eq!(cmp(Value::Boolean(false), Value::Boolean(true)), Ordering::Less);
        assert_eq!(cmp(Value::Int32(20), Value::Int32(15)), Ordering::Greater);
        assert_eq!(cmp(Value::Int32(15), Value::Int32(15)), Ordering::Equal);
        assert_eq!(cmp(Value::Int32(10), Value::Int32(15)), Ordering::Less);
        assert_eq!(cmp(Value::Float32(1.1), Value::Float32(1.0)), Ordering::Greater);
        assert_eq!(cmp(Value::Float32(1.0), Value::Float32(1.0)), Ordering::Equal);
        assert_eq!(cmp(Value::Float64(0.9), Value::Float64(1.0)), Ordering::Less);
        assert_eq!(
            cmp(Value::String("value2".into()), Value::String("value1".into())),
            Ordering::Greater
        );
        assert_eq!(
            cmp(Value::String("value1".into()), Value::String("value1".into())),
            Ordering::Equal
        );
    }

    #[test]
    fn compare_mixed_integer_widths() {
        assert_eq!(cmp(Value::Int64(i64::MAX / 2), Value::Int32(10)), Ordering::Greater);
        assert_eq!(cmp(Value::Int32(20), Value::Int64(10)), Ordering::Greater);
        assert_eq!(cmp(Value::Int64(10), Value::Int32(10)), Ordering::Equal);
        assert_eq!(cmp(Value::Int32(10), Value::Int64(10)), Ordering::Equal);
        assert_eq!(cmp(Value::Int32(10), Value::Int64(i64::MAX)), Ordering::Less);
        assert_eq!(cmp(Value::Int64(10), Value::Int32(20)), Ordering::Less);
    }

    #[test]
    fn compare_mixed_float_widths() {
        assert_eq!(cmp(Value::Float64(1.5), Value::Float32(1.0)), Ordering::Greater);
        assert_eq!(cmp(Value::Float32(1.0), Value::Float64(1.0)), Ordering::Equal);
        assert_eq!(cmp(Value::Int32(2), Value::Float64(1.5)), Ordering::Greater);
        assert_eq!(cmp(Value::Float32(0.5), Value::Int64(1)), Ordering::Less);
        // 2^24 + 1 is not representable as f32; widening must go through
        // f64 so the integer stays distinct.
        assert_eq!(
            cmp(Value::Int64(16_777_217), Value::Float32(16_777_216.0)),
            Ordering::Greater
        );
        assert_eq!(
            cmp(Value::Float32(16_777_216.0), Value::Int64(16_777_217)),
            Ordering::Less
        );
    }

    #[test]
    fn compare_str_view_equivalence() {
        assert_eq!(cmp(wrap("value2"), Value::String("value1".into())), Ordering::Greater);
        assert_eq!(cmp(Value::String("value2".into()), wrap("value1")), Ordering::Greater);
        assert_eq!(cmp(wrap("value1"), Value::String("value1".into())), Ordering::Equal);
        assert_eq!(cmp(Value::String("value1".into()), wrap("value1")), Ordering::Equal);
        assert_eq!(cmp(wrap("value1"), Value::String("value2".into())), Ordering::Less);
        assert_eq!(cmp(Value::String("value1".into()), wrap("value2")), Ordering::Less);
        assert_eq!(wrap("v"), Value::String("v".into()));
    }

    #[test]
    fn compare_null_is_lowest() {
        assert_eq!(cmp(Value::Null, Value::Int32(i32::MIN)), Ordering::Less);
        assert_eq!(cmp(Value::String("".into()), Value::Null), Ordering::Greater);
        assert_eq!(cmp(Value::Null, Value::Null), Ordering::Equal);
    }

    #[test]
    fn incomparable_kinds() {
        assert!(compare_values(&Value::Boolean(true), &Value::String("x".into())).is_err());
        assert!(compare_values(&Value::Int32(1), &wrap("1")).is_err());
        assert!(compare_values(&Value::Float64(1.0), &Value::Boolean(false)).is_err());
    }

    #[test]
    fn value_encode_decode() {
        let values = vec![
            Value::Null,
            Value::Boolean(true),
            Value::Int32(-3),
            Value::Int64(1 << 40),
            Value::Float32(2.5),
            Value::Float64(-0.25),
            Value::String("spill".into()),
            wrap("view"),
        ];

        let mut buf = Vec::new();
        for value in &values {
            value.encode(&mut buf).unwrap();
        }

        let mut cursor = Cursor::new(buf);
        for value in &values {
            assert_eq!(&Value::decode(&mut cursor).unwrap(), value);
        }
    }
}

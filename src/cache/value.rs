//! Cache Value Module
//!
//! Defines the payload stored in the cache and the numeric families that
//! support in-place increment and decrement.

use serde::{Deserialize, Serialize};

// == Value ==
/// A value stored in the cache.
///
/// The enum is tagged on the wire as `{"kind": ..., "data": ...}` so a
/// snapshot stays readable by a build that does not know every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(#[serde(with = "f32_repr")] f32),
    F64(#[serde(with = "f64_repr")] f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
}

// JSON has no literal for NaN or the infinities, so those are written as
// the strings "nan", "inf" and "-inf". Finite floats stay plain numbers.
macro_rules! float_repr {
    ($module:ident, $t:ty, $ser:ident) => {
        mod $module {
            use std::fmt;

            use serde::de::{self, Deserializer, Visitor};
            use serde::Serializer;

            pub fn serialize<S: Serializer>(v: &$t, serializer: S) -> Result<S::Ok, S::Error> {
                if v.is_nan() {
                    serializer.serialize_str("nan")
                } else if v.is_infinite() {
                    serializer.serialize_str(if *v > 0.0 { "inf" } else { "-inf" })
                } else {
                    serializer.$ser(*v)
                }
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<$t, D::Error> {
                struct FloatVisitor;

                impl<'de> Visitor<'de> for FloatVisitor {
                    type Value = $t;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        f.write_str("a number, \"nan\", \"inf\" or \"-inf\"")
                    }

                    fn visit_f64<E: de::Error>(self, v: f64) -> Result<$t, E> {
                        Ok(v as $t)
                    }

                    fn visit_i64<E: de::Error>(self, v: i64) -> Result<$t, E> {
                        Ok(v as $t)
                    }

                    fn visit_u64<E: de::Error>(self, v: u64) -> Result<$t, E> {
                        Ok(v as $t)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$t, E> {
                        match v {
                            "nan" => Ok(<$t>::NAN),
                            "inf" => Ok(<$t>::INFINITY),
                            "-inf" => Ok(<$t>::NEG_INFINITY),
                            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                        }
                    }
                }

                deserializer.deserialize_any(FloatVisitor)
            }
        }
    };
}

float_repr!(f32_repr, f32, serialize_f32);
float_repr!(f64_repr, f64, serialize_f64);

/// Direction of a numeric mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Increment,
    Decrement,
}

// Integer widths wrap on overflow; the delta is cast to the stored width first.
macro_rules! step_int {
    ($v:expr, $delta:expr, $step:expr, $t:ty) => {
        match $step {
            Step::Increment => $v.wrapping_add($delta as $t),
            Step::Decrement => $v.wrapping_sub($delta as $t),
        }
    };
}

macro_rules! step_float {
    ($v:expr, $delta:expr, $step:expr, $t:ty) => {
        match $step {
            Step::Increment => $v + $delta as $t,
            Step::Decrement => $v - $delta as $t,
        }
    };
}

impl Value {
    /// Returns the wire name of this value's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::Isize(_) => "isize",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::Usize(_) => "usize",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
        }
    }

    /// True for every integer and floating-point kind.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::Bool(_) | Value::Str(_) | Value::Bytes(_))
    }

    /// True for `f32` and `f64`.
    pub fn is_float(&self) -> bool {
        matches!(self, Value::F32(_) | Value::F64(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Applies an `i64` delta to any numeric kind, keeping the stored kind.
    ///
    /// Returns `None` for non-numeric values.
    pub(crate) fn step_by_int(&self, delta: i64, step: Step) -> Option<Value> {
        let next = match *self {
            Value::I8(v) => Value::I8(step_int!(v, delta, step, i8)),
            Value::I16(v) => Value::I16(step_int!(v, delta, step, i16)),
            Value::I32(v) => Value::I32(step_int!(v, delta, step, i32)),
            Value::I64(v) => Value::I64(step_int!(v, delta, step, i64)),
            Value::Isize(v) => Value::Isize(step_int!(v, delta, step, isize)),
            Value::U8(v) => Value::U8(step_int!(v, delta, step, u8)),
            Value::U16(v) => Value::U16(step_int!(v, delta, step, u16)),
            Value::U32(v) => Value::U32(step_int!(v, delta, step, u32)),
            Value::U64(v) => Value::U64(step_int!(v, delta, step, u64)),
            Value::Usize(v) => Value::Usize(step_int!(v, delta, step, usize)),
            Value::F32(v) => Value::F32(step_float!(v, delta, step, f32)),
            Value::F64(v) => Value::F64(step_float!(v, delta, step, f64)),
            Value::Bool(_) | Value::Str(_) | Value::Bytes(_) => return None,
        };
        Some(next)
    }

    /// Applies an `f64` delta to a float kind. Returns `None` otherwise.
    pub(crate) fn step_by_float(&self, delta: f64, step: Step) -> Option<Value> {
        match *self {
            Value::F32(v) => Some(Value::F32(step_float!(v, delta, step, f32))),
            Value::F64(v) => Some(Value::F64(step_float!(v, delta, step, f64))),
            _ => None,
        }
    }
}

// == Numeric ==
/// A concrete numeric kind that can be incremented with a same-kind delta.
///
/// Implemented for every fixed-width integer and both float widths. Used by
/// the typed entry points that hand the new value back to the caller.
pub trait Numeric: Copy + Into<Value> + Send + Sync + 'static {
    /// Wire name of the kind, used in `WrongType` errors.
    const KIND: &'static str;

    /// Extracts `Self` if the value is exactly this kind.
    fn from_value(value: &Value) -> Option<Self>;

    /// Applies a same-kind delta. Integers wrap on overflow.
    fn apply(self, delta: Self, step: Step) -> Self;
}

macro_rules! numeric_int {
    ($($t:ty => $variant:ident, $kind:literal;)*) => {
        $(
            impl Numeric for $t {
                const KIND: &'static str = $kind;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }

                fn apply(self, delta: Self, step: Step) -> Self {
                    match step {
                        Step::Increment => self.wrapping_add(delta),
                        Step::Decrement => self.wrapping_sub(delta),
                    }
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

macro_rules! numeric_float {
    ($($t:ty => $variant:ident, $kind:literal;)*) => {
        $(
            impl Numeric for $t {
                const KIND: &'static str = $kind;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }

                fn apply(self, delta: Self, step: Step) -> Self {
                    match step {
                        Step::Increment => self + delta,
                        Step::Decrement => self - delta,
                    }
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

numeric_int! {
    i8 => I8, "i8";
    i16 => I16, "i16";
    i32 => I32, "i32";
    i64 => I64, "i64";
    isize => Isize, "isize";
    u8 => U8, "u8";
    u16 => U16, "u16";
    u32 => U32, "u32";
    u64 => U64, "u64";
    usize => Usize, "usize";
}

numeric_float! {
    f32 => F32, "f32";
    f64 => F64, "f64";
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_by_int_keeps_kind() {
        let v = Value::I32(10);
        assert_eq!(v.step_by_int(5, Step::Increment), Some(Value::I32(15)));
        assert_eq!(v.step_by_int(5, Step::Decrement), Some(Value::I32(5)));

        let f = Value::F64(1.5);
        assert_eq!(f.step_by_int(2, Step::Increment), Some(Value::F64(3.5)));
    }

    #[test]
    fn test_step_by_int_wraps_narrow_widths() {
        let v = Value::U8(250);
        assert_eq!(v.step_by_int(10, Step::Increment), Some(Value::U8(4)));

        let v = Value::U32(0);
        assert_eq!(v.step_by_int(1, Step::Decrement), Some(Value::U32(u32::MAX)));
    }

    #[test]
    fn test_step_by_int_rejects_non_numeric() {
        assert!(Value::from("ten").step_by_int(1, Step::Increment).is_none());
        assert!(Value::Bool(true).step_by_int(1, Step::Increment).is_none());
    }

    #[test]
    fn test_step_by_float_only_floats() {
        assert_eq!(
            Value::F32(1.0).step_by_float(0.5, Step::Increment),
            Some(Value::F32(1.5))
        );
        assert!(Value::I64(1).step_by_float(0.5, Step::Increment).is_none());
    }

    #[test]
    fn test_numeric_from_value_is_exact() {
        assert_eq!(i64::from_value(&Value::I64(7)), Some(7));
        assert_eq!(i64::from_value(&Value::I32(7)), None);
        assert_eq!(f32::from_value(&Value::F64(1.0)), None);
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let json = serde_json::to_string(&Value::U16(9)).unwrap();
        assert_eq!(json, r#"{"kind":"u16","data":9}"#);

        let back: Value = serde_json::from_str(r#"{"kind":"str","data":"hi"}"#).unwrap();
        assert_eq!(back, Value::from("hi"));
    }

    #[test]
    fn test_non_finite_floats_survive_json() {
        let json = serde_json::to_string(&Value::F64(f64::NEG_INFINITY)).unwrap();
        assert_eq!(json, r#"{"kind":"f64","data":"-inf"}"#);

        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::F64(f64::NEG_INFINITY));

        let json = serde_json::to_value(&Value::F32(f32::NAN)).unwrap();
        let back: Value = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Value::F32(v) if v.is_nan()));

        let back: Value = serde_json::from_str(r#"{"kind":"f32","data":2}"#).unwrap();
        assert_eq!(back, Value::F32(2.0));
        assert!(serde_json::from_str::<Value>(r#"{"kind":"f64","data":"huge"}"#).is_err());
    }

    #[test]
    fn test_kind_names_match_wire_tags() {
        for v in [Value::Isize(1), Value::Usize(1), Value::Bytes(vec![1])] {
            let json = serde_json::to_value(&v).unwrap();
            assert_eq!(json["kind"], v.kind());
        }
    }
}

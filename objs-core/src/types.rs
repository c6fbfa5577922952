/*!
Runtime type classification.

All probing of "what kind of value is this" lives here; the cloner, the
comparer and the snapshotter pattern-match on [`ValueKind`] or on the
[`Value`] variants instead of re-probing ad hoc.
*/

use crate::value::Value;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    Text,
    Date,
    Array,
    Function,
    Object,
}

impl ValueKind {
    /// Null, undefined, booleans, numbers and strings
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            ValueKind::Undefined
                | ValueKind::Null
                | ValueKind::Bool
                | ValueKind::Number
                | ValueKind::Text
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::Text => "string",
            ValueKind::Date => "date",
            ValueKind::Array => "array",
            ValueKind::Function => "function",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type checks over host values.
pub struct Types;

impl Types {
    pub fn kind_of(value: &Value) -> ValueKind {
        match value {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::Array(_) => ValueKind::Array,
            Value::Function(_) => ValueKind::Function,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Whether or not the given value is not null and not undefined
    pub fn is_defined(value: &Value) -> bool {
        !matches!(value, Value::Undefined | Value::Null)
    }

    /// Whether or not the given value is a primitive, including null and undefined.
    /// This returns false for dates and arrays.
    pub fn is_primitive(value: &Value) -> bool {
        Self::kind_of(value).is_primitive()
    }

    pub fn is_array(value: &Value) -> bool {
        matches!(value, Value::Array(_))
    }

    pub fn is_date(value: &Value) -> bool {
        matches!(value, Value::Date(_))
    }

    pub fn is_function(value: &Value) -> bool {
        matches!(value, Value::Function(_))
    }

    /// Whether or not the given value is a well-known type, i.e. not a custom object.
    /// This returns true for primitives, dates, arrays and functions.
    pub fn is_native(value: &Value) -> bool {
        Self::is_primitive(value)
            || Self::is_date(value)
            || Self::is_array(value)
            || Self::is_function(value)
    }

    /// Whether or not the given value is a property bag
    pub fn is_complex(value: &Value) -> bool {
        !Self::is_native(value)
    }

    /// Same classification, and for objects the same class name.
    pub fn are_same_types(value_a: &Value, value_b: &Value) -> bool {
        match (value_a, value_b) {
            (Value::Object(a), Value::Object(b)) => a.same_class(b),
            _ => Self::kind_of(value_a) == Self::kind_of(value_b),
        }
    }

    /// Deterministic 32-bit hash of a value.
    ///
    /// Strings are hashed directly; anything else is hashed through its
    /// canonical JSON form (see [`Value::to_json`]). `undefined` and functions
    /// have no JSON form and hash to 0.
    ///
    /// # Errors
    /// * `InvalidArgument::Circular` - If the value graph contains a cycle
    ///
    /// # Example
    /// ```rust
    /// use objs_core::{Types, Value};
    ///
    /// let a = Types::get_hash_code(&Value::object([("prop", "val")]))?;
    /// let b = Types::get_hash_code(&Value::object([("prop", "val")]))?;
    /// assert_eq!(a, b);
    /// # Ok::<(), objs_core::ObjsError>(())
    /// ```
    pub fn get_hash_code(value: &Value) -> Result<i32> {
        if let Value::Text(text) = value {
            return Ok(Self::get_string_hash_code(text));
        }
        match value.to_canonical_json()? {
            Some(json) => Ok(Self::get_string_hash_code(&serde_json::to_string(&json)?)),
            None => Ok(0),
        }
    }

    /// Rolling `hash * 31 + code unit` over UTF-16 code units, wrapping at 32 bits.
    pub fn get_string_hash_code(value: &str) -> i32 {
        value.encode_utf16().fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        })
    }
}

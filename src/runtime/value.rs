use std::fmt;
use std::sync::Arc;

use crate::rope::Rope;
use crate::runtime::object::RubyObject;

/// Shared reference to a heap object. Compared by identity.
pub type ObjectRef = Arc<RubyObject>;

/// A managed value as the bridge sees it.
///
/// Immediates (`nil`, booleans, `undef`, integers and floats) are unboxed and
/// compared by value. Everything else is an [`ObjectRef`], compared by
/// identity, which is what handle interning keys on.
///
/// Floats compare by bit pattern so that a `NaN` is equal to itself; handle
/// lookup relies on `==` being reflexive.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    True,
    False,
    /// Internal "no value" marker (`Qundef`).
    Undef,
    Integer(i64),
    Float(f64),
    Object(ObjectRef),
}

impl Value {
    pub fn from_bool(value: bool) -> Value {
        if value { Value::True } else { Value::False }
    }

    /// A new string object holding `rope`.
    pub fn string(rope: Rope) -> Value {
        Value::Object(RubyObject::new_string(rope))
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Object(RubyObject::new_array(elements))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_immediate(&self) -> bool {
        !matches!(self, Value::Object(_))
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::False)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "NilClass",
            Value::True => "TrueClass",
            Value::False => "FalseClass",
            Value::Undef => "undef",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Object(object) => object.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil)
            | (Value::True, Value::True)
            | (Value::False, Value::False)
            | (Value::Undef, Value::Undef) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::from_bool(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::True => write!(f, "true"),
            Value::False => write!(f, "false"),
            Value::Undef => write!(f, "undef"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Object(object) => write!(f, "{}", object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_compare_by_identity() {
        let a = Value::string(Rope::utf8("same"));
        let b = Value::string(Rope::utf8("same"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_nan_is_reflexive() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Integer(-3).to_string(), "-3");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::string(Rope::utf8("hi")).to_string(), "\"hi\"");
    }
}

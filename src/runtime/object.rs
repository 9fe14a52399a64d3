use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{RopeError, RopeResult};
use crate::native::NativeRope;
use crate::rope::Rope;
use crate::runtime::string::RubyString;
use crate::runtime::value::{ObjectRef, Value};

/// A heap object that can be handed to native code.
pub struct RubyObject {
    payload: ObjectPayload,
    shared: AtomicBool,
    /// Values marked on this object's behalf by its marker function, replaced
    /// after every marking run.
    marked_objects: Mutex<Vec<Value>>,
}

pub enum ObjectPayload {
    String(RubyString),
    Symbol(Rope),
    Array(RwLock<Vec<Value>>),
    /// Owner of a native struct (`RTypedData`).
    Data(DataObject),
    /// Heap box for a number too wide for an immediate handle.
    Boxed(Value),
}

/// A native struct pointer and its type name.
#[derive(Debug)]
pub struct DataObject {
    type_name: String,
    pointer: AtomicUsize,
}

impl DataObject {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn pointer(&self) -> usize {
        self.pointer.load(Ordering::Acquire)
    }

    pub fn set_pointer(&self, pointer: usize) {
        self.pointer.store(pointer, Ordering::Release);
    }
}

impl RubyObject {
    fn new(payload: ObjectPayload) -> ObjectRef {
        Arc::new(RubyObject {
            payload,
            shared: AtomicBool::new(false),
            marked_objects: Mutex::new(Vec::new()),
        })
    }

    pub fn new_string(rope: Rope) -> ObjectRef {
        Self::new(ObjectPayload::String(RubyString::new(rope)))
    }

    pub fn new_native_string(native: NativeRope) -> ObjectRef {
        Self::new(ObjectPayload::String(RubyString::from_native(native)))
    }

    pub(crate) fn new_symbol(name: Rope) -> ObjectRef {
        Self::new(ObjectPayload::Symbol(name))
    }

    pub fn new_array(elements: Vec<Value>) -> ObjectRef {
        Self::new(ObjectPayload::Array(RwLock::new(elements)))
    }

    /// Boxes a bignum or float so it can be handed out by handle and
    /// collected once no handle pins it.
    pub(crate) fn new_boxed(number: Value) -> ObjectRef {
        Self::new(ObjectPayload::Boxed(number))
    }

    pub fn new_data(type_name: impl Into<String>, pointer: usize) -> ObjectRef {
        Self::new(ObjectPayload::Data(DataObject {
            type_name: type_name.into(),
            pointer: AtomicUsize::new(pointer),
        }))
    }

    pub fn payload(&self) -> &ObjectPayload {
        &self.payload
    }

    pub fn type_name(&self) -> &'static str {
        match &self.payload {
            ObjectPayload::String(_) => "String",
            ObjectPayload::Symbol(_) => "Symbol",
            ObjectPayload::Array(_) => "Array",
            ObjectPayload::Data(_) => "Data",
            ObjectPayload::Boxed(number) => number.type_name(),
        }
    }

    pub fn as_string(&self) -> RopeResult<&RubyString> {
        match &self.payload {
            ObjectPayload::String(string) => Ok(string),
            _ => Err(RopeError::TypeMismatch {
                expected: "String",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_symbol(&self) -> Option<&Rope> {
        match &self.payload {
            ObjectPayload::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_boxed(&self) -> Option<&Value> {
        match &self.payload {
            ObjectPayload::Boxed(number) => Some(number),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataObject> {
        match &self.payload {
            ObjectPayload::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Snapshot of the elements of an array object; empty for other objects.
    pub fn array_elements(&self) -> Vec<Value> {
        match &self.payload {
            ObjectPayload::Array(elements) => elements.read().unwrap_or_else(|e| e.into_inner()).clone(),
            _ => Vec::new(),
        }
    }

    pub fn array_push(&self, value: Value) -> RopeResult<()> {
        match &self.payload {
            ObjectPayload::Array(elements) => {
                elements.write().unwrap_or_else(|e| e.into_inner()).push(value);
                Ok(())
            }
            _ => Err(RopeError::TypeMismatch {
                expected: "Array",
                actual: self.type_name(),
            }),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared.load(Ordering::Acquire)
    }

    /// Sets the shared flag, returning whether it was previously clear.
    pub(crate) fn mark_shared(&self) -> bool {
        !self.shared.swap(true, Ordering::AcqRel)
    }

    pub fn marked_objects(&self) -> Vec<Value> {
        self.marked_objects.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_marked_objects(&self, marks: Vec<Value>) {
        *self.marked_objects.lock().unwrap_or_else(|e| e.into_inner()) = marks;
    }

    /// Values directly reachable from this object.
    pub(crate) fn children(&self) -> Vec<Value> {
        let mut children = self.array_elements();
        children.extend(self.marked_objects());
        children
    }
}

impl fmt::Debug for RubyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RubyObject")
            .field("type", &self.type_name())
            .field("address", &format_args!("{:p}", self))
            .field("shared", &self.is_shared())
            .finish()
    }
}

impl fmt::Display for RubyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            ObjectPayload::String(string) => write!(f, "\"{}\"", string.get_rope()),
            ObjectPayload::Symbol(name) => write!(f, ":{}", name),
            ObjectPayload::Array(_) => write!(f, "#<Array:{}>", self.array_elements().len()),
            ObjectPayload::Data(data) => write!(f, "#<Data:{}>", data.type_name()),
            ObjectPayload::Boxed(number) => write!(f, "{}", number),
        }
    }
}

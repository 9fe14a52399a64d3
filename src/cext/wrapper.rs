use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::runtime::object::RubyObject;
use crate::runtime::value::{ObjectRef, Value};

use super::handle::Handle;

/// The bridge-side record behind one object handle.
///
/// The referent is held weakly; pinning is the job of handle blocks, the
/// marking service and extension frames. Bignums and floats are wrapped
/// through a heap box, so they die with their pins like any other object.
#[derive(Debug)]
pub struct ValueWrapper {
    handle: Handle,
    referent: Weak<RubyObject>,
    released: AtomicBool,
}

impl ValueWrapper {
    pub(crate) fn new(handle: Handle, object: &ObjectRef) -> Self {
        Self {
            handle,
            referent: Arc::downgrade(object),
            released: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The wrapped value, or `None` once it has been collected or released.
    /// A boxed number reads back as the number itself.
    pub fn referent(&self) -> Option<Value> {
        let object = self.pin()?;
        match &object {
            Value::Object(inner) => match inner.as_boxed() {
                Some(number) => Some(number.clone()),
                None => Some(object),
            },
            _ => Some(object),
        }
    }

    /// The heap object that has to stay reachable for this handle to
    /// resolve: the object itself, or the box of a number.
    pub fn pin(&self) -> Option<Value> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        self.referent.upgrade().map(Value::Object)
    }

    /// Whether this wrapper still refers to `object`.
    pub(crate) fn wraps(&self, object: &ObjectRef) -> bool {
        !self.released.load(Ordering::Acquire) && std::ptr::eq(self.referent.as_ptr(), Arc::as_ptr(object))
    }

    pub fn is_live(&self) -> bool {
        !self.released.load(Ordering::Acquire) && self.referent.strong_count() > 0
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cext::handle::ALLOCATION_BASE;

    #[test]
    fn test_boxed_number_reads_back_unboxed() {
        let boxed = RubyObject::new_boxed(Value::Float(0.25));
        let wrapper = ValueWrapper::new(Handle::from_raw(ALLOCATION_BASE), &boxed);
        assert_eq!(wrapper.referent(), Some(Value::Float(0.25)));
        assert_eq!(wrapper.pin(), Some(Value::Object(Arc::clone(&boxed))));

        drop(boxed);
        assert!(!wrapper.is_live());
        assert_eq!(wrapper.referent(), None);
    }

    #[test]
    fn test_released_wrapper_resolves_nothing() {
        let object = RubyObject::new_data("Thing", 0);
        let wrapper = ValueWrapper::new(Handle::from_raw(ALLOCATION_BASE), &object);
        assert!(wrapper.wraps(&object));
        wrapper.release();
        assert!(!wrapper.wraps(&object));
        assert_eq!(wrapper.pin(), None);
        assert!(!wrapper.is_live());
    }
}

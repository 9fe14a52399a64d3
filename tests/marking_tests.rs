use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rbrope::cext::{BridgeContext, ExtensionCallStack, Handle, MarkSession};
use rbrope::error::RopeError;
use rbrope::rope::Rope;
use rbrope::runtime::{RubyObject, Value};

/// A native struct holding a handle that only its marker knows about.
fn native_struct(context: &BridgeContext, field: Handle) -> Arc<RubyObject> {
    let owner = RubyObject::new_data("NativeStruct", field.raw() as usize);
    context.marking().add_marker(&owner, |owner, session| {
        let pointer = owner.as_data().map_or(0, |data| data.pointer());
        session.add_mark(Handle::from_raw(pointer as u64));
        Ok(())
    });
    owner
}

#[test]
fn marker_keeps_native_reference_alive() {
    let context = BridgeContext::default();
    let stack = ExtensionCallStack::new();
    let child = Value::string(Rope::utf8("held by C"));
    let handle = context.wrap(&child);
    let owner = native_struct(&context, handle);

    drop(child);
    context.wrappers().retire_current_thread();
    let summary = context.collect(&stack);
    assert_eq!(summary.markers_run, 1);
    assert_eq!(summary.handles_released, 0);
    assert!(context.unwrap(handle).is_ok());

    // once the owner goes the child follows on the next pass
    drop(owner);
    let summary = context.collect(&stack);
    assert_eq!(summary.markers_run, 0);
    assert_eq!(summary.handles_released, 1);
    assert!(context.unwrap(handle).is_err());
    assert_eq!(context.marking().marker_count(), 0);
}

#[test]
fn marker_sees_the_current_block() {
    let context = BridgeContext::default();
    let stack = ExtensionCallStack::new();
    let owner = RubyObject::new_data("Iterator", 0);
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    context.marking().add_marker(&owner, move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let block = Value::Integer(99);
    let _frame = stack.push(block.clone());
    context.marking().run_all_markers(&stack, context.wrappers());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(stack.depth(), 1);
    assert_eq!(stack.block(), block);
}

#[test]
fn failing_marker_does_not_stop_the_others() {
    let context = BridgeContext::default();
    let stack = ExtensionCallStack::new();
    let bad = RubyObject::new_data("Bad", 0);
    context
        .marking()
        .add_marker(&bad, |_, _| Err(RopeError::TypeMismatch { expected: "Data", actual: "nil" }));
    let child = Value::string(Rope::utf8("kept"));
    let good = native_struct(&context, context.wrap(&child));

    assert_eq!(context.marking().run_all_markers(&stack, context.wrappers()), 2);
    assert_eq!(good.marked_objects(), vec![child]);
    assert!(bad.marked_objects().is_empty());
}

#[test]
fn nested_session_preserves_previous_marks() {
    let context = BridgeContext::default();
    let outer = Value::string(Rope::utf8("outer"));
    let inner = Value::string(Rope::utf8("inner"));
    let outer_handle = context.wrap(&outer);
    let inner_handle = context.wrap(&inner);

    let mut first = MarkSession::start_marking(context.wrappers(), Vec::new());
    first.add_mark(outer_handle);
    let previous = first.finish_marking();

    let mut second = MarkSession::start_marking(context.wrappers(), previous.clone());
    second.add_mark(inner_handle);
    second.add_mark(inner_handle);
    assert_eq!(second.previous(), previous.as_slice());
    assert_eq!(second.finish_marking(), vec![inner]);
}

#[test]
fn keep_alive_pins_until_frame_and_marker_run() {
    let context = BridgeContext::new(rbrope::options::Options {
        marking_cache: 1,
        ..Default::default()
    });
    let stack = ExtensionCallStack::new();
    let value = Value::string(Rope::utf8("guarded"));
    let weak = Arc::downgrade(value.as_object().unwrap());
    {
        let _frame = stack.push(Value::Nil);
        context.keep_alive(&stack, value);
        assert!(context.marking().has_pending());
        assert_eq!(stack.kept_objects().len(), 1);
    }
    assert!(weak.upgrade().is_some());
    context.collect(&stack);
    assert!(weak.upgrade().is_none());
}

use crate::runtime::value::Value;

/// Marks `value` and everything reachable from it as shared between threads.
///
/// Returns how many objects were newly marked. Already shared objects are
/// not walked again, so cycles terminate.
pub fn share_value(value: &Value) -> usize {
    let mut worklist = Vec::with_capacity(8);
    worklist.push(value.clone());
    let mut newly_shared = 0;

    while let Some(item) = worklist.pop() {
        let Value::Object(object) = item else {
            continue;
        };
        if !object.mark_shared() {
            continue;
        }
        newly_shared += 1;
        worklist.extend(object.children());
    }

    if newly_shared > 0 {
        tracing::trace!(newly_shared, "shared object graph");
    }
    newly_shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rope::Rope;

    #[test]
    fn test_shares_reachable_graph_once() {
        let inner = Value::string(Rope::utf8("inner"));
        let array = Value::array(vec![inner.clone(), Value::Integer(1)]);
        // cycle through the array itself
        array.as_object().unwrap().array_push(array.clone()).unwrap();

        assert_eq!(share_value(&array), 2);
        assert!(inner.as_object().unwrap().is_shared());
        assert_eq!(share_value(&array), 0);
        assert_eq!(share_value(&Value::Nil), 0);
    }
}

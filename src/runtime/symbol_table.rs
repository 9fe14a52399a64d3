use std::collections::HashMap;
use std::sync::RwLock;

use crate::rope::Rope;
use crate::runtime::object::RubyObject;
use crate::runtime::value::ObjectRef;

/// Interns symbols by name: equal ropes give the same object.
///
/// Symbols are never collected.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: RwLock<HashMap<Rope, ObjectRef>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, name: &Rope) -> ObjectRef {
        if let Some(symbol) = self.lookup(name) {
            return symbol;
        }
        let mut symbols = self.symbols.write().unwrap_or_else(|e| e.into_inner());
        symbols
            .entry(name.clone())
            .or_insert_with(|| RubyObject::new_symbol(name.flatten()))
            .clone()
    }

    pub fn intern_str(&self, name: &str) -> ObjectRef {
        self.intern(&Rope::utf8(name))
    }

    pub fn lookup(&self, name: &Rope) -> Option<ObjectRef> {
        self.symbols
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.symbols.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_equal_names_intern_to_one_symbol() {
        let table = SymbolTable::new();
        let a = table.intern_str("foo");
        let built = Rope::utf8("f").concat(&Rope::utf8("oo")).unwrap();
        let b = table.intern(&built);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
        assert_eq!(a.as_symbol(), Some(&Rope::utf8("foo")));
        assert!(!Arc::ptr_eq(&a, &table.intern_str("bar")));
    }
}

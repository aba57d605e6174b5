//! Interned string pool shared between lowering and the emitted RAM unit.
//!
//! String constants are interned as they are translated; the table then
//! travels with the translation unit so the runtime can resolve them. The
//! store sits behind a `RefCell` so translation code can intern through a
//! shared reference.

use id_collections::id_type;
use rustc_hash::FxHashMap;
use std::cell::RefCell;

#[id_type]
pub struct SymbolId(pub usize);

#[derive(Debug, Default)]
struct Store {
    strings: Vec<String>,
    ids: FxHashMap<String, SymbolId>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    store: RefCell<Store>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, text: &str) -> SymbolId {
        let mut store = self.store.borrow_mut();
        if let Some(&id) = store.ids.get(text) {
            return id;
        }
        let id = SymbolId(store.strings.len());
        store.strings.push(text.to_owned());
        store.ids.insert(text.to_owned(), id);
        id
    }

    pub fn resolve(&self, id: SymbolId) -> String {
        self.store.borrow().strings[id.0].clone()
    }

    pub fn len(&self) -> usize {
        self.store.borrow().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let table = SymbolTable::new();
        let a = table.intern("alpha");
        let b = table.intern("beta");
        let a2 = table.intern("alpha");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(table.resolve(a), "alpha");
        assert_eq!(table.resolve(b), "beta");
        assert_eq!(table.len(), 2);
    }
}

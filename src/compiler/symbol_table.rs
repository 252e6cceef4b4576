use std::collections::HashMap;

use crate::builtins::Builtins;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SymbolScope {
    Global,
    Local,
    BuiltIn,
    Free,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One link in the chain of compile-time scopes. Resolving a name that only
/// exists in an enclosing function promotes it into this table's free list,
/// which is what the compiler later materializes as a closure capture.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    free: Vec<Symbol>,
    num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// The root table, with every builtin pre-defined at its registry index.
    pub fn new_with_builtins() -> SymbolTable {
        let mut table = SymbolTable::new();
        for (index, (name, _)) in Builtins::get().iter().enumerate() {
            table.define_builtin(index, name);
        }
        table
    }

    pub fn enclosed(outer: SymbolTable) -> SymbolTable {
        SymbolTable {
            outer: Some(Box::new(outer)),
            ..SymbolTable::new()
        }
    }

    /// Unwind one level of nesting, discarding this table.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|outer| *outer)
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };

        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::BuiltIn,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Look `name` up here, then in enclosing tables. Globals and builtins
    /// resolve unchanged at any depth; a Local or Free of an enclosing
    /// function is captured into this table's free list and a Free symbol is
    /// returned in its place. Capture is transitive across nesting levels.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let outer_symbol = self.outer.as_mut()?.resolve(name)?;
        match outer_symbol.scope {
            SymbolScope::Global | SymbolScope::BuiltIn => Some(outer_symbol),
            SymbolScope::Local | SymbolScope::Free => Some(self.define_free(outer_symbol)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free.len(),
        };
        self.free.push(original);

        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}

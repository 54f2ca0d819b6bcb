//! Compile-time resolution of names to storage slots.
//!
//! A table with no outer table is the global scope. Entering a function body
//! pushes a child table; leaving pops it. Resolution walks from the innermost
//! table outwards. Names found in an enclosing *function* table are captured
//! as free variables of the current one.

use core::fmt;
use core::mem;

use hashbrown::HashMap;

use crate::object::BUILTINS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    /// The name of the function being compiled, seen from inside its body.
    Function,
}

impl fmt::Display for SymbolScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SymbolScope::Global => "GLOBAL",
            SymbolScope::Local => "LOCAL",
            SymbolScope::Builtin => "BUILTIN",
            SymbolScope::Free => "FREE",
            SymbolScope::Function => "FUNCTION",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

impl Symbol {
    fn new(name: &str, scope: SymbolScope, index: usize) -> Self {
        Self {
            name: name.to_string(),
            scope,
            index,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    /// Symbols of enclosing scopes captured by this one, in capture order.
    /// The n-th entry is loaded as free variable n.
    free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// An empty global table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A global table with every builtin function defined.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        table
    }

    /// A child table of `outer`.
    pub fn new_enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Number of slots defined in this table. For a function body this is the
    /// number of locals, parameters included.
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    /// Bind `name` to the next free slot of this table.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.is_global() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol::new(name, scope, self.num_definitions);
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Bind a builtin. Builtins do not take a slot.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol::new(name, SymbolScope::Builtin, index);
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Bind the name of the function whose body this table belongs to.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol::new(name, SymbolScope::Function, 0);
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol::new(&original.name, SymbolScope::Free, self.free_symbols.len());
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Look `name` up here, then in the enclosing tables.
    ///
    /// Takes `&mut self` because resolving a local of an enclosing function
    /// records it as a free variable of this table.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let symbol = self.outer.as_mut()?.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            SymbolScope::Local | SymbolScope::Free | SymbolScope::Function => {
                Some(self.define_free(symbol))
            }
        }
    }

    /// Push a child table; `self` becomes the child.
    pub fn enter(&mut self) {
        let outer = mem::take(self);
        *self = SymbolTable::new_enclosed(outer);
    }

    /// Pop back to the enclosing table, returning the finished child.
    ///
    /// Calling this on a global table is a no-op that returns an empty table.
    pub fn leave(&mut self) -> SymbolTable {
        match self.outer.take() {
            Some(outer) => mem::replace(self, *outer),
            None => SymbolTable::new(),
        }
    }
}

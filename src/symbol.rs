//! Interned selectors and names
//!
//! A [`Symbol`] is compared by identity. Interning happens in the
//! [`SymbolTable`] owned by the universe, so two symbols with the same text
//! from the same universe are the same allocation.

use crate::prelude::{IndexMap, index_map_new};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug)]
struct SymbolData {
    name: Rc<str>,
    arity: usize,
}

/// Interned name; doubles as a message selector
#[derive(Clone)]
pub struct Symbol(Rc<SymbolData>);

impl Symbol {
    fn new(name: Rc<str>) -> Self {
        let arity = signature_arity(&name);
        Symbol(Rc::new(SymbolData { name, arity }))
    }

    pub fn as_str(&self) -> &str {
        &self.0.name
    }

    /// Number of arguments a send of this selector consumes, receiver included
    #[inline]
    pub fn arity(&self) -> usize {
        self.0.arity
    }

    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_binary_char(c: char) -> bool {
    matches!(
        c,
        '~' | '&' | '|' | '*' | '/' | '@' | '+' | '-' | '=' | '>' | '<' | ',' | '%' | '\\'
    )
}

/// Arity of a selector: 2 for binary operators, otherwise one more than the
/// number of keyword colons.
pub fn signature_arity(name: &str) -> usize {
    if !name.is_empty() && name.chars().all(is_binary_char) {
        return 2;
    }
    name.chars().filter(|&c| c == ':').count() + 1
}

/// Symbol interning table
#[derive(Debug)]
pub struct SymbolTable {
    symbols: IndexMap<Rc<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: index_map_new(),
        }
    }

    /// Return the symbol for `name`, creating it on first use
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.symbols.get(name) {
            return symbol.clone();
        }
        let key: Rc<str> = Rc::from(name);
        let symbol = Symbol::new(key.clone());
        self.symbols.insert(key, symbol.clone());
        symbol
    }

    /// Look up an existing symbol without creating it
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

//! Classes and method lookup
//!
//! Lookup is a pure function of (class, selector) for a fixed hierarchy:
//! consult the class's memo, scan its own method table, then recurse into
//! the superclass. Hits are memoized on every class the lookup started from.

use crate::invokable::Method;
use crate::prelude::FxHashMap;
use crate::symbol::Symbol;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub struct Class {
    name: Symbol,
    superclass: Option<Rc<Class>>,
    metaclass: RefCell<Option<Rc<Class>>>,
    /// Field names declared by this class, not including inherited ones
    instance_fields: Vec<Symbol>,
    methods: RefCell<Vec<Method>>,
    lookup_memo: RefCell<FxHashMap<Symbol, Method>>,
}

impl Class {
    pub fn new(name: Symbol, superclass: Option<Rc<Class>>, instance_fields: Vec<Symbol>) -> Self {
        Self {
            name,
            superclass,
            metaclass: RefCell::new(None),
            instance_fields,
            methods: RefCell::new(Vec::new()),
            lookup_memo: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn superclass(&self) -> Option<Rc<Class>> {
        self.superclass.clone()
    }

    pub fn metaclass(&self) -> Option<Rc<Class>> {
        self.metaclass.borrow().clone()
    }

    pub fn set_metaclass(&self, metaclass: Rc<Class>) {
        *self.metaclass.borrow_mut() = Some(metaclass);
    }

    pub fn instance_fields(&self) -> &[Symbol] {
        &self.instance_fields
    }

    /// Total number of fields of an instance, inherited ones first
    pub fn instance_field_count(&self) -> usize {
        let inherited = self
            .superclass()
            .map_or(0, |superclass| superclass.instance_field_count());
        inherited + self.instance_fields.len()
    }

    /// Index of the named field in the instance layout; innermost declaration wins
    pub fn field_index(&self, name: &Symbol) -> Option<usize> {
        let inherited = self
            .superclass()
            .map_or(0, |superclass| superclass.instance_field_count());
        if let Some(own) = self.instance_fields.iter().rposition(|field| field == name) {
            return Some(inherited + own);
        }
        self.superclass()
            .and_then(|superclass| superclass.field_index(name))
    }

    /// Install a method, replacing one with the same signature.
    ///
    /// Returns true when the signature was new to this class.
    pub fn add_method(self: &Rc<Self>, method: Method) -> bool {
        method.set_holder(self);
        let mut methods = self.methods.borrow_mut();
        let signature = method.signature().clone();
        if let Some(existing) = methods
            .iter_mut()
            .find(|existing| *existing.signature() == signature)
        {
            *existing = method;
            return false;
        }
        methods.push(method);
        true
    }

    pub fn method_count(&self) -> usize {
        self.methods.borrow().len()
    }

    /// Find the method for `selector` on this class or its ancestors
    pub fn lookup_invokable(&self, selector: &Symbol) -> Option<Method> {
        if let Some(method) = self.lookup_memo.borrow().get(selector) {
            return Some(method.clone());
        }

        let own = self
            .methods
            .borrow()
            .iter()
            .find(|method| method.signature() == selector)
            .cloned();
        let found = match own {
            Some(method) => Some(method),
            None => self
                .superclass()
                .and_then(|superclass| superclass.lookup_invokable(selector)),
        };

        if let Some(method) = &found {
            self.lookup_memo
                .borrow_mut()
                .insert(selector.clone(), method.clone());
        }
        found
    }

    pub fn flush_lookup_memo(&self) {
        self.lookup_memo.borrow_mut().clear();
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.name)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

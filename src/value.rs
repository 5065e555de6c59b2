//! Runtime values
//!
//! Immediate values (nil, booleans, numbers) are stored inline; everything
//! else is reference counted and compared by identity.

use crate::class::Class;
use crate::frame::SharedFrame;
use crate::invokable::{Invokable, Method};
use crate::symbol::Symbol;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A value of the language
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    True,
    False,
    Integer(i64),
    Double(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<Object>),
    Class(Rc<Class>),
    Block(Rc<Block>),
    Method(Method),
}

impl Value {
    pub fn boolean(value: bool) -> Self {
        if value { Value::True } else { Value::False }
    }

    pub fn string(value: impl AsRef<str>) -> Self {
        Value::String(Rc::from(value.as_ref()))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Rc<Block>> {
        match self {
            Value::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<Object>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Rc<Class>> {
        match self {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Identity comparison, the semantics of `==`
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::True, Value::True) | (Value::False, Value::False) => {
                true
            }
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Short human-readable description used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::True => "true".to_string(),
            Value::False => "false".to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Double(n) => n.to_string(),
            Value::String(s) => format!("'{}'", s),
            Value::Symbol(s) => format!("#{}", s),
            Value::Array(elements) => format!("an Array({})", elements.borrow().len()),
            Value::Object(object) => format!("a {}", object.class().name()),
            Value::Class(class) => class.name().to_string(),
            Value::Block(block) => format!("a Block{}", block.method().num_args()),
            Value::Method(method) => format!("{}", method),
        }
    }
}

impl PartialEq for Value {
    /// Numbers compare by value, strings by content, everything else by identity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => self.identical(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::True => write!(f, "True"),
            Value::False => write!(f, "False"),
            Value::Integer(n) => write!(f, "Integer({})", n),
            Value::Double(n) => write!(f, "Double({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Symbol(s) => write!(f, "Symbol({:?})", s),
            Value::Array(elements) => f.debug_list().entries(elements.borrow().iter()).finish(),
            Value::Object(object) => write!(f, "Object({})", object.class().name()),
            Value::Class(class) => write!(f, "Class({})", class.name()),
            Value::Block(block) => write!(f, "Block({})", block.method().signature()),
            Value::Method(method) => write!(f, "Method({})", method),
        }
    }
}

/// Instance of a user-defined class
pub struct Object {
    class: Rc<Class>,
    fields: RefCell<Vec<Value>>,
}

impl Object {
    /// Create an instance with every field set to nil
    pub fn new(class: Rc<Class>) -> Self {
        let count = class.instance_field_count();
        Self {
            class,
            fields: RefCell::new(vec![Value::Nil; count]),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn field(&self, index: usize) -> Option<Value> {
        self.fields.borrow().get(index).cloned()
    }

    /// Returns false when `index` is outside the instance layout
    pub fn set_field(&self, index: usize, value: Value) -> bool {
        match self.fields.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.borrow().len()
    }
}

/// A closure: block body plus the activation it was created in
pub struct Block {
    method: Rc<Invokable>,
    context: SharedFrame,
    context_level: u8,
}

impl Block {
    pub fn new(method: Rc<Invokable>, context: SharedFrame, context_level: u8) -> Self {
        Self {
            method,
            context,
            context_level,
        }
    }

    pub fn method(&self) -> &Rc<Invokable> {
        &self.method
    }

    /// The captured defining activation
    pub fn context(&self) -> &SharedFrame {
        &self.context
    }

    pub fn context_level(&self) -> u8 {
        self.context_level
    }
}

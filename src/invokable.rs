//! Compiled methods and primitives
//!
//! An [`Invokable`] is the immutable unit handed over by the compiler: the
//! bytecode, its literal table, and the frame layout needed to run it. The
//! only mutable parts are the inline-cache slots attached to its send sites
//! and the back-reference to the class holding it.

use crate::bytecode::Opcode;
use crate::class::Class;
use crate::dispatch::InlineCache;
use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::symbol::Symbol;
use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Native method body. Receives the receiver and the remaining arguments.
pub type PrimitiveFn = fn(&mut Interpreter, Value, &[Value]) -> ExecResult<Value>;

/// Everything the compiler produces for one method or block body
#[derive(Debug, Clone)]
pub struct InvokableLayout {
    pub signature: Symbol,
    pub bytecodes: Vec<u8>,
    pub literals: Vec<Value>,
    /// Argument count, receiver (or block) included
    pub num_args: usize,
    pub num_locals: usize,
    /// Total frame slots: arguments, locals and the deepest operand stack
    pub max_stack: usize,
    /// 0 for methods, N for a block nested N levels deep
    pub context_level: u8,
}

/// Compiled method or block body
pub struct Invokable {
    signature: Symbol,
    bytecodes: Box<[u8]>,
    literals: Box<[Value]>,
    num_args: usize,
    num_locals: usize,
    max_stack: usize,
    context_level: u8,
    holder: RefCell<Weak<Class>>,
    /// One cache per `SEND` site, sorted by bytecode offset
    inline_caches: Box<[(usize, InlineCache)]>,
}

impl Invokable {
    pub fn new(layout: InvokableLayout) -> Result<Self, VmError> {
        let InvokableLayout {
            signature,
            bytecodes,
            literals,
            num_args,
            num_locals,
            max_stack,
            context_level,
        } = layout;

        if num_args != signature.arity() {
            return Err(VmError::ArityMismatch {
                method: signature.to_string(),
                expected: signature.arity(),
                actual: num_args,
            });
        }
        if max_stack < num_args + num_locals {
            return Err(VmError::StackOverflow {
                method: signature.to_string(),
                index: num_args + num_locals,
                max: max_stack,
            });
        }

        let inline_caches = send_offsets(&bytecodes)
            .into_iter()
            .map(|offset| (offset, InlineCache::default()))
            .collect();
        Ok(Self {
            signature,
            bytecodes: bytecodes.into_boxed_slice(),
            literals: literals.into_boxed_slice(),
            num_args,
            num_locals,
            max_stack,
            context_level,
            holder: RefCell::new(Weak::new()),
            inline_caches,
        })
    }

    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    pub fn bytecodes(&self) -> &[u8] {
        &self.bytecodes
    }

    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    #[inline]
    pub fn num_args(&self) -> usize {
        self.num_args
    }

    #[inline]
    pub fn num_locals(&self) -> usize {
        self.num_locals
    }

    #[inline]
    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    #[inline]
    pub fn context_level(&self) -> u8 {
        self.context_level
    }

    pub fn is_block(&self) -> bool {
        self.context_level > 0
    }

    /// Literal at `index`, or a fatal error naming this method
    pub fn literal(&self, index: usize) -> Result<&Value, VmError> {
        self.literals
            .get(index)
            .ok_or_else(|| VmError::MissingLiteral {
                method: self.to_string(),
                index,
            })
    }

    /// Literal at `index` that must be a symbol (selectors, global names)
    pub fn symbol_literal(&self, index: usize) -> Result<&Symbol, VmError> {
        match self.literal(index)? {
            Value::Symbol(symbol) => Ok(symbol),
            _ => Err(VmError::LiteralType {
                method: self.to_string(),
                index,
                expected: "symbol",
            }),
        }
    }

    /// Literal at `index` that must be a nested block body
    pub fn block_literal(&self, index: usize) -> Result<&Rc<Invokable>, VmError> {
        match self.literal(index)? {
            Value::Method(Method::Compiled(invokable)) if invokable.is_block() => Ok(invokable),
            _ => Err(VmError::LiteralType {
                method: self.to_string(),
                index,
                expected: "block",
            }),
        }
    }

    /// Cache of the `SEND` at bytecode offset `index`
    pub fn inline_cache(&self, index: usize) -> Option<&InlineCache> {
        self.inline_caches
            .binary_search_by_key(&index, |(offset, _)| *offset)
            .ok()
            .and_then(|slot| self.inline_caches.get(slot))
            .map(|(_, cache)| cache)
    }

    /// Bytecode offsets of every `SEND` instruction, in order
    pub fn send_sites(&self) -> Vec<usize> {
        self.inline_caches.iter().map(|(offset, _)| *offset).collect()
    }

    /// Class this method was installed in; `None` until installed
    pub fn holder(&self) -> Option<Rc<Class>> {
        self.holder.borrow().upgrade()
    }

    /// Record the holder on this method and every nested block body
    pub fn set_holder(&self, class: &Rc<Class>) {
        *self.holder.borrow_mut() = Rc::downgrade(class);
        for literal in self.literals.iter() {
            if let Value::Method(Method::Compiled(nested)) = literal {
                nested.set_holder(class);
            }
        }
    }
}

/// Offsets of the `SEND` instructions, decoding up to the first invalid byte
fn send_offsets(bytecodes: &[u8]) -> Vec<usize> {
    let mut sites = Vec::new();
    let mut index = 0;
    while let Some(opcode) = bytecodes.get(index).and_then(|&byte| Opcode::from_byte(byte)) {
        if opcode == Opcode::Send {
            sites.push(index);
        }
        index += opcode.length();
    }
    sites
}

impl fmt::Display for Invokable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.holder() {
            Some(holder) => write!(f, "{}>>#{}", holder.name(), self.signature),
            None => write!(f, "#{}", self.signature),
        }
    }
}

impl fmt::Debug for Invokable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invokable")
            .field("signature", &self.signature)
            .field("num_args", &self.num_args)
            .field("num_locals", &self.num_locals)
            .field("max_stack", &self.max_stack)
            .field("context_level", &self.context_level)
            .field("bytecodes", &self.bytecodes.len())
            .finish()
    }
}

/// Natively implemented method
pub struct Primitive {
    signature: Symbol,
    function: PrimitiveFn,
    /// Evaluates its receiver block with the arguments as parameters. The
    /// run loop starts such sends as an ordinary activation instead of
    /// calling `function`.
    evaluates_block: bool,
    holder: RefCell<Weak<Class>>,
}

impl Primitive {
    pub fn new(signature: Symbol, function: PrimitiveFn) -> Self {
        Self {
            signature,
            function,
            evaluates_block: false,
            holder: RefCell::new(Weak::new()),
        }
    }

    /// A `value`-family primitive; `function` still serves reflective calls
    pub fn block_evaluation(signature: Symbol, function: PrimitiveFn) -> Self {
        Self {
            evaluates_block: true,
            ..Self::new(signature, function)
        }
    }

    pub fn evaluates_block(&self) -> bool {
        self.evaluates_block
    }

    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    pub fn function(&self) -> PrimitiveFn {
        self.function
    }

    pub fn holder(&self) -> Option<Rc<Class>> {
        self.holder.borrow().upgrade()
    }
}

/// A method table entry. Call sites do not distinguish the two kinds.
#[derive(Clone)]
pub enum Method {
    Compiled(Rc<Invokable>),
    Primitive(Rc<Primitive>),
}

impl Method {
    pub fn signature(&self) -> &Symbol {
        match self {
            Method::Compiled(invokable) => invokable.signature(),
            Method::Primitive(primitive) => primitive.signature(),
        }
    }

    pub fn num_args(&self) -> usize {
        match self {
            Method::Compiled(invokable) => invokable.num_args(),
            Method::Primitive(primitive) => primitive.signature().arity(),
        }
    }

    pub fn holder(&self) -> Option<Rc<Class>> {
        match self {
            Method::Compiled(invokable) => invokable.holder(),
            Method::Primitive(primitive) => primitive.holder(),
        }
    }

    pub fn set_holder(&self, class: &Rc<Class>) {
        match self {
            Method::Compiled(invokable) => invokable.set_holder(class),
            Method::Primitive(primitive) => {
                *primitive.holder.borrow_mut() = Rc::downgrade(class);
            }
        }
    }

    pub fn ptr_eq(&self, other: &Method) -> bool {
        match (self, other) {
            (Method::Compiled(a), Method::Compiled(b)) => Rc::ptr_eq(a, b),
            (Method::Primitive(a), Method::Primitive(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Compiled(invokable) => write!(f, "{}", invokable),
            Method::Primitive(primitive) => match primitive.holder() {
                Some(holder) => write!(f, "{}>>#{} (primitive)", holder.name(), primitive.signature),
                None => write!(f, "#{} (primitive)", primitive.signature),
            },
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

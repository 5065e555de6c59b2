//! MethodBuilder - helper for emitting method bytecode
//!
//! Stands in for the external compiler: it emits instructions with the
//! fixed encodings, collects literals, and computes the frame size from the
//! net stack effect of every instruction. Names are interned when the
//! method is built, so a builder can be assembled before a universe exists.
//!
//! ```
//! use talkvm::{Interpreter, MethodBuilder, Value, VmConfig};
//!
//! let mut interp = Interpreter::new(VmConfig::default()).unwrap();
//! let object = interp.universe().core().object.clone();
//!
//! // answer: x = ( ^x + 1 )
//! let mut builder = MethodBuilder::method("answer:");
//! builder.push_argument(1, 0).push_constant(Value::Integer(1)).send("+").return_local();
//! let method = builder.install(interp.universe_mut(), &object).unwrap();
//!
//! let result = interp.invoke(&method, Value::Nil, vec![Value::Integer(41)]).unwrap();
//! assert_eq!(result, Value::Integer(42));
//! ```

use crate::bytecode::Opcode;
use crate::class::Class;
use crate::error::VmError;
use crate::invokable::{Invokable, InvokableLayout, Method};
use crate::symbol::signature_arity;
use crate::universe::Universe;
use crate::value::Value;
use std::rc::Rc;

/// Largest literal table addressable by a one-byte operand
const MAX_LITERALS: usize = 256;

#[derive(Debug)]
enum Literal {
    Constant(Value),
    Symbol(String),
    Block(Box<MethodBuilder>),
}

impl Literal {
    /// Literals that may share a table slot
    fn same_as(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Symbol(a), Literal::Symbol(b)) => a == b,
            (Literal::Constant(a), Literal::Constant(b)) => {
                matches!(
                    a,
                    Value::Nil | Value::True | Value::False | Value::Integer(_)
                ) && a.identical(b)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Method,
    Block,
}

/// Builder for one method or block body
#[derive(Debug)]
pub struct MethodBuilder {
    kind: Kind,
    signature: String,
    num_locals: usize,
    context_level: Option<u8>,
    max_stack: Option<usize>,
    code: Vec<u8>,
    literals: Vec<Literal>,
    /// Operand stack depth after the last emitted instruction
    depth: usize,
    max_depth: usize,
    error: Option<VmError>,
}

impl MethodBuilder {
    fn new(kind: Kind, signature: String) -> Self {
        Self {
            kind,
            signature,
            num_locals: 0,
            context_level: None,
            max_stack: None,
            code: Vec::new(),
            literals: Vec::new(),
            depth: 0,
            max_depth: 0,
            error: None,
        }
    }

    /// Method with the given selector; argument count follows from it
    pub fn method(signature: &str) -> Self {
        Self::new(Kind::Method, signature.to_string())
    }

    /// Block body taking `params` parameters (`value`, `value:`, `value:with:`, ...)
    pub fn block(params: usize) -> Self {
        let signature = match params {
            0 => "value".to_string(),
            n => format!("value:{}", "with:".repeat(n - 1)),
        };
        Self::new(Kind::Block, signature)
    }

    pub fn locals(mut self, count: usize) -> Self {
        self.num_locals = count;
        self
    }

    /// Override the lexical level. Nested blocks otherwise get one more
    /// than their enclosing body.
    pub fn context_level(mut self, level: u8) -> Self {
        self.context_level = Some(level);
        self
    }

    /// Override the computed frame size
    pub fn max_stack(mut self, slots: usize) -> Self {
        self.max_stack = Some(slots);
        self
    }

    /// Number of arguments, receiver included
    pub fn num_args(&self) -> usize {
        signature_arity(&self.signature)
    }

    fn emit(&mut self, opcode: Opcode, operands: &[u8], pops: usize, pushes: usize) -> &mut Self {
        self.code.push(opcode.byte());
        self.code.extend_from_slice(operands);
        self.depth = self.depth.saturating_sub(pops) + pushes;
        self.max_depth = self.max_depth.max(self.depth);
        self
    }

    fn add_literal(&mut self, literal: Literal) -> u8 {
        let index = match self.literals.iter().position(|l| l.same_as(&literal)) {
            Some(index) => index,
            None => {
                self.literals.push(literal);
                self.literals.len() - 1
            }
        };
        match u8::try_from(index) {
            Ok(index) => index,
            Err(_) => {
                if self.error.is_none() {
                    self.error = Some(VmError::internal(format!(
                        "#{} needs more than {} literals",
                        self.signature, MAX_LITERALS
                    )));
                }
                0
            }
        }
    }

    pub fn halt(&mut self) -> &mut Self {
        self.emit(Opcode::Halt, &[], 0, 0)
    }

    pub fn dup(&mut self) -> &mut Self {
        self.emit(Opcode::Dup, &[], 0, 1)
    }

    pub fn pop(&mut self) -> &mut Self {
        self.emit(Opcode::Pop, &[], 1, 0)
    }

    pub fn push_local(&mut self, index: u8, level: u8) -> &mut Self {
        self.emit(Opcode::PushLocal, &[index, level], 0, 1)
    }

    pub fn push_argument(&mut self, index: u8, level: u8) -> &mut Self {
        self.emit(Opcode::PushArgument, &[index, level], 0, 1)
    }

    pub fn push_field(&mut self, index: u8) -> &mut Self {
        self.emit(Opcode::PushField, &[index], 0, 1)
    }

    pub fn push_block(&mut self, block: MethodBuilder) -> &mut Self {
        let index = self.add_literal(Literal::Block(Box::new(block)));
        self.emit(Opcode::PushBlock, &[index], 0, 1)
    }

    pub fn push_constant(&mut self, value: Value) -> &mut Self {
        let index = self.add_literal(Literal::Constant(value));
        self.emit(Opcode::PushConstant, &[index], 0, 1)
    }

    /// Push the symbol `name`
    pub fn push_symbol(&mut self, name: &str) -> &mut Self {
        let index = self.add_literal(Literal::Symbol(name.to_string()));
        self.emit(Opcode::PushConstant, &[index], 0, 1)
    }

    pub fn push_global(&mut self, name: &str) -> &mut Self {
        let index = self.add_literal(Literal::Symbol(name.to_string()));
        self.emit(Opcode::PushGlobal, &[index], 0, 1)
    }

    pub fn pop_local(&mut self, index: u8, level: u8) -> &mut Self {
        self.emit(Opcode::PopLocal, &[index, level], 1, 0)
    }

    pub fn pop_argument(&mut self, index: u8, level: u8) -> &mut Self {
        self.emit(Opcode::PopArgument, &[index, level], 1, 0)
    }

    pub fn pop_field(&mut self, index: u8) -> &mut Self {
        self.emit(Opcode::PopField, &[index], 1, 0)
    }

    /// Send `selector`; receiver and arguments must already be on the stack
    pub fn send(&mut self, selector: &str) -> &mut Self {
        let index = self.add_literal(Literal::Symbol(selector.to_string()));
        self.emit(Opcode::Send, &[index], signature_arity(selector), 1)
    }

    pub fn super_send(&mut self, selector: &str) -> &mut Self {
        let index = self.add_literal(Literal::Symbol(selector.to_string()));
        self.emit(Opcode::SuperSend, &[index], signature_arity(selector), 1)
    }

    pub fn return_local(&mut self) -> &mut Self {
        self.emit(Opcode::ReturnLocal, &[], 1, 0)
    }

    pub fn return_non_local(&mut self) -> &mut Self {
        self.emit(Opcode::ReturnNonLocal, &[], 1, 0)
    }

    /// `^self`
    pub fn return_self(&mut self) -> &mut Self {
        self.push_argument(0, 0).return_local()
    }

    /// Append bytes verbatim; no stack effect is recorded
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn build(self, universe: &mut Universe) -> Result<Rc<Invokable>, VmError> {
        let level = match self.kind {
            Kind::Method => 0,
            Kind::Block => 1,
        };
        self.build_at(universe, level)
    }

    fn build_at(self, universe: &mut Universe, default_level: u8) -> Result<Rc<Invokable>, VmError> {
        let context_level = self.context_level.unwrap_or(default_level);
        let num_args = self.num_args();
        let max_stack = self
            .max_stack
            .unwrap_or(num_args + self.num_locals + self.max_depth);
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut literals = Vec::with_capacity(self.literals.len());
        for literal in self.literals {
            let value = match literal {
                Literal::Constant(value) => value,
                Literal::Symbol(name) => Value::Symbol(universe.symbol(&name)),
                Literal::Block(block) => {
                    let nested_level = context_level.saturating_add(1);
                    Value::Method(Method::Compiled(block.build_at(universe, nested_level)?))
                }
            };
            literals.push(value);
        }

        let invokable = Invokable::new(InvokableLayout {
            signature: universe.symbol(&self.signature),
            bytecodes: self.code,
            literals,
            num_args,
            num_locals: self.num_locals,
            max_stack,
            context_level,
        })?;
        Ok(Rc::new(invokable))
    }

    /// Build and install into `class`
    pub fn install(self, universe: &mut Universe, class: &Rc<Class>) -> Result<Method, VmError> {
        let invokable = self.build(universe)?;
        Ok(universe.install_method(class, invokable))
    }
}

//! Error types for the virtual machine
//!
//! Two families live here. [`VmError`] describes VM-fatal defects: malformed
//! bytecode, stack bound violations, unresolvable bootstrap classes, and the
//! last-resort failures of the default recovery handlers. [`Unwind`] is the
//! control signal threaded through every activation; it carries either a
//! non-local return in flight or a fatal error.

use crate::frame::Marker;
use crate::value::Value;
use thiserror::Error;

/// Fatal interpreter error
///
/// Anything in here indicates a defect in the compiler, the loader, or an
/// unhandled language-level condition that reached the default handler in
/// `Object`. The embedding host decides whether to abort.
#[derive(Debug, Clone, Error)]
pub enum VmError {
    #[error("invalid opcode {opcode:#04x} at {method}@{index}")]
    InvalidOpcode {
        opcode: u8,
        method: String,
        index: usize,
    },

    #[error("bytecode of {method} ends inside the instruction at {index}")]
    BytecodeOverrun { method: String, index: usize },

    #[error("stack overflow in {method}: slot {index} exceeds declared maximum {max}")]
    StackOverflow {
        method: String,
        index: usize,
        max: usize,
    },

    #[error("stack underflow in {method}")]
    StackUnderflow { method: String },

    #[error("{method} has no literal at index {index}")]
    MissingLiteral { method: String, index: usize },

    #[error("literal {index} of {method} is not a {expected}")]
    LiteralType {
        method: String,
        index: usize,
        expected: &'static str,
    },

    #[error("{method} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("{method} addresses context level {level} beyond its captured chain")]
    MissingContext { method: String, level: u8 },

    #[error("field access {index} on {receiver} is invalid")]
    FieldAccess { receiver: String, index: usize },

    #[error("cannot resolve class: {0}")]
    UnresolvableClass(String),

    #[error("block {method} declares context level {declared} but is created at level {actual}")]
    ContextLevelMismatch {
        method: String,
        declared: u8,
        actual: u8,
    },

    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("primitives re-entered the interpreter more than {0} times")]
    ReentryDepthExceeded(usize),

    #[error("primitive {selector} failed: {message}")]
    PrimitiveFailed { selector: String, message: String },

    #[error("{receiver} does not understand #{selector}")]
    MessageNotUnderstood { receiver: String, selector: String },

    #[error("unknown global #{name} referenced from {receiver}")]
    UnknownGlobal { receiver: String, name: String },

    #[error("block escaped from its home context in {receiver}")]
    EscapedBlock { receiver: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VmError {
    pub fn primitive(selector: impl Into<String>, message: impl Into<String>) -> Self {
        VmError::PrimitiveFailed {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create an internal error for unexpected interpreter states
    pub fn internal(message: impl Into<String>) -> Self {
        VmError::Internal(message.into())
    }

    /// True for errors raised by the default language-level handlers
    /// (`doesNotUnderstand:arguments:`, `unknownGlobal:`, `escapedBlock:`).
    pub fn is_unhandled_condition(&self) -> bool {
        matches!(
            self,
            VmError::MessageNotUnderstood { .. }
                | VmError::UnknownGlobal { .. }
                | VmError::EscapedBlock { .. }
        )
    }
}

/// Abrupt completion of an activation
#[derive(Debug, Clone)]
pub enum Unwind {
    /// `^value` from inside a block, travelling to the frame owning `target`
    NonLocalReturn { value: Value, target: Marker },

    /// Fatal error, propagated to the `invoke` caller. Boxed so the signal
    /// stays small on every activation's return path.
    Error(Box<VmError>),
}

impl From<VmError> for Unwind {
    fn from(error: VmError) -> Self {
        Unwind::Error(Box::new(error))
    }
}

/// Result type used inside the interpreter
pub type ExecResult<T> = Result<T, Unwind>;

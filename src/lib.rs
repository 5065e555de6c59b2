//! Bytecode virtual machine for a small Smalltalk-family object language
//!
//! The crate executes already-compiled method bytecode: it owns the frame
//! and stack model, the fetch-decode-execute loop, inline-cached message
//! dispatch, and closures with non-local return. Methods are produced by an
//! external compiler or, for tests and bootstrap code, by [`MethodBuilder`].
//!
//! # Example
//!
//! ```
//! use talkvm::{Interpreter, MethodBuilder, Value, VmConfig};
//!
//! let mut interp = Interpreter::new(VmConfig::default()).unwrap();
//! let object = interp.universe().core().object.clone();
//!
//! // run = ( [ ^42 ] value. ^0 )
//! let mut block = MethodBuilder::block(0);
//! block.push_constant(Value::Integer(42)).return_non_local();
//! let mut run = MethodBuilder::method("run");
//! run.push_block(block)
//!     .send("value")
//!     .pop()
//!     .push_constant(Value::Integer(0))
//!     .return_local();
//! let method = run.install(interp.universe_mut(), &object).unwrap();
//!
//! let result = interp.invoke(&method, Value::Nil, Vec::new()).unwrap();
//! assert_eq!(result, Value::Integer(42));
//! ```

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::panic
    )
)]

pub mod assembler;
pub mod bytecode;
pub mod class;
pub mod config;
pub mod corelib;
pub mod disassembler;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod invokable;
pub mod prelude;
pub mod primitives;
pub mod symbol;
pub mod universe;
pub mod value;

pub use assembler::MethodBuilder;
pub use bytecode::Opcode;
pub use class::Class;
pub use config::VmConfig;
pub use disassembler::disassemble;
pub use dispatch::{CacheFill, DispatchStats, InlineCache};
pub use error::{ExecResult, Unwind, VmError};
pub use frame::{Frame, Marker};
pub use interpreter::Interpreter;
pub use invokable::{Invokable, InvokableLayout, Method, Primitive, PrimitiveFn};
pub use symbol::Symbol;
pub use universe::Universe;
pub use value::{Block, Object, Value};

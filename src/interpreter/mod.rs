//! Bytecode interpreter
//!
//! Sends that reach a compiled method or evaluate a block push a new
//! activation onto the run loop's own stack, so language-level recursion is
//! bounded by `max_call_depth` alone. The native stack only grows when a
//! primitive calls back into the interpreter through
//! [`Interpreter::execute`], which is bounded by `max_reentry_depth`.
//! Abrupt completion travels as an [`Unwind`]; a non-local return is
//! consumed by the method activation whose marker it targets.
//!
//! The three language-level failure conditions never raise VM errors
//! directly. They are sent as messages instead, so programs can handle them:
//!
//! | condition | message | sent to |
//! |---|---|---|
//! | no method for a selector | `doesNotUnderstand:arguments:` | the receiver |
//! | unbound global | `unknownGlobal:` | self |
//! | `^` from a block whose home returned | `escapedBlock:` | the home receiver |

mod run;
mod send;

use crate::config::VmConfig;
use crate::dispatch::DispatchStats;
use crate::error::{ExecResult, Unwind, VmError};
use crate::frame::SharedFrame;
use crate::invokable::{Invokable, Method};
use crate::universe::Universe;
use crate::value::{Block, Value};
use std::rc::Rc;

pub struct Interpreter {
    universe: Universe,
    config: VmConfig,
    stats: DispatchStats,
    /// Activations currently running, across all nested run loops
    depth: usize,
    /// Run loops currently nested on the native stack
    reentry: usize,
}

impl Interpreter {
    pub fn new(config: VmConfig) -> Result<Self, VmError> {
        let universe = Universe::new(&config)?;
        Ok(Self {
            universe,
            config,
            stats: DispatchStats::default(),
            depth: 0,
            reentry: 0,
        })
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn universe_mut(&mut self) -> &mut Universe {
        &mut self.universe
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DispatchStats::default();
    }

    pub fn hit_ratio(&self) -> f64 {
        self.stats.hit_ratio()
    }

    /// Number of activations currently running
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `method` on `receiver` as a new top-level activation.
    ///
    /// This is the entry point for hosts and bootstrap code. A non-local
    /// return cannot leave this call: its home is always inside.
    pub fn invoke(
        &mut self,
        method: &Method,
        receiver: Value,
        args: Vec<Value>,
    ) -> Result<Value, VmError> {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(receiver);
        all.extend(args);
        if all.len() != method.num_args() {
            return Err(VmError::ArityMismatch {
                method: method.to_string(),
                expected: method.num_args(),
                actual: all.len(),
            });
        }
        settle(self.call(method, all))
    }

    /// Send `selector` to `receiver` from the host, with full lookup and
    /// `doesNotUnderstand:arguments:` handling.
    pub fn send_message(
        &mut self,
        receiver: Value,
        selector: &str,
        args: Vec<Value>,
    ) -> Result<Value, VmError> {
        let selector = self.universe.symbol(selector);
        if args.len() + 1 != selector.arity() {
            return Err(VmError::ArityMismatch {
                method: selector.to_string(),
                expected: selector.arity(),
                actual: args.len() + 1,
            });
        }
        settle(self.dispatch(receiver, &selector, args))
    }

    /// Call a resolved method. `args[0]` is the receiver.
    pub fn call(&mut self, method: &Method, args: Vec<Value>) -> ExecResult<Value> {
        match method {
            Method::Compiled(invokable) => self.execute(invokable, args, None),
            Method::Primitive(primitive) => {
                let Some((receiver, rest)) = args.split_first() else {
                    return Err(VmError::ArityMismatch {
                        method: method.to_string(),
                        expected: method.num_args(),
                        actual: 0,
                    }
                    .into());
                };
                (primitive.function())(self, receiver.clone(), rest)
            }
        }
    }

    /// Evaluate a block with the given parameters (the block itself is
    /// prepended as argument 0).
    pub fn evaluate_block(&mut self, block: &Rc<Block>, params: &[Value]) -> ExecResult<Value> {
        let mut args = Vec::with_capacity(params.len() + 1);
        args.push(Value::Block(block.clone()));
        args.extend_from_slice(params);
        self.execute(block.method(), args, Some(block.context().clone()))
    }

    /// Run one activation of `invokable` to completion in a nested run loop.
    ///
    /// This is the only path that recurses on the native stack: the host
    /// entry points and primitives calling back into the interpreter use it.
    pub fn execute(
        &mut self,
        invokable: &Rc<Invokable>,
        args: Vec<Value>,
        outer: Option<SharedFrame>,
    ) -> ExecResult<Value> {
        if self.reentry >= self.config.max_reentry_depth {
            return Err(VmError::ReentryDepthExceeded(self.config.max_reentry_depth).into());
        }
        let entry = self.activate(invokable.clone(), args, outer)?;
        self.reentry += 1;
        let result = self.run(entry);
        self.reentry -= 1;
        result
    }
}

/// Collapse an unwind that reached the host into a plain error
fn settle(result: ExecResult<Value>) -> Result<Value, VmError> {
    match result {
        Ok(value) => Ok(value),
        Err(Unwind::Error(error)) => Err(*error),
        Err(Unwind::NonLocalReturn { .. }) => Err(VmError::internal(
            "non-local return escaped its top-level activation",
        )),
    }
}

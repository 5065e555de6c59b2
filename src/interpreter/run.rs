//! Fetch-decode-execute loop
//!
//! [`Interpreter::run`] keeps the activations it starts on its own stack.
//! A send to a compiled method or a block evaluation suspends the current
//! activation and pushes the callee; when the callee completes, its result
//! is pushed onto the caller's operand stack and the caller resumes after
//! the send. Unwinds pop activations until one consumes them or the stack
//! empties.

use super::Interpreter;
use crate::bytecode::Opcode;
use crate::error::{ExecResult, Unwind, VmError};
use crate::frame::{reclaim, Activation, Frame, Marker, SharedFrame};
use crate::invokable::Invokable;
use crate::value::{Block, Value};
use log::{debug, trace};
use std::rc::Rc;

/// Result of executing one instruction
pub(super) enum OpResult {
    Continue,
    /// Suspend the current activation until `Running` completes
    Call(Running),
    Return(Value),
}

/// An activation on the run loop's stack, with its resume point
pub(super) struct Running {
    activation: Activation,
    method: Rc<Invokable>,
    marker: Marker,
    index: usize,
}

/// A decoded instruction
#[derive(Debug, Clone, Copy)]
struct Instruction {
    opcode: Opcode,
    index: usize,
    operand: u8,
    level: u8,
}

impl Interpreter {
    /// Build a frame for `method` and count it against `max_call_depth`
    pub(super) fn activate(
        &mut self,
        method: Rc<Invokable>,
        args: Vec<Value>,
        outer: Option<SharedFrame>,
    ) -> ExecResult<Running> {
        if self.depth >= self.config.max_call_depth {
            return Err(VmError::CallDepthExceeded(self.config.max_call_depth).into());
        }
        let frame = Frame::new(method.clone(), args, outer)?;
        let marker = frame.marker().clone();
        self.stats.frames += 1;
        self.depth += 1;
        Ok(Running {
            activation: Activation::new(frame),
            method,
            marker,
            index: 0,
        })
    }

    /// Drive `entry` and everything it calls until `entry` completes
    pub(super) fn run(&mut self, entry: Running) -> ExecResult<Value> {
        let mut stack = vec![entry];
        loop {
            let step = match stack.last_mut() {
                Some(current) => self.step(current),
                None => return Err(VmError::internal("run loop lost its entry activation").into()),
            };
            let mut completion = match step {
                Ok(OpResult::Continue) => continue,
                Ok(OpResult::Call(callee)) => {
                    stack.push(callee);
                    continue;
                }
                Ok(OpResult::Return(value)) => Ok(value),
                Err(unwind) => Err(unwind),
            };

            // The top activation completed: hand the outcome to its caller,
            // popping further activations while it is an unwind
            loop {
                let Some(finished) = stack.pop() else {
                    return completion;
                };
                completion = self.finish(finished, completion);
                let Some(caller) = stack.last_mut() else {
                    return completion;
                };
                if let Ok(value) = completion {
                    match caller.activation.with(|frame| frame.push(value)) {
                        Ok(()) => break,
                        Err(error) => completion = Err(error.into()),
                    }
                }
            }
        }
    }

    /// Execute the instruction at the resume point of `current`
    fn step(&mut self, current: &mut Running) -> ExecResult<OpResult> {
        let Running {
            activation,
            method,
            index,
            ..
        } = current;
        let instruction = fetch(method, *index)?;
        if self.config.trace_execution {
            trace!(
                "{}@{}: {} {} {} sp={}",
                method,
                index,
                instruction.opcode,
                instruction.operand,
                instruction.level,
                activation.with(|frame| Ok(frame.stack_pointer()))?
            );
        }
        let outcome = self.execute_op(activation, method, instruction)?;
        if !matches!(outcome, OpResult::Return(_)) {
            *index += instruction.opcode.length();
        }
        Ok(outcome)
    }

    /// Retire a completed activation.
    ///
    /// The marker is deactivated on every route out. A method activation
    /// (context level 0) consumes a non-local return aimed at its own marker
    /// and turns it into its result; block activations only propagate.
    fn finish(&mut self, finished: Running, completion: ExecResult<Value>) -> ExecResult<Value> {
        self.depth -= 1;
        finished.marker.deactivate();
        let completion = match completion {
            Err(Unwind::NonLocalReturn { value, target })
                if !finished.method.is_block() && target.is(&finished.marker) =>
            {
                debug!("non-local return to {} completed with {}", finished.method, value.describe());
                Ok(value)
            }
            other => other,
        };
        if let Activation::Materialized(shared) = &finished.activation {
            reclaim(shared);
        }
        completion
    }

    fn execute_op(
        &mut self,
        activation: &mut Activation,
        method: &Rc<Invokable>,
        instruction: Instruction,
    ) -> ExecResult<OpResult> {
        let Instruction {
            opcode,
            index,
            operand,
            level,
        } = instruction;
        let slot = operand as usize;

        match opcode {
            Opcode::Halt => {
                let value = activation.with(|frame| frame.peek_relative(0).cloned())?;
                Ok(OpResult::Return(value))
            }
            Opcode::Dup => {
                activation.with(|frame| {
                    let value = frame.peek_relative(0)?.clone();
                    frame.push(value)
                })?;
                Ok(OpResult::Continue)
            }
            Opcode::PushLocal => {
                activation.with(|frame| {
                    let value = frame.get_local(slot, level)?;
                    frame.push(value)
                })?;
                Ok(OpResult::Continue)
            }
            Opcode::PushArgument => {
                activation.with(|frame| {
                    let value = frame.get_argument(slot, level)?;
                    frame.push(value)
                })?;
                Ok(OpResult::Continue)
            }
            Opcode::PushField => {
                activation.with(|frame| {
                    let receiver = frame.receiver()?;
                    let value = read_field(&receiver, slot)?;
                    frame.push(value)
                })?;
                Ok(OpResult::Continue)
            }
            Opcode::PushBlock => {
                self.push_block(activation, method, slot)?;
                Ok(OpResult::Continue)
            }
            Opcode::PushConstant => {
                let value = method.literal(slot)?.clone();
                activation.with(|frame| frame.push(value))?;
                Ok(OpResult::Continue)
            }
            Opcode::PushGlobal => {
                let name = method.symbol_literal(slot)?;
                let value = match self.universe.global(name) {
                    Some(value) => value,
                    None => {
                        let receiver = activation.with(|frame| frame.receiver())?;
                        self.unknown_global(receiver, name.clone())?
                    }
                };
                activation.with(|frame| frame.push(value))?;
                Ok(OpResult::Continue)
            }
            Opcode::Pop => {
                activation.with(|frame| frame.pop())?;
                Ok(OpResult::Continue)
            }
            Opcode::PopLocal => {
                activation.with(|frame| {
                    let value = frame.pop()?;
                    frame.put_local(slot, level, value)
                })?;
                Ok(OpResult::Continue)
            }
            Opcode::PopArgument => {
                activation.with(|frame| {
                    let value = frame.pop()?;
                    frame.put_argument(slot, level, value)
                })?;
                Ok(OpResult::Continue)
            }
            Opcode::PopField => {
                activation.with(|frame| {
                    let value = frame.pop()?;
                    let receiver = frame.receiver()?;
                    write_field(&receiver, slot, value)
                })?;
                Ok(OpResult::Continue)
            }
            Opcode::Send => {
                let selector = method.symbol_literal(slot)?.clone();
                self.send(activation, method, index, &selector)
            }
            Opcode::SuperSend => {
                let selector = method.symbol_literal(slot)?.clone();
                self.super_send(activation, method, &selector)
            }
            Opcode::ReturnLocal => {
                let value = activation.with(|frame| frame.pop())?;
                Ok(OpResult::Return(value))
            }
            Opcode::ReturnNonLocal => self.return_non_local(activation, method),
        }
    }

    /// `PUSH_BLOCK`: capture the running frame in a new block
    fn push_block(
        &mut self,
        activation: &mut Activation,
        method: &Rc<Invokable>,
        literal: usize,
    ) -> ExecResult<()> {
        let body = method.block_literal(literal)?.clone();
        let level = method.context_level() + 1;
        if body.context_level() != level {
            return Err(VmError::ContextLevelMismatch {
                method: body.to_string(),
                declared: body.context_level(),
                actual: level,
            }
            .into());
        }
        if self.universe.block_class(body.num_args()).is_none() {
            return Err(VmError::UnresolvableClass(format!("Block{}", body.num_args())).into());
        }

        let context = activation.materialize();
        let block = Value::Block(Rc::new(Block::new(body, context, level)));
        activation.with(|frame| frame.push(block))?;
        Ok(())
    }

    /// `RETURN_NON_LOCAL`: finish the home method of this block
    fn return_non_local(
        &mut self,
        activation: &mut Activation,
        method: &Rc<Invokable>,
    ) -> ExecResult<OpResult> {
        let value = activation.with(|frame| frame.pop())?;
        if !method.is_block() {
            return Ok(OpResult::Return(value));
        }

        // Argument 0 of a block activation is the block being evaluated
        let block = activation.with(|frame| frame.argument(0))?;
        let level = block
            .as_block()
            .map(|block| block.context_level())
            .ok_or_else(|| VmError::internal(format!("{} is running without its block", method)))?;
        let home = activation.with(|frame| frame.outer_context(level))?;
        let target = home.borrow().marker().clone();
        if target.is_live() {
            self.stats.non_local_returns += 1;
            debug!("non-local return from {} unwinding to {}", method, home.borrow().method());
            return Err(Unwind::NonLocalReturn { value, target });
        }

        // The home method already returned: let its receiver decide
        self.stats.escaped_blocks += 1;
        let receiver = home.borrow().argument(0)?;
        debug!("escaped block {} in {}", method, receiver.describe());
        let selector = self.universe.symbol("escapedBlock:");
        let result = self.dispatch(receiver, &selector, vec![block])?;
        Ok(OpResult::Return(result))
    }
}

/// Decode the instruction at `index`
fn fetch(method: &Invokable, index: usize) -> Result<Instruction, VmError> {
    let bytecodes = method.bytecodes();
    let overrun = || VmError::BytecodeOverrun {
        method: method.to_string(),
        index,
    };
    let byte = *bytecodes.get(index).ok_or_else(overrun)?;
    let opcode = Opcode::from_byte(byte).ok_or_else(|| VmError::InvalidOpcode {
        opcode: byte,
        method: method.to_string(),
        index,
    })?;
    let length = opcode.length();
    if index + length > bytecodes.len() {
        return Err(overrun());
    }
    let operand = if length > 1 {
        bytecodes.get(index + 1).copied().ok_or_else(overrun)?
    } else {
        0
    };
    let level = if length > 2 {
        bytecodes.get(index + 2).copied().ok_or_else(overrun)?
    } else {
        0
    };
    Ok(Instruction {
        opcode,
        index,
        operand,
        level,
    })
}

fn read_field(receiver: &Value, index: usize) -> Result<Value, VmError> {
    receiver
        .as_object()
        .and_then(|object| object.field(index))
        .ok_or_else(|| VmError::FieldAccess {
            receiver: receiver.describe(),
            index,
        })
}

fn write_field(receiver: &Value, index: usize, value: Value) -> Result<(), VmError> {
    match receiver.as_object() {
        Some(object) if object.set_field(index, value) => Ok(()),
        _ => Err(VmError::FieldAccess {
            receiver: receiver.describe(),
            index,
        }),
    }
}

//! Block evaluation and looping primitives

use super::arg;
use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::universe::Universe;
use crate::value::{Block, Value};
use std::rc::Rc;

pub fn install(universe: &mut Universe) {
    let core = universe.core().clone();
    universe.install_block_evaluation(&core.block1, "value", block_value);
    universe.install_block_evaluation(&core.block2, "value:", block_value);
    universe.install_block_evaluation(&core.block3, "value:with:", block_value);
    universe.install_primitive(&core.block, "whileTrue:", block_while_true);
    universe.install_primitive(&core.block, "whileFalse:", block_while_false);
}

fn block(selector: &str, value: &Value) -> Result<Rc<Block>, VmError> {
    value
        .as_block()
        .cloned()
        .ok_or_else(|| VmError::primitive(selector, format!("{} is not a block", value.describe())))
}

/// `value`, `value:` and `value:with:`; the arguments become the block's
/// parameters. Sends from bytecode start the block in the run loop instead,
/// so this body serves host sends and `perform:`.
pub fn block_value(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let block = block("value", &receiver)?;
    interp.evaluate_block(&block, args)
}

fn while_loop(
    interp: &mut Interpreter,
    selector: &str,
    receiver: Value,
    args: &[Value],
    continue_while: bool,
) -> ExecResult<Value> {
    let condition = block(selector, &receiver)?;
    let body = block(selector, arg(selector, args, 0)?)?;
    loop {
        match interp.evaluate_block(&condition, &[])? {
            Value::True if continue_while => {}
            Value::False if !continue_while => {}
            Value::True | Value::False => return Ok(Value::Nil),
            other => {
                return Err(VmError::primitive(
                    selector,
                    format!("condition answered {}, not a Boolean", other.describe()),
                )
                .into());
            }
        }
        interp.evaluate_block(&body, &[])?;
    }
}

pub fn block_while_true(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    while_loop(interp, "whileTrue:", receiver, args, true)
}

pub fn block_while_false(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    while_loop(interp, "whileFalse:", receiver, args, false)
}

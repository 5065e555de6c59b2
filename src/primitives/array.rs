//! Array primitives; indices are 1-based

use super::{arg, integer_arg, one_based};
use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::universe::Universe;
use crate::value::Value;

pub fn install(universe: &mut Universe) -> Result<(), VmError> {
    let array = universe.core().array.clone();
    universe.install_class_primitive(&array, "new:", array_new)?;
    universe.install_primitive(&array, "at:", array_at);
    universe.install_primitive(&array, "at:put:", array_at_put);
    universe.install_primitive(&array, "length", array_length);
    Ok(())
}

/// `Array new: n`, filled with nil
pub fn array_new(_interp: &mut Interpreter, _receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let length = integer_arg("new:", args, 0)?;
    let length = usize::try_from(length)
        .map_err(|_| VmError::primitive("new:", format!("negative length {}", length)))?;
    Ok(Value::array(vec![Value::Nil; length]))
}

pub fn array_at(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let Value::Array(elements) = &receiver else {
        return Err(VmError::primitive("at:", "receiver is not an Array").into());
    };
    let index = integer_arg("at:", args, 0)?;
    let elements = elements.borrow();
    let slot = one_based("at:", index, elements.len())?;
    Ok(elements.get(slot).cloned().unwrap_or_default())
}

pub fn array_at_put(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let Value::Array(elements) = &receiver else {
        return Err(VmError::primitive("at:put:", "receiver is not an Array").into());
    };
    let index = integer_arg("at:put:", args, 0)?;
    let value = arg("at:put:", args, 1)?.clone();
    let mut elements = elements.borrow_mut();
    let slot = one_based("at:put:", index, elements.len())?;
    if let Some(element) = elements.get_mut(slot) {
        *element = value.clone();
    }
    Ok(value)
}

pub fn array_length(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    match &receiver {
        Value::Array(elements) => Ok(Value::Integer(elements.borrow().len() as i64)),
        _ => Err(VmError::primitive("length", "receiver is not an Array").into()),
    }
}

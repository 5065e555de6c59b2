//! Class-side reflection primitives

use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::universe::Universe;
use crate::value::Value;

pub fn install(universe: &mut Universe) {
    let class = universe.core().class.clone();
    universe.install_primitive(&class, "new", class_new);
    universe.install_primitive(&class, "name", class_name);
    universe.install_primitive(&class, "superclass", class_superclass);
}

pub fn class_new(interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    let class = receiver
        .as_class()
        .ok_or_else(|| VmError::primitive("new", "receiver is not a class"))?;
    Ok(interp.universe().new_instance(class))
}

pub fn class_name(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    let class = receiver
        .as_class()
        .ok_or_else(|| VmError::primitive("name", "receiver is not a class"))?;
    Ok(Value::Symbol(class.name().clone()))
}

pub fn class_superclass(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    let class = receiver
        .as_class()
        .ok_or_else(|| VmError::primitive("superclass", "receiver is not a class"))?;
    Ok(class.superclass().map_or(Value::Nil, Value::Class))
}

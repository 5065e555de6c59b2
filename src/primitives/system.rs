//! System primitives: globals and the transcript

use super::arg;
use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::universe::Universe;
use crate::value::Value;

pub fn install(universe: &mut Universe) {
    let system = universe.core().system.clone();
    universe.install_primitive(&system, "global:", system_global);
    universe.install_primitive(&system, "global:put:", system_global_put);
    universe.install_primitive(&system, "printString:", system_print_string);
    universe.install_primitive(&system, "printNewline", system_print_newline);
}

/// Value of the named global, or nil
pub fn system_global(interp: &mut Interpreter, _receiver: Value, args: &[Value]) -> ExecResult<Value> {
    match arg("global:", args, 0)? {
        Value::Symbol(name) => Ok(interp.universe().global(name).unwrap_or_default()),
        other => Err(VmError::primitive("global:", format!("{} is not a Symbol", other.describe())).into()),
    }
}

pub fn system_global_put(interp: &mut Interpreter, _receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let value = arg("global:put:", args, 1)?.clone();
    match arg("global:put:", args, 0)? {
        Value::Symbol(name) => {
            interp.universe_mut().set_global(name.clone(), value.clone());
            Ok(value)
        }
        other => Err(VmError::primitive("global:put:", format!("{} is not a Symbol", other.describe())).into()),
    }
}

pub fn system_print_string(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let text = match arg("printString:", args, 0)? {
        Value::String(s) => s.to_string(),
        Value::Symbol(s) => s.as_str().to_string(),
        other => other.describe(),
    };
    interp.universe_mut().print(&text);
    Ok(receiver)
}

pub fn system_print_newline(interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    interp.universe_mut().print("\n");
    Ok(receiver)
}

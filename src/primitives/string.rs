//! String and Symbol primitives

use super::arg;
use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::universe::Universe;
use crate::value::Value;

pub fn install(universe: &mut Universe) {
    let string = universe.core().string.clone();
    universe.install_primitive(&string, "length", string_length);
    universe.install_primitive(&string, "=", string_equal);
    universe.install_primitive(&string, ",", string_concatenate);
    universe.install_primitive(&string, "asSymbol", string_as_symbol);
    universe.install_primitive(&string, "asString", string_as_string);

    let symbol = universe.core().symbol.clone();
    universe.install_primitive(&symbol, "asString", string_as_string);
}

fn text(selector: &str, value: &Value) -> Result<String, VmError> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        Value::Symbol(s) => Ok(s.as_str().to_string()),
        other => Err(VmError::primitive(
            selector,
            format!("expected a String, got {}", other.describe()),
        )),
    }
}

pub fn string_length(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    let s = text("length", &receiver)?;
    Ok(Value::Integer(s.chars().count() as i64))
}

/// Content equality; a Symbol never equals a String
pub fn string_equal(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let other = arg("=", args, 0)?;
    let equal = match (&receiver, other) {
        (Value::String(a), Value::String(b)) => a == b,
        _ => receiver.identical(other),
    };
    Ok(Value::boolean(equal))
}

pub fn string_concatenate(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let mut s = text(",", &receiver)?;
    s.push_str(&text(",", arg(",", args, 0)?)?);
    Ok(Value::string(s))
}

pub fn string_as_symbol(interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    let s = text("asSymbol", &receiver)?;
    Ok(Value::Symbol(interp.universe_mut().symbol(&s)))
}

pub fn string_as_string(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    Ok(Value::string(text("asString", &receiver)?))
}

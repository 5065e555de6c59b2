//! Object primitives, including the default recovery handlers

use super::{arg, integer_arg, one_based};
use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::universe::Universe;
use crate::value::Value;

pub fn install(universe: &mut Universe) {
    let object = universe.core().object.clone();
    universe.install_primitive(&object, "==", object_identical);
    universe.install_primitive(&object, "=", object_identical);
    universe.install_primitive(&object, "class", object_class);
    universe.install_primitive(&object, "printString", object_print_string);
    universe.install_primitive(&object, "instVarAt:", object_inst_var_at);
    universe.install_primitive(&object, "instVarAt:put:", object_inst_var_at_put);
    universe.install_primitive(&object, "perform:", object_perform);
    universe.install_primitive(&object, "perform:with:", object_perform_with);
    universe.install_primitive(&object, "perform:withArguments:", object_perform_with_arguments);
    universe.install_primitive(&object, "doesNotUnderstand:arguments:", object_does_not_understand);
    universe.install_primitive(&object, "unknownGlobal:", object_unknown_global);
    universe.install_primitive(&object, "escapedBlock:", object_escaped_block);
}

pub fn object_identical(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let other = arg("==", args, 0)?;
    Ok(Value::boolean(receiver.identical(other)))
}

pub fn object_class(interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    Ok(Value::Class(interp.universe().class_of(&receiver)))
}

pub fn object_print_string(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    Ok(Value::string(receiver.describe()))
}

pub fn object_inst_var_at(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let selector = "instVarAt:";
    let index = integer_arg(selector, args, 0)?;
    let object = receiver
        .as_object()
        .ok_or_else(|| VmError::primitive(selector, "receiver has no fields"))?;
    let slot = one_based(selector, index, object.field_count())?;
    Ok(object.field(slot).unwrap_or_default())
}

pub fn object_inst_var_at_put(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let selector = "instVarAt:put:";
    let index = integer_arg(selector, args, 0)?;
    let value = arg(selector, args, 1)?.clone();
    let object = receiver
        .as_object()
        .ok_or_else(|| VmError::primitive(selector, "receiver has no fields"))?;
    let slot = one_based(selector, index, object.field_count())?;
    object.set_field(slot, value.clone());
    Ok(value)
}

/// Shared body of the `perform:` family
fn perform(interp: &mut Interpreter, caller: &str, receiver: Value, selector: &Value, args: Vec<Value>) -> ExecResult<Value> {
    let Value::Symbol(selector) = selector else {
        return Err(VmError::primitive(caller, format!("{} is not a selector", selector.describe())).into());
    };
    if selector.arity() != args.len() + 1 {
        return Err(VmError::primitive(
            caller,
            format!("#{} takes {} arguments, got {}", selector, selector.arity() - 1, args.len()),
        )
        .into());
    }
    interp.dispatch(receiver, selector, args)
}

pub fn object_perform(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let selector = arg("perform:", args, 0)?;
    perform(interp, "perform:", receiver, selector, Vec::new())
}

pub fn object_perform_with(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let selector = arg("perform:with:", args, 0)?;
    let argument = arg("perform:with:", args, 1)?.clone();
    perform(interp, "perform:with:", receiver, selector, vec![argument])
}

pub fn object_perform_with_arguments(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let caller = "perform:withArguments:";
    let selector = arg(caller, args, 0)?;
    let arguments = match arg(caller, args, 1)? {
        Value::Array(elements) => elements.borrow().clone(),
        other => {
            return Err(VmError::primitive(caller, format!("expected an Array, got {}", other.describe())).into());
        }
    };
    perform(interp, caller, receiver, selector, arguments)
}

/// Default handler: a send nobody understood is fatal
pub fn object_does_not_understand(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let selector = arg("doesNotUnderstand:arguments:", args, 0)?;
    let selector = match selector {
        Value::Symbol(symbol) => symbol.to_string(),
        other => other.describe(),
    };
    Err(VmError::MessageNotUnderstood {
        receiver: receiver.describe(),
        selector,
    }
    .into())
}

pub fn object_unknown_global(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let name = match arg("unknownGlobal:", args, 0)? {
        Value::Symbol(symbol) => symbol.to_string(),
        other => other.describe(),
    };
    Err(VmError::UnknownGlobal {
        receiver: receiver.describe(),
        name,
    }
    .into())
}

pub fn object_escaped_block(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    Err(VmError::EscapedBlock {
        receiver: receiver.describe(),
    }
    .into())
}

//! Integer and Double primitives
//!
//! Arithmetic between an Integer and a Double is carried out in Double.
//! Integer arithmetic is checked; overflow fails the primitive.

use super::{arg, integer_arg};
use crate::error::{ExecResult, VmError};
use crate::interpreter::Interpreter;
use crate::universe::Universe;
use crate::value::Value;

pub fn install(universe: &mut Universe) {
    let integer = universe.core().integer.clone();
    universe.install_primitive(&integer, "+", number_add);
    universe.install_primitive(&integer, "-", number_subtract);
    universe.install_primitive(&integer, "*", number_multiply);
    universe.install_primitive(&integer, "/", integer_divide);
    universe.install_primitive(&integer, "//", number_double_divide);
    universe.install_primitive(&integer, "\\\\", integer_modulo);
    universe.install_primitive(&integer, "<", number_less);
    universe.install_primitive(&integer, ">", number_greater);
    universe.install_primitive(&integer, "<=", number_less_equal);
    universe.install_primitive(&integer, ">=", number_greater_equal);
    universe.install_primitive(&integer, "=", number_equal);
    universe.install_primitive(&integer, "~=", number_not_equal);
    universe.install_primitive(&integer, "asDouble", integer_as_double);
    universe.install_primitive(&integer, "asString", number_as_string);
    universe.install_primitive(&integer, "to:do:", integer_to_do);

    let double = universe.core().double.clone();
    universe.install_primitive(&double, "+", number_add);
    universe.install_primitive(&double, "-", number_subtract);
    universe.install_primitive(&double, "*", number_multiply);
    universe.install_primitive(&double, "/", number_double_divide);
    universe.install_primitive(&double, "<", number_less);
    universe.install_primitive(&double, ">", number_greater);
    universe.install_primitive(&double, "=", number_equal);
    universe.install_primitive(&double, "asInteger", double_as_integer);
    universe.install_primitive(&double, "asString", number_as_string);
}

#[derive(Debug, Clone, Copy)]
enum Operands {
    Integers(i64, i64),
    Doubles(f64, f64),
}

fn operands(selector: &str, receiver: &Value, args: &[Value]) -> Result<Operands, VmError> {
    let other = arg(selector, args, 0)?;
    match (receiver, other) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Operands::Integers(*a, *b)),
        (Value::Integer(a), Value::Double(b)) => Ok(Operands::Doubles(*a as f64, *b)),
        (Value::Double(a), Value::Integer(b)) => Ok(Operands::Doubles(*a, *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Operands::Doubles(*a, *b)),
        _ => Err(VmError::primitive(
            selector,
            format!("cannot combine {} with {}", receiver.describe(), other.describe()),
        )),
    }
}

fn checked(selector: &str, result: Option<i64>) -> ExecResult<Value> {
    result
        .map(Value::Integer)
        .ok_or_else(|| VmError::primitive(selector, "integer overflow").into())
}

pub fn number_add(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    match operands("+", &receiver, args)? {
        Operands::Integers(a, b) => checked("+", a.checked_add(b)),
        Operands::Doubles(a, b) => Ok(Value::Double(a + b)),
    }
}

pub fn number_subtract(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    match operands("-", &receiver, args)? {
        Operands::Integers(a, b) => checked("-", a.checked_sub(b)),
        Operands::Doubles(a, b) => Ok(Value::Double(a - b)),
    }
}

pub fn number_multiply(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    match operands("*", &receiver, args)? {
        Operands::Integers(a, b) => checked("*", a.checked_mul(b)),
        Operands::Doubles(a, b) => Ok(Value::Double(a * b)),
    }
}

/// Floored integer division
pub fn integer_divide(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    match operands("/", &receiver, args)? {
        Operands::Integers(_, 0) => Err(VmError::primitive("/", "division by zero").into()),
        Operands::Integers(a, b) => {
            let quotient = a.checked_div(b);
            let floored = quotient.map(|q| if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q });
            checked("/", floored)
        }
        Operands::Doubles(a, b) => Ok(Value::Double((a / b).floor())),
    }
}

pub fn number_double_divide(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let selector = if receiver.as_double().is_some() { "/" } else { "//" };
    let (a, b) = match operands(selector, &receiver, args)? {
        Operands::Integers(a, b) => (a as f64, b as f64),
        Operands::Doubles(a, b) => (a, b),
    };
    Ok(Value::Double(a / b))
}

/// Modulo with the sign of the divisor
pub fn integer_modulo(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let a = receiver
        .as_integer()
        .ok_or_else(|| VmError::primitive("\\\\", "receiver is not an Integer"))?;
    let b = integer_arg("\\\\", args, 0)?;
    if b == 0 {
        return Err(VmError::primitive("\\\\", "division by zero").into());
    }
    let remainder = a.checked_rem(b);
    checked(
        "\\\\",
        remainder.map(|r| if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }),
    )
}

fn compare(
    selector: &str,
    receiver: &Value,
    args: &[Value],
    integers: fn(&i64, &i64) -> bool,
    doubles: fn(&f64, &f64) -> bool,
) -> ExecResult<Value> {
    let result = match operands(selector, receiver, args)? {
        Operands::Integers(a, b) => integers(&a, &b),
        Operands::Doubles(a, b) => doubles(&a, &b),
    };
    Ok(Value::boolean(result))
}

pub fn number_less(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    compare("<", &receiver, args, i64::lt, f64::lt)
}

pub fn number_greater(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    compare(">", &receiver, args, i64::gt, f64::gt)
}

pub fn number_less_equal(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    compare("<=", &receiver, args, i64::le, f64::le)
}

pub fn number_greater_equal(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    compare(">=", &receiver, args, i64::ge, f64::ge)
}

/// Numeric equality; comparing with a non-number answers false
pub fn number_equal(_interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let other = arg("=", args, 0)?;
    if !matches!(other, Value::Integer(_) | Value::Double(_)) {
        return Ok(Value::False);
    }
    compare("=", &receiver, args, i64::eq, f64::eq)
}

pub fn number_not_equal(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let equal = number_equal(interp, receiver, args)?;
    Ok(Value::boolean(matches!(equal, Value::False)))
}

pub fn integer_as_double(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    let n = receiver
        .as_integer()
        .ok_or_else(|| VmError::primitive("asDouble", "receiver is not an Integer"))?;
    Ok(Value::Double(n as f64))
}

/// Truncates toward zero; fails for NaN, infinities and values outside the
/// Integer range
pub fn double_as_integer(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    let n = receiver
        .as_double()
        .ok_or_else(|| VmError::primitive("asInteger", "receiver is not a Double"))?;
    let truncated = n.trunc();
    // i64::MIN is exactly -2^63; i64::MAX rounds up to 2^63 as a double
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(VmError::primitive("asInteger", format!("{} has no Integer value", n)).into());
    }
    Ok(Value::Integer(truncated as i64))
}

pub fn number_as_string(_interp: &mut Interpreter, receiver: Value, _args: &[Value]) -> ExecResult<Value> {
    Ok(Value::string(receiver.describe()))
}

/// Evaluate the block argument for every integer from the receiver up to
/// the limit, inclusive. Answers the receiver.
pub fn integer_to_do(interp: &mut Interpreter, receiver: Value, args: &[Value]) -> ExecResult<Value> {
    let selector = "to:do:";
    let start = receiver
        .as_integer()
        .ok_or_else(|| VmError::primitive(selector, "receiver is not an Integer"))?;
    let limit = integer_arg(selector, args, 0)?;
    let block = arg(selector, args, 1)?
        .as_block()
        .cloned()
        .ok_or_else(|| VmError::primitive(selector, "expected a block"))?;
    for i in start..=limit {
        interp.evaluate_block(&block, &[Value::Integer(i)])?;
    }
    Ok(receiver)
}

//! Core library methods written in bytecode
//!
//! Conditionals are ordinary sends to `true` and `false`; there are no jump
//! instructions. `True>>ifTrue:` evaluates its argument, `False>>ifTrue:`
//! ignores it.

use crate::assembler::MethodBuilder;
use crate::error::VmError;
use crate::universe::Universe;
use crate::value::Value;

pub fn install(universe: &mut Universe) -> Result<(), VmError> {
    install_boolean(universe, true)?;
    install_boolean(universe, false)?;
    install_nil_tests(universe)?;

    let object = universe.core().object.clone();
    // ~= other  ^(self = other) not
    let mut not_equal = MethodBuilder::method("~=");
    not_equal
        .push_argument(0, 0)
        .push_argument(1, 0)
        .send("=")
        .send("not")
        .return_local();
    not_equal.install(universe, &object)?;

    let mut value = MethodBuilder::method("value");
    value.return_self();
    value.install(universe, &object)?;
    Ok(())
}

/// `^arg value`
fn evaluate_argument(selector: &str, index: u8) -> MethodBuilder {
    let mut builder = MethodBuilder::method(selector);
    builder.push_argument(index, 0).send("value").return_local();
    builder
}

/// `^constant`
fn answer(selector: &str, constant: Value) -> MethodBuilder {
    let mut builder = MethodBuilder::method(selector);
    builder.push_constant(constant).return_local();
    builder
}

fn install_boolean(universe: &mut Universe, truth: bool) -> Result<(), VmError> {
    let class = if truth {
        universe.core().true_class.clone()
    } else {
        universe.core().false_class.clone()
    };

    let methods = if truth {
        [
            evaluate_argument("ifTrue:", 1),
            answer("ifFalse:", Value::Nil),
            evaluate_argument("ifTrue:ifFalse:", 1),
            evaluate_argument("ifFalse:ifTrue:", 2),
            answer("not", Value::False),
            evaluate_argument("and:", 1),
            answer("or:", Value::True),
        ]
    } else {
        [
            answer("ifTrue:", Value::Nil),
            evaluate_argument("ifFalse:", 1),
            evaluate_argument("ifTrue:ifFalse:", 2),
            evaluate_argument("ifFalse:ifTrue:", 1),
            answer("not", Value::True),
            answer("and:", Value::False),
            evaluate_argument("or:", 1),
        ]
    };
    for method in methods {
        method.install(universe, &class)?;
    }
    Ok(())
}

fn install_nil_tests(universe: &mut Universe) -> Result<(), VmError> {
    let nil = universe.core().nil.clone();
    answer("isNil", Value::True).install(universe, &nil)?;
    answer("notNil", Value::False).install(universe, &nil)?;

    let object = universe.core().object.clone();
    answer("isNil", Value::False).install(universe, &object)?;
    answer("notNil", Value::True).install(universe, &object)?;
    Ok(())
}

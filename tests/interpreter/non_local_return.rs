//! Non-local return tests
//!
//! `^` inside a block finishes the block's home method, however many
//! activations lie in between.

use super::{create_test_interpreter, define_class, install, int, run};
use std::rc::Rc;
use talkvm::{Class, Interpreter, MethodBuilder, Value};

/// `deliver: b depth: n`
///
/// ```text
/// ^n = 0
///     ifTrue: [ b value ]
///     ifFalse: [ self deliver: b depth: n - 1 ]
/// ```
fn install_deliver(interp: &mut Interpreter, class: &Rc<Class>) {
    let mut evaluate = MethodBuilder::block(0);
    evaluate.push_argument(1, 1).send("value").return_local();

    let mut recurse = MethodBuilder::block(0);
    recurse
        .push_argument(0, 1)
        .push_argument(1, 1)
        .push_argument(2, 1)
        .push_constant(int(1))
        .send("-")
        .send("deliver:depth:")
        .return_local();

    let mut m = MethodBuilder::method("deliver:depth:");
    m.push_argument(2, 0)
        .push_constant(int(0))
        .send("=")
        .push_block(evaluate)
        .push_block(recurse)
        .send("ifTrue:ifFalse:")
        .return_local();
    install(interp, class, m);
}

/// `runAt: n  self deliver: [ ^42 ] depth: n. ^0`
fn install_run_at(interp: &mut Interpreter, class: &Rc<Class>) {
    let mut escape = MethodBuilder::block(0);
    escape.push_constant(int(42)).return_non_local();

    let mut m = MethodBuilder::method("runAt:");
    m.push_argument(0, 0)
        .push_block(escape)
        .push_argument(1, 0)
        .send("deliver:depth:")
        .pop()
        .push_constant(int(0))
        .return_local();
    install(interp, class, m);
}

fn relay_fixture() -> (Interpreter, Value) {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Relay", &["touched"]);
    install_deliver(&mut interp, &class);
    install_run_at(&mut interp, &class);
    let relay = interp.universe().new_instance(&class);
    (interp, relay)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Unwinding
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_non_local_return_from_direct_block() {
    // [ ^42 ] value. ^0
    let mut block = MethodBuilder::block(0);
    block.push_constant(int(42)).return_non_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(block)
        .send("value")
        .pop()
        .push_constant(int(0))
        .return_local();
    assert_eq!(run(m), int(42));
}

#[test]
fn test_non_local_return_through_deep_chain() {
    let (mut interp, relay) = relay_fixture();
    for depth in [0, 1, 5, 30] {
        let result = interp
            .send_message(relay.clone(), "runAt:", vec![int(depth)])
            .unwrap();
        assert_eq!(result, int(42), "depth {}", depth);
        assert_eq!(interp.depth(), 0);
    }
}

#[test]
fn test_every_unwound_marker_is_dead() {
    let (mut interp, relay) = relay_fixture();
    interp.reset_stats();
    interp.send_message(relay, "runAt:", vec![int(10)]).unwrap();
    assert_eq!(interp.stats().non_local_returns, 1);
    assert_eq!(interp.stats().escaped_blocks, 0);
    assert_eq!(interp.depth(), 0);
}

#[test]
fn test_intervening_code_is_skipped() {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Relay", &["touched"]);
    // relay: b  b value. touched := true. ^nil
    let mut relay = MethodBuilder::method("relay:");
    relay
        .push_argument(1, 0)
        .send("value")
        .pop()
        .push_constant(Value::True)
        .pop_field(0)
        .push_constant(Value::Nil)
        .return_local();
    install(&mut interp, &class, relay);
    // run  self relay: [ ^7 ]. ^0
    let mut escape = MethodBuilder::block(0);
    escape.push_constant(int(7)).return_non_local();
    let mut m = MethodBuilder::method("run");
    m.push_argument(0, 0)
        .push_block(escape)
        .send("relay:")
        .pop()
        .push_constant(int(0))
        .return_local();
    install(&mut interp, &class, m);

    let instance = interp.universe().new_instance(&class);
    let result = interp.send_message(instance.clone(), "run", Vec::new()).unwrap();
    assert_eq!(result, int(7));
    let touched = interp
        .send_message(instance, "instVarAt:", vec![int(1)])
        .unwrap();
    assert_eq!(touched, Value::Nil);
}

#[test]
fn test_home_caller_receives_returned_value() {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Caller", &[]);
    // inner  [ ^41 ] value. ^0
    let mut escape = MethodBuilder::block(0);
    escape.push_constant(int(41)).return_non_local();
    let mut inner = MethodBuilder::method("inner");
    inner
        .push_block(escape)
        .send("value")
        .pop()
        .push_constant(int(0))
        .return_local();
    install(&mut interp, &class, inner);
    // outer  ^self inner + 1
    let mut outer = MethodBuilder::method("outer");
    outer
        .push_argument(0, 0)
        .send("inner")
        .push_constant(int(1))
        .send("+")
        .return_local();
    install(&mut interp, &class, outer);

    let caller = interp.universe().new_instance(&class);
    assert_eq!(interp.send_message(caller, "outer", Vec::new()).unwrap(), int(42));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Through primitives and nested blocks
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_non_local_return_out_of_to_do() {
    // 1 to: 10 do: [:i | i = 3 ifTrue: [ ^i ] ]. ^0
    let mut found = MethodBuilder::block(0);
    found.push_argument(1, 1).return_non_local();
    let mut body = MethodBuilder::block(1);
    body.push_argument(1, 0)
        .push_constant(int(3))
        .send("=")
        .push_block(found)
        .send("ifTrue:")
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_constant(int(1))
        .push_constant(int(10))
        .push_block(body)
        .send("to:do:")
        .pop()
        .push_constant(int(0))
        .return_local();
    assert_eq!(run(m), int(3));
}

#[test]
fn test_non_local_return_out_of_while_true() {
    // [ true ] whileTrue: [ ^5 ]. ^0
    let mut condition = MethodBuilder::block(0);
    condition.push_constant(Value::True).return_local();
    let mut body = MethodBuilder::block(0);
    body.push_constant(int(5)).return_non_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(condition)
        .push_block(body)
        .send("whileTrue:")
        .pop()
        .push_constant(int(0))
        .return_local();
    assert_eq!(run(m), int(5));
}

#[test]
fn test_non_local_return_from_nested_block_targets_method() {
    // ^([ [ ^1 ] value. 2 ] value) + 10
    let mut inner = MethodBuilder::block(0);
    inner.push_constant(int(1)).return_non_local();
    let mut outer = MethodBuilder::block(0);
    outer
        .push_block(inner)
        .send("value")
        .pop()
        .push_constant(int(2))
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(outer)
        .send("value")
        .push_constant(int(10))
        .send("+")
        .return_local();
    assert_eq!(run(m), int(1));
}

#[test]
fn test_return_non_local_in_method_body_is_local_return() {
    let mut m = MethodBuilder::method("run");
    m.push_constant(int(9)).return_non_local();
    assert_eq!(run(m), int(9));
}

#[test]
fn test_recursive_home_is_the_capturing_activation() {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Nest", &[]);
    // descend: n
    //     n = 0 ifTrue: [ ^#bottom ].
    //     ^(self descend: n - 1) == #bottom ifTrue: [ n ] ifFalse: [ -1 ]
    let mut bottom = MethodBuilder::block(0);
    bottom.push_symbol("bottom").return_non_local();
    let mut yes = MethodBuilder::block(0);
    yes.push_argument(1, 1).return_local();
    let mut no = MethodBuilder::block(0);
    no.push_constant(int(-1)).return_local();
    let mut m = MethodBuilder::method("descend:");
    m.push_argument(1, 0)
        .push_constant(int(0))
        .send("=")
        .push_block(bottom)
        .send("ifTrue:")
        .pop()
        .push_argument(0, 0)
        .push_argument(1, 0)
        .push_constant(int(1))
        .send("-")
        .send("descend:")
        .push_symbol("bottom")
        .send("==")
        .push_block(yes)
        .push_block(no)
        .send("ifTrue:ifFalse:")
        .return_local();
    install(&mut interp, &class, m);

    // The ^#bottom of the deepest activation stops there; only its direct
    // caller sees it
    let nest = interp.universe().new_instance(&class);
    assert_eq!(interp.send_message(nest.clone(), "descend:", vec![int(1)]).unwrap(), int(1));
    assert_eq!(interp.send_message(nest, "descend:", vec![int(3)]).unwrap(), int(-1));
}

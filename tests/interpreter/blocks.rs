//! Block and closure tests

use super::{create_test_interpreter, define_class, install, int, run, run_result};
use talkvm::{MethodBuilder, Value, VmError};

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluation
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_block_value() {
    // ^[ 3 + 4 ] value
    let mut block = MethodBuilder::block(0);
    block
        .push_constant(int(3))
        .push_constant(int(4))
        .send("+")
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(block).send("value").return_local();
    assert_eq!(run(m), int(7));
}

#[test]
fn test_block_parameters() {
    // ^[:x | x * 2] value: 21
    let mut double = MethodBuilder::block(1);
    double
        .push_argument(1, 0)
        .push_constant(int(2))
        .send("*")
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(double)
        .push_constant(int(21))
        .send("value:")
        .return_local();
    assert_eq!(run(m), int(42));

    // ^[:a :b | a - b] value: 10 with: 4
    let mut subtract = MethodBuilder::block(2);
    subtract
        .push_argument(1, 0)
        .push_argument(2, 0)
        .send("-")
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(subtract)
        .push_constant(int(10))
        .push_constant(int(4))
        .send("value:with:")
        .return_local();
    assert_eq!(run(m), int(6));
}

#[test]
fn test_block_locals() {
    // ^[ | t | t := 9. t ] value
    let mut block = MethodBuilder::block(0).locals(1);
    block
        .push_constant(int(9))
        .pop_local(0, 0)
        .push_local(0, 0)
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(block).send("value").return_local();
    assert_eq!(run(m), int(9));
}

#[test]
fn test_block_class_matches_parameter_count() {
    for (params, expected) in [(0, "Block1"), (1, "Block2"), (2, "Block3")] {
        let mut block = MethodBuilder::block(params);
        block.push_constant(Value::Nil).return_local();
        let mut m = MethodBuilder::method("run");
        m.push_block(block).send("class").send("name").return_local();
        match run(m) {
            Value::Symbol(name) => assert_eq!(name.as_str(), expected),
            other => panic!("expected a symbol, got {:?}", other),
        }
    }
}

#[test]
fn test_wrong_value_selector_is_not_understood() {
    // [ 1 ] value: 2
    let mut block = MethodBuilder::block(0);
    block.push_constant(int(1)).return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(block)
        .push_constant(int(2))
        .send("value:")
        .return_local();
    assert!(matches!(
        run_result(m),
        Err(VmError::MessageNotUnderstood { ref selector, .. }) if selector == "value:"
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Captured context
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_block_mutates_captured_local() {
    // | t | t := 5. [ t := t + 3 ] value. ^t
    let mut block = MethodBuilder::block(0);
    block
        .push_local(0, 1)
        .push_constant(int(3))
        .send("+")
        .dup()
        .pop_local(0, 1)
        .return_local();
    let mut m = MethodBuilder::method("run").locals(1);
    m.push_constant(int(5))
        .pop_local(0, 0)
        .push_block(block)
        .send("value")
        .pop()
        .push_local(0, 0)
        .return_local();
    assert_eq!(run(m), int(8));
}

#[test]
fn test_block_reads_home_receiver_and_fields() {
    // a := 40. ^[ a + 2 ] value
    let mut block = MethodBuilder::block(0);
    block
        .push_field(0)
        .push_constant(int(2))
        .send("+")
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_constant(int(40))
        .pop_field(0)
        .push_block(block)
        .send("value")
        .return_local();
    assert_eq!(run(m), int(42));

    // ^[ self ] value == self
    let mut block = MethodBuilder::block(0);
    block.push_argument(0, 1).return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(block)
        .send("value")
        .push_argument(0, 0)
        .send("==")
        .return_local();
    assert_eq!(run(m), Value::True);
}

#[test]
fn test_nested_blocks_reach_each_level() {
    // | t | t := 1. ^[:x | [:y | t + x + y ] value: 100 ] value: 10
    let mut inner = MethodBuilder::block(1);
    inner
        .push_local(0, 2)
        .push_argument(1, 1)
        .send("+")
        .push_argument(1, 0)
        .send("+")
        .return_local();
    let mut outer = MethodBuilder::block(1);
    outer
        .push_block(inner)
        .push_constant(int(100))
        .send("value:")
        .return_local();
    let mut m = MethodBuilder::method("run").locals(1);
    m.push_constant(int(1))
        .pop_local(0, 0)
        .push_block(outer)
        .push_constant(int(10))
        .send("value:")
        .return_local();
    assert_eq!(run(m), int(111));
}

#[test]
fn test_inner_block_writes_outer_block_local() {
    // ^[ | s | [ s := 3 ] value. s ] value
    let mut inner = MethodBuilder::block(0);
    inner
        .push_constant(int(3))
        .dup()
        .pop_local(0, 1)
        .return_local();
    let mut outer = MethodBuilder::block(0).locals(1);
    outer
        .push_block(inner)
        .send("value")
        .pop()
        .push_local(0, 0)
        .return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(outer).send("value").return_local();
    assert_eq!(run(m), int(3));
}

#[test]
fn test_closure_outlives_its_home() {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Adders", &[]);
    // adderFor: n  ^[:x | x + n ]
    let mut block = MethodBuilder::block(1);
    block
        .push_argument(1, 0)
        .push_argument(1, 1)
        .send("+")
        .return_local();
    let mut m = MethodBuilder::method("adderFor:");
    m.push_block(block).return_local();
    install(&mut interp, &class, m);

    let adders = interp.universe().new_instance(&class);
    let add5 = interp
        .send_message(adders.clone(), "adderFor:", vec![int(5)])
        .unwrap();
    let add7 = interp.send_message(adders, "adderFor:", vec![int(7)]).unwrap();
    assert_eq!(interp.send_message(add5, "value:", vec![int(1)]).unwrap(), int(6));
    assert_eq!(interp.send_message(add7, "value:", vec![int(1)]).unwrap(), int(8));
}

#[test]
fn test_each_activation_captures_its_own_frame() {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Counters", &[]);
    // makeCounter  | n | n := 0. ^[ n := n + 1 ]
    let mut block = MethodBuilder::block(0);
    block
        .push_local(0, 1)
        .push_constant(int(1))
        .send("+")
        .dup()
        .pop_local(0, 1)
        .return_local();
    let mut m = MethodBuilder::method("makeCounter").locals(1);
    m.push_constant(int(0))
        .pop_local(0, 0)
        .push_block(block)
        .return_local();
    install(&mut interp, &class, m);

    let counters = interp.universe().new_instance(&class);
    let first = interp
        .send_message(counters.clone(), "makeCounter", Vec::new())
        .unwrap();
    let second = interp.send_message(counters, "makeCounter", Vec::new()).unwrap();

    for expected in 1..=3 {
        assert_eq!(
            interp.send_message(first.clone(), "value", Vec::new()).unwrap(),
            int(expected)
        );
    }
    assert_eq!(interp.send_message(second, "value", Vec::new()).unwrap(), int(1));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Loops
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_while_true() {
    // | i sum | i := 0. sum := 0.
    // [ i < 5 ] whileTrue: [ i := i + 1. sum := sum + i ].
    // ^sum
    let mut condition = MethodBuilder::block(0);
    condition
        .push_local(0, 1)
        .push_constant(int(5))
        .send("<")
        .return_local();
    let mut body = MethodBuilder::block(0);
    body.push_local(0, 1)
        .push_constant(int(1))
        .send("+")
        .pop_local(0, 1)
        .push_local(1, 1)
        .push_local(0, 1)
        .send("+")
        .dup()
        .pop_local(1, 1)
        .return_local();
    let mut m = MethodBuilder::method("run").locals(2);
    m.push_constant(int(0))
        .pop_local(0, 0)
        .push_constant(int(0))
        .pop_local(1, 0)
        .push_block(condition)
        .push_block(body)
        .send("whileTrue:")
        .pop()
        .push_local(1, 0)
        .return_local();
    assert_eq!(run(m), int(15));
}

#[test]
fn test_while_false_with_non_boolean_condition_fails() {
    let mut condition = MethodBuilder::block(0);
    condition.push_constant(int(1)).return_local();
    let mut body = MethodBuilder::block(0);
    body.push_constant(Value::Nil).return_local();
    let mut m = MethodBuilder::method("run");
    m.push_block(condition)
        .push_block(body)
        .send("whileFalse:")
        .return_local();
    assert!(matches!(
        run_result(m),
        Err(VmError::PrimitiveFailed { ref selector, .. }) if selector == "whileFalse:"
    ));
}

#[test]
fn test_to_do() {
    // | sum | sum := 0. 1 to: 10 do: [:i | sum := sum + i ]. ^sum
    let mut body = MethodBuilder::block(1);
    body.push_local(0, 1)
        .push_argument(1, 0)
        .send("+")
        .dup()
        .pop_local(0, 1)
        .return_local();
    let mut m = MethodBuilder::method("run").locals(1);
    m.push_constant(int(0))
        .pop_local(0, 0)
        .push_constant(int(1))
        .push_constant(int(10))
        .push_block(body)
        .send("to:do:")
        .pop()
        .push_local(0, 0)
        .return_local();
    assert_eq!(run(m), int(55));
}

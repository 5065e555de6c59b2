//! Instance field tests

use super::{create_test_interpreter, define_class, install, int, run};
use talkvm::{MethodBuilder, Value, VmError};

#[test]
fn test_fields_start_nil() {
    let mut m = MethodBuilder::method("run");
    m.push_field(1).return_local();
    assert_eq!(run(m), Value::Nil);
}

#[test]
fn test_field_holds_any_value_kind() {
    // a := 3. a := a + 0.75. ^a
    let mut m = MethodBuilder::method("run");
    m.push_constant(int(3))
        .pop_field(0)
        .push_field(0)
        .push_constant(Value::Double(0.75))
        .send("+")
        .pop_field(0)
        .push_field(0)
        .return_local();
    assert_eq!(run(m), Value::Double(3.75));
}

#[test]
fn test_fields_are_per_instance() {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Point", &["x", "y"]);
    // x: ax y: ay  x := ax. y := ay
    let mut setter = MethodBuilder::method("x:y:");
    setter
        .push_argument(1, 0)
        .pop_field(0)
        .push_argument(2, 0)
        .pop_field(1)
        .return_self();
    install(&mut interp, &class, setter);
    // sum  ^x + y
    let mut sum = MethodBuilder::method("sum");
    sum.push_field(0).push_field(1).send("+").return_local();
    install(&mut interp, &class, sum);

    let p = interp.universe().new_instance(&class);
    let q = interp.universe().new_instance(&class);
    interp
        .send_message(p.clone(), "x:y:", vec![int(1), int(2)])
        .unwrap();
    interp
        .send_message(q.clone(), "x:y:", vec![int(10), int(20)])
        .unwrap();
    assert_eq!(interp.send_message(p, "sum", Vec::new()).unwrap(), int(3));
    assert_eq!(interp.send_message(q, "sum", Vec::new()).unwrap(), int(30));
}

#[test]
fn test_subclass_fields_follow_inherited_ones() {
    let mut interp = create_test_interpreter();
    let point = define_class(&mut interp, "Point", &["x", "y"]);
    let point3 = interp.universe_mut().define_class("Point3", &point, &["z"]);
    assert_eq!(point3.instance_field_count(), 3);

    // setZ  z := 7. ^self
    let mut set_z = MethodBuilder::method("setZ");
    set_z.push_constant(int(7)).pop_field(2).return_self();
    install(&mut interp, &point3, set_z);
    // inherited method reading slot 0 still works on the subclass
    let mut get_x = MethodBuilder::method("x");
    get_x.push_field(0).return_local();
    install(&mut interp, &point, get_x);

    let instance = interp.universe().new_instance(&point3);
    interp
        .send_message(instance.clone(), "instVarAt:put:", vec![int(1), int(4)])
        .unwrap();
    interp
        .send_message(instance.clone(), "setZ", Vec::new())
        .unwrap();
    assert_eq!(
        interp.send_message(instance.clone(), "x", Vec::new()).unwrap(),
        int(4)
    );
    assert_eq!(
        interp
            .send_message(instance, "instVarAt:", vec![int(3)])
            .unwrap(),
        int(7)
    );
}

#[test]
fn test_inst_var_at_bounds() {
    let mut interp = create_test_interpreter();
    let class = define_class(&mut interp, "Pair", &["left", "right"]);
    let pair = interp.universe().new_instance(&class);
    for index in [0, 3] {
        assert!(matches!(
            interp.send_message(pair.clone(), "instVarAt:", vec![int(index)]),
            Err(VmError::PrimitiveFailed { ref selector, .. }) if selector == "instVarAt:"
        ));
    }
}

//! Message dispatch and inline cache tests

use super::{create_test_interpreter, define_class, install, int};
use std::rc::Rc;
use talkvm::{Class, Interpreter, Method, MethodBuilder, Value};

/// Install `selector` answering `answer` on `class`
fn answering(interp: &mut Interpreter, class: &Rc<Class>, selector: &str, answer: i64) {
    let mut m = MethodBuilder::method(selector);
    m.push_constant(int(answer)).return_local();
    install(interp, class, m);
}

/// `callOn: x  ^x kind`, a single send site shared by every call
fn call_site(interp: &mut Interpreter, selector: &str) -> Method {
    let driver = define_class(interp, "Driver", &[]);
    let mut m = MethodBuilder::method("callOn:");
    m.push_argument(1, 0).send(selector).return_local();
    install(interp, &driver, m)
}

fn call(interp: &mut Interpreter, site: &Method, receiver: Value) -> Value {
    interp.invoke(site, Value::Nil, vec![receiver]).unwrap()
}

fn send_site_cache_classes(site: &Method) -> Vec<String> {
    let Method::Compiled(invokable) = site else {
        panic!("expected a compiled method");
    };
    let sites = invokable.send_sites();
    invokable
        .inline_cache(sites[0])
        .unwrap()
        .classes()
        .iter()
        .map(|class| class.name().to_string())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache correctness
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_monomorphic_site_hits_after_first_send() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    answering(&mut interp, &a, "kind", 1);
    let site = call_site(&mut interp, "kind");
    let receiver = interp.universe().new_instance(&a);

    interp.reset_stats();
    for _ in 0..10 {
        assert_eq!(call(&mut interp, &site, receiver.clone()), int(1));
    }
    let stats = interp.stats();
    assert_eq!(stats.sends, 10);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 9);
    assert_eq!(stats.lookups, 1);
    assert_eq!(interp.hit_ratio(), 0.9);
}

#[test]
fn test_polymorphic_site_serves_each_class() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    let b = define_class(&mut interp, "B", &[]);
    answering(&mut interp, &a, "kind", 1);
    answering(&mut interp, &b, "kind", 2);
    let site = call_site(&mut interp, "kind");
    let a = interp.universe().new_instance(&a);
    let b = interp.universe().new_instance(&b);

    for _ in 0..3 {
        assert_eq!(call(&mut interp, &site, a.clone()), int(1));
        assert_eq!(call(&mut interp, &site, b.clone()), int(2));
    }
    assert_eq!(send_site_cache_classes(&site), vec!["A", "B"]);
    assert_eq!(interp.stats().cache_misses, 2);
}

#[test]
fn test_cached_site_does_not_serve_stale_method() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    let b = define_class(&mut interp, "B", &[]);
    answering(&mut interp, &a, "kind", 1);
    answering(&mut interp, &b, "kind", 2);
    let site = call_site(&mut interp, "kind");
    let a = interp.universe().new_instance(&a);
    let b = interp.universe().new_instance(&b);

    assert_eq!(call(&mut interp, &site, a), int(1));
    // Warm for A; B must still get its own method
    assert_eq!(call(&mut interp, &site, b.clone()), int(2));
    let uncached = interp.send_message(b, "kind", Vec::new()).unwrap();
    assert_eq!(uncached, int(2));
}

#[test]
fn test_subclass_is_cached_separately() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    answering(&mut interp, &a, "kind", 1);
    let sub = interp.universe_mut().define_class("SubA", &a, &[]);
    let site = call_site(&mut interp, "kind");
    let a = interp.universe().new_instance(&a);
    let sub = interp.universe().new_instance(&sub);

    assert_eq!(call(&mut interp, &site, a), int(1));
    assert_eq!(call(&mut interp, &site, sub), int(1));
    assert_eq!(send_site_cache_classes(&site), vec!["A", "SubA"]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Saturation
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_third_class_is_not_cached() {
    let mut interp = create_test_interpreter();
    let mut receivers = Vec::new();
    for (i, name) in ["A", "B", "C"].iter().enumerate() {
        let class = define_class(&mut interp, name, &[]);
        answering(&mut interp, &class, "kind", i as i64 + 1);
        receivers.push(interp.universe().new_instance(&class));
    }
    let site = call_site(&mut interp, "kind");

    interp.reset_stats();
    for _ in 0..4 {
        for (i, receiver) in receivers.iter().enumerate() {
            assert_eq!(call(&mut interp, &site, receiver.clone()), int(i as i64 + 1));
        }
    }
    // A and B stay cached; C falls through to a lookup on every send
    assert_eq!(send_site_cache_classes(&site), vec!["A", "B"]);
    let stats = interp.stats();
    assert_eq!(stats.cache_hits, 6);
    assert_eq!(stats.cache_misses, 6);
    assert_eq!(stats.saturated_misses, 4);
}

#[test]
fn test_failed_lookup_is_not_cached() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    let site = call_site(&mut interp, "kind");
    let a = interp.universe().new_instance(&a);

    assert!(interp.invoke(&site, Value::Nil, vec![a.clone()]).is_err());
    assert!(send_site_cache_classes(&site).is_empty());
    assert_eq!(interp.stats().does_not_understand, 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lookup
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_inherited_method() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    answering(&mut interp, &a, "kind", 1);
    let b = interp.universe_mut().define_class("B", &a, &[]);
    let c = interp.universe_mut().define_class("C", &b, &[]);
    let c = interp.universe().new_instance(&c);
    assert_eq!(interp.send_message(c, "kind", Vec::new()).unwrap(), int(1));
}

#[test]
fn test_override_wins() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    answering(&mut interp, &a, "kind", 1);
    let b = interp.universe_mut().define_class("B", &a, &[]);
    answering(&mut interp, &b, "kind", 2);
    let b = interp.universe().new_instance(&b);
    assert_eq!(interp.send_message(b, "kind", Vec::new()).unwrap(), int(2));
}

#[test]
fn test_super_send_starts_above_holder() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    answering(&mut interp, &a, "kind", 10);
    let b = interp.universe_mut().define_class("B", &a, &[]);
    // B>>kind  ^super kind + 1
    let mut m = MethodBuilder::method("kind");
    m.push_argument(0, 0)
        .super_send("kind")
        .push_constant(int(1))
        .send("+")
        .return_local();
    install(&mut interp, &b, m);
    // C inherits B>>kind; super still resolves from B's superclass
    let c = interp.universe_mut().define_class("C", &b, &[]);
    let c = interp.universe().new_instance(&c);
    assert_eq!(interp.send_message(c, "kind", Vec::new()).unwrap(), int(11));
}

#[test]
fn test_super_send_from_block() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    answering(&mut interp, &a, "kind", 5);
    let b = interp.universe_mut().define_class("B", &a, &[]);
    // B>>kind  ^[ super kind ] value
    let mut block = MethodBuilder::block(0);
    block.push_argument(0, 1).super_send("kind").return_local();
    let mut m = MethodBuilder::method("kind");
    m.push_block(block).send("value").return_local();
    install(&mut interp, &b, m);

    let b = interp.universe().new_instance(&b);
    assert_eq!(interp.send_message(b, "kind", Vec::new()).unwrap(), int(5));
}

#[test]
fn test_class_side_method() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "Factory", &[]);
    let meta = a.metaclass().unwrap();
    // Factory class>>make  ^self new
    let mut m = MethodBuilder::method("make");
    m.push_argument(0, 0).send("new").return_local();
    install(&mut interp, &meta, m);

    let made = interp
        .send_message(Value::Class(a.clone()), "make", Vec::new())
        .unwrap();
    assert!(Rc::ptr_eq(made.as_object().unwrap().class(), &a));
}

#[test]
fn test_reinstall_flushes_lookup_memo() {
    let mut interp = create_test_interpreter();
    let a = define_class(&mut interp, "A", &[]);
    answering(&mut interp, &a, "kind", 1);
    let b = interp.universe_mut().define_class("B", &a, &[]);
    let instance = interp.universe().new_instance(&b);
    assert_eq!(interp.send_message(instance.clone(), "kind", Vec::new()).unwrap(), int(1));

    answering(&mut interp, &b, "kind", 2);
    assert_eq!(interp.send_message(instance, "kind", Vec::new()).unwrap(), int(2));
}

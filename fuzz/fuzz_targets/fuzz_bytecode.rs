#![no_main]

use libfuzzer_sys::fuzz_target;
use talkvm::{Interpreter, MethodBuilder, Value, VmConfig};

fuzz_target!(|data: &[u8]| {
    // First byte picks the frame size; the rest is the method body
    let Some((&slots, code)) = data.split_first() else {
        return;
    };
    if code.len() > 4_096 {
        return;
    }

    let mut interp = Interpreter::new(VmConfig::default().with_max_call_depth(64)).unwrap();
    let object = interp.universe().core().object.clone();

    // A few literals of each kind so operands often resolve
    let mut block = MethodBuilder::block(0);
    block.push_constant(Value::Integer(1)).return_non_local();
    let mut builder = MethodBuilder::method("run").locals(2).max_stack(4 + slots as usize % 32);
    builder
        .push_constant(Value::Integer(7))
        .pop()
        .push_symbol("value")
        .pop()
        .push_global("system")
        .pop()
        .push_block(block)
        .pop();
    builder.raw(code);

    let Ok(method) = builder.install(interp.universe_mut(), &object) else {
        return;
    };
    // Any Ok or Err is fine; the VM must not panic or hang
    let _ = interp.invoke(&method, Value::Nil, Vec::new());
});

//! Integration tests for the interpreter, organized by feature
//!
//! Methods are assembled with `MethodBuilder` and run through the public
//! `invoke`/`send_message` entry points.
//!
//! Settings come from the environment, so a failing test can be rerun with
//! tracing:
//!
//! ```bash
//! cargo test                                      # defaults
//! RUST_LOG=trace TALKVM_TRACE=1 cargo test nlr    # log every bytecode
//! TALKVM_MAX_CALL_DEPTH=200 cargo test            # shallower recursion limit
//! TALKVM_MAX_REENTRY_DEPTH=20 cargo test          # fewer nested primitive callbacks
//! ```

mod blocks;
mod dispatch;
mod fields;
mod non_local_return;

use std::rc::Rc;
use talkvm::{Class, Interpreter, Method, MethodBuilder, Value, VmConfig, VmError};

/// Create an interpreter configured from the environment, with logging
/// routed through `env_logger`
#[allow(clippy::expect_used)]
pub fn create_test_interpreter() -> Interpreter {
    let _ = env_logger::builder().is_test(true).try_init();
    Interpreter::new(VmConfig::from_env()).expect("bootstrap failed")
}

/// Define a subclass of Object
pub fn define_class(interp: &mut Interpreter, name: &str, fields: &[&str]) -> Rc<Class> {
    let object = interp.universe().core().object.clone();
    interp.universe_mut().define_class(name, &object, fields)
}

#[allow(clippy::expect_used)]
pub fn install(interp: &mut Interpreter, class: &Rc<Class>, builder: MethodBuilder) -> Method {
    builder
        .install(interp.universe_mut(), class)
        .expect("method failed to assemble")
}

/// Install `builder` on a fresh class and run it on a new instance
pub fn run_result(builder: MethodBuilder) -> Result<Value, VmError> {
    let mut interp = create_test_interpreter();
    run_in(&mut interp, builder)
}

/// Like [`run_result`] but in an existing interpreter
pub fn run_in(interp: &mut Interpreter, builder: MethodBuilder) -> Result<Value, VmError> {
    let class = define_class(interp, "Harness", &["a", "b"]);
    let method = builder.install(interp.universe_mut(), &class)?;
    let receiver = interp.universe().new_instance(&class);
    interp.invoke(&method, receiver, Vec::new())
}

#[allow(clippy::expect_used)]
pub fn run(builder: MethodBuilder) -> Value {
    run_result(builder).expect("run failed")
}

pub fn int(n: i64) -> Value {
    Value::Integer(n)
}

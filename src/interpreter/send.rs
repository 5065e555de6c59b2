//! Message sends and recovery sends

use super::Interpreter;
use super::run::OpResult;
use crate::class::Class;
use crate::dispatch::CacheFill;
use crate::error::{ExecResult, VmError};
use crate::frame::Activation;
use crate::invokable::{Invokable, Method};
use crate::symbol::Symbol;
use crate::value::Value;
use log::debug;
use std::rc::Rc;

impl Interpreter {
    /// `SEND`: resolve through the inline cache of the site at `index`
    pub(super) fn send(
        &mut self,
        activation: &mut Activation,
        method: &Rc<Invokable>,
        index: usize,
        selector: &Symbol,
    ) -> ExecResult<OpResult> {
        let arity = selector.arity();
        let receiver = activation.with(|frame| frame.peek_relative(arity - 1).cloned())?;
        let class = self.universe.class_of(&receiver);
        self.stats.sends += 1;

        let cache = method.inline_cache(index);
        let target = match cache.and_then(|cache| cache.lookup(&class)) {
            Some(cached) => {
                self.stats.cache_hits += 1;
                Some(cached)
            }
            None => {
                self.stats.cache_misses += 1;
                let found = self.lookup(&class, selector);
                if let (Some(found), Some(cache)) = (&found, cache) {
                    match cache.fill(class.clone(), found.clone()) {
                        CacheFill::Saturated => {
                            self.stats.saturated_misses += 1;
                            debug!("{}@{}: call site saturated, {} not cached", method, index, class);
                        }
                        fill => {
                            debug!("{}@{}: cached {} -> {} ({:?})", method, index, class, found, fill);
                        }
                    }
                }
                found
            }
        };

        self.enter(activation, target, selector)
    }

    /// `SUPER_SEND`: look up from the superclass of the holder, never cached
    pub(super) fn super_send(
        &mut self,
        activation: &mut Activation,
        method: &Rc<Invokable>,
        selector: &Symbol,
    ) -> ExecResult<OpResult> {
        let holder = method
            .holder()
            .ok_or_else(|| VmError::UnresolvableClass(format!("holder of {}", method)))?;
        let target = match holder.superclass() {
            Some(superclass) => self.lookup(&superclass, selector),
            None => None,
        };

        self.enter(activation, target, selector)
    }

    /// Pop the receiver and arguments and start `target` on them.
    ///
    /// Compiled methods and block evaluations become a new activation on the
    /// run loop's stack. Other primitives and `doesNotUnderstand:arguments:`
    /// complete here and their result replaces the popped values.
    fn enter(
        &mut self,
        activation: &mut Activation,
        target: Option<Method>,
        selector: &Symbol,
    ) -> ExecResult<OpResult> {
        let args = activation.with(|frame| frame.pop_n(selector.arity()))?;
        let result = match target {
            Some(Method::Compiled(invokable)) => {
                return Ok(OpResult::Call(self.activate(invokable, args, None)?));
            }
            Some(Method::Primitive(primitive)) if primitive.evaluates_block() => {
                match args.first().and_then(Value::as_block).cloned() {
                    Some(block) => {
                        let callee = self.activate(block.method().clone(), args, Some(block.context().clone()))?;
                        return Ok(OpResult::Call(callee));
                    }
                    None => self.call(&Method::Primitive(primitive), args)?,
                }
            }
            Some(target) => self.call(&target, args)?,
            None => self.does_not_understand(selector, args)?,
        };
        activation.with(|frame| frame.push(result))?;
        Ok(OpResult::Continue)
    }

    /// Uncached send with `doesNotUnderstand:arguments:` fallback.
    ///
    /// Used by reflective primitives and the recovery sends. `args` excludes
    /// the receiver.
    pub fn dispatch(
        &mut self,
        receiver: Value,
        selector: &Symbol,
        args: Vec<Value>,
    ) -> ExecResult<Value> {
        let class = self.universe.class_of(&receiver);
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(receiver);
        all.extend(args);
        match self.lookup(&class, selector) {
            Some(target) => self.call(&target, all),
            None => self.does_not_understand(selector, all),
        }
    }

    fn lookup(&mut self, class: &Rc<Class>, selector: &Symbol) -> Option<Method> {
        self.stats.lookups += 1;
        class.lookup_invokable(selector)
    }

    /// Reify a failed send. `args[0]` is the receiver; the rest become an
    /// Array in their original order.
    fn does_not_understand(&mut self, selector: &Symbol, args: Vec<Value>) -> ExecResult<Value> {
        self.stats.does_not_understand += 1;
        let mut args = args.into_iter();
        let receiver = args.next().unwrap_or_default();
        let arguments = Value::array(args.collect());
        debug!("{} does not understand #{}", receiver.describe(), selector);

        let dnu = self.universe.symbol("doesNotUnderstand:arguments:");
        let class = self.universe.class_of(&receiver);
        match self.lookup(&class, &dnu) {
            Some(handler) => self.call(
                &handler,
                vec![receiver, Value::Symbol(selector.clone()), arguments],
            ),
            None => Err(VmError::MessageNotUnderstood {
                receiver: receiver.describe(),
                selector: selector.to_string(),
            }
            .into()),
        }
    }

    /// Resolve an unbound global by asking `receiver`
    pub(super) fn unknown_global(&mut self, receiver: Value, name: Symbol) -> ExecResult<Value> {
        self.stats.unknown_globals += 1;
        debug!("unknown global #{} referenced from {}", name, receiver.describe());
        let selector = self.universe.symbol("unknownGlobal:");
        self.dispatch(receiver, &selector, vec![Value::Symbol(name)])
    }
}

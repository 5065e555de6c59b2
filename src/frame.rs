//! Activation records
//!
//! A [`Frame`] lays out one activation in a single slot array:
//!
//! ```text
//! [ arg0 (receiver or block) | args.. | locals.. | operand stack.. ]
//!   0                          nargs    nargs+nlocals             max_stack
//! ```
//!
//! The stack pointer is the index of the current top; it starts at
//! `nargs + nlocals - 1` (the baseline minus one) and may never leave
//! `[baseline - 1, max_stack)`. Both bounds are checked and a violation is a
//! fatal [`VmError`].
//!
//! Frames start out owned by the native activation running them
//! ([`Activation::Local`]). Creating a block promotes the frame to a shared
//! heap cell ([`Activation::Materialized`]) so the block can keep it alive
//! after the activation returns. A block stored back into a slot of the
//! frame it captured forms a reference cycle; [`reclaim`] breaks those once
//! the activation has finished.

use crate::error::VmError;
use crate::invokable::Invokable;
use crate::prelude::FxHashMap;
use crate::value::{Block, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub type SharedFrame = Rc<RefCell<Frame>>;

/// Liveness flag and identity token of one activation
///
/// Starts live and is deactivated exactly once, when the owning activation
/// finishes by any route. Compared by identity only.
#[derive(Clone)]
pub struct Marker(Rc<Cell<bool>>);

impl Marker {
    pub fn new() -> Self {
        Marker(Rc::new(Cell::new(true)))
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.0.get()
    }

    /// Returns false if the marker was already deactivated
    pub fn deactivate(&self) -> bool {
        self.0.replace(false)
    }

    /// Identity comparison
    #[inline]
    pub fn is(&self, other: &Marker) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Marker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Marker({:p}, {})",
            Rc::as_ptr(&self.0),
            if self.is_live() { "live" } else { "dead" }
        )
    }
}

pub struct Frame {
    method: Rc<Invokable>,
    stack: Box<[Value]>,
    /// Number of occupied slots; the stack pointer is `top - 1`
    top: usize,
    marker: Marker,
    /// Context captured by the block this frame runs, if any
    outer: Option<SharedFrame>,
}

impl Frame {
    pub fn new(
        method: Rc<Invokable>,
        args: Vec<Value>,
        outer: Option<SharedFrame>,
    ) -> Result<Self, VmError> {
        if args.len() != method.num_args() {
            return Err(VmError::ArityMismatch {
                method: method.to_string(),
                expected: method.num_args(),
                actual: args.len(),
            });
        }
        let baseline = method.num_args() + method.num_locals();
        let mut stack = args;
        stack.resize(method.max_stack().max(baseline), Value::Nil);
        Ok(Self {
            method,
            stack: stack.into_boxed_slice(),
            top: baseline,
            marker: Marker::new(),
            outer,
        })
    }

    pub fn method(&self) -> &Rc<Invokable> {
        &self.method
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// First operand-stack slot
    #[inline]
    pub fn baseline(&self) -> usize {
        self.method.num_args() + self.method.num_locals()
    }

    /// Index of the current top; `baseline() - 1` when the operand stack is empty
    #[inline]
    pub fn stack_pointer(&self) -> isize {
        self.top as isize - 1
    }

    /// Number of values on the operand stack
    #[inline]
    pub fn depth(&self) -> usize {
        self.top - self.baseline()
    }

    #[inline]
    pub fn push(&mut self, value: Value) -> Result<(), VmError> {
        match self.stack.get_mut(self.top) {
            Some(slot) => {
                *slot = value;
                self.top += 1;
                Ok(())
            }
            None => Err(VmError::StackOverflow {
                method: self.method.to_string(),
                index: self.top,
                max: self.stack.len(),
            }),
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value, VmError> {
        if self.top <= self.baseline() {
            return Err(self.underflow());
        }
        self.top -= 1;
        let slot = self
            .stack
            .get_mut(self.top)
            .ok_or_else(|| VmError::internal("stack pointer outside the frame"))?;
        Ok(std::mem::take(slot))
    }

    /// Pop the top `count` values, returned in push order
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, VmError> {
        if self.depth() < count {
            return Err(self.underflow());
        }
        let start = self.top - count;
        let values = self
            .stack
            .get_mut(start..self.top)
            .ok_or_else(|| VmError::internal("stack pointer outside the frame"))?
            .iter_mut()
            .map(std::mem::take)
            .collect();
        self.top = start;
        Ok(values)
    }

    /// Value `offset` slots below the top; 0 is the top itself
    #[inline]
    pub fn peek_relative(&self, offset: usize) -> Result<&Value, VmError> {
        if offset >= self.depth() {
            return Err(self.underflow());
        }
        self.stack
            .get(self.top - 1 - offset)
            .ok_or_else(|| VmError::internal("stack pointer outside the frame"))
    }

    /// Discard the operand stack, keeping arguments and locals
    pub fn reset_stack_pointer(&mut self) {
        let baseline = self.baseline();
        for slot in self.stack.iter_mut().skip(baseline).take(self.top - baseline) {
            *slot = Value::Nil;
        }
        self.top = baseline;
    }

    /// Argument `index` of this frame; 0 is the receiver (or the block)
    pub fn argument(&self, index: usize) -> Result<Value, VmError> {
        if index >= self.method.num_args() {
            return Err(self.slot_error("argument", index));
        }
        self.stack
            .get(index)
            .cloned()
            .ok_or_else(|| self.slot_error("argument", index))
    }

    pub fn set_argument(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        if index >= self.method.num_args() {
            return Err(self.slot_error("argument", index));
        }
        match self.stack.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.slot_error("argument", index)),
        }
    }

    /// Local `index` of this frame
    pub fn local(&self, index: usize) -> Result<Value, VmError> {
        if index >= self.method.num_locals() {
            return Err(self.slot_error("local", index));
        }
        self.stack
            .get(self.method.num_args() + index)
            .cloned()
            .ok_or_else(|| self.slot_error("local", index))
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        if index >= self.method.num_locals() {
            return Err(self.slot_error("local", index));
        }
        let offset = self.method.num_args() + index;
        match self.stack.get_mut(offset) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.slot_error("local", index)),
        }
    }

    /// Follow `level` captured-context links; `level` must be at least 1
    pub fn outer_context(&self, level: u8) -> Result<SharedFrame, VmError> {
        let missing = || VmError::MissingContext {
            method: self.method.to_string(),
            level,
        };
        let mut context = self.outer.clone().ok_or_else(missing)?;
        for _ in 1..level {
            let next = context.borrow().outer.clone().ok_or_else(missing)?;
            context = next;
        }
        Ok(context)
    }

    /// Run `f` on this frame (`level` 0) or on the context `level` links out
    pub fn with_context<R>(
        &mut self,
        level: u8,
        f: impl FnOnce(&mut Frame) -> Result<R, VmError>,
    ) -> Result<R, VmError> {
        if level == 0 {
            return f(self);
        }
        let context = self.outer_context(level)?;
        let mut frame = context
            .try_borrow_mut()
            .map_err(|_| VmError::internal("captured context is already borrowed"))?;
        f(&mut *frame)
    }

    pub fn get_local(&mut self, index: usize, level: u8) -> Result<Value, VmError> {
        self.with_context(level, |frame| frame.local(index))
    }

    pub fn put_local(&mut self, index: usize, level: u8, value: Value) -> Result<(), VmError> {
        self.with_context(level, |frame| frame.set_local(index, value))
    }

    pub fn get_argument(&mut self, index: usize, level: u8) -> Result<Value, VmError> {
        self.with_context(level, |frame| frame.argument(index))
    }

    pub fn put_argument(&mut self, index: usize, level: u8, value: Value) -> Result<(), VmError> {
        self.with_context(level, |frame| frame.set_argument(index, value))
    }

    /// Receiver of the home method: argument 0 of the outermost context
    pub fn receiver(&mut self) -> Result<Value, VmError> {
        let level = self.method.context_level();
        self.get_argument(0, level)
    }

    fn underflow(&self) -> VmError {
        VmError::StackUnderflow {
            method: self.method.to_string(),
        }
    }

    fn slot_error(&self, kind: &str, index: usize) -> VmError {
        VmError::internal(format!("{} has no {} slot {}", self.method, kind, index))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("method", &self.method.signature())
            .field("stack_pointer", &self.stack_pointer())
            .field("marker", &self.marker)
            .field("captured", &self.outer.is_some())
            .finish()
    }
}

/// A running frame, either still exclusively owned or promoted for capture
pub enum Activation {
    Local(Frame),
    Materialized(SharedFrame),
}

impl Activation {
    pub fn new(frame: Frame) -> Self {
        Activation::Local(frame)
    }

    /// Borrow the frame for one step. Never re-enter the interpreter from
    /// inside `f`: a block may need the same frame as its context.
    #[inline]
    pub fn with<R>(
        &mut self,
        f: impl FnOnce(&mut Frame) -> Result<R, VmError>,
    ) -> Result<R, VmError> {
        match self {
            Activation::Local(frame) => f(frame),
            Activation::Materialized(shared) => {
                let mut frame = shared
                    .try_borrow_mut()
                    .map_err(|_| VmError::internal("running frame is already borrowed"))?;
                f(&mut *frame)
            }
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, Activation::Materialized(_))
    }

    /// Promote to a shared frame if not already, returning a handle to it
    pub fn materialize(&mut self) -> SharedFrame {
        match self {
            Activation::Materialized(shared) => shared.clone(),
            Activation::Local(frame) => {
                let placeholder = Frame {
                    method: frame.method.clone(),
                    stack: Box::new([]),
                    top: 0,
                    marker: frame.marker.clone(),
                    outer: None,
                };
                let owned = std::mem::replace(frame, placeholder);
                let shared = Rc::new(RefCell::new(owned));
                *self = Activation::Materialized(shared.clone());
                shared
            }
        }
    }
}

/// Break the reference cycles a finished frame is part of.
///
/// Collects the dead frames and blocks reachable from `root` through frame
/// slots, outer links and block contexts, then counts how many strong
/// references to each come from inside that set. Whatever is referenced from
/// outside it (a running frame counts as outside, its activation holds it)
/// stays, together with everything it reaches. The frames left over can only
/// be reached through each other: their slots are cleared so the cycle
/// falls apart. `root` must still be held by the finished activation.
pub fn reclaim(root: &SharedFrame) {
    let mut graph = FrameGraph::default();
    if graph.collect(root) {
        graph.clear_unreachable();
    }
}

/// A frame or block taking part in [`reclaim`]
enum Node {
    Frame(SharedFrame),
    Block(Rc<Block>),
}

impl Node {
    fn key(&self) -> usize {
        match self {
            Node::Frame(frame) => Rc::as_ptr(frame) as *const () as usize,
            Node::Block(block) => Rc::as_ptr(block) as *const () as usize,
        }
    }

    fn strong_count(&self) -> usize {
        match self {
            Node::Frame(frame) => Rc::strong_count(frame),
            Node::Block(block) => Rc::strong_count(block),
        }
    }

    /// Nodes this one holds a strong reference to; `None` if a frame is
    /// borrowed, which only happens while it runs
    fn successors(&self) -> Option<Vec<Node>> {
        match self {
            Node::Frame(frame) => {
                let frame = frame.try_borrow().ok()?;
                let blocks = frame
                    .stack
                    .iter()
                    .filter_map(Value::as_block)
                    .map(|block| Node::Block(block.clone()));
                let outer = frame
                    .outer
                    .iter()
                    .filter(|outer| is_dead(outer))
                    .map(|outer| Node::Frame(outer.clone()));
                Some(blocks.chain(outer).collect())
            }
            Node::Block(block) if is_dead(block.context()) => {
                Some(vec![Node::Frame(block.context().clone())])
            }
            Node::Block(_) => Some(Vec::new()),
        }
    }
}

fn is_dead(frame: &SharedFrame) -> bool {
    frame
        .try_borrow()
        .map(|frame| !frame.marker.is_live())
        .unwrap_or(false)
}

#[derive(Default)]
struct FrameGraph {
    /// Node 0 is the root; every node holds one extra strong reference
    nodes: Vec<Node>,
    index: FxHashMap<usize, usize>,
    edges: Vec<Vec<usize>>,
    /// Strong references each node receives from other nodes
    internal: Vec<usize>,
}

impl FrameGraph {
    fn intern(&mut self, node: Node) -> usize {
        let key = node.key();
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(node);
        self.index.insert(key, id);
        self.edges.push(Vec::new());
        self.internal.push(0);
        id
    }

    fn collect(&mut self, root: &SharedFrame) -> bool {
        self.intern(Node::Frame(root.clone()));
        let mut next = 0;
        while let Some(node) = self.nodes.get(next) {
            let Some(successors) = node.successors() else {
                return false;
            };
            for successor in successors {
                let id = self.intern(successor);
                if let Some(count) = self.internal.get_mut(id) {
                    *count += 1;
                }
                if let Some(edges) = self.edges.get_mut(next) {
                    edges.push(id);
                }
            }
            next += 1;
        }
        true
    }

    /// Referenced from outside the graph
    fn is_held(&self, id: usize) -> bool {
        let (Some(node), Some(&internal)) = (self.nodes.get(id), self.internal.get(id)) else {
            return true;
        };
        // Our own copy, plus the finished activation's handle on the root
        let ours = if id == 0 { 2 } else { 1 };
        node.strong_count()
            .checked_sub(ours + internal)
            .is_none_or(|external| external > 0)
    }

    fn clear_unreachable(&self) {
        let mut reachable = vec![false; self.nodes.len()];
        let mut pending: Vec<usize> = (0..self.nodes.len()).filter(|&id| self.is_held(id)).collect();
        while let Some(id) = pending.pop() {
            match reachable.get_mut(id) {
                Some(seen) if !*seen => *seen = true,
                _ => continue,
            }
            if let Some(edges) = self.edges.get(id) {
                pending.extend(edges.iter().copied());
            }
        }

        // Every node is still held by `self.nodes`, so nothing is freed
        // while a frame is borrowed here
        for (node, reachable) in self.nodes.iter().zip(reachable) {
            if let (Node::Frame(frame), false) = (node, reachable) {
                if let Ok(mut frame) = frame.try_borrow_mut() {
                    frame.stack = Box::default();
                    frame.outer = None;
                }
            }
        }
    }
}

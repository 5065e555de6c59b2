//! The explicit VM context
//!
//! A [`Universe`] owns everything the interpreter resolves by name: interned
//! symbols, globals and the class hierarchy. Several universes can coexist
//! in one process; nothing here is global state.
//!
//! Bootstrapped hierarchy:
//!
//! ```text
//! Object
//! ├── Class ── Metaclass
//! ├── Nil, Array, Method, Primitive, Integer, Double, System
//! ├── String ── Symbol
//! ├── Boolean ── True, False
//! └── Block ── Block1, Block2, Block3
//! ```
//!
//! Every class gets a metaclass named `<name> class` whose superclass is the
//! metaclass of the class's superclass; `Object class` inherits from `Class`.

use crate::class::Class;
use crate::config::VmConfig;
use crate::corelib;
use crate::disassembler::disassemble;
use crate::error::VmError;
use crate::invokable::{Invokable, Method, Primitive, PrimitiveFn};
use crate::prelude::{IndexMap, index_map_new};
use crate::primitives;
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{Object, Value};
use log::debug;
use std::rc::Rc;

/// Classes the interpreter itself needs to know about
#[derive(Debug, Clone)]
pub struct CoreClasses {
    pub object: Rc<Class>,
    pub class: Rc<Class>,
    pub metaclass: Rc<Class>,
    pub nil: Rc<Class>,
    pub array: Rc<Class>,
    pub method: Rc<Class>,
    pub primitive: Rc<Class>,
    pub string: Rc<Class>,
    pub symbol: Rc<Class>,
    pub integer: Rc<Class>,
    pub double: Rc<Class>,
    pub boolean: Rc<Class>,
    pub true_class: Rc<Class>,
    pub false_class: Rc<Class>,
    pub block: Rc<Class>,
    pub block1: Rc<Class>,
    pub block2: Rc<Class>,
    pub block3: Rc<Class>,
    pub system: Rc<Class>,
}

impl CoreClasses {
    fn bootstrap(symbols: &mut SymbolTable) -> Self {
        let mut class = |name: &str, superclass: Option<&Rc<Class>>| {
            Rc::new(Class::new(symbols.intern(name), superclass.cloned(), Vec::new()))
        };

        let object = class("Object", None);
        let class_class = class("Class", Some(&object));
        let metaclass = class("Metaclass", Some(&class_class));
        let nil = class("Nil", Some(&object));
        let array = class("Array", Some(&object));
        let method = class("Method", Some(&object));
        let primitive = class("Primitive", Some(&object));
        let string = class("String", Some(&object));
        let symbol = class("Symbol", Some(&string));
        let integer = class("Integer", Some(&object));
        let double = class("Double", Some(&object));
        let boolean = class("Boolean", Some(&object));
        let true_class = class("True", Some(&boolean));
        let false_class = class("False", Some(&boolean));
        let block = class("Block", Some(&object));
        let block1 = class("Block1", Some(&block));
        let block2 = class("Block2", Some(&block));
        let block3 = class("Block3", Some(&block));
        let system = class("System", Some(&object));

        Self {
            object,
            class: class_class,
            metaclass,
            nil,
            array,
            method,
            primitive,
            string,
            symbol,
            integer,
            double,
            boolean,
            true_class,
            false_class,
            block,
            block1,
            block2,
            block3,
            system,
        }
    }

    /// Superclasses precede their subclasses
    fn in_definition_order(&self) -> Vec<Rc<Class>> {
        vec![
            self.object.clone(),
            self.class.clone(),
            self.metaclass.clone(),
            self.nil.clone(),
            self.array.clone(),
            self.method.clone(),
            self.primitive.clone(),
            self.string.clone(),
            self.symbol.clone(),
            self.integer.clone(),
            self.double.clone(),
            self.boolean.clone(),
            self.true_class.clone(),
            self.false_class.clone(),
            self.block.clone(),
            self.block1.clone(),
            self.block2.clone(),
            self.block3.clone(),
            self.system.clone(),
        ]
    }
}

pub struct Universe {
    symbols: SymbolTable,
    globals: IndexMap<Symbol, Value>,
    core: CoreClasses,
    /// Every class and metaclass, for memo invalidation
    classes: Vec<Rc<Class>>,
    transcript: String,
    dump_bytecode: bool,
    echo_transcript: bool,
}

impl Universe {
    /// Bootstrap the core hierarchy, primitives and core library
    pub fn new(config: &VmConfig) -> Result<Self, VmError> {
        let mut symbols = SymbolTable::new();
        let core = CoreClasses::bootstrap(&mut symbols);
        let mut universe = Self {
            symbols,
            globals: index_map_new(),
            core,
            classes: Vec::new(),
            transcript: String::new(),
            dump_bytecode: config.dump_bytecode,
            echo_transcript: config.echo_transcript,
        };

        for class in universe.core.in_definition_order() {
            universe.register_class(&class);
        }

        let system = Value::Object(Rc::new(Object::new(universe.core.system.clone())));
        universe.set_global_named("nil", Value::Nil);
        universe.set_global_named("true", Value::True);
        universe.set_global_named("false", Value::False);
        universe.set_global_named("system", system);

        primitives::install(&mut universe)?;
        corelib::install(&mut universe)?;
        Ok(universe)
    }

    pub fn core(&self) -> &CoreClasses {
        &self.core
    }

    /// Intern a name
    pub fn symbol(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Create a subclass of `superclass` with the given instance fields and
    /// bind it to a global of the same name.
    pub fn define_class(&mut self, name: &str, superclass: &Rc<Class>, fields: &[&str]) -> Rc<Class> {
        let fields = fields.iter().map(|field| self.symbols.intern(field)).collect();
        let class = Rc::new(Class::new(
            self.symbols.intern(name),
            Some(superclass.clone()),
            fields,
        ));
        self.register_class(&class);
        debug!(
            "defined class {} < {} ({} fields)",
            class.name(),
            superclass.name(),
            class.instance_field_count()
        );
        class
    }

    /// Create the metaclass and global binding for a freshly built class
    fn register_class(&mut self, class: &Rc<Class>) {
        let meta_superclass = class
            .superclass()
            .and_then(|superclass| superclass.metaclass())
            .unwrap_or_else(|| self.core.class.clone());
        let metaclass = Rc::new(Class::new(
            self.symbols.intern(&format!("{} class", class.name())),
            Some(meta_superclass),
            Vec::new(),
        ));
        class.set_metaclass(metaclass.clone());
        self.classes.push(class.clone());
        self.classes.push(metaclass);
        self.globals
            .insert(class.name().clone(), Value::Class(class.clone()));
    }

    /// Install a compiled method, replacing any method with the same signature
    pub fn install_method(&mut self, class: &Rc<Class>, invokable: Rc<Invokable>) -> Method {
        if self.dump_bytecode {
            debug!("installing {}>>#{}\n{}", class.name(), invokable.signature(), disassemble(&invokable));
        }
        self.install(class, Method::Compiled(invokable))
    }

    pub fn install_primitive(&mut self, class: &Rc<Class>, selector: &str, function: PrimitiveFn) -> Method {
        let signature = self.symbols.intern(selector);
        self.install(class, Method::Primitive(Rc::new(Primitive::new(signature, function))))
    }

    /// Install a primitive that evaluates its receiver block
    pub fn install_block_evaluation(&mut self, class: &Rc<Class>, selector: &str, function: PrimitiveFn) -> Method {
        let signature = self.symbols.intern(selector);
        let primitive = Primitive::block_evaluation(signature, function);
        self.install(class, Method::Primitive(Rc::new(primitive)))
    }

    /// Install a class-side primitive, on the metaclass of `class`
    pub fn install_class_primitive(
        &mut self,
        class: &Rc<Class>,
        selector: &str,
        function: PrimitiveFn,
    ) -> Result<Method, VmError> {
        let metaclass = class
            .metaclass()
            .ok_or_else(|| VmError::UnresolvableClass(format!("{} class", class.name())))?;
        Ok(self.install_primitive(&metaclass, selector, function))
    }

    fn install(&mut self, class: &Rc<Class>, method: Method) -> Method {
        class.add_method(method.clone());
        self.flush_lookup_memos();
        method
    }

    pub fn flush_lookup_memos(&self) {
        for class in &self.classes {
            class.flush_lookup_memo();
        }
    }

    /// Class of any value; blocks map to `Block1`..`Block3` by argument count
    pub fn class_of(&self, value: &Value) -> Rc<Class> {
        let core = &self.core;
        match value {
            Value::Nil => core.nil.clone(),
            Value::True => core.true_class.clone(),
            Value::False => core.false_class.clone(),
            Value::Integer(_) => core.integer.clone(),
            Value::Double(_) => core.double.clone(),
            Value::String(_) => core.string.clone(),
            Value::Symbol(_) => core.symbol.clone(),
            Value::Array(_) => core.array.clone(),
            Value::Object(object) => object.class().clone(),
            Value::Class(class) => class.metaclass().unwrap_or_else(|| core.metaclass.clone()),
            Value::Block(block) => self
                .block_class(block.method().num_args())
                .unwrap_or_else(|| core.block.clone()),
            Value::Method(Method::Compiled(_)) => core.method.clone(),
            Value::Method(Method::Primitive(_)) => core.primitive.clone(),
        }
    }

    /// `Block1`..`Block3` for blocks taking 0..2 parameters
    pub fn block_class(&self, num_args: usize) -> Option<Rc<Class>> {
        match num_args {
            1 => Some(self.core.block1.clone()),
            2 => Some(self.core.block2.clone()),
            3 => Some(self.core.block3.clone()),
            _ => None,
        }
    }

    pub fn new_instance(&self, class: &Rc<Class>) -> Value {
        Value::Object(Rc::new(Object::new(class.clone())))
    }

    pub fn global(&self, name: &Symbol) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn global_named(&self, name: &str) -> Option<Value> {
        let symbol = self.symbols.get(name)?;
        self.global(&symbol)
    }

    pub fn set_global(&mut self, name: Symbol, value: Value) {
        self.globals.insert(name, value);
    }

    pub fn set_global_named(&mut self, name: &str, value: Value) {
        let symbol = self.symbols.intern(name);
        self.set_global(symbol, value);
    }

    /// Class bound to the global `name`
    pub fn class_named(&self, name: &str) -> Option<Rc<Class>> {
        match self.global_named(name)? {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Append to the transcript
    pub fn print(&mut self, text: &str) {
        if self.echo_transcript {
            print!("{}", text);
        }
        self.transcript.push_str(text);
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn take_transcript(&mut self) -> String {
        std::mem::take(&mut self.transcript)
    }
}

//! Runtime object model: the callable capability and the values that carry
//! it (native functions, user functions, classes), plus class instances.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::environment::{EnvId, Environments};
use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Name of the method run by a class call.
pub const INITIALIZER: &str = "init";

/// Anything that can appear in callee position.
pub trait Callable {
    fn arity(&self) -> usize;

    /// Invoke with already evaluated arguments.  The interpreter checks the
    /// argument count against [`Callable::arity`] before calling.
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Native functions
// ─────────────────────────────────────────────────────────────────────────────

/// Host function exposed to scripts (e.g. `clock`).
pub struct NativeFunction {
    name: &'static str,
    arity: usize,
    func: fn(&[Value]) -> std::result::Result<Value, String>,
}

impl NativeFunction {
    pub fn new(
        name: &'static str,
        arity: usize,
        func: fn(&[Value]) -> std::result::Result<Value, String>,
    ) -> Self {
        Self { name, arity, func }
    }

    pub fn name(&self) -> &str {
        self.name
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        _interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        let result = (self.func)(&arguments)
            .map_err(|msg| LoxError::runtime(RuntimeErrorKind::TypeError, line, msg))?;

        info!("Native function '{}' returned: {}", self.name, result);

        Ok(result)
    }
}

/// Seconds since the Unix epoch, with sub‑second precision.
pub fn clock(_arguments: &[Value]) -> std::result::Result<Value, String> {
    let millis = chrono::Utc::now().timestamp_millis();

    Ok(Value::Number(millis as f64 / 1000.0))
}

// ─────────────────────────────────────────────────────────────────────────────
// User functions
// ─────────────────────────────────────────────────────────────────────────────

/// A function or method value: shared declaration plus captured scope.
#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvId,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvId, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub(crate) fn closure(&self) -> EnvId {
        self.closure
    }

    /// Same declaration, new closure: a scope binding `this` to `instance`
    /// wrapped around the original closure.
    pub fn bind(&self, instance: &InstanceRef, environments: &mut Environments) -> LoxFunction {
        let env = environments.child_of(self.closure);
        environments.define(env, "this", Value::Instance(instance.clone()));

        debug!(
            "Bound method '{}' to {} instance",
            self.name(),
            instance.class().name()
        );

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }

    fn bound_this(&self, interpreter: &Interpreter, line: usize) -> Result<Value> {
        interpreter
            .environments()
            .get_at(self.closure, 0, "this", line)
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        // Parent is the closure, not the caller: lexical scoping.
        let env = interpreter.environments_mut().child_of(self.closure);

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            debug!("Binding parameter '{}' to {}", param.lexeme, argument);

            interpreter
                .environments_mut()
                .define(env, &param.lexeme, argument);
        }

        let flow = interpreter.execute_block(&self.declaration.body, env)?;

        if self.is_initializer {
            return self.bound_this(interpreter, line);
        }

        match flow {
            Flow::Normal => {
                info!("Function '{}' returned nil", self.name());
                Ok(Value::Nil)
            }
            Flow::Return(value) => {
                info!("Function '{}' returned: {}", self.name(), value);
                Ok(value)
            }
            Flow::Break => Err(LoxError::runtime(
                RuntimeErrorKind::Internal,
                line,
                format!("'break' escaped the body of '{}'.", self.name()),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct LoxClass {
    name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
    /// Scope every method closes over.
    closure: EnvId,
}

impl LoxClass {
    pub fn new(
        name: impl Into<String>,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
        closure: EnvId,
    ) -> Self {
        Self {
            name: name.into(),
            superclass,
            methods,
            closure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Rc<LoxClass>> {
        self.superclass.as_ref()
    }

    pub(crate) fn closure(&self) -> EnvId {
        self.closure
    }

    /// Own method table first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self
                .superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name)),
        }
    }
}

// Implemented on the `Rc` so a class call can hand each new instance a
// back‑reference to its class.
impl Callable for Rc<LoxClass> {
    fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map(|init| init.arity())
            .unwrap_or(0)
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        debug!("Instantiating class '{}'", self.name);

        let instance = interpreter.instances_mut().alloc(self);

        if let Some(initializer) = self.find_method(INITIALIZER) {
            let bound = initializer.bind(&instance, interpreter.environments_mut());
            bound.call(interpreter, arguments, line)?;
        }

        Ok(Value::Instance(instance))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Instances
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to one instance in an [`Instances`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(usize);

impl InstanceId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// An instance value: arena handle plus its class.
#[derive(Debug, Clone)]
pub struct InstanceRef {
    id: InstanceId,
    class: Rc<LoxClass>,
}

impl InstanceRef {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }
}

/// Arena holding the field tables of every instance.
#[derive(Debug, Default)]
pub struct Instances {
    fields: Vec<HashMap<String, Value>>,
}

impl Instances {
    pub fn new() -> Self {
        Self::default()
    }

    /// New instance of `class` with no fields.
    pub fn alloc(&mut self, class: &Rc<LoxClass>) -> InstanceRef {
        let id = InstanceId(self.fields.len());
        self.fields.push(HashMap::new());

        InstanceRef {
            id,
            class: Rc::clone(class),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Drop every instance allocated at or after `mark`.
    pub(crate) fn release_from(&mut self, mark: usize) {
        if mark < self.fields.len() {
            debug!("Releasing {} instance(s)", self.fields.len() - mark);
            self.fields.truncate(mark);
        }
    }

    /// Property read.  Fields shadow methods of the same name; a method hit
    /// is returned bound to `instance`.
    pub fn get(
        &self,
        instance: &InstanceRef,
        name: &Token,
        environments: &mut Environments,
    ) -> Result<Value> {
        if let Some(value) = self
            .fields
            .get(instance.id.0)
            .and_then(|fields| fields.get(&name.lexeme))
        {
            return Ok(value.clone());
        }

        if let Some(method) = instance.class.find_method(&name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(instance, environments))));
        }

        Err(LoxError::runtime(
            RuntimeErrorKind::NameError,
            name.line,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    /// Property write.  Always succeeds, creating the field if needed.
    pub fn set(&mut self, instance: &InstanceRef, name: &Token, value: Value) {
        if let Some(fields) = self.fields.get_mut(instance.id.0) {
            fields.insert(name.lexeme.clone(), value);
        }
    }
}

//! Tree‑walking evaluator.
//!
//! The interpreter keeps one *current environment* handle.  Blocks and calls
//! swap it for a child and restore it on every exit path (normal completion,
//! runtime error, `break`, `return`).  Non‑local exits travel as [`Flow`]
//! values returned from [`Interpreter::execute`]; only genuine failures use
//! the `Err` side.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::environment::{EnvId, Environments};
use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::object::{
    self, InstanceId, Instances, LoxClass, LoxFunction, NativeFunction, INITIALIZER,
};
use crate::resolver::ResolutionTable;
use crate::sink::{OutputSink, StdoutOutput};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell off the end; continue with the next statement.
    Normal,

    /// `break`: unwinds to the nearest enclosing loop.
    Break,

    /// `return`: unwinds to the nearest enclosing call.
    Return(Value),
}

/// Deepest call nesting a script may reach before it is stopped with a
/// stack overflow error.
pub const MAX_CALL_DEPTH: usize = 4096;

/// Native stack left before a call; with less, the stack is extended.
const RED_ZONE: usize = 128 * 1024;

/// Size of each native stack extension.
const STACK_PER_CALL: usize = 1024 * 1024;

/// Arena lengths on entry to a block.  On exit everything allocated past
/// them is released, unless a slot older than the block took a reference
/// into that range (`pinned`).
#[derive(Debug, Clone, Copy)]
struct Region {
    envs: usize,
    instances: usize,
    pinned: bool,
}

impl Region {
    fn is_older(&self, slot: Slot) -> bool {
        match slot {
            Slot::Env(env) => env.index() < self.envs,
            Slot::Field(instance) => instance.index() < self.instances,
        }
    }

    /// Does `value` point at something allocated inside this region?
    fn is_reached_by(&self, value: &Value) -> bool {
        match value {
            Value::Function(function) => function.closure().index() >= self.envs,
            Value::Class(class) => class.closure().index() >= self.envs,
            Value::Instance(instance) => {
                instance.id().index() >= self.instances
                    || instance.class().closure().index() >= self.envs
            }
            _ => false,
        }
    }
}

/// Where a value is being stored.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Env(EnvId),
    Field(InstanceId),
}

pub struct Interpreter {
    environments: Environments,
    instances: Instances,
    environment: EnvId,
    locals: ResolutionTable,
    output: Box<dyn OutputSink>,
    call_depth: usize,
    regions: Vec<Region>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(StdoutOutput))
    }

    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn with_output(output: Box<dyn OutputSink>) -> Self {
        info!("Initializing Interpreter");

        let mut environments = Environments::new();

        debug!("Defining native function 'clock'");

        environments.define(
            Environments::GLOBAL,
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction::new("clock", 0, object::clock))),
        );

        Self {
            environments,
            instances: Instances::new(),
            environment: Environments::GLOBAL,
            locals: ResolutionTable::new(),
            output,
            call_depth: 0,
            regions: Vec::new(),
        }
    }

    pub fn environments(&self) -> &Environments {
        &self.environments
    }

    pub(crate) fn environments_mut(&mut self) -> &mut Environments {
        &mut self.environments
    }

    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    pub(crate) fn instances_mut(&mut self) -> &mut Instances {
        &mut self.instances
    }

    /// Read a global by name (handy for embedding and tests).
    pub fn global(&self, name: &str) -> Option<Value> {
        self.environments.get(Environments::GLOBAL, name, 0).ok()
    }

    /// Run a resolved program.  Globals persist across calls; the first
    /// runtime error aborts the rest of this program.
    pub fn interpret(&mut self, statements: &[Stmt], table: &ResolutionTable) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        self.locals.merge(table);
        self.environment = Environments::GLOBAL;
        self.call_depth = 0;

        for stmt in statements {
            match self.execute(stmt)? {
                Flow::Normal => {}
                escaped => {
                    return Err(LoxError::runtime(
                        RuntimeErrorKind::Internal,
                        0,
                        format!("Control signal {:?} escaped to top level.", escaped),
                    ));
                }
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);
                self.output.print_line(&value.to_string());
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.retain(Slot::Env(self.environment), &value);
                self.environments
                    .define(self.environment, &name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = self.environments.child_of(self.environment);
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => {
                            debug!("Break absorbed by loop");
                            break;
                        }
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function = LoxFunction::new(Rc::clone(decl), self.environment, false);
                self.environments.define(
                    self.environment,
                    &decl.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.declare_class(name, superclass.as_ref(), methods)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` with `env` as the current environment, restoring
    /// the previous one afterwards whatever the outcome.
    ///
    /// `env` is expected to be the newest environment; it is released with
    /// everything else the block allocated unless something outlives it.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvId) -> Result<Flow> {
        let previous = self.environment;
        self.environment = env;

        let envs = if env.index() + 1 == self.environments.len() {
            env.index()
        } else {
            self.environments.len()
        };

        self.regions.push(Region {
            envs,
            instances: self.instances.len(),
            pinned: false,
        });

        let mut outcome = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        self.environment = previous;
        self.leave_region(&outcome);

        outcome
    }

    fn leave_region(&mut self, outcome: &Result<Flow>) {
        let Some(mut region) = self.regions.pop() else {
            return;
        };

        if let Ok(Flow::Return(value)) = outcome {
            region.pinned |= region.is_reached_by(value);
        }

        if region.pinned {
            debug!("Region at env {} outlives its block", region.envs);
            return;
        }

        self.environments.release_from(region.envs);
        self.instances.release_from(region.instances);
    }

    /// Record that `value` is being stored in `slot`.  Blocks entered after
    /// `slot` was allocated keep whatever `value` points into.
    fn retain(&mut self, slot: Slot, value: &Value) {
        for region in self.regions.iter_mut().rev() {
            if !region.is_older(slot) {
                break;
            }

            if region.is_reached_by(value) {
                region.pinned = true;
            }
        }
    }

    fn declare_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Declaring class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    return Err(LoxError::runtime(
                        RuntimeErrorKind::SuperclassNotAClass,
                        name.line,
                        "Superclass must be a class.",
                    ));
                }
            },
            None => None,
        };

        self.environments
            .define(self.environment, &name.lexeme, Value::Nil);

        // Methods of a subclass close over a scope holding `super`.
        let method_env = match &superclass {
            Some(class) => {
                let env = self.environments.child_of(self.environment);
                self.environments
                    .define(env, "super", Value::Class(Rc::clone(class)));
                env
            }
            None => self.environment,
        };

        let table: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|decl| {
                let is_initializer = decl.name.lexeme == INITIALIZER;
                let method = LoxFunction::new(Rc::clone(decl), method_env, is_initializer);

                (decl.name.lexeme.clone(), Rc::new(method))
            })
            .collect();

        let class = LoxClass::new(name.lexeme.as_str(), superclass, table, method_env);

        self.environments.assign(
            self.environment,
            &name.lexeme,
            Value::Class(Rc::new(class)),
            name.line,
        )?;

        info!("Class '{}' defined", name.lexeme);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                let short_circuit = match operator.token_type {
                    TokenType::OR => left_val.is_truthy(),
                    _ => !left_val.is_truthy(),
                };

                if short_circuit {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                let target = match self.locals.get(*id) {
                    Some(distance) => self.environments.assign_at(
                        self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => self.environments.assign(
                        Environments::GLOBAL,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                };

                self.retain(Slot::Env(target), &value);

                debug!("Assigned {} to '{}'", value, name.lexeme);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                let Some(callable) = callee_val.as_callable() else {
                    return Err(LoxError::runtime(
                        RuntimeErrorKind::NotCallable,
                        paren.line,
                        "Can only call functions and classes.",
                    ));
                };

                if arg_values.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        RuntimeErrorKind::ArityError,
                        paren.line,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            arg_values.len()
                        ),
                    ));
                }

                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(LoxError::runtime(
                        RuntimeErrorKind::StackOverflow,
                        paren.line,
                        "Stack overflow.",
                    ));
                }

                debug!("Calling {} with {} argument(s)", callee_val, arg_values.len());

                self.call_depth += 1;
                let result = stacker::maybe_grow(RED_ZONE, STACK_PER_CALL, || {
                    callable.call(self, arg_values, paren.line)
                });
                self.call_depth -= 1;

                result
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    self.instances
                        .get(&instance, name, &mut self.environments)
                }
                _ => Err(LoxError::runtime(
                    RuntimeErrorKind::NotAnInstance,
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(
                        RuntimeErrorKind::NotAnInstance,
                        name.line,
                        "Only instances have fields.",
                    ));
                };

                let value = self.evaluate(value)?;
                self.retain(Slot::Field(instance.id()), &value);
                self.instances.set(&instance, name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(type_error(operator, "Operand must be a number.")),
            },
            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),
            _ => Err(LoxError::runtime(
                RuntimeErrorKind::Internal,
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        debug!(
            "Binary '{}' on {} and {}",
            operator.lexeme, left_val, right_val
        );

        match operator.token_type {
            TokenType::PLUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(_), Value::String(_) | Value::Number(_))
                | (Value::Number(_), Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", left_val, right_val)))
                }
                _ => Err(type_error(
                    operator,
                    "Operands must be two numbers, or a string and a string or number.",
                )),
            },

            TokenType::MINUS => numeric(operator, &left_val, &right_val, |a, b| {
                Value::Number(a - b)
            }),

            TokenType::STAR => numeric(operator, &left_val, &right_val, |a, b| {
                Value::Number(a * b)
            }),

            TokenType::SLASH => match (&left_val, &right_val) {
                (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(LoxError::runtime(
                    RuntimeErrorKind::DivisionByZero,
                    operator.line,
                    "Division by zero.",
                )),
                _ => numeric(operator, &left_val, &right_val, |a, b| {
                    Value::Number(a / b)
                }),
            },

            TokenType::GREATER => numeric(operator, &left_val, &right_val, |a, b| {
                Value::Bool(a > b)
            }),

            TokenType::GREATER_EQUAL => numeric(operator, &left_val, &right_val, |a, b| {
                Value::Bool(a >= b)
            }),

            TokenType::LESS => numeric(operator, &left_val, &right_val, |a, b| {
                Value::Bool(a < b)
            }),

            TokenType::LESS_EQUAL => numeric(operator, &left_val, &right_val, |a, b| {
                Value::Bool(a <= b)
            }),

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            _ => Err(LoxError::runtime(
                RuntimeErrorKind::Internal,
                operator.line,
                format!("Invalid binary operator '{}'.", operator.lexeme),
            )),
        }
    }

    /// `super.method`: look the method up starting at the superclass of the
    /// class that declared the running method, and bind it to `this`.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = self.locals.get(id).ok_or_else(|| {
            LoxError::runtime(
                RuntimeErrorKind::Internal,
                keyword.line,
                "'super' was not resolved.",
            )
        })?;

        let superclass = match self.environments.get_at(
            self.environment,
            distance,
            "super",
            keyword.line,
        )? {
            Value::Class(class) => class,
            other => {
                return Err(LoxError::runtime(
                    RuntimeErrorKind::Internal,
                    keyword.line,
                    format!("'super' is bound to a {}.", other.type_name()),
                ));
            }
        };

        // `this` lives in the scope just inside the one holding `super`.
        let receiver = match distance
            .checked_sub(1)
            .map(|d| self.environments.get_at(self.environment, d, "this", keyword.line))
        {
            Some(Ok(Value::Instance(instance))) => instance,
            Some(Err(e)) => return Err(e),
            _ => {
                return Err(LoxError::runtime(
                    RuntimeErrorKind::Internal,
                    keyword.line,
                    "'this' is not bound next to 'super'.",
                ));
            }
        };

        let Some(found) = superclass.find_method(&method.lexeme) else {
            return Err(LoxError::runtime(
                RuntimeErrorKind::NameError,
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            ));
        };

        Ok(Value::Function(Rc::new(
            found.bind(&receiver, &mut self.environments),
        )))
    }

    /// Resolved locals go straight to their scope; everything else is a
    /// global looked up by name.
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(id) {
            Some(distance) => {
                self.environments
                    .get_at(self.environment, distance, &name.lexeme, name.line)
            }
            None => self
                .environments
                .get(Environments::GLOBAL, &name.lexeme, name.line),
        }
    }
}

fn type_error(operator: &Token, message: &str) -> LoxError {
    LoxError::runtime(RuntimeErrorKind::TypeError, operator.line, message)
}

fn numeric(
    operator: &Token,
    left: &Value,
    right: &Value,
    op: impl FnOnce(f64, f64) -> Value,
) -> Result<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(op(*a, *b)),
        _ => Err(type_error(operator, "Operands must be numbers.")),
    }
}

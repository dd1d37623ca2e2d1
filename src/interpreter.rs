//! Tree‑walking evaluator.
//!
//! Statements execute to a [`Flow`]: either they complete normally or a
//! `return` is unwinding toward the nearest function call.  Runtime failures
//! travel separately as `Err(LoxError)`, so the two kinds of non‑local exit
//! never mix.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::class::{LoxClass, INITIALIZER};
use crate::environment::{Environment, SharedEnv};
use crate::error::{LoxError, Result};
use crate::function::{Callable, LoxFunction, NativeFunction};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome of executing one statement.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Fall through to the next statement.
    Normal,

    /// A `return` is unwinding with this value.
    Return(Value),
}

/// Deepest chain of active Lox calls before a runtime error is raised.
pub const MAX_CALL_DEPTH: usize = 1000;

pub struct Interpreter {
    globals: SharedEnv,
    environment: SharedEnv,
    /// Scope distances recorded by the resolver; absent ⇒ global.
    locals: HashMap<ExprId, usize>,
    /// Lox function and class calls currently executing.
    depth: usize,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter printing to stdout, with `clock` defined.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates a new Interpreter whose `print` statements write to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: SharedEnv = Environment::new().shared();

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction::clock())),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            depth: 0,
            out,
        }
    }

    /// Called by the resolver: `id` binds `depth` scopes out from its use.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local {} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Scope distance recorded for `id`, if it resolved to a local.
    pub fn local_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Interprets a list of statements (a "program").  Stops at the first
    /// runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let outcome: Result<()> = self.execute_all(statements);

        self.out.flush()?;

        if outcome.is_ok() {
            info!("Interpretation completed successfully");
        }

        outcome
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            if let Flow::Return(_) = self.execute(stmt)? {
                // The resolver rejects top-level `return`.
                return Err(LoxError::Internal("'return' escaped to top level".into()));
            }
        }

        Ok(())
    }

    // ───────────────────────────── statements ─────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let env: SharedEnv =
                    Environment::with_enclosing(Rc::clone(&self.environment)).shared();

                return self.execute_block(statements, env);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_stmt) = else_branch {
                    return self.execute(else_stmt);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                let function =
                    LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);

                return Ok(Flow::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.declare_class(name, superclass.as_ref(), methods)?,
        }

        Ok(Flow::Normal)
    }

    /// Run `statements` inside `env`, restoring the current environment on
    /// every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], env: SharedEnv) -> Result<Flow> {
        let previous: SharedEnv = std::mem::replace(&mut self.environment, env);

        let mut outcome: Result<Flow> = Ok(Flow::Normal);

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

        outcome
    }

    fn declare_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        debug!("Declaring class '{}'", name.lexeme);

        let parent: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token: &Token = match expr {
                        Expr::Variable { name: parent, .. } => parent,
                        _ => name,
                    };

                    return Err(LoxError::runtime(token, "Superclass must be a class"));
                }
            },
            None => None,
        };

        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        // Methods of a subclass close over an extra scope holding `super`.
        let method_env: SharedEnv = match &parent {
            Some(parent) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                env.define("super", Value::Class(Rc::clone(parent)));
                env.shared()
            }
            None => Rc::clone(&self.environment),
        };

        let mut table: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for method in methods {
            let is_initializer: bool = method.name.lexeme == INITIALIZER;
            let function =
                LoxFunction::new(Rc::clone(method), Rc::clone(&method_env), is_initializer);

            table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass::new(name.lexeme.clone(), parent, table);

        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))
    }

    // ───────────────────────────── expressions ────────────────────────────

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
                let left_val: Value = self.evaluate(left)?;

                let decided: bool = match operator.token_type {
                    TokenType::OR => left_val.is_truthy(),
                    _ => !left_val.is_truthy(),
                };

                if decided {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(&callee_val, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(LoxError::runtime(name, "Only instances have properties")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields"));
                };

                let value: Value = self.evaluate(value)?;
                instance.set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Result<Value> {
        let right_val: Value = self.evaluate(right)?;

        match op.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(
                    op,
                    format!("Operand of '{}' must be a number", op.lexeme),
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),

            _ => Err(LoxError::Internal(format!(
                "invalid unary operator '{}'",
                op.lexeme
            ))),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        debug!("Binary '{}' on {} and {}", op.lexeme, left_val, right_val);

        match op.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left_val != right_val)),
            TokenType::PLUS => {
                return match (left_val, right_val) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                    (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                    _ => Err(LoxError::runtime(
                        op,
                        "Operands of '+' must be two numbers or two strings",
                    )),
                };
            }
            _ => {}
        }

        let (a, b) = match (&left_val, &right_val) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => {
                return Err(LoxError::runtime(
                    op,
                    format!("Operands of '{}' must be numbers", op.lexeme),
                ))
            }
        };

        let value: Value = match op.token_type {
            TokenType::MINUS => Value::Number(a - b),
            TokenType::STAR => Value::Number(a * b),
            // IEEE‑754: x / 0 is ±inf or NaN, never an error
            TokenType::SLASH => Value::Number(a / b),
            TokenType::GREATER => Value::Bool(a > b),
            TokenType::GREATER_EQUAL => Value::Bool(a >= b),
            TokenType::LESS => Value::Bool(a < b),
            TokenType::LESS_EQUAL => Value::Bool(a <= b),
            _ => {
                return Err(LoxError::Internal(format!(
                    "invalid binary operator '{}'",
                    op.lexeme
                )))
            }
        };

        Ok(value)
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = self.locals.get(&id).copied().ok_or_else(|| {
            LoxError::Internal(format!("unresolved 'super' on line {}", keyword.line))
        })?;

        let Value::Class(superclass) = Environment::get_at(&self.environment, distance, "super")?
        else {
            return Err(LoxError::Internal("'super' is not bound to a class".into()));
        };

        // `this` lives in the scope just inside the one holding `super`.
        let this_distance: usize = distance
            .checked_sub(1)
            .ok_or_else(|| LoxError::Internal("'super' resolved without a 'this' scope".into()))?;

        let Value::Instance(instance) =
            Environment::get_at(&self.environment, this_distance, "this")?
        else {
            return Err(LoxError::Internal("'this' is not bound to an instance".into()));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'", method.lexeme),
            )),
        }
    }

    /// Resolved locals hop straight to their scope; everything else is global.
    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme),
            None => self.globals.borrow().get(name),
        }
    }

    /// Invokes a callable (native function, user function, or class).
    fn call_value(&mut self, callee: &Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        if let Value::NativeFunction(native) = callee {
            check_arity(native.arity, args.len(), paren)?;

            return native
                .invoke(&args)
                .map_err(|message| LoxError::runtime(paren, message));
        }

        let callable: &dyn Callable = match callee {
            Value::Function(function) => function.as_ref(),
            Value::Class(class) => class,
            other => {
                debug!("Attempted to call a {}", other.type_name());

                return Err(LoxError::runtime(
                    paren,
                    "Can only call functions and classes",
                ))
            }
        };

        check_arity(callable.arity(), args.len(), paren)?;

        if self.depth >= MAX_CALL_DEPTH {
            debug!("Call depth limit of {} reached", MAX_CALL_DEPTH);
            return Err(LoxError::runtime(paren, "Stack overflow"));
        }

        self.depth += 1;
        let result: Result<Value> = callable.call(self, args);
        self.depth -= 1;

        result
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<()> {
    if expected != got {
        return Err(LoxError::runtime(
            paren,
            format!("Expected {} arguments but got {}", expected, got),
        ));
    }

    Ok(())
}

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Environments are shared by every closure and call frame that captured them.
pub type SharedEnv = Rc<RefCell<Environment>>;

/// One lexical scope: its bindings plus a link to the enclosing scope.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<SharedEnv>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: SharedEnv) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap into the shared form used by the interpreter.
    pub fn shared(self) -> SharedEnv {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<SharedEnv> {
        self.enclosing.clone()
    }

    /// Bind `name` in this scope, replacing an existing binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up here, then outward through the chain.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Read a binding exactly `distance` hops out from `env`.
    pub fn get_at(env: &SharedEnv, distance: usize, name: &str) -> Result<Value> {
        let target: SharedEnv = Self::ancestor(env, distance)?;
        let value = target.borrow().values.get(name).cloned();

        value.ok_or_else(|| {
            LoxError::Internal(format!(
                "resolved binding '{}' missing at distance {}",
                name, distance
            ))
        })
    }

    /// Write a binding exactly `distance` hops out from `env`.
    pub fn assign_at(env: &SharedEnv, distance: usize, name: &Token, value: Value) -> Result<()> {
        let target: SharedEnv = Self::ancestor(env, distance)?;
        target.borrow_mut().define(&name.lexeme, value);
        Ok(())
    }

    fn ancestor(env: &SharedEnv, distance: usize) -> Result<SharedEnv> {
        let mut current: SharedEnv = Rc::clone(env);

        for _ in 0..distance {
            let next: SharedEnv = current.borrow().enclosing().ok_or_else(|| {
                LoxError::Internal(format!("scope chain shorter than {} hops", distance))
            })?;
            current = next;
        }

        Ok(current)
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'", name.lexeme))
}

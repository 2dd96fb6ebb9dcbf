//! Lexical environments, stored in an index‑addressed arena.
//!
//! An environment is a name → value map plus a fixed link to its enclosing
//! environment.  Closures, bound methods and instances hold [`EnvId`]s rather
//! than owning pointers, so a closure stored inside the very scope it
//! captures does not form an ownership cycle.  Every environment lives as
//! long as the [`Environments`] arena that created it.

use std::collections::HashMap;

use log::debug;

use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::value::Value;

/// Handle to one environment in an [`Environments`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(usize);

impl EnvId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvId>,
}

/// Arena owning every environment created during interpretation.
#[derive(Debug)]
pub struct Environments {
    arena: Vec<Environment>,
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}

impl Environments {
    /// The global environment is allocated up front as [`Environments::GLOBAL`].
    pub const GLOBAL: EnvId = EnvId(0);

    pub fn new() -> Self {
        Environments {
            arena: vec![Environment::default()],
        }
    }

    /// Allocate a fresh, empty environment whose parent is `enclosing`.
    /// The parent link is never changed afterwards.
    pub fn child_of(&mut self, enclosing: EnvId) -> EnvId {
        let id = EnvId(self.arena.len());

        self.arena.push(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        });

        id
    }

    /// Number of live environments (globals included).
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Drop every environment allocated at or after `mark`.  The global
    /// environment always stays.
    pub(crate) fn release_from(&mut self, mark: usize) {
        let mark = mark.max(1);

        if mark < self.arena.len() {
            debug!("Releasing {} environment(s)", self.arena.len() - mark);
            self.arena.truncate(mark);
        }
    }

    pub fn enclosing(&self, env: EnvId) -> Option<EnvId> {
        self.arena.get(env.0).and_then(|e| e.enclosing)
    }

    /// Bind `name` in `env`.  Redefinition in the same scope overwrites.
    pub fn define(&mut self, env: EnvId, name: &str, value: Value) {
        debug!("define {} in env {:?}", name, env);

        if let Some(scope) = self.arena.get_mut(env.0) {
            scope.values.insert(name.to_string(), value);
        }
    }

    /// Look `name` up in `env` and then its ancestors.
    pub fn get(&self, env: EnvId, name: &str, line: usize) -> Result<Value> {
        let mut cursor: Option<EnvId> = Some(env);

        while let Some(scope) = cursor.and_then(|id| self.arena.get(id.0)) {
            if let Some(value) = scope.values.get(name) {
                return Ok(value.clone());
            }

            cursor = scope.enclosing;
        }

        Err(undefined(name, line))
    }

    /// Overwrite the nearest existing binding of `name`, returning the
    /// environment that held it.
    pub fn assign(&mut self, env: EnvId, name: &str, value: Value, line: usize) -> Result<EnvId> {
        let mut cursor: Option<EnvId> = Some(env);

        while let Some(id) = cursor {
            let Some(scope) = self.arena.get_mut(id.0) else {
                break;
            };

            if let Some(slot) = scope.values.get_mut(name) {
                *slot = value;
                return Ok(id);
            }

            cursor = scope.enclosing;
        }

        Err(undefined(name, line))
    }

    /// Read `name` exactly `distance` hops up from `env`.
    pub fn get_at(&self, env: EnvId, distance: usize, name: &str, line: usize) -> Result<Value> {
        let target = self.ancestor(env, distance, name, line)?;

        self.arena
            .get(target.0)
            .and_then(|scope| scope.values.get(name))
            .cloned()
            .ok_or_else(|| unresolved(name, distance, line))
    }

    /// Write `name` exactly `distance` hops up from `env`, returning the
    /// environment written to.
    pub fn assign_at(
        &mut self,
        env: EnvId,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<EnvId> {
        let target = self.ancestor(env, distance, name, line)?;

        match self
            .arena
            .get_mut(target.0)
            .and_then(|scope| scope.values.get_mut(name))
        {
            Some(slot) => {
                *slot = value;
                Ok(target)
            }
            None => Err(unresolved(name, distance, line)),
        }
    }

    fn ancestor(&self, env: EnvId, distance: usize, name: &str, line: usize) -> Result<EnvId> {
        let mut id = env;

        for _ in 0..distance {
            id = self
                .enclosing(id)
                .ok_or_else(|| unresolved(name, distance, line))?;
        }

        Ok(id)
    }
}

fn undefined(name: &str, line: usize) -> LoxError {
    LoxError::runtime(
        RuntimeErrorKind::NameError,
        line,
        format!("Undefined variable '{}'.", name),
    )
}

// Resolver and interpreter disagree about scope layout.
fn unresolved(name: &str, distance: usize, line: usize) -> LoxError {
    LoxError::runtime(
        RuntimeErrorKind::Internal,
        line,
        format!(
            "Resolved binding '{}' missing at distance {}.",
            name, distance
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_get_walks_ancestors() {
        let mut envs = Environments::new();
        let inner = envs.child_of(Environments::GLOBAL);

        envs.define(Environments::GLOBAL, "a", Value::Number(1.0));

        assert_eq!(envs.get(inner, "a", 1).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn redefinition_overwrites() {
        let mut envs = Environments::new();

        envs.define(Environments::GLOBAL, "a", Value::Number(1.0));
        envs.define(Environments::GLOBAL, "a", Value::Bool(true));

        assert_eq!(
            envs.get(Environments::GLOBAL, "a", 1).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn missing_name_is_a_name_error() {
        let envs = Environments::new();
        let err = envs.get(Environments::GLOBAL, "nope", 7).unwrap_err();

        assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::NameError));
        assert_eq!(err.line(), 7);
    }

    #[test]
    fn assign_updates_outer_binding_without_shadowing() {
        let mut envs = Environments::new();
        let inner = envs.child_of(Environments::GLOBAL);

        envs.define(Environments::GLOBAL, "a", Value::Number(1.0));
        envs.assign(inner, "a", Value::Number(2.0), 1).unwrap();

        assert_eq!(
            envs.get(Environments::GLOBAL, "a", 1).unwrap(),
            Value::Number(2.0)
        );
        assert!(envs.get_at(inner, 0, "a", 1).is_err());
    }

    #[test]
    fn assign_to_unknown_name_fails() {
        let mut envs = Environments::new();
        let err = envs
            .assign(Environments::GLOBAL, "ghost", Value::Nil, 3)
            .unwrap_err();

        assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::NameError));
    }

    #[test]
    fn get_at_and_assign_at_use_exact_distance() {
        let mut envs = Environments::new();
        let middle = envs.child_of(Environments::GLOBAL);
        let inner = envs.child_of(middle);

        envs.define(middle, "x", Value::Number(1.0));
        envs.define(inner, "x", Value::Number(2.0));

        assert_eq!(envs.get_at(inner, 1, "x", 1).unwrap(), Value::Number(1.0));

        envs.assign_at(inner, 1, "x", Value::Number(5.0), 1).unwrap();

        assert_eq!(envs.get_at(inner, 0, "x", 1).unwrap(), Value::Number(2.0));
        assert_eq!(envs.get(middle, "x", 1).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn distance_past_the_root_is_internal() {
        let envs = Environments::new();
        let err = envs.get_at(Environments::GLOBAL, 3, "x", 1).unwrap_err();

        assert_eq!(err.runtime_kind(), Some(RuntimeErrorKind::Internal));
    }
}

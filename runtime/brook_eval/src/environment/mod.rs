//! Lexical scopes for invocation frames.
//!
//! A frame's `Environment` is a stack of scopes; blocks push and pop. Scopes
//! are shared (`LocalScope`), so a closure literal captures the current scope
//! by reference and keeps seeing later assignments.
//!
//! Brook locals are always reassignable, so bindings carry no mutability.

// Rc is the intentional implementation detail of LocalScope<T>
#![expect(
    clippy::disallowed_types,
    reason = "Rc is the implementation of LocalScope<T>"
)]

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use brook_ir::Symbol;

use crate::Instance;

/// Single-threaded shared scope handle.
#[repr(transparent)]
pub struct LocalScope<T>(Rc<RefCell<T>>);

impl<T> LocalScope<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        LocalScope(Rc::new(RefCell::new(value)))
    }

    /// True when both handles refer to the same scope.
    pub fn ptr_eq(&self, other: &LocalScope<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for LocalScope<T> {
    #[inline]
    fn clone(&self) -> Self {
        LocalScope(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for LocalScope<T> {
    // Scopes can reach themselves through captured closures; never recurse.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalScope({:p})", Rc::as_ptr(&self.0))
    }
}

impl<T: Default> Default for LocalScope<T> {
    fn default() -> Self {
        LocalScope::new(T::default())
    }
}

impl<T> Deref for LocalScope<T> {
    type Target = RefCell<T>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// One level of local bindings.
#[derive(Default)]
pub struct Scope {
    bindings: FxHashMap<Symbol, Instance>,
    parent: Option<LocalScope<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: LocalScope<Scope>) -> Self {
        Scope {
            bindings: FxHashMap::default(),
            parent: Some(parent),
        }
    }

    /// Define or shadow `name` in this scope.
    #[inline]
    pub fn define(&mut self, name: Symbol, value: Instance) {
        self.bindings.insert(name, value);
    }

    pub fn lookup(&self, name: Symbol) -> Option<Instance> {
        if let Some(value) = self.bindings.get(&name) {
            return Some(value.clone());
        }
        self.parent.as_ref()?.borrow().lookup(name)
    }

    /// Assign to the nearest existing binding, returning the replaced value.
    /// Gives `value` back when no scope binds `name`.
    pub fn assign(&mut self, name: Symbol, value: Instance) -> Result<Instance, Instance> {
        if let Some(slot) = self.bindings.get_mut(&name) {
            return Ok(std::mem::replace(slot, value));
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().assign(name, value),
            None => Err(value),
        }
    }
}

/// Scope stack of one frame.
pub struct Environment {
    scopes: Vec<LocalScope<Scope>>,
}

impl Environment {
    /// Fresh frame with an empty root scope.
    pub fn new() -> Self {
        Environment {
            scopes: vec![LocalScope::new(Scope::new())],
        }
    }

    /// Frame whose root scope chains to `parent`, e.g. a closure's captured scope.
    pub fn chained(parent: LocalScope<Scope>) -> Self {
        Environment {
            scopes: vec![LocalScope::new(Scope::with_parent(parent))],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    #[inline]
    pub fn push_scope(&mut self) {
        let parent = self.current_scope();
        self.scopes.push(LocalScope::new(Scope::with_parent(parent)));
    }

    /// Pop the innermost scope. The root scope is never popped.
    #[inline]
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Pop scopes until `depth` remain.
    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth.max(1));
    }

    /// Shared handle to the innermost scope, for closure capture.
    pub fn current_scope(&self) -> LocalScope<Scope> {
        self.innermost().clone()
    }

    fn innermost(&self) -> &LocalScope<Scope> {
        // The root scope is never popped, so the stack is never empty.
        &self.scopes[self.scopes.len() - 1]
    }

    #[inline]
    pub fn define(&mut self, name: Symbol, value: Instance) {
        self.innermost().borrow_mut().define(name, value);
    }

    #[inline]
    pub fn lookup(&self, name: Symbol) -> Option<Instance> {
        self.innermost().borrow().lookup(name)
    }

    /// Assign to an existing local. Gives `value` back when `name` is unbound.
    pub fn assign(&mut self, name: Symbol, value: Instance) -> Result<(), Instance> {
        let previous = self.innermost().borrow_mut().assign(name, value)?;
        drop(previous);
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

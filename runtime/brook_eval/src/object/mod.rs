//! Object model: reference-counted instances.
//!
//! Every value a script can hold is an [`Instance`]: a shared, reference
//! counted object with a class, a native payload (for boxed primitives, lists,
//! closures, class objects and coroutine handles) and a vector of data slots
//! laid out by its class.
//!
//! # Lifetime
//!
//! Copies of an `Instance` share one allocation; the reference count is the
//! strong count of that allocation. When the last reference to an instance
//! whose class declares a destructor is dropped, the instance is not freed
//! immediately. It is revived into the owning runtime's [`DestructorQueue`]
//! and the runtime runs the destructor at its next safe point, exactly once,
//! before the memory is released. Dropping never runs script code.

// Rc is the implementation of Instance and of the destructor queue.
#![expect(
    clippy::disallowed_types,
    reason = "Rc is the implementation of Instance"
)]

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use brook_ir::{CallableKind, ExprId, ParamRange, SharedArena, Symbol};

use crate::class::ClassId;
use crate::environment::{LocalScope, Scope};
use crate::mind::CoroutineHandle;

mod list;

pub(crate) use list::ListCursor;
pub use list::ListData;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Native payload of an instance.
pub enum Payload {
    /// Data instances and the None singleton.
    Plain,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Symbol(Symbol),
    List(ListData),
    Closure(Closure),
    Class(ClassId),
    Coroutine(CoroutineHandle),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Plain => write!(f, "Plain"),
            Payload::Boolean(b) => write!(f, "Boolean({b})"),
            Payload::Integer(i) => write!(f, "Integer({i})"),
            Payload::Real(r) => write!(f, "Real({r})"),
            Payload::String(s) => write!(f, "String({s:?})"),
            Payload::Symbol(s) => write!(f, "Symbol({s:?})"),
            Payload::List(list) => write!(f, "List(len={})", list.len()),
            Payload::Closure(c) => write!(f, "Closure({:?})", c.kind),
            Payload::Class(c) => write!(f, "Class({c:?})"),
            Payload::Coroutine(h) => write!(f, "Coroutine({:?})", h.frame()),
        }
    }
}

/// A callable value: code body plus the lexical scope and `this` it closed over.
///
/// The scope is shared with the defining frame, not copied, so later
/// assignments on either side are visible to the other.
pub struct Closure {
    pub(crate) kind: CallableKind,
    pub(crate) arena: SharedArena,
    pub(crate) params: ParamRange,
    pub(crate) body: ExprId,
    pub(crate) scope: LocalScope<Scope>,
    pub(crate) this: Instance,
    pub(crate) this_class: ClassId,
}

impl Closure {
    pub fn kind(&self) -> CallableKind {
        self.kind
    }
}

type QueueCell = RefCell<Vec<Instance>>;

/// Instances whose last reference was dropped and whose destructor is due.
#[derive(Clone, Default)]
pub(crate) struct DestructorQueue(Rc<QueueCell>);

impl DestructorQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn downgrade(&self) -> Weak<QueueCell> {
        Rc::downgrade(&self.0)
    }

    /// Take every queued instance, leaving the queue empty.
    pub(crate) fn take(&self) -> Vec<Instance> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub(crate) fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

pub(crate) struct ObjectData {
    class: ClassId,
    payload: Payload,
    slots: RefCell<Vec<Instance>>,
    serial: u64,
    /// Set only for instances of classes with a destructor.
    reaper: Option<Weak<QueueCell>>,
    destructed: Cell<bool>,
}

/// Shared reference to a runtime object.
#[derive(Clone)]
pub struct Instance(Rc<ObjectData>);

impl Instance {
    pub(crate) fn new(class: ClassId, payload: Payload, slots: Vec<Instance>) -> Self {
        Self::build(class, payload, slots, None)
    }

    /// Instance whose destructor must run through `queue` before it is freed.
    pub(crate) fn with_destructor(
        class: ClassId,
        payload: Payload,
        slots: Vec<Instance>,
        queue: &DestructorQueue,
    ) -> Self {
        Self::build(class, payload, slots, Some(queue.downgrade()))
    }

    fn build(
        class: ClassId,
        payload: Payload,
        slots: Vec<Instance>,
        reaper: Option<Weak<QueueCell>>,
    ) -> Self {
        Instance(Rc::new(ObjectData {
            class,
            payload,
            slots: RefCell::new(slots),
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            reaper,
            destructed: Cell::new(false),
        }))
    }

    #[inline]
    pub fn class(&self) -> ClassId {
        self.0.class
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.0.payload
    }

    /// Process-unique number, used to tell instances apart in diagnostics.
    pub fn serial(&self) -> u64 {
        self.0.serial
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live references to this instance.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance(Rc::downgrade(&self.0))
    }

    /// Whether the destructor has been scheduled or run.
    pub fn is_destructed(&self) -> bool {
        self.0.destructed.get()
    }

    /// Skip the destructor of an instance whose constructor failed.
    pub(crate) fn disarm_destructor(&self) {
        self.0.destructed.set(true);
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload() {
            Payload::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.payload() {
            Payload::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self.payload() {
            Payload::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Integer or Real payload widened to `f64`.
    #[expect(clippy::cast_precision_loss, reason = "Integer to Real promotion")]
    pub fn as_number(&self) -> Option<f64> {
        match self.payload() {
            Payload::Integer(i) => Some(*i as f64),
            Payload::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.payload() {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self.payload() {
            Payload::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListData> {
        match self.payload() {
            Payload::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&Closure> {
        match self.payload() {
            Payload::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<ClassId> {
        match self.payload() {
            Payload::Class(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&CoroutineHandle> {
        match self.payload() {
            Payload::Coroutine(h) => Some(h),
            _ => None,
        }
    }

    pub(crate) fn slot(&self, index: usize) -> Option<Instance> {
        self.0.slots.borrow().get(index).cloned()
    }

    /// Replace a data slot. The previous value is dropped after the borrow
    /// is released, so a cascade of drops never observes a borrowed slot vector.
    pub(crate) fn set_slot(&self, index: usize, value: Instance) -> bool {
        let previous = {
            let mut slots = self.0.slots.borrow_mut();
            match slots.get_mut(index) {
                Some(slot) => std::mem::replace(slot, value),
                None => return false,
            }
        };
        drop(previous);
        true
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        let Some(queue) = self.0.reaper.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        if self.0.destructed.replace(true) {
            return;
        }
        let revived = Instance(Rc::clone(&self.0));
        if let Ok(mut pending) = queue.try_borrow_mut() {
            pending.push(revived);
        };
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance(#{}, {:?}, {:?})", self.serial(), self.class(), self.payload())
    }
}

/// Non-owning reference; does not keep the instance alive.
#[derive(Clone)]
pub struct WeakInstance(Weak<ObjectData>);

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakInstance(alive={})", self.is_alive())
    }
}

#[cfg(test)]
mod tests;

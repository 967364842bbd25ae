//! Typed list payload.

// Live cursors are shared between a list and the coroutine walking it.
#![expect(
    clippy::disallowed_types,
    reason = "Rc shares a cursor position with its list"
)]

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::Instance;
use crate::class::ClassId;
use crate::errors::{index_out_of_range, EvalError};

/// Ordered, mutable sequence of instances conforming to one item class.
///
/// The item class is checked by the runtime on every insertion; this type
/// only manages storage and bounds.
#[derive(Debug)]
pub struct ListData {
    item_class: ClassId,
    items: RefCell<Vec<Instance>>,
    cursors: RefCell<Vec<Weak<Cell<usize>>>>,
}

/// Position of the next item to visit in a list that may change between
/// visits. Insertions and removals before the position move it, so no item
/// is skipped or visited twice.
#[derive(Debug)]
pub(crate) struct ListCursor(Rc<Cell<usize>>);

impl ListCursor {
    /// Step past the next item and return it, or `None` at the end.
    pub(crate) fn advance(&self, list: &ListData) -> Option<Instance> {
        let position = self.0.get();
        let item = list.get_live(position)?;
        self.0.set(position + 1);
        Some(item)
    }
}

impl ListData {
    pub(crate) fn new(item_class: ClassId, items: Vec<Instance>) -> Self {
        Self {
            item_class,
            items: RefCell::new(items),
            cursors: RefCell::new(Vec::new()),
        }
    }

    /// Cursor at the first item, kept in step with later mutation.
    pub(crate) fn cursor(&self) -> ListCursor {
        let position = Rc::new(Cell::new(0));
        self.cursors.borrow_mut().push(Rc::downgrade(&position));
        ListCursor(position)
    }

    fn move_cursors(&self, moved: impl Fn(usize) -> usize) {
        self.cursors.borrow_mut().retain(|cursor| match cursor.upgrade() {
            Some(position) => {
                position.set(moved(position.get()));
                true
            }
            None => false,
        });
    }

    pub fn item_class(&self) -> ClassId {
        self.item_class
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn checked_index(&self, index: i64, len: usize) -> Result<usize, EvalError> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < len)
            .ok_or_else(|| index_out_of_range(index, len))
    }

    pub fn get(&self, index: i64) -> Result<Instance, EvalError> {
        let items = self.items.borrow();
        let idx = self.checked_index(index, items.len())?;
        Ok(items[idx].clone())
    }

    /// Item at `index`, or `None` past the end. Used by live cursors that
    /// re-check bounds on every step.
    pub fn get_live(&self, index: usize) -> Option<Instance> {
        self.items.borrow().get(index).cloned()
    }

    /// Copy of the current items; iteration over it is unaffected by mutation.
    pub fn snapshot(&self) -> Vec<Instance> {
        self.items.borrow().clone()
    }

    pub(crate) fn push(&self, item: Instance) {
        self.items.borrow_mut().push(item);
    }

    pub(crate) fn set(&self, index: i64, item: Instance) -> Result<(), EvalError> {
        let previous = {
            let mut items = self.items.borrow_mut();
            let idx = self.checked_index(index, items.len())?;
            std::mem::replace(&mut items[idx], item)
        };
        drop(previous);
        Ok(())
    }

    /// Insert before `index`; `index == len` appends.
    pub(crate) fn insert(&self, index: i64, item: Instance) -> Result<(), EvalError> {
        let mut items = self.items.borrow_mut();
        let len = items.len();
        let idx = usize::try_from(index)
            .ok()
            .filter(|i| *i <= len)
            .ok_or_else(|| index_out_of_range(index, len))?;
        items.insert(idx, item);
        self.move_cursors(|position| if idx < position { position + 1 } else { position });
        Ok(())
    }

    pub(crate) fn remove(&self, index: i64) -> Result<Instance, EvalError> {
        let mut items = self.items.borrow_mut();
        let idx = self.checked_index(index, items.len())?;
        let removed = items.remove(idx);
        self.move_cursors(|position| if idx < position { position - 1 } else { position });
        Ok(removed)
    }

    pub(crate) fn clear(&self) -> Vec<Instance> {
        self.move_cursors(|_| 0);
        std::mem::take(&mut *self.items.borrow_mut())
    }
}

//! `List`: typed, mutable sequences.
//!
//! `each` walks a snapshot taken when it starts; `_each` is a coroutine that
//! visits one item per resumption through a live cursor, so the list may be
//! changed between steps. The cursor follows insertions and removals: items
//! removed before it are not revisited, and none is skipped.

use smallvec::smallvec;

use super::{int_arg, Members};
use crate::errors::{type_mismatch, EvalError};
use crate::mind::{CoroutineContext, Poll, Wake};
use crate::object::{ListCursor, ListData};
use crate::{Instance, Interpreter};

pub(super) fn list_members(m: Members<'_>) -> Members<'_> {
    m.method("length", &[], |interp, this, _| {
        let len = list_of(interp, this)?.len();
        Ok(interp.integer(i64::try_from(len).unwrap_or(i64::MAX)))
    })
    .method("is_empty", &[], |interp, this, _| {
        let empty = list_of(interp, this)?.is_empty();
        Ok(interp.boolean(empty))
    })
    .method("at", &["index"], |interp, this, args| {
        let index = int_arg(interp, &args[0])?;
        list_of(interp, this)?.get(index)
    })
    .method("set_at", &["index", "item"], |interp, this, args| {
        let list = list_of(interp, this)?;
        let index = int_arg(interp, &args[0])?;
        interp.check_type(&args[1], list.item_class())?;
        list.set(index, args[1].clone())?;
        Ok(args[1].clone())
    })
    .method("append", &["item"], |interp, this, args| {
        let list = list_of(interp, this)?;
        interp.check_type(&args[0], list.item_class())?;
        list.push(args[0].clone());
        Ok(this.clone())
    })
    .method("insert", &["index", "item"], |interp, this, args| {
        let list = list_of(interp, this)?;
        let index = int_arg(interp, &args[0])?;
        interp.check_type(&args[1], list.item_class())?;
        list.insert(index, args[1].clone())?;
        Ok(this.clone())
    })
    .method("remove_at", &["index"], |interp, this, args| {
        let index = int_arg(interp, &args[0])?;
        list_of(interp, this)?.remove(index)
    })
    .method("clear", &[], |interp, this, _| {
        let removed = list_of(interp, this)?.clear();
        drop(removed);
        Ok(this.clone())
    })
    .method("first", &[], |interp, this, _| {
        let first = list_of(interp, this)?.get_live(0);
        Ok(first.unwrap_or_else(|| interp.none()))
    })
    .method("last", &[], |interp, this, _| {
        let list = list_of(interp, this)?;
        let last = list.len().checked_sub(1).and_then(|i| list.get_live(i));
        Ok(last.unwrap_or_else(|| interp.none()))
    })
    .method("each", &["visit"], |interp, this, args| {
        let items = list_of(interp, this)?.snapshot();
        for item in items {
            interp.invoke_closure_now(&args[0], smallvec![(None, item)])?;
        }
        Ok(this.clone())
    })
    .coroutine("_each", &["visit"], each_live)
}

/// One item per resumption; the bounds are re-read every step.
fn each_live(cx: &mut CoroutineContext<'_>) -> Result<Poll, EvalError> {
    let this = cx.this().clone();
    let visit = cx.arg(0)?.clone();
    let list = list_of(cx.interp, &this)?;
    let cursor = cx
        .take_state::<ListCursor>()
        .unwrap_or_else(|| list.cursor());
    let Some(item) = cursor.advance(list) else {
        return Ok(Poll::Ready(this));
    };
    cx.set_state(cursor);
    cx.interp.invoke_closure_now(&visit, smallvec![(None, item)])?;
    Ok(Poll::Pending(Wake::Tick))
}

fn list_of<'a>(interp: &Interpreter, this: &'a Instance) -> Result<&'a ListData, EvalError> {
    this.as_list()
        .ok_or_else(|| type_mismatch("List", interp.class_name_of(this)))
}

//! Waiting coroutines on `Object` and the `InvokedCoroutine` handle class.

use super::{number_arg, Members};
use crate::errors::{type_mismatch, EvalError};
use crate::mind::{CoroutineContext, CoroutineHandle, FrameStatus, Poll, Wake};
use crate::{Instance, Interpreter};

pub(super) fn wait_members(m: Members<'_>) -> Members<'_> {
    m.coroutine("_wait", &["seconds"], wait)
        .coroutine("_wait_until", &["condition"], wait_until)
        .coroutine("_wait_event", &["event"], wait_event)
        .coroutine("_wait_for", &["coroutine"], wait_for)
}

/// Completes once `seconds` of Mind time have passed since it started.
fn wait(cx: &mut CoroutineContext<'_>) -> Result<Poll, EvalError> {
    let seconds = number_arg(cx.interp, cx.arg(0)?)?;
    let target = cx.started_at() + seconds.max(0.0);
    if !cx.is_first_step() && cx.clock() >= target {
        return Ok(Poll::Ready(cx.interp.none()));
    }
    Ok(Poll::Pending(Wake::At(target)))
}

/// Polls a method closure once per tick until it returns true.
fn wait_until(cx: &mut CoroutineContext<'_>) -> Result<Poll, EvalError> {
    let condition = cx.arg(0)?.clone();
    let value = cx
        .interp
        .invoke_closure_now(&condition, crate::interpreter::ArgValues::new())?;
    if cx.interp.expect_bool(&value)? {
        Ok(Poll::Ready(value))
    } else {
        Ok(Poll::Pending(Wake::Tick))
    }
}

/// Completes with the payload of the next matching `notify`.
fn wait_event(cx: &mut CoroutineContext<'_>) -> Result<Poll, EvalError> {
    let event = cx.arg(0)?;
    let event = match (event.as_symbol(), event.as_str()) {
        (Some(sym), _) => sym,
        (None, Some(text)) => cx.interp.intern(text),
        (None, None) => return Err(type_mismatch("Symbol", cx.interp.class_name_of(event))),
    };
    match cx.take_delivered() {
        Some(payload) if !cx.is_first_step() => Ok(Poll::Ready(payload)),
        _ => Ok(Poll::Pending(Wake::Event(event))),
    }
}

/// Completes when another coroutine finishes, with its result. Unlike a
/// direct coroutine call, a failed or stopped target yields nil.
fn wait_for(cx: &mut CoroutineContext<'_>) -> Result<Poll, EvalError> {
    let handle = handle_of(cx.interp, cx.arg(0)?)?.clone();
    if handle.is_finished() {
        let result = match handle.status() {
            FrameStatus::Completed => handle.result(),
            _ => None,
        };
        return Ok(Poll::Ready(result.unwrap_or_else(|| cx.interp.none())));
    }
    Ok(Poll::Pending(Wake::Frame(handle)))
}

pub(super) fn handle_members(m: Members<'_>) -> Members<'_> {
    m.method("is_finished", &[], |interp, this, _| {
        let finished = handle_of(interp, this)?.is_finished();
        Ok(interp.boolean(finished))
    })
    .method("is_completed", &[], |interp, this, _| {
        let status = handle_of(interp, this)?.status();
        Ok(interp.boolean(status == FrameStatus::Completed))
    })
    .method("is_running", &[], |interp, this, _| {
        let finished = handle_of(interp, this)?.is_finished();
        Ok(interp.boolean(!finished))
    })
    .method("status", &[], |interp, this, _| {
        let status = handle_of(interp, this)?.status();
        let sym = interp.intern(status.as_str());
        Ok(interp.symbol(sym))
    })
    .method("result", &[], |interp, this, _| {
        let result = handle_of(interp, this)?.result();
        Ok(result.unwrap_or_else(|| interp.none()))
    })
    .method("error", &[], |interp, this, _| {
        match handle_of(interp, this)?.error() {
            Some(err) => Ok(interp.string(err.message)),
            None => Ok(interp.none()),
        }
    })
    .method("stop", &[], |interp, this, _| {
        let handle = handle_of(interp, this)?.clone();
        interp.stop(&handle);
        Ok(this.clone())
    })
}

fn handle_of<'a>(interp: &Interpreter, value: &'a Instance) -> Result<&'a CoroutineHandle, EvalError> {
    value
        .as_handle()
        .ok_or_else(|| type_mismatch("InvokedCoroutine", interp.class_name_of(value)))
}

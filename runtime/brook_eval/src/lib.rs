//! Brook Eval - class system, object model, evaluator and coroutine scheduler.
//!
//! This crate is the runtime half of Brook: it takes expression trees built
//! in `brook_ir` arenas, attaches them to class members, and runs them.
//!
//! # Architecture
//!
//! - `ClassRegistry`: class DAG, instance layouts, cached member resolution
//! - `Instance`: reference-counted objects with deferred destructors
//! - `Environment`: shared lexical scopes, captured by closures
//! - `Interpreter`: immediate evaluation, invocation and the host API
//! - `Mind`: cooperative scheduler for coroutine frames, pumped once per tick
//!
//! A runtime is single-threaded: instances are `Rc`-based and every Mind
//! runs on the thread that owns its `Interpreter`. Runtimes on different
//! threads may share one `SharedSymbols` table.

mod builtins;
pub mod class;
mod diagnostics;
mod environment;
pub mod errors;
pub mod interpreter;
pub mod mind;
mod names;
mod object;
mod stack;
#[cfg(test)]
mod testing;

pub use class::{
    ClassDecl, ClassId, ClassRegistry, DataMemberDecl, MemberBody, MemberDecl, MemberDescriptor,
    NativeCoroutineFn, NativeMethodFn, SlotInfo,
};
pub use diagnostics::{CallFrame, CallStack};
pub use environment::{Environment, LocalScope, Scope};
pub use errors::{EvalError, EvalErrorKind, EvalResult};
pub use interpreter::{Interpreter, InterpreterBuilder, RuntimeConfig};
pub use mind::{
    CoroutineContext, CoroutineHandle, FrameEvent, FrameFailure, FrameId, FrameStatus, Mind,
    MindFlags, MindId, Poll, Wake, LOG_LIMIT,
};
pub use object::{Closure, Instance, ListData, Payload, WeakInstance};
pub use stack::ensure_sufficient_stack;

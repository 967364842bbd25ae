//! Brook - host facade for the Brook scripting runtime.
//!
//! Embedding a runtime takes three steps:
//!
//! 1. Read a [`HostConfig`] (usually [`HostConfig::from_env`]) and call
//!    [`init`], which also installs logging.
//! 2. Register classes, built with [`ClassScript`] or supplied by a front end,
//!    and start coroutines through [`with_runtime`].
//! 3. Pump each Mind once per host tick with `Interpreter::update`, then
//!    [`teardown`] when the host shuts down.
//!
//! The `brook` binary drives the bundled [`scenarios`] this way.

mod config;
mod logging;
mod runtime;
pub mod scenarios;
mod script;

pub use config::{ConfigError, HostConfig, LOG_TREE_VAR, LOG_VAR, MAX_CALL_DEPTH_VAR, TRACE_VAR};
pub use logging::init_tracing;
pub use runtime::{
    init, init_from_env, is_initialized, shared_symbols, teardown, with_runtime, HostError,
};
pub use script::{expression, ClassScript};

pub use brook_eval::{
    ClassId, CoroutineHandle, EvalError, EvalErrorKind, FrameStatus, Instance, Interpreter, MindId,
};

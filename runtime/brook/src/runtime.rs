//! The host's runtime instance.
//!
//! Embedding hosts call [`init`] once before running scripts and [`teardown`]
//! when done; everything in between goes through [`with_runtime`]. The
//! interpreter is `Rc`-based, so each thread owns its own runtime, while the
//! symbol table is created once per process and shared by all of them.
//! Tearing down and initialising again gives a fresh runtime with the same
//! symbols, which is how tests get independent runtimes in one process.

use std::cell::RefCell;
use std::sync::OnceLock;

use brook_eval::{EvalError, Interpreter};
use brook_ir::SharedSymbols;

use crate::logging::init_tracing;
use crate::{ConfigError, HostConfig};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("the Brook runtime is already initialised on this thread")]
    AlreadyInitialized,
    #[error("the Brook runtime is not initialised on this thread")]
    NotInitialized,
    #[error("the Brook runtime is already borrowed further up the call stack")]
    Reentrant,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

static SYMBOLS: OnceLock<SharedSymbols> = OnceLock::new();

thread_local! {
    static RUNTIME: RefCell<Option<Interpreter>> = const { RefCell::new(None) };
}

/// The process-wide symbol table.
pub fn shared_symbols() -> SharedSymbols {
    SYMBOLS.get_or_init(SharedSymbols::new).clone()
}

/// Create this thread's runtime from `config` and install logging.
pub fn init(config: &HostConfig) -> Result<(), HostError> {
    init_tracing(config);
    RUNTIME.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| HostError::Reentrant)?;
        if slot.is_some() {
            return Err(HostError::AlreadyInitialized);
        }
        *slot = Some(config.builder().symbols(shared_symbols()).build());
        tracing::debug!(
            max_call_depth = config.max_call_depth,
            trace = config.trace,
            "runtime initialised"
        );
        Ok(())
    })
}

/// [`init`] with configuration read from the environment.
pub fn init_from_env() -> Result<HostConfig, HostError> {
    let config = HostConfig::from_env()?;
    init(&config)?;
    Ok(config)
}

pub fn is_initialized() -> bool {
    RUNTIME.with(|slot| match slot.try_borrow() {
        Ok(slot) => slot.is_some(),
        // Mutably borrowed, so in use.
        Err(_) => true,
    })
}

/// Run `f` against this thread's runtime.
pub fn with_runtime<R>(f: impl FnOnce(&mut Interpreter) -> R) -> Result<R, HostError> {
    RUNTIME.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| HostError::Reentrant)?;
        let interp = slot.as_mut().ok_or(HostError::NotInitialized)?;
        Ok(f(interp))
    })
}

/// Drop this thread's runtime, stopping every coroutine and running pending
/// destructors. Returns whether there was a runtime to drop.
pub fn teardown() -> Result<bool, HostError> {
    let runtime = RUNTIME.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| HostError::Reentrant)?;
        Ok::<_, HostError>(slot.take())
    })?;
    let existed = runtime.is_some();
    drop(runtime);
    if existed {
        tracing::debug!("runtime torn down");
    }
    Ok(existed)
}

#[cfg(test)]
mod tests;

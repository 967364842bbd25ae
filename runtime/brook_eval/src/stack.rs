//! Native stack growth for deeply nested evaluation.

/// Run `f`, growing the native stack first if less than the red zone remains.
///
/// The call-depth limit in `CallStack` bounds script recursion; this keeps
/// deep but legal nesting (long chains of blocks, nested coroutine spawns)
/// from overflowing the host thread's stack before that limit is reached.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    const RED_ZONE: usize = 128 * 1024;
    const GROW_BY: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, GROW_BY, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

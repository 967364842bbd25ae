//! Invocation stack tracking.
//!
//! Every method, closure and coroutine step pushes a `CallFrame` while it
//! runs. The depth check lives in `push()`, and errors are stamped with a
//! snapshot of the stack when they leave a top-level invocation.

use brook_ir::{Symbol, SymbolTable};

use crate::errors::{recursion_limit_exceeded, BacktraceFrame, EvalBacktrace, EvalError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallFrame {
    /// Class whose member is running.
    pub class: Symbol,
    pub member: Symbol,
}

#[derive(Clone, Debug)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a frame, failing with `StackOverflow` when the limit is reached.
    /// The frame is not pushed on overflow.
    pub fn push(&mut self, frame: CallFrame) -> Result<(), EvalError> {
        if self.frames.len() >= self.max_depth {
            return Err(recursion_limit_exceeded(self.max_depth));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) {
        debug_assert!(
            !self.frames.is_empty(),
            "CallStack::pop() called on empty stack"
        );
        self.frames.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn capture(&self, symbols: &SymbolTable) -> EvalBacktrace {
        let frames = self
            .frames
            .iter()
            .rev()
            .map(|f| BacktraceFrame {
                name: format!("{}.{}", symbols.text_of(f.class), symbols.text_of(f.member)),
            })
            .collect();
        EvalBacktrace::new(frames)
    }

    /// Stamp `err` with the current stack unless it already carries one.
    pub fn attach_backtrace(&self, err: EvalError, symbols: &SymbolTable) -> EvalError {
        if self.frames.is_empty() || err.backtrace.is_some() || err.is_control_flow() {
            return err;
        }
        err.with_backtrace(self.capture(symbols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EvalErrorKind;

    #[test]
    fn test_push_respects_limit() {
        let symbols = SymbolTable::new();
        let frame = CallFrame {
            class: symbols.intern("Counter"),
            member: symbols.intern("increment"),
        };
        let mut stack = CallStack::new(2);
        stack.push(frame).unwrap();
        stack.push(frame).unwrap();
        let err = stack.push(frame).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::StackOverflow { depth: 2 });
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_capture_is_most_recent_first() {
        let symbols = SymbolTable::new();
        let mut stack = CallStack::new(8);
        stack
            .push(CallFrame {
                class: symbols.intern("Game"),
                member: symbols.intern("tick"),
            })
            .unwrap();
        stack
            .push(CallFrame {
                class: symbols.intern("Counter"),
                member: symbols.intern("increment"),
            })
            .unwrap();
        let bt = stack.capture(&symbols);
        let names: Vec<_> = bt.frames().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Counter.increment", "Game.tick"]);
        stack.pop();
        assert_eq!(stack.depth(), 1);
    }
}

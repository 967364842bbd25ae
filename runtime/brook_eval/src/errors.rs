//! Runtime error types.
//!
//! `EvalErrorKind` gives every failure a typed category. Factory functions
//! (e.g. `member_not_found()`) are the public way to build errors; they fill
//! both `kind` and `message`.
//!
//! Loop exits travel through the same `Err` channel as errors, flagged by
//! `control_flow`, so `?` carries them up to the enclosing loop. Error guards
//! never catch them.

use std::fmt;

use crate::Instance;

/// Result of evaluation.
pub type EvalResult = Result<Instance, EvalError>;

/// Non-error unwinding signals.
#[derive(Clone, Debug)]
pub enum ControlFlow {
    /// Leave the innermost loop with a value.
    LoopExit(Instance),
}

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    // Registration
    ClassConflict {
        class: String,
    },
    CyclicHierarchy {
        class: String,
        supertype: String,
    },
    UnknownClass {
        name: String,
    },
    IncompatibleOverride {
        class: String,
        member: String,
    },
    /// A constructor or destructor declared as a coroutine.
    SuspendingLifecycle {
        class: String,
        member: String,
    },

    // Dispatch
    MemberNotFound {
        member: String,
        class: String,
    },
    NilDereference {
        member: String,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    // Runtime shape
    TypeMismatch {
        expected: String,
        got: String,
    },
    IndexOutOfRange {
        index: i64,
        len: usize,
    },
    UndefinedVariable {
        name: String,
    },
    DivisionByZero,

    // Execution
    StackOverflow {
        depth: usize,
    },
    SchedulerFault {
        coroutine: String,
    },
    DurationalInImmediate {
        member: String,
    },
    NoMind,

    Custom {
        message: String,
    },
}

impl EvalErrorKind {
    /// Short stable name, used in logs and by scripts inspecting a guard's error.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClassConflict { .. } => "ClassConflict",
            Self::CyclicHierarchy { .. } => "CyclicHierarchy",
            Self::UnknownClass { .. } => "UnknownClass",
            Self::IncompatibleOverride { .. } => "IncompatibleOverride",
            Self::SuspendingLifecycle { .. } => "SuspendingLifecycle",
            Self::MemberNotFound { .. } => "MemberNotFound",
            Self::NilDereference { .. } => "NilDereference",
            Self::ArityMismatch { .. } => "ArityMismatch",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::IndexOutOfRange { .. } => "IndexOutOfRange",
            Self::UndefinedVariable { .. } => "UndefinedVariable",
            Self::DivisionByZero => "DivisionByZero",
            Self::StackOverflow { .. } => "StackOverflow",
            Self::SchedulerFault { .. } => "SchedulerFault",
            Self::DurationalInImmediate { .. } => "DurationalInImmediate",
            Self::NoMind => "NoMind",
            Self::Custom { .. } => "Custom",
        }
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassConflict { class } => write!(f, "class `{class}` is already registered"),
            Self::CyclicHierarchy { class, supertype } => write!(
                f,
                "making `{supertype}` a supertype of `{class}` would create a cycle"
            ),
            Self::UnknownClass { name } => write!(f, "unknown class `{name}`"),
            Self::IncompatibleOverride { class, member } => write!(
                f,
                "`{class}.{member}` changes the kind of an inherited member"
            ),
            Self::SuspendingLifecycle { class, member } => {
                write!(f, "`{class}.{member}` must be a method, it cannot suspend")
            }

            Self::MemberNotFound { member, class } => {
                write!(f, "no member `{member}` on class {class}")
            }
            Self::NilDereference { member } => {
                write!(f, "called `{member}` on nil")
            }
            Self::ArityMismatch {
                name,
                expected,
                got,
            } => {
                let arg_word = if *expected == 1 {
                    "argument"
                } else {
                    "arguments"
                };
                if name.is_empty() {
                    write!(f, "expected {expected} {arg_word}, got {got}")
                } else {
                    write!(f, "{name} expects {expected} {arg_word}, got {got}")
                }
            }

            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for list of length {len}")
            }
            Self::UndefinedVariable { name } => write!(f, "undefined variable: {name}"),
            Self::DivisionByZero => write!(f, "division by zero"),

            Self::StackOverflow { depth } => {
                write!(f, "maximum call depth exceeded (limit: {depth})")
            }
            Self::SchedulerFault { coroutine } => {
                write!(f, "`{coroutine}` waits on itself through a cycle of coroutines")
            }
            Self::DurationalInImmediate { member } => {
                write!(f, "`{member}` may suspend and cannot run in an immediate context")
            }
            Self::NoMind => write!(f, "no mind is available to run the coroutine"),

            Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

/// Secondary information attached to an error.
#[derive(Clone, Debug)]
pub struct EvalNote {
    pub message: String,
}

impl EvalNote {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One invocation in a backtrace, most recent first.
#[derive(Clone, Debug)]
pub struct BacktraceFrame {
    /// `Class.member` of the invocation.
    pub name: String,
}

/// Snapshot of the invocation stack where an error was raised.
#[derive(Clone, Debug, Default)]
pub struct EvalBacktrace {
    frames: Vec<BacktraceFrame>,
}

impl EvalBacktrace {
    pub fn new(frames: Vec<BacktraceFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "invocation backtrace:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            writeln!(f, "  {i}: {}", frame.name)?;
        }
        Ok(())
    }
}

/// Where a failed top-level invocation started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorOrigin {
    pub class: String,
    pub member: String,
    /// Short description of the receiver instance.
    pub instance: String,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} on {}", self.class, self.member, self.instance)
    }
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// For factory-created errors, this equals `kind.to_string()`.
    pub message: String,
    /// Set for loop exits; such values are signals, not failures.
    pub control_flow: Option<ControlFlow>,
    pub backtrace: Option<EvalBacktrace>,
    pub origin: Option<ErrorOrigin>,
    pub notes: Vec<EvalNote>,
}

impl EvalError {
    /// Create an error with just a message (`Custom` kind).
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_kind(EvalErrorKind::Custom {
            message: message.into(),
        })
    }

    fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            control_flow: None,
            backtrace: None,
            origin: None,
            notes: Vec::new(),
        }
    }

    /// Signal leaving the innermost loop.
    pub fn loop_exit(value: Instance) -> Self {
        Self {
            kind: EvalErrorKind::Custom {
                message: "loop exit".to_string(),
            },
            message: "loop exit outside of a loop".to_string(),
            control_flow: Some(ControlFlow::LoopExit(value)),
            backtrace: None,
            origin: None,
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_backtrace(mut self, backtrace: EvalBacktrace) -> Self {
        if self.backtrace.is_none() {
            self.backtrace = Some(backtrace);
        }
        self
    }

    /// Record where the failing top-level invocation started. The first
    /// origin attached wins.
    #[must_use]
    pub fn with_origin(mut self, origin: ErrorOrigin) -> Self {
        if self.origin.is_none() {
            self.origin = Some(origin);
        }
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: EvalNote) -> Self {
        self.notes.push(note);
        self
    }

    #[inline]
    pub fn is_control_flow(&self) -> bool {
        self.control_flow.is_some()
    }

    /// Turn a loop exit that escaped every loop into a real error.
    #[must_use]
    pub fn into_failure(self) -> Self {
        if self.is_control_flow() {
            EvalError::new(self.message)
        } else {
            self
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(origin) = &self.origin {
            write!(f, " (in {origin})")?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {}", note.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

// Registration Errors

#[cold]
pub fn class_conflict(class: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ClassConflict {
        class: class.to_string(),
    })
}

#[cold]
pub fn cyclic_hierarchy(class: &str, supertype: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CyclicHierarchy {
        class: class.to_string(),
        supertype: supertype.to_string(),
    })
}

#[cold]
pub fn unknown_class(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownClass {
        name: name.to_string(),
    })
}

#[cold]
pub fn incompatible_override(class: &str, member: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IncompatibleOverride {
        class: class.to_string(),
        member: member.to_string(),
    })
}

#[cold]
pub fn suspending_lifecycle(class: &str, member: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::SuspendingLifecycle {
        class: class.to_string(),
        member: member.to_string(),
    })
}

// Dispatch Errors

#[cold]
pub fn member_not_found(member: &str, class: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MemberNotFound {
        member: member.to_string(),
        class: class.to_string(),
    })
}

#[cold]
pub fn nil_dereference(member: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NilDereference {
        member: member.to_string(),
    })
}

#[cold]
pub fn wrong_arg_count(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        name: name.to_string(),
        expected,
        got,
    })
}

/// Argument that matches no parameter of the callee.
#[cold]
pub fn unknown_argument(name: &str, arg: &str) -> EvalError {
    wrong_arg_count(name, 0, 1).with_note(EvalNote::new(format!("no parameter named `{arg}`")))
}

// Runtime Shape Errors

#[cold]
pub fn type_mismatch(expected: &str, got: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    })
}

#[cold]
pub fn index_out_of_range(index: i64, len: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfRange { index, len })
}

#[cold]
pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

// Execution Errors

#[cold]
pub fn recursion_limit_exceeded(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth })
}

#[cold]
pub fn scheduler_fault(coroutine: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::SchedulerFault {
        coroutine: coroutine.to_string(),
    })
}

#[cold]
pub fn durational_in_immediate(member: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DurationalInImmediate {
        member: member.to_string(),
    })
}

#[cold]
pub fn no_mind() -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoMind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_message_matches_kind() {
        let err = member_not_found("jump", "Robot");
        assert_eq!(err.message, err.kind.to_string());
        assert_eq!(err.message, "no member `jump` on class Robot");
        assert_eq!(err.kind.name(), "MemberNotFound");
    }

    #[test]
    fn test_arity_message_pluralizes() {
        assert_eq!(
            wrong_arg_count("at", 1, 3).message,
            "at expects 1 argument, got 3"
        );
        assert_eq!(
            wrong_arg_count("", 2, 0).message,
            "expected 2 arguments, got 0"
        );
    }

    #[test]
    fn test_first_origin_wins() {
        let first = ErrorOrigin {
            class: "Counter".into(),
            member: "increment".into(),
            instance: "Counter#1".into(),
        };
        let second = ErrorOrigin {
            class: "Other".into(),
            member: "run".into(),
            instance: "Other#2".into(),
        };
        let err = division_by_zero()
            .with_origin(first.clone())
            .with_origin(second);
        assert_eq!(err.origin, Some(first));
        assert_eq!(
            err.to_string(),
            "division by zero (in Counter.increment on Counter#1)"
        );
    }

    #[test]
    fn test_backtrace_display() {
        let bt = EvalBacktrace::new(vec![
            BacktraceFrame {
                name: "Counter.increment".into(),
            },
            BacktraceFrame {
                name: "Game.tick".into(),
            },
        ]);
        assert_eq!(
            bt.to_string(),
            "invocation backtrace:\n  0: Counter.increment\n  1: Game.tick\n"
        );
        assert_eq!(bt.len(), 2);
    }
}

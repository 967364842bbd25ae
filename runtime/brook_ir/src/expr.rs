//! Expression node kinds.
//!
//! Every node is `Copy`: children are `ExprId`s or ranges into the arena's
//! side tables, identifiers and string literals are `Symbol`s.

use crate::{ArgRange, ClauseRange, ExprId, ExprRange, ParamRange, Symbol};

/// Expression kind.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ExprKind {
    // Literals
    Nil,
    Bool(bool),
    Int(i64),
    /// Real literal stored as bits for `Hash`.
    Real(u64),
    Str(Symbol),
    SymbolLit(Symbol),
    This,

    // Bindings
    Ident(Symbol),
    Let {
        name: Symbol,
        init: ExprId,
    },
    /// Assignment to a local, then a data member of `this`, then class data.
    Assign {
        name: Symbol,
        value: ExprId,
    },

    // Operators, dispatched as method calls except for `and`/`or`
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },

    // Calls
    /// `receiver.method(args)`; a missing receiver means `this`.
    MethodCall {
        receiver: Option<ExprId>,
        method: Symbol,
        args: ArgRange,
        qualifier: Option<Symbol>,
    },
    /// `receiver._coroutine(args)`; suspends the caller until the callee finishes.
    CoroutineCall {
        receiver: Option<ExprId>,
        coroutine: Symbol,
        args: ArgRange,
        qualifier: Option<Symbol>,
    },
    InvokeClosure {
        callee: ExprId,
        args: ArgRange,
    },
    Instantiate {
        class: Symbol,
        args: ArgRange,
    },

    // Control
    Conditional {
        clauses: ClauseRange,
        else_branch: Option<ExprId>,
    },
    Block(ExprRange),
    Loop(ExprId),
    LoopExit(Option<ExprId>),
    /// Evaluates `body`; on a runtime error binds its message to `error_var`
    /// and evaluates `handler` instead.
    Guard {
        body: ExprId,
        error_var: Symbol,
        handler: ExprId,
    },

    // Values
    Closure {
        params: ParamRange,
        body: ExprId,
        kind: CallableKind,
    },
    List {
        item_class: Symbol,
        elements: ExprRange,
    },

    // Concurrency
    /// Fire-and-forget coroutine body; yields the invoked coroutine handle.
    Branch(ExprId),
    Concurrent {
        policy: ConcurrencyPolicy,
        branches: ExprRange,
    },
}

impl ExprKind {
    pub fn real(value: f64) -> Self {
        ExprKind::Real(value.to_bits())
    }
}

/// Whether a callable runs to completion or may suspend.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CallableKind {
    Method,
    Coroutine,
}

/// Completion policy of a concurrent group.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ConcurrencyPolicy {
    /// Complete when every branch has completed.
    Sync,
    /// Complete with the first branch; stop the rest.
    Race,
    /// Complete with the first branch; leave the rest running detached.
    Any,
}

impl ConcurrencyPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ConcurrencyPolicy::Sync => "sync",
            ConcurrencyPolicy::Race => "race",
            ConcurrencyPolicy::Any => "any",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    /// `and`/`or` evaluate their right operand only when needed.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Name of the method the operator dispatches to.
    pub fn method_name(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "subtract",
            BinaryOp::Mul => "multiply",
            BinaryOp::Div => "divide",
            BinaryOp::Rem => "remainder",
            BinaryOp::Eq => "equals",
            BinaryOp::NotEq => "not_equals",
            BinaryOp::Lt => "less",
            BinaryOp::LtEq => "less_or_equal",
            BinaryOp::Gt => "greater",
            BinaryOp::GtEq => "greater_or_equal",
        }
    }

    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "~=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn method_name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "negated",
            UnaryOp::Not => "not",
        }
    }
}

/// Call argument, optionally named.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CallArg {
    pub name: Option<Symbol>,
    pub value: ExprId,
}

/// Parameter of a member or closure.
///
/// `default` is evaluated lazily in the callee's frame when the argument is
/// omitted; `ty` names the class the argument must conform to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Param {
    pub name: Symbol,
    pub ty: Option<Symbol>,
    pub default: Option<ExprId>,
}

/// One `test => body` arm of a conditional.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Clause {
    pub test: ExprId,
    pub body: ExprId,
}

//! Expression arena.
//!
//! Struct-of-arrays storage: `kinds` and `durational` are parallel arrays
//! indexed by [`ExprId`]; child lists, arguments, parameters and clauses live
//! in flat side tables addressed by ranges.

// Arc is needed for SharedArena: member bodies keep their arena alive and a
// loaded arena may be handed to runtimes on other threads.
#![expect(
    clippy::disallowed_types,
    reason = "Arc required for SharedArena"
)]

use std::fmt;
use std::sync::Arc;

use crate::{
    ArgRange, CallArg, Clause, ClauseRange, ExprId, ExprKind, ExprRange, Param, ParamRange,
};

#[inline]
fn to_u32(len: usize, what: &str) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("arena overflow: too many {what}"))
}

#[inline]
fn to_u16(len: usize, what: &str) -> u16 {
    u16::try_from(len).unwrap_or_else(|_| panic!("arena overflow: {what} longer than {}", u16::MAX))
}

/// Flat storage for expression trees.
///
/// Children must be allocated before their parents, which lets `alloc`
/// compute the `durational` flag bottom-up in one step.
#[derive(Clone, Default)]
pub struct ExprArena {
    kinds: Vec<ExprKind>,
    /// Whether evaluating the node may suspend a coroutine (parallel with kinds).
    durational: Vec<bool>,
    expr_lists: Vec<ExprId>,
    args: Vec<CallArg>,
    params: Vec<Param>,
    clauses: Vec<Clause>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node, returning its ID.
    pub fn alloc(&mut self, kind: ExprKind) -> ExprId {
        let durational = self.may_suspend(&kind);
        let id = ExprId::new(to_u32(self.kinds.len(), "expressions"));
        self.kinds.push(kind);
        self.durational.push(durational);
        id
    }

    #[inline]
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.kinds[id.index()]
    }

    /// Whether evaluating `id` may suspend the running coroutine.
    #[inline]
    pub fn is_durational(&self, id: ExprId) -> bool {
        self.durational[id.index()]
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn push_expr_list(&mut self, ids: &[ExprId]) -> ExprRange {
        if ids.is_empty() {
            return ExprRange::EMPTY;
        }
        let start = to_u32(self.expr_lists.len(), "expression lists");
        self.expr_lists.extend_from_slice(ids);
        ExprRange::new(start, to_u16(ids.len(), "expression list"))
    }

    pub fn push_args(&mut self, args: &[CallArg]) -> ArgRange {
        if args.is_empty() {
            return ArgRange::EMPTY;
        }
        let start = to_u32(self.args.len(), "call arguments");
        self.args.extend_from_slice(args);
        ArgRange::new(start, to_u16(args.len(), "argument list"))
    }

    pub fn push_params(&mut self, params: &[Param]) -> ParamRange {
        if params.is_empty() {
            return ParamRange::EMPTY;
        }
        let start = to_u32(self.params.len(), "parameters");
        self.params.extend_from_slice(params);
        ParamRange::new(start, to_u16(params.len(), "parameter list"))
    }

    pub fn push_clauses(&mut self, clauses: &[Clause]) -> ClauseRange {
        if clauses.is_empty() {
            return ClauseRange::EMPTY;
        }
        let start = to_u32(self.clauses.len(), "clauses");
        self.clauses.extend_from_slice(clauses);
        ClauseRange::new(start, to_u16(clauses.len(), "clause list"))
    }

    #[inline]
    pub fn expr_list(&self, range: ExprRange) -> &[ExprId] {
        &self.expr_lists[range.as_range()]
    }

    #[inline]
    pub fn args(&self, range: ArgRange) -> &[CallArg] {
        &self.args[range.as_range()]
    }

    #[inline]
    pub fn params(&self, range: ParamRange) -> &[Param] {
        &self.params[range.as_range()]
    }

    #[inline]
    pub fn clauses(&self, range: ClauseRange) -> &[Clause] {
        &self.clauses[range.as_range()]
    }

    fn any_durational(&self, ids: &[ExprId]) -> bool {
        ids.iter().any(|id| self.is_durational(*id))
    }

    fn args_durational(&self, range: ArgRange) -> bool {
        self.args(range).iter().any(|arg| self.is_durational(arg.value))
    }

    fn may_suspend(&self, kind: &ExprKind) -> bool {
        match *kind {
            ExprKind::Nil
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Real(_)
            | ExprKind::Str(_)
            | ExprKind::SymbolLit(_)
            | ExprKind::This
            | ExprKind::Ident(_)
            // Closure bodies and branches run in their own frames.
            | ExprKind::Closure { .. }
            | ExprKind::Branch(_) => false,

            // A closure value is only known at runtime to be a coroutine.
            ExprKind::CoroutineCall { .. }
            | ExprKind::Concurrent { .. }
            | ExprKind::InvokeClosure { .. } => true,

            ExprKind::Let { init: value, .. } | ExprKind::Assign { value, .. } => {
                self.is_durational(value)
            }
            ExprKind::Binary { left, right, .. } => {
                self.is_durational(left) || self.is_durational(right)
            }
            ExprKind::Unary { operand, .. } => self.is_durational(operand),
            ExprKind::MethodCall { receiver, args, .. } => {
                receiver.is_some_and(|r| self.is_durational(r)) || self.args_durational(args)
            }
            ExprKind::Instantiate { args, .. } => self.args_durational(args),
            ExprKind::Conditional {
                clauses,
                else_branch,
            } => {
                self.clauses(clauses)
                    .iter()
                    .any(|c| self.is_durational(c.test) || self.is_durational(c.body))
                    || else_branch.is_some_and(|e| self.is_durational(e))
            }
            ExprKind::Block(range) | ExprKind::List { elements: range, .. } => {
                self.any_durational(self.expr_list(range))
            }
            ExprKind::Loop(body) => self.is_durational(body),
            ExprKind::LoopExit(value) => value.is_some_and(|v| self.is_durational(v)),
            ExprKind::Guard { body, handler, .. } => {
                self.is_durational(body) || self.is_durational(handler)
            }
        }
    }
}

impl fmt::Debug for ExprArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprArena")
            .field("exprs", &self.kinds.len())
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

/// Immutable, shareable expression arena.
#[derive(Clone, Debug)]
pub struct SharedArena(Arc<ExprArena>);

impl SharedArena {
    pub fn new(arena: ExprArena) -> Self {
        SharedArena(Arc::new(arena))
    }

    /// True when both handles share storage.
    pub fn ptr_eq(&self, other: &SharedArena) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for SharedArena {
    fn default() -> Self {
        SharedArena::new(ExprArena::new())
    }
}

impl std::ops::Deref for SharedArena {
    type Target = ExprArena;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

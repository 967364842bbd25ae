//! Member descriptors: what dispatch resolves a name to.
//!
//! Scripted and native members share one descriptor type, so dispatch does
//! not care which kind of body it found.

use std::fmt;

use brook_ir::{CallableKind, ExprId, ParamRange, SharedArena, Symbol};

use super::ClassId;
use crate::errors::{EvalError, EvalResult};
use crate::mind::{CoroutineContext, Poll};
use crate::{Instance, Interpreter};

/// Native method: runs to completion against `this` with positional arguments.
pub type NativeMethodFn = fn(&mut Interpreter, &Instance, &[Instance]) -> EvalResult;

/// Native coroutine: polled once per resumption until it returns `Poll::Ready`.
pub type NativeCoroutineFn = fn(&mut CoroutineContext<'_>) -> Result<Poll, EvalError>;

#[derive(Clone)]
pub enum MemberBody {
    Script {
        arena: SharedArena,
        params: ParamRange,
        body: ExprId,
    },
    NativeMethod {
        params: Vec<Symbol>,
        func: NativeMethodFn,
    },
    NativeCoroutine {
        params: Vec<Symbol>,
        func: NativeCoroutineFn,
    },
}

impl fmt::Debug for MemberBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberBody::Script { params, body, .. } => f
                .debug_struct("Script")
                .field("params", params)
                .field("body", body)
                .finish_non_exhaustive(),
            MemberBody::NativeMethod { params, .. } => {
                write!(f, "NativeMethod(arity={})", params.len())
            }
            MemberBody::NativeCoroutine { params, .. } => {
                write!(f, "NativeCoroutine(arity={})", params.len())
            }
        }
    }
}

/// Declaration of a member, before registration assigns its owner.
#[derive(Clone, Debug)]
pub struct MemberDecl {
    pub name: Symbol,
    pub kind: CallableKind,
    pub body: MemberBody,
}

impl MemberDecl {
    pub fn method(name: Symbol, arena: &SharedArena, params: ParamRange, body: ExprId) -> Self {
        Self {
            name,
            kind: CallableKind::Method,
            body: MemberBody::Script {
                arena: arena.clone(),
                params,
                body,
            },
        }
    }

    pub fn coroutine(name: Symbol, arena: &SharedArena, params: ParamRange, body: ExprId) -> Self {
        Self {
            name,
            kind: CallableKind::Coroutine,
            body: MemberBody::Script {
                arena: arena.clone(),
                params,
                body,
            },
        }
    }

    pub fn native_method(name: Symbol, params: Vec<Symbol>, func: NativeMethodFn) -> Self {
        Self {
            name,
            kind: CallableKind::Method,
            body: MemberBody::NativeMethod { params, func },
        }
    }

    pub fn native_coroutine(name: Symbol, params: Vec<Symbol>, func: NativeCoroutineFn) -> Self {
        Self {
            name,
            kind: CallableKind::Coroutine,
            body: MemberBody::NativeCoroutine { params, func },
        }
    }
}

/// A registered member.
#[derive(Debug)]
pub struct MemberDescriptor {
    pub name: Symbol,
    /// Class that declares this member.
    pub owner: ClassId,
    pub kind: CallableKind,
    pub body: MemberBody,
}

impl MemberDescriptor {
    pub(crate) fn from_decl(decl: MemberDecl, owner: ClassId) -> Self {
        Self {
            name: decl.name,
            owner,
            kind: decl.kind,
            body: decl.body,
        }
    }

    pub fn is_native(&self) -> bool {
        !matches!(self.body, MemberBody::Script { .. })
    }

    pub fn is_coroutine(&self) -> bool {
        self.kind == CallableKind::Coroutine
    }
}

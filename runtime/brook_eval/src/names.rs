//! Pre-interned symbols for hot-path dispatch.
//!
//! Interned once when the interpreter is built so that operator dispatch,
//! lifecycle lookups and core-class checks compare `u32`s instead of hashing
//! strings.

use brook_ir::{BinaryOp, SymbolTable, Symbol, UnaryOp};

/// Names of the built-in classes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClassNames {
    pub(crate) object: Symbol,
    pub(crate) none: Symbol,
    pub(crate) boolean: Symbol,
    pub(crate) integer: Symbol,
    pub(crate) real: Symbol,
    pub(crate) string: Symbol,
    pub(crate) symbol: Symbol,
    pub(crate) list: Symbol,
    pub(crate) closure: Symbol,
    pub(crate) class: Symbol,
    pub(crate) invoked_coroutine: Symbol,
}

impl ClassNames {
    pub(crate) fn new(symbols: &SymbolTable) -> Self {
        Self {
            object: symbols.intern("Object"),
            none: symbols.intern("None"),
            boolean: symbols.intern("Boolean"),
            integer: symbols.intern("Integer"),
            real: symbols.intern("Real"),
            string: symbols.intern("String"),
            symbol: symbols.intern("Symbol"),
            list: symbols.intern("List"),
            closure: symbols.intern("Closure"),
            class: symbols.intern("Class"),
            invoked_coroutine: symbols.intern("InvokedCoroutine"),
        }
    }
}

/// Member names the runtime looks up itself.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MemberNames {
    pub(crate) constructor: Symbol,
    pub(crate) destructor: Symbol,
    binary: [Symbol; 13],
    pub(crate) negated: Symbol,
    pub(crate) not: Symbol,
    /// Frame names for anonymous coroutine bodies.
    pub(crate) branch: Symbol,
    pub(crate) closure: Symbol,
    pub(crate) sync: Symbol,
    pub(crate) race: Symbol,
    pub(crate) any: Symbol,
}

const BINARY_OPS: [BinaryOp; 13] = [
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::Rem,
    BinaryOp::Eq,
    BinaryOp::NotEq,
    BinaryOp::Lt,
    BinaryOp::LtEq,
    BinaryOp::Gt,
    BinaryOp::GtEq,
];

impl MemberNames {
    pub(crate) fn new(symbols: &SymbolTable) -> Self {
        Self {
            constructor: symbols.intern("!"),
            destructor: symbols.intern("!!"),
            binary: BINARY_OPS.map(|op| symbols.intern(op.method_name())),
            negated: symbols.intern(UnaryOp::Neg.method_name()),
            not: symbols.intern(UnaryOp::Not.method_name()),
            branch: symbols.intern("branch"),
            closure: symbols.intern("closure"),
            sync: symbols.intern("sync"),
            race: symbols.intern("race"),
            any: symbols.intern("any"),
        }
    }

    #[inline]
    pub(crate) fn binary(&self, op: BinaryOp) -> Symbol {
        let idx = BINARY_OPS.iter().position(|o| *o == op).unwrap_or(0);
        self.binary[idx]
    }

    #[inline]
    pub(crate) fn unary(&self, op: UnaryOp) -> Symbol {
        match op {
            UnaryOp::Neg => self.negated,
            UnaryOp::Not => self.not,
        }
    }
}

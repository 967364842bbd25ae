//! Brook IR - symbols and expression trees
//!
//! This crate contains the data structures shared between whatever front end
//! produces Brook code and the runtime that evaluates it:
//! - `Symbol` handles and the sharded `SymbolTable` that owns their text
//! - Flat expression trees (`ExprKind` nodes in an `ExprArena`)
//! - `ExprBuilder`, the programmatic producer of expression trees
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: identifiers and string literals are `Symbol(u32)`
//! - **Flatten Everything**: no `Box<Expr>`, children are `ExprId(u32)` indices
//! - **Precompute Suspension**: every node records whether it may suspend a
//!   coroutine, so the evaluator never has to walk a subtree to find out
//!
//! Types that contain floats store them as u64 bits for Hash compatibility.

mod arena;
mod builder;
mod expr;
mod expr_id;
mod interner;
mod symbol;

pub use arena::{ExprArena, SharedArena};
pub use builder::ExprBuilder;
pub use expr::{BinaryOp, CallArg, CallableKind, Clause, ConcurrencyPolicy, ExprKind, Param, UnaryOp};
pub use expr_id::{ArgRange, ClauseRange, ExprId, ExprRange, ParamRange};
pub use interner::{SharedSymbols, SymbolError, SymbolTable};
pub use symbol::Symbol;

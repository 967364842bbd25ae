//! Helpers for declaring scripted classes in unit tests.

use brook_ir::{ExprBuilder, ExprId, ParamRange};

use crate::class::{ClassDecl, ClassId, MemberDecl};
use crate::Interpreter;

/// A scripted member, built before the arena is frozen.
pub(crate) struct Def {
    name: &'static str,
    coroutine: bool,
    params: ParamRange,
    body: ExprId,
}

pub(crate) fn method(name: &'static str, params: ParamRange, body: ExprId) -> Def {
    Def {
        name,
        coroutine: false,
        params,
        body,
    }
}

pub(crate) fn coroutine(name: &'static str, params: ParamRange, body: ExprId) -> Def {
    Def {
        name,
        coroutine: true,
        params,
        body,
    }
}

/// Class-level declarations other than members.
pub(crate) enum Field {
    Super(&'static str),
    /// Instance data member and its class.
    Data(&'static str, &'static str),
    /// Class data and its class.
    Shared(&'static str, &'static str),
}

/// Register `name` with `fields` and the members `build` returns.
pub(crate) fn register(
    interp: &mut Interpreter,
    name: &str,
    fields: &[Field],
    build: impl FnOnce(&mut ExprBuilder<'_>) -> Vec<Def>,
) -> ClassId {
    let symbols = interp.symbols().clone();
    let mut b = ExprBuilder::new(&symbols);
    let defs = build(&mut b);
    let arena = b.finish();

    let mut decl = ClassDecl::new(symbols.intern(name));
    for field in fields {
        decl = match field {
            Field::Super(sup) => decl.supertype(symbols.intern(sup)),
            Field::Data(n, class) => decl.data(symbols.intern(n), symbols.intern(class)),
            Field::Shared(n, class) => decl.class_data(symbols.intern(n), symbols.intern(class)),
        };
    }
    for def in defs {
        let member = symbols.intern(def.name);
        decl = decl.member(if def.coroutine {
            MemberDecl::coroutine(member, &arena, def.params, def.body)
        } else {
            MemberDecl::method(member, &arena, def.params, def.body)
        });
    }
    interp.register_class(decl).unwrap()
}

/// Build a standalone expression.
pub(crate) fn expr(
    interp: &Interpreter,
    build: impl FnOnce(&mut ExprBuilder<'_>) -> ExprId,
) -> (brook_ir::SharedArena, ExprId) {
    let symbols = interp.symbols().clone();
    let mut b = ExprBuilder::new(&symbols);
    let root = build(&mut b);
    (b.finish(), root)
}

/// Integer value of `name` on `instance`.
pub(crate) fn int_field(interp: &Interpreter, instance: &crate::Instance, name: &str) -> Option<i64> {
    interp.data_member(instance, name).and_then(|v| v.as_int())
}

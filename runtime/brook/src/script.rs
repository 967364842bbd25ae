//! Programmatic class scripts.
//!
//! Hosts that embed Brook without a source front end declare classes through
//! [`ClassScript`]: every member body is built into one arena, which `finish`
//! freezes and attaches to the members.

use brook_eval::{ClassDecl, MemberDecl};
use brook_ir::{ExprBuilder, ExprId, ParamRange, SharedArena, Symbol, SymbolTable};

struct ScriptMember {
    name: Symbol,
    coroutine: bool,
    params: ParamRange,
    body: ExprId,
}

/// A class declaration whose members are built as expression trees.
///
/// ```ignore
/// let decl = ClassScript::new(&symbols, "Counter")
///     .data("n", "Integer")
///     .method("increment", |b| {
///         let n = b.ident("n");
///         let one = b.int(1);
///         let sum = b.binary(BinaryOp::Add, n, one);
///         (b.params(&[]), b.assign("n", sum))
///     })
///     .finish();
/// interp.register_class(decl)?;
/// ```
pub struct ClassScript<'s> {
    symbols: &'s SymbolTable,
    exprs: ExprBuilder<'s>,
    decl: ClassDecl,
    members: Vec<ScriptMember>,
}

impl<'s> ClassScript<'s> {
    pub fn new(symbols: &'s SymbolTable, name: &str) -> Self {
        ClassScript {
            symbols,
            exprs: ExprBuilder::new(symbols),
            decl: ClassDecl::new(symbols.intern(name)),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn supertype(mut self, name: &str) -> Self {
        self.decl = self.decl.supertype(self.symbols.intern(name));
        self
    }

    /// Instance data member of class `class`.
    #[must_use]
    pub fn data(mut self, name: &str, class: &str) -> Self {
        self.decl = self
            .decl
            .data(self.symbols.intern(name), self.symbols.intern(class));
        self
    }

    /// Class data shared by every instance of the class.
    #[must_use]
    pub fn class_data(mut self, name: &str, class: &str) -> Self {
        self.decl = self
            .decl
            .class_data(self.symbols.intern(name), self.symbols.intern(class));
        self
    }

    /// Add a method; `build` returns its parameters and body.
    #[must_use]
    pub fn method(
        self,
        name: &str,
        build: impl FnOnce(&mut ExprBuilder<'s>) -> (ParamRange, ExprId),
    ) -> Self {
        self.add(name, false, build)
    }

    /// Add a coroutine; `build` returns its parameters and body.
    #[must_use]
    pub fn coroutine(
        self,
        name: &str,
        build: impl FnOnce(&mut ExprBuilder<'s>) -> (ParamRange, ExprId),
    ) -> Self {
        self.add(name, true, build)
    }

    /// Add a native member declared elsewhere.
    #[must_use]
    pub fn native(mut self, member: MemberDecl) -> Self {
        self.decl = self.decl.member(member);
        self
    }

    fn add(
        mut self,
        name: &str,
        coroutine: bool,
        build: impl FnOnce(&mut ExprBuilder<'s>) -> (ParamRange, ExprId),
    ) -> Self {
        let (params, body) = build(&mut self.exprs);
        self.members.push(ScriptMember {
            name: self.symbols.intern(name),
            coroutine,
            params,
            body,
        });
        self
    }

    /// Freeze the arena and produce the declaration.
    pub fn finish(self) -> ClassDecl {
        let arena = self.exprs.finish();
        let mut decl = self.decl;
        for m in self.members {
            decl = decl.member(if m.coroutine {
                MemberDecl::coroutine(m.name, &arena, m.params, m.body)
            } else {
                MemberDecl::method(m.name, &arena, m.params, m.body)
            });
        }
        decl
    }
}

/// Build a standalone expression, e.g. for `Interpreter::evaluate`.
pub fn expression(
    symbols: &SymbolTable,
    build: impl FnOnce(&mut ExprBuilder<'_>) -> ExprId,
) -> (SharedArena, ExprId) {
    let mut exprs = ExprBuilder::new(symbols);
    let root = build(&mut exprs);
    (exprs.finish(), root)
}

//! Programmatic construction of expression trees.
//!
//! `ExprBuilder` is what a front end (or a test, or a host embedding scripts
//! without source text) uses to produce an arena. Children are built first
//! and passed to their parents by id.

use crate::{
    BinaryOp, CallArg, CallableKind, Clause, ConcurrencyPolicy, ExprArena, ExprId, ExprKind,
    Param, ParamRange, SharedArena, Symbol, SymbolTable, UnaryOp,
};

pub struct ExprBuilder<'s> {
    arena: ExprArena,
    symbols: &'s SymbolTable,
}

impl<'s> ExprBuilder<'s> {
    pub fn new(symbols: &'s SymbolTable) -> Self {
        ExprBuilder {
            arena: ExprArena::new(),
            symbols,
        }
    }

    #[inline]
    pub fn sym(&self, text: &str) -> Symbol {
        self.symbols.intern(text)
    }

    pub fn arena(&self) -> &ExprArena {
        &self.arena
    }

    pub fn finish(self) -> SharedArena {
        SharedArena::new(self.arena)
    }

    fn alloc(&mut self, kind: ExprKind) -> ExprId {
        self.arena.alloc(kind)
    }

    fn positional(&mut self, args: &[ExprId]) -> crate::ArgRange {
        let args: Vec<CallArg> = args
            .iter()
            .map(|value| CallArg {
                name: None,
                value: *value,
            })
            .collect();
        self.arena.push_args(&args)
    }

    // Literals

    pub fn nil(&mut self) -> ExprId {
        self.alloc(ExprKind::Nil)
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        self.alloc(ExprKind::Bool(value))
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.alloc(ExprKind::Int(value))
    }

    pub fn real(&mut self, value: f64) -> ExprId {
        self.alloc(ExprKind::real(value))
    }

    pub fn string(&mut self, text: &str) -> ExprId {
        let sym = self.sym(text);
        self.alloc(ExprKind::Str(sym))
    }

    pub fn symbol(&mut self, text: &str) -> ExprId {
        let sym = self.sym(text);
        self.alloc(ExprKind::SymbolLit(sym))
    }

    pub fn this(&mut self) -> ExprId {
        self.alloc(ExprKind::This)
    }

    // Bindings

    pub fn ident(&mut self, name: &str) -> ExprId {
        let name = self.sym(name);
        self.alloc(ExprKind::Ident(name))
    }

    pub fn let_(&mut self, name: &str, init: ExprId) -> ExprId {
        let name = self.sym(name);
        self.alloc(ExprKind::Let { name, init })
    }

    pub fn assign(&mut self, name: &str, value: ExprId) -> ExprId {
        let name = self.sym(name);
        self.alloc(ExprKind::Assign { name, value })
    }

    // Operators

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.alloc(ExprKind::Binary { op, left, right })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.alloc(ExprKind::Unary { op, operand })
    }

    // Calls

    pub fn call(&mut self, receiver: Option<ExprId>, method: &str, args: &[ExprId]) -> ExprId {
        let method = self.sym(method);
        let args = self.positional(args);
        self.alloc(ExprKind::MethodCall {
            receiver,
            method,
            args,
            qualifier: None,
        })
    }

    /// Call with a mix of positional (`None`) and named arguments.
    pub fn call_named(
        &mut self,
        receiver: Option<ExprId>,
        method: &str,
        args: &[(Option<&str>, ExprId)],
    ) -> ExprId {
        let method = self.sym(method);
        let args: Vec<CallArg> = args
            .iter()
            .map(|(name, value)| CallArg {
                name: name.map(|n| self.sym(n)),
                value: *value,
            })
            .collect();
        let args = self.arena.push_args(&args);
        self.alloc(ExprKind::MethodCall {
            receiver,
            method,
            args,
            qualifier: None,
        })
    }

    /// `receiver.Class@method(args)`: dispatch starting at `class`.
    pub fn qualified_call(
        &mut self,
        receiver: Option<ExprId>,
        class: &str,
        method: &str,
        args: &[ExprId],
    ) -> ExprId {
        let qualifier = Some(self.sym(class));
        let method = self.sym(method);
        let args = self.positional(args);
        self.alloc(ExprKind::MethodCall {
            receiver,
            method,
            args,
            qualifier,
        })
    }

    pub fn coroutine(&mut self, receiver: Option<ExprId>, name: &str, args: &[ExprId]) -> ExprId {
        let coroutine = self.sym(name);
        let args = self.positional(args);
        self.alloc(ExprKind::CoroutineCall {
            receiver,
            coroutine,
            args,
            qualifier: None,
        })
    }

    pub fn qualified_coroutine(
        &mut self,
        receiver: Option<ExprId>,
        class: &str,
        name: &str,
        args: &[ExprId],
    ) -> ExprId {
        let qualifier = Some(self.sym(class));
        let coroutine = self.sym(name);
        let args = self.positional(args);
        self.alloc(ExprKind::CoroutineCall {
            receiver,
            coroutine,
            args,
            qualifier,
        })
    }

    pub fn invoke(&mut self, callee: ExprId, args: &[ExprId]) -> ExprId {
        let args = self.positional(args);
        self.alloc(ExprKind::InvokeClosure { callee, args })
    }

    pub fn instantiate(&mut self, class: &str, args: &[ExprId]) -> ExprId {
        let class = self.sym(class);
        let args = self.positional(args);
        self.alloc(ExprKind::Instantiate { class, args })
    }

    // Control

    pub fn cond(&mut self, clauses: &[(ExprId, ExprId)], else_branch: Option<ExprId>) -> ExprId {
        let clauses: Vec<Clause> = clauses
            .iter()
            .map(|(test, body)| Clause {
                test: *test,
                body: *body,
            })
            .collect();
        let clauses = self.arena.push_clauses(&clauses);
        self.alloc(ExprKind::Conditional {
            clauses,
            else_branch,
        })
    }

    pub fn if_(&mut self, test: ExprId, then: ExprId, otherwise: Option<ExprId>) -> ExprId {
        self.cond(&[(test, then)], otherwise)
    }

    pub fn block(&mut self, exprs: &[ExprId]) -> ExprId {
        let range = self.arena.push_expr_list(exprs);
        self.alloc(ExprKind::Block(range))
    }

    pub fn loop_(&mut self, body: ExprId) -> ExprId {
        self.alloc(ExprKind::Loop(body))
    }

    pub fn loop_exit(&mut self, value: Option<ExprId>) -> ExprId {
        self.alloc(ExprKind::LoopExit(value))
    }

    pub fn guard(&mut self, body: ExprId, error_var: &str, handler: ExprId) -> ExprId {
        let error_var = self.sym(error_var);
        self.alloc(ExprKind::Guard {
            body,
            error_var,
            handler,
        })
    }

    // Values

    /// Parameters as `(name, declared class, default)` triples.
    pub fn params(&mut self, params: &[(&str, Option<&str>, Option<ExprId>)]) -> ParamRange {
        let params: Vec<Param> = params
            .iter()
            .map(|(name, ty, default)| Param {
                name: self.sym(name),
                ty: ty.map(|t| self.sym(t)),
                default: *default,
            })
            .collect();
        self.arena.push_params(&params)
    }

    pub fn closure(&mut self, params: ParamRange, body: ExprId, kind: CallableKind) -> ExprId {
        self.alloc(ExprKind::Closure { params, body, kind })
    }

    pub fn list(&mut self, item_class: &str, elements: &[ExprId]) -> ExprId {
        let item_class = self.sym(item_class);
        let elements = self.arena.push_expr_list(elements);
        self.alloc(ExprKind::List {
            item_class,
            elements,
        })
    }

    // Concurrency

    pub fn branch(&mut self, body: ExprId) -> ExprId {
        self.alloc(ExprKind::Branch(body))
    }

    pub fn concurrent(&mut self, policy: ConcurrencyPolicy, branches: &[ExprId]) -> ExprId {
        let branches = self.arena.push_expr_list(branches);
        self.alloc(ExprKind::Concurrent { policy, branches })
    }
}

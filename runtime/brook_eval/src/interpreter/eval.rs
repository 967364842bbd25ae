//! Immediate evaluation of expression nodes.
//!
//! `eval` runs a node to completion. Nodes that may suspend are rejected
//! with `DurationalInImmediate`; inside coroutines the continuation machine
//! takes them apart and only hands their immediate pieces to `eval`.

use brook_ir::{BinaryOp, ExprId, ExprKind, Symbol, UnaryOp};

use super::{ArgValues, Interpreter};
use crate::errors::{
    durational_in_immediate, type_mismatch, undefined_variable, ControlFlow, EvalError,
    EvalResult,
};
use crate::object::{Closure, Payload};
use crate::stack::ensure_sufficient_stack;
use crate::Instance;

impl Interpreter {
    /// Evaluate `id` in the current frame context.
    #[inline]
    pub(crate) fn eval(&mut self, id: ExprId) -> EvalResult {
        ensure_sufficient_stack(|| self.eval_inner(id))
    }

    fn eval_inner(&mut self, id: ExprId) -> EvalResult {
        let arena = self.ctx.arena.clone();
        match *arena.kind(id) {
            ExprKind::Nil => Ok(self.none()),
            ExprKind::Bool(b) => Ok(self.boolean(b)),
            ExprKind::Int(i) => Ok(self.integer(i)),
            ExprKind::Real(bits) => Ok(self.real(f64::from_bits(bits))),
            ExprKind::Str(text) => Ok(self.string(self.symbols.text_of(text))),
            ExprKind::SymbolLit(sym) => Ok(self.symbol(sym)),
            ExprKind::This => Ok(self.ctx.this.clone()),

            ExprKind::Ident(name) => self.lookup_variable(name),
            ExprKind::Let { name, init } => {
                let value = self.eval(init)?;
                self.ctx.env.define(name, value.clone());
                Ok(value)
            }
            ExprKind::Assign { name, value } => {
                let value = self.eval(value)?;
                self.assign_variable(name, value.clone())?;
                Ok(value)
            }

            ExprKind::Binary { op, left, right } if op.is_short_circuit() => {
                let left = self.eval(left)?;
                let decided = self.expect_bool(&left)?;
                if (op == BinaryOp::And) != decided {
                    return Ok(self.boolean(decided));
                }
                let right = self.eval(right)?;
                let b = self.expect_bool(&right)?;
                Ok(self.boolean(b))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary_op(op, left, right)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                self.unary_op(op, operand)
            }

            ExprKind::MethodCall {
                receiver,
                method,
                args,
                qualifier,
            } => {
                let receiver = match receiver {
                    Some(r) => self.eval(r)?,
                    None => self.ctx.this.clone(),
                };
                let args = self.eval_args(args)?;
                self.call_method(receiver, method, qualifier, args)
            }
            ExprKind::CoroutineCall { coroutine, .. } => {
                Err(durational_in_immediate(self.symbols.text_of(coroutine)))
            }
            ExprKind::InvokeClosure { callee, args } => {
                let callee = self.eval(callee)?;
                let args = self.eval_args(args)?;
                self.invoke_closure_now(&callee, args)
            }
            ExprKind::Instantiate { class, args } => {
                let args = self.eval_args(args)?;
                self.instantiate(class, args)
            }

            ExprKind::Conditional {
                clauses,
                else_branch,
            } => {
                for clause in arena.clauses(clauses) {
                    let test = self.eval(clause.test)?;
                    if self.expect_bool(&test)? {
                        return self.eval(clause.body);
                    }
                }
                match else_branch {
                    Some(otherwise) => self.eval(otherwise),
                    None => Ok(self.none()),
                }
            }
            ExprKind::Block(range) => {
                let exprs = arena.expr_list(range);
                if exprs.is_empty() {
                    return Ok(self.none());
                }
                self.ctx.env.push_scope();
                let result = self.eval_block(exprs);
                self.ctx.env.pop_scope();
                result
            }
            ExprKind::Loop(body) => {
                let depth = self.ctx.env.depth();
                loop {
                    match self.eval(body) {
                        Ok(_) => {}
                        Err(err) => {
                            self.ctx.env.truncate(depth);
                            if let Some(ControlFlow::LoopExit(value)) = &err.control_flow {
                                return Ok(value.clone());
                            }
                            return Err(err);
                        }
                    }
                }
            }
            ExprKind::LoopExit(value) => {
                let value = match value {
                    Some(v) => self.eval(v)?,
                    None => self.none(),
                };
                Err(EvalError::loop_exit(value))
            }
            ExprKind::Guard {
                body,
                error_var,
                handler,
            } => {
                let depth = self.ctx.env.depth();
                match self.eval(body) {
                    Err(err) if !err.is_control_flow() => {
                        tracing::debug!(error = %err, "guard recovered error");
                        self.ctx.env.truncate(depth);
                        self.ctx.env.push_scope();
                        let message = self.string(err.message);
                        self.ctx.env.define(error_var, message);
                        let result = self.eval(handler);
                        self.ctx.env.pop_scope();
                        result
                    }
                    other => other,
                }
            }

            ExprKind::Closure { params, body, kind } => {
                let closure = Closure {
                    kind,
                    arena: self.ctx.arena.clone(),
                    params,
                    body,
                    scope: self.ctx.env.current_scope(),
                    this: self.ctx.this.clone(),
                    this_class: self.ctx.this_class,
                };
                Ok(Instance::new(
                    self.core.closure,
                    Payload::Closure(closure),
                    Vec::new(),
                ))
            }
            ExprKind::List {
                item_class,
                elements,
            } => {
                let items = arena
                    .expr_list(elements)
                    .iter()
                    .map(|e| self.eval(*e))
                    .collect::<Result<Vec<_>, _>>()?;
                self.make_list(item_class, items)
            }

            ExprKind::Branch(body) => {
                let handle = self.spawn_branch(body)?;
                Ok(self.handle_instance(&handle))
            }
            ExprKind::Concurrent { policy, .. } => Err(durational_in_immediate(policy.as_str())),
        }
    }

    fn eval_block(&mut self, exprs: &[ExprId]) -> EvalResult {
        let mut last = self.none();
        for expr in exprs {
            last = self.eval(*expr)?;
        }
        Ok(last)
    }

    fn eval_args(&mut self, args: brook_ir::ArgRange) -> Result<ArgValues, EvalError> {
        let arena = self.ctx.arena.clone();
        arena
            .args(args)
            .iter()
            .map(|arg| Ok((arg.name, self.eval(arg.value)?)))
            .collect()
    }

    /// Local, then data member of `this`, then class data.
    pub(crate) fn lookup_variable(&self, name: Symbol) -> EvalResult {
        if let Some(value) = self.ctx.env.lookup(name) {
            return Ok(value);
        }
        let this = &self.ctx.this;
        if let Some(value) = self
            .classes
            .slot_index(this.class(), name)
            .and_then(|index| this.slot(index))
        {
            return Ok(value);
        }
        self.class_data_slot(name)
            .and_then(|(owner, index)| self.classes.class_data(owner, index))
            .ok_or_else(|| undefined_variable(self.symbols.text_of(name)))
    }

    fn class_data_slot(&self, name: Symbol) -> Option<(crate::class::ClassId, usize)> {
        self.classes
            .class_data_slot(self.ctx.this.class(), name)
            .or_else(|| self.classes.class_data_slot(self.ctx.this_class, name))
    }

    /// Assign to a local, then a data member of `this`, then class data.
    ///
    /// Data members and class data keep their declared type; None is
    /// accepted for any of them.
    pub(crate) fn assign_variable(&mut self, name: Symbol, value: Instance) -> Result<(), EvalError> {
        let value = match self.ctx.env.assign(name, value) {
            Ok(()) => return Ok(()),
            Err(value) => value,
        };
        let this = self.ctx.this.clone();
        if let Some(index) = self.classes.slot_index(this.class(), name) {
            let declared = self.classes.layout(this.class())[index].class;
            if !self.is_none(&value) {
                self.check_type(&value, declared)?;
            }
            this.set_slot(index, value);
            return Ok(());
        }
        if let Some((owner, index)) = self.class_data_slot(name) {
            let declared = self.classes.class_data_decls(owner)[index].1;
            if !self.is_none(&value) {
                self.check_type(&value, declared)?;
            }
            let previous = self.classes.set_class_data(owner, index, value);
            drop(previous);
            return Ok(());
        }
        Err(undefined_variable(self.symbols.text_of(name)))
    }

    pub(crate) fn expect_bool(&self, value: &Instance) -> Result<bool, EvalError> {
        value
            .as_bool()
            .ok_or_else(|| type_mismatch("Boolean", self.class_name_of(value)))
    }

    /// Operators other than `and`/`or` are method calls on the left operand.
    pub(crate) fn binary_op(&mut self, op: BinaryOp, left: Instance, right: Instance) -> EvalResult {
        if op.is_short_circuit() {
            let l = self.expect_bool(&left)?;
            let r = self.expect_bool(&right)?;
            let value = if op == BinaryOp::And { l && r } else { l || r };
            return Ok(self.boolean(value));
        }
        let method = self.names.binary(op);
        let mut args = ArgValues::new();
        args.push((None, right));
        self.call_method(left, method, None, args)
    }

    pub(crate) fn unary_op(&mut self, op: UnaryOp, operand: Instance) -> EvalResult {
        let method = self.names.unary(op);
        self.call_method(operand, method, None, ArgValues::new())
    }

    /// `Class!(args)`: a new instance with its constructor run.
    pub(crate) fn instantiate(&mut self, class: Symbol, args: ArgValues) -> EvalResult {
        let class = self.lookup_class(class)?;
        self.construct(class, args)
    }

    pub(crate) fn make_list(&mut self, item_class: Symbol, items: Vec<Instance>) -> EvalResult {
        let item_class = self.lookup_class(item_class)?;
        self.list(item_class, items)
    }
}

//! Resumable evaluation of scripted coroutine bodies.
//!
//! Only nodes that may suspend are decomposed into tasks. Everything else is
//! handed to `Interpreter::eval` whole, so the continuation is as deep as the
//! chain of suspending nodes, not the whole tree.
//!
//! Tasks run from the top of `tasks`; each pushes its result on `values`.
//! Sub-expressions are pushed in reverse so they run left to right.

use brook_ir::{ArgRange, BinaryOp, ClauseRange, ExprArena, ExprId, ExprKind, Symbol, UnaryOp};

use super::{CoroutineHandle, FrameStatus, Wake};
use crate::errors::{ControlFlow, EvalError};
use crate::interpreter::{ArgValues, Invoked};
use crate::{Instance, Interpreter};

pub(crate) enum Step {
    Done(Instance),
    Suspend(Wake),
}

enum Task {
    Eval(ExprId),
    /// Drop the value of a non-final block expression.
    Discard,
    PopScope,
    Apply(Apply),
    ShortCircuit {
        op: BinaryOp,
        right: ExprId,
    },
    /// Right operand of `and`/`or` must be a Boolean.
    CheckBool,
    /// Test of clause `next` is on the value stack.
    Cond {
        clauses: ClauseRange,
        next: usize,
        else_branch: Option<ExprId>,
    },
    Loop {
        body: ExprId,
        depth: usize,
        height: usize,
    },
    Guard {
        error_var: Symbol,
        handler: ExprId,
        depth: usize,
        height: usize,
    },
    Await(CoroutineHandle),
}

/// Operation applied to already evaluated operands.
enum Apply {
    Let(Symbol),
    Assign(Symbol),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Method {
        has_receiver: bool,
        name: Symbol,
        args: ArgRange,
        qualifier: Option<Symbol>,
    },
    Coroutine {
        has_receiver: bool,
        name: Symbol,
        args: ArgRange,
        qualifier: Option<Symbol>,
    },
    InvokeClosure {
        args: ArgRange,
    },
    Instantiate {
        class: Symbol,
        args: ArgRange,
    },
    List {
        item_class: Symbol,
        len: usize,
    },
    LoopExit,
}

pub(crate) struct Continuation {
    tasks: Vec<Task>,
    values: Vec<Instance>,
}

impl Continuation {
    pub(crate) fn new(body: ExprId) -> Self {
        Self {
            tasks: vec![Task::Eval(body)],
            values: Vec::new(),
        }
    }

    /// Run until the body completes or suspends.
    pub(crate) fn run(&mut self, interp: &mut Interpreter) -> Result<Step, EvalError> {
        let arena = interp.ctx.arena.clone();
        while let Some(task) = self.tasks.pop() {
            match self.step(interp, &arena, task) {
                Ok(None) => {}
                Ok(Some(wake)) => return Ok(Step::Suspend(wake)),
                Err(err) => self.unwind(interp, err)?,
            }
        }
        let result = self.values.pop().unwrap_or_else(|| interp.none());
        self.values.clear();
        Ok(Step::Done(result))
    }

    fn pop(&mut self, interp: &Interpreter) -> Instance {
        self.values.pop().unwrap_or_else(|| interp.none())
    }

    fn pop_args(&mut self, arena: &ExprArena, args: ArgRange) -> ArgValues {
        let at = self.values.len().saturating_sub(args.len());
        let values = self.values.split_off(at);
        arena
            .args(args)
            .iter()
            .zip(values)
            .map(|(arg, value)| (arg.name, value))
            .collect()
    }

    fn push_args(&mut self, arena: &ExprArena, args: ArgRange) {
        for arg in arena.args(args).iter().rev() {
            self.tasks.push(Task::Eval(arg.value));
        }
    }

    fn step(
        &mut self,
        interp: &mut Interpreter,
        arena: &ExprArena,
        task: Task,
    ) -> Result<Option<Wake>, EvalError> {
        match task {
            Task::Eval(id) => return self.eval(interp, arena, id),
            Task::Discard => {
                self.values.pop();
            }
            Task::PopScope => interp.ctx.env.pop_scope(),
            Task::Apply(op) => return self.apply(interp, arena, op),
            Task::ShortCircuit { op, right } => {
                let left = self.pop(interp);
                let decided = interp.expect_bool(&left)?;
                if (op == BinaryOp::And) != decided {
                    self.values.push(interp.boolean(decided));
                } else {
                    self.tasks.push(Task::CheckBool);
                    self.tasks.push(Task::Eval(right));
                }
            }
            Task::CheckBool => {
                let value = self.pop(interp);
                let b = interp.expect_bool(&value)?;
                self.values.push(interp.boolean(b));
            }
            Task::Cond {
                clauses,
                next,
                else_branch,
            } => {
                let test = self.pop(interp);
                if interp.expect_bool(&test)? {
                    let body = arena.clauses(clauses)[next].body;
                    self.tasks.push(Task::Eval(body));
                } else {
                    self.next_clause(interp, arena, clauses, next + 1, else_branch);
                }
            }
            Task::Loop {
                body,
                depth,
                height,
            } => {
                self.values.truncate(height);
                self.tasks.push(Task::Loop {
                    body,
                    depth,
                    height,
                });
                self.tasks.push(Task::Eval(body));
            }
            // Body finished normally; its value stays.
            Task::Guard { .. } => {}
            Task::Await(handle) => return self.await_frame(interp, handle),
        }
        Ok(None)
    }

    fn next_clause(
        &mut self,
        interp: &Interpreter,
        arena: &ExprArena,
        clauses: ClauseRange,
        next: usize,
        else_branch: Option<ExprId>,
    ) {
        if let Some(clause) = arena.clauses(clauses).get(next) {
            self.tasks.push(Task::Cond {
                clauses,
                next,
                else_branch,
            });
            self.tasks.push(Task::Eval(clause.test));
        } else if let Some(otherwise) = else_branch {
            self.tasks.push(Task::Eval(otherwise));
        } else {
            self.values.push(interp.none());
        }
    }

    fn eval(
        &mut self,
        interp: &mut Interpreter,
        arena: &ExprArena,
        id: ExprId,
    ) -> Result<Option<Wake>, EvalError> {
        if !arena.is_durational(id) {
            let value = interp.eval(id)?;
            self.values.push(value);
            return Ok(None);
        }
        match *arena.kind(id) {
            ExprKind::Let { name, init } => {
                self.tasks.push(Task::Apply(Apply::Let(name)));
                self.tasks.push(Task::Eval(init));
            }
            ExprKind::Assign { name, value } => {
                self.tasks.push(Task::Apply(Apply::Assign(name)));
                self.tasks.push(Task::Eval(value));
            }
            ExprKind::Binary { op, left, right } if op.is_short_circuit() => {
                self.tasks.push(Task::ShortCircuit { op, right });
                self.tasks.push(Task::Eval(left));
            }
            ExprKind::Binary { op, left, right } => {
                self.tasks.push(Task::Apply(Apply::Binary(op)));
                self.tasks.push(Task::Eval(right));
                self.tasks.push(Task::Eval(left));
            }
            ExprKind::Unary { op, operand } => {
                self.tasks.push(Task::Apply(Apply::Unary(op)));
                self.tasks.push(Task::Eval(operand));
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
                qualifier,
            } => {
                self.tasks.push(Task::Apply(Apply::Method {
                    has_receiver: receiver.is_some(),
                    name: method,
                    args,
                    qualifier,
                }));
                self.push_args(arena, args);
                if let Some(receiver) = receiver {
                    self.tasks.push(Task::Eval(receiver));
                }
            }
            ExprKind::CoroutineCall {
                receiver,
                coroutine,
                args,
                qualifier,
            } => {
                self.tasks.push(Task::Apply(Apply::Coroutine {
                    has_receiver: receiver.is_some(),
                    name: coroutine,
                    args,
                    qualifier,
                }));
                self.push_args(arena, args);
                if let Some(receiver) = receiver {
                    self.tasks.push(Task::Eval(receiver));
                }
            }
            ExprKind::InvokeClosure { callee, args } => {
                self.tasks
                    .push(Task::Apply(Apply::InvokeClosure { args }));
                self.push_args(arena, args);
                self.tasks.push(Task::Eval(callee));
            }
            ExprKind::Instantiate { class, args } => {
                self.tasks
                    .push(Task::Apply(Apply::Instantiate { class, args }));
                self.push_args(arena, args);
            }
            ExprKind::List {
                item_class,
                elements,
            } => {
                self.tasks.push(Task::Apply(Apply::List {
                    item_class,
                    len: elements.len(),
                }));
                for element in arena.expr_list(elements).iter().rev() {
                    self.tasks.push(Task::Eval(*element));
                }
            }
            ExprKind::Conditional {
                clauses,
                else_branch,
            } => self.next_clause(interp, arena, clauses, 0, else_branch),
            ExprKind::Block(range) => {
                let exprs = arena.expr_list(range);
                if exprs.is_empty() {
                    self.values.push(interp.none());
                    return Ok(None);
                }
                interp.ctx.env.push_scope();
                self.tasks.push(Task::PopScope);
                for (i, expr) in exprs.iter().enumerate().rev() {
                    self.tasks.push(Task::Eval(*expr));
                    if i > 0 {
                        self.tasks.push(Task::Discard);
                    }
                }
            }
            ExprKind::Loop(body) => {
                self.tasks.push(Task::Loop {
                    body,
                    depth: interp.ctx.env.depth(),
                    height: self.values.len(),
                });
                self.tasks.push(Task::Eval(body));
            }
            ExprKind::LoopExit(Some(value)) => {
                self.tasks.push(Task::Apply(Apply::LoopExit));
                self.tasks.push(Task::Eval(value));
            }
            ExprKind::Guard {
                body,
                error_var,
                handler,
            } => {
                self.tasks.push(Task::Guard {
                    error_var,
                    handler,
                    depth: interp.ctx.env.depth(),
                    height: self.values.len(),
                });
                self.tasks.push(Task::Eval(body));
            }
            ExprKind::Concurrent { policy, branches } => {
                let handle = interp.spawn_group(policy, branches)?;
                return self.await_frame(interp, handle);
            }
            _ => {
                let value = interp.eval(id)?;
                self.values.push(value);
            }
        }
        Ok(None)
    }

    fn apply(
        &mut self,
        interp: &mut Interpreter,
        arena: &ExprArena,
        op: Apply,
    ) -> Result<Option<Wake>, EvalError> {
        let value = match op {
            Apply::Let(name) => {
                let value = self.pop(interp);
                interp.ctx.env.define(name, value.clone());
                value
            }
            Apply::Assign(name) => {
                let value = self.pop(interp);
                interp.assign_variable(name, value.clone())?;
                value
            }
            Apply::Binary(op) => {
                let right = self.pop(interp);
                let left = self.pop(interp);
                interp.binary_op(op, left, right)?
            }
            Apply::Unary(op) => {
                let operand = self.pop(interp);
                interp.unary_op(op, operand)?
            }
            Apply::Method {
                has_receiver,
                name,
                args,
                qualifier,
            } => {
                let args = self.pop_args(arena, args);
                let receiver = self.receiver(interp, has_receiver);
                interp.call_method(receiver, name, qualifier, args)?
            }
            Apply::Coroutine {
                has_receiver,
                name,
                args,
                qualifier,
            } => {
                let args = self.pop_args(arena, args);
                let receiver = self.receiver(interp, has_receiver);
                match interp.call_coroutine(receiver, name, qualifier, args)? {
                    Invoked::Done(value) => value,
                    Invoked::Running(handle) => return self.await_frame(interp, handle),
                }
            }
            Apply::InvokeClosure { args } => {
                let args = self.pop_args(arena, args);
                let callee = self.pop(interp);
                match interp.call_closure(&callee, args)? {
                    Invoked::Done(value) => value,
                    Invoked::Running(handle) => return self.await_frame(interp, handle),
                }
            }
            Apply::Instantiate { class, args } => {
                let args = self.pop_args(arena, args);
                interp.instantiate(class, args)?
            }
            Apply::List { item_class, len } => {
                let at = self.values.len().saturating_sub(len);
                let items = self.values.split_off(at);
                interp.make_list(item_class, items)?
            }
            Apply::LoopExit => {
                let value = self.pop(interp);
                return Err(EvalError::loop_exit(value));
            }
        };
        self.values.push(value);
        Ok(None)
    }

    fn receiver(&mut self, interp: &Interpreter, has_receiver: bool) -> Instance {
        if has_receiver {
            self.pop(interp)
        } else {
            interp.ctx.this.clone()
        }
    }

    /// Continue with the awaited frame's result, or suspend until it finishes.
    fn await_frame(
        &mut self,
        interp: &Interpreter,
        handle: CoroutineHandle,
    ) -> Result<Option<Wake>, EvalError> {
        match handle.status() {
            FrameStatus::Completed => {
                let value = handle.result().unwrap_or_else(|| interp.none());
                self.values.push(value);
            }
            FrameStatus::Stopped => self.values.push(interp.none()),
            FrameStatus::Failed => {
                return Err(handle
                    .error()
                    .unwrap_or_else(|| EvalError::new("awaited coroutine failed")));
            }
            FrameStatus::Pending | FrameStatus::Running | FrameStatus::Suspended => {
                self.tasks.push(Task::Await(handle.clone()));
                return Ok(Some(Wake::Frame(handle)));
            }
        }
        Ok(None)
    }

    /// Resume at the innermost handler of `err`, or give the error back.
    fn unwind(&mut self, interp: &mut Interpreter, err: EvalError) -> Result<(), EvalError> {
        while let Some(task) = self.tasks.pop() {
            match task {
                Task::PopScope => interp.ctx.env.pop_scope(),
                Task::Loop { depth, height, .. } => {
                    if let Some(ControlFlow::LoopExit(value)) = &err.control_flow {
                        interp.ctx.env.truncate(depth);
                        self.values.truncate(height);
                        self.values.push(value.clone());
                        return Ok(());
                    }
                }
                Task::Guard {
                    error_var,
                    handler,
                    depth,
                    height,
                } if !err.is_control_flow() => {
                    interp.ctx.env.truncate(depth);
                    self.values.truncate(height);
                    interp.ctx.env.push_scope();
                    let message = interp.string(err.message.clone());
                    interp.ctx.env.define(error_var, message);
                    self.tasks.push(Task::PopScope);
                    self.tasks.push(Task::Eval(handler));
                    tracing::debug!(error = %err, "guard recovered coroutine error");
                    return Ok(());
                }
                _ => {}
            }
        }
        self.values.clear();
        Err(err)
    }
}

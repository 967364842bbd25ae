//! Member, closure and constructor invocation.
//!
//! Every invocation binds its arguments into a fresh frame context: a new
//! environment over the callee's arena with `this` bound to the receiver.
//! Closure frames chain their root scope to the captured scope instead.

// Descriptors are shared with the class registry's dispatch cache.
#![expect(
    clippy::disallowed_types,
    reason = "Rc<MemberDescriptor> is the dispatch cache entry"
)]

use std::rc::Rc;

use brook_ir::{CallableKind, ParamRange, Symbol};
use smallvec::SmallVec;

use super::{FrameContext, Interpreter};
use crate::class::{ClassId, MemberBody, MemberDescriptor};
use crate::diagnostics::CallFrame;
use crate::environment::Environment;
use crate::errors::{
    durational_in_immediate, nil_dereference, no_mind, type_mismatch, unknown_argument,
    wrong_arg_count, EvalError, EvalNote, EvalResult,
};
use crate::mind::{CoroutineHandle, Frame, FrameBody, MindId};
use crate::object::{Closure, Payload};
use crate::Instance;

/// Evaluated call arguments, optionally named.
pub(crate) type ArgValues = SmallVec<[(Option<Symbol>, Instance); 4]>;

/// Outcome of a call that may start a coroutine.
pub(crate) enum Invoked {
    Done(Instance),
    Running(CoroutineHandle),
}

impl Interpreter {
    /// Resolve `name` on the receiver's class, starting at `qualifier` if given.
    pub(crate) fn resolve_call(
        &self,
        receiver: &Instance,
        name: Symbol,
        qualifier: Option<Symbol>,
    ) -> Result<Rc<MemberDescriptor>, EvalError> {
        let start = qualifier.map(|q| self.lookup_class(q)).transpose()?;
        self.classes
            .resolve_member(receiver.class(), name, start)
            .map_err(|err| {
                if start.is_none() && self.is_none(receiver) {
                    nil_dereference(self.symbols.text_of(name))
                } else {
                    err
                }
            })
    }

    /// Call a method to completion. Coroutines cannot be called this way.
    pub(crate) fn call_method(
        &mut self,
        receiver: Instance,
        name: Symbol,
        qualifier: Option<Symbol>,
        args: ArgValues,
    ) -> EvalResult {
        let desc = self.resolve_call(&receiver, name, qualifier)?;
        if desc.is_coroutine() {
            return Err(durational_in_immediate(self.symbols.text_of(name)));
        }
        self.invoke_member(receiver, &desc, args)
    }

    /// Call a coroutine from a running frame; the callee becomes its child.
    /// A method reached this way simply runs to completion.
    pub(crate) fn call_coroutine(
        &mut self,
        receiver: Instance,
        name: Symbol,
        qualifier: Option<Symbol>,
        args: ArgValues,
    ) -> Result<Invoked, EvalError> {
        let desc = self.resolve_call(&receiver, name, qualifier)?;
        if !desc.is_coroutine() {
            return self.invoke_member(receiver, &desc, args).map(Invoked::Done);
        }
        let (mind, parent) = self
            .current
            .ok_or_else(|| durational_in_immediate(self.symbols.text_of(name)))?;
        self.spawn_member(mind, Some(parent), receiver, &desc, args, false)
            .map(Invoked::Running)
    }

    /// Run a method member as `this`.
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(member = self.symbols.text_of(desc.name), depth = self.call_stack.depth())
    )]
    pub(crate) fn invoke_member(
        &mut self,
        this: Instance,
        desc: &MemberDescriptor,
        args: ArgValues,
    ) -> EvalResult {
        self.call_stack.push(CallFrame {
            class: self.classes.name_of(desc.owner),
            member: desc.name,
        })?;
        let result = self
            .run_member(this, desc, args)
            .map_err(|err| self.call_stack.attach_backtrace(err, &self.symbols));
        self.call_stack.pop();
        result
    }

    fn run_member(&mut self, this: Instance, desc: &MemberDescriptor, args: ArgValues) -> EvalResult {
        match &desc.body {
            MemberBody::Script {
                arena,
                params,
                body,
            } => {
                let ctx = FrameContext {
                    arena: arena.clone(),
                    env: Environment::new(),
                    this,
                    this_class: desc.owner,
                };
                let (result, _) = self.with_context(ctx, |interp| {
                    interp.bind_params(desc.name, *params, args)?;
                    interp.eval(*body)
                });
                result.map_err(EvalError::into_failure)
            }
            MemberBody::NativeMethod { params, func } => {
                let args = self.bind_native(desc.name, params, args)?;
                func(self, &this, &args)
            }
            MemberBody::NativeCoroutine { .. } => {
                Err(durational_in_immediate(self.symbols.text_of(desc.name)))
            }
        }
    }

    /// Register a coroutine member as a frame on `mind`.
    pub(crate) fn spawn_member(
        &mut self,
        mind: MindId,
        parent: Option<crate::mind::FrameId>,
        this: Instance,
        desc: &MemberDescriptor,
        args: ArgValues,
        deferred: bool,
    ) -> Result<CoroutineHandle, EvalError> {
        if mind.index() >= self.minds.len() {
            return Err(no_mind());
        }
        if !desc.is_coroutine() {
            let name = self.symbols.text_of(desc.name);
            return Err(EvalError::new(format!("`{name}` is a method, not a coroutine")));
        }
        let frame = match &desc.body {
            MemberBody::Script {
                arena,
                params,
                body,
            } => {
                let ctx = FrameContext {
                    arena: arena.clone(),
                    env: Environment::new(),
                    this,
                    this_class: desc.owner,
                };
                let (bound, ctx) =
                    self.with_context(ctx, |interp| interp.bind_params(desc.name, *params, args));
                bound?;
                Frame::script(ctx, *body)
            }
            MemberBody::NativeCoroutine { params, func } => {
                let args = self.bind_native(desc.name, params, args)?;
                let mut ctx = self.empty_context();
                ctx.this = this;
                ctx.this_class = desc.owner;
                Frame::new(
                    ctx,
                    FrameBody::Native {
                        func: *func,
                        args,
                        state: None,
                    },
                )
            }
            MemberBody::NativeMethod { .. } => {
                return Err(durational_in_immediate(self.symbols.text_of(desc.name)));
            }
        };
        Ok(self.spawn_frame(mind, desc.name, desc.owner, parent, frame, deferred))
    }

    /// Invoke a method closure to completion.
    pub(crate) fn invoke_closure_now(&mut self, callee: &Instance, args: ArgValues) -> EvalResult {
        let closure = self.expect_closure(callee)?;
        if closure.kind == CallableKind::Coroutine {
            return Err(durational_in_immediate(self.symbols.text_of(self.names.closure)));
        }
        self.call_stack.push(CallFrame {
            class: self.classes.name_of(closure.this_class),
            member: self.names.closure,
        })?;
        let ctx = self.closure_context(closure);
        let (result, _) = self.with_context(ctx, |interp| {
            interp.bind_params(interp.names.closure, closure.params, args)?;
            interp.eval(closure.body)
        });
        let result = result
            .map_err(EvalError::into_failure)
            .map_err(|err| self.call_stack.attach_backtrace(err, &self.symbols));
        self.call_stack.pop();
        result
    }

    /// Invoke a closure from a running frame. Coroutine closures start a
    /// child frame.
    pub(crate) fn call_closure(
        &mut self,
        callee: &Instance,
        args: ArgValues,
    ) -> Result<Invoked, EvalError> {
        let closure = self.expect_closure(callee)?;
        if closure.kind == CallableKind::Method {
            return self.invoke_closure_now(callee, args).map(Invoked::Done);
        }
        let name = self.names.closure;
        let (mind, parent) = self
            .current
            .ok_or_else(|| durational_in_immediate(self.symbols.text_of(name)))?;
        let ctx = self.closure_context(closure);
        let (bound, ctx) =
            self.with_context(ctx, |interp| interp.bind_params(name, closure.params, args));
        bound?;
        let frame = Frame::script(ctx, closure.body);
        Ok(Invoked::Running(self.spawn_frame(
            mind,
            name,
            closure.this_class,
            Some(parent),
            frame,
            false,
        )))
    }

    fn expect_closure<'a>(&self, callee: &'a Instance) -> Result<&'a Closure, EvalError> {
        callee
            .as_closure()
            .ok_or_else(|| type_mismatch("Closure", self.class_name_of(callee)))
    }

    fn closure_context(&self, closure: &Closure) -> FrameContext {
        FrameContext {
            arena: closure.arena.clone(),
            env: Environment::chained(closure.scope.clone()),
            this: closure.this.clone(),
            this_class: closure.this_class,
        }
    }

    /// Create an instance of `class` and run its constructor as it.
    pub(crate) fn construct(&mut self, class: ClassId, args: ArgValues) -> EvalResult {
        if let Some(value) = self.construct_core(class) {
            if !args.is_empty() {
                return Err(wrong_arg_count(
                    self.classes.display_name(class),
                    0,
                    args.len(),
                ));
            }
            return Ok(value);
        }
        let slots = self
            .classes
            .layout(class)
            .iter()
            .map(|slot| self.zero_value(slot.class))
            .collect();
        let instance = if self.classes.has_destructor(class) {
            Instance::with_destructor(class, Payload::Plain, slots, &self.destructors)
        } else {
            Instance::new(class, Payload::Plain, slots)
        };
        match self.classes.find_member(class, self.names.constructor) {
            Some(ctor) => {
                if let Err(err) = self.invoke_member(instance.clone(), &ctor, args) {
                    // The host never sees a half-built object, so it is never destroyed.
                    instance.disarm_destructor();
                    return Err(err);
                }
            }
            None if !args.is_empty() => {
                return Err(wrong_arg_count(
                    self.classes.display_name(class),
                    0,
                    args.len(),
                ));
            }
            None => {}
        }
        tracing::trace!(instance = %self.describe(&instance), "constructed instance");
        Ok(instance)
    }

    /// Instantiating a value class yields its zero value.
    fn construct_core(&self, class: ClassId) -> Option<Instance> {
        let core = &self.core;
        if class == core.none {
            Some(self.none())
        } else if class == core.list {
            self.list(core.object, Vec::new()).ok()
        } else if [core.integer, core.real, core.boolean, core.string].contains(&class) {
            Some(self.zero_value(class))
        } else {
            None
        }
    }

    /// Match arguments to parameter names: positional in order, then named.
    fn order_args(
        &self,
        member: Symbol,
        names: &[Symbol],
        args: ArgValues,
    ) -> Result<Vec<Option<Instance>>, EvalError> {
        let member_text = self.symbols.text_of(member);
        let given = args.len();
        let mut slots: Vec<Option<Instance>> = vec![None; names.len()];
        let mut positional = 0;
        for (name, value) in args {
            let index = match name {
                Some(name) => names
                    .iter()
                    .position(|n| *n == name)
                    .ok_or_else(|| unknown_argument(member_text, self.symbols.text_of(name)))?,
                None => {
                    positional += 1;
                    positional - 1
                }
            };
            let Some(slot) = slots.get_mut(index) else {
                return Err(wrong_arg_count(member_text, names.len(), given));
            };
            if slot.is_some() {
                return Err(wrong_arg_count(member_text, names.len(), given).with_note(
                    EvalNote::new(format!(
                        "argument `{}` given twice",
                        self.symbols.text_of(names[index])
                    )),
                ));
            }
            *slot = Some(value);
        }
        Ok(slots)
    }

    /// Bind scripted parameters into the current (callee) scope.
    ///
    /// Defaults are evaluated in the callee's frame, after the parameters
    /// before them are bound. Typed parameters are checked on every call.
    fn bind_params(
        &mut self,
        member: Symbol,
        range: ParamRange,
        args: ArgValues,
    ) -> Result<(), EvalError> {
        let arena = self.ctx.arena.clone();
        let params = arena.params(range);
        let names: SmallVec<[Symbol; 4]> = params.iter().map(|p| p.name).collect();
        let given = args.len();
        let slots = self.order_args(member, &names, args)?;
        for (param, slot) in params.iter().zip(slots) {
            let value = match (slot, param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default)?,
                (None, None) => {
                    let required = params.iter().filter(|p| p.default.is_none()).count();
                    return Err(wrong_arg_count(
                        self.symbols.text_of(member),
                        required,
                        given,
                    ));
                }
            };
            if let Some(ty) = param.ty {
                let class = self.lookup_class(ty)?;
                self.check_type(&value, class)?;
            }
            self.ctx.env.define(param.name, value);
        }
        Ok(())
    }

    /// Order native arguments by the declared parameter names.
    fn bind_native(
        &self,
        member: Symbol,
        params: &[Symbol],
        args: ArgValues,
    ) -> Result<Vec<Instance>, EvalError> {
        let given = args.len();
        self.order_args(member, params, args)?
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    wrong_arg_count(self.symbols.text_of(member), params.len(), given)
                })
            })
            .collect()
    }
}

//! Tree-walking interpreter and host API.
//!
//! One `Interpreter` is one runtime: its class registry, its Minds, the
//! destructor queue and the context of whatever frame is running. It is
//! confined to the thread that built it (instances are `Rc`-based); the
//! symbol table may be shared with other runtimes.
//!
//! # Frame contexts
//!
//! Every member body evaluates against the arena it was built in, its own
//! scope stack and its own `this`. Invocations swap a fresh `FrameContext`
//! into `ctx` and restore the caller's afterwards; coroutine frames keep
//! their context in the Mind between steps and swap it in to run.
//!
//! # Safe points
//!
//! Destructors run only at safe points: after a top-level host invocation,
//! at the end of each Mind update and in `collect_garbage`. They never run
//! in the middle of an evaluation.

mod builder;
mod eval;
mod invoke;

pub use builder::{InterpreterBuilder, RuntimeConfig, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MIND_NAME};
pub(crate) use invoke::{ArgValues, Invoked};

use brook_ir::{ExprArena, ExprId, SharedArena, SharedSymbols, Symbol};

use crate::builtins::CoreClasses;
use crate::class::{ClassDecl, ClassId, ClassRegistry, MemberDecl};
use crate::diagnostics::CallStack;
use crate::environment::Environment;
use crate::errors::{unknown_class, ErrorOrigin, EvalError, EvalResult};
use crate::mind::{CoroutineHandle, Mind, MindId};
use crate::names::MemberNames;
use crate::object::{DestructorQueue, ListData, Payload};
use crate::Instance;

/// Where the running code reads locals, `this` and expression nodes from.
pub(crate) struct FrameContext {
    pub(crate) arena: SharedArena,
    pub(crate) env: Environment,
    pub(crate) this: Instance,
    /// Class that declares the running member.
    pub(crate) this_class: ClassId,
}

pub struct Interpreter {
    pub(crate) symbols: SharedSymbols,
    pub(crate) names: MemberNames,
    pub(crate) classes: ClassRegistry,
    pub(crate) core: CoreClasses,
    none: Instance,
    pub(crate) ctx: FrameContext,
    pub(crate) call_stack: CallStack,
    pub(crate) minds: Vec<Mind>,
    pub(crate) default_mind: Option<MindId>,
    /// Mind and frame of the running coroutine step.
    pub(crate) current: Option<(MindId, crate::mind::FrameId)>,
    pub(crate) destructors: DestructorQueue,
    pub(crate) empty_arena: SharedArena,
    draining: bool,
    pub(crate) config: RuntimeConfig,
}

impl Interpreter {
    /// Runtime with default configuration and a fresh symbol table.
    pub fn new() -> Self {
        InterpreterBuilder::new().build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SharedSymbols {
        &self.symbols
    }

    pub fn intern(&self, text: &str) -> Symbol {
        self.symbols.intern(text)
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn class_named(&self, name: &str) -> Option<ClassId> {
        self.classes.class_named(self.symbols.intern(name))
    }

    /// Mind created with the runtime.
    pub fn default_mind(&self) -> Option<MindId> {
        self.default_mind
    }

    /// Current invocation depth.
    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    // Values

    /// The shared None instance.
    #[inline]
    pub fn none(&self) -> Instance {
        self.none.clone()
    }

    /// Same as [`none`](Self::none), under the host-facing name.
    pub fn none_instance(&self) -> Instance {
        self.none()
    }

    pub fn is_none(&self, value: &Instance) -> bool {
        value.ptr_eq(&self.none)
    }

    pub fn boolean(&self, value: bool) -> Instance {
        Instance::new(self.core.boolean, Payload::Boolean(value), Vec::new())
    }

    pub fn integer(&self, value: i64) -> Instance {
        Instance::new(self.core.integer, Payload::Integer(value), Vec::new())
    }

    pub fn real(&self, value: f64) -> Instance {
        Instance::new(self.core.real, Payload::Real(value), Vec::new())
    }

    pub fn string(&self, value: impl Into<String>) -> Instance {
        Instance::new(self.core.string, Payload::String(value.into()), Vec::new())
    }

    pub fn symbol(&self, value: Symbol) -> Instance {
        Instance::new(self.core.symbol, Payload::Symbol(value), Vec::new())
    }

    /// Instance wrapping a coroutine handle, as scripts see it.
    pub fn handle_instance(&self, handle: &CoroutineHandle) -> Instance {
        Instance::new(
            self.core.invoked_coroutine,
            Payload::Coroutine(handle.clone()),
            Vec::new(),
        )
    }

    pub(crate) fn class_object(&self, class: ClassId) -> Instance {
        Instance::new(self.core.class, Payload::Class(class), Vec::new())
    }

    /// Typed list. Every item must conform to `item_class`.
    pub fn list(&self, item_class: ClassId, items: Vec<Instance>) -> EvalResult {
        for item in &items {
            self.check_type(item, item_class)?;
        }
        Ok(Instance::new(
            self.core.list,
            Payload::List(ListData::new(item_class, items)),
            Vec::new(),
        ))
    }

    /// Class name of `value`, for messages.
    pub fn class_name_of(&self, value: &Instance) -> &'static str {
        self.classes.display_name(value.class())
    }

    /// Short identity of an instance for diagnostics, e.g. `Counter#12`.
    pub fn describe(&self, value: &Instance) -> String {
        format!("{}#{}", self.class_name_of(value), value.serial())
    }

    pub(crate) fn check_type(&self, value: &Instance, class: ClassId) -> Result<(), EvalError> {
        if self.classes.is_subtype_of(value.class(), class) {
            Ok(())
        } else {
            Err(crate::errors::type_mismatch(
                self.classes.display_name(class),
                self.class_name_of(value),
            ))
        }
    }

    /// Default value of a data slot of type `class`: the zero value of a
    /// primitive, None otherwise.
    pub(crate) fn zero_value(&self, class: ClassId) -> Instance {
        let core = &self.core;
        if class == core.integer {
            self.integer(0)
        } else if class == core.real {
            self.real(0.0)
        } else if class == core.boolean {
            self.boolean(false)
        } else if class == core.string {
            self.string(String::new())
        } else {
            self.none()
        }
    }

    // Classes

    /// Register a class and initialise its class data.
    pub fn register_class(&mut self, decl: ClassDecl) -> Result<ClassId, EvalError> {
        let id = self.classes.register(decl)?;
        for (index, (_, class)) in self.classes.class_data_decls(id).into_iter().enumerate() {
            let value = self.zero_value(class);
            self.classes.set_class_data(id, index, value);
        }
        Ok(id)
    }

    /// Add or replace a member; running frames keep their current body.
    pub fn define_member(&mut self, class: ClassId, decl: MemberDecl) -> Result<(), EvalError> {
        self.classes.define_member(class, decl)
    }

    /// Class data value visible from `class`.
    pub fn class_data(&self, class: ClassId, name: &str) -> Option<Instance> {
        let (owner, index) = self
            .classes
            .class_data_slot(class, self.symbols.intern(name))?;
        self.classes.class_data(owner, index)
    }

    /// Read a data member. There is no host-side write path; slots change
    /// only through members running as the instance.
    pub fn data_member(&self, instance: &Instance, name: &str) -> Option<Instance> {
        let index = self
            .classes
            .slot_index(instance.class(), self.symbols.intern(name))?;
        instance.slot(index)
    }

    // Host invocations

    /// Create an instance of `class` and run its constructor, if declared.
    pub fn new_instance(&mut self, class: ClassId, args: &[Instance]) -> EvalResult {
        let args = args.iter().cloned().map(|a| (None, a)).collect();
        let result = self.construct(class, args);
        self.after_host_call();
        result
    }

    /// Evaluate `root` of `arena` as a top-level immediate expression, with
    /// `this` bound to None.
    ///
    /// Coroutine calls and concurrent groups fail with
    /// `DurationalInImmediate`; closures may be invoked if they are methods.
    pub fn evaluate(&mut self, arena: &SharedArena, root: ExprId) -> EvalResult {
        let ctx = FrameContext {
            arena: arena.clone(),
            env: Environment::new(),
            this: self.none(),
            this_class: self.core.object,
        };
        let (result, _) = self.with_context(ctx, |interp| interp.eval(root));
        let result = result.map_err(EvalError::into_failure);
        self.after_host_call();
        result
    }

    /// Invoke a method to completion.
    ///
    /// Errors leaving the invocation carry the originating class, member and
    /// instance.
    pub fn invoke_method(&mut self, target: &Instance, member: &str, args: &[Instance]) -> EvalResult {
        let name = self.symbols.intern(member);
        let args = args.iter().cloned().map(|a| (None, a)).collect();
        let result = self
            .call_method(target.clone(), name, None, args)
            .map_err(|err| self.with_origin(err, target, name));
        self.after_host_call();
        result
    }

    /// Invoke a coroutine on `mind`; its first step runs before this returns.
    pub fn invoke_coroutine(
        &mut self,
        target: &Instance,
        member: &str,
        args: &[Instance],
        mind: MindId,
    ) -> Result<CoroutineHandle, EvalError> {
        self.start_coroutine(target, member, args, mind, false)
    }

    /// Invoke a coroutine whose first step waits for the next update.
    pub fn invoke_coroutine_deferred(
        &mut self,
        target: &Instance,
        member: &str,
        args: &[Instance],
        mind: MindId,
    ) -> Result<CoroutineHandle, EvalError> {
        self.start_coroutine(target, member, args, mind, true)
    }

    fn start_coroutine(
        &mut self,
        target: &Instance,
        member: &str,
        args: &[Instance],
        mind: MindId,
        deferred: bool,
    ) -> Result<CoroutineHandle, EvalError> {
        let name = self.symbols.intern(member);
        let args = args.iter().cloned().map(|a| (None, a)).collect();
        let result = self
            .resolve_call(target, name, None)
            .and_then(|desc| self.spawn_member(mind, None, target.clone(), &desc, args, deferred))
            .map_err(|err| self.with_origin(err, target, name));
        if mind.index() < self.minds.len() {
            self.settle_mind(mind);
        }
        self.after_host_call();
        result
    }

    fn with_origin(&self, err: EvalError, target: &Instance, member: Symbol) -> EvalError {
        err.into_failure().with_origin(ErrorOrigin {
            class: self.class_name_of(target).to_string(),
            member: self.symbols.text_of(member).to_string(),
            instance: self.describe(target),
        })
    }

    fn after_host_call(&mut self) {
        if self.current.is_none() && self.call_stack.depth() == 0 {
            self.run_destructors();
        }
    }

    /// Run every due destructor now.
    pub fn collect_garbage(&mut self) -> usize {
        self.run_destructors()
    }

    /// Destructors queued but not yet run.
    pub fn pending_destructors(&self) -> usize {
        self.destructors.len()
    }

    pub(crate) fn run_destructors(&mut self) -> usize {
        if self.draining {
            return 0;
        }
        self.draining = true;
        let mut ran = 0;
        loop {
            let due = self.destructors.take();
            if due.is_empty() {
                break;
            }
            for instance in due {
                ran += 1;
                let Ok(desc) = self
                    .classes
                    .resolve_member(instance.class(), self.names.destructor, None)
                else {
                    continue;
                };
                if let Err(err) = self.invoke_member(instance.clone(), &desc, ArgValues::new()) {
                    tracing::warn!(
                        instance = %self.describe(&instance),
                        error = %err,
                        "destructor failed"
                    );
                }
            }
        }
        self.draining = false;
        ran
    }

    /// Swap `ctx` in, run `f`, and swap the caller's context back.
    /// Returns `f`'s result and the context as `f` left it.
    pub(crate) fn with_context<R>(
        &mut self,
        ctx: FrameContext,
        f: impl FnOnce(&mut Self) -> R,
    ) -> (R, FrameContext) {
        let saved = std::mem::replace(&mut self.ctx, ctx);
        let result = f(self);
        let ctx = std::mem::replace(&mut self.ctx, saved);
        (result, ctx)
    }

    pub(crate) fn lookup_class(&self, name: Symbol) -> Result<ClassId, EvalError> {
        self.classes
            .class_named(name)
            .ok_or_else(|| unknown_class(self.symbols.text_of(name)))
    }

    pub(crate) fn empty_context(&self) -> FrameContext {
        FrameContext {
            arena: self.empty_arena.clone(),
            env: Environment::new(),
            this: self.none(),
            this_class: self.core.object,
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.stop_everything();
        let released = self.classes.clear_class_data();
        drop(released);
        self.run_destructors();
    }
}

/// Arena with no nodes, for contexts that never evaluate script.
pub(crate) fn empty_arena() -> SharedArena {
    SharedArena::new(ExprArena::new())
}

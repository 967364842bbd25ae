//! `InterpreterBuilder` for creating runtimes with various configurations.

use brook_ir::SharedSymbols;

use super::{empty_arena, FrameContext, Interpreter};
use crate::builtins;
use crate::class::ClassRegistry;
use crate::diagnostics::CallStack;
use crate::environment::Environment;
use crate::names::{ClassNames, MemberNames};
use crate::object::{DestructorQueue, Payload};
use crate::Instance;

/// Default limit on nested invocations.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Name of the Mind created with every runtime unless disabled.
pub const DEFAULT_MIND_NAME: &str = "master";

/// Runtime settings fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Nested invocations allowed before `StackOverflow`.
    pub max_call_depth: usize,
    /// Record every frame transition in each Mind's history.
    pub trace: bool,
    /// Mind that `branch` bodies started outside a coroutine run on.
    pub default_mind: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            trace: false,
            default_mind: Some(DEFAULT_MIND_NAME.to_string()),
        }
    }
}

/// Builder for [`Interpreter`].
///
/// Runtimes that load code through one front end share its symbol table;
/// without one the runtime creates its own.
#[derive(Default)]
pub struct InterpreterBuilder {
    symbols: Option<SharedSymbols>,
    config: RuntimeConfig,
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern through an existing table.
    #[must_use]
    pub fn symbols(mut self, symbols: SharedSymbols) -> Self {
        self.symbols = Some(symbols);
        self
    }

    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    #[must_use]
    pub fn trace(mut self, trace: bool) -> Self {
        self.config.trace = trace;
        self
    }

    /// Name of the default Mind, or `None` to create no Mind up front.
    #[must_use]
    pub fn default_mind(mut self, name: Option<&str>) -> Self {
        self.config.default_mind = name.map(str::to_string);
        self
    }

    /// Build the runtime with the core classes registered.
    pub fn build(self) -> Interpreter {
        let symbols = self.symbols.unwrap_or_default();
        let class_names = ClassNames::new(&symbols);
        let names = MemberNames::new(&symbols);
        let mut classes = ClassRegistry::new(symbols.clone());
        let core = builtins::register_core(&mut classes, &symbols, &class_names);
        let none = Instance::new(core.none, Payload::Plain, Vec::new());
        let arena = empty_arena();

        let mut interp = Interpreter {
            ctx: FrameContext {
                arena: arena.clone(),
                env: Environment::new(),
                this: none.clone(),
                this_class: core.object,
            },
            symbols,
            names,
            classes,
            core,
            none,
            call_stack: CallStack::new(self.config.max_call_depth),
            minds: Vec::new(),
            default_mind: None,
            current: None,
            destructors: DestructorQueue::new(),
            empty_arena: arena,
            draining: false,
            config: self.config,
        };
        if let Some(name) = interp.config.default_mind.clone() {
            let mind = interp.create_mind(name);
            interp.default_mind = Some(mind);
        }
        tracing::debug!(
            classes = interp.classes.len(),
            max_call_depth = interp.config.max_call_depth,
            "built interpreter"
        );
        interp
    }
}

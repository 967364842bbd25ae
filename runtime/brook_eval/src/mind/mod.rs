//! Minds: cooperative coroutine scheduling.
//!
//! A `Mind` owns the frames of every coroutine invoked on it and is pumped by
//! the host once per tick through `Interpreter::update`. Frames live in a
//! generational slab; handles observe a frame through a shared outcome cell
//! that outlives the slot.
//!
//! Scripted coroutine bodies run on an explicit continuation (a task stack
//! plus a value stack, see `continuation`), so a suspended frame is plain
//! data between ticks. Native coroutines are polled functions.
//!
//! # Tick order
//!
//! 1. Advance the clock and resume frames whose time-based wake is due
//!    (at most once per tick, and no more often than their update interval).
//! 2. Resume frames whose condition holds: a delivered event, or a finished
//!    child or awaited frame. Frames woken by a completion in this tick run
//!    in the same tick, after the frame that woke them.
//! 3. Run the first step of deferred frames, in registration order.
//! 4. Drop finished frames from the live set and run due destructors.

use std::any::Any;
use std::collections::VecDeque;

use bitflags::bitflags;

use brook_ir::Symbol;

use crate::errors::{wrong_arg_count, EvalError};
use crate::{Instance, Interpreter};

mod continuation;
mod frame;
mod handle;
mod scheduler;

pub(crate) use continuation::Continuation;
pub(crate) use frame::{Frame, FrameBody, FrameEntry, Group, Slot};
pub use handle::{CoroutineHandle, FrameId, FrameStatus};

/// Index of a Mind in its interpreter.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct MindId(u32);

impl MindId {
    pub(crate) const fn new(index: u32) -> Self {
        MindId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MindFlags: u8 {
        /// `update` is a no-op until resumed.
        const SUSPENDED = 1 << 0;
        /// Inside `update`; finished frames are swept at the end of the tick.
        const UPDATING = 1 << 1;
        /// Record every frame transition in the history.
        const TRACE = 1 << 2;
    }
}

/// Condition a suspended frame waits for.
#[derive(Clone, Debug)]
pub enum Wake {
    /// Resume on the next tick.
    Tick,
    /// Resume once the Mind clock reaches this time.
    At(f64),
    /// Resume when the host delivers this event.
    Event(Symbol),
    /// Resume when the frame behind the handle finishes.
    Frame(CoroutineHandle),
    /// Resume when any child frame finishes.
    Children,
}

impl Wake {
    fn is_time_based(&self) -> bool {
        matches!(self, Wake::Tick | Wake::At(_))
    }
}

/// Result of polling a native coroutine.
#[derive(Clone, Debug)]
pub enum Poll {
    Ready(Instance),
    Pending(Wake),
}

/// A coroutine frame that failed.
#[derive(Clone, Debug)]
pub struct FrameFailure {
    pub frame: FrameId,
    /// `Class.member` of the failed frame.
    pub name: String,
    pub error: EvalError,
}

/// Recorded frame transition, kept while tracing is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameEvent {
    pub frame: FrameId,
    pub name: Symbol,
    pub status: FrameStatus,
}

/// Entries kept in each of a Mind's failure and history logs. Past this the
/// oldest entries are discarded, so a host that never drains the logs still
/// runs in bounded memory.
pub const LOG_LIMIT: usize = 1024;

pub struct Mind {
    name: String,
    pub(crate) slots: Vec<Slot>,
    pub(crate) free: Vec<u32>,
    /// Frames in registration order, including finished ones until swept.
    pub(crate) live: Vec<FrameId>,
    /// Registered with deferred first steps.
    pub(crate) pending: VecDeque<FrameId>,
    /// Woken by a completion or event in the current tick.
    pub(crate) ready: VecDeque<FrameId>,
    pub(crate) clock: f64,
    pub(crate) tick: u64,
    pub(crate) flags: MindFlags,
    pub(crate) failures: VecDeque<FrameFailure>,
    pub(crate) history: VecDeque<FrameEvent>,
}

impl Mind {
    pub(crate) fn new(name: impl Into<String>, trace: bool) -> Self {
        let mut flags = MindFlags::empty();
        flags.set(MindFlags::TRACE, trace);
        Self {
            name: name.into(),
            slots: Vec::new(),
            free: Vec::new(),
            live: Vec::new(),
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            clock: 0.0,
            tick: 0,
            flags,
            failures: VecDeque::new(),
            history: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seconds of Mind time elapsed over all updates.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Number of completed updates.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn flags(&self) -> MindFlags {
        self.flags
    }

    pub fn is_suspended(&self) -> bool {
        self.flags.contains(MindFlags::SUSPENDED)
    }

    /// Frames that have not finished.
    pub fn live_count(&self) -> usize {
        self.live
            .iter()
            .filter(|id| {
                self.entry(**id)
                    .is_some_and(|e| !e.handle.status().is_finished())
            })
            .count()
    }

    /// Failures not yet taken by the host, oldest first.
    pub fn failures(&self) -> impl Iterator<Item = &FrameFailure> {
        self.failures.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &FrameEvent> {
        self.history.iter()
    }

    pub(crate) fn record(&mut self, frame: FrameId, name: Symbol, status: FrameStatus) {
        if self.flags.contains(MindFlags::TRACE) {
            push_bounded(
                &mut self.history,
                FrameEvent {
                    frame,
                    name,
                    status,
                },
            );
        }
    }

    pub(crate) fn record_failure(&mut self, failure: FrameFailure) {
        push_bounded(&mut self.failures, failure);
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, entry: T) {
    if log.len() == LOG_LIMIT {
        log.pop_front();
    }
    log.push_back(entry);
}

/// What a native coroutine sees when polled.
pub struct CoroutineContext<'a> {
    pub interp: &'a mut Interpreter,
    this: Instance,
    args: &'a [Instance],
    state: &'a mut Option<Box<dyn Any>>,
    update_count: u64,
    started_at: f64,
    clock: f64,
    delivered: Option<Instance>,
    mind: MindId,
    frame: FrameId,
}

impl<'a> CoroutineContext<'a> {
    #[expect(clippy::too_many_arguments, reason = "plain constructor")]
    pub(crate) fn new(
        interp: &'a mut Interpreter,
        this: Instance,
        args: &'a [Instance],
        state: &'a mut Option<Box<dyn Any>>,
        update_count: u64,
        started_at: f64,
        clock: f64,
        delivered: Option<Instance>,
        mind: MindId,
        frame: FrameId,
    ) -> Self {
        Self {
            interp,
            this,
            args,
            state,
            update_count,
            started_at,
            clock,
            delivered,
            mind,
            frame,
        }
    }

    pub fn this(&self) -> &Instance {
        &self.this
    }

    pub fn args(&self) -> &[Instance] {
        self.args
    }

    /// Argument `index`, failing with `ArityMismatch` when absent.
    pub fn arg(&self, index: usize) -> Result<&Instance, EvalError> {
        self.args
            .get(index)
            .ok_or_else(|| wrong_arg_count("", index + 1, self.args.len()))
    }

    /// Take the value stored by an earlier step, if it has type `T`.
    pub fn take_state<T: Any>(&mut self) -> Option<T> {
        let boxed = self.state.take()?.downcast::<T>().ok()?;
        Some(*boxed)
    }

    /// Keep `value` for the next step of this frame.
    pub fn set_state<T: Any>(&mut self, value: T) {
        *self.state = Some(Box::new(value));
    }

    /// Completed resumptions before this one.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn is_first_step(&self) -> bool {
        self.update_count == 0
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Current Mind clock.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Payload of the event that woke this frame, if any.
    pub fn take_delivered(&mut self) -> Option<Instance> {
        self.delivered.take()
    }

    pub fn mind(&self) -> MindId {
        self.mind
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }
}

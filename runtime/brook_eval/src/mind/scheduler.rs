//! Frame lifecycle and the per-tick update.

use rustc_hash::FxHashSet;

use brook_ir::{ConcurrencyPolicy, ExprId, ExprRange, Symbol};

use super::continuation::Step;
use super::{
    Continuation, CoroutineContext, CoroutineHandle, Frame, FrameBody, FrameEntry, FrameEvent,
    FrameFailure, FrameId, FrameStatus, Group, Mind, MindFlags, MindId, Poll, Wake,
};
use crate::class::ClassId;
use crate::diagnostics::CallFrame;
use crate::environment::Environment;
use crate::errors::{no_mind, scheduler_fault, ErrorOrigin, EvalError};
use crate::interpreter::FrameContext;
use crate::stack::ensure_sufficient_stack;
use crate::{Instance, Interpreter};

impl Frame {
    pub(crate) fn new(ctx: FrameContext, body: FrameBody) -> Self {
        Self {
            ctx,
            body,
            update_count: 0,
            started_at: 0.0,
        }
    }

    pub(crate) fn script(ctx: FrameContext, body: ExprId) -> Self {
        Self::new(ctx, FrameBody::Script(Continuation::new(body)))
    }
}

impl Interpreter {
    /// Add a Mind. Every Mind runs on this interpreter's thread.
    pub fn create_mind(&mut self, name: impl Into<String>) -> MindId {
        let id = MindId::new(u32::try_from(self.minds.len()).unwrap_or(u32::MAX));
        let mind = Mind::new(name, self.config.trace);
        tracing::debug!(mind = mind.name(), id = id.raw(), "created mind");
        self.minds.push(mind);
        id
    }

    /// # Panics
    /// Panics if `id` was not created by this interpreter. Use `try_mind`
    /// for ids from elsewhere.
    pub fn mind(&self, id: MindId) -> &Mind {
        &self.minds[id.index()]
    }

    pub fn try_mind(&self, id: MindId) -> Option<&Mind> {
        self.minds.get(id.index())
    }

    fn owns_mind(&self, id: MindId) -> bool {
        self.try_mind(id).is_some()
    }

    fn mind_mut(&mut self, id: MindId) -> &mut Mind {
        &mut self.minds[id.index()]
    }

    pub fn minds(&self) -> impl Iterator<Item = (MindId, &Mind)> {
        self.minds
            .iter()
            .enumerate()
            .map(|(i, mind)| (MindId::new(u32::try_from(i).unwrap_or(u32::MAX)), mind))
    }

    /// Register a frame and, unless deferred, run its first step now.
    pub(crate) fn spawn_frame(
        &mut self,
        mind: MindId,
        name: Symbol,
        owner: ClassId,
        parent: Option<FrameId>,
        mut frame: Frame,
        deferred: bool,
    ) -> CoroutineHandle {
        let this = frame.ctx.this.clone();
        let m = self.mind_mut(mind);
        frame.started_at = m.clock;
        let id = m.next_frame_id();
        let handle = CoroutineHandle::new(mind, id, name, FrameStatus::Pending);
        m.insert(FrameEntry::new(handle.clone(), owner, this, parent, frame));
        if let Some(parent) = parent {
            if let Some(entry) = m.entry_mut(parent) {
                entry.children.push(id);
            }
        }
        m.record(id, name, FrameStatus::Pending);
        tracing::trace!(
            mind = mind.raw(),
            frame = ?id,
            coroutine = self.symbols.text_of(name),
            deferred,
            "spawned coroutine"
        );
        if deferred {
            self.mind_mut(mind).pending.push_back(id);
        } else {
            self.resume_frame(mind, id);
        }
        handle
    }

    /// Run one step of a frame that is not already running.
    fn resume_frame(&mut self, mind: MindId, id: FrameId) {
        let Some(entry) = self.mind_mut(mind).entry_mut(id) else {
            return;
        };
        if entry.handle.is_finished() {
            return;
        }
        let Some(mut frame) = entry.frame.take() else {
            return;
        };
        let handle = entry.handle.clone();
        let owner = entry.owner;
        let delivered = entry.delivered.take();
        entry.wake = None;
        handle.set_status(FrameStatus::Running);

        std::mem::swap(&mut self.ctx, &mut frame.ctx);
        let saved = self.current.replace((mind, id));
        let call = CallFrame {
            class: self.classes.name_of(owner),
            member: handle.name(),
        };
        let step = match self.call_stack.push(call) {
            Ok(()) => {
                let step = ensure_sufficient_stack(|| self.step_frame(mind, id, &mut frame, delivered))
                    .map_err(|err| self.call_stack.attach_backtrace(err, &self.symbols));
                self.call_stack.pop();
                step
            }
            Err(err) => Err(err),
        };
        self.current = saved;
        std::mem::swap(&mut self.ctx, &mut frame.ctx);
        frame.update_count += 1;

        let stop_requested = match self.mind_mut(mind).entry_mut(id) {
            Some(entry) => {
                entry.frame = Some(frame);
                entry.stop_requested
            }
            None => return,
        };
        match step {
            Ok(Step::Done(value)) => {
                self.finish_frame(mind, id, FrameStatus::Completed, Some(value), None);
            }
            Ok(Step::Suspend(wake)) => self.suspend_frame(mind, id, wake),
            Err(err) => {
                self.finish_frame(mind, id, FrameStatus::Failed, None, Some(err.into_failure()));
            }
        }
        if stop_requested {
            self.stop_frame(mind, id);
        }
    }

    fn step_frame(
        &mut self,
        mind: MindId,
        id: FrameId,
        frame: &mut Frame,
        delivered: Option<Instance>,
    ) -> Result<Step, EvalError> {
        let clock = self.mind(mind).clock;
        match &mut frame.body {
            FrameBody::Script(continuation) => continuation.run(self),
            FrameBody::Native { func, args, state } => {
                let func = *func;
                let this = self.ctx.this.clone();
                let mut cx = CoroutineContext::new(
                    self,
                    this,
                    args.as_slice(),
                    state,
                    frame.update_count,
                    frame.started_at,
                    clock,
                    delivered,
                    mind,
                    id,
                );
                Ok(match func(&mut cx)? {
                    Poll::Ready(value) => Step::Done(value),
                    Poll::Pending(wake) => Step::Suspend(wake),
                })
            }
            FrameBody::Group(group) => self.poll_group(mind, id, group, frame.update_count),
        }
    }

    fn suspend_frame(&mut self, mind: MindId, id: FrameId, wake: Wake) {
        if let Wake::Frame(target) = &wake {
            if target.mind() == mind && self.waits_on(mind, target.frame(), id) {
                let name = self.frame_name(mind, id);
                self.finish_frame(
                    mind,
                    id,
                    FrameStatus::Failed,
                    None,
                    Some(scheduler_fault(&name)),
                );
                return;
            }
        }
        let m = self.mind_mut(mind);
        let (clock, tick) = (m.clock, m.tick);
        if let Wake::Frame(target) = &wake {
            if target.mind() == mind {
                if let Some(awaited) = m.entry_mut(target.frame()) {
                    awaited.waiters.push(id);
                }
            }
        }
        if let Some(entry) = m.entry_mut(id) {
            entry.handle.set_status(FrameStatus::Suspended);
            entry.suspended_tick = tick;
            if entry.update_interval > 0.0 {
                entry.next_update = clock + entry.update_interval;
            }
            entry.wake = Some(wake);
        }
    }

    /// Whether `from` transitively waits on `target`, through awaited frames
    /// and children.
    fn waits_on(&self, mind: MindId, from: FrameId, target: FrameId) -> bool {
        let m = self.mind(mind);
        let mut seen = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            let Some(entry) = m.entry(id) else {
                continue;
            };
            if entry.handle.is_finished() {
                continue;
            }
            if let Some(Wake::Frame(awaited)) = &entry.wake {
                if awaited.mind() == mind {
                    stack.push(awaited.frame());
                }
            }
            stack.extend(entry.children.iter().copied());
        }
        false
    }

    fn frame_name(&self, mind: MindId, id: FrameId) -> String {
        match self.mind(mind).entry(id) {
            Some(entry) => format!(
                "{}.{}",
                self.classes.display_name(entry.owner),
                self.symbols.text_of(entry.handle.name())
            ),
            None => format!("{id:?}"),
        }
    }

    /// Blame a failure on the frame's receiver and member.
    fn with_frame_origin(&self, mind: MindId, id: FrameId, err: EvalError) -> EvalError {
        let Some(entry) = self.mind(mind).entry(id) else {
            return err;
        };
        err.with_origin(ErrorOrigin {
            class: self.class_name_of(&entry.this).to_string(),
            member: self.symbols.text_of(entry.handle.name()).to_string(),
            instance: self.describe(&entry.this),
        })
    }

    /// Settle a frame. Children are stopped first, depth first; then parents
    /// and waiters are queued to observe the outcome.
    fn finish_frame(
        &mut self,
        mind: MindId,
        id: FrameId,
        status: FrameStatus,
        result: Option<Instance>,
        error: Option<EvalError>,
    ) {
        let children = match self.mind_mut(mind).entry_mut(id) {
            Some(entry) if !entry.handle.is_finished() => std::mem::take(&mut entry.children),
            _ => return,
        };
        for child in children {
            self.stop_frame(mind, child);
        }

        let name = self.frame_name(mind, id);
        let error = match error {
            Some(err) if status == FrameStatus::Failed => {
                Some(self.with_frame_origin(mind, id, err))
            }
            other => other,
        };
        let failure = error.clone();
        let m = self.mind_mut(mind);
        let Some(entry) = m.entry_mut(id) else {
            return;
        };
        let handle = entry.handle.clone();
        if !handle.settle(status, result, error) {
            return;
        }
        let released = entry.frame.take();
        entry.wake = None;
        entry.delivered = None;
        let parent = entry.parent.take();
        let waiters = std::mem::take(&mut entry.waiters);

        m.record(id, handle.name(), status);
        if let Some(parent) = parent {
            if let Some(parent_entry) = m.entry_mut(parent) {
                parent_entry.children.retain(|child| *child != id);
                if matches!(parent_entry.wake, Some(Wake::Children)) {
                    m.ready.push_back(parent);
                }
            }
        }
        m.ready.extend(waiters);

        match (status, failure) {
            (FrameStatus::Failed, Some(error)) => {
                tracing::warn!(mind = m.name(), coroutine = %name, %error, "coroutine failed");
                m.record_failure(FrameFailure {
                    frame: id,
                    name,
                    error,
                });
            }
            _ => tracing::trace!(mind = m.name(), coroutine = %name, ?status, "coroutine finished"),
        }
        drop(released);
    }

    /// Stop a frame and, depth first, every frame it awaits.
    ///
    /// A frame stopped while it is running (including by itself) is stopped
    /// when its current step returns.
    fn stop_frame(&mut self, mind: MindId, id: FrameId) {
        let Some(entry) = self.mind_mut(mind).entry_mut(id) else {
            return;
        };
        if entry.handle.is_finished() {
            return;
        }
        if entry.frame.is_none() {
            entry.stop_requested = true;
            return;
        }
        self.finish_frame(mind, id, FrameStatus::Stopped, None, None);
    }

    /// Spawn the branches on the first step, then settle once the policy is
    /// decided. `race` stops the branches still running; `any` detaches them
    /// and they run on as parentless frames of the same Mind.
    fn poll_group(
        &mut self,
        mind: MindId,
        id: FrameId,
        group: &mut Group,
        update_count: u64,
    ) -> Result<Step, EvalError> {
        if update_count == 0 {
            let arena = self.ctx.arena.clone();
            for branch in arena.expr_list(group.branches) {
                let ctx = self.capture_context();
                let frame = Frame::script(ctx, *branch);
                let handle = self.spawn_frame(
                    mind,
                    self.names.branch,
                    self.ctx.this_class,
                    Some(id),
                    frame,
                    false,
                );
                let decided = group.policy != ConcurrencyPolicy::Sync && handle.is_finished();
                group.handles.push(handle);
                if decided {
                    break;
                }
            }
        }

        match group.policy {
            ConcurrencyPolicy::Sync => {
                if let Some(failed) = group
                    .handles
                    .iter()
                    .find(|h| h.status() == FrameStatus::Failed)
                {
                    return Err(failed
                        .error()
                        .unwrap_or_else(|| EvalError::new("sync branch failed")));
                }
                if group.handles.iter().all(CoroutineHandle::is_finished) {
                    return Ok(Step::Done(self.none()));
                }
            }
            ConcurrencyPolicy::Race | ConcurrencyPolicy::Any => {
                if let Some(winner) = group.handles.iter().find(|h| h.is_finished()).cloned() {
                    if group.policy == ConcurrencyPolicy::Any {
                        self.detach_children(mind, id);
                    }
                    return match winner.status() {
                        FrameStatus::Failed => Err(winner
                            .error()
                            .unwrap_or_else(|| EvalError::new("branch failed"))),
                        _ => Ok(Step::Done(winner.result().unwrap_or_else(|| self.none()))),
                    };
                }
                if group.handles.is_empty() {
                    return Ok(Step::Done(self.none()));
                }
            }
        }
        Ok(Step::Suspend(Wake::Children))
    }

    /// Let the children of `id` outlive it.
    fn detach_children(&mut self, mind: MindId, id: FrameId) {
        let m = self.mind_mut(mind);
        let children = match m.entry_mut(id) {
            Some(entry) => std::mem::take(&mut entry.children),
            None => return,
        };
        for child in children {
            if let Some(entry) = m.entry_mut(child) {
                entry.parent = None;
            }
        }
    }

    /// Context for a frame that shares the current frame's scope and `this`.
    pub(crate) fn capture_context(&self) -> FrameContext {
        FrameContext {
            arena: self.ctx.arena.clone(),
            env: Environment::chained(self.ctx.env.current_scope()),
            this: self.ctx.this.clone(),
            this_class: self.ctx.this_class,
        }
    }

    /// Spawn a concurrent group as a child of the running frame.
    pub(crate) fn spawn_group(
        &mut self,
        policy: ConcurrencyPolicy,
        branches: ExprRange,
    ) -> Result<CoroutineHandle, EvalError> {
        let (mind, parent) = self.current.ok_or_else(no_mind)?;
        let name = match policy {
            ConcurrencyPolicy::Sync => self.names.sync,
            ConcurrencyPolicy::Race => self.names.race,
            ConcurrencyPolicy::Any => self.names.any,
        };
        let frame = Frame::new(
            self.capture_context(),
            FrameBody::Group(Group {
                policy,
                branches,
                handles: Vec::new(),
            }),
        );
        let owner = self.ctx.this_class;
        Ok(self.spawn_frame(mind, name, owner, Some(parent), frame, false))
    }

    /// Fire-and-forget coroutine body on the current Mind, or the default
    /// Mind outside coroutines. The new frame has no parent.
    pub(crate) fn spawn_branch(&mut self, body: ExprId) -> Result<CoroutineHandle, EvalError> {
        let mind = match self.current {
            Some((mind, _)) => mind,
            None => self.default_mind.ok_or_else(no_mind)?,
        };
        let frame = Frame::script(self.capture_context(), body);
        let owner = self.ctx.this_class;
        let handle = self.spawn_frame(mind, self.names.branch, owner, None, frame, false);
        self.settle_mind(mind);
        Ok(handle)
    }

    /// Advance `mind` by `elapsed` seconds. Returns the number of resumptions.
    ///
    /// The Mind-level entry points below ignore ids of Minds this interpreter
    /// never created.
    #[tracing::instrument(level = "trace", skip_all, fields(mind = mind.raw(), elapsed = elapsed))]
    pub fn update(&mut self, mind: MindId, elapsed: f64) -> usize {
        if !self.owns_mind(mind) {
            return 0;
        }
        {
            let m = self.mind_mut(mind);
            if m.flags.intersects(MindFlags::SUSPENDED | MindFlags::UPDATING) {
                return 0;
            }
            m.clock += elapsed.max(0.0);
            m.tick += 1;
            m.flags.insert(MindFlags::UPDATING);
        }
        let mut resumed = 0;
        let order = self.mind(mind).live.clone();

        for id in &order {
            if self.time_wake_due(mind, *id) {
                self.resume_frame(mind, *id);
                resumed += 1 + self.drain_ready(mind);
            }
        }
        for id in &order {
            if self.condition_holds(mind, *id) {
                self.resume_frame(mind, *id);
                resumed += 1 + self.drain_ready(mind);
            }
        }
        resumed += self.drain_ready(mind);

        while let Some(id) = self.mind_mut(mind).pending.pop_front() {
            self.resume_frame(mind, id);
            resumed += 1 + self.drain_ready(mind);
        }

        self.sweep(mind);
        self.mind_mut(mind).flags.remove(MindFlags::UPDATING);
        self.run_destructors();
        resumed
    }

    fn time_wake_due(&self, mind: MindId, id: FrameId) -> bool {
        let m = self.mind(mind);
        let Some(entry) = m.entry(id) else {
            return false;
        };
        if entry.handle.status() != FrameStatus::Suspended
            || entry.suspended_tick >= m.tick
            || m.clock < entry.next_update
        {
            return false;
        }
        match &entry.wake {
            Some(Wake::Tick) => true,
            Some(Wake::At(at)) => m.clock >= *at,
            _ => false,
        }
    }

    fn condition_holds(&self, mind: MindId, id: FrameId) -> bool {
        let Some(entry) = self.mind(mind).entry(id) else {
            return false;
        };
        if entry.handle.status() != FrameStatus::Suspended {
            return false;
        }
        match &entry.wake {
            Some(Wake::Event(_)) => entry.delivered.is_some(),
            Some(Wake::Frame(awaited)) => awaited.is_finished(),
            Some(Wake::Children) => match entry.frame.as_deref().map(|f| &f.body) {
                Some(FrameBody::Group(group)) => group.is_decided(),
                _ => entry.children.is_empty(),
            },
            Some(wake) => {
                debug_assert!(wake.is_time_based());
                false
            }
            None => false,
        }
    }

    fn drain_ready(&mut self, mind: MindId) -> usize {
        let mut resumed = 0;
        while let Some(id) = self.mind_mut(mind).ready.pop_front() {
            if self.condition_holds(mind, id) {
                self.resume_frame(mind, id);
                resumed += 1;
            }
        }
        resumed
    }

    /// Drop finished frames from the live set and free their slots.
    fn sweep(&mut self, mind: MindId) {
        let m = self.mind_mut(mind);
        let live = std::mem::take(&mut m.live);
        let mut kept = Vec::with_capacity(live.len());
        let mut released = Vec::new();
        for id in live {
            match m.entry(id) {
                Some(entry) if !entry.handle.is_finished() => kept.push(id),
                Some(_) => released.extend(m.remove(id)),
                None => {}
            }
        }
        m.live = kept;
        drop(released);
    }

    /// Outside an update, finished frames are swept right away.
    pub(crate) fn settle_mind(&mut self, mind: MindId) {
        if !self.mind(mind).flags.contains(MindFlags::UPDATING) {
            self.sweep(mind);
        }
    }

    /// Deliver `event` to every frame waiting for it. Woken frames resume
    /// during the next update, or later in the current one.
    pub fn notify(&mut self, mind: MindId, event: Symbol, payload: &Instance) -> usize {
        if !self.owns_mind(mind) {
            return 0;
        }
        let event_name = self.symbols.text_of(event);
        let m = self.mind_mut(mind);
        let updating = m.flags.contains(MindFlags::UPDATING);
        let mut woken = Vec::new();
        for id in m.live.clone() {
            let Some(entry) = m.entry_mut(id) else {
                continue;
            };
            let waiting = matches!(&entry.wake, Some(Wake::Event(e)) if *e == event);
            if waiting && entry.delivered.is_none() && !entry.handle.is_finished() {
                entry.delivered = Some(payload.clone());
                woken.push(id);
            }
        }
        let count = woken.len();
        if updating {
            m.ready.extend(woken);
        }
        tracing::debug!(
            mind = m.name(),
            event = event_name,
            count,
            "delivered event"
        );
        count
    }

    /// Stop the frame behind `handle` and everything it awaits.
    pub fn stop(&mut self, handle: &CoroutineHandle) {
        let mind = handle.mind();
        if !self.owns_mind(mind) {
            return;
        }
        self.stop_frame(mind, handle.frame());
        self.settle_mind(mind);
    }

    pub fn stop_all(&mut self, mind: MindId) {
        if !self.owns_mind(mind) {
            return;
        }
        for id in self.mind(mind).live.clone() {
            self.stop_frame(mind, id);
        }
        self.settle_mind(mind);
    }

    /// Stop every coroutine, in every Mind, running as `instance`.
    pub fn stop_all_for(&mut self, instance: &Instance) {
        for index in 0..self.minds.len() {
            let mind = MindId::new(u32::try_from(index).unwrap_or(u32::MAX));
            let targets: Vec<FrameId> = {
                let m = self.mind(mind);
                m.live
                    .iter()
                    .copied()
                    .filter(|id| m.entry(*id).is_some_and(|e| e.this.ptr_eq(instance)))
                    .collect()
            };
            for id in targets {
                self.stop_frame(mind, id);
            }
            self.settle_mind(mind);
        }
    }

    /// Pause `mind`: updates do nothing until `resume_mind`.
    pub fn suspend_mind(&mut self, mind: MindId) {
        if let Some(m) = self.minds.get_mut(mind.index()) {
            m.flags.insert(MindFlags::SUSPENDED);
        }
    }

    pub fn resume_mind(&mut self, mind: MindId) {
        if let Some(m) = self.minds.get_mut(mind.index()) {
            m.flags.remove(MindFlags::SUSPENDED);
        }
    }

    /// Drain the failure log of `mind`. Only the latest `LOG_LIMIT`
    /// failures are kept between drains.
    pub fn take_failures(&mut self, mind: MindId) -> Vec<FrameFailure> {
        self.minds
            .get_mut(mind.index())
            .map(|m| Vec::from(std::mem::take(&mut m.failures)))
            .unwrap_or_default()
    }

    /// Drain the recorded transitions of `mind`, kept only while tracing.
    pub fn take_history(&mut self, mind: MindId) -> Vec<FrameEvent> {
        self.minds
            .get_mut(mind.index())
            .map(|m| Vec::from(std::mem::take(&mut m.history)))
            .unwrap_or_default()
    }

    /// Resume the frame behind `handle` at most every `seconds` of Mind time
    /// when it waits on time.
    pub fn set_update_interval(&mut self, handle: &CoroutineHandle, seconds: f64) {
        let Some(m) = self.minds.get_mut(handle.mind().index()) else {
            return;
        };
        if let Some(entry) = m.entry_mut(handle.frame()) {
            entry.update_interval = seconds.max(0.0);
        }
    }

    /// Stop every frame in every Mind, for teardown.
    pub(crate) fn stop_everything(&mut self) {
        for index in 0..self.minds.len() {
            self.stop_all(MindId::new(u32::try_from(index).unwrap_or(u32::MAX)));
        }
    }
}

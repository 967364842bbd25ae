//! Coroutine frames and the generational slab that owns them.

use std::any::Any;

use brook_ir::{ConcurrencyPolicy, ExprRange};

use super::continuation::Continuation;
use super::handle::{CoroutineHandle, FrameId, FrameStatus};
use super::{Mind, Wake};
use crate::class::{ClassId, NativeCoroutineFn};
use crate::interpreter::FrameContext;
use crate::Instance;

/// State that exists only while the frame can still run.
pub(crate) struct Frame {
    pub(crate) ctx: FrameContext,
    pub(crate) body: FrameBody,
    /// Completed resumptions, 0 during the first step.
    pub(crate) update_count: u64,
    /// Mind clock when the frame was registered.
    pub(crate) started_at: f64,
}

pub(crate) enum FrameBody {
    Script(Continuation),
    Native {
        func: NativeCoroutineFn,
        args: Vec<Instance>,
        /// Whatever the function keeps between resumptions.
        state: Option<Box<dyn Any>>,
    },
    Group(Group),
}

/// Concurrent group: spawns its branches on the first step, then polls them.
pub(crate) struct Group {
    pub(crate) policy: ConcurrencyPolicy,
    pub(crate) branches: ExprRange,
    pub(crate) handles: Vec<CoroutineHandle>,
}

impl Group {
    /// Whether the branches settled so far complete the group under its policy.
    /// A failed branch decides a `sync` group early.
    pub(crate) fn is_decided(&self) -> bool {
        match self.policy {
            ConcurrencyPolicy::Sync => {
                self.handles.iter().all(CoroutineHandle::is_finished)
                    || self.handles.iter().any(|h| h.status() == FrameStatus::Failed)
            }
            ConcurrencyPolicy::Race | ConcurrencyPolicy::Any => {
                self.handles.iter().any(CoroutineHandle::is_finished)
            }
        }
    }
}

pub(crate) struct FrameEntry {
    pub(crate) handle: CoroutineHandle,
    /// Class whose member the frame runs.
    pub(crate) owner: ClassId,
    pub(crate) this: Instance,
    /// Frame awaiting this one as a sub-invocation; stopped frames take
    /// their children with them.
    pub(crate) parent: Option<FrameId>,
    pub(crate) children: Vec<FrameId>,
    /// Frames in the same Mind suspended until this one finishes.
    pub(crate) waiters: Vec<FrameId>,
    pub(crate) wake: Option<Wake>,
    /// Event payload handed over by `notify`.
    pub(crate) delivered: Option<Instance>,
    /// Taken out while the frame runs, dropped once it finishes.
    pub(crate) frame: Option<Box<Frame>>,
    pub(crate) stop_requested: bool,
    pub(crate) update_interval: f64,
    pub(crate) next_update: f64,
    /// Tick in which the frame last suspended; time-based wakes wait for a later one.
    pub(crate) suspended_tick: u64,
}

impl FrameEntry {
    pub(crate) fn new(
        handle: CoroutineHandle,
        owner: ClassId,
        this: Instance,
        parent: Option<FrameId>,
        frame: Frame,
    ) -> Self {
        Self {
            handle,
            owner,
            this,
            parent,
            children: Vec::new(),
            waiters: Vec::new(),
            wake: None,
            delivered: None,
            frame: Some(Box::new(frame)),
            stop_requested: false,
            update_interval: 0.0,
            next_update: 0.0,
            suspended_tick: 0,
        }
    }
}

#[derive(Default)]
pub(crate) struct Slot {
    generation: u32,
    entry: Option<FrameEntry>,
}

impl Mind {
    /// Next id `insert` will hand out.
    pub(crate) fn next_frame_id(&self) -> FrameId {
        match self.free.last() {
            Some(&index) => FrameId::new(index, self.slots[index as usize].generation),
            None => FrameId::new(
                u32::try_from(self.slots.len()).unwrap_or(u32::MAX),
                0,
            ),
        }
    }

    /// Store `entry` under the id returned by `next_frame_id`.
    pub(crate) fn insert(&mut self, entry: FrameEntry) -> FrameId {
        let id = self.next_frame_id();
        if self.free.pop().is_none() {
            self.slots.push(Slot::default());
        }
        self.slots[id.index()].entry = Some(entry);
        self.live.push(id);
        id
    }

    pub(crate) fn entry(&self, id: FrameId) -> Option<&FrameEntry> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.as_ref()
    }

    pub(crate) fn entry_mut(&mut self, id: FrameId) -> Option<&mut FrameEntry> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Free the slot; stale ids to it stop resolving.
    pub(crate) fn remove(&mut self, id: FrameId) -> Option<FrameEntry> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(u32::try_from(id.index()).unwrap_or(u32::MAX));
        Some(entry)
    }
}

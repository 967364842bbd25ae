//! Coroutine handles and frame identity.

// Rc shares a frame's outcome between the Mind and every handle to it.
#![expect(
    clippy::disallowed_types,
    reason = "Rc shares frame outcomes with handles"
)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use brook_ir::Symbol;

use super::MindId;
use crate::errors::EvalError;
use crate::Instance;

/// Generation-checked index of a frame slot in its Mind.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameId {
    index: u32,
    generation: u32,
}

impl FrameId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({}v{})", self.index, self.generation)
    }
}

/// Lifecycle of an invoked coroutine frame.
///
/// `Pending → Running → {Suspended ⇄ Running} → {Completed | Stopped | Failed}`
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FrameStatus {
    /// Registered; first step not yet run.
    Pending,
    Running,
    Suspended,
    Completed,
    Stopped,
    Failed,
}

impl FrameStatus {
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            FrameStatus::Completed | FrameStatus::Stopped | FrameStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FrameStatus::Pending => "pending",
            FrameStatus::Running => "running",
            FrameStatus::Suspended => "suspended",
            FrameStatus::Completed => "completed",
            FrameStatus::Stopped => "stopped",
            FrameStatus::Failed => "failed",
        }
    }
}

pub(crate) struct Outcome {
    pub(crate) status: FrameStatus,
    pub(crate) result: Option<Instance>,
    pub(crate) error: Option<EvalError>,
}

/// Observer of one invoked coroutine.
///
/// Status and result stay readable after the frame has been removed from
/// its Mind's live set.
#[derive(Clone)]
pub struct CoroutineHandle {
    mind: MindId,
    frame: FrameId,
    name: Symbol,
    outcome: Rc<RefCell<Outcome>>,
}

impl CoroutineHandle {
    pub(crate) fn new(mind: MindId, frame: FrameId, name: Symbol, status: FrameStatus) -> Self {
        Self {
            mind,
            frame,
            name,
            outcome: Rc::new(RefCell::new(Outcome {
                status,
                result: None,
                error: None,
            })),
        }
    }

    pub fn mind(&self) -> MindId {
        self.mind
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// Member (or anonymous body) name the frame runs.
    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn status(&self) -> FrameStatus {
        self.outcome.borrow().status
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Return value, once completed.
    pub fn result(&self) -> Option<Instance> {
        self.outcome.borrow().result.clone()
    }

    /// Error that failed the frame.
    pub fn error(&self) -> Option<EvalError> {
        self.outcome.borrow().error.clone()
    }

    pub fn same_frame(&self, other: &CoroutineHandle) -> bool {
        Rc::ptr_eq(&self.outcome, &other.outcome)
    }

    pub(crate) fn set_status(&self, status: FrameStatus) {
        self.outcome.borrow_mut().status = status;
    }

    /// Record the final state. Returns false if the frame had already finished.
    pub(crate) fn settle(
        &self,
        status: FrameStatus,
        result: Option<Instance>,
        error: Option<EvalError>,
    ) -> bool {
        let previous = {
            let mut outcome = self.outcome.borrow_mut();
            if outcome.status.is_finished() {
                return false;
            }
            outcome.status = status;
            outcome.error = error;
            std::mem::replace(&mut outcome.result, result)
        };
        drop(previous);
        true
    }
}

impl fmt::Debug for CoroutineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoroutineHandle")
            .field("mind", &self.mind)
            .field("frame", &self.frame)
            .field("status", &self.status())
            .finish()
    }
}

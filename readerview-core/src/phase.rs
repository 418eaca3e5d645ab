use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Dragging,
    Pinching,
    Animating,
    /// A full relayout is queued. `resume` is the touch state it must come
    /// back to, tracked while the reset waits.
    ResetPending { resume: Touch },
}

/// Touch state carried through a pending reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Touch {
    #[default]
    Released,
    Dragging,
    Pinching,
}

impl Touch {
    fn of(phase: Phase) -> Touch {
        match phase {
            Phase::Dragging => Touch::Dragging,
            Phase::Pinching => Touch::Pinching,
            Phase::ResetPending { resume } => resume,
            Phase::Idle | Phase::Animating => Touch::Released,
        }
    }

    fn phase(self) -> Phase {
        match self {
            Touch::Released => Phase::Idle,
            Touch::Dragging => Phase::Dragging,
            Touch::Pinching => Phase::Pinching,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    FingerDown,
    ScaleBegin,
    ScaleEnd,
    FingerUp { animating: bool },
    AnimationStarted,
    AnimationFinished,
    ResetRequested,
    ResetApplied { animating: bool },
}

impl Phase {
    pub fn is_user_interacting(self) -> bool {
        matches!(Touch::of(self), Touch::Dragging | Touch::Pinching)
    }

    pub fn is_scaling(self) -> bool {
        Touch::of(self) == Touch::Pinching
    }

    pub fn is_reset_pending(self) -> bool {
        matches!(self, Phase::ResetPending { .. })
    }

    /// Next phase, or `None` when `transition` is not legal from `self`.
    pub fn next(self, transition: Transition) -> Option<Phase> {
        use Phase::*;
        use Transition::*;

        let next = match (self, transition) {
            (ResetPending { .. }, ResetRequested) => self,
            (_, ResetRequested) => ResetPending {
                resume: Touch::of(self),
            },
            (ResetPending { resume }, ResetApplied { animating }) => match resume {
                Touch::Released if animating => Animating,
                touch => touch.phase(),
            },
            // touches keep being tracked underneath the pending reset
            (ResetPending { resume }, transition) => ResetPending {
                resume: Touch::of(resume.phase().next(transition)?),
            },

            (Idle | Animating, FingerDown) => Dragging,
            (Dragging, FingerDown) => Dragging,
            (Dragging, ScaleBegin) => Pinching,
            (Pinching, ScaleEnd) => Dragging,
            (Dragging | Pinching, FingerUp { animating: true }) => Animating,
            (Dragging | Pinching, FingerUp { animating: false }) => Idle,

            (Idle | Animating, AnimationStarted) => Animating,
            (Dragging, AnimationStarted) => Dragging,
            (Pinching, AnimationStarted) => Pinching,
            (Animating, AnimationFinished) => Idle,
            (Idle, AnimationFinished) => Idle,

            _ => return None,
        };
        Some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    Settle(usize),
    Unsettle(usize),
}

/// Notifications held back until the layout pass that produced them has
/// finished, so hooks observe final geometry.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Deferred>,
}

impl TaskQueue {
    pub fn push(&mut self, task: Deferred) {
        self.tasks.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Removes every queued task in FIFO order. Tasks queued while the
    /// returned batch runs wait for the next drain.
    pub fn take(&mut self) -> Vec<Deferred> {
        self.tasks.drain(..).collect()
    }
}

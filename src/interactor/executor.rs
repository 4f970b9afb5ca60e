use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::InteractorId;

/// Shared cancellation flag between a pending task and its requester.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }

    fn clear(&self) {
        self.0.set(false);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredAction {
    SelfExclude(InteractorId),
}

#[derive(Debug)]
struct DeferredTask {
    due_ms: u64,
    interactor: InteractorId,
    token: CancelToken,
}

/// FIFO of deferred work pumped from the same loop that handles input.
#[derive(Debug, Default)]
pub struct SerialExecutor {
    queue: VecDeque<DeferredTask>,
}

impl SerialExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_self_exclusion(
        &mut self,
        interactor: InteractorId,
        due_ms: u64,
        token: CancelToken,
    ) {
        log::debug!(
            "deferred_scheduled interactor={} due_ms={}",
            interactor,
            due_ms
        );
        self.queue.push_back(DeferredTask {
            due_ms,
            interactor,
            token,
        });
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pops every task due at or before `now_ms`, in submission order.
    /// Cancelled tasks are dropped; every run task clears its token.
    pub fn run_due(&mut self, now_ms: u64) -> Vec<DeferredAction> {
        let mut actions = Vec::new();
        let mut kept = VecDeque::with_capacity(self.queue.len());
        while let Some(task) = self.queue.pop_front() {
            if task.due_ms > now_ms {
                kept.push_back(task);
                continue;
            }
            if task.token.is_cancelled() {
                log::debug!("deferred_cancelled interactor={}", task.interactor);
            } else {
                actions.push(DeferredAction::SelfExclude(task.interactor));
            }
            task.token.clear();
        }
        self.queue = kept;
        actions
    }
}

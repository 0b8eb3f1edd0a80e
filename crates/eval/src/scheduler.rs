//! Single-shot timers for debounced predicates.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Source of time and cancellable single-shot timers.
pub trait Scheduler {
    fn now_ms(&self) -> u64;

    /// Run `task` once, `delay_ms` from now.
    fn schedule(&self, delay_ms: u64, task: Box<dyn FnOnce()>) -> TimerId;

    /// Cancel a pending timer. Cancelling a fired or unknown timer is a no-op.
    fn cancel(&self, id: TimerId);
}

/// Deterministic scheduler driven by an explicit virtual clock.
///
/// Timers fire only from [`ManualScheduler::advance`], in due-time order
/// and FIFO among timers due at the same instant.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<u64>,
    next_id: Cell<u64>,
    queue: RefCell<BTreeMap<(u64, u64), Box<dyn FnOnce()>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `ms`, firing every timer that comes due.
    pub fn advance(&self, ms: u64) {
        let target = self.now.get().saturating_add(ms);
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                match queue.first_key_value() {
                    Some((&(due, _), _)) if due <= target => queue.pop_first(),
                    _ => None,
                }
            };
            match next {
                Some(((due, _), task)) => {
                    self.now.set(due);
                    task();
                }
                None => break,
            }
        }
        self.now.set(target);
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn schedule(&self, delay_ms: u64, task: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let due = self.now.get().saturating_add(delay_ms);
        self.queue.borrow_mut().insert((due, id), task);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        let task = {
            let mut queue = self.queue.borrow_mut();
            let key = queue.keys().find(|&&(_, tid)| tid == id.0).copied();
            key.and_then(|k| queue.remove(&k))
        };
        drop(task);
    }
}

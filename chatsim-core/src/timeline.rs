//! Cancellable virtual-time scheduler.
//!
//! A timeline is a list of steps, each with a delay relative to when the
//! timeline was scheduled. The scheduler never reads a wall clock: callers
//! drive it with [`Timeline::pop_due`] / [`Timeline::advance_to`], which makes
//! every sequence reproducible in tests.
//!
//! Every entry carries the epoch it was scheduled in. [`Timeline::cancel_all`]
//! bumps the epoch, so nothing scheduled before a reset can ever fire after
//! it, even if an entry somehow survived in the queue.

use serde::{Deserialize, Serialize};

/// Identifies one scheduled timeline so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineHandle(u64);

impl TimelineHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One step of a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<A> {
    /// Offset from the moment the timeline was scheduled.
    pub delay_ms: u64,
    pub action: A,
}

impl<A> Step<A> {
    pub fn new(delay_ms: u64, action: A) -> Self {
        Self { delay_ms, action }
    }
}

/// A step whose due time has been reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<A> {
    pub handle: TimelineHandle,
    pub epoch: u64,
    pub due_ms: u64,
    pub action: A,
}

#[derive(Debug)]
struct Entry<A> {
    handle: TimelineHandle,
    epoch: u64,
    due_ms: u64,
    seq: u64,
    action: A,
}

/// Ordered queue of pending steps on a virtual clock.
#[derive(Debug)]
pub struct Timeline<A> {
    now_ms: u64,
    epoch: u64,
    next_handle: u64,
    next_seq: u64,
    /// Sorted by `(due_ms, seq)`.
    queue: Vec<Entry<A>>,
}

impl<A> Default for Timeline<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Timeline<A> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            epoch: 0,
            next_handle: 1,
            next_seq: 0,
            queue: Vec::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Schedule a sequence of steps relative to the current time.
    ///
    /// Due times never go backwards within one timeline: a step whose offset
    /// is smaller than its predecessor's fires together with it, after it.
    pub fn schedule(&mut self, steps: Vec<Step<A>>) -> TimelineHandle {
        let handle = TimelineHandle(self.next_handle);
        self.next_handle += 1;

        let mut floor = self.now_ms;
        for step in steps {
            let due_ms = self.now_ms.saturating_add(step.delay_ms).max(floor);
            floor = due_ms;
            self.insert(Entry {
                handle,
                epoch: self.epoch,
                due_ms,
                seq: self.next_seq,
                action: step.action,
            });
            self.next_seq += 1;
        }

        handle
    }

    /// Schedule a single action.
    pub fn schedule_after(&mut self, delay_ms: u64, action: A) -> TimelineHandle {
        self.schedule(vec![Step::new(delay_ms, action)])
    }

    fn insert(&mut self, entry: Entry<A>) {
        let key = (entry.due_ms, entry.seq);
        let pos = self.queue.partition_point(|e| (e.due_ms, e.seq) <= key);
        self.queue.insert(pos, entry);
    }

    /// Drop every pending step of one timeline. Returns how many were dropped.
    pub fn cancel(&mut self, handle: TimelineHandle) -> usize {
        let before = self.queue.len();
        self.queue.retain(|e| e.handle != handle);
        before - self.queue.len()
    }

    /// Drop everything and start a new epoch.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.epoch += 1;
        dropped
    }

    /// Pop the earliest step due at or before `until_ms`.
    ///
    /// The clock moves to the step's due time, so anything the caller
    /// schedules in response is anchored to when the step fired rather than
    /// to `until_ms`.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<Fired<A>> {
        loop {
            let first = self.queue.first()?;
            if first.due_ms > until_ms {
                return None;
            }
            let entry = self.queue.remove(0);
            if entry.epoch != self.epoch {
                continue;
            }
            self.now_ms = self.now_ms.max(entry.due_ms);
            return Some(Fired {
                handle: entry.handle,
                epoch: entry.epoch,
                due_ms: entry.due_ms,
                action: entry.action,
            });
        }
    }

    /// Move the clock forward without firing anything.
    pub fn settle_at(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Fire everything due up to `now_ms`, in order, and move the clock there.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<Fired<A>> {
        let mut fired = Vec::new();
        while let Some(f) = self.pop_due(now_ms) {
            fired.push(f);
        }
        self.settle_at(now_ms);
        fired
    }

    pub fn advance_by(&mut self, delta_ms: u64) -> Vec<Fired<A>> {
        self.advance_to(self.now_ms.saturating_add(delta_ms))
    }

    /// Due time of the next pending step.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.first().map(|e| e.due_ms)
    }

    /// Number of steps still pending for a timeline.
    pub fn pending(&self, handle: TimelineHandle) -> usize {
        self.queue.iter().filter(|e| e.handle == handle).count()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

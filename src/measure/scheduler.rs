//! Queues of pending measures.
//!
//! A queue holds measures waiting to be solved and yields the ones whose dependencies are
//! complete. It never solves anything itself; readiness is read from the [`MeasureGraph`].

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};

use log::debug;

use crate::measure::{Lifecycle, MeasureGraph, MeasureId};

fn is_ready(graph: &MeasureGraph, id: MeasureId) -> bool {
    matches!(graph.state(id), Lifecycle::Ready | Lifecycle::Computed)
}

pub trait MeasureQueue {
    fn push(&mut self, graph: &MeasureGraph, id: MeasureId);

    /// Next ready measure, or `None` if every held measure is blocked.
    fn pop(&mut self, graph: &MeasureGraph) -> Option<MeasureId>;

    /// Pops the entry `pop` would yield next, but only if it is ready now and satisfies `pred`.
    fn pop_if(&mut self, graph: &MeasureGraph, pred: &dyn Fn(MeasureId) -> bool) -> Option<MeasureId>;

    /// Entries still waiting for dependencies.
    fn blocked(&self) -> Vec<MeasureId>;

    /// Drops every entry of `id`. Returns whether one was held.
    fn remove(&mut self, id: MeasureId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Yields ready measures in arrival order.
#[derive(Debug, Default)]
pub struct UnorderedQueue {
    ready: VecDeque<MeasureId>,
    blocked: Vec<MeasureId>,
}

impl UnorderedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn rescan(&mut self, graph: &MeasureGraph) {
        let ready = &mut self.ready;
        self.blocked.retain(|&id| {
            if is_ready(graph, id) {
                ready.push_back(id);
                false
            } else {
                true
            }
        });
    }
}

impl MeasureQueue for UnorderedQueue {
    fn push(&mut self, graph: &MeasureGraph, id: MeasureId) {
        if is_ready(graph, id) {
            self.ready.push_back(id);
        } else {
            self.blocked.push(id);
        }
    }

    fn pop(&mut self, graph: &MeasureGraph) -> Option<MeasureId> {
        if self.ready.is_empty() {
            self.rescan(graph);
        }
        self.ready.pop_front()
    }

    fn pop_if(&mut self, graph: &MeasureGraph, pred: &dyn Fn(MeasureId) -> bool) -> Option<MeasureId> {
        self.rescan(graph);
        let position = self.ready.iter().position(|&id| pred(id))?;
        self.ready.remove(position)
    }

    fn blocked(&self) -> Vec<MeasureId> {
        self.blocked.clone()
    }

    fn remove(&mut self, id: MeasureId) -> bool {
        let before = self.len();
        self.ready.retain(|&other| other != id);
        self.blocked.retain(|&other| other != id);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.ready.len() + self.blocked.len()
    }
}

#[derive(Debug, Copy, Clone)]
struct Entry {
    time: f64,
    seq: u64,
    id: MeasureId,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.total_cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

/// Yields ready measures in non-decreasing time order within a round.
///
/// A measure that becomes ready with a time earlier than the last one popped cannot be served
/// in the current round; it waits in the next round, which starts when the current one runs
/// dry. Measures without a time sort as time zero; ties keep arrival order.
#[derive(Debug)]
pub struct TimeOrderedQueue {
    current: BinaryHeap<Reverse<Entry>>,
    next_round: Vec<Entry>,
    blocked: Vec<Entry>,
    now: f64,
    seq: u64,
    rounds: usize,
}

impl Default for TimeOrderedQueue {
    fn default() -> Self {
        Self {
            current: BinaryHeap::new(),
            next_round: Vec::new(),
            blocked: Vec::new(),
            now: f64::NEG_INFINITY,
            seq: 0,
            rounds: 1,
        }
    }
}

impl TimeOrderedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rounds started so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Time of the last popped measure in the current round.
    pub fn now(&self) -> f64 {
        self.now
    }

    fn place(&mut self, entry: Entry) {
        if entry.time < self.now {
            debug!("measure {} at time {} deferred to the next round", entry.id, entry.time);
            self.next_round.push(entry);
        } else {
            self.current.push(Reverse(entry));
        }
    }

    fn rescan(&mut self, graph: &MeasureGraph) {
        let (ready, blocked): (Vec<Entry>, Vec<Entry>) = self
            .blocked
            .drain(..)
            .partition(|entry| is_ready(graph, entry.id));
        self.blocked = blocked;
        for entry in ready {
            self.place(entry);
        }
    }

    fn rotate(&mut self) -> bool {
        if self.next_round.is_empty() {
            return false;
        }
        self.rounds += 1;
        self.now = f64::NEG_INFINITY;
        debug!("starting round {} with {} measures", self.rounds, self.next_round.len());
        for entry in std::mem::take(&mut self.next_round) {
            self.current.push(Reverse(entry));
        }
        true
    }
}

impl MeasureQueue for TimeOrderedQueue {
    fn push(&mut self, graph: &MeasureGraph, id: MeasureId) {
        let entry = Entry {
            time: graph.time(id).unwrap_or(0.0),
            seq: self.seq,
            id,
        };
        self.seq += 1;
        if is_ready(graph, id) {
            self.place(entry);
        } else {
            self.blocked.push(entry);
        }
    }

    fn pop(&mut self, graph: &MeasureGraph) -> Option<MeasureId> {
        loop {
            self.rescan(graph);
            if let Some(Reverse(entry)) = self.current.pop() {
                self.now = entry.time;
                return Some(entry.id);
            }
            if !self.rotate() {
                return None;
            }
        }
    }

    fn pop_if(&mut self, graph: &MeasureGraph, pred: &dyn Fn(MeasureId) -> bool) -> Option<MeasureId> {
        self.rescan(graph);
        let Reverse(entry) = *self.current.peek()?;
        if !pred(entry.id) {
            return None;
        }
        self.current.pop();
        self.now = entry.time;
        Some(entry.id)
    }

    fn blocked(&self) -> Vec<MeasureId> {
        self.blocked.iter().map(|entry| entry.id).collect()
    }

    fn remove(&mut self, id: MeasureId) -> bool {
        let before = self.len();
        self.current.retain(|Reverse(entry)| entry.id != id);
        self.next_round.retain(|entry| entry.id != id);
        self.blocked.retain(|entry| entry.id != id);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.current.len() + self.next_round.len() + self.blocked.len()
    }
}

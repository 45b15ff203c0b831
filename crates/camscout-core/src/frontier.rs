//! Breadth-first job frontier for cluster expansion.
//!
//! The frontier owns both the pending queue and the visited set. The only
//! way to obtain work is [`Frontier::pop_unvisited`], which dequeues and
//! marks visited in one step, so a job key is handed out at most once.

use std::collections::{HashSet, VecDeque};

use crate::models::{ExpansionJob, JobKey, ZoomLevel};

/// FIFO queue of expansion jobs plus the set of keys already processed.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<ExpansionJob>,
    visited: HashSet<JobKey>,
    duplicates_skipped: u32,
}

impl Frontier {
    /// A frontier holding exactly one seed job and no visited keys.
    pub fn new(seed: ExpansionJob) -> Self {
        let mut frontier = Self::default();
        frontier.push(seed);
        frontier
    }

    /// Append a job to the back of the queue.
    ///
    /// Duplicates are accepted here and discarded when dequeued.
    pub fn push(&mut self, job: ExpansionJob) {
        self.queue.push_back(job);
    }

    /// Dequeue the oldest job whose key has not been visited and mark it visited.
    ///
    /// Already-visited jobs met on the way are dropped. Returns `None` once the
    /// queue is exhausted.
    pub fn pop_unvisited(&mut self) -> Option<ExpansionJob> {
        while let Some(job) = self.queue.pop_front() {
            if self.visited.insert(job.key()) {
                return Some(job);
            }
            self.duplicates_skipped += 1;
        }
        None
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    pub fn duplicates_skipped(&self) -> u32 {
        self.duplicates_skipped
    }

    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Zoom level at which a cluster found at `current` should be re-queried.
///
/// At least one level deeper, or the cluster's suggestion when that is
/// deeper still, clamped to `max_zoom`. `None` when no progress is possible.
pub fn next_zoom(
    current: ZoomLevel,
    suggested: Option<ZoomLevel>,
    max_zoom: ZoomLevel,
) -> Option<ZoomLevel> {
    let next = match suggested {
        Some(s) if s > current.next() => s,
        _ => current.next(),
    };
    let next = next.min(max_zoom);
    (next > current).then_some(next)
}

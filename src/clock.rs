// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the tick scheduler. All subscriptions on an engine share a single cooperative
//! schedule - one min-heap keyed by next due time - rather than one timer each. The engine
//! pops due entries on every tick and re-inserts each subscription at `due + interval`, so
//! a large clock advance replays every elapsed interval in order.

use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
    time::Instant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduleEntry {
    due: Instant,
    subscription_id: u32,
}

impl Ord for ScheduleEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Due time first, subscription id breaks ties so pop order is deterministic
        self.due
            .cmp(&other.due)
            .then(self.subscription_id.cmp(&other.subscription_id))
    }
}

impl PartialOrd for ScheduleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A schedule of pending subscription ticks. Cancellation is lazy - a cancelled or
/// superseded entry stays in the heap and is discarded when it surfaces, by comparing it
/// with the live deadline for its subscription.
pub(crate) struct TickSchedule {
    heap: BinaryHeap<Reverse<ScheduleEntry>>,
    deadlines: HashMap<u32, Instant>,
}

impl TickSchedule {
    pub fn new() -> TickSchedule {
        TickSchedule {
            heap: BinaryHeap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Schedules the next tick for a subscription, superseding any entry already present.
    pub fn schedule(&mut self, subscription_id: u32, due: Instant) {
        self.deadlines.insert(subscription_id, due);
        self.heap.push(Reverse(ScheduleEntry {
            due,
            subscription_id,
        }));
    }

    /// Removes a subscription from the schedule.
    pub fn cancel(&mut self, subscription_id: u32) {
        self.deadlines.remove(&subscription_id);
    }

    pub fn contains(&self, subscription_id: u32) -> bool {
        self.deadlines.contains_key(&subscription_id)
    }

    /// Pops the next due entry at or before `now`, skipping stale entries. Returns the
    /// subscription id and the deadline it was due at, so the caller can re-schedule
    /// relative to the deadline rather than to `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(u32, Instant)> {
        while let Some(Reverse(entry)) = self.heap.peek().copied() {
            if entry.due > now {
                return None;
            }
            self.heap.pop();
            // Only entries that match the live deadline are current
            if self.deadlines.get(&entry.subscription_id) == Some(&entry.due) {
                self.deadlines.remove(&entry.subscription_id);
                return Some((entry.subscription_id, entry.due));
            }
        }
        None
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::TickSchedule;

    #[test]
    fn pops_in_due_order() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new();
        schedule.schedule(1, start + Duration::from_millis(300));
        schedule.schedule(2, start + Duration::from_millis(100));
        schedule.schedule(3, start + Duration::from_millis(200));

        let now = start + Duration::from_millis(300);
        assert_eq!(schedule.pop_due(now), Some((2, start + Duration::from_millis(100))));
        assert_eq!(schedule.pop_due(now), Some((3, start + Duration::from_millis(200))));
        assert_eq!(schedule.pop_due(now), Some((1, start + Duration::from_millis(300))));
        assert_eq!(schedule.pop_due(now), None);
    }

    #[test]
    fn same_deadline_pops_by_id() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new();
        let due = start + Duration::from_millis(100);
        schedule.schedule(9, due);
        schedule.schedule(4, due);
        assert_eq!(schedule.pop_due(due), Some((4, due)));
        assert_eq!(schedule.pop_due(due), Some((9, due)));
    }

    #[test]
    fn not_due_yet() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new();
        schedule.schedule(1, start + Duration::from_millis(100));
        assert_eq!(schedule.pop_due(start), None);
        assert!(schedule.contains(1));
    }

    #[test]
    fn cancel_discards_entry() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new();
        schedule.schedule(1, start + Duration::from_millis(100));
        schedule.schedule(2, start + Duration::from_millis(200));
        schedule.cancel(1);
        assert!(!schedule.contains(1));
        let now = start + Duration::from_millis(500);
        assert_eq!(schedule.pop_due(now), Some((2, start + Duration::from_millis(200))));
        assert_eq!(schedule.pop_due(now), None);
    }

    #[test]
    fn reschedule_supersedes() {
        let start = Instant::now();
        let mut schedule = TickSchedule::new();
        schedule.schedule(1, start + Duration::from_millis(100));
        // Interval change installs a new deadline; the stale heap entry must not fire
        schedule.schedule(1, start + Duration::from_millis(400));
        let now = start + Duration::from_millis(200);
        assert_eq!(schedule.pop_due(now), None);
        let now = start + Duration::from_millis(400);
        assert_eq!(schedule.pop_due(now), Some((1, start + Duration::from_millis(400))));
    }
}

//! Pending synaptic events, ordered by delivery time then insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Global address of a synapse: owning cell and its slot on that cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SynapseTarget {
    pub cell: u32,
    pub synapse: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynapticEvent {
    /// Delivery time (ms)
    pub time: f64,
    pub target: SynapseTarget,
    pub weight: f64,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    seq: u64,
    event: SynapticEvent,
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
    // Reversed so the max-heap pops the earliest (time, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn schedule(&mut self, event: SynapticEvent) {
        debug_assert!(event.time.is_finite());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { seq, event });
    }

    /// Remove and return every event with `time <= until`, earliest first.
    pub fn pop_due(&mut self, until: f64) -> Vec<SynapticEvent> {
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.event.time > until {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                due.push(entry.event);
            }
        }
        due
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.event.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Snapshot of the queue in delivery order.
    pub fn pending(&self) -> Vec<SynapticEvent> {
        let mut entries: Vec<Entry> = self.heap.iter().copied().collect();
        // Entry's ordering is reversed for the heap
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.event).collect()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ev(time: f64, synapse: usize) -> SynapticEvent {
        SynapticEvent {
            time,
            target: SynapseTarget { cell: 0, synapse },
            weight: 1.0,
        }
    }

    #[test]
    fn pops_only_due_events() {
        let mut q = EventQueue::new();
        q.schedule(ev(3.0, 0));
        q.schedule(ev(1.0, 1));
        q.schedule(ev(2.0, 2));
        let due = q.pop_due(2.0);
        assert_eq!(due.iter().map(|e| e.target.synapse).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek_time(), Some(3.0));
        assert!(q.pop_due(2.999).is_empty());
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut q = EventQueue::new();
        for s in 0..5 {
            q.schedule(ev(4.0, s));
        }
        let order: Vec<_> = q.pending().iter().map(|e| e.target.synapse).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        let popped: Vec<_> = q.pop_due(4.0).iter().map(|e| e.target.synapse).collect();
        assert_eq!(popped, order);
        assert!(q.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut q = EventQueue::new();
        q.schedule(ev(1.0, 0));
        q.clear();
        assert!(q.is_empty());
        assert!(q.pop_due(f64::MAX).is_empty());
    }

    proptest! {
        #[test]
        fn delivery_order_is_time_then_insertion(times in prop::collection::vec(0u8..20, 1..64)) {
            let mut q = EventQueue::new();
            for (i, &t) in times.iter().enumerate() {
                q.schedule(ev(t as f64 * 0.5, i));
            }
            let out = q.pop_due(f64::MAX);
            prop_assert_eq!(out.len(), times.len());
            for w in out.windows(2) {
                prop_assert!(w[0].time <= w[1].time);
                if w[0].time == w[1].time {
                    prop_assert!(w[0].target.synapse < w[1].target.synapse);
                }
            }
        }
    }
}

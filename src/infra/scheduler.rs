use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// Simulation time in seconds since the arena was created.
pub type SimTime = f64;

#[derive(Debug, Clone, PartialEq)]
struct Entry<K> {
    due: SimTime,
    seq: u64,
    key: K,
}

impl<K: PartialEq> Eq for Entry<K> {}

impl<K: PartialEq> Ord for Entry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on due time, FIFO among equal times.
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<K: PartialEq> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-shot deferred events keyed by `K`.
///
/// At most one event per key is live: scheduling an existing key supersedes
/// the pending one. Superseded heap entries are dropped lazily on poll.
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    queue: BinaryHeap<Entry<K>>,
    live: HashMap<K, u64>,
    next_seq: u64,
}

impl<K: Copy + Eq + Hash> Scheduler<K> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn schedule(&mut self, key: K, due: SimTime) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(key, seq);
        self.queue.push(Entry { due, seq, key });
    }

    pub fn pending_count(&self) -> usize {
        self.live.len()
    }

    /// Removes and returns every live event with `due <= now`, earliest first.
    pub fn poll(&mut self, now: SimTime) -> Vec<K> {
        let mut fired = Vec::new();
        while let Some(top) = self.queue.peek() {
            if top.due > now {
                break;
            }
            let Some(entry) = self.queue.pop() else {
                break;
            };
            if self.live.get(&entry.key) == Some(&entry.seq) {
                self.live.remove(&entry.key);
                fired.push(entry.key);
            }
        }
        fired
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.live.clear();
    }
}

impl<K: Copy + Eq + Hash> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut s = Scheduler::new();
        s.schedule('b', 2.0);
        s.schedule('a', 1.0);
        s.schedule('c', 3.0);
        assert!(s.poll(0.5).is_empty());
        assert_eq!(s.poll(2.5), vec!['a', 'b']);
        assert_eq!(s.poll(10.0), vec!['c']);
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn rescheduling_overwrites_pending_event() {
        let mut s = Scheduler::new();
        s.schedule(1u32, 5.0);
        s.schedule(1u32, 9.0);
        assert_eq!(s.pending_count(), 1);
        assert!(s.poll(6.0).is_empty());
        assert_eq!(s.poll(9.0), vec![1]);
        assert!(s.poll(100.0).is_empty());
    }
}

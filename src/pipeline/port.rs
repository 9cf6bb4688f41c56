//! Output ports and their delivery policies.
//!
//! A port belongs to exactly one producing stage and is read by any number of
//! consumers (stage inputs or external readers). Each consumer keeps its own
//! read position, so fan-out never steals frames from a sibling branch.
//!
//! # Policies
//!
//! - **Queued-all** - bounded FIFO. Every record reaches every registered
//!   consumer exactly once, in production order. The oldest record is only
//!   dropped once every consumer has read past it; until then the port
//!   refuses new records ([`Port::can_accept`] is false) and the producer
//!   stalls.
//! - **Latest-only** - one overwritable slot. A consumer never gets the same
//!   record twice in a row but may skip records produced while it was not
//!   reading.
//!
//! Static (non-dynamic) records stay readable after delivery under both
//! policies: once a consumer has caught up, reading again returns the
//! resident static record. This is what lets repeated reads of imported data
//! see the same frame.
//!
//! Ports only track `RecordId`s. [`Port::push`] reports which records the port
//! stopped referencing so the executor can drop its hold in the store.

use crate::pipeline::id::{ConsumerId, PortId, RecordId, StageId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default queue window for ports carrying stream records.
pub const DEFAULT_STREAM_CAPACITY: usize = 4;
/// Default queue window for ports carrying static records.
pub const DEFAULT_STATIC_CAPACITY: usize = 1024;

/// How a port shares records with its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeliveryPolicy {
    /// Never skip, never duplicate.
    #[default]
    #[serde(rename = "process_all_frames", alias = "queued_all")]
    QueuedAll,
    /// Always hand out the freshest record.
    #[serde(rename = "newest_frame_only", alias = "latest_only")]
    LatestOnly,
}

impl std::fmt::Display for DeliveryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryPolicy::QueuedAll => write!(f, "process-all-frames"),
            DeliveryPolicy::LatestOnly => write!(f, "newest-frame-only"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ConsumerState {
    /// Queued-all: sequence number of the next record to read.
    cursor: u64,
    /// Latest-only: the last record handed to this consumer.
    seen: Option<RecordId>,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    pub pushed: u64,
    pub delivered: u64,
    /// Latest-only records replaced before at least one consumer read them.
    pub overwritten: u64,
}

#[derive(Debug)]
pub struct Port {
    id: PortId,
    producer: StageId,
    output_index: usize,
    policy: DeliveryPolicy,
    capacity: Option<usize>,
    stream_capacity: usize,
    static_capacity: usize,
    queue: VecDeque<RecordId>,
    /// Sequence number of `queue.front()`.
    base: u64,
    /// Newest record pushed and whether it is dynamic. Doubles as the
    /// latest-only slot.
    latest: Option<(RecordId, bool)>,
    consumers: HashMap<ConsumerId, ConsumerState>,
    stats: PortStats,
}

impl Port {
    pub fn new(id: PortId, producer: StageId, output_index: usize, policy: DeliveryPolicy) -> Self {
        Self {
            id,
            producer,
            output_index,
            policy,
            capacity: None,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            static_capacity: DEFAULT_STATIC_CAPACITY,
            queue: VecDeque::new(),
            base: 0,
            latest: None,
            consumers: HashMap::new(),
            stats: PortStats::default(),
        }
    }

    /// Override the default stream/static windows used when no explicit capacity is set.
    pub fn with_default_capacities(mut self, stream: usize, static_: usize) -> Self {
        self.stream_capacity = stream.max(1);
        self.static_capacity = static_.max(1);
        self
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn producer(&self) -> StageId {
        self.producer
    }

    pub fn output_index(&self) -> usize {
        self.output_index
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    pub fn stats(&self) -> PortStats {
        self.stats
    }

    /// Pin the queue window regardless of what kind of record flows through.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = Some(capacity.max(1));
    }

    /// Effective queue window: explicit, else picked by whether the newest
    /// record is a stream record.
    pub fn capacity(&self) -> usize {
        match (self.capacity, self.latest) {
            (Some(c), _) => c,
            (None, Some((_, true))) => self.stream_capacity,
            (None, _) => self.static_capacity,
        }
    }

    /// Number of records waiting in the queue (read or not).
    pub fn len(&self) -> usize {
        match self.policy {
            DeliveryPolicy::QueuedAll => self.queue.len(),
            DeliveryPolicy::LatestOnly => usize::from(self.latest.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest record pushed, if any.
    pub fn latest(&self) -> Option<RecordId> {
        self.latest.map(|(r, _)| r)
    }

    // ── Consumers ──

    /// Start tracking `consumer`. Queued-all consumers begin at the oldest
    /// record still queued.
    pub fn register(&mut self, consumer: ConsumerId) {
        let base = self.base;
        self.consumers.entry(consumer).or_insert(ConsumerState {
            cursor: base,
            seen: None,
        });
    }

    pub fn unregister(&mut self, consumer: ConsumerId) {
        self.consumers.remove(&consumer);
    }

    pub fn is_registered(&self, consumer: ConsumerId) -> bool {
        self.consumers.contains_key(&consumer)
    }

    pub fn consumers(&self) -> impl Iterator<Item = ConsumerId> + '_ {
        self.consumers.keys().copied()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    // ── Producer side ──

    fn front_read_by_all(&self) -> bool {
        self.consumers.values().all(|c| c.cursor > self.base)
    }

    /// Whether a push right now would keep every guarantee of the policy.
    pub fn can_accept(&self) -> bool {
        match self.policy {
            DeliveryPolicy::LatestOnly => true,
            DeliveryPolicy::QueuedAll => {
                self.queue.len() < self.capacity() || self.front_read_by_all()
            }
        }
    }

    /// Append `record`. Returns the records this port no longer references.
    ///
    /// Callers check [`Port::can_accept`] first; a queued-all push into a
    /// full queue still appends rather than lose a frame.
    pub fn push(&mut self, record: RecordId, dynamic: bool) -> Vec<RecordId> {
        let mut candidates = Vec::new();
        match self.policy {
            DeliveryPolicy::QueuedAll => {
                let capacity = if self.capacity.is_none() && dynamic {
                    self.stream_capacity
                } else {
                    self.capacity()
                };
                while self.queue.len() >= capacity && self.front_read_by_all() {
                    if let Some(front) = self.queue.pop_front() {
                        candidates.push(front);
                    }
                    self.base += 1;
                }
                if self.queue.len() >= capacity {
                    tracing::warn!(
                        "{:?} over capacity ({} >= {}); producer did not wait",
                        self.id,
                        self.queue.len(),
                        capacity
                    );
                }
                self.queue.push_back(record);
            }
            DeliveryPolicy::LatestOnly => {
                if let Some((old, _)) = self.latest {
                    if self.consumers.values().any(|c| c.seen != Some(old)) {
                        self.stats.overwritten += 1;
                    }
                }
            }
        }
        if let Some((old, _)) = self.latest.replace((record, dynamic)) {
            candidates.push(old);
        }
        self.stats.pushed += 1;

        candidates.sort_unstable();
        candidates.dedup();
        candidates.retain(|r| !self.references(*r));
        candidates
    }

    /// Whether `record` is referenced anywhere in this port.
    pub fn references(&self, record: RecordId) -> bool {
        self.latest() == Some(record) || self.queue.contains(&record)
    }

    /// Every record the port references, once each.
    pub fn referenced(&self) -> Vec<RecordId> {
        let mut all: Vec<RecordId> = self.queue.iter().copied().collect();
        all.extend(self.latest());
        all.sort_unstable();
        all.dedup();
        all
    }

    // ── Consumer side ──

    /// Whether `consumer` has a record it has not been handed yet.
    pub fn has_unread(&self, consumer: ConsumerId) -> bool {
        let Some(state) = self.consumers.get(&consumer) else {
            return false;
        };
        match self.policy {
            DeliveryPolicy::QueuedAll => state.cursor < self.base + self.queue.len() as u64,
            DeliveryPolicy::LatestOnly => match self.latest {
                Some((r, _)) => state.seen != Some(r),
                None => false,
            },
        }
    }

    /// Record `consumer` would get from [`Port::read`], without advancing.
    pub fn peek(&self, consumer: ConsumerId) -> Option<RecordId> {
        let state = self.consumers.get(&consumer)?;
        if self.has_unread(consumer) {
            return match self.policy {
                DeliveryPolicy::QueuedAll => {
                    self.queue.get((state.cursor - self.base) as usize).copied()
                }
                DeliveryPolicy::LatestOnly => self.latest(),
            };
        }
        match self.latest {
            Some((r, false)) => Some(r),
            _ => None,
        }
    }

    /// Hand the next record to `consumer` and advance its position.
    pub fn read(&mut self, consumer: ConsumerId) -> Option<RecordId> {
        let unread = self.has_unread(consumer);
        let record = self.peek(consumer)?;
        if let Some(state) = self.consumers.get_mut(&consumer) {
            match self.policy {
                DeliveryPolicy::QueuedAll if unread => state.cursor += 1,
                DeliveryPolicy::QueuedAll => {}
                DeliveryPolicy::LatestOnly => state.seen = Some(record),
            }
        }
        self.stats.delivered += 1;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::ReaderId;
    use proptest::prelude::*;

    const A: ConsumerId = ConsumerId::Reader(ReaderId(0));
    const B: ConsumerId = ConsumerId::Reader(ReaderId(1));

    fn port(policy: DeliveryPolicy) -> Port {
        Port::new(PortId(0), StageId(0), 0, policy)
    }

    #[test]
    fn test_queued_all_delivers_in_order_to_each_consumer() {
        let mut p = port(DeliveryPolicy::QueuedAll);
        p.register(A);
        p.register(B);
        for i in 0..3 {
            p.push(RecordId(i), true);
        }
        let a: Vec<_> = (0..3).filter_map(|_| p.read(A)).collect();
        assert_eq!(a, vec![RecordId(0), RecordId(1), RecordId(2)]);
        assert_eq!(p.read(A), None);

        assert_eq!(p.read(B), Some(RecordId(0)));
        p.push(RecordId(3), true);
        let b: Vec<_> = (0..3).filter_map(|_| p.read(B)).collect();
        assert_eq!(b, vec![RecordId(1), RecordId(2), RecordId(3)]);
    }

    #[test]
    fn test_queued_all_refuses_when_slowest_consumer_is_behind() {
        let mut p = port(DeliveryPolicy::QueuedAll);
        p.set_capacity(2);
        p.register(A);
        p.register(B);
        p.push(RecordId(0), true);
        p.push(RecordId(1), true);
        p.read(A);
        assert!(!p.can_accept(), "B has not read record 0");

        p.read(B);
        assert!(p.can_accept());
        let evicted = p.push(RecordId(2), true);
        assert_eq!(evicted, vec![RecordId(0)]);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_queued_all_without_consumers_keeps_window() {
        let mut p = port(DeliveryPolicy::QueuedAll);
        p.set_capacity(1);
        assert!(p.push(RecordId(0), true).is_empty());
        assert!(p.can_accept());
        assert_eq!(p.push(RecordId(1), true), vec![RecordId(0)]);

        p.register(A);
        assert_eq!(p.read(A), Some(RecordId(1)));
    }

    #[test]
    fn test_stream_records_use_stream_window() {
        let mut p = port(DeliveryPolicy::QueuedAll).with_default_capacities(2, 100);
        assert_eq!(p.capacity(), 100);
        p.push(RecordId(0), true);
        assert_eq!(p.capacity(), 2);
    }

    #[test]
    fn test_latest_only_skips_but_never_repeats() {
        let mut p = port(DeliveryPolicy::LatestOnly);
        p.register(A);
        p.push(RecordId(0), true);
        p.push(RecordId(1), true);
        assert_eq!(p.stats().overwritten, 1);
        assert_eq!(p.read(A), Some(RecordId(1)));
        assert_eq!(p.read(A), None);
        p.push(RecordId(2), true);
        assert_eq!(p.read(A), Some(RecordId(2)));
    }

    #[test]
    fn test_latest_only_tracks_consumers_separately() {
        let mut p = port(DeliveryPolicy::LatestOnly);
        p.register(A);
        p.register(B);
        let evicted = p.push(RecordId(0), true);
        assert!(evicted.is_empty());
        assert_eq!(p.read(A), Some(RecordId(0)));
        assert!(p.has_unread(B));
        assert_eq!(p.push(RecordId(1), true), vec![RecordId(0)]);
        assert_eq!(p.read(B), Some(RecordId(1)));
    }

    #[test]
    fn test_static_record_stays_readable() {
        for policy in [DeliveryPolicy::QueuedAll, DeliveryPolicy::LatestOnly] {
            let mut p = port(policy);
            p.register(A);
            p.push(RecordId(7), false);
            for _ in 0..3 {
                assert_eq!(p.read(A), Some(RecordId(7)), "{policy}");
            }
            assert!(!p.has_unread(A));
        }
    }

    #[test]
    fn test_unregistered_consumer_reads_nothing() {
        let mut p = port(DeliveryPolicy::QueuedAll);
        p.push(RecordId(0), false);
        assert_eq!(p.peek(A), None);
        assert_eq!(p.read(A), None);
    }

    proptest! {
        #[test]
        fn test_queued_all_consumers_see_identical_order(
            ops in prop::collection::vec(0u8..3, 1..200),
            capacity in 1usize..6,
        ) {
            let mut p = port(DeliveryPolicy::QueuedAll);
            p.set_capacity(capacity);
            p.register(A);
            p.register(B);

            let mut produced = Vec::new();
            let mut seen_a = Vec::new();
            let mut seen_b = Vec::new();
            for op in ops {
                match op {
                    0 => {
                        if p.can_accept() {
                            let id = RecordId(produced.len() as u32);
                            p.push(id, true);
                            produced.push(id);
                        }
                    }
                    1 => seen_a.extend(p.read(A)),
                    _ => seen_b.extend(p.read(B)),
                }
            }
            seen_a.extend(std::iter::from_fn(|| p.read(A)));
            seen_b.extend(std::iter::from_fn(|| p.read(B)));

            prop_assert_eq!(&seen_a, &produced);
            prop_assert_eq!(&seen_b, &produced);
        }

        #[test]
        fn test_latest_only_reads_strictly_increase(
            ops in prop::collection::vec(any::<bool>(), 1..200),
        ) {
            let mut p = port(DeliveryPolicy::LatestOnly);
            p.register(A);
            let mut next = 0u32;
            let mut last: Option<RecordId> = None;
            for push in ops {
                if push {
                    p.push(RecordId(next), true);
                    next += 1;
                } else if let Some(r) = p.read(A) {
                    if let Some(prev) = last {
                        prop_assert!(r > prev);
                    }
                    last = Some(r);
                }
            }
        }
    }
}

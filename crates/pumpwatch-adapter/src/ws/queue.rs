/*
[INPUT]:  Parsed inbound payloads in arrival order
[OUTPUT]: Bounded FIFO batches for the drain tick
[POS]:    WebSocket layer - inbound backpressure (drop-oldest under overload)
[UPDATE]: When changing overflow policy or batch sizing
*/

use std::collections::VecDeque;

use serde_json::Value;
use tokio::time::Instant;

/// One queued inbound payload.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub payload: Value,
    pub enqueued_at: Instant,
}

/// Diagnostic view of the inbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStatus {
    pub len: usize,
    pub draining: bool,
}

/// Bounded FIFO; pushing past capacity evicts from the front.
#[derive(Debug)]
pub struct MessageQueue {
    entries: VecDeque<QueuedMessage>,
    capacity: usize,
    dropped_total: u64,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1_024)),
            capacity: capacity.max(1),
            dropped_total: 0,
        }
    }

    /// Append a payload, returning how many old entries were evicted.
    pub fn push(&mut self, payload: Value, now: Instant) -> usize {
        self.entries.push_back(QueuedMessage {
            payload,
            enqueued_at: now,
        });

        let mut dropped = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            dropped += 1;
        }
        self.dropped_total += dropped as u64;
        dropped
    }

    /// Number of entries the next drain tick takes: a share of the backlog,
    /// at least one, at most `max_batch`.
    pub fn batch_size(&self, fraction: f64, max_batch: usize) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let share = (self.entries.len() as f64 * fraction).ceil() as usize;
        share.clamp(1, max_batch.max(1)).min(self.entries.len())
    }

    /// Remove up to `count` entries from the front.
    pub fn pop_batch(&mut self, count: usize) -> Vec<QueuedMessage> {
        let count = count.min(self.entries.len());
        self.entries.drain(..count).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    /// Age of the oldest entry still waiting.
    pub fn oldest_age(&self, now: Instant) -> Option<std::time::Duration> {
        self.entries
            .front()
            .map(|entry| now.saturating_duration_since(entry.enqueued_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq_of(messages: &[QueuedMessage]) -> Vec<u64> {
        messages
            .iter()
            .map(|m| m.payload["seq"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn overflow_keeps_most_recent_in_order() {
        let now = Instant::now();
        let mut queue = MessageQueue::new(100);
        let mut dropped = 0;
        for seq in 1..=130u64 {
            dropped += queue.push(json!({ "seq": seq }), now);
        }

        assert_eq!(queue.len(), 100);
        assert_eq!(dropped, 30);
        assert_eq!(queue.dropped_total(), 30);

        let all = queue.pop_batch(usize::MAX);
        assert_eq!(seq_of(&all), (31..=130).collect::<Vec<_>>());
    }

    #[test]
    fn batch_size_tracks_backlog() {
        let now = Instant::now();
        let mut queue = MessageQueue::new(1_000);
        assert_eq!(queue.batch_size(0.25, 20), 0);

        queue.push(json!({ "seq": 1 }), now);
        assert_eq!(queue.batch_size(0.25, 20), 1);

        for seq in 2..=12u64 {
            queue.push(json!({ "seq": seq }), now);
        }
        assert_eq!(queue.batch_size(0.25, 20), 3);

        for seq in 13..=400u64 {
            queue.push(json!({ "seq": seq }), now);
        }
        assert_eq!(queue.batch_size(0.25, 20), 20);
    }

    #[test]
    fn pop_batch_is_fifo_and_never_duplicates() {
        let now = Instant::now();
        let mut queue = MessageQueue::new(10);
        for seq in 1..=5u64 {
            queue.push(json!({ "seq": seq }), now);
        }

        assert_eq!(seq_of(&queue.pop_batch(2)), vec![1, 2]);
        assert_eq!(seq_of(&queue.pop_batch(10)), vec![3, 4, 5]);
        assert!(queue.pop_batch(3).is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_age_reports_wait_time() {
        let mut queue = MessageQueue::new(4);
        assert!(queue.oldest_age(Instant::now()).is_none());

        queue.push(json!("first"), Instant::now());
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        assert_eq!(
            queue.oldest_age(Instant::now()),
            Some(std::time::Duration::from_millis(250))
        );
    }
}

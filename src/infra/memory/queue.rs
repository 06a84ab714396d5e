//! In-memory queue with visibility leases on the tokio clock.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::Message;
use crate::errors::{AppError, AppResult};
use crate::infra::queue::{parse_receipt_handle, receipt_handle, receive_batch_size};
use crate::infra::MessageQueue;

#[derive(Debug)]
struct Lease {
    message: Message,
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Message>,
    in_flight: HashMap<Uuid, Lease>,
}

impl QueueState {
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(lease) = self.in_flight.remove(&id) {
                self.ready.push_front(lease.message);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    fail_receives: AtomicBool,
    failing_deletes: AtomicUsize,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, receive calls fail.
    pub fn set_receive_failure(&self, fail: bool) {
        self.fail_receives.store(fail, Ordering::SeqCst);
    }

    /// Make the next `n` delete calls fail.
    pub fn fail_next_deletes(&self, n: usize) {
        self.failing_deletes.store(n, Ordering::SeqCst);
    }

    /// Messages not yet deleted, leased or not.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.in_flight.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Messages currently leased to a receiver.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, message: &Message) -> AppResult<()> {
        let mut stored = message.clone();
        stored.receipt_handle = None;
        self.state.lock().await.ready.push_back(stored);
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> AppResult<Vec<Message>> {
        if self.fail_receives.load(Ordering::SeqCst) {
            return Err(AppError::queue("receive messages", "queue unavailable"));
        }

        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.requeue_expired(now);

        let mut received = Vec::new();
        while received.len() < receive_batch_size(max_messages) {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            let token = Uuid::new_v4().simple().to_string();
            message.receipt_handle = Some(receipt_handle(message.id, &token));
            state.in_flight.insert(
                message.id,
                Lease {
                    message: Message {
                        receipt_handle: None,
                        ..message.clone()
                    },
                    token,
                    expires_at: now + visibility_timeout,
                },
            );
            received.push(message);
        }

        Ok(received)
    }

    async fn delete(&self, message: &Message) -> AppResult<()> {
        let injected = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::queue("delete message", "queue unavailable"));
        }

        let (id, token) = parse_receipt_handle(message)?;
        let mut state = self.state.lock().await;

        let live = state
            .in_flight
            .get(&id)
            .is_some_and(|lease| lease.token == token && lease.expires_at > Instant::now());
        if !live {
            return Err(AppError::queue(
                "delete message",
                format!("receipt handle for message {} is stale", id),
            ));
        }

        state.in_flight.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_receive_is_capped_at_ten() {
        let queue = MemoryQueue::new();
        for i in 0..15 {
            queue.send(&Message::new(i.to_string())).await.unwrap();
        }

        let batch = queue.receive(50, LEASE).await.unwrap();
        assert_eq!(batch.len(), 10);
        assert!(batch.iter().all(|m| m.receipt_handle.is_some()));
        assert_eq!(queue.in_flight().await, 10);
    }

    #[tokio::test]
    async fn test_leased_messages_are_hidden() {
        let queue = MemoryQueue::new();
        queue.send(&Message::new("only")).await.unwrap();

        assert_eq!(queue.receive(10, LEASE).await.unwrap().len(), 1);
        assert!(queue.receive(10, LEASE).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_is_redelivered_and_old_handle_goes_stale() {
        let queue = MemoryQueue::new();
        queue.send(&Message::new("again")).await.unwrap();

        let first = queue.receive(1, LEASE).await.unwrap().remove(0);
        tokio::time::advance(LEASE + Duration::from_secs(1)).await;

        let second = queue.receive(1, LEASE).await.unwrap().remove(0);
        assert_eq!(first.id, second.id);
        assert_ne!(first.receipt_handle, second.receipt_handle);

        assert!(queue.delete(&first).await.is_err());
        queue.delete(&second).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_injected_delete_failure_keeps_message() {
        let queue = MemoryQueue::new();
        queue.send(&Message::new("keep")).await.unwrap();
        queue.fail_next_deletes(1);

        let message = queue.receive(1, LEASE).await.unwrap().remove(0);
        assert!(queue.delete(&message).await.is_err());
        assert_eq!(queue.len().await, 1);

        queue.delete(&message).await.unwrap();
        assert!(queue.is_empty().await);
    }
}

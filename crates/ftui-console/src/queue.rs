//! FIFO hand-off between the submission path and the single worker.
//!
//! [`CommandQueue::push`] never blocks beyond the internal lock, so the
//! interactive thread returns immediately. [`CommandQueue::pop`] waits on a
//! condition variable for at most the given timeout, which lets the worker
//! poll its stop flag without spinning.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::command::PendingCommand;
use crate::error::{ConsoleError, Result};

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<PendingCommand>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue a command at the tail.
    ///
    /// Fails with [`ConsoleError::QueueClosed`] once the queue is closed.
    pub fn push(&self, command: PendingCommand) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(ConsoleError::QueueClosed);
        }
        inner.items.push_back(command);
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// Dequeue the head, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `Ok(None)` when the timeout expires with nothing queued and
    /// `Err(QueueClosed)` once the queue is closed and drained.
    pub fn pop(&self, timeout: Duration) -> Result<Option<PendingCommand>> {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(86_400));
        let mut inner = self.lock();
        loop {
            if let Some(command) = inner.items.pop_front() {
                return Ok(Some(command));
            }
            if inner.closed {
                return Err(ConsoleError::QueueClosed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _) = self
                .available
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
        }
    }

    /// Refuse further pushes and wake every waiter. Queued commands can
    /// still be popped.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Remove and return everything still queued.
    pub fn drain(&self) -> Vec<PendingCommand> {
        self.lock().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn command(id: u64) -> PendingCommand {
        PendingCommand::new(id, format!("echo {id}"), "/", Duration::from_secs(1))
    }

    #[test]
    fn pops_in_push_order() {
        let queue = CommandQueue::new();
        for id in 0..5 {
            queue.push(command(id)).expect("push");
        }
        let ids: Vec<u64> = (0..5)
            .map(|_| queue.pop(Duration::ZERO).expect("pop").expect("item").id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let queue = CommandQueue::new();
        let start = Instant::now();
        assert!(queue.pop(Duration::from_millis(30)).expect("pop").is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pop_wakes_on_push() {
        let queue = Arc::new(CommandQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(command(7)).expect("push");
            })
        };
        let popped = queue.pop(Duration::from_secs(5)).expect("pop");
        assert_eq!(popped.map(|c| c.id), Some(7));
        producer.join().expect("producer");
    }

    #[test]
    fn closed_queue_rejects_push_but_drains() {
        let queue = CommandQueue::new();
        queue.push(command(1)).expect("push");
        queue.close();
        assert!(matches!(queue.push(command(2)), Err(ConsoleError::QueueClosed)));
        assert_eq!(queue.pop(Duration::ZERO).expect("pop").map(|c| c.id), Some(1));
        assert!(matches!(
            queue.pop(Duration::from_secs(1)),
            Err(ConsoleError::QueueClosed)
        ));
    }

    #[test]
    fn close_wakes_blocked_pop() {
        let queue = Arc::new(CommandQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        let result = waiter.join().expect("waiter");
        assert!(matches!(result, Err(ConsoleError::QueueClosed)));
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let queue = Arc::new(CommandQueue::new());
        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for n in 0..100u64 {
                        queue.push(command(p * 1000 + n)).expect("push");
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer");
        }

        let mut last_seen = [None::<u64>; 4];
        let mut total = 0;
        while let Some(item) = queue.pop(Duration::ZERO).expect("pop") {
            let producer = (item.id / 1000) as usize;
            let seq = item.id % 1000;
            if let Some(prev) = last_seen[producer] {
                assert!(seq > prev, "producer {producer} reordered: {prev} then {seq}");
            }
            last_seen[producer] = Some(seq);
            total += 1;
        }
        assert_eq!(total, 400);
    }
}

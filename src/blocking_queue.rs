use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct QueueState<E> {
    elements: VecDeque<E>,
    active: usize,
    closed: bool,
}

impl<E> QueueState<E> {
    fn new() -> QueueState<E> {
        QueueState {
            elements: VecDeque::new(),
            active: 0,
            closed: false,
        }
    }

    fn is_idle(&self) -> bool {
        self.elements.is_empty() && self.active == 0
    }
}

/// Blocking unbounded queue
///
/// `E: Send` - the element type
/// This is a multiple producers / multiple consumers FIFO queue that can be closed. After
/// [BlockingQueue::close] no element is accepted, and consumers keep receiving the elements
/// that are already queued until the queue is empty, then [BlockingQueue::dequeue] returns `None`.
///
/// Every element handed out by [BlockingQueue::dequeue] is counted as active until the consumer
/// reports it with [BlockingQueue::task_done]. This allows waiting for the queue to become idle.
/// Reference: [Producer-Consumer](https://en.wikipedia.org/wiki/Producer%E2%80%93consumer_problem)
pub struct BlockingQueue<E> where E: Send {
    state: Mutex<QueueState<E>>,
    available: Condvar,
    idle: Condvar,
}

impl<E> BlockingQueue<E> where E: Send {
    /// Create a new open queue
    /// ```
    /// use task_pool::blocking_queue::BlockingQueue;
    /// let q: BlockingQueue<i32> = BlockingQueue::new();
    /// assert!(q.is_empty());
    /// ```
    pub fn new() -> BlockingQueue<E> {
        BlockingQueue::<E> {
            state: Mutex::new(QueueState::new()),
            available: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    // No user code runs while the lock is held, so a poisoned lock still guards a consistent state.
    fn lock(&self) -> MutexGuard<'_, QueueState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current length of the queue. Note that the reported length is correct at the time
    /// of checking, the actual length may change between the call and the access to the result
    /// value. Should be used for diagnostic and monitoring only.
    /// ```
    /// use task_pool::blocking_queue::BlockingQueue;
    /// let q: BlockingQueue<i32> = BlockingQueue::new();
    /// q.enqueue(11).unwrap();
    /// assert_eq!(q.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.lock().elements.len()
    }

    /// Indication if the queue is empty in this point of time. Should be used for diagnostic
    /// and monitoring only.
    pub fn is_empty(&self) -> bool {
        self.lock().elements.is_empty()
    }

    /// Number of dequeued elements not yet reported with [BlockingQueue::task_done]
    pub fn active(&self) -> usize {
        self.lock().active
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Append an element to the tail and wake one waiting consumer.
    ///
    /// Returns the element back to the caller when the queue is closed.
    pub fn enqueue(&self, element: E) -> Result<(), E> {
        let mut state = self.lock();
        if state.closed {
            return Err(element);
        }
        state.elements.push_back(element);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Dequeue an element from the head. When the queue is empty will block until an element is
    /// available or the queue is closed.
    ///
    /// Returns `None` only when the queue is closed and empty.
    pub fn dequeue(&self) -> Option<E> {
        let mut state = self.lock();
        loop {
            if let Some(element) = state.elements.pop_front() {
                state.active += 1;
                return Some(element);
            }
            if state.closed {
                return None;
            }
            state = self.available.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Report that processing of a dequeued element has finished
    pub fn task_done(&self) {
        let mut state = self.lock();
        debug_assert!(state.active > 0, "task_done called more times than dequeue");
        state.active = state.active.saturating_sub(1);
        let idle = state.is_idle();
        drop(state);
        if idle {
            self.idle.notify_all();
        }
    }

    /// Stop accepting elements and wake all consumers.
    ///
    /// Returns `true` if this call closed the queue, `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let was_open = !state.closed;
        state.closed = true;
        drop(state);
        self.available.notify_all();
        was_open
    }

    /// Remove all queued elements and return them to the caller. Active elements are not
    /// affected.
    pub fn discard(&self) -> Vec<E> {
        let mut state = self.lock();
        let discarded: Vec<E> = state.elements.drain(..).collect();
        let idle = state.is_idle();
        drop(state);
        if idle {
            self.idle.notify_all();
        }
        discarded
    }

    /// Wait until the queue is empty and no dequeued element is active.
    ///
    /// Note that the idle state is temporary. This method is mostly useful when we know that no
    /// elements are to be enqueued and we want an indication of completion.
    pub fn wait_idle(&self) {
        let mut state = self.lock();
        while !state.is_idle() {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait until the queue is idle or the timeout expires. Returns `true` if the queue was
    /// observed idle.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => {
                self.wait_idle();
                return true;
            }
        };
        let mut state = self.lock();
        while !state.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (s, _timeout_result) = self.idle
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = s;
        }
        true
    }
}

impl<E> Default for BlockingQueue<E> where E: Send {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread::{self, Builder};

    use super::*;

    #[test]
    fn test_fifo() {
        let q = BlockingQueue::<i32>::new();
        for i in 0..128 {
            q.enqueue(i).unwrap();
        }

        for i in 0..128 {
            assert_eq!(q.dequeue().unwrap(), i);
        }
        assert_eq!(q.active(), 128);
    }

    #[test]
    fn test_enqueue_after_close() {
        let q = BlockingQueue::<i32>::new();
        q.enqueue(1).unwrap();
        assert!(q.close());
        assert!(!q.close());
        assert_eq!(q.enqueue(2), Err(2));

        // already queued elements are still handed out
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), None);
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn test_close_wakes_consumers() {
        let q = Arc::new(BlockingQueue::<i32>::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let qc = q.clone();
                Builder::new()
                    .spawn(move || qc.dequeue())
                    .unwrap()
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        q.close();
        for c in consumers {
            assert_eq!(c.join().expect("failed to join consumer"), None);
        }
    }

    #[test]
    fn test_discard() {
        let q = BlockingQueue::<i32>::new();
        for i in 0..4 {
            q.enqueue(i).unwrap();
        }
        assert_eq!(q.dequeue(), Some(0));
        q.close();
        assert_eq!(q.discard(), vec![1, 2, 3]);
        assert!(q.is_empty());
        assert_eq!(q.active(), 1);
        assert!(!q.wait_idle_timeout(Duration::from_millis(10)));
        q.task_done();
        assert!(q.wait_idle_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_idle() {
        let q = Arc::new(BlockingQueue::<u64>::new());
        for i in 0..16 {
            q.enqueue(i).unwrap();
        }
        assert!(!q.wait_idle_timeout(Duration::from_millis(0)));

        let qc = q.clone();
        let consumer = Builder::new()
            .spawn(move || {
                while let Some(e) = qc.dequeue() {
                    thread::sleep(Duration::from_millis(e % 3));
                    qc.task_done();
                }
            })
            .unwrap();

        q.wait_idle();
        assert!(q.is_empty());
        assert_eq!(q.active(), 0);
        assert!(q.wait_idle_timeout(Duration::MAX));

        q.close();
        consumer.join().expect("failed to join consumer");
    }

    #[test]
    fn test_mpmc() {
        let q = Arc::new(BlockingQueue::<(i32, i32)>::new());
        let qp1 = q.clone();
        let qp2 = q.clone();

        let p1 = Builder::new()
            .spawn(
                move || {
                    for i in 0..2048 {
                        qp1.enqueue((1, i)).unwrap();
                    }
                }
            );

        let p2 = Builder::new()
            .spawn(
                move || {
                    for i in 0..2048 {
                        qp2.enqueue((2, i)).unwrap();
                    }
                }
            );

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let qc = q.clone();
                Builder::new()
                    .spawn(
                        move || {
                            let mut collector = Vec::<(i32, i32)>::new();
                            while let Some(e) = qc.dequeue() {
                                collector.push(e);
                                qc.task_done();
                            }
                            collector
                        }
                    )
                    .unwrap()
            })
            .collect();

        p1.unwrap().join().expect("failed to join producer");
        p2.unwrap().join().expect("failed to join producer");
        q.close();

        let mut collector = Vec::<(i32, i32)>::new();
        for c in consumers {
            let mut part = c.join().expect("failed to join consumer");
            // each consumer sees the elements of one producer in order
            for producer in [1, 2] {
                let seen: Vec<i32> = part.iter().filter(|e| e.0 == producer).map(|e| e.1).collect();
                assert!(seen.windows(2).all(|w| w[0] < w[1]));
            }
            collector.append(&mut part);
        }

        collector.sort();
        let expected: Vec<(i32, i32)> = (1..=2)
            .flat_map(|p| (0..2048).map(move |i| (p, i)))
            .collect();
        assert_eq!(collector, expected);
        assert_eq!(q.active(), 0);
    }
}

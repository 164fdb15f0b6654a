//! Implementation of the bounded ticket pool shared by vendors and customers
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cancel::CancelFlag;
use crate::error::Cancelled;

/// A single ticket, identified by an opaque string
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Ticket(String);

impl Ticket {
    /// Create a ticket with the given identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The ticket's identifier
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Consume the ticket, returning its identifier
    pub fn into_id(self) -> String {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time statistics of a [`TicketPool`]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatistics {
    /// Number of tickets currently in the pool
    pub current_size: usize,
    /// Maximum number of tickets the pool can hold
    pub capacity: usize,
    /// Successful insertions plus successful removals
    ///
    /// Every ticket that passes through the pool is counted twice: once when
    /// a vendor puts it in and once when a customer takes it out.
    pub total_processed: u64,
    /// Largest number of tickets the pool has held at once
    pub peak_size: usize,
}

/// A thread parked in the pool, waiting for its turn
struct Waiter {
    id: u64,
    wake: Arc<Condvar>,
}

struct PoolState {
    tickets: VecDeque<Ticket>,
    total_processed: u64,
    peak_size: usize,

    /// blocked vendors, in arrival order
    inserters: VecDeque<Waiter>,
    /// blocked customers, in arrival order
    removers: VecDeque<Waiter>,
    next_waiter: u64,
}

impl PoolState {
    fn enqueue(&mut self, side: Side) -> (u64, Arc<Condvar>) {
        let id = self.next_waiter;
        self.next_waiter += 1;
        let wake = Arc::new(Condvar::new());
        self.queue(side).push_back(Waiter {
            id,
            wake: wake.clone(),
        });
        (id, wake)
    }

    fn queue(&mut self, side: Side) -> &mut VecDeque<Waiter> {
        match side {
            Side::Insert => &mut self.inserters,
            Side::Remove => &mut self.removers,
        }
    }

    fn is_front(&self, side: Side, id: u64) -> bool {
        let queue = match side {
            Side::Insert => &self.inserters,
            Side::Remove => &self.removers,
        };
        queue.front().map(|w| w.id) == Some(id)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Side {
    Insert,
    Remove,
}

/// Bounded FIFO buffer of tickets
///
/// A single mutex guards the tickets, the statistics and both waiter queues.
/// Blocked callers are served strictly in arrival order: every waiter parks on
/// its own condition variable and only the head of its queue may complete, so
/// handing a slot over wakes exactly one thread.
pub struct TicketPool {
    capacity: usize,
    state: Mutex<PoolState>,
}

impl TicketPool {
    /// Create an empty pool holding at most `capacity` tickets
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: capacity.get(),
            state: Mutex::new(PoolState {
                tickets: VecDeque::new(),
                total_processed: 0,
                peak_size: 0,
                inserters: VecDeque::new(),
                removers: VecDeque::new(),
                next_waiter: 0,
            }),
        }
    }

    /// Maximum number of tickets in the pool
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tickets currently in the pool
    pub fn len(&self) -> usize {
        self.state.lock().tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Number of vendors currently blocked in [`Self::insert()`]
    pub fn waiting_inserters(&self) -> usize {
        self.state.lock().inserters.len()
    }

    /// Number of customers currently blocked in [`Self::remove()`]
    pub fn waiting_removers(&self) -> usize {
        self.state.lock().removers.len()
    }

    /// Add `ticket` to the back of the pool, blocking while the pool is full.
    ///
    /// Returns [`Cancelled`] as soon as `cancel` is set and the pool has been
    /// [interrupted](Self::interrupt); the ticket is dropped in that case and
    /// the pool is left untouched.
    pub fn insert(&self, ticket: Ticket, cancel: &CancelFlag) -> Result<(), Cancelled> {
        let mut state = self.state.lock();
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if state.inserters.is_empty() && state.tickets.len() < self.capacity {
            self.push(&mut state, ticket);
            return Ok(());
        }

        let (id, wake) = state.enqueue(Side::Insert);
        loop {
            if cancel.is_cancelled() {
                state.inserters.retain(|w| w.id != id);
                self.signal_inserter(&state);
                return Err(Cancelled);
            }
            if state.is_front(Side::Insert, id) && state.tickets.len() < self.capacity {
                state.inserters.pop_front();
                self.push(&mut state, ticket);
                self.signal_inserter(&state);
                return Ok(());
            }
            wake.wait(&mut state);
        }
    }

    /// Take the oldest ticket out of the pool, blocking while the pool is
    /// empty.
    ///
    /// Returns [`Cancelled`] as soon as `cancel` is set and the pool has been
    /// [interrupted](Self::interrupt).
    pub fn remove(&self, cancel: &CancelFlag) -> Result<Ticket, Cancelled> {
        let mut state = self.state.lock();
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if state.removers.is_empty() {
            if let Some(ticket) = self.pop(&mut state) {
                return Ok(ticket);
            }
        }

        let (id, wake) = state.enqueue(Side::Remove);
        loop {
            if cancel.is_cancelled() {
                state.removers.retain(|w| w.id != id);
                self.signal_remover(&state);
                return Err(Cancelled);
            }
            if state.is_front(Side::Remove, id) && !state.tickets.is_empty() {
                state.removers.pop_front();
                if let Some(ticket) = self.pop(&mut state) {
                    self.signal_remover(&state);
                    return Ok(ticket);
                }
            }
            wake.wait(&mut state);
        }
    }

    /// Add `ticket` only if it can be done without waiting.
    ///
    /// Hands the ticket back if the pool is full or other vendors are already
    /// queued for a slot.
    pub fn try_insert(&self, ticket: Ticket) -> Result<(), Ticket> {
        let mut state = self.state.lock();
        if state.inserters.is_empty() && state.tickets.len() < self.capacity {
            self.push(&mut state, ticket);
            Ok(())
        } else {
            Err(ticket)
        }
    }

    /// Take the oldest ticket only if it can be done without waiting.
    pub fn try_remove(&self) -> Option<Ticket> {
        let mut state = self.state.lock();
        if state.removers.is_empty() {
            self.pop(&mut state)
        } else {
            None
        }
    }

    /// Wake every blocked caller so it re-checks its cancellation flag.
    ///
    /// Callers whose flag is not set go back to waiting in their original
    /// position.
    pub fn interrupt(&self) {
        let state = self.state.lock();
        for waiter in state.inserters.iter().chain(state.removers.iter()) {
            waiter.wake.notify_one();
        }
    }

    /// Consistent snapshot of size, capacity and counters
    pub fn statistics(&self) -> PoolStatistics {
        let state = self.state.lock();
        PoolStatistics {
            current_size: state.tickets.len(),
            capacity: self.capacity,
            total_processed: state.total_processed,
            peak_size: state.peak_size,
        }
    }

    fn push(&self, state: &mut MutexGuard<'_, PoolState>, ticket: Ticket) {
        state.tickets.push_back(ticket);
        state.total_processed += 1;
        state.peak_size = state.peak_size.max(state.tickets.len());
        trace!(
            size = state.tickets.len(),
            capacity = self.capacity,
            "ticket added to pool"
        );
        self.signal_remover(state);
    }

    fn pop(&self, state: &mut MutexGuard<'_, PoolState>) -> Option<Ticket> {
        let ticket = state.tickets.pop_front()?;
        state.total_processed += 1;
        trace!(
            size = state.tickets.len(),
            capacity = self.capacity,
            "ticket removed from pool"
        );
        self.signal_inserter(state);
        Some(ticket)
    }

    /// wake the first queued vendor if a slot is free
    fn signal_inserter(&self, state: &PoolState) {
        if state.tickets.len() < self.capacity {
            if let Some(waiter) = state.inserters.front() {
                waiter.wake.notify_one();
            }
        }
    }

    /// wake the first queued customer if a ticket is available
    fn signal_remover(&self, state: &PoolState) {
        if !state.tickets.is_empty() {
            if let Some(waiter) = state.removers.front() {
                waiter.wake.notify_one();
            }
        }
    }
}

impl fmt::Debug for TicketPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.statistics();
        write!(
            f,
            "TicketPool[size={}, capacity={}, processed={}, peak={}]",
            stats.current_size, stats.capacity, stats.total_processed, stats.peak_size
        )
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn pool(capacity: usize) -> Arc<TicketPool> {
        Arc::new(TicketPool::new(NonZeroUsize::new(capacity).unwrap()))
    }

    fn wait_for(cond: impl Fn() -> bool) {
        while !cond() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn statistics_count_both_sides() {
        let pool = pool(3);
        let cancel = CancelFlag::new();
        pool.insert(Ticket::new("a"), &cancel).unwrap();
        pool.insert(Ticket::new("b"), &cancel).unwrap();
        assert_eq!(pool.remove(&cancel).unwrap().id(), "a");

        let stats = pool.statistics();
        assert_eq!(stats.current_size, 1);
        assert_eq!(stats.capacity, 3);
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.peak_size, 2);
    }

    #[test]
    fn try_variants_never_block() {
        let pool = pool(1);
        assert!(pool.try_remove().is_none());
        assert!(pool.try_insert(Ticket::new("a")).is_ok());
        let rejected = pool.try_insert(Ticket::new("b")).unwrap_err();
        assert_eq!(rejected.id(), "b");
        assert_eq!(pool.try_remove().map(Ticket::into_id).as_deref(), Some("a"));
    }

    #[test]
    fn fresh_inserter_does_not_barge_ahead_of_queue() {
        let pool = pool(1);
        let cancel = CancelFlag::new();
        pool.insert(Ticket::new("first"), &cancel).unwrap();

        let queued = {
            let pool = pool.clone();
            thread::spawn(move || pool.insert(Ticket::new("queued"), &CancelFlag::new()))
        };
        wait_for(|| pool.waiting_inserters() == 1);

        assert_eq!(pool.remove(&cancel).unwrap().id(), "first");
        // the queued vendor owns the freed slot
        assert!(pool.try_insert(Ticket::new("late")).is_err());
        queued.join().unwrap().unwrap();
        assert_eq!(pool.remove(&cancel).unwrap().id(), "queued");
    }

    #[test]
    fn cancelled_waiter_leaves_queue() {
        let pool = pool(1);
        let main = CancelFlag::new();
        pool.insert(Ticket::new("a"), &main).unwrap();

        let flag = CancelFlag::new();
        let blocked = {
            let pool = pool.clone();
            let flag = flag.clone();
            thread::spawn(move || pool.insert(Ticket::new("never"), &flag))
        };
        wait_for(|| pool.waiting_inserters() == 1);
        flag.cancel();
        pool.interrupt();

        assert_eq!(blocked.join().unwrap(), Err(Cancelled));
        assert_eq!(pool.waiting_inserters(), 0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.statistics().total_processed, 1);
    }

    #[test]
    fn interrupt_keeps_uncancelled_waiters_blocked() {
        let pool = pool(1);
        let blocked = {
            let pool = pool.clone();
            thread::spawn(move || pool.remove(&CancelFlag::new()))
        };
        wait_for(|| pool.waiting_removers() == 1);
        pool.interrupt();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.waiting_removers(), 1);

        pool.insert(Ticket::new("x"), &CancelFlag::new()).unwrap();
        assert_eq!(blocked.join().unwrap().unwrap().id(), "x");
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let pool = TicketPool::new(NonZeroUsize::new(u32::MAX as usize).unwrap());
        assert_eq!(pool.capacity(), u32::MAX as usize);
        pool.try_insert(Ticket::new("only")).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_full());
    }
}

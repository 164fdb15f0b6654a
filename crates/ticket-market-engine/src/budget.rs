use std::sync::atomic::{AtomicU64, Ordering};

/// Number of tickets vendors may still release
///
/// Only used when the configuration enforces the ticket budget. A vendor
/// takes one unit before producing a ticket and refunds it if it is
/// cancelled before the ticket made it into the pool.
#[derive(Debug)]
pub struct TicketBudget {
    remaining: AtomicU64,
}

impl TicketBudget {
    pub fn new(total: u64) -> Self {
        Self {
            remaining: AtomicU64::new(total),
        }
    }

    /// Take one unit; `false` once the budget is exhausted
    pub fn try_take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn refund(&self) {
        self.remaining.fetch_add(1, Ordering::AcqRel);
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_and_refunds() {
        let budget = TicketBudget::new(2);
        assert!(budget.try_take());
        assert!(budget.try_take());
        assert!(!budget.try_take());
        assert_eq!(budget.remaining(), 0);

        budget.refund();
        assert_eq!(budget.remaining(), 1);
        assert!(budget.try_take());
    }
}

//! Shared request budget for count-bounded runs

use std::sync::atomic::{AtomicUsize, Ordering};

/// Remaining-request counter shared by every worker of a count-bounded run
///
/// Workers claim one unit before each send. The counter never goes below
/// zero, so the number of requests issued across the pool is exactly the
/// target no matter how claims interleave.
#[derive(Debug)]
pub struct RequestBudget {
    remaining: AtomicUsize,
    target: usize,
}

impl RequestBudget {
    /// Create a budget of `target` requests
    pub fn new(target: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(target),
            target,
        }
    }

    /// Claim one request slot
    ///
    /// Returns `false` once the budget is exhausted.
    pub fn try_claim(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok()
    }

    /// Hand back a slot that was claimed but never sent
    pub fn release(&self) {
        self.remaining.fetch_add(1, Ordering::AcqRel);
    }

    /// Slots not yet claimed
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Slots claimed so far
    pub fn claimed(&self) -> usize {
        self.target - self.remaining()
    }

    /// Total budget
    pub fn target(&self) -> usize {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_claim_until_exhausted() {
        let budget = RequestBudget::new(3);
        assert!(budget.try_claim());
        assert!(budget.try_claim());
        assert!(budget.try_claim());
        assert!(!budget.try_claim());
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.claimed(), 3);
    }

    #[test]
    fn test_release_returns_slot() {
        let budget = RequestBudget::new(1);
        assert!(budget.try_claim());
        budget.release();
        assert_eq!(budget.remaining(), 1);
        assert!(budget.try_claim());
    }

    #[test]
    fn test_concurrent_claims_are_exact() {
        let budget = Arc::new(RequestBudget::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || {
                    let mut claimed = 0usize;
                    while budget.try_claim() {
                        claimed += 1;
                    }
                    claimed
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10_000);
        assert_eq!(budget.remaining(), 0);
    }
}

//! Concurrency utilities
//!
//! A counting permit with FIFO wake order and an order-preserving bounded
//! parallel map, for callers fanning work over many snapshots at once.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct PermitState {
    available: usize,
    queue: VecDeque<u64>,
    next_ticket: u64,
}

/// Counting permit
///
/// `acquire` blocks while no permit is free; waiters are woken in arrival
/// order. Dropping the guard releases the permit.
pub struct Permits {
    state: Mutex<PermitState>,
    wakeup: Condvar,
}

impl Permits {
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(PermitState {
                available: count,
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            wakeup: Condvar::new(),
        }
    }

    /// Take a permit, waiting in FIFO order for one to free up
    pub fn acquire(&self) -> PermitGuard<'_> {
        let mut state = self.state.lock().expect("permit state poisoned");
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back(ticket);

        while !(state.available > 0 && state.queue.front() == Some(&ticket)) {
            state = self.wakeup.wait(state).expect("permit state poisoned");
        }

        state.queue.pop_front();
        state.available -= 1;
        PermitGuard { permits: self }
    }

    /// Number of currently free permits
    pub fn available(&self) -> usize {
        self.state.lock().expect("permit state poisoned").available
    }

    fn release(&self) {
        let mut state = self.state.lock().expect("permit state poisoned");
        state.available += 1;
        drop(state);
        self.wakeup.notify_all();
    }
}

/// RAII permit; dropping it releases back to the pool
pub struct PermitGuard<'a> {
    permits: &'a Permits,
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        self.permits.release();
    }
}

/// Map `items` in parallel with at most `limit` mappers in flight
///
/// Results come back in input order.
pub fn bounded_map<T, U, F>(items: Vec<T>, limit: usize, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Sync,
{
    let permits = Permits::new(limit.max(1));
    let f = &f;
    let permits_ref = &permits;

    std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                scope.spawn(move || {
                    let _permit = permits_ref.acquire();
                    f(item)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("bounded_map worker panicked"))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_acquire_and_release() {
        let permits = Permits::new(2);
        assert_eq!(permits.available(), 2);

        let first = permits.acquire();
        assert_eq!(permits.available(), 1);
        let second = permits.acquire();
        assert_eq!(permits.available(), 0);

        drop(first);
        assert_eq!(permits.available(), 1);
        drop(second);
        assert_eq!(permits.available(), 2);
    }

    #[test]
    fn test_bounded_map_preserves_order() {
        let out = bounded_map((0..64).collect(), 4, |n: i32| n * 2);
        let expected: Vec<i32> = (0..64).map(|n| n * 2).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_bounded_map_limits_in_flight() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        bounded_map((0..32).collect::<Vec<i32>>(), 3, |n| {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(current, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            n
        });

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_bounded_map_zero_limit_still_progresses() {
        let out = bounded_map(vec![1, 2, 3], 0, |n| n + 1);
        assert_eq!(out, vec![2, 3, 4]);
    }
}

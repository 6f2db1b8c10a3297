//! Shared readiness counter for fair, non-deterministic merges.
//!
//! A [`Collector`] lets a net with many inputs wait on a single condition
//! variable instead of one per input: every producer that successfully
//! writes into one of the collector's channels increments its count and
//! signals it, and the merging net (the routing node, see
//! `runtime::routing`) blocks on the collector alone.

use std::sync::{Condvar, Mutex};

/// The collector's three-state lifecycle, mirroring a channel end's state
/// but scoped to the merge as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Ready,
    Pending,
    End,
}

struct Inner {
    count: i64,
    state: CollectorState,
    live_producers: usize,
}

/// What a merging net should do after calling [`Collector::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// At least one channel has data; scan inputs for it.
    Proceed,
    /// Woken with nothing pending: every producer has ended.
    Ended,
}

pub struct Collector {
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl Collector {
    /// Creates a collector fed by `producer_count` channels.
    pub fn new(producer_count: usize) -> Self {
        Collector {
            inner: Mutex::new(Inner {
                count: 0,
                state: CollectorState::Pending,
                live_producers: producer_count,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn state(&self) -> CollectorState {
        self.inner.lock().unwrap().state
    }

    pub fn count(&self) -> i64 {
        self.inner.lock().unwrap().count
    }

    /// Called by a producing channel after it successfully appends a
    /// message to one of the collector's channels.
    ///
    /// Per the locking discipline, callers must have already released
    /// their own channel mutex before calling this.
    pub fn notify_ready(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.count += 1;
        if inner.state != CollectorState::End {
            inner.state = CollectorState::Ready;
        }
        drop(inner);
        self.cv.notify_all();
    }

    /// Called once by each producing channel when its source end
    /// terminates. The collector transitions to `End` only once every
    /// producer has reported termination.
    pub fn producer_ended(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.live_producers = inner.live_producers.saturating_sub(1);
        if inner.live_producers == 0 {
            inner.state = CollectorState::End;
        }
        drop(inner);
        self.cv.notify_all();
    }

    /// Waits for the collector to leave `Pending`, then takes a snapshot
    /// of its count under the collector mutex and decrements it by one
    /// (floored at zero).
    ///
    /// Returns [`Acquired::Ended`] only when the snapshot observed was
    /// zero, which happens exactly when every producer has ended and no
    /// message is outstanding; the merging net should stop.
    pub fn acquire(&self) -> Acquired {
        let mut inner = self.inner.lock().unwrap();
        while inner.state == CollectorState::Pending {
            inner = self.cv.wait(inner).unwrap();
        }
        let snapshot = inner.count;
        inner.count = (inner.count - 1).max(0);
        if inner.count == 0 && inner.state != CollectorState::End {
            inner.state = CollectorState::Pending;
        }
        if snapshot == 0 {
            Acquired::Ended
        } else {
            Acquired::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_blocks_until_notified() {
        let collector = Arc::new(Collector::new(1));
        let worker = {
            let collector = collector.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                collector.notify_ready();
            })
        };
        assert_eq!(collector.acquire(), Acquired::Proceed);
        worker.join().unwrap();
    }

    #[test]
    fn ends_only_after_all_producers_ended() {
        let collector = Collector::new(2);
        collector.producer_ended();
        assert_eq!(collector.state(), CollectorState::Pending);
        collector.producer_ended();
        assert_eq!(collector.state(), CollectorState::End);
        assert_eq!(collector.acquire(), Acquired::Ended);
    }

    #[test]
    fn count_tracks_sum_of_ready_writes() {
        let collector = Collector::new(1);
        collector.notify_ready();
        collector.notify_ready();
        assert_eq!(collector.count(), 2);
        assert_eq!(collector.acquire(), Acquired::Proceed);
        assert_eq!(collector.count(), 1);
    }
}

//! A point-to-point bounded channel: FIFO, two ends, optional guard and
//! collector.
//!
//! A single mutex guards the FIFO and both end states together, exactly as
//! `smx_channel_s` bundles `fifo_mutex` across the whole channel in the
//! original runtime. Two condition variables cross the same mutex: one
//! wakes a writer blocked on a full buffer, the other wakes a reader
//! blocked on an empty one. The two halves of this runtime's own spec
//! disagree on which named end owns which condvar (compare the locking
//! section's wording to the termination section's); this implementation
//! sidesteps the naming dispute by naming the condvars for the condition
//! they signal; see DESIGN.md for the resolution.

use crate::collector::Collector;
use crate::error::ChannelError;
use crate::fifo::{Fifo, PopOutcome, PushOutcome, Variant};
use crate::guard::{Guard, GuardOutcome};
use crate::message::Message;
use smx_logging::Category;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// The state of one end of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// A decoupled-output end that has never been written to.
    Uninitialised,
    /// Waiting for a signal (empty, or no space consumed yet).
    Pending,
    /// Ready to be read from.
    Ready,
    /// The net owning this end has terminated. Terminal: never demoted.
    End,
}

#[derive(Debug, Clone)]
struct EndState {
    state: State,
    error: Option<ChannelError>,
    access_count: u64,
}

impl EndState {
    fn new(initial: State) -> Self {
        EndState {
            state: initial,
            error: None,
            access_count: 0,
        }
    }

    fn set_state(&mut self, state: State) {
        if self.state != State::End {
            self.state = state;
        }
    }
}

struct Inner {
    fifo: Fifo,
    sink: EndState,
    source: EndState,
}

/// The outcome of a successful [`Channel::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Overwritten,
    /// A guard discarded the message: not an error, per the guard's
    /// contract.
    Discarded,
}

/// A write that did not take effect.
#[derive(Debug)]
pub struct WriteRejected {
    pub error: ChannelError,
    pub message: Message,
}

/// A bounded, single-producer/single-consumer channel.
pub struct Channel {
    id: u64,
    name: String,
    variant: Variant,
    category: Category,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    collector: Option<Arc<Collector>>,
    guard: Option<Guard>,
}

impl Channel {
    /// Creates a channel of the given variant and FIFO length.
    pub fn new(id: u64, name: impl Into<String>, length: usize, variant: Variant) -> Self {
        let name = name.into();
        let category = Category::new("channel", &name);
        let sink_initial = if variant.duplicates_on_empty() {
            State::Uninitialised
        } else {
            State::Pending
        };
        Channel {
            id,
            name,
            variant,
            category,
            inner: Mutex::new(Inner {
                fifo: Fifo::new(length),
                sink: EndState::new(sink_initial),
                source: EndState::new(State::Pending),
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            collector: None,
            guard: None,
        }
    }

    /// Attaches a shared collector to this channel's sink end. Must be
    /// called during graph construction, before any thread is spawned.
    pub fn with_collector(mut self, collector: Arc<Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Attaches a rate guard with the given minimum inter-arrival time.
    /// Whether the guard blocks or discards is derived from this
    /// channel's write discipline.
    pub fn with_guard(mut self, iat: Duration) -> Self {
        let blocking = !self.variant.overwrites_on_full();
        self.guard = Some(Guard::new(iat, blocking));
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    /// Number of messages immediately available to read.
    pub fn ready_to_read(&self) -> usize {
        self.inner.lock().unwrap().fifo.len()
    }

    /// Number of free slots (for an overwriting channel, always reports
    /// full capacity, since a write there can never be refused for lack
    /// of space).
    pub fn ready_to_write(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        if self.variant.overwrites_on_full() {
            inner.fifo.capacity()
        } else {
            inner.fifo.capacity() - inner.fifo.len()
        }
    }

    pub fn overwrite_count(&self) -> u64 {
        self.inner.lock().unwrap().fifo.overwrite_count()
    }

    pub fn copy_count(&self) -> u64 {
        self.inner.lock().unwrap().fifo.copy_count()
    }

    pub fn read_error(&self) -> Option<ChannelError> {
        self.inner.lock().unwrap().sink.error
    }

    pub fn write_error(&self) -> Option<ChannelError> {
        self.inner.lock().unwrap().source.error
    }

    pub fn sink_state(&self) -> State {
        self.inner.lock().unwrap().sink.state
    }

    pub fn source_state(&self) -> State {
        self.inner.lock().unwrap().source.state
    }

    /// Writes `msg` into the channel, applying the guard (if any) first.
    pub fn write(&self, msg: Message) -> Result<WriteOutcome, WriteRejected> {
        if let Some(guard) = &self.guard {
            if guard.gate() == GuardOutcome::Discard {
                self.category.warn_event("guard discarded message");
                return Ok(WriteOutcome::Discarded);
            }
        }

        let mut inner = self.inner.lock().unwrap();
        inner.source.access_count += 1;

        if inner.sink.state == State::End {
            inner.source.error = Some(ChannelError::NoTarget);
            return Err(WriteRejected {
                error: ChannelError::NoTarget,
                message: msg,
            });
        }

        if !self.variant.overwrites_on_full() {
            while inner.fifo.is_full() {
                if inner.sink.state == State::End {
                    inner.source.error = Some(ChannelError::NoSpace);
                    return Err(WriteRejected {
                        error: ChannelError::NoSpace,
                        message: msg,
                    });
                }
                inner = self.not_full.wait(inner).unwrap();
            }
        }

        let push_outcome = if self.variant.overwrites_on_full() {
            inner.fifo.push_overwrite(msg)
        } else {
            inner.fifo.push(msg);
            PushOutcome::Pushed
        };
        inner.sink.set_state(State::Ready);
        drop(inner);

        self.not_empty.notify_all();
        if let Some(collector) = &self.collector {
            collector.notify_ready();
        }

        Ok(match push_outcome {
            PushOutcome::Pushed => WriteOutcome::Written,
            PushOutcome::Overwritten => WriteOutcome::Overwritten,
        })
    }

    /// Reads the next message, applying the channel's blocking or
    /// duplicating discipline.
    pub fn read(&self) -> Result<Message, ChannelError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sink.access_count += 1;

        loop {
            if !inner.fifo.is_empty() {
                break;
            }
            if self.variant.duplicates_on_empty() && inner.fifo.has_backup() {
                break;
            }
            if inner.source.state == State::End {
                let err = if self.variant.duplicates_on_empty() {
                    ChannelError::Uninitialised
                } else {
                    ChannelError::NoData
                };
                inner.sink.error = Some(err);
                return Err(err);
            }
            inner = self.not_empty.wait(inner).unwrap();
        }

        let outcome = if self.variant.duplicates_on_empty() {
            inner.fifo.pop_duplicating()
        } else {
            match inner.fifo.pop() {
                Some(msg) => PopOutcome::Popped(msg),
                None => PopOutcome::Empty,
            }
        };

        match outcome {
            PopOutcome::Popped(msg) | PopOutcome::Duplicated(msg) => {
                if inner.fifo.is_empty() {
                    inner.sink.set_state(State::Pending);
                }
                drop(inner);
                self.not_full.notify_all();
                Ok(msg)
            }
            PopOutcome::Empty => {
                let err = if self.variant.duplicates_on_empty() {
                    ChannelError::Uninitialised
                } else {
                    ChannelError::NoData
                };
                inner.sink.error = Some(err);
                Err(err)
            }
        }
    }

    /// Non-blocking, non-duplicating read used by temporal firewalls.
    /// Returns `None` immediately when empty, regardless of variant.
    pub fn dd_read(&self) -> Option<Message> {
        let mut inner = self.inner.lock().unwrap();
        inner.sink.access_count += 1;
        let msg = inner.fifo.pop_no_duplicate();
        if msg.is_some() && inner.fifo.is_empty() {
            inner.sink.set_state(State::Pending);
        }
        drop(inner);
        if msg.is_some() {
            self.not_full.notify_all();
        }
        msg
    }

    /// Marks this channel's sink end as terminated. Called by the net that
    /// *reads* this channel when it exits its main loop: wakes any writer
    /// blocked on a full buffer, who observes `NoSpace`.
    pub fn terminate_sink(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sink.set_state(State::End);
        drop(inner);
        self.category.lifecycle("sink terminated");
        self.not_full.notify_all();
    }

    /// Marks this channel's source end as terminated. Called by the net
    /// that *writes* this channel when it exits its main loop: wakes any
    /// reader blocked on an empty buffer, who observes `NoData` (or
    /// `Uninitialised`, for a decoupled-output channel with no backup).
    pub fn terminate_source(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.source.set_state(State::End);
        drop(inner);
        self.category.lifecycle("source terminated");
        self.not_empty.notify_all();
        if let Some(collector) = &self.collector {
            collector.producer_ended();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn blocking_fifo_delivers_all_messages_in_order() {
        let channel = Arc::new(Channel::new(1, "nums", 2, Variant::Fifo));
        let producer = {
            let channel = channel.clone();
            thread::spawn(move || {
                for v in 0..10u32 {
                    channel.write(Message::new(v)).unwrap();
                }
                channel.terminate_source();
            })
        };
        let mut received = Vec::new();
        loop {
            match channel.read() {
                Ok(msg) => received.push(*msg.unpack::<u32>().unwrap()),
                Err(ChannelError::NoData) => break,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        producer.join().unwrap();
        assert_eq!(received, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn d_fifo_overwrite_keeps_last_two_of_a_burst() {
        let channel = Channel::new(2, "burst", 2, Variant::DFifo);
        for v in 0..5u32 {
            assert!(matches!(
                channel.write(Message::new(v)).unwrap(),
                WriteOutcome::Written | WriteOutcome::Overwritten
            ));
        }
        assert_eq!(channel.overwrite_count(), 3);
        let first = channel.read().unwrap();
        let second = channel.read().unwrap();
        assert_eq!(*first.unpack::<u32>().unwrap(), 3);
        assert_eq!(*second.unpack::<u32>().unwrap(), 4);
        assert!(matches!(channel.read(), Err(ChannelError::NoData)));
    }

    #[test]
    fn fifo_d_duplicates_after_producer_end() {
        let channel = Channel::new(3, "single", 4, Variant::FifoD);
        channel.write(Message::new(42u32)).unwrap();
        channel.terminate_source();

        let first = channel.read().unwrap();
        assert_eq!(*first.unpack::<u32>().unwrap(), 42);
        for _ in 0..3 {
            let dup = channel.read().unwrap();
            assert_eq!(*dup.unpack::<u32>().unwrap(), 42);
        }
        assert_eq!(channel.copy_count(), 3);
    }

    #[test]
    fn fifo_d_with_no_backup_reports_uninitialised() {
        let channel = Channel::new(4, "never-written", 1, Variant::FifoD);
        channel.terminate_source();
        assert!(matches!(channel.read(), Err(ChannelError::Uninitialised)));
    }

    #[test]
    fn writer_sees_no_target_after_sink_terminates() {
        let channel = Channel::new(5, "dead-sink", 1, Variant::Fifo);
        channel.terminate_sink();
        let err = channel.write(Message::new(1u32)).unwrap_err();
        assert_eq!(err.error, ChannelError::NoTarget);
    }

    #[test]
    fn dd_read_never_blocks_and_never_duplicates() {
        let channel = Channel::new(6, "firewall-in", 2, Variant::FifoD);
        assert!(channel.dd_read().is_none());
        channel.write(Message::new(7u32)).unwrap();
        let msg = channel.dd_read().unwrap();
        assert_eq!(*msg.unpack::<u32>().unwrap(), 7);
        assert!(channel.dd_read().is_none());
    }
}

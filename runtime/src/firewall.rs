//! The temporal firewall: a periodic timer that forwards one message per
//! input per tick.
//!
//! The original runtime arms a kernel timer descriptor and reads it to
//! block until the next tick. A firewall has exactly one thread waiting on
//! its own period, so an absolute `Instant` deadline plus `thread::sleep`
//! gives the same cadence without an OS timer object: the same
//! substitution already made for [`crate::guard`](smx_channel::Guard).

use crate::box_behavior::{BoxBehavior, BoxResult};
use smx_channel::{Channel, Message};
use smx_logging::Category;
use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// One (input, output) pair served by a firewall on every tick.
pub struct FirewallPair {
    pub input: Arc<Channel>,
    pub output: Arc<Channel>,
}

struct FirewallState {
    next_deadline: Instant,
}

/// A net whose signature is a list of (input, output) pairs sharing one
/// period: each tick reads a non-blocking, non-duplicating sample from
/// every input and forwards it to the corresponding output.
pub struct TemporalFirewall {
    period: Duration,
    pairs: Vec<FirewallPair>,
    category: Category,
    tick: u64,
}

impl TemporalFirewall {
    pub fn new(name: &str, period: Duration, pairs: Vec<FirewallPair>) -> Self {
        TemporalFirewall {
            period,
            pairs,
            category: Category::new("firewall", name),
            tick: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }
}

impl BoxBehavior for TemporalFirewall {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(FirewallState {
            next_deadline: Instant::now() + self.period,
        }))
    }

    fn step(&mut self, state: &mut Box<dyn Any + Send>) -> BoxResult {
        let st = state
            .downcast_mut::<FirewallState>()
            .expect("firewall state type mismatch");

        let now = Instant::now();
        if now > st.next_deadline {
            self.category.warn_event("tick missed its deadline");
        } else {
            thread::sleep(st.next_deadline - now);
        }
        st.next_deadline += self.period;

        let samples: Vec<Option<Message>> = self.pairs.iter().map(|pair| pair.input.dd_read()).collect();
        for (pair, sample) in self.pairs.iter().zip(samples) {
            if let Some(msg) = sample {
                if let Err(rejected) = pair.output.write(msg) {
                    self.category.warn_event(&format!("write rejected: {}", rejected.error));
                }
            }
        }

        self.tick += 1;
        BoxResult::Return
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smx_channel::Variant;

    #[test]
    fn forwards_most_recent_sample_each_tick() {
        let input = Arc::new(Channel::new(1, "upstream", 4, Variant::FifoD));
        let output = Arc::new(Channel::new(2, "downstream", 4, Variant::Fifo));
        let pairs = vec![FirewallPair {
            input: input.clone(),
            output: output.clone(),
        }];
        let mut firewall = TemporalFirewall::new("tf", Duration::from_millis(5), pairs);
        let mut state = firewall.init().unwrap();

        assert_eq!(firewall.step(&mut state), BoxResult::Return);
        assert_eq!(output.ready_to_read(), 0, "no sample written before any input arrived");

        input.write(Message::new(7u32)).unwrap();
        firewall.step(&mut state);
        let msg = output.read().unwrap();
        assert_eq!(*msg.unpack::<u32>().unwrap(), 7);
        assert_eq!(firewall.tick_count(), 2);
    }
}

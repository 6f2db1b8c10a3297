//! The generic routing node and its profiler-collector specialization.
//!
//! Grounded in `box_smx_rn.h`: reads from whichever input has data first,
//! writing a copy to every output, remembering the last port index read so
//! the next invocation starts its scan one past it.

use crate::box_behavior::{BoxBehavior, BoxResult};
use smx_channel::{Acquired, Channel, Collector, Message};
use smx_logging::Category;
use std::any::Any;
use std::sync::Arc;

struct RoutingState {
    last_idx: usize,
}

/// A fair-merge net: N inputs sharing one [`Collector`], fanned out to M
/// outputs.
pub struct RoutingNode {
    inputs: Vec<Arc<Channel>>,
    outputs: Vec<Arc<Channel>>,
    collector: Arc<Collector>,
    category: Category,
}

impl RoutingNode {
    pub fn new(name: &str, inputs: Vec<Arc<Channel>>, outputs: Vec<Arc<Channel>>, collector: Arc<Collector>) -> Self {
        RoutingNode {
            inputs,
            outputs,
            collector,
            category: Category::new("routing", name),
        }
    }
}

impl BoxBehavior for RoutingNode {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(RoutingState { last_idx: 0 }))
    }

    fn step(&mut self, state: &mut Box<dyn Any + Send>) -> BoxResult {
        let st = state
            .downcast_mut::<RoutingState>()
            .expect("routing node state type mismatch");

        match self.collector.acquire() {
            Acquired::Ended => BoxResult::End,
            Acquired::Proceed => {
                let n = self.inputs.len();
                for offset in 1..=n {
                    let idx = (st.last_idx + offset) % n;
                    if self.inputs[idx].ready_to_read() == 0 {
                        continue;
                    }
                    match self.inputs[idx].read() {
                        Ok(msg) => {
                            st.last_idx = idx;
                            fan_out(&self.outputs, msg, &self.category);
                        }
                        Err(err) => {
                            self.category
                                .warn_event(&format!("read failed after positive readiness: {err}"));
                        }
                    }
                    break;
                }
                BoxResult::Return
            }
        }
    }
}

/// Builds the profiler collector: a [`RoutingNode`] specialized to exactly
/// one output, spawned automatically for every net with an enabled
/// profiler port.
pub fn profiler_node(name: &str, inputs: Vec<Arc<Channel>>, output: Arc<Channel>, collector: Arc<Collector>) -> RoutingNode {
    RoutingNode::new(name, inputs, vec![output], collector)
}

/// Writes `msg` to every output, blocking in list order; all but the last
/// output receive an independent copy, since a message has exactly one
/// owner.
fn fan_out(outputs: &[Arc<Channel>], msg: Message, category: &Category) {
    let Some((last, rest)) = outputs.split_last() else {
        return;
    };
    for output in rest {
        if let Err(rejected) = output.write(msg.copy()) {
            category.warn_event(&format!("write rejected: {}", rejected.error));
        }
    }
    if let Err(rejected) = last.write(msg) {
        category.warn_event(&format!("write rejected: {}", rejected.error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smx_channel::Variant;

    #[test]
    fn merges_three_producers_fairly() {
        let output = Arc::new(Channel::new(10, "out", 300, Variant::Fifo));
        let collector = Arc::new(Collector::new(3));
        let inputs: Vec<Arc<Channel>> = (0..3)
            .map(|i| Arc::new(Channel::new(i, format!("in{i}"), 4, Variant::Fifo).with_collector(collector.clone())))
            .collect();

        for (src, input) in inputs.iter().enumerate() {
            for seq in 0..100u32 {
                input.write(Message::new((src as u32, seq))).unwrap();
            }
            input.terminate_source();
        }

        let mut node = RoutingNode::new("rn", inputs, vec![output.clone()], collector);
        let mut state = node.init().unwrap();
        while node.step(&mut state) != BoxResult::End {}

        let mut counts = [0u32; 3];
        while output.ready_to_read() > 0 {
            let msg = output.read().unwrap();
            let (src, _seq) = *msg.unpack::<(u32, u32)>().unwrap();
            counts[src as usize] += 1;
        }
        assert_eq!(counts, [100, 100, 100]);
    }
}

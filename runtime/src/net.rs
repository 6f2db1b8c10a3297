//! A net's identity, ports, and the state-update / termination rules the
//! driver applies around a [`BoxBehavior`](crate::BoxBehavior).

use crate::config::NetConfig;
use crate::box_behavior::BoxResult;
use smx_channel::{Channel, State};
use smx_logging::Category;
use std::sync::Arc;

/// One of a net's input ports.
pub struct PortIn {
    pub name: String,
    pub channel: Arc<Channel>,
}

impl PortIn {
    /// Whether this input's read discipline blocks on empty (`Fifo` /
    /// `DFifo`) rather than duplicating (`FifoD` / `DFifoD`). Only
    /// triggering inputs are consulted by the end-of-stream rule.
    fn triggering(&self) -> bool {
        !self.channel.variant().duplicates_on_empty()
    }
}

/// One of a net's output ports.
pub struct PortOut {
    pub name: String,
    pub channel: Arc<Channel>,
}

/// A graph vertex: its identity, ports, optional profiler channel, and
/// configuration sub-tree.
pub struct Net {
    id: u64,
    name: String,
    category: Category,
    inputs: Vec<PortIn>,
    outputs: Vec<PortOut>,
    profiler: Option<Arc<Channel>>,
    config: NetConfig,
}

impl Net {
    pub fn new(
        id: u64,
        name: String,
        inputs: Vec<PortIn>,
        outputs: Vec<PortOut>,
        profiler: Option<Arc<Channel>>,
        config: NetConfig,
    ) -> Self {
        let category = Category::new("net", &name);
        Net {
            id,
            name,
            category,
            inputs,
            outputs,
            profiler,
            config,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn inputs(&self) -> &[PortIn] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortOut] {
        &self.outputs
    }

    pub fn profiler(&self) -> Option<&Arc<Channel>> {
        self.profiler.as_ref()
    }

    pub fn input(&self, name: &str) -> Option<&Arc<Channel>> {
        self.inputs.iter().find(|p| p.name == name).map(|p| &p.channel)
    }

    pub fn output(&self, name: &str) -> Option<&Arc<Channel>> {
        self.outputs.iter().find(|p| p.name == name).map(|p| &p.channel)
    }

    /// Applies the state-update rule from the net driver's contract: a
    /// forced `Continue`/`End` is honored as-is; a `Return` is resolved by
    /// checking triggering inputs and output sinks for end-of-stream.
    pub(crate) fn resolve(&self, result: BoxResult) -> BoxResult {
        match result {
            BoxResult::Continue | BoxResult::End => result,
            BoxResult::Return => {
                let triggering: Vec<&PortIn> = self.inputs.iter().filter(|p| p.triggering()).collect();
                let inputs_ended = !triggering.is_empty()
                    && triggering
                        .iter()
                        .all(|p| p.channel.source_state() == State::End && p.channel.ready_to_read() == 0);
                if inputs_ended {
                    return BoxResult::End;
                }
                let outputs_ended =
                    !self.outputs.is_empty() && self.outputs.iter().all(|p| p.channel.sink_state() == State::End);
                if outputs_ended {
                    return BoxResult::End;
                }
                BoxResult::Continue
            }
        }
    }

    /// Propagates termination to every neighbor this net can reach: the
    /// sink end of each input, the source end of each output, and the
    /// source end of the profiler channel if present.
    pub(crate) fn terminate(&self) {
        for port in &self.inputs {
            port.channel.terminate_sink();
        }
        for port in &self.outputs {
            port.channel.terminate_source();
        }
        if let Some(profiler) = &self.profiler {
            profiler.terminate_source();
        }
    }
}

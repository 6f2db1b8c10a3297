//! The graph construction surface and the running program it produces.
//!
//! Mirrors the generated top level's call sequence (`channel_create`,
//! `net_create`/`net_init`, `connect`/`connect_guard`/`connect_rn`/
//! `connect_tf`, `net_run`, `net_wait_end`) as a builder that commits to an
//! immutable graph before any thread is spawned, per the Design Note on
//! "Generated top level".

use crate::box_behavior::BoxBehavior;
use crate::config::{Config, NetConfig};
use crate::driver;
use crate::error::RuntimeError;
use crate::firewall::{FirewallPair, TemporalFirewall};
use crate::net::{Net, PortIn, PortOut};
use crate::priority::Priority;
use crate::routing::{self, RoutingNode};
use smx_channel::{Channel, Collector, Variant};
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// A port's direction on a net, as passed to [`ProgramBuilder::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// A handle to a net registered with a [`ProgramBuilder`], returned by
/// `.net()`/`.connect_rn()`/`.connect_tf()` and consumed by `.connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetHandle(u64);

/// The finalized channel handles visible to a net's [`BoxBehavior`]
/// factory, keyed by the port names this net was `.connect()`-ed with.
pub struct NetPorts {
    inputs: HashMap<String, Arc<Channel>>,
    outputs: HashMap<String, Arc<Channel>>,
}

impl NetPorts {
    pub fn input(&self, port_name: &str) -> Arc<Channel> {
        self.inputs
            .get(port_name)
            .unwrap_or_else(|| panic!("no input port named '{port_name}'"))
            .clone()
    }

    pub fn output(&self, port_name: &str) -> Arc<Channel> {
        self.outputs
            .get(port_name)
            .unwrap_or_else(|| panic!("no output port named '{port_name}'"))
            .clone()
    }
}

struct PortDecl {
    port_name: String,
    channel_name: String,
}

struct NetDecl {
    id: u64,
    name: String,
    inputs: Vec<PortDecl>,
    outputs: Vec<PortDecl>,
    profiler_channel: Option<String>,
    priority: Option<Priority>,
    factory: Box<dyn FnOnce(&NetPorts) -> Box<dyn BoxBehavior>>,
}

/// Builds an immutable dataflow graph: channels, nets, and the special
/// routing-node / temporal-firewall / profiler-collector wiring, committed
/// all at once by [`ProgramBuilder::build`].
pub struct ProgramBuilder {
    config: Config,
    channels: HashMap<String, Channel>,
    next_channel_id: u64,
    next_net_id: u64,
    nets: Vec<NetDecl>,
    profiler_sink: Option<String>,
}

impl ProgramBuilder {
    pub fn new(config: Config) -> Self {
        ProgramBuilder {
            config,
            channels: HashMap::new(),
            next_channel_id: 0,
            next_net_id: 0,
            nets: Vec::new(),
            profiler_sink: None,
        }
    }

    /// Creates a channel of the given length and discipline.
    pub fn channel(&mut self, name: &str, length: usize, variant: Variant) -> Result<&mut Self, RuntimeError> {
        if self.channels.contains_key(name) {
            return Err(RuntimeError::DuplicateChannel(name.to_string()));
        }
        let id = self.next_channel_id;
        self.next_channel_id += 1;
        self.channels.insert(name.to_string(), Channel::new(id, name, length, variant));
        Ok(self)
    }

    /// Attaches a minimum inter-arrival-time guard to an existing channel.
    pub fn connect_guard(&mut self, channel_name: &str, iat: Duration) -> Result<&mut Self, RuntimeError> {
        let channel = self
            .channels
            .remove(channel_name)
            .ok_or_else(|| RuntimeError::UnknownChannel(channel_name.to_string()))?;
        self.channels.insert(channel_name.to_string(), channel.with_guard(iat));
        Ok(self)
    }

    /// Registers a net whose behavior is built from a factory invoked once
    /// the graph's channels are finalized, resolving this net's declared
    /// ports by name.
    pub fn net<F>(&mut self, name: &str, factory: F) -> Result<NetHandle, RuntimeError>
    where
        F: FnOnce(&NetPorts) -> Box<dyn BoxBehavior> + 'static,
    {
        if self.nets.iter().any(|decl| decl.name == name) {
            return Err(RuntimeError::DuplicateNet(name.to_string()));
        }
        let id = self.next_net_id;
        self.next_net_id += 1;
        self.nets.push(NetDecl {
            id,
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            profiler_channel: None,
            priority: None,
            factory: Box::new(factory),
        });
        Ok(NetHandle(id))
    }

    /// Connects `channel_name` as a named port of `net`, in the given
    /// direction.
    pub fn connect(&mut self, net: NetHandle, channel_name: &str, port_name: &str, direction: Direction) -> Result<&mut Self, RuntimeError> {
        if !self.channels.contains_key(channel_name) {
            return Err(RuntimeError::UnknownChannel(channel_name.to_string()));
        }
        let decl = self
            .nets
            .iter_mut()
            .find(|decl| decl.id == net.0)
            .ok_or(RuntimeError::UnknownNet(net.0))?;
        let port = PortDecl {
            port_name: port_name.to_string(),
            channel_name: channel_name.to_string(),
        };
        match direction {
            Direction::In => decl.inputs.push(port),
            Direction::Out => decl.outputs.push(port),
        }
        Ok(self)
    }

    /// Assigns a real-time scheduling priority to a net's thread.
    pub fn set_priority(&mut self, net: NetHandle, priority: Priority) -> Result<&mut Self, RuntimeError> {
        let decl = self
            .nets
            .iter_mut()
            .find(|decl| decl.id == net.0)
            .ok_or(RuntimeError::UnknownNet(net.0))?;
        decl.priority = Some(priority);
        Ok(self)
    }

    /// Marks `channel_name` as `net`'s profiler output. Disabled by
    /// configuration, it is terminated immediately at `build()` time
    /// instead of being wired into the profiler collector.
    pub fn connect_profiler(&mut self, net: NetHandle, channel_name: &str) -> Result<&mut Self, RuntimeError> {
        if !self.channels.contains_key(channel_name) {
            return Err(RuntimeError::UnknownChannel(channel_name.to_string()));
        }
        let decl = self
            .nets
            .iter_mut()
            .find(|decl| decl.id == net.0)
            .ok_or(RuntimeError::UnknownNet(net.0))?;
        decl.profiler_channel = Some(channel_name.to_string());
        Ok(self)
    }

    /// Builds a routing node merging `inputs` into `outputs` with fair
    /// round-robin selection, attaching a fresh [`Collector`] to every
    /// input channel.
    pub fn connect_rn(&mut self, name: &str, inputs: &[&str], outputs: &[&str]) -> Result<NetHandle, RuntimeError> {
        for channel_name in inputs.iter().chain(outputs.iter()) {
            if !self.channels.contains_key(*channel_name) {
                return Err(RuntimeError::UnknownChannel(channel_name.to_string()));
            }
        }

        let collector = Arc::new(Collector::new(inputs.len()));
        for channel_name in inputs {
            let channel = self.channels.remove(*channel_name).unwrap();
            self.channels
                .insert(channel_name.to_string(), channel.with_collector(collector.clone()));
        }

        let input_names: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        let output_names: Vec<String> = outputs.iter().map(|s| s.to_string()).collect();
        let rn_name = name.to_string();
        let handle = self.net(name, move |ports| {
            let ins = input_names.iter().map(|n| ports.input(n)).collect();
            let outs = output_names.iter().map(|n| ports.output(n)).collect();
            Box::new(RoutingNode::new(&rn_name, ins, outs, collector)) as Box<dyn BoxBehavior>
        })?;

        for channel_name in inputs {
            self.connect(handle, channel_name, channel_name, Direction::In)?;
        }
        for channel_name in outputs {
            self.connect(handle, channel_name, channel_name, Direction::Out)?;
        }
        Ok(handle)
    }

    /// Builds a temporal firewall ticking at `period`, forwarding each
    /// `(input, output)` pair's most recent sample on every tick.
    pub fn connect_tf(&mut self, name: &str, period: Duration, pairs: &[(&str, &str)]) -> Result<NetHandle, RuntimeError> {
        for (input, output) in pairs {
            if !self.channels.contains_key(*input) {
                return Err(RuntimeError::UnknownChannel(input.to_string()));
            }
            if !self.channels.contains_key(*output) {
                return Err(RuntimeError::UnknownChannel(output.to_string()));
            }
        }

        let pair_names: Vec<(String, String)> = pairs.iter().map(|(i, o)| (i.to_string(), o.to_string())).collect();
        let tf_name = name.to_string();
        let handle = self.net(name, move |ports| {
            let firewall_pairs = pair_names
                .iter()
                .map(|(i, o)| FirewallPair {
                    input: ports.input(i),
                    output: ports.output(o),
                })
                .collect();
            Box::new(TemporalFirewall::new(&tf_name, period, firewall_pairs)) as Box<dyn BoxBehavior>
        })?;

        self.set_priority(handle, Priority::FIREWALL_DEFAULT)?;
        for (input, output) in pairs {
            self.connect(handle, input, input, Direction::In)?;
            self.connect(handle, output, output, Direction::Out)?;
        }
        Ok(handle)
    }

    /// Enables the process-wide profiler collector, forwarding every
    /// enabled net's profiler channel to `sink_channel`.
    pub fn enable_profiler(&mut self, sink_channel: &str) -> Result<&mut Self, RuntimeError> {
        if !self.channels.contains_key(sink_channel) {
            return Err(RuntimeError::UnknownChannel(sink_channel.to_string()));
        }
        self.profiler_sink = Some(sink_channel.to_string());
        Ok(self)
    }

    /// Commits the graph: resolves every channel, attaches the profiler
    /// collector if enabled, and constructs every net's behavior.
    pub fn build(self) -> Result<Program, RuntimeError> {
        let ProgramBuilder {
            config,
            mut channels,
            nets,
            profiler_sink,
            ..
        } = self;

        let mut enabled_profiler_channels = Vec::new();
        let mut disabled_profiler_channels = Vec::new();
        for decl in &nets {
            if let Some(channel_name) = &decl.profiler_channel {
                if config.net_config(&decl.name).profiler_enabled() {
                    enabled_profiler_channels.push(channel_name.clone());
                } else {
                    disabled_profiler_channels.push(channel_name.clone());
                }
            }
        }

        let profiler_collector = if enabled_profiler_channels.is_empty() {
            None
        } else {
            let collector = Arc::new(Collector::new(enabled_profiler_channels.len()));
            for channel_name in &enabled_profiler_channels {
                let channel = channels
                    .remove(channel_name)
                    .ok_or_else(|| RuntimeError::UnknownChannel(channel_name.clone()))?;
                channels.insert(channel_name.clone(), channel.with_collector(collector.clone()));
            }
            Some(collector)
        };

        let channels: HashMap<String, Arc<Channel>> =
            channels.into_iter().map(|(name, channel)| (name, Arc::new(channel))).collect();

        for channel_name in &disabled_profiler_channels {
            channels
                .get(channel_name)
                .ok_or_else(|| RuntimeError::UnknownChannel(channel_name.clone()))?
                .terminate_source();
        }

        let total_nets = nets.len() as u64;
        let mut built_nets = Vec::with_capacity(nets.len() + 1);
        for decl in nets {
            let net_config = config.net_config(&decl.name);
            let profiler_channel = match &decl.profiler_channel {
                Some(name) if net_config.profiler_enabled() => {
                    Some(channels.get(name).cloned().ok_or_else(|| RuntimeError::UnknownChannel(name.clone()))?)
                }
                _ => None,
            };

            let inputs = resolve_ports(&channels, &decl.inputs)?
                .into_iter()
                .map(|(name, channel)| PortIn { name, channel })
                .collect::<Vec<_>>();
            let outputs = resolve_ports(&channels, &decl.outputs)?
                .into_iter()
                .map(|(name, channel)| PortOut { name, channel })
                .collect::<Vec<_>>();

            let ports = NetPorts {
                inputs: inputs.iter().map(|p| (p.name.clone(), p.channel.clone())).collect(),
                outputs: outputs.iter().map(|p| (p.name.clone(), p.channel.clone())).collect(),
            };
            let behavior = (decl.factory)(&ports);

            built_nets.push(BuiltNet {
                net: Net::new(decl.id, decl.name, inputs, outputs, profiler_channel, net_config),
                behavior,
                priority: decl.priority,
            });
        }

        if let (Some(collector), Some(sink_name)) = (profiler_collector, profiler_sink) {
            let sink = channels
                .get(&sink_name)
                .cloned()
                .ok_or_else(|| RuntimeError::UnknownChannel(sink_name.clone()))?;
            let profiler_inputs: Vec<Arc<Channel>> = enabled_profiler_channels
                .iter()
                .map(|name| channels.get(name).cloned().unwrap())
                .collect();
            let profiler_input_ports: Vec<PortIn> = profiler_inputs
                .iter()
                .map(|c| PortIn {
                    name: c.name().to_string(),
                    channel: c.clone(),
                })
                .collect();
            let profiler_output_ports = vec![PortOut {
                name: sink.name().to_string(),
                channel: sink.clone(),
            }];
            let profiler_node = routing::profiler_node("profiler", profiler_inputs, sink, collector);
            built_nets.push(BuiltNet {
                net: Net::new(total_nets, "profiler".to_string(), profiler_input_ports, profiler_output_ports, None, NetConfig::default()),
                behavior: Box::new(profiler_node),
                priority: None,
            });
        }

        Ok(Program {
            nets: built_nets,
            _channels: channels,
        })
    }
}

fn resolve_ports(channels: &HashMap<String, Arc<Channel>>, decls: &[PortDecl]) -> Result<Vec<(String, Arc<Channel>)>, RuntimeError> {
    decls
        .iter()
        .map(|decl| {
            channels
                .get(&decl.channel_name)
                .cloned()
                .map(|channel| (decl.port_name.clone(), channel))
                .ok_or_else(|| RuntimeError::UnknownChannel(decl.channel_name.clone()))
        })
        .collect()
}

struct BuiltNet {
    net: Net,
    behavior: Box<dyn BoxBehavior>,
    priority: Option<Priority>,
}

/// An immutable, fully-wired graph, ready to run.
pub struct Program {
    nets: Vec<BuiltNet>,
    _channels: HashMap<String, Arc<Channel>>,
}

impl Program {
    /// Spawns one thread per net (including the profiler collector, if
    /// enabled) and returns a handle to join them.
    pub fn run(self) -> Result<RunningProgram, RuntimeError> {
        let barrier = Arc::new(Barrier::new(self.nets.len()));
        let mut handles = Vec::with_capacity(self.nets.len());
        for built in self.nets {
            let barrier = barrier.clone();
            let name = built.net.name().to_string();
            let priority = built.priority;
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    if let Some(priority) = priority {
                        crate::priority::apply(priority, built.net.category());
                    }
                    driver::run_net(built.net, built.behavior, barrier);
                })
                .map_err(|err| RuntimeError::Spawn(name.clone(), err.to_string()))?;
            handles.push((name, handle));
        }
        Ok(RunningProgram { handles })
    }
}

/// A running program's thread handles.
pub struct RunningProgram {
    handles: Vec<(String, thread::JoinHandle<()>)>,
}

impl RunningProgram {
    /// Waits for every net's thread to finish. A panicking net is recovered
    /// as [`RuntimeError::NetPanicked`] rather than propagated, so that a
    /// single buggy box doesn't bring down the join with an unwind.
    pub fn join(self) -> Result<(), RuntimeError> {
        let mut first_panic = None;
        for (name, handle) in self.handles {
            if let Err(payload) = handle.join() {
                if first_panic.is_none() {
                    first_panic = Some((name, panic_message(&payload)));
                }
            }
        }
        match first_panic {
            Some((name, message)) => Err(RuntimeError::NetPanicked(name, message)),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "net thread panicked with a non-string payload".to_string()
    }
}

//! Net lifecycle, routing node, temporal firewall, and the program builder
//! that wires the two together with the `channel` crate's primitives.
//!
//! This crate plays the role the top-level `timely` crate plays over
//! `timely_communication` in its neighborhood: `smx_channel` is the
//! wire-level layer, and everything here is the execution model built on
//! top of it.

mod box_behavior;
mod config;
mod driver;
mod error;
mod firewall;
mod net;
mod priority;
mod program;
mod routing;

pub use box_behavior::{BoxBehavior, BoxResult};
pub use config::{Config, NetConfig};
pub use driver::ProfilerSample;
pub use error::{ConfigError, RuntimeError};
pub use firewall::{FirewallPair, TemporalFirewall};
pub use net::{Net, PortIn, PortOut};
pub use priority::Priority;
pub use program::{Direction, NetHandle, NetPorts, Program, ProgramBuilder, RunningProgram};
pub use routing::{profiler_node, RoutingNode};

pub use smx_channel::{Channel, ChannelError, Collector, Guard, Message, Payload, Variant};

use std::path::Path;

/// The process-wide entry point: reads the configuration document,
/// installs logging, and hands back a [`ProgramBuilder`] ready for graph
/// construction.
pub struct Runtime {
    config: Config,
}

impl Runtime {
    /// Reads `path` as the configuration document and installs the
    /// `tracing` subscriber it describes.
    pub fn init(path: impl AsRef<Path>) -> Result<Runtime, RuntimeError> {
        let config = Config::from_path(path)?;
        smx_logging::init(&config.logging);
        Ok(Runtime { config })
    }

    /// Starts building a graph against this runtime's configuration.
    pub fn builder(self) -> ProgramBuilder {
        ProgramBuilder::new(self.config)
    }
}

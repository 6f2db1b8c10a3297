//! A hand-written stand-in for the generated top-level program.
//!
//! Wires a small graph exercising every construction primitive: a plain
//! blocking producer/consumer edge and a temporal firewall decoupling a
//! bursty upstream from a steady downstream. A real deployment gets this
//! file from the code generator; here it is written by hand against the
//! same builder surface.

use smx_channel::{Channel, Message, Variant};
use smx_runtime::{BoxBehavior, BoxResult, Config, Direction, NetPorts, ProgramBuilder};
use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Counter {
    output: Arc<Channel>,
    next: u32,
    limit: u32,
}

impl BoxBehavior for Counter {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        if self.next >= self.limit {
            return BoxResult::End;
        }
        let _ = self.output.write(Message::new(self.next));
        self.next += 1;
        BoxResult::Return
    }
}

struct Printer {
    input: Arc<Channel>,
}

impl BoxBehavior for Printer {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        if let Ok(msg) = self.input.read() {
            tracing::debug!(value = msg.unpack::<u32>(), "printer received a value");
        }
        BoxResult::Return
    }
}

struct Burst {
    output: Arc<Channel>,
    remaining: u32,
}

impl BoxBehavior for Burst {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        if self.remaining == 0 {
            return BoxResult::End;
        }
        let _ = self.output.write(Message::new(self.remaining));
        self.remaining -= 1;
        thread::sleep(Duration::from_millis(1));
        BoxResult::Return
    }
}

struct Sampler {
    input: Arc<Channel>,
    remaining: u32,
}

impl BoxBehavior for Sampler {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        if self.remaining == 0 {
            return BoxResult::End;
        }
        if self.input.read().is_ok() {
            self.remaining -= 1;
        }
        BoxResult::Return
    }
}

fn main() {
    smx_logging::init(&smx_logging::LoggingConfig::default());

    let mut builder = ProgramBuilder::new(Config::default());

    builder.channel("counts", 2, Variant::Fifo).unwrap();
    let counter = builder
        .net("counter", |ports: &NetPorts| {
            Box::new(Counter {
                output: ports.output("counts"),
                next: 0,
                limit: 10,
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();
    let printer = builder
        .net("printer", |ports: &NetPorts| {
            Box::new(Printer {
                input: ports.input("counts"),
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();
    builder.connect(counter, "counts", "counts", Direction::Out).unwrap();
    builder.connect(printer, "counts", "counts", Direction::In).unwrap();

    builder.channel("sensor-raw", 8, Variant::FifoD).unwrap();
    builder.channel("sensor-tick", 4, Variant::Fifo).unwrap();
    let burst = builder
        .net("burst", |ports: &NetPorts| {
            Box::new(Burst {
                output: ports.output("sensor-raw"),
                remaining: 200,
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();
    builder.connect(burst, "sensor-raw", "sensor-raw", Direction::Out).unwrap();
    builder
        .connect_tf("firewall", Duration::from_millis(10), &[("sensor-raw", "sensor-tick")])
        .unwrap();
    let sampler = builder
        .net("sampler", |ports: &NetPorts| {
            Box::new(Sampler {
                input: ports.input("sensor-tick"),
                remaining: 20,
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();
    builder.connect(sampler, "sensor-tick", "sensor-tick", Direction::In).unwrap();

    let program = builder.build().expect("graph construction failed");
    let running = program.run().expect("failed to spawn net threads");
    running.join().expect("a net panicked");
}

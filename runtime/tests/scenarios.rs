//! Integration tests for the runtime's concrete end-to-end scenarios:
//! blocking/overwriting/duplicating channel disciplines, routing-node
//! fairness, temporal firewall cadence, and cascading termination through
//! the full net driver and program builder.

use smx_channel::{Channel, ChannelError, Collector, Message, Variant};
use smx_runtime::{BoxBehavior, BoxResult, Config, Direction, FirewallPair, NetPorts, ProgramBuilder, RoutingNode, TemporalFirewall};
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

struct Produce {
    output: Arc<Channel>,
    next: u32,
    limit: u32,
}

impl BoxBehavior for Produce {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        if self.next >= self.limit {
            return BoxResult::End;
        }
        self.output.write(Message::new(self.next)).ok();
        self.next += 1;
        BoxResult::Return
    }
}

struct Collect {
    input: Arc<Channel>,
    out: Arc<Mutex<Vec<u32>>>,
}

impl BoxBehavior for Collect {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        if let Ok(msg) = self.input.read() {
            self.out.lock().unwrap().push(*msg.unpack::<u32>().unwrap());
        }
        BoxResult::Return
    }
}

/// Scenario 1: two-net blocking FIFO. The FIFO length (2) is smaller than
/// the message count (10), so the producer necessarily blocks at least
/// once; both nets must still terminate cleanly via the cascading END
/// protocol driven entirely by the program builder and net driver.
#[test]
fn two_net_blocking_fifo_delivers_in_order_and_terminates() {
    let mut builder = ProgramBuilder::new(Config::default());
    builder.channel("nums", 2, Variant::Fifo).unwrap();

    let producer = builder
        .net("producer", |ports: &NetPorts| {
            Box::new(Produce {
                output: ports.output("nums"),
                next: 0,
                limit: 10,
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_for_consumer = received.clone();
    let consumer = builder
        .net("consumer", move |ports: &NetPorts| {
            Box::new(Collect {
                input: ports.input("nums"),
                out: received_for_consumer,
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();

    builder.connect(producer, "nums", "nums", Direction::Out).unwrap();
    builder.connect(consumer, "nums", "nums", Direction::In).unwrap();

    let program = builder.build().unwrap();
    let running = program.run().unwrap();
    running.join().unwrap();

    assert_eq!(*received.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

/// Scenario 2: D_FIFO overwrite. A burst of 5 messages into a length-2
/// overwriting channel leaves only the last 2 behind.
#[test]
fn d_fifo_overwrite_keeps_last_two_of_a_burst() {
    let channel = Channel::new(1, "burst", 2, Variant::DFifo);
    for v in 0..5u32 {
        channel.write(Message::new(v)).unwrap();
    }
    assert_eq!(channel.overwrite_count(), 3);

    let first = channel.read().unwrap();
    let second = channel.read().unwrap();
    assert_eq!(*first.unpack::<u32>().unwrap(), 3);
    assert_eq!(*second.unpack::<u32>().unwrap(), 4);
    assert!(matches!(channel.read(), Err(ChannelError::NoData)));
}

/// Scenario 3: FIFO_D duplicate. After the producer ends, reads keep
/// duplicating the last value indefinitely, counted in `copy`.
#[test]
fn fifo_d_duplicates_after_producer_end_until_consumer_stops() {
    let channel = Channel::new(2, "single", 4, Variant::FifoD);
    channel.write(Message::new(42u32)).unwrap();
    channel.terminate_source();

    let first = channel.read().unwrap();
    assert_eq!(*first.unpack::<u32>().unwrap(), 42);
    for _ in 0..3 {
        assert_eq!(*channel.read().unwrap().unpack::<u32>().unwrap(), 42);
    }
    assert_eq!(channel.copy_count(), 3);
}

/// Scenario 4: routing-node fairness. Three producers each burst 100
/// messages before the routing node starts draining; the node must
/// deliver all 300, exactly 100 per source, without long starvation runs.
#[test]
fn routing_node_delivers_all_messages_fairly() {
    let collector = Arc::new(Collector::new(3));
    let inputs: Vec<Arc<Channel>> = (0..3)
        .map(|i| Arc::new(Channel::new(i, format!("p{i}"), 128, Variant::Fifo).with_collector(collector.clone())))
        .collect();
    let output = Arc::new(Channel::new(10, "merged", 400, Variant::Fifo));

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
    let mut sequence = Vec::new();
    while output.ready_to_read() > 0 {
        let msg = output.read().unwrap();
        let (src, _seq) = *msg.unpack::<(u32, u32)>().unwrap();
        counts[src as usize] += 1;
        sequence.push(src);
    }

    assert_eq!(counts, [100, 100, 100]);

    let mut longest_run = 1;
    let mut current_run = 1;
    for window in sequence.windows(2) {
        if window[0] == window[1] {
            current_run += 1;
            longest_run = longest_run.max(current_run);
        } else {
            current_run = 1;
        }
    }
    assert!(longest_run <= 3, "one source ran {longest_run} consecutive reads, fairness broken");
}

/// Scenario 5: temporal firewall cadence. Upstream produces faster than
/// the firewall's period; the firewall should tick close to its configured
/// period and forward the most recent sample each time.
#[test]
fn temporal_firewall_ticks_at_its_configured_period() {
    let input = Arc::new(Channel::new(1, "upstream", 16, Variant::FifoD));
    let output = Arc::new(Channel::new(2, "downstream", 16, Variant::Fifo));
    let period = Duration::from_millis(10);
    let pairs = vec![FirewallPair {
        input: input.clone(),
        output: output.clone(),
    }];
    let mut firewall = TemporalFirewall::new("tf", period, pairs);
    let mut state = firewall.init().unwrap();

    let producer = {
        let input = input.clone();
        thread::spawn(move || {
            for v in 0..300u32 {
                input.write(Message::new(v)).ok();
                thread::sleep(Duration::from_micros(500));
            }
        })
    };

    let mut arrivals = Vec::new();
    for _ in 0..20 {
        let before = Instant::now();
        firewall.step(&mut state);
        arrivals.push(before.elapsed());
    }
    producer.join().unwrap();

    for gap in &arrivals[1..] {
        assert!(gap.as_millis() as i64 - period.as_millis() as i64 <= 5, "tick gap {gap:?} drifted too far from {period:?}");
    }
}

struct Forward {
    input: Arc<Channel>,
    output: Arc<Channel>,
}

impl BoxBehavior for Forward {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        match self.input.read() {
            Ok(msg) => {
                self.output.write(msg).ok();
                BoxResult::Return
            }
            Err(_) => BoxResult::Return,
        }
    }
}

struct EndImmediately;

impl BoxBehavior for EndImmediately {
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String> {
        Ok(Box::new(()))
    }

    fn step(&mut self, _state: &mut Box<dyn Any + Send>) -> BoxResult {
        BoxResult::End
    }
}

/// Scenario 6: cascading termination through a three-net chain A->B->C.
/// A ends on its first step; B and C must follow without deadlock, purely
/// from observing source END with an empty FIFO.
#[test]
fn cascading_termination_propagates_through_a_chain() {
    let mut builder = ProgramBuilder::new(Config::default());
    builder.channel("a-to-b", 4, Variant::Fifo).unwrap();
    builder.channel("b-to-c", 4, Variant::Fifo).unwrap();

    let a = builder.net("a", |_ports: &NetPorts| Box::new(EndImmediately) as Box<dyn BoxBehavior>).unwrap();
    let b = builder
        .net("b", |ports: &NetPorts| {
            Box::new(Forward {
                input: ports.input("a-to-b"),
                output: ports.output("b-to-c"),
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_for_c = received.clone();
    let c = builder
        .net("c", move |ports: &NetPorts| {
            Box::new(Collect {
                input: ports.input("b-to-c"),
                out: received_for_c,
            }) as Box<dyn BoxBehavior>
        })
        .unwrap();

    builder.connect(a, "a-to-b", "a-to-b", Direction::Out).unwrap();
    builder.connect(b, "a-to-b", "a-to-b", Direction::In).unwrap();
    builder.connect(b, "b-to-c", "b-to-c", Direction::Out).unwrap();
    builder.connect(c, "b-to-c", "b-to-c", Direction::In).unwrap();

    let program = builder.build().unwrap();
    let running = program.run().unwrap();
    running.join().unwrap();

    assert!(received.lock().unwrap().is_empty());
}

//! The net driver: the thread entry point every net runs through,
//! regardless of what its box actually does.

use crate::box_behavior::{BoxBehavior, BoxResult};
use crate::net::Net;
use smx_channel::Message;
use smx_logging::{ProfilerEvent, ProfilerEventKind};
use std::sync::Barrier;
use std::time::Instant;

/// A sample forwarded on a net's profiler channel. The wire format is
/// unstandardized by design (only a user-written backend net interprets
/// it); this is this runtime's own choice of payload.
#[derive(Debug, Clone)]
pub struct ProfilerSample {
    pub net: String,
    pub tick: u64,
    pub elapsed_nanos: u128,
}

/// Runs one net to completion: init, barrier, main loop, terminate,
/// cleanup. Never panics on an ordinary box error (those flow back
/// through `BoxResult`/channel errors), but a panicking `step` call
/// propagates, to be recovered by `Program::join`.
pub fn run_net(net: Net, mut behavior: Box<dyn BoxBehavior>, barrier: std::sync::Arc<Barrier>) {
    net.category().lifecycle("init");
    let init_result = behavior.init();

    barrier.wait();

    let mut state = match init_result {
        Ok(state) => Some(state),
        Err(err) => {
            net.category().warn_event(&format!("init failed, net will not run: {err}"));
            None
        }
    };

    if let Some(mut st) = state.take() {
        net.category().lifecycle("start");
        let mut tick: u64 = 0;
        loop {
            smx_logging::profiler_event(&ProfilerEvent {
                net: net.name().to_string(),
                kind: ProfilerEventKind::Start,
            });

            let started = Instant::now();
            let result = behavior.step(&mut st);
            let elapsed = started.elapsed();

            if let Some(profiler_channel) = net.profiler() {
                let sample = ProfilerSample {
                    net: net.name().to_string(),
                    tick,
                    elapsed_nanos: elapsed.as_nanos(),
                };
                if let Err(rejected) = profiler_channel.write(Message::new(sample)) {
                    net.category()
                        .warn_event(&format!("profiler write rejected: {}", rejected.error));
                }
            }

            net.category().debug_event("step");
            tick += 1;

            let decision = net.resolve(result);
            if decision == BoxResult::End {
                break;
            }
        }
        behavior.cleanup(st);
        smx_logging::profiler_event(&ProfilerEvent {
            net: net.name().to_string(),
            kind: ProfilerEventKind::End,
        });
    }

    net.terminate();
    net.category().lifecycle("terminate");
}

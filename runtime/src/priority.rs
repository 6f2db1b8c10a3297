//! Real-time thread scheduling for net threads.
//!
//! The original runtime calls `pthread_setschedparam` with `SCHED_FIFO`
//! right after spawning a net's thread; temporal firewalls are given an
//! elevated priority by default so their tick cadence isn't starved by
//! best-effort nets. `original_source` only ever targeted Linux, so the
//! non-Linux path is a logged no-op rather than a second implementation.

use smx_logging::Category;

/// A `SCHED_FIFO` priority value, in the kernel's 1-99 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority(pub i32);

impl Priority {
    /// The elevated default used for temporal firewalls unless the graph
    /// overrides it.
    pub const FIREWALL_DEFAULT: Priority = Priority(50);
}

#[cfg(target_os = "linux")]
pub fn apply(priority: Priority, category: &Category) {
    unsafe {
        let thread = libc::pthread_self();
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority.0;
        let rc = libc::pthread_setschedparam(thread, libc::SCHED_FIFO, &param);
        if rc != 0 {
            category.warn_event("failed to apply SCHED_FIFO priority, continuing at default priority");
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn apply(_priority: Priority, category: &Category) {
    category.warn_event("real-time scheduling is only implemented on Linux");
}

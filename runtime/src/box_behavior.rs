//! The box contract: the opaque init/step/cleanup hooks a net's thread
//! drives.
//!
//! State is an opaque `Box<dyn Any + Send>`, mirroring the `void* state`
//! handed between a box's `init`/`step`/`cleanup` hooks in the original
//! runtime: the driver never inspects it, only a box's own downcast does.

use std::any::Any;

/// What the driver should do after a `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxResult {
    /// Call `step` again.
    Continue,
    /// Stop the main loop and terminate.
    End,
    /// Let the driver decide, from the triggering-input / output-sink rule
    /// in the net's state-update step.
    Return,
}

/// A net's behavior: the part of a net that is specific to what it does,
/// as opposed to its ports, category, and lifecycle, which the driver
/// manages uniformly for every net.
pub trait BoxBehavior: Send {
    /// Runs once before the init barrier. Returns the opaque state handed
    /// to every subsequent `step` call, or an error that is logged and
    /// treated as terminal for this net (but not the rest of the program).
    fn init(&mut self) -> Result<Box<dyn Any + Send>, String>;

    /// Runs once per main-loop iteration.
    fn step(&mut self, state: &mut Box<dyn Any + Send>) -> BoxResult;

    /// Runs once after the main loop exits, consuming the state.
    #[allow(unused_variables)]
    fn cleanup(&mut self, state: Box<dyn Any + Send>) {}
}

//! Bounded message channels for the dataflow runtime.
//!
//! This crate is the runtime's communication layer: owned [`Message`]
//! payloads moving through [`Channel`]s built on a [`Fifo`] ring buffer,
//! with optional [`Collector`]-based fan-in and [`Guard`]-based rate
//! limiting. It has no notion of nets, threads, or graphs (those live in
//! `smx_runtime`, which is built entirely on top of the types exported
//! here).

mod channel;
mod collector;
mod error;
mod fifo;
mod guard;
mod message;

pub use channel::{Channel, State, WriteOutcome, WriteRejected};
pub use collector::{Acquired, Collector, CollectorState};
pub use error::ChannelError;
pub use fifo::{Fifo, PopOutcome, PushOutcome, Variant};
pub use guard::{Guard, GuardOutcome};
pub use message::{Message, Payload};

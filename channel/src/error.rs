//! The channel-end error taxonomy.
//!
//! Every fallible channel operation returns one of these, matching
//! `smx_channel_err_e` in the original runtime one for one. `NoError` is not
//! a variant here: a successful operation is `Ok`, and only the failure
//! path carries a [`ChannelError`].

use thiserror::Error;

/// An error observed on one end of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// A decoupled-output read found the channel never written to.
    #[error("channel end was never initialised")]
    Uninitialised,
    /// The source has ended and the FIFO is empty: nothing left to read.
    #[error("source ended with no data remaining")]
    NoData,
    /// The sink has ended while a writer was waiting for space.
    #[error("sink ended with no space available")]
    NoSpace,
    /// A temporal firewall tick arrived later than its period.
    #[error("firewall tick missed its deadline")]
    DeadlineMiss,
    /// The counterpart end has already terminated.
    #[error("counterpart end has terminated")]
    NoTarget,
}

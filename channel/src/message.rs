//! Owned message payloads.
//!
//! The original runtime attaches three function pointers to every message:
//! a deep-copy hook, a destroy hook, and an unpack hook. Rust already gives
//! every value a destructor, so `destroy` is simply `Drop`; the remaining
//! two capabilities are expressed as the [`Payload`] trait, which a message
//! type implements instead of handing the channel layer raw function
//! pointers.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Capability a message payload provides to the channel layer.
///
/// `clone_payload` is the deep-copy hook (used by decoupled-output reads
/// that must hand back a duplicate of the last message without disturbing
/// the original's ownership) and `as_any` is the unpack hook (used by box
/// code that knows the concrete payload type and wants to inspect it).
///
/// Any `Clone + Send + 'static` type implements this automatically; there
/// is no global hook table to register, each message simply carries its
/// own vtable via the `Box<dyn Payload>` it is stored behind.
pub trait Payload: Any + Send {
    /// Produces an independently owned copy of this payload.
    fn clone_payload(&self) -> Box<dyn Payload>;
    /// Exposes the payload for downcasting by box code that knows its type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Clone + Send + 'static> Payload for T {
    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(self.clone())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An owned message moving through the channel layer.
///
/// Exactly one owner holds a `Message` at a time: ownership transfers into
/// a channel on a successful [`write`](crate::channel::Channel::write) and
/// back out on a successful
/// [`read`](crate::channel::Channel::read). Its `id` is assigned once, at
/// construction, and is never reused within the process. [`Message::copy`]
/// always allocates a fresh id for the duplicate, since a copy is a new
/// message with its own identity, not an alias of the original.
pub struct Message {
    id: u64,
    payload: Box<dyn Payload>,
}

impl Message {
    /// Wraps `payload` as a new message with a fresh, process-wide id.
    pub fn new<T: Payload>(payload: T) -> Self {
        Message {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            payload: Box::new(payload),
        }
    }

    /// The message's unique, monotonically assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Produces a deep copy with a new id, via the payload's copy hook.
    pub fn copy(&self) -> Message {
        Message {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            payload: self.payload.clone_payload(),
        }
    }

    /// Unpacks the payload as `T`, returning `None` if it holds a different
    /// concrete type.
    pub fn unpack<T: 'static>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let a = Message::new(1u32);
        let b = Message::new(2u32);
        assert!(b.id() > a.id());
    }

    #[test]
    fn copy_preserves_payload_but_assigns_new_id() {
        let original = Message::new(String::from("hello"));
        let copy = original.copy();
        assert_ne!(original.id(), copy.id());
        assert_eq!(original.unpack::<String>(), copy.unpack::<String>());
    }

    #[test]
    fn unpack_rejects_wrong_type() {
        let msg = Message::new(42i32);
        assert_eq!(msg.unpack::<i32>(), Some(&42));
        assert_eq!(msg.unpack::<String>(), None);
    }
}

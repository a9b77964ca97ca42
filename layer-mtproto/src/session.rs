//! Plaintext session state.

use crate::message::{Message, MessageId};

/// Hands out message ids for one connection.
///
/// A `Session` is cheap to create; make a new one per connection.
pub struct Session {
    msg_counter: u32,
}

impl Session {
    /// Create a fresh session.
    pub fn new() -> Self {
        Self { msg_counter: 0 }
    }

    /// Allocate a new message ID.
    pub fn next_msg_id(&mut self) -> MessageId {
        self.msg_counter = self.msg_counter.wrapping_add(1);
        MessageId::generate(self.msg_counter)
    }

    /// Wrap a serialized TL body into a [`Message`] ready to send.
    pub fn pack(&mut self, body: Vec<u8>) -> Message {
        let id = self.next_msg_id();
        Message::plaintext(id, body)
    }
}

impl Default for Session {
    fn default() -> Self { Self::new() }
}

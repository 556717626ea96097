//! Pending outbound publishes.

use super::error::PublishError;
use super::packet::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use heapless::{String, Vec};
use serde::Serialize;

/// Number of publishes that can wait for a connection at once.
pub const OUTBOX_DEPTH: usize = 4;

/// A serialized message waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    topic: String<MAX_TOPIC_LEN>,
    payload: Vec<u8, MAX_PAYLOAD_LEN>,
    retain: bool,
}

impl Pending {
    /// Serialize `value` as JSON for `topic`.
    pub fn new<T>(topic: &str, value: &T, retain: bool) -> Result<Self, PublishError>
    where
        T: Serialize + ?Sized,
    {
        let topic = String::try_from(topic).map_err(|_| PublishError::TopicTooLong)?;
        let mut payload = Vec::new();
        payload
            .resize_default(MAX_PAYLOAD_LEN)
            .map_err(|_| PublishError::PayloadTooLarge)?;
        let len = serde_json_core::to_slice(value, &mut payload)
            .map_err(|_| PublishError::PayloadTooLarge)?;
        payload.truncate(len);
        Ok(Self {
            topic,
            payload,
            retain,
        })
    }

    /// Topic to publish on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// JSON payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the broker should retain the message
    pub fn retain(&self) -> bool {
        self.retain
    }
}

/// Fixed slots of pending publishes, addressed by index.
///
/// A slot stays occupied until [`Outbox::take`] frees it, so an index handed
/// out by [`Outbox::insert`] names the same message until then.
#[derive(Debug)]
pub struct Outbox<const N: usize = OUTBOX_DEPTH> {
    slots: [Option<Pending>; N],
}

impl<const N: usize> Outbox<N> {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Store `message` in a free slot and return its index.
    pub fn insert(&mut self, message: Pending) -> Result<usize, PublishError> {
        let (slot, free) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(PublishError::OutboxFull)?;
        *free = Some(message);
        Ok(slot)
    }

    /// Remove and return the message in `slot`.
    pub fn take(&mut self, slot: usize) -> Option<Pending> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether every slot is free.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for Outbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Reading {
        v: u32,
    }

    #[test]
    fn serializes_json() {
        let pending = Pending::new("a/b", &Reading { v: 7 }, true).unwrap();
        assert_eq!(pending.topic(), "a/b");
        assert_eq!(pending.payload(), br#"{"v":7}"#);
        assert!(pending.retain());
    }

    #[test]
    fn rejects_oversized_input() {
        let long = [b'x'; MAX_TOPIC_LEN + 1];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            Pending::new(long, &1u8, false),
            Err(PublishError::TopicTooLong)
        );

        let big = [0u32; MAX_PAYLOAD_LEN];
        assert_eq!(
            Pending::new("t", &big[..], false),
            Err(PublishError::PayloadTooLarge)
        );
    }

    #[test]
    fn slots_are_reused() {
        let mut outbox: Outbox<2> = Outbox::new();
        let a = outbox.insert(Pending::new("a", &1u8, false).unwrap()).unwrap();
        let b = outbox.insert(Pending::new("b", &2u8, false).unwrap()).unwrap();
        assert_ne!(a, b);
        assert_eq!(
            outbox.insert(Pending::new("c", &3u8, false).unwrap()),
            Err(PublishError::OutboxFull)
        );

        assert_eq!(outbox.take(a).map(|p| p.payload()[0]), Some(b'1'));
        assert_eq!(outbox.take(a), None);
        assert_eq!(outbox.len(), 1);
        assert_eq!(
            outbox.insert(Pending::new("c", &3u8, false).unwrap()),
            Ok(a)
        );
    }
}

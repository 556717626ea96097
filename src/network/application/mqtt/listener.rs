//! Topic listeners and the registry that routes inbound messages to them.

use super::error::RegistryError;
use super::packet::MAX_TOPIC_LEN;
use heapless::{String, Vec};
use serde::Deserialize;

/// Maximum number of listeners a session can hold.
pub const MAX_LISTENERS: usize = 8;

/// A JSON document received on a subscribed topic.
///
/// The bytes are handed over as received. Decoding happens in the listener,
/// so a malformed payload only affects the listener that parses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Json<'a>(&'a [u8]);

impl<'a> Json<'a> {
    /// Wrap raw payload bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    /// The raw payload.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// The payload as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.0).ok()
    }

    /// Deserialize the payload into `T`.
    pub fn parse<T>(&self) -> Result<T, serde_json_core::de::Error>
    where
        T: Deserialize<'a>,
    {
        serde_json_core::from_slice(self.0).map(|(value, _)| value)
    }
}

/// Receives messages published on one topic.
pub trait TopicListener {
    /// Called with the topic and its JSON payload, or `None` when the
    /// message was empty.
    fn on_message(&mut self, topic: &str, payload: Option<Json<'_>>);
}

impl<F> TopicListener for F
where
    F: FnMut(&str, Option<Json<'_>>),
{
    fn on_message(&mut self, topic: &str, payload: Option<Json<'_>>) {
        self(topic, payload)
    }
}

/// Ordered `(topic, listener)` pairs.
///
/// Registration order is kept and duplicates are allowed; dispatch picks the
/// first entry whose topic equals the message topic exactly.
#[derive(Debug)]
pub struct Listeners<L, const N: usize = MAX_LISTENERS> {
    entries: Vec<(String<MAX_TOPIC_LEN>, L), N>,
}

impl<L: TopicListener, const N: usize> Listeners<L, N> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a listener for `topic`
    pub fn register(&mut self, topic: &str, listener: L) -> Result<(), RegistryError> {
        let key = String::try_from(topic).map_err(|_| RegistryError::TopicTooLong)?;
        self.entries
            .push((key, listener))
            .map_err(|_| RegistryError::Full)
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered topics in registration order
    pub fn topics(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(topic, _)| topic.as_str())
    }

    /// Deliver a message to the first listener registered for `topic`.
    ///
    /// Returns `false` when no listener matched.
    pub fn dispatch(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Some((_, listener)) = self
            .entries
            .iter_mut()
            .find(|(key, _)| key.as_str() == topic)
        else {
            return false;
        };
        let json = if payload.is_empty() {
            None
        } else {
            Some(Json::new(payload))
        };
        listener.on_message(topic, json);
        true
    }
}

impl<L: TopicListener, const N: usize> Default for Listeners<L, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: u32,
        last: Option<f32>,
        empty: bool,
    }

    #[derive(Deserialize)]
    struct Reading {
        v: f32,
    }

    impl TopicListener for Counter {
        fn on_message(&mut self, _topic: &str, payload: Option<Json<'_>>) {
            self.calls += 1;
            match payload {
                Some(json) => self.last = json.parse::<Reading>().ok().map(|r| r.v),
                None => self.empty = true,
            }
        }
    }

    #[test]
    fn first_exact_match_wins() {
        let mut listeners: Listeners<Counter, 4> = Listeners::new();
        listeners.register("a/b", Counter::default()).unwrap();
        listeners.register("a/b", Counter::default()).unwrap();
        listeners.register("a/c", Counter::default()).unwrap();

        assert!(listeners.dispatch("a/b", br#"{"v":1.5}"#));
        assert!(!listeners.dispatch("a/+", b"{}"));
        assert!(!listeners.dispatch("a/b/c", b"{}"));

        let calls: heapless::Vec<u32, 4> = listeners.entries.iter().map(|(_, l)| l.calls).collect();
        assert_eq!(calls.as_slice(), &[1, 0, 0]);
        assert_eq!(listeners.entries[0].1.last, Some(1.5));
    }

    #[test]
    fn empty_payload_is_none() {
        let mut listeners: Listeners<Counter, 1> = Listeners::new();
        listeners.register("t", Counter::default()).unwrap();
        assert!(listeners.dispatch("t", b""));
        assert!(listeners.entries[0].1.empty);
    }

    #[test]
    fn malformed_json_reaches_listener() {
        let mut listeners: Listeners<Counter, 1> = Listeners::new();
        listeners.register("t", Counter::default()).unwrap();
        assert!(listeners.dispatch("t", b"{not json"));
        assert_eq!(listeners.entries[0].1.calls, 1);
        assert_eq!(listeners.entries[0].1.last, None);
    }

    #[test]
    fn register_limits() {
        let mut listeners: Listeners<Counter, 1> = Listeners::new();
        listeners.register("t", Counter::default()).unwrap();
        assert_eq!(
            listeners.register("u", Counter::default()),
            Err(RegistryError::Full)
        );

        let mut listeners: Listeners<Counter, 1> = Listeners::new();
        let long = [b'x'; MAX_TOPIC_LEN + 1];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            listeners.register(long, Counter::default()),
            Err(RegistryError::TopicTooLong)
        );
    }

    #[test]
    fn closures_are_listeners() {
        let mut seen = 0;
        {
            let mut listeners: Listeners<_, 1> = Listeners::new();
            listeners
                .register("t", |_: &str, payload: Option<Json<'_>>| {
                    if payload.is_some() {
                        seen += 1;
                    }
                })
                .unwrap();
            listeners.dispatch("t", b"1");
        }
        assert_eq!(seen, 1);
    }
}

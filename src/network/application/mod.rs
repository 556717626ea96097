//! # Application Layer Network Protocols
//!
//! Protocols built on the core network traits. Each client works with any
//! type implementing [`Connection`](crate::network::Connection), uses fixed
//! size buffers only and reports failures through its own error type.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client for lightweight publish-subscribe messaging

/// MQTT client implementation.
///
/// Provides the MQTT 3.1.1 codec and a reconnecting session driven by the
/// cooperative scheduler in [`crate::system::tasks`].
pub mod mqtt;

//! # mqtt-uplink
//!
//! Keeps a Wi-Fi connected device attached to an MQTT broker without ever
//! blocking the rest of its firmware. Designed for embedded systems and
//! `no_std` environments.
//!
//! ## Features
//!
//! ### Network
//! - **Transport traits**: non-blocking readiness plus plain read, write and
//!   close, implemented by the platform's TCP stack
//! - **Wi-Fi station**: scan and associate with the first known network in range
//! - **MQTT 3.1.1**: packet codec and a self-healing session that reconnects
//!   after every failure
//!
//! ### System Utilities
//! - Cooperative task primitives (`now`, `after`, `race`) and a small
//!   fixed-capacity runner
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mqtt-uplink = "0.1.0"
//! ```
//!
//! See [`network::application::mqtt`] for a complete session example.
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers with a Wi-Fi radio (ESP32, RP2040 W, etc.)
//! - Linux-based IoT devices, through the `std` connector
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: `std::net` TCP connector (default: disabled)
//! - `defmt`: log through defmt for embedded debugging
//! - `log`: log through the `log` facade

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer and the MQTT client built on it.
///
/// Contains the transport and Wi-Fi traits a platform implements, plus the
/// MQTT codec and session.
pub mod network;

/// System utilities for embedded devices.
///
/// Contains the cooperative scheduling primitives the MQTT session runs on.
pub mod system;

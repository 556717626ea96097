//! System utilities for embedded devices.
//!
//! # Available Utilities
//!
//! - **[`tasks`]**: cooperative scheduling primitives and a fixed-capacity runner
//!
//! # Design Principles
//!
//! - **Embedded-First**: nothing here needs an allocator or an OS
//! - **Zero-Allocation**: fixed-size buffers and stack-based operations
//!
//! # Usage
//!
//! ```rust
//! use mqtt_uplink::system::tasks::{Priority, Scheduler, Task, TaskList};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Blink {
//!     On,
//!     Off,
//! }
//!
//! struct Led {
//!     lit: bool,
//! }
//!
//! impl Task for Led {
//!     type Step = Blink;
//!     type Condition = ();
//!
//!     fn run<S: Scheduler<Blink, ()>>(&mut self, step: Blink, scheduler: &mut S) {
//!         self.lit = step == Blink::On;
//!         let next = if self.lit { Blink::Off } else { Blink::On };
//!         let _ = scheduler.after(500, next);
//!     }
//!
//!     fn poll(&mut self, _: &()) -> bool {
//!         false
//!     }
//! }
//!
//! let mut led = Led { lit: false };
//! let mut tasks: TaskList<Blink, (), 4> = TaskList::new();
//! tasks.now(Blink::On, Priority::Normal).unwrap();
//! tasks.tick(0, &mut led);
//! assert!(led.lit);
//! tasks.tick(500, &mut led);
//! assert!(!led.lit);
//! ```

/// Cooperative task scheduling.
///
/// Defines the `now`/`after`/`race` primitives long-running state machines
/// use to queue their next step, and a reference runner implementing them.
pub mod tasks;

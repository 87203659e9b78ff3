//! Simulated CAN FD module for host runs of fdlink
//!
//! The module models the parts of an M_CAN style peripheral the exchange relies on: per-node
//! dedicated transmit buffer and receive FIFO 0 in the message RAM word layout, interrupt flag
//! and enable registers, line routing with edge-triggered service requests, and physical
//! loop-back wiring between two nodes.
//!
//! Every step is recorded in an ordered [`Event`] log, and faults can be injected to exercise
//! failure paths.

mod collab;
mod event;
mod module;
mod node;

pub use collab::{SimDelay, SimPin};
pub use event::{DropReason, Event, Fault};
pub use module::{EVENT_LOG_CAPACITY, SimModule, Wiring};
pub use node::{SimError, SimNode};

/// CAN kernel clock the default bit timings are computed for
pub const KERNEL_CLOCK_HZ: u32 = 80_000_000;

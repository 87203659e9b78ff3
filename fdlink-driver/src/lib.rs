//! Interface between the fdlink exchange and CAN FD peripheral drivers
//!
//! The crate defines the frame object, the node configuration, the module/node and interrupt
//! controller traits a peripheral driver implements, and the message RAM element codec.
#![no_std]

// This must go FIRST so that all the other modules see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod element;
pub mod frame;
pub mod interrupt;
pub mod node;

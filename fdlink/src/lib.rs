//! # fdlink
//!
//! Point-to-point CAN FD frame exchange between two nodes of one CAN module wired in loop-back.
//! The source node transmits a fixed test pattern from a dedicated buffer, the destination node
//! receives it into FIFO 0 and raises a new message interrupt. The interrupt handler drains the
//! frame, and the driving loop compares it with the transmitted one.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────┐ transmit ┌────────────────┐  loop-back  ┌─────────────────────┐
//!  │ Runner ├─────────►│ SourceEndpoint ├────────────►│ DestinationEndpoint │
//!  └───┬────┘          └────────────────┘             └──────────┬──────────┘
//!      │ verify        ┌────────────┐   on_interrupt  ┌──────────┴──────────┐
//!      └──────────────►│ StatusCell │                 │      RxContext      │
//!       take_received  └────────────┘                 │ counter · mailbox   │
//!      ◄──────────────────────────────────────────────┴─────────────────────┘
//! ```
//! Components:
//! * _UseCase_ is a frame template: identifier, identifier length, frame mode and data length
//!   code. [`usecase::USE_CASES`] holds the exercised set.
//! * The _configurator_ derives the node configuration of both directions from a use case.
//! * _ExchangeSession_ owns the source endpoint and fills and submits the test frame.
//! * _RxContext_ owns the destination endpoint. Its interrupt handler clears the new message
//!   flag, reads FIFO 0, posts the frame to a single-slot mailbox and counts the receipt.
//! * _Runner_ paces the exchange and drives the success indicator from the [`verify::StatusCell`].
//!
//! ## Concurrency model
//!
//! There are two contexts: the main loop and the receive interrupt. The handler is the only
//! writer of the receive state. Main-line code reads the counter and the mailbox together inside
//! one critical section, so a frame and its receipt number are always consistent.
//!
//! Transmission polls the dedicated buffer while the node reports it busy. The poll is bounded
//! and reports a timeout instead of hanging on a stalled transmitter.
#![no_std]

pub use fdlink_core as core;
pub use fdlink_driver::{config as node_config, frame, interrupt, node};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod endpoint;
pub mod error;
pub mod runner;
pub mod session;
pub mod usecase;
pub mod verify;

#[cfg(test)]
use critical_section as _;

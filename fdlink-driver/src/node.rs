//! CAN module and node interface

use crate::config::{EndpointConfig, RxFifo};
use crate::frame::Frame;
use crate::interrupt::Interrupt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The module has not been enabled and reset
    NotIdle,
    /// The node has already been initialized
    NodeOccupied,
    /// The configuration is not supported by the hardware
    InvalidConfig,
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::NotIdle => f.write_str("CAN module is not in a configurable state"),
            InitError::NodeOccupied => f.write_str("CAN node is already initialized"),
            InitError::InvalidConfig => f.write_str("CAN node configuration is not supported"),
        }
    }
}

/// CAN module with a set of nodes sharing the message RAM
pub trait Module {
    type Node: Node;

    /// Applies the configuration and starts the node.
    fn init_node(&self, config: &EndpointConfig) -> Result<Self::Node, InitError>;
}

/// Initialized CAN node
pub trait Node {
    type Error: core::fmt::Debug;

    fn config(&self) -> &EndpointConfig;

    /// Requests transmission of the frame from the node transmit buffer.
    ///
    /// Returns `WouldBlock` while the previous request is still pending.
    fn send(&mut self, frame: &Frame) -> nb::Result<(), Self::Error>;

    /// Pops the oldest frame of the receive FIFO.
    ///
    /// Returns `WouldBlock` if the FIFO is empty.
    fn read(&mut self, fifo: RxFifo) -> nb::Result<Frame, Self::Error>;

    fn interrupt_flag(&self, interrupt: Interrupt) -> bool;

    fn clear_interrupt_flag(&mut self, interrupt: Interrupt);
}

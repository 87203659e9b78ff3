use fdlink_driver::config::NodeId;
use fdlink_driver::interrupt::{Interrupt, InterruptLine};

/// Reason a transmitted frame did not reach a receive FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The receive FIFO had no free element
    FifoFull,
    /// Nominal or data bit rates of the two nodes differ
    BitRateMismatch,
    /// FD frame sent to a classic node
    NotFdCapable,
    /// The receiving element data field is shorter than the payload
    FieldSizeExceeded,
    /// The node is not configured for reception
    NotReceiving,
    Injected,
}

/// Instrumentation record of the simulated module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    TransmitRequested { node: NodeId, id: u32 },
    TransmitCompleted { node: NodeId, id: u32 },
    Delivered { node: NodeId, id: u32 },
    Dropped {
        node: NodeId,
        id: u32,
        reason: DropReason,
    },
    FlagRaised { node: NodeId, interrupt: Interrupt },
    FlagCleared { node: NodeId, interrupt: Interrupt },
    FifoRead { node: NodeId, id: u32 },
    FifoEmpty { node: NodeId },
    HandlerEnter { line: InterruptLine },
    HandlerExit { line: InterruptLine },
}

/// Injectable hardware misbehavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The transmit buffer never completes
    TransmitterStalled,
    /// The transmit buffer stays busy for the given number of bus steps
    TransmitterBusy { steps: u32 },
    /// Inverts one payload byte of the next delivered frame
    CorruptPayload { offset: usize },
    /// Flips the lowest identifier bit of the next delivered frame
    CorruptIdentifier,
    /// Loses the next frame on the wire
    DropFrame,
    /// Raises the receive FIFO 0 new message flag without a frame
    SpuriousRxInterrupt,
}

#[derive(Debug, Default)]
pub(crate) struct Faults {
    pub stalled: bool,
    pub busy_steps: u32,
    pub corrupt_payload: Option<usize>,
    pub corrupt_identifier: bool,
    pub drop_frame: bool,
}

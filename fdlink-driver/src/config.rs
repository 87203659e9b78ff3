use core::num::{NonZeroU8, NonZeroU16};
use fdlink_core::{DataFieldSize, FrameMode};

use crate::interrupt::{Interrupt, InterruptLine, ServiceTarget};

/// Node index within a CAN module
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(u8);

impl NodeId {
    const MAX_VALUE: u8 = 3;
    pub const MAX: NodeId = NodeId(Self::MAX_VALUE);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl From<NodeId> for usize {
    fn from(value: NodeId) -> Self {
        value.0.into()
    }
}

/// Direction an endpoint serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Transmit,
    Receive,
}

/// Receive FIFO selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifo {
    Fifo0,
    Fifo1,
}

impl RxFifo {
    pub const fn new_message_interrupt(self) -> Interrupt {
        match self {
            RxFifo::Fifo0 => Interrupt::RxFifo0NewMessage,
            RxFifo::Fifo1 => Interrupt::RxFifo1NewMessage,
        }
    }
}

/// Message RAM organization of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferStrategy {
    /// A fixed transmit slot. A new request is refused while the previous one is pending.
    DedicatedBuffer { index: u8 },
    /// A receive FIFO holding up to `depth` frames pending software drain
    Fifo { fifo: RxFifo, depth: u8 },
}

/// Interrupt enablement and routing for a single interrupt source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptConfig {
    pub source: Interrupt,
    /// Service request priority. Zero is reserved for a disabled request.
    pub priority: NonZeroU8,
    pub line: InterruptLine,
    pub service_target: ServiceTarget,
}

/// Bit timing during arbitration phase and data phase without bit rate switch (BRS)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NominalBitTiming {
    /// Prescaler for the kernel clock. The bit time is built from multiples of this quantum.
    /// Valid range: 1 to 512.
    pub prescaler: NonZeroU16,
    /// Time segment 1 (includes propagation and phase segments).
    /// Valid range: 1 to 256.
    pub seg1: NonZeroU16,
    /// Time segment 2 (phase segment 2).
    /// Valid range: 1 to 128.
    pub seg2: NonZeroU8,
    /// Synchronization jump width for clock tolerance.
    /// Valid range: 1 to 128.
    pub sync_jump_width: NonZeroU8,
}

impl NominalBitTiming {
    /// Bit rate in bit/s for the given kernel clock
    pub fn bit_rate(&self, kernel_clock_hz: u32) -> u32 {
        let quanta = 1 + u32::from(self.seg1.get()) + u32::from(self.seg2.get());
        kernel_clock_hz / (u32::from(self.prescaler.get()) * quanta)
    }
}

impl Default for NominalBitTiming {
    #[inline]
    fn default() -> Self {
        // Kernel clock: 80 MHz, bit rate: 500 kbit/s, sample point: 0.8
        Self {
            prescaler: unwrap!(NonZeroU16::new(4)),
            seg1: unwrap!(NonZeroU16::new(31)),
            seg2: unwrap!(NonZeroU8::new(8)),
            sync_jump_width: unwrap!(NonZeroU8::new(8)),
        }
    }
}

/// Transceiver delay compensation during data phase with bit rate switch (BRS).
///
/// The transmitter measures the loop delay at the start of the data phase and positions
/// a secondary sample point at measured_delay + offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransceiverDelayCompensation {
    /// Secondary sample point offset from the measured delay, in time quanta (Tq).
    /// Valid range: 0 to 127.
    pub offset: u8,
    /// Duration (in Tq) to block dominant bus level detection.
    /// Valid range: 0 to 127.
    pub filter_window_length: u8,
}

/// Bit timing during data phase with bit rate switch (BRS)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataBitTiming {
    /// Valid range: 1 to 32.
    pub prescaler: NonZeroU8,
    /// Valid range: 1 to 32.
    pub seg1: NonZeroU8,
    /// Valid range: 1 to 16.
    pub seg2: NonZeroU8,
    /// Valid range: 1 to 16.
    pub sync_jump_width: NonZeroU8,
    pub tx_delay_compensation: Option<TransceiverDelayCompensation>,
}

impl DataBitTiming {
    /// Bit rate in bit/s for the given kernel clock
    pub fn bit_rate(&self, kernel_clock_hz: u32) -> u32 {
        let quanta = 1 + u32::from(self.seg1.get()) + u32::from(self.seg2.get());
        kernel_clock_hz / (u32::from(self.prescaler.get()) * quanta)
    }
}

impl Default for DataBitTiming {
    #[inline]
    fn default() -> Self {
        // Kernel clock: 80 MHz, bit rate: 2 Mbit/s, sample point: 0.8
        Self {
            prescaler: unwrap!(NonZeroU8::new(1)),
            seg1: unwrap!(NonZeroU8::new(31)),
            seg2: unwrap!(NonZeroU8::new(8)),
            sync_jump_width: unwrap!(NonZeroU8::new(8)),
            tx_delay_compensation: Some(TransceiverDelayCompensation {
                offset: 32,
                filter_window_length: 0,
            }),
        }
    }
}

/// Node configuration for one exchange direction
///
/// Create with [`EndpointConfig::new`], adjust the fields, then hand it to the module
/// to initialize the node.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointConfig {
    pub node: NodeId,
    pub role: Role,
    /// Frame format the node sends and accepts
    pub frame_mode: FrameMode,
    pub buffer: BufferStrategy,
    /// Data field size of every buffer or FIFO element
    pub field_size: DataFieldSize,
    /// Internal loop-back test mode. Routes own transmissions to own reception.
    pub loopback_enabled: bool,
    pub interrupt: Option<InterruptConfig>,
    pub nominal_bit_timing: NominalBitTiming,
    /// Ignored unless the frame mode switches the bit rate
    pub data_bit_timing: DataBitTiming,
}

impl EndpointConfig {
    /// Default configuration for the role: dedicated buffer 0 for transmission,
    /// single-element FIFO 0 for reception, 8-byte fields, classic frames, no interrupts.
    pub fn new(node: NodeId, role: Role) -> Self {
        let buffer = match role {
            Role::Transmit => BufferStrategy::DedicatedBuffer { index: 0 },
            Role::Receive => BufferStrategy::Fifo {
                fifo: RxFifo::Fifo0,
                depth: 1,
            },
        };
        Self {
            node,
            role,
            frame_mode: FrameMode::Classic,
            buffer,
            field_size: DataFieldSize::_8,
            loopback_enabled: false,
            interrupt: None,
            nominal_bit_timing: Default::default(),
            data_bit_timing: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bit_rates() {
        const KERNEL_CLOCK_HZ: u32 = 80_000_000;
        assert_eq!(NominalBitTiming::default().bit_rate(KERNEL_CLOCK_HZ), 500_000);
        assert_eq!(DataBitTiming::default().bit_rate(KERNEL_CLOCK_HZ), 2_000_000);
    }

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::new(NodeId::new(1).unwrap(), Role::Receive);
        assert_eq!(
            config.buffer,
            BufferStrategy::Fifo {
                fifo: RxFifo::Fifo0,
                depth: 1
            }
        );
        assert!(!config.loopback_enabled);
        assert_eq!(config.interrupt, None);
        assert_eq!(NodeId::new(4), None);
    }
}

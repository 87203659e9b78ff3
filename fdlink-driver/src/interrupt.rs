//! Interrupt sources, routing and handler registration

use crate::config::InterruptConfig;

/// Node interrupt condition
///
/// Each condition owns one bit in the node interrupt flag and enable registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    RxFifo0NewMessage,
    RxFifo0Full,
    RxFifo0MessageLost,
    RxFifo1NewMessage,
    TransmissionCompleted,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::RxFifo0NewMessage,
        Interrupt::RxFifo0Full,
        Interrupt::RxFifo0MessageLost,
        Interrupt::RxFifo1NewMessage,
        Interrupt::TransmissionCompleted,
    ];

    pub const fn bit(self) -> u32 {
        match self {
            Interrupt::RxFifo0NewMessage => 1 << 0,
            Interrupt::RxFifo0Full => 1 << 2,
            Interrupt::RxFifo0MessageLost => 1 << 3,
            Interrupt::RxFifo1NewMessage => 1 << 4,
            Interrupt::TransmissionCompleted => 1 << 9,
        }
    }
}

/// Service request line of a CAN module
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptLine(u8);

impl InterruptLine {
    const MAX_VALUE: u8 = 15;
    pub const MAX: InterruptLine = InterruptLine(Self::MAX_VALUE);
    pub const COUNT: usize = Self::MAX_VALUE as usize + 1;

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

impl From<InterruptLine> for usize {
    fn from(value: InterruptLine) -> Self {
        value.0.into()
    }
}

/// Processing unit a service request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceTarget {
    Cpu0,
    Cpu1,
    Cpu2,
    Dma,
}

/// Interrupt service routine body
pub trait InterruptHandler {
    fn on_interrupt(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// Another handler is already installed on the line
    LineOccupied,
    /// The service target cannot run handlers
    UnsupportedTarget,
}

/// Interrupt controller collaborator
///
/// Handlers are installed once and live for the rest of the program.
pub trait InterruptController {
    fn register(
        &self,
        config: &InterruptConfig,
        handler: &'static (dyn InterruptHandler + Sync),
    ) -> Result<(), RegisterError>;

    /// Enables interrupt dispatch globally
    fn enable(&self);

    /// Disables interrupt dispatch globally
    fn disable(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        let mut mask = 0;
        for interrupt in Interrupt::ALL {
            assert_eq!(interrupt.bit().count_ones(), 1);
            assert_eq!(mask & interrupt.bit(), 0);
            mask |= interrupt.bit();
        }
    }

    #[test]
    fn test_line() {
        assert_eq!(InterruptLine::new(15), Some(InterruptLine::MAX));
        assert_eq!(InterruptLine::new(16), None);
        assert_eq!(usize::from(InterruptLine::MAX) + 1, InterruptLine::COUNT);
    }
}

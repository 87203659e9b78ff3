use core::fmt;

use fdlink_driver::frame::{DescriptorError, SizeMismatch};
use fdlink_driver::interrupt::RegisterError;
use fdlink_driver::node::InitError;

/// Startup failure. The exchange cannot run with this configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    SizeMismatch(SizeMismatch),
    /// The raw data length code is not a member of the lookup table
    UnsupportedDataLengthCode(u8),
    IdentifierOutOfRange,
    PayloadExceedsFrameMode,
    /// No element field size class can hold the payload
    FieldSizeTooSmall,
    HardwareInit(InitError),
    InterruptRegistration(RegisterError),
    /// The receive context already holds a destination endpoint
    ReceiveContextInUse,
}

impl From<DescriptorError> for ConfigurationError {
    fn from(value: DescriptorError) -> Self {
        match value {
            DescriptorError::IdentifierOutOfRange => ConfigurationError::IdentifierOutOfRange,
            DescriptorError::PayloadExceedsFrameMode => ConfigurationError::PayloadExceedsFrameMode,
        }
    }
}

impl From<SizeMismatch> for ConfigurationError {
    fn from(value: SizeMismatch) -> Self {
        ConfigurationError::SizeMismatch(value)
    }
}

impl From<InitError> for ConfigurationError {
    fn from(value: InitError) -> Self {
        ConfigurationError::HardwareInit(value)
    }
}

impl From<RegisterError> for ConfigurationError {
    fn from(value: RegisterError) -> Self {
        ConfigurationError::InterruptRegistration(value)
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::SizeMismatch(err) => write!(
                f,
                "payload length {} does not match the data length code ({} bytes)",
                err.actual, err.expected
            ),
            ConfigurationError::UnsupportedDataLengthCode(code) => {
                write!(f, "unsupported data length code {code}")
            }
            ConfigurationError::IdentifierOutOfRange => {
                f.write_str("identifier does not fit the identifier length")
            }
            ConfigurationError::PayloadExceedsFrameMode => {
                f.write_str("payload exceeds the frame mode limit")
            }
            ConfigurationError::FieldSizeTooSmall => {
                f.write_str("payload does not fit any element field size")
            }
            ConfigurationError::HardwareInit(err) => write!(f, "hardware init failed: {err}"),
            ConfigurationError::InterruptRegistration(err) => {
                write!(f, "interrupt registration failed: {err:?}")
            }
            ConfigurationError::ReceiveContextInUse => {
                f.write_str("receive context already holds a destination endpoint")
            }
        }
    }
}

/// Transmit request failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitError<E> {
    /// The node stayed busy for the whole spin budget
    Timeout { spins: u32 },
    Build(SizeMismatch),
    Driver(E),
}

impl<E> From<SizeMismatch> for TransmitError<E> {
    fn from(value: SizeMismatch) -> Self {
        TransmitError::Build(value)
    }
}

impl<E: fmt::Debug> fmt::Display for TransmitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransmitError::Timeout { spins } => {
                write!(f, "transmitter busy after {spins} polls")
            }
            TransmitError::Build(err) => write!(
                f,
                "payload length {} does not match the data length code ({} bytes)",
                err.actual, err.expected
            ),
            TransmitError::Driver(err) => write!(f, "driver error: {err:?}"),
        }
    }
}

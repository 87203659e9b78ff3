//! CAN FD frame object

use embedded_can::{ExtendedId, StandardId};
use fdlink_core::{DataLengthCode, FD_MAX_PAYLOAD, FrameMode, IdLength};

pub use embedded_can::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorError {
    /// The identifier does not fit the identifier length class
    IdentifierOutOfRange,
    /// The data length code exceeds the frame mode payload limit
    PayloadExceedsFrameMode,
}

/// Frame shape without payload: identifier, frame mode and data length code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub id: Id,
    pub mode: FrameMode,
    pub dlc: DataLengthCode,
}

impl FrameDescriptor {
    pub fn new(
        identifier: u32,
        id_length: IdLength,
        mode: FrameMode,
        dlc: DataLengthCode,
    ) -> Result<Self, DescriptorError> {
        let id = make_id(identifier, id_length).ok_or(DescriptorError::IdentifierOutOfRange)?;
        if !mode.supports(dlc) {
            return Err(DescriptorError::PayloadExceedsFrameMode);
        }
        Ok(Self { id, mode, dlc })
    }

    pub fn id_length(&self) -> IdLength {
        match self.id {
            Id::Standard(_) => IdLength::Standard,
            Id::Extended(_) => IdLength::Extended,
        }
    }

    pub fn raw_id(&self) -> u32 {
        raw_id(self.id)
    }

    pub fn payload_len(&self) -> usize {
        self.dlc.payload_len()
    }
}

// `embedded_can::Id` has no `defmt::Format` implementation
#[cfg(feature = "defmt")]
impl defmt::Format for FrameDescriptor {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "FrameDescriptor {{ id: {=u32:#x}, id_length: {}, mode: {}, dlc: {} }}",
            self.raw_id(),
            self.id_length(),
            self.mode,
            self.dlc
        )
    }
}

pub(crate) fn make_id(identifier: u32, id_length: IdLength) -> Option<Id> {
    match id_length {
        IdLength::Standard => {
            let raw = u16::try_from(identifier).ok()?;
            StandardId::new(raw).map(Id::Standard)
        }
        IdLength::Extended => ExtendedId::new(identifier).map(Id::Extended),
    }
}

pub(crate) fn raw_id(id: Id) -> u32 {
    match id {
        Id::Standard(id) => u32::from(id.as_raw()),
        Id::Extended(id) => id.as_raw(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidLength;

/// CAN FD frame compatible data vector
///
/// Data length code (DLC) of CAN FD frames supports limited data length options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    dlc: DataLengthCode,
    bytes: [u8; FD_MAX_PAYLOAD],
}

impl Data {
    /// Creates a new vector from a slice of compatible length.
    pub fn new(data: &[u8]) -> Result<Self, InvalidLength> {
        let dlc = DataLengthCode::from_payload_len(data.len()).ok_or(InvalidLength)?;
        let mut bytes = [0; FD_MAX_PAYLOAD];
        bytes[..data.len()].copy_from_slice(data);

        Ok(Self { dlc, bytes })
    }

    pub fn new_zeros(dlc: DataLengthCode) -> Self {
        Self {
            dlc,
            bytes: [0; FD_MAX_PAYLOAD],
        }
    }

    pub fn dlc(&self) -> DataLengthCode {
        self.dlc
    }
}

impl core::ops::Deref for Data {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..self.dlc.payload_len()]
    }
}

impl core::ops::DerefMut for Data {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes[..self.dlc.payload_len()]
    }
}

/// Payload length disagrees with the descriptor data length code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SizeMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// CAN FD data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub descriptor: FrameDescriptor,
    pub data: Data,
}

impl Frame {
    pub fn payload(&self) -> &[u8] {
        &self.data
    }
}

/// Builds a frame, checking the payload against the descriptor data length code.
pub fn build_frame(descriptor: &FrameDescriptor, payload: &[u8]) -> Result<Frame, SizeMismatch> {
    let expected = descriptor.payload_len();
    if payload.len() != expected {
        return Err(SizeMismatch {
            expected,
            actual: payload.len(),
        });
    }
    let mut data = Data::new_zeros(descriptor.dlc);
    data.copy_from_slice(payload);
    Ok(Frame {
        descriptor: *descriptor,
        data,
    })
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let data = Data::new(data).ok()?;
        let mode = if data.len() > fdlink_core::CLASSIC_MAX_PAYLOAD {
            FrameMode::FdLong
        } else {
            FrameMode::Classic
        };
        Some(Frame {
            descriptor: FrameDescriptor {
                id: id.into(),
                mode,
                dlc: data.dlc(),
            },
            data,
        })
    }

    /// Remote frames do not exist in CAN FD and are not supported
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        matches!(self.descriptor.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.descriptor.id
    }

    fn dlc(&self) -> usize {
        self.descriptor.dlc.into_u8().into()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

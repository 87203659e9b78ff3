//! Frame configurations exercised by the exchange
//!
//! The table is plain data. Adding an entry to [`USE_CASES`] needs no change elsewhere, and
//! a session accepts any [`UseCase`], so callers may run their own tables as well.

use fdlink_core::{DataLengthCode, FrameMode, IdLength};
use fdlink_driver::frame::FrameDescriptor;

use crate::error::ConfigurationError;

pub const STANDARD_MESSAGE_ID_1: u32 = 0x444;
pub const EXTENDED_MESSAGE_ID_1: u32 = 0x1234567;
pub const STANDARD_MESSAGE_ID_2: u32 = 0x777;
pub const EXTENDED_MESSAGE_ID_2: u32 = 0x9ABCDEF;

/// Frame template of one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UseCase {
    pub identifier: u32,
    pub id_length: IdLength,
    pub frame_mode: FrameMode,
    /// Raw data length code, validated at configuration time
    pub dlc: u8,
}

impl UseCase {
    pub const fn new(identifier: u32, id_length: IdLength, frame_mode: FrameMode, dlc: u8) -> Self {
        Self {
            identifier,
            id_length,
            frame_mode,
            dlc,
        }
    }

    pub fn data_length_code(&self) -> Result<DataLengthCode, ConfigurationError> {
        DataLengthCode::try_from_u8(self.dlc)
            .ok_or(ConfigurationError::UnsupportedDataLengthCode(self.dlc))
    }

    pub fn payload_len(&self) -> Result<usize, ConfigurationError> {
        Ok(self.data_length_code()?.payload_len())
    }

    pub fn descriptor(&self) -> Result<FrameDescriptor, ConfigurationError> {
        let dlc = self.data_length_code()?;
        let descriptor = FrameDescriptor::new(self.identifier, self.id_length, self.frame_mode, dlc)?;
        Ok(descriptor)
    }
}

pub const USE_CASES: [UseCase; 4] = [
    UseCase::new(
        STANDARD_MESSAGE_ID_1,
        IdLength::Standard,
        FrameMode::Classic,
        DataLengthCode::_8.into_u8(),
    ),
    UseCase::new(
        EXTENDED_MESSAGE_ID_1,
        IdLength::Extended,
        FrameMode::Classic,
        DataLengthCode::_8.into_u8(),
    ),
    UseCase::new(
        STANDARD_MESSAGE_ID_2,
        IdLength::Standard,
        FrameMode::FdLong,
        DataLengthCode::_32.into_u8(),
    ),
    UseCase::new(
        EXTENDED_MESSAGE_ID_2,
        IdLength::Extended,
        FrameMode::FdLongAndFast,
        DataLengthCode::_64.into_u8(),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_descriptors() {
        let lengths: [usize; 4] = [8, 8, 32, 64];
        for (use_case, len) in USE_CASES.iter().zip(lengths) {
            let descriptor = use_case.descriptor().unwrap();
            assert_eq!(descriptor.payload_len(), len);
            assert_eq!(descriptor.raw_id(), use_case.identifier);
            assert_eq!(descriptor.id_length(), use_case.id_length);
        }
    }

    #[test]
    fn test_invalid_entries() {
        let use_case = UseCase::new(0x10, IdLength::Standard, FrameMode::FdLong, 16);
        assert_eq!(
            use_case.descriptor(),
            Err(ConfigurationError::UnsupportedDataLengthCode(16))
        );

        let use_case = UseCase::new(0x10, IdLength::Standard, FrameMode::Classic, 9);
        assert_eq!(
            use_case.descriptor(),
            Err(ConfigurationError::PayloadExceedsFrameMode)
        );

        let use_case = UseCase::new(0x9ABCDEF, IdLength::Standard, FrameMode::Classic, 8);
        assert_eq!(
            use_case.descriptor(),
            Err(ConfigurationError::IdentifierOutOfRange)
        );
    }
}

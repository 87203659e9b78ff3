//! CAN FD frame model data types
//!
//! This crate provides the basic data type definitions used by other fdlink crates: data length
//! codes, element field sizes, identifier lengths and frame modes.
//! Users should not depend on this crate directly. Use the `fdlink::core` reexport instead.
#![no_std]

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// Payload byte count for each data length code.
pub const DLC_LOOKUP_TABLE: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Largest payload of a classic CAN frame
pub const CLASSIC_MAX_PAYLOAD: usize = 8;

/// Largest payload of a CAN FD frame
pub const FD_MAX_PAYLOAD: usize = 64;

/// Data length code (DLC)
///
/// The code does not carry the payload length directly. Codes above 8 map to the CAN FD
/// length steps through [`DLC_LOOKUP_TABLE`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataLengthCode {
    /// 0 bytes
    _0 = 0,
    /// 1 byte
    _1 = 1,
    /// 2 bytes
    _2 = 2,
    /// 3 bytes
    _3 = 3,
    /// 4 bytes
    _4 = 4,
    /// 5 bytes
    _5 = 5,
    /// 6 bytes
    _6 = 6,
    /// 7 bytes
    _7 = 7,
    /// 8 bytes, the classic frame maximum
    _8 = 8,
    /// 12 bytes
    _12 = 9,
    /// 16 bytes
    _16 = 10,
    /// 20 bytes
    _20 = 11,
    /// 24 bytes
    _24 = 12,
    /// 32 bytes
    _32 = 13,
    /// 48 bytes
    _48 = 14,
    /// 64 bytes, the CAN FD maximum
    _64 = 15,
}

impl DataLengthCode {
    pub const MIN: DataLengthCode = DataLengthCode::_0;
    pub const MAX: DataLengthCode = DataLengthCode::_64;

    pub const fn try_from_u8(code: u8) -> Option<Self> {
        if code <= Self::MAX.into_u8() {
            Some(Self::from_u8_truncating(code))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(code: u8) -> Self {
        match code & 0xf {
            0 => DataLengthCode::_0,
            1 => DataLengthCode::_1,
            2 => DataLengthCode::_2,
            3 => DataLengthCode::_3,
            4 => DataLengthCode::_4,
            5 => DataLengthCode::_5,
            6 => DataLengthCode::_6,
            7 => DataLengthCode::_7,
            8 => DataLengthCode::_8,
            9 => DataLengthCode::_12,
            10 => DataLengthCode::_16,
            11 => DataLengthCode::_20,
            12 => DataLengthCode::_24,
            13 => DataLengthCode::_32,
            14 => DataLengthCode::_48,
            15 => DataLengthCode::_64,
            _ => unreachable!(),
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    /// Payload byte count carried by a frame with this code
    pub const fn payload_len(self) -> usize {
        DLC_LOOKUP_TABLE[self as usize] as usize
    }

    /// Returns the code for an exact payload length
    pub const fn from_payload_len(len: usize) -> Option<Self> {
        match Self::from_payload_len_ceil(len) {
            Some(code) if code.payload_len() == len => Some(code),
            _ => None,
        }
    }

    /// Returns the smallest code able to carry `len` bytes
    pub const fn from_payload_len_ceil(len: usize) -> Option<Self> {
        let mut code = 0;
        while code < DLC_LOOKUP_TABLE.len() {
            if DLC_LOOKUP_TABLE[code] as usize >= len {
                return Some(Self::from_u8_truncating(code as u8));
            }
            code += 1;
        }
        None
    }
}

impl From<DataLengthCode> for u8 {
    fn from(value: DataLengthCode) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for DataLengthCode {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// Decodes a data length code into a payload byte count.
pub const fn decode_payload_length(code: DataLengthCode) -> usize {
    code.payload_len()
}

/// Data field size of a message RAM element
///
/// The hardware reserves a fixed data field per buffer or FIFO element. A frame with a longer
/// payload does not fit the element. The numeric encoding matches the element size register field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataFieldSize {
    _8 = 0,
    _12 = 1,
    _16 = 2,
    _20 = 3,
    _24 = 4,
    _32 = 5,
    _48 = 6,
    _64 = 7,
}

impl DataFieldSize {
    pub const MIN: DataFieldSize = DataFieldSize::_8;
    pub const MAX: DataFieldSize = DataFieldSize::_64;

    const BYTES: [u8; 8] = [8, 12, 16, 20, 24, 32, 48, 64];

    pub const fn try_from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(DataFieldSize::_8),
            1 => Some(DataFieldSize::_12),
            2 => Some(DataFieldSize::_16),
            3 => Some(DataFieldSize::_20),
            4 => Some(DataFieldSize::_24),
            5 => Some(DataFieldSize::_32),
            6 => Some(DataFieldSize::_48),
            7 => Some(DataFieldSize::_64),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    pub const fn bytes(self) -> usize {
        Self::BYTES[self as usize] as usize
    }

    /// Number of 32-bit message RAM words occupied by the data field
    pub const fn words(self) -> usize {
        self.bytes() / 4
    }

    /// Returns the smallest field size class able to hold `len` bytes
    pub const fn from_payload_len_ceil(len: usize) -> Option<Self> {
        let mut code = 0;
        while code < Self::BYTES.len() {
            if Self::BYTES[code] as usize >= len {
                return Self::try_from_u8(code as u8);
            }
            code += 1;
        }
        None
    }

    pub const fn fits(self, code: DataLengthCode) -> bool {
        code.payload_len() <= self.bytes()
    }
}

impl From<DataFieldSize> for usize {
    fn from(value: DataFieldSize) -> Self {
        value.bytes()
    }
}

impl TryFrom<u8> for DataFieldSize {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// Identifier length class
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdLength {
    /// 11-bit base format identifier
    Standard,
    /// 29-bit extended format identifier
    Extended,
}

impl IdLength {
    pub const fn bits(self) -> u32 {
        match self {
            IdLength::Standard => 11,
            IdLength::Extended => 29,
        }
    }

    pub const fn max_value(self) -> u32 {
        u32::MAX >> (u32::BITS - self.bits())
    }

    pub const fn contains(self, identifier: u32) -> bool {
        identifier <= self.max_value()
    }
}

/// Frame format for reception and transmission
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameMode {
    /// Classic frames, up to 8 bytes
    Classic,
    /// FD frames without bit rate switch, up to 64 bytes
    FdLong,
    /// FD frames with bit rate switch, up to 64 bytes
    FdLongAndFast,
}

impl FrameMode {
    pub const fn fd(self) -> bool {
        match self {
            FrameMode::Classic => false,
            FrameMode::FdLong => true,
            FrameMode::FdLongAndFast => true,
        }
    }

    pub const fn bit_rate_switch(self) -> bool {
        match self {
            FrameMode::Classic => false,
            FrameMode::FdLong => false,
            FrameMode::FdLongAndFast => true,
        }
    }

    pub const fn max_payload_len(self) -> usize {
        if self.fd() {
            FD_MAX_PAYLOAD
        } else {
            CLASSIC_MAX_PAYLOAD
        }
    }

    pub const fn supports(self, code: DataLengthCode) -> bool {
        code.payload_len() <= self.max_payload_len()
    }

    /// Returns true if a node configured with `self` accepts frames sent in `frame`.
    ///
    /// FD-capable nodes accept classic frames as well.
    pub const fn accepts(self, frame: FrameMode) -> bool {
        !frame.fd() || self.fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_payload_length() {
        let expected = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];
        for (code, len) in expected.into_iter().enumerate() {
            let dlc = DataLengthCode::try_from(code as u8).unwrap();
            assert_eq!(decode_payload_length(dlc), len);
            assert_eq!(DataLengthCode::from_payload_len(len), Some(dlc));
        }
        assert_eq!(DataLengthCode::try_from_u8(16), None);
    }

    #[test]
    fn test_dlc_ceil() {
        assert_eq!(DataLengthCode::from_payload_len(9), None);
        assert_eq!(
            DataLengthCode::from_payload_len_ceil(9),
            Some(DataLengthCode::_12)
        );
        assert_eq!(
            DataLengthCode::from_payload_len_ceil(33),
            Some(DataLengthCode::_48)
        );
        assert_eq!(DataLengthCode::from_payload_len_ceil(65), None);
    }

    #[test]
    fn test_field_size_class() {
        assert_eq!(DataFieldSize::from_payload_len_ceil(0), Some(DataFieldSize::_8));
        assert_eq!(DataFieldSize::from_payload_len_ceil(8), Some(DataFieldSize::_8));
        assert_eq!(DataFieldSize::from_payload_len_ceil(9), Some(DataFieldSize::_12));
        assert_eq!(DataFieldSize::from_payload_len_ceil(64), Some(DataFieldSize::_64));
        assert_eq!(DataFieldSize::from_payload_len_ceil(65), None);

        for code in 0..16 {
            let dlc = DataLengthCode::from_u8_truncating(code);
            let size = DataFieldSize::from_payload_len_ceil(dlc.payload_len()).unwrap();
            assert!(size.fits(dlc));
            assert_eq!(size.words() * 4, size.bytes());
        }
    }

    #[test]
    fn test_frame_mode() {
        assert!(FrameMode::Classic.supports(DataLengthCode::_8));
        assert!(!FrameMode::Classic.supports(DataLengthCode::_12));
        assert!(FrameMode::FdLong.supports(DataLengthCode::_64));

        assert!(FrameMode::FdLongAndFast.accepts(FrameMode::Classic));
        assert!(!FrameMode::Classic.accepts(FrameMode::FdLong));
    }

    #[test]
    fn test_id_length() {
        assert_eq!(IdLength::Standard.max_value(), 0x7ff);
        assert_eq!(IdLength::Extended.max_value(), 0x1fff_ffff);
        assert!(!IdLength::Standard.contains(0x800));
    }
}

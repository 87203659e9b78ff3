//! Message RAM element codec
//!
//! Transmit buffer and receive FIFO elements are stored as 32-bit words: two header words
//! followed by the data field. Payload bytes are packed little-endian into the data words.

use fdlink_core::{CLASSIC_MAX_PAYLOAD, DataFieldSize, DataLengthCode, FrameMode, IdLength};

use crate::frame::{Data, Frame, FrameDescriptor, make_id};

const EXTENDED_ID_MASK: u32 = lsb_mask(29);
const STANDARD_ID_MASK: u32 = lsb_mask(11);
const DLC_MASK: u32 = lsb_mask(4);
const MARKER_MASK: u32 = lsb_mask(8);
const FILTER_INDEX_MASK: u32 = lsb_mask(7);
const TIMESTAMP_MASK: u32 = lsb_mask(16);

const STANDARD_ID_OFFSET: u32 = 18;
const DLC_OFFSET: u32 = 16;
const MARKER_OFFSET: u32 = 24;
const FILTER_INDEX_OFFSET: u32 = 24;
const TIMESTAMP_OFFSET: u32 = 0;

const XTD_FLAG: u32 = 1 << 30;
const RTR_FLAG: u32 = 1 << 29;
const ANMF_FLAG: u32 = 1 << 31;
const EFC_FLAG: u32 = 1 << 23;
const FDF_FLAG: u32 = 1 << 21;
const BRS_FLAG: u32 = 1 << 20;

pub const HEADER_WORDS: usize = 2;
pub const MAX_ELEMENT_WORDS: usize = element_words(DataFieldSize::MAX);

/// Number of message RAM words of an element with the given data field size
pub const fn element_words(field_size: DataFieldSize) -> usize {
    HEADER_WORDS + field_size.words()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementError {
    /// The payload does not fit the element data field
    FieldSizeExceeded,
    /// The word buffer is shorter than the element
    BufferTooShort,
    /// The stored data length code exceeds the element data field
    Truncated,
    /// Remote frames are not supported
    RemoteFrame,
    /// Classic frame with a data length code above 8
    ClassicDlcOutOfRange,
}

/// Transmit buffer element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxElement {
    pub frame: Frame,
    /// Copied to the transmit event FIFO entry
    pub message_marker: u8,
    pub store_event: bool,
}

/// Receive FIFO element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxElement {
    pub frame: Frame,
    pub timestamp: u16,
    /// Index of the matching acceptance filter, `None` for a non-matching frame
    pub filter_index: Option<u8>,
}

pub fn encode_tx_element(
    element: &TxElement,
    field_size: DataFieldSize,
    words: &mut [u32],
) -> Result<usize, ElementError> {
    let mut word1 = encode_format(&element.frame.descriptor);
    word1 |= (u32::from(element.message_marker) & MARKER_MASK) << MARKER_OFFSET;
    if element.store_event {
        word1 |= EFC_FLAG;
    }
    encode_element(&element.frame, word1, field_size, words)
}

pub fn decode_tx_element(
    words: &[u32],
    field_size: DataFieldSize,
) -> Result<TxElement, ElementError> {
    let frame = decode_element(words, field_size)?;
    let word1 = words[1];
    Ok(TxElement {
        frame,
        message_marker: ((word1 >> MARKER_OFFSET) & MARKER_MASK) as u8,
        store_event: word1 & EFC_FLAG != 0,
    })
}

pub fn encode_rx_element(
    element: &RxElement,
    field_size: DataFieldSize,
    words: &mut [u32],
) -> Result<usize, ElementError> {
    let mut word1 = encode_format(&element.frame.descriptor);
    word1 |= (u32::from(element.timestamp) & TIMESTAMP_MASK) << TIMESTAMP_OFFSET;
    match element.filter_index {
        Some(index) => word1 |= (u32::from(index) & FILTER_INDEX_MASK) << FILTER_INDEX_OFFSET,
        None => word1 |= ANMF_FLAG,
    }
    encode_element(&element.frame, word1, field_size, words)
}

pub fn decode_rx_element(
    words: &[u32],
    field_size: DataFieldSize,
) -> Result<RxElement, ElementError> {
    let frame = decode_element(words, field_size)?;
    let word1 = words[1];
    let filter_index =
        (word1 & ANMF_FLAG == 0).then_some(((word1 >> FILTER_INDEX_OFFSET) & FILTER_INDEX_MASK) as u8);
    Ok(RxElement {
        frame,
        timestamp: ((word1 >> TIMESTAMP_OFFSET) & TIMESTAMP_MASK) as u16,
        filter_index,
    })
}

fn encode_format(descriptor: &FrameDescriptor) -> u32 {
    let mut word1 = (u32::from(descriptor.dlc.into_u8()) & DLC_MASK) << DLC_OFFSET;
    if descriptor.mode.fd() {
        word1 |= FDF_FLAG;
    }
    if descriptor.mode.bit_rate_switch() {
        word1 |= BRS_FLAG;
    }
    word1
}

fn encode_element(
    frame: &Frame,
    word1: u32,
    field_size: DataFieldSize,
    words: &mut [u32],
) -> Result<usize, ElementError> {
    let descriptor = &frame.descriptor;
    if !field_size.fits(descriptor.dlc) {
        return Err(ElementError::FieldSizeExceeded);
    }
    if !descriptor.mode.supports(descriptor.dlc) {
        return Err(ElementError::ClassicDlcOutOfRange);
    }
    let len = element_words(field_size);
    let words = words.get_mut(..len).ok_or(ElementError::BufferTooShort)?;

    words[0] = match descriptor.id_length() {
        IdLength::Standard => (descriptor.raw_id() & STANDARD_ID_MASK) << STANDARD_ID_OFFSET,
        IdLength::Extended => XTD_FLAG | (descriptor.raw_id() & EXTENDED_ID_MASK),
    };
    words[1] = word1;

    let data_words = &mut words[HEADER_WORDS..];
    data_words.fill(0);
    for (i, byte) in frame.payload().iter().enumerate() {
        data_words[i / 4] |= u32::from(*byte) << (8 * (i % 4));
    }
    Ok(len)
}

fn decode_element(words: &[u32], field_size: DataFieldSize) -> Result<Frame, ElementError> {
    let words = words
        .get(..element_words(field_size))
        .ok_or(ElementError::BufferTooShort)?;
    let (word0, word1) = (words[0], words[1]);

    if word0 & RTR_FLAG != 0 {
        return Err(ElementError::RemoteFrame);
    }
    let (identifier, id_length) = if word0 & XTD_FLAG != 0 {
        (word0 & EXTENDED_ID_MASK, IdLength::Extended)
    } else {
        (
            (word0 >> STANDARD_ID_OFFSET) & STANDARD_ID_MASK,
            IdLength::Standard,
        )
    };
    let id = unwrap!(make_id(identifier, id_length));

    let mode = match (word1 & FDF_FLAG != 0, word1 & BRS_FLAG != 0) {
        (false, _) => FrameMode::Classic,
        (true, false) => FrameMode::FdLong,
        (true, true) => FrameMode::FdLongAndFast,
    };
    let dlc = DataLengthCode::from_u8_truncating(((word1 >> DLC_OFFSET) & DLC_MASK) as u8);
    if mode == FrameMode::Classic && dlc.payload_len() > CLASSIC_MAX_PAYLOAD {
        return Err(ElementError::ClassicDlcOutOfRange);
    }
    if !field_size.fits(dlc) {
        return Err(ElementError::Truncated);
    }

    let mut data = Data::new_zeros(dlc);
    let data_words = &words[HEADER_WORDS..];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (data_words[i / 4] >> (8 * (i % 4))) as u8;
    }
    Ok(Frame {
        descriptor: FrameDescriptor { id, mode, dlc },
        data,
    })
}

/// Extracts the raw identifier of an element without decoding the rest
pub fn element_identifier(words: &[u32]) -> Option<u32> {
    let word0 = *words.first()?;
    if word0 & XTD_FLAG != 0 {
        Some(word0 & EXTENDED_ID_MASK)
    } else {
        Some((word0 >> STANDARD_ID_OFFSET) & STANDARD_ID_MASK)
    }
}

/// Overwrites the identifier of an encoded element, keeping the identifier length
pub fn patch_element_identifier(words: &mut [u32], identifier: u32) {
    if let Some(word0) = words.first_mut() {
        if *word0 & XTD_FLAG != 0 {
            *word0 = (*word0 & !EXTENDED_ID_MASK) | (identifier & EXTENDED_ID_MASK);
        } else {
            let mask = STANDARD_ID_MASK << STANDARD_ID_OFFSET;
            *word0 = (*word0 & !mask) | ((identifier & STANDARD_ID_MASK) << STANDARD_ID_OFFSET);
        }
    }
}

const fn lsb_mask(n: u32) -> u32 {
    if n > 0 {
        u32::MAX >> (u32::BITS - n)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_frame;

    fn pattern_frame(identifier: u32, id_length: IdLength, mode: FrameMode, dlc: DataLengthCode) -> Frame {
        let descriptor = FrameDescriptor::new(identifier, id_length, mode, dlc).unwrap();
        let mut payload = [0u8; 64];
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte = i as u8;
        }
        build_frame(&descriptor, &payload[..dlc.payload_len()]).unwrap()
    }

    #[test]
    fn test_tx_element_layout() {
        let frame = pattern_frame(0x444, IdLength::Standard, FrameMode::Classic, DataLengthCode::_8);
        let element = TxElement {
            frame,
            message_marker: 0x5a,
            store_event: true,
        };
        let mut words = [0u32; MAX_ELEMENT_WORDS];
        let len = encode_tx_element(&element, DataFieldSize::_8, &mut words).unwrap();

        assert_eq!(len, 4);
        assert_eq!(words[0], 0x444 << 18);
        assert_eq!(words[1], 0x5a << 24 | EFC_FLAG | 8 << 16);
        assert_eq!(words[2], 0x0302_0100);
        assert_eq!(words[3], 0x0706_0504);
        assert_eq!(decode_tx_element(&words, DataFieldSize::_8), Ok(element));
    }

    #[test]
    fn test_rx_element_fd_fields() {
        let frame = pattern_frame(
            0x1234567,
            IdLength::Extended,
            FrameMode::FdLongAndFast,
            DataLengthCode::_64,
        );
        let element = RxElement {
            frame,
            timestamp: 0xbeef,
            filter_index: None,
        };
        let mut words = [0u32; MAX_ELEMENT_WORDS];
        encode_rx_element(&element, DataFieldSize::_64, &mut words).unwrap();

        assert_eq!(words[0], XTD_FLAG | 0x1234567);
        assert_eq!(words[1], ANMF_FLAG | FDF_FLAG | BRS_FLAG | 15 << 16 | 0xbeef);
        assert_eq!(element_identifier(&words), Some(0x1234567));

        let decoded = decode_rx_element(&words, DataFieldSize::_64).unwrap();
        assert_eq!(decoded.frame.payload(), frame.payload());
        assert_eq!(decoded.filter_index, None);
    }

    #[test]
    fn test_field_size_limits() {
        let frame = pattern_frame(0x777, IdLength::Standard, FrameMode::FdLong, DataLengthCode::_32);
        let element = RxElement {
            frame,
            timestamp: 0,
            filter_index: Some(3),
        };
        let mut words = [0u32; MAX_ELEMENT_WORDS];
        assert_eq!(
            encode_rx_element(&element, DataFieldSize::_24, &mut words),
            Err(ElementError::FieldSizeExceeded)
        );
        assert_eq!(
            encode_rx_element(&element, DataFieldSize::_32, &mut words[..9]),
            Err(ElementError::BufferTooShort)
        );

        encode_rx_element(&element, DataFieldSize::_32, &mut words).unwrap();
        assert_eq!(
            decode_rx_element(&words, DataFieldSize::_16),
            Err(ElementError::Truncated)
        );
    }

    #[test]
    fn test_rejected_headers() {
        let mut words = [0u32; MAX_ELEMENT_WORDS];
        words[0] = RTR_FLAG | 0x10 << 18;
        assert_eq!(
            decode_rx_element(&words, DataFieldSize::_64),
            Err(ElementError::RemoteFrame)
        );

        words[0] = 0x10 << 18;
        words[1] = 12 << 16;
        assert_eq!(
            decode_rx_element(&words, DataFieldSize::_64),
            Err(ElementError::ClassicDlcOutOfRange)
        );
    }

    #[test]
    fn test_patch_identifier() {
        let frame = pattern_frame(0x444, IdLength::Standard, FrameMode::Classic, DataLengthCode::_1);
        let element = TxElement {
            frame,
            message_marker: 0,
            store_event: false,
        };
        let mut words = [0u32; MAX_ELEMENT_WORDS];
        encode_tx_element(&element, DataFieldSize::_8, &mut words).unwrap();
        patch_element_identifier(&mut words, 0x445);
        let decoded = decode_tx_element(&words, DataFieldSize::_8).unwrap();
        assert_eq!(decoded.frame.descriptor.raw_id(), 0x445);
        assert_eq!(decoded.frame.payload(), [0]);
    }
}

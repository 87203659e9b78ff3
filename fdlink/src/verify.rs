//! Integrity check of the exchanged frames and the communication status

use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use fdlink_driver::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IntegrityError {
    /// The receipt counter did not move since the burst started
    NoNewDataReceived,
    /// Fewer frames were drained than sent
    NewDataButOneLost { expected: u32, received: u32 },
    NotExpectedMessageId,
    NotExpectedLengthCode,
    /// First mismatching payload byte
    NotExpectedData { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RuntimeError {
    TransmitTimeout,
    TransmitFault,
}

/// Process-wide outcome of the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommunicationStatus {
    #[default]
    Success,
    Failure {
        use_case: usize,
        error: IntegrityError,
    },
    RuntimeError {
        use_case: usize,
        error: RuntimeError,
    },
}

impl CommunicationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CommunicationStatus::Success)
    }
}

/// Compares the received frame against the transmitted one.
///
/// Checks the identifier, then the data length code, then the payload bytes in order.
pub fn verify_frame(tx: &Frame, rx: &Frame) -> Result<(), IntegrityError> {
    if tx.descriptor.id != rx.descriptor.id {
        return Err(IntegrityError::NotExpectedMessageId);
    }
    if tx.descriptor.dlc != rx.descriptor.dlc {
        return Err(IntegrityError::NotExpectedLengthCode);
    }
    match tx.payload().iter().zip(rx.payload()).position(|(a, b)| a != b) {
        Some(offset) => Err(IntegrityError::NotExpectedData { offset }),
        None => Ok(()),
    }
}

pub fn verify(use_case: usize, tx: &Frame, rx: &Frame) -> CommunicationStatus {
    match verify_frame(tx, rx) {
        Ok(()) => CommunicationStatus::Success,
        Err(error) => CommunicationStatus::Failure { use_case, error },
    }
}

/// Communication status shared by all sessions of a run
///
/// Starts as success. The first non-success value is kept for the rest of the run.
pub struct StatusCell {
    inner: Mutex<CriticalSectionRawMutex, Cell<CommunicationStatus>>,
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(CommunicationStatus::Success)),
        }
    }

    pub fn get(&self) -> CommunicationStatus {
        self.inner.lock(|cell| cell.get())
    }

    /// Records an outcome and returns the resulting status.
    pub fn update(&self, status: CommunicationStatus) -> CommunicationStatus {
        self.inner.lock(|cell| {
            let current = cell.get();
            if current.is_success() && !status.is_success() {
                info!("Communication status changed to {:?}", status);
                cell.set(status);
                status
            } else {
                current
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::USE_CASES;
    use fdlink_driver::frame::build_frame;

    fn pattern_frame(index: usize) -> Frame {
        let descriptor = USE_CASES[index].descriptor().unwrap();
        let payload: [u8; 64] = core::array::from_fn(|i| i as u8);
        build_frame(&descriptor, &payload[..descriptor.payload_len()]).unwrap()
    }

    #[test]
    fn test_matching_frames() {
        let tx = pattern_frame(3);
        assert_eq!(verify(3, &tx, &tx), CommunicationStatus::Success);
    }

    #[test]
    fn test_first_mismatch() {
        let tx = pattern_frame(3);
        let mut rx = tx;
        rx.data[40] ^= 0xff;
        rx.data[50] ^= 0xff;
        assert_eq!(
            verify(3, &tx, &rx),
            CommunicationStatus::Failure {
                use_case: 3,
                error: IntegrityError::NotExpectedData { offset: 40 }
            }
        );
    }

    #[test]
    fn test_header_mismatch() {
        let tx = pattern_frame(0);
        let other = pattern_frame(1);
        assert_eq!(
            verify_frame(&tx, &other),
            Err(IntegrityError::NotExpectedMessageId)
        );

        let longer = pattern_frame(2);
        let mut rx = longer;
        rx.descriptor.id = tx.descriptor.id;
        assert_eq!(
            verify_frame(&tx, &rx),
            Err(IntegrityError::NotExpectedLengthCode)
        );
    }

    #[test]
    fn test_status_is_sticky() {
        let status = StatusCell::new();
        assert!(status.get().is_success());

        let failure = CommunicationStatus::Failure {
            use_case: 1,
            error: IntegrityError::NoNewDataReceived,
        };
        assert_eq!(status.update(failure), failure);
        assert_eq!(status.update(CommunicationStatus::Success), failure);
        assert_eq!(
            status.update(CommunicationStatus::RuntimeError {
                use_case: 2,
                error: RuntimeError::TransmitTimeout
            }),
            failure
        );
    }
}

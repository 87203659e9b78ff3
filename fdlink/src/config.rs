//! Endpoint configuration derived from a use case
//!
//! Both directions follow the same sequence: take the default node configuration, adjust the
//! fields the use case dictates, and hand the result to [`instantiate_endpoint`].
//!
//! [`instantiate_endpoint`]: crate::endpoint::instantiate_endpoint

use core::num::NonZeroU8;
use fdlink_core::{DataFieldSize, DataLengthCode};
use fdlink_driver::config::{BufferStrategy, EndpointConfig, InterruptConfig, NodeId, Role, RxFifo};
use fdlink_driver::interrupt::{InterruptLine, ServiceTarget};

use crate::error::ConfigurationError;
use crate::usecase::UseCase;

/// Node driving the transmit side
pub const SOURCE_NODE: NodeId = NodeId::new(0).unwrap();
/// Node driving the receive side
pub const DESTINATION_NODE: NodeId = NodeId::new(1).unwrap();

pub const TX_BUFFER_INDEX: u8 = 0;
/// Number of receive FIFO 0 elements
pub const RX_FIFO_DEPTH: u8 = 64;

pub const CAN_RX_PRIORITY: NonZeroU8 = NonZeroU8::new(1).unwrap();
pub const RX_INTERRUPT_LINE: InterruptLine = InterruptLine::new(0).unwrap();
pub const RX_SERVICE_TARGET: ServiceTarget = ServiceTarget::Cpu0;

/// Driving loop period
pub const LOOP_PERIOD_MS: u32 = 20;
/// Busy polls of the transmit buffer before a request is reported as timed out
pub const TRANSMIT_SPIN_LIMIT: u32 = 100_000;

pub fn configure_transmit_endpoint(use_case: &UseCase) -> Result<EndpointConfig, ConfigurationError> {
    let descriptor = use_case.descriptor()?;

    let mut config = EndpointConfig::new(SOURCE_NODE, Role::Transmit);
    config.frame_mode = use_case.frame_mode;
    config.buffer = BufferStrategy::DedicatedBuffer {
        index: TX_BUFFER_INDEX,
    };
    config.field_size = field_size_class(descriptor.dlc)?;
    // Loop-back is a wiring property, not a node mode
    config.loopback_enabled = false;
    config.interrupt = None;
    Ok(config)
}

pub fn configure_receive_endpoint(use_case: &UseCase) -> Result<EndpointConfig, ConfigurationError> {
    let descriptor = use_case.descriptor()?;
    let fifo = RxFifo::Fifo0;

    let mut config = EndpointConfig::new(DESTINATION_NODE, Role::Receive);
    config.frame_mode = use_case.frame_mode;
    config.buffer = BufferStrategy::Fifo {
        fifo,
        depth: RX_FIFO_DEPTH,
    };
    config.field_size = field_size_class(descriptor.dlc)?;
    config.loopback_enabled = false;
    config.interrupt = Some(InterruptConfig {
        source: fifo.new_message_interrupt(),
        priority: CAN_RX_PRIORITY,
        line: RX_INTERRUPT_LINE,
        service_target: RX_SERVICE_TARGET,
    });
    Ok(config)
}

/// Smallest element field size class holding the payload of the code
pub fn field_size_class(dlc: DataLengthCode) -> Result<DataFieldSize, ConfigurationError> {
    DataFieldSize::from_payload_len_ceil(dlc.payload_len())
        .filter(|size| size.fits(dlc))
        .ok_or(ConfigurationError::FieldSizeTooSmall)
}

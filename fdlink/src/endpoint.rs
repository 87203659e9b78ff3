//! Source and destination endpoints
//!
//! An endpoint owns one initialized node for the rest of the program.

use fdlink_driver::config::{BufferStrategy, EndpointConfig, Role, RxFifo};
use fdlink_driver::frame::Frame;
use fdlink_driver::interrupt::Interrupt;
use fdlink_driver::node::{InitError, Module, Node};

use crate::error::{ConfigurationError, TransmitError};

/// Endpoint built from an initialized node
pub trait Endpoint<N: Node>: Sized {
    const ROLE: Role;

    fn from_node(node: N) -> Result<Self, ConfigurationError>;
}

/// Applies the configuration to the module and wraps the node.
pub fn instantiate_endpoint<M, E>(module: &M, config: &EndpointConfig) -> Result<E, ConfigurationError>
where
    M: Module,
    E: Endpoint<M::Node>,
{
    if config.role != E::ROLE {
        return Err(InitError::InvalidConfig.into());
    }
    let node = module.init_node(config).inspect_err(|err| {
        error!("Node {} init failed: {:?}", config.node.into_u8(), err);
    })?;
    info!(
        "Node {} started as {:?} endpoint",
        config.node.into_u8(),
        config.role
    );
    E::from_node(node)
}

/// Transmit side of the exchange
pub struct SourceEndpoint<N> {
    node: N,
}

impl<N: Node> Endpoint<N> for SourceEndpoint<N> {
    const ROLE: Role = Role::Transmit;

    fn from_node(node: N) -> Result<Self, ConfigurationError> {
        match node.config().buffer {
            BufferStrategy::DedicatedBuffer { .. } => Ok(Self { node }),
            BufferStrategy::Fifo { .. } => Err(InitError::InvalidConfig.into()),
        }
    }
}

impl<N: Node> SourceEndpoint<N> {
    pub fn node(&self) -> &N {
        &self.node
    }

    /// Submits the frame, polling while the transmit buffer is busy.
    ///
    /// Returns once the node accepted the request, or after `spin_limit` busy polls.
    pub fn submit(&mut self, frame: &Frame, spin_limit: u32) -> Result<(), TransmitError<N::Error>> {
        let mut spins = 0;
        loop {
            match self.node.send(frame) {
                Ok(()) => {
                    if spins > 0 {
                        trace!("Transmit accepted after {} busy polls", spins);
                    }
                    return Ok(());
                }
                Err(nb::Error::WouldBlock) => {
                    spins += 1;
                    if spins >= spin_limit {
                        error!("Transmit buffer busy after {} polls", spins);
                        return Err(TransmitError::Timeout { spins });
                    }
                    core::hint::spin_loop();
                }
                Err(nb::Error::Other(err)) => return Err(TransmitError::Driver(err)),
            }
        }
    }
}

/// Receive side of the exchange
pub struct DestinationEndpoint<N> {
    node: N,
    fifo: RxFifo,
    source: Interrupt,
}

impl<N: Node> Endpoint<N> for DestinationEndpoint<N> {
    const ROLE: Role = Role::Receive;

    fn from_node(node: N) -> Result<Self, ConfigurationError> {
        let config = node.config();
        let BufferStrategy::Fifo { fifo, .. } = config.buffer else {
            return Err(InitError::InvalidConfig.into());
        };
        let source = config
            .interrupt
            .map_or(fifo.new_message_interrupt(), |interrupt| interrupt.source);
        Ok(Self { node, fifo, source })
    }
}

impl<N: Node> DestinationEndpoint<N> {
    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn interrupt_source(&self) -> Interrupt {
        self.source
    }

    pub fn is_pending(&self) -> bool {
        self.node.interrupt_flag(self.source)
    }

    /// Clears the new message flag. Must precede [`Self::drain`] in the handler.
    pub fn acknowledge(&mut self) {
        self.node.clear_interrupt_flag(self.source);
    }

    pub fn drain(&mut self) -> nb::Result<Frame, N::Error> {
        self.node.read(self.fifo)
    }
}

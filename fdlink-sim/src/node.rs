use fdlink_driver::config::{EndpointConfig, RxFifo};
use fdlink_driver::element::ElementError;
use fdlink_driver::frame::Frame;
use fdlink_driver::interrupt::Interrupt;
use fdlink_driver::node::Node;

use crate::module::SimModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    NotInitialized,
    NotTransmitting,
    /// The node frame mode cannot carry the frame
    FrameModeMismatch,
    FifoNotConfigured,
    Element(ElementError),
}

/// Initialized node of a [`SimModule`]
pub struct SimNode<'a> {
    module: &'a SimModule,
    config: EndpointConfig,
}

impl<'a> SimNode<'a> {
    pub(crate) fn new(module: &'a SimModule, config: EndpointConfig) -> Self {
        Self { module, config }
    }

    pub fn module(&self) -> &'a SimModule {
        self.module
    }
}

impl Node for SimNode<'_> {
    type Error = SimError;

    fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn send(&mut self, frame: &Frame) -> nb::Result<(), SimError> {
        self.module.request_transmit(self.config.node, frame)
    }

    fn read(&mut self, fifo: RxFifo) -> nb::Result<Frame, SimError> {
        self.module.read(self.config.node, fifo)
    }

    fn interrupt_flag(&self, interrupt: Interrupt) -> bool {
        self.module.interrupt_flag(self.config.node, interrupt)
    }

    fn clear_interrupt_flag(&mut self, interrupt: Interrupt) {
        self.module.clear_interrupt_flag(self.config.node, interrupt);
    }
}

use std::cell::RefCell;
use std::collections::VecDeque;
use std::num::NonZeroU8;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use fdlink_driver::config::{
    BufferStrategy, EndpointConfig, InterruptConfig, NodeId, Role, RxFifo,
};
use fdlink_driver::element::{self, MAX_ELEMENT_WORDS, RxElement, TxElement};
use fdlink_driver::frame::Frame;
use fdlink_driver::interrupt::{
    Interrupt, InterruptController, InterruptHandler, InterruptLine, RegisterError, ServiceTarget,
};
use fdlink_driver::node::{InitError, Module};

use crate::event::{DropReason, Event, Fault, Faults};
use crate::node::{SimError, SimNode};

const NODE_COUNT: usize = NodeId::MAX.into_u8() as usize + 1;

/// Number of event records kept by a module. The oldest record is dropped first.
pub const EVENT_LOG_CAPACITY: usize = 1024;

type Element = [u32; MAX_ELEMENT_WORDS];

/// Physical connection between the nodes of the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    Disconnected,
    /// The transmit output of `source` drives the receive input of `destination`
    LoopBack {
        source: NodeId,
        destination: NodeId,
    },
}

struct RxFifoState {
    elements: Vec<Element>,
    get_index: usize,
    fill_level: usize,
}

impl RxFifoState {
    fn new(depth: u8) -> Self {
        Self {
            elements: vec![[0; MAX_ELEMENT_WORDS]; usize::from(depth)],
            get_index: 0,
            fill_level: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.fill_level == self.elements.len()
    }

    fn put(&mut self, words: Element) {
        let put_index = (self.get_index + self.fill_level) % self.elements.len();
        self.elements[put_index] = words;
        self.fill_level += 1;
    }

    fn get(&self) -> Option<Element> {
        (self.fill_level > 0).then(|| self.elements[self.get_index])
    }

    fn acknowledge(&mut self) {
        self.get_index = (self.get_index + 1) % self.elements.len();
        self.fill_level -= 1;
    }
}

struct NodeState {
    config: EndpointConfig,
    tx_buffer: Element,
    tx_pending: bool,
    rx_fifo: Option<RxFifoState>,
    /// Interrupt flags
    ir: u32,
    /// Interrupt enables
    ie: u32,
    routes: Vec<(Interrupt, InterruptLine)>,
}

struct Registration {
    priority: NonZeroU8,
    handler: &'static (dyn InterruptHandler + Sync),
}

#[derive(Default)]
struct EventLog(VecDeque<Event>);

impl EventLog {
    fn push(&mut self, event: Event) {
        if self.0.len() == EVENT_LOG_CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(event);
    }
}

struct Inner {
    enabled: bool,
    nodes: [Option<NodeState>; NODE_COUNT],
    faults: Faults,
    events: EventLog,
    handlers: [Option<Registration>; InterruptLine::COUNT],
    pending_lines: u32,
    interrupts_enabled: bool,
    handler_active: bool,
    ticks: u64,
}

/// Simulated CAN module
///
/// Message RAM elements are stored in the hardware word layout. Transmission completes on the
/// next bus step: after a transmit request, on a busy poll and on every delay.
pub struct SimModule {
    kernel_clock_hz: u32,
    wiring: Wiring,
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner>>,
}

impl SimModule {
    /// Creates a module in reset. Call [`SimModule::enable`] before initializing nodes.
    pub fn new(kernel_clock_hz: u32, wiring: Wiring) -> Self {
        Self {
            kernel_clock_hz,
            wiring,
            inner: Mutex::new(RefCell::new(Inner {
                enabled: false,
                nodes: core::array::from_fn(|_| None),
                faults: Faults::default(),
                events: EventLog::default(),
                handlers: core::array::from_fn(|_| None),
                pending_lines: 0,
                interrupts_enabled: false,
                handler_active: false,
                ticks: 0,
            })),
        }
    }

    /// Enables the module clock and releases the module reset.
    pub fn enable(&self) {
        self.with(|inner| inner.enabled = true);
        log::debug!("CAN module enabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.with(|inner| inner.enabled)
    }

    pub fn wiring(&self) -> Wiring {
        self.wiring
    }

    pub fn inject(&self, fault: Fault) {
        log::info!("Injecting {fault:?}");
        self.with(|inner| match fault {
            Fault::TransmitterStalled => inner.faults.stalled = true,
            Fault::TransmitterBusy { steps } => inner.faults.busy_steps = steps,
            Fault::CorruptPayload { offset } => inner.faults.corrupt_payload = Some(offset),
            Fault::CorruptIdentifier => inner.faults.corrupt_identifier = true,
            Fault::DropFrame => inner.faults.drop_frame = true,
            Fault::SpuriousRxInterrupt => {
                let receivers: Vec<NodeId> = inner
                    .nodes
                    .iter()
                    .flatten()
                    .filter(|state| state.rx_fifo.is_some())
                    .map(|state| state.config.node)
                    .collect();
                for node in receivers {
                    inner.raise(node, Interrupt::RxFifo0NewMessage);
                }
            }
        });
        self.dispatch();
    }

    pub fn clear_faults(&self) {
        self.with(|inner| inner.faults = Faults::default());
    }

    /// Latest instrumentation records in order of occurrence, at most [`EVENT_LOG_CAPACITY`]
    pub fn events(&self) -> Vec<Event> {
        self.with(|inner| inner.events.0.iter().cloned().collect())
    }

    pub fn clear_events(&self) {
        self.with(|inner| inner.events.0.clear());
    }

    pub fn fifo_level(&self, node: NodeId) -> usize {
        self.with(|inner| {
            inner.nodes[usize::from(node)]
                .as_ref()
                .and_then(|state| state.rx_fifo.as_ref())
                .map_or(0, |fifo| fifo.fill_level)
        })
    }

    pub fn tx_pending(&self, node: NodeId) -> bool {
        self.with(|inner| {
            inner.nodes[usize::from(node)]
                .as_ref()
                .is_some_and(|state| state.tx_pending)
        })
    }

    /// Raised interrupt flags of the node
    pub fn flags(&self, node: NodeId) -> Vec<Interrupt> {
        self.with(|inner| {
            let ir = inner.nodes[usize::from(node)]
                .as_ref()
                .map_or(0, |state| state.ir);
            Interrupt::ALL
                .into_iter()
                .filter(|interrupt| ir & interrupt.bit() != 0)
                .collect()
        })
    }

    /// Bus time in microseconds
    pub fn ticks(&self) -> u64 {
        self.with(|inner| inner.ticks)
    }

    /// Advances the bus time without stepping the bus.
    pub fn advance(&self, micros: u64) {
        self.with(|inner| inner.ticks = inner.ticks.wrapping_add(micros));
    }

    /// Completes pending transmissions and services raised interrupts.
    pub fn step(&self) {
        let (clock, wiring) = (self.kernel_clock_hz, self.wiring);
        self.with(|inner| inner.step(clock, wiring));
        self.dispatch();
    }

    pub(crate) fn request_transmit(&self, node: NodeId, frame: &Frame) -> nb::Result<(), SimError> {
        let (clock, wiring) = (self.kernel_clock_hz, self.wiring);
        let result = self.with(|inner| inner.request_transmit(node, frame, clock, wiring));
        self.dispatch();
        result
    }

    pub(crate) fn read(&self, node: NodeId, fifo: RxFifo) -> nb::Result<Frame, SimError> {
        self.with(|inner| inner.read(node, fifo))
    }

    pub(crate) fn interrupt_flag(&self, node: NodeId, interrupt: Interrupt) -> bool {
        self.with(|inner| {
            inner.nodes[usize::from(node)]
                .as_ref()
                .is_some_and(|state| state.ir & interrupt.bit() != 0)
        })
    }

    pub(crate) fn clear_interrupt_flag(&self, node: NodeId, interrupt: Interrupt) {
        self.with(|inner| {
            if let Some(state) = inner.nodes[usize::from(node)].as_mut() {
                state.ir &= !interrupt.bit();
                inner.events.push(Event::FlagCleared { node, interrupt });
            }
        });
    }

    fn init(&self, config: &EndpointConfig) -> Result<(), InitError> {
        self.with(|inner| {
            if !inner.enabled {
                return Err(InitError::NotIdle);
            }
            let slot = &mut inner.nodes[usize::from(config.node)];
            if slot.is_some() {
                return Err(InitError::NodeOccupied);
            }

            let rx_fifo = match (config.role, config.buffer) {
                (Role::Transmit, BufferStrategy::DedicatedBuffer { index: 0 }) => None,
                (
                    Role::Receive,
                    BufferStrategy::Fifo {
                        fifo: RxFifo::Fifo0,
                        depth,
                    },
                ) if depth > 0 => Some(RxFifoState::new(depth)),
                _ => return Err(InitError::InvalidConfig),
            };

            let mut state = NodeState {
                config: *config,
                tx_buffer: [0; MAX_ELEMENT_WORDS],
                tx_pending: false,
                rx_fifo,
                ir: 0,
                ie: 0,
                routes: Vec::new(),
            };
            if let Some(interrupt) = config.interrupt {
                state.ie |= interrupt.source.bit();
                state.routes.push((interrupt.source, interrupt.line));
            }
            *slot = Some(state);
            Ok(())
        })?;
        log::info!(
            "Node {} initialized: {:?}, {:?}, {:?}",
            config.node.into_u8(),
            config.role,
            config.frame_mode,
            config.buffer
        );
        Ok(())
    }

    /// Runs registered handlers of pending service requests, highest priority first.
    ///
    /// Handlers are not re-entered. A request raised while a handler runs is serviced after it returns.
    fn dispatch(&self) {
        while let Some((line, handler)) = self.next_service_request() {
            handler.on_interrupt();
            self.with(|inner| {
                inner.handler_active = false;
                inner.events.push(Event::HandlerExit { line });
            });
        }
    }

    fn next_service_request(
        &self,
    ) -> Option<(InterruptLine, &'static (dyn InterruptHandler + Sync))> {
        self.with(|inner| {
            if !inner.interrupts_enabled || inner.handler_active {
                return None;
            }
            let pending = inner.pending_lines;
            let (index, handler) = inner
                .handlers
                .iter()
                .enumerate()
                .filter(|(index, _)| pending & (1 << index) != 0)
                .filter_map(|(index, slot)| slot.as_ref().map(|reg| (index, reg)))
                .max_by_key(|(_, reg)| reg.priority)
                .map(|(index, reg)| (index, reg.handler))?;
            let line = InterruptLine::new(index as u8)?;

            inner.pending_lines &= !(1 << index);
            inner.handler_active = true;
            inner.events.push(Event::HandlerEnter { line });
            Some((line, handler))
        })
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl Inner {
    fn raise(&mut self, node: NodeId, interrupt: Interrupt) {
        let Some(state) = self.nodes[usize::from(node)].as_mut() else {
            return;
        };
        let bit = interrupt.bit();
        let edge = state.ir & bit == 0;
        state.ir |= bit;
        self.events.push(Event::FlagRaised { node, interrupt });

        if edge && state.ie & bit != 0 {
            let route = state.routes.iter().find(|(source, _)| *source == interrupt);
            if let Some((_, line)) = route {
                self.pending_lines |= 1 << usize::from(*line);
            }
        }
    }

    fn request_transmit(
        &mut self,
        node: NodeId,
        frame: &Frame,
        clock: u32,
        wiring: Wiring,
    ) -> nb::Result<(), SimError> {
        let index = usize::from(node);
        let pending = self.nodes[index]
            .as_ref()
            .ok_or(nb::Error::Other(SimError::NotInitialized))?
            .tx_pending;
        if pending {
            // A buffer freed by this step is reused on the next poll
            self.step(clock, wiring);
            return Err(nb::Error::WouldBlock);
        }

        let state = self.nodes[index]
            .as_mut()
            .ok_or(nb::Error::Other(SimError::NotInitialized))?;
        if state.config.role != Role::Transmit {
            return Err(nb::Error::Other(SimError::NotTransmitting));
        }
        if !state.config.frame_mode.accepts(frame.descriptor.mode) {
            return Err(nb::Error::Other(SimError::FrameModeMismatch));
        }
        let element = TxElement {
            frame: *frame,
            message_marker: 0,
            store_event: false,
        };
        element::encode_tx_element(&element, state.config.field_size, &mut state.tx_buffer)
            .map_err(|err| nb::Error::Other(SimError::Element(err)))?;
        state.tx_pending = true;

        let id = frame.descriptor.raw_id();
        self.events.push(Event::TransmitRequested { node, id });
        log::trace!("Node {} transmit request {:#x}", node.into_u8(), id);
        self.step(clock, wiring);
        Ok(())
    }

    fn step(&mut self, clock: u32, wiring: Wiring) {
        self.ticks = self.ticks.wrapping_add(1);
        for index in 0..NODE_COUNT {
            let Some(state) = self.nodes[index].as_mut() else {
                continue;
            };
            if !state.tx_pending || self.faults.stalled {
                continue;
            }
            if self.faults.busy_steps > 0 {
                self.faults.busy_steps -= 1;
                continue;
            }
            state.tx_pending = false;
            let source = state.config;
            let words = state.tx_buffer;

            let id = element::element_identifier(&words).unwrap_or_default();
            self.events.push(Event::TransmitCompleted {
                node: source.node,
                id,
            });
            self.raise(source.node, Interrupt::TransmissionCompleted);

            let Some(words) = self.wire(words) else {
                self.events.push(Event::Dropped {
                    node: source.node,
                    id,
                    reason: DropReason::Injected,
                });
                continue;
            };
            let frame = match element::decode_tx_element(&words, source.field_size) {
                Ok(element) => element.frame,
                Err(err) => {
                    log::warn!("Node {} sent an invalid element: {err:?}", source.node.into_u8());
                    continue;
                }
            };

            if let Wiring::LoopBack {
                source: from,
                destination,
            } = wiring
                && from == source.node
            {
                self.deliver(&source, destination, &frame, clock);
            }
            if source.loopback_enabled {
                self.deliver(&source, source.node, &frame, clock);
            }
        }
    }

    /// Applies one-shot faults to the element on the wire. Returns `None` if it is lost.
    fn wire(&mut self, mut words: Element) -> Option<Element> {
        if std::mem::take(&mut self.faults.drop_frame) {
            return None;
        }
        if std::mem::take(&mut self.faults.corrupt_identifier)
            && let Some(id) = element::element_identifier(&words)
        {
            element::patch_element_identifier(&mut words, id ^ 1);
        }
        if let Some(offset) = self.faults.corrupt_payload.take()
            && let Some(word) = words.get_mut(element::HEADER_WORDS + offset / 4)
        {
            *word ^= 0xff << (8 * (offset % 4));
        }
        Some(words)
    }

    fn deliver(&mut self, source: &EndpointConfig, target: NodeId, frame: &Frame, clock: u32) {
        let id = frame.descriptor.raw_id();
        match self.store(source, target, frame, clock) {
            Ok(full) => {
                self.events.push(Event::Delivered { node: target, id });
                self.raise(target, Interrupt::RxFifo0NewMessage);
                if full {
                    self.raise(target, Interrupt::RxFifo0Full);
                }
            }
            Err(reason) => {
                log::debug!("Frame {id:#x} dropped at node {}: {reason:?}", target.into_u8());
                self.events.push(Event::Dropped {
                    node: target,
                    id,
                    reason,
                });
                if reason == DropReason::FifoFull {
                    self.raise(target, Interrupt::RxFifo0MessageLost);
                }
            }
        }
    }

    /// Stores the frame in the receive FIFO. Returns true if the FIFO became full.
    fn store(
        &mut self,
        source: &EndpointConfig,
        target: NodeId,
        frame: &Frame,
        clock: u32,
    ) -> Result<bool, DropReason> {
        let timestamp = self.ticks as u16;
        let state = self.nodes[usize::from(target)]
            .as_mut()
            .ok_or(DropReason::NotReceiving)?;
        let config = &state.config;
        if config.role != Role::Receive {
            return Err(DropReason::NotReceiving);
        }

        let mode = frame.descriptor.mode;
        if config.nominal_bit_timing.bit_rate(clock) != source.nominal_bit_timing.bit_rate(clock) {
            return Err(DropReason::BitRateMismatch);
        }
        if mode.bit_rate_switch()
            && config.data_bit_timing.bit_rate(clock) != source.data_bit_timing.bit_rate(clock)
        {
            return Err(DropReason::BitRateMismatch);
        }
        if !config.frame_mode.accepts(mode) {
            return Err(DropReason::NotFdCapable);
        }

        let element = RxElement {
            frame: *frame,
            timestamp,
            filter_index: None,
        };
        let mut words = [0; MAX_ELEMENT_WORDS];
        element::encode_rx_element(&element, config.field_size, &mut words)
            .map_err(|_| DropReason::FieldSizeExceeded)?;

        let fifo = state.rx_fifo.as_mut().ok_or(DropReason::NotReceiving)?;
        if fifo.is_full() {
            return Err(DropReason::FifoFull);
        }
        fifo.put(words);
        Ok(fifo.is_full())
    }

    fn read(&mut self, node: NodeId, fifo: RxFifo) -> nb::Result<Frame, SimError> {
        if fifo != RxFifo::Fifo0 {
            return Err(nb::Error::Other(SimError::FifoNotConfigured));
        }
        let state = self.nodes[usize::from(node)]
            .as_mut()
            .ok_or(nb::Error::Other(SimError::NotInitialized))?;
        let field_size = state.config.field_size;
        let rx_fifo = state
            .rx_fifo
            .as_mut()
            .ok_or(nb::Error::Other(SimError::FifoNotConfigured))?;

        let Some(words) = rx_fifo.get() else {
            self.events.push(Event::FifoEmpty { node });
            return Err(nb::Error::WouldBlock);
        };
        rx_fifo.acknowledge();
        let element = element::decode_rx_element(&words, field_size)
            .map_err(|err| nb::Error::Other(SimError::Element(err)))?;

        self.events.push(Event::FifoRead {
            node,
            id: element.frame.descriptor.raw_id(),
        });
        Ok(element.frame)
    }
}

impl<'a> Module for &'a SimModule {
    type Node = SimNode<'a>;

    fn init_node(&self, config: &EndpointConfig) -> Result<SimNode<'a>, InitError> {
        let module: &'a SimModule = *self;
        module.init(config)?;
        Ok(SimNode::new(module, *config))
    }
}

impl InterruptController for SimModule {
    fn register(
        &self,
        config: &InterruptConfig,
        handler: &'static (dyn InterruptHandler + Sync),
    ) -> Result<(), RegisterError> {
        if config.service_target == ServiceTarget::Dma {
            return Err(RegisterError::UnsupportedTarget);
        }
        self.with(|inner| {
            let slot = &mut inner.handlers[usize::from(config.line)];
            if slot.is_some() {
                return Err(RegisterError::LineOccupied);
            }
            *slot = Some(Registration {
                priority: config.priority,
                handler,
            });
            Ok(())
        })?;
        log::debug!(
            "Handler registered on line {} with priority {}",
            config.line.into_u8(),
            config.priority
        );
        Ok(())
    }

    fn enable(&self) {
        self.with(|inner| inner.interrupts_enabled = true);
        self.dispatch();
    }

    fn disable(&self) {
        self.with(|inner| inner.interrupts_enabled = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KERNEL_CLOCK_HZ;
    use fdlink_core::{DataFieldSize, DataLengthCode, FrameMode, IdLength};
    use fdlink_driver::frame::{FrameDescriptor, build_frame};
    use fdlink_driver::node::Node;
    use std::sync::atomic::{AtomicU32, Ordering};

    const SOURCE: NodeId = NodeId::new(0).unwrap();
    const DESTINATION: NodeId = NodeId::new(1).unwrap();

    struct CountingHandler(AtomicU32);

    impl InterruptHandler for CountingHandler {
        fn on_interrupt(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn make_module() -> &'static SimModule {
        let module = SimModule::new(
            KERNEL_CLOCK_HZ,
            Wiring::LoopBack {
                source: SOURCE,
                destination: DESTINATION,
            },
        );
        let module: &'static SimModule = Box::leak(Box::new(module));
        module.enable();
        module
    }

    fn tx_config(mode: FrameMode) -> EndpointConfig {
        let mut config = EndpointConfig::new(SOURCE, Role::Transmit);
        config.frame_mode = mode;
        config.field_size = DataFieldSize::_64;
        config
    }

    fn rx_config(mode: FrameMode, depth: u8) -> EndpointConfig {
        let mut config = EndpointConfig::new(DESTINATION, Role::Receive);
        config.frame_mode = mode;
        config.field_size = DataFieldSize::_64;
        config.buffer = BufferStrategy::Fifo {
            fifo: RxFifo::Fifo0,
            depth,
        };
        config.interrupt = Some(InterruptConfig {
            source: Interrupt::RxFifo0NewMessage,
            priority: NonZeroU8::new(1).unwrap(),
            line: InterruptLine::new(0).unwrap(),
            service_target: ServiceTarget::Cpu0,
        });
        config
    }

    fn frame(mode: FrameMode, dlc: DataLengthCode) -> Frame {
        let descriptor = FrameDescriptor::new(0x777, IdLength::Standard, mode, dlc).unwrap();
        let payload = [0x5a; 64];
        build_frame(&descriptor, &payload[..dlc.payload_len()]).unwrap()
    }

    #[test]
    fn test_init_lifecycle() {
        let module: &'static SimModule =
            Box::leak(Box::new(SimModule::new(KERNEL_CLOCK_HZ, Wiring::Disconnected)));
        let config = tx_config(FrameMode::Classic);
        assert_eq!(module.init_node(&config).err(), Some(InitError::NotIdle));

        module.enable();
        assert!(module.init_node(&config).is_ok());
        assert_eq!(
            module.init_node(&config).err(),
            Some(InitError::NodeOccupied)
        );

        let mut config = rx_config(FrameMode::Classic, 0);
        assert_eq!(
            module.init_node(&config).err(),
            Some(InitError::InvalidConfig)
        );
        config.buffer = BufferStrategy::DedicatedBuffer { index: 0 };
        assert_eq!(
            module.init_node(&config).err(),
            Some(InitError::InvalidConfig)
        );
    }

    #[test]
    fn test_loopback_delivery() {
        let module = make_module();
        let mut tx = module.init_node(&tx_config(FrameMode::FdLong)).unwrap();
        let mut rx = module.init_node(&rx_config(FrameMode::FdLong, 4)).unwrap();

        let sent = frame(FrameMode::FdLong, DataLengthCode::_32);
        tx.send(&sent).unwrap();
        assert!(!module.tx_pending(SOURCE));
        assert_eq!(module.fifo_level(DESTINATION), 1);
        assert!(rx.interrupt_flag(Interrupt::RxFifo0NewMessage));

        assert_eq!(rx.read(RxFifo::Fifo0), Ok(sent));
        assert_eq!(rx.read(RxFifo::Fifo0), Err(nb::Error::WouldBlock));
        assert!(module.events().contains(&Event::FifoEmpty { node: DESTINATION }));
    }

    #[test]
    fn test_event_log_keeps_latest() {
        let module = make_module();
        let mut tx = module.init_node(&tx_config(FrameMode::Classic)).unwrap();
        let mut rx = module.init_node(&rx_config(FrameMode::Classic, 4)).unwrap();

        let sent = frame(FrameMode::Classic, DataLengthCode::_8);
        for _ in 0..EVENT_LOG_CAPACITY {
            tx.send(&sent).unwrap();
            assert_eq!(rx.read(RxFifo::Fifo0), Ok(sent));
        }

        let events = module.events();
        assert_eq!(events.len(), EVENT_LOG_CAPACITY);
        assert_eq!(
            events.last(),
            Some(&Event::FifoRead {
                node: DESTINATION,
                id: 0x777,
            })
        );

        module.clear_events();
        assert!(module.events().is_empty());
    }

    #[test]
    fn test_classic_receiver_drops_fd_frame() {
        let module = make_module();
        let mut tx = module.init_node(&tx_config(FrameMode::FdLong)).unwrap();
        let _rx = module.init_node(&rx_config(FrameMode::Classic, 4)).unwrap();

        tx.send(&frame(FrameMode::FdLong, DataLengthCode::_12)).unwrap();
        assert_eq!(module.fifo_level(DESTINATION), 0);
        assert!(module.events().contains(&Event::Dropped {
            node: DESTINATION,
            id: 0x777,
            reason: DropReason::NotFdCapable,
        }));
    }

    #[test]
    fn test_fifo_overflow() {
        let module = make_module();
        let mut tx = module.init_node(&tx_config(FrameMode::Classic)).unwrap();
        let rx = module.init_node(&rx_config(FrameMode::Classic, 2)).unwrap();

        let sent = frame(FrameMode::Classic, DataLengthCode::_8);
        for _ in 0..3 {
            tx.send(&sent).unwrap();
        }
        assert_eq!(module.fifo_level(DESTINATION), 2);
        assert!(rx.interrupt_flag(Interrupt::RxFifo0Full));
        assert!(rx.interrupt_flag(Interrupt::RxFifo0MessageLost));
        assert_eq!(
            module.flags(DESTINATION),
            [
                Interrupt::RxFifo0NewMessage,
                Interrupt::RxFifo0Full,
                Interrupt::RxFifo0MessageLost
            ]
        );
        assert_eq!(module.flags(SOURCE), [Interrupt::TransmissionCompleted]);
    }

    #[test]
    fn test_edge_triggered_service_request() {
        let module = make_module();
        let mut tx = module.init_node(&tx_config(FrameMode::Classic)).unwrap();
        let mut rx = module.init_node(&rx_config(FrameMode::Classic, 4)).unwrap();
        let handler: &'static CountingHandler =
            Box::leak(Box::new(CountingHandler(AtomicU32::new(0))));
        let config = rx.config().interrupt.unwrap();
        module.register(&config, handler).unwrap();
        assert_eq!(
            module.register(&config, handler),
            Err(RegisterError::LineOccupied)
        );

        let sent = frame(FrameMode::Classic, DataLengthCode::_8);
        // Requests raised while disabled are serviced once enabled
        tx.send(&sent).unwrap();
        tx.send(&sent).unwrap();
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);
        InterruptController::enable(module);
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);

        // The flag is still raised, so there is no new edge
        tx.send(&sent).unwrap();
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);

        rx.clear_interrupt_flag(Interrupt::RxFifo0NewMessage);
        tx.send(&sent).unwrap();
        assert_eq!(handler.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_busy_transmitter() {
        let module = make_module();
        let mut tx = module.init_node(&tx_config(FrameMode::Classic)).unwrap();
        let _rx = module.init_node(&rx_config(FrameMode::Classic, 4)).unwrap();

        let sent = frame(FrameMode::Classic, DataLengthCode::_8);
        module.inject(Fault::TransmitterBusy { steps: 2 });
        tx.send(&sent).unwrap();
        assert!(module.tx_pending(SOURCE));
        assert_eq!(tx.send(&sent), Err(nb::Error::WouldBlock));
        assert_eq!(tx.send(&sent), Err(nb::Error::WouldBlock));
        assert!(!module.tx_pending(SOURCE));
        assert_eq!(module.fifo_level(DESTINATION), 1);
        assert_eq!(tx.send(&sent), Ok(()));
        assert_eq!(module.fifo_level(DESTINATION), 2);
    }
}

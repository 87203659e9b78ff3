//! Exchange session: the transmit path and the receive interrupt path of one use case
//!
//! The receive side lives in an [`RxContext`] shared with the interrupt handler. The handler is
//! the only writer of the received frame and the receipt counter; main-line code polls them.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use fdlink_core::FD_MAX_PAYLOAD;
use fdlink_driver::config::InterruptConfig;
use fdlink_driver::frame::{Frame, FrameDescriptor, build_frame};
use fdlink_driver::interrupt::{InterruptController, InterruptHandler};
use fdlink_driver::node::{Module, Node};

use crate::config::{configure_receive_endpoint, configure_transmit_endpoint};
use crate::endpoint::{DestinationEndpoint, SourceEndpoint, instantiate_endpoint};
use crate::error::{ConfigurationError, TransmitError};
use crate::usecase::UseCase;

/// Receive path state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxPhase {
    Idle,
    /// New message flag raised, handler not entered yet
    FrameAvailable,
    /// Handler is reading the FIFO. Only seen from the handler call chain, such as the node
    /// driver read.
    Draining,
}

/// Consistent view of the receive side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxSnapshot {
    pub receipts: u32,
    pub skipped: u32,
    pub phase: RxPhase,
    /// Last drained frame
    pub frame: Option<Frame>,
}

struct RxState<N> {
    endpoint: DestinationEndpoint<N>,
    last: Option<Frame>,
}

/// Receive side shared between the session and the interrupt handler
pub struct RxContext<N> {
    state: Mutex<CriticalSectionRawMutex, RefCell<Option<RxState<N>>>>,
    // Kept outside `state` so that `phase` does not need the state borrow while draining
    draining: AtomicBool,
    receipts: AtomicU32,
    skipped: AtomicU32,
    mailbox: Channel<CriticalSectionRawMutex, Frame, 1>,
}

impl<N> Default for RxContext<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> RxContext<N> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(None)),
            draining: AtomicBool::new(false),
            receipts: AtomicU32::new(0),
            skipped: AtomicU32::new(0),
            mailbox: Channel::new(),
        }
    }

    /// Number of frames drained by the handler. Wraps at `u32::MAX`.
    pub fn receipts(&self) -> u32 {
        self.receipts.load(Ordering::Acquire)
    }

    /// Number of handler entries that found the FIFO empty
    pub fn skipped(&self) -> u32 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl<N: Node> RxContext<N> {
    /// Whether a destination endpoint was already handed over
    pub fn is_attached(&self) -> bool {
        self.state.lock(|cell| cell.borrow().is_some())
    }

    fn attach(&self, endpoint: DestinationEndpoint<N>) -> Result<(), ConfigurationError> {
        self.state.lock(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_some() {
                return Err(ConfigurationError::ReceiveContextInUse);
            }
            *slot = Some(RxState {
                endpoint,
                last: None,
            });
            Ok(())
        })
    }

    /// Current receive state. Also callable from the handler call chain.
    pub fn phase(&self) -> RxPhase {
        if self.draining.load(Ordering::Acquire) {
            return RxPhase::Draining;
        }
        self.state.lock(|cell| {
            let slot = cell.borrow();
            match slot.as_ref() {
                Some(state) => phase_of(state),
                None => RxPhase::Idle,
            }
        })
    }

    /// Must not be called from the handler call chain.
    pub fn snapshot(&self) -> RxSnapshot {
        self.state.lock(|cell| {
            let slot = cell.borrow();
            let (phase, frame) = match slot.as_ref() {
                Some(state) => (phase_of(state), state.last),
                None => (RxPhase::Idle, None),
            };
            RxSnapshot {
                receipts: self.receipts(),
                skipped: self.skipped(),
                phase,
                frame,
            }
        })
    }

    /// Takes the newest frame pushed by the handler together with the receipt counter.
    pub fn take(&self) -> (u32, Option<Frame>) {
        self.state.lock(|_| (self.receipts(), self.mailbox.try_receive().ok()))
    }

    fn post(&self, frame: Frame) {
        // Newest frame wins
        if self.mailbox.try_send(frame).is_err() {
            let _ = self.mailbox.try_receive();
            let _ = self.mailbox.try_send(frame);
        }
    }
}

fn phase_of<N: Node>(state: &RxState<N>) -> RxPhase {
    if state.endpoint.is_pending() {
        RxPhase::FrameAvailable
    } else {
        RxPhase::Idle
    }
}

impl<N: Node> InterruptHandler for RxContext<N> {
    fn on_interrupt(&self) {
        self.state.lock(|cell| {
            let mut slot = cell.borrow_mut();
            let Some(state) = slot.as_mut() else {
                warn!("Receive interrupt without a destination endpoint");
                return;
            };

            state.endpoint.acknowledge();
            self.draining.store(true, Ordering::Release);
            match state.endpoint.drain() {
                Ok(frame) => {
                    state.last = Some(frame);
                    self.post(frame);
                    let count = self.receipts.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
                    trace!("Drained frame {}", count);
                }
                Err(nb::Error::WouldBlock) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    warn!("Receive FIFO empty on a new message interrupt");
                }
                Err(nb::Error::Other(_)) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    warn!("Receive FIFO read failed");
                }
            }
            self.draining.store(false, Ordering::Release);
        });
    }
}

/// Frame exchange of one use case between the source and the destination node
pub struct ExchangeSession<N: 'static> {
    index: usize,
    use_case: UseCase,
    descriptor: FrameDescriptor,
    source: SourceEndpoint<N>,
    rx: &'static RxContext<N>,
    rx_interrupt: InterruptConfig,
    last_sent: Option<Frame>,
    spin_limit: u32,
}

impl<N: Node + Send + 'static> ExchangeSession<N> {
    /// Configures and starts both endpoints of the use case.
    ///
    /// The destination endpoint is handed over to `rx`, which must not be attached yet. No node
    /// is initialized when `rx` is rejected.
    pub fn new<M>(
        module: &M,
        index: usize,
        use_case: &UseCase,
        rx: &'static RxContext<N>,
        spin_limit: u32,
    ) -> Result<Self, ConfigurationError>
    where
        M: Module<Node = N>,
    {
        let descriptor = use_case.descriptor()?;
        let tx_config = configure_transmit_endpoint(use_case)?;
        let rx_config = configure_receive_endpoint(use_case)?;
        let rx_interrupt = unwrap!(rx_config.interrupt);
        if rx.is_attached() {
            return Err(ConfigurationError::ReceiveContextInUse);
        }

        let source: SourceEndpoint<N> = instantiate_endpoint(module, &tx_config)?;
        let destination: DestinationEndpoint<N> = instantiate_endpoint(module, &rx_config)?;
        rx.attach(destination)?;

        Ok(Self {
            index,
            use_case: *use_case,
            descriptor,
            source,
            rx,
            rx_interrupt,
            last_sent: None,
            spin_limit,
        })
    }

    /// Installs the receive handler on the configured interrupt line.
    pub fn bind<C: InterruptController>(&self, controller: &C) -> Result<(), ConfigurationError> {
        controller.register(&self.rx_interrupt, self.rx)?;
        debug!(
            "Receive handler bound to line {} at priority {}",
            self.rx_interrupt.line.into_u8(),
            self.rx_interrupt.priority.get()
        );
        Ok(())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn use_case(&self) -> &UseCase {
        &self.use_case
    }

    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    pub fn rx(&self) -> &'static RxContext<N> {
        self.rx
    }

    pub fn last_sent(&self) -> Option<&Frame> {
        self.last_sent.as_ref()
    }

    /// Fills the test pattern and submits the frame to the source endpoint.
    pub fn transmit(&mut self) -> Result<Frame, TransmitError<N::Error>> {
        let len = self.descriptor.payload_len();
        let mut payload = [0u8; FD_MAX_PAYLOAD];
        for (i, byte) in payload[..len].iter_mut().enumerate() {
            *byte = i as u8;
        }
        let frame = build_frame(&self.descriptor, &payload[..len])?;

        self.source.submit(&frame, self.spin_limit)?;
        debug!(
            "Sent frame id {:#x} with {} bytes",
            self.descriptor.raw_id(),
            len
        );
        self.last_sent = Some(frame);
        Ok(frame)
    }

    pub fn receipts(&self) -> u32 {
        self.rx.receipts()
    }

    pub fn snapshot(&self) -> RxSnapshot {
        self.rx.snapshot()
    }

    pub fn take_received(&self) -> (u32, Option<Frame>) {
        self.rx.take()
    }
}

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use fdlink_driver::node::Node;

use crate::config::LOOP_PERIOD_MS;
use crate::error::TransmitError;
use crate::session::ExchangeSession;
use crate::verify::{CommunicationStatus, IntegrityError, RuntimeError, StatusCell, verify};

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunnerConfig {
    /// Wait between the transmit burst and the verification
    pub period_ms: u32,
    /// Frames sent per cycle. The last one is verified.
    pub frames_per_cycle: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            period_ms: LOOP_PERIOD_MS,
            frames_per_cycle: 1,
        }
    }
}

/// Driving loop of one exchange session
///
/// Each cycle sends a burst, waits one period, then checks what the receive handler drained.
/// The indicator is driven high while the status is success.
pub struct Runner<'a, N: 'static, D, P> {
    session: ExchangeSession<N>,
    delay: D,
    indicator: P,
    status: &'a StatusCell,
    config: RunnerConfig,
}

impl<'a, N, D, P> Runner<'a, N, D, P>
where
    N: Node + Send + 'static,
    D: DelayNs,
    P: OutputPin,
{
    /// Drives the indicator low and takes over the session.
    pub fn new(
        session: ExchangeSession<N>,
        delay: D,
        mut indicator: P,
        status: &'a StatusCell,
        config: RunnerConfig,
    ) -> Result<Self, P::Error> {
        indicator.set_low()?;
        Ok(Self {
            session,
            delay,
            indicator,
            status,
            config,
        })
    }

    pub fn session(&self) -> &ExchangeSession<N> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ExchangeSession<N> {
        &mut self.session
    }

    pub fn status(&self) -> CommunicationStatus {
        self.status.get()
    }

    pub fn indicator(&self) -> &P {
        &self.indicator
    }

    /// Runs one transmit, wait and verify cycle and returns the resulting status.
    pub fn step(&mut self) -> Result<CommunicationStatus, P::Error> {
        let use_case = self.session.index();
        let (before, _) = self.session.take_received();

        let mut sent = 0u32;
        let mut fault = None;
        for _ in 0..self.config.frames_per_cycle {
            match self.session.transmit() {
                Ok(_) => sent += 1,
                Err(TransmitError::Timeout { .. }) => {
                    fault = Some(RuntimeError::TransmitTimeout);
                    break;
                }
                Err(_) => {
                    fault = Some(RuntimeError::TransmitFault);
                    break;
                }
            }
        }

        self.delay.delay_ms(self.config.period_ms);

        let outcome = match fault {
            Some(error) => CommunicationStatus::RuntimeError { use_case, error },
            None => self.check(before, sent),
        };
        if let CommunicationStatus::Failure { error, .. } = outcome {
            error!("Use case {} failed: {:?}", use_case, error);
        }

        let status = self.status.update(outcome);
        if status.is_success() {
            self.indicator.set_high()?;
        } else {
            self.indicator.set_low()?;
        }
        Ok(status)
    }

    fn check(&mut self, before: u32, sent: u32) -> CommunicationStatus {
        let use_case = self.session.index();
        let (after, received) = self.session.take_received();
        let delta = after.wrapping_sub(before);

        let error = if delta == 0 {
            Some(IntegrityError::NoNewDataReceived)
        } else if delta < sent {
            Some(IntegrityError::NewDataButOneLost {
                expected: sent,
                received: delta,
            })
        } else {
            None
        };
        if let Some(error) = error {
            return CommunicationStatus::Failure { use_case, error };
        }

        match (self.session.last_sent(), received) {
            (Some(tx), Some(rx)) => verify(use_case, tx, &rx),
            _ => CommunicationStatus::Failure {
                use_case,
                error: IntegrityError::NoNewDataReceived,
            },
        }
    }

    pub fn run(&mut self) -> ! {
        loop {
            if self.step().is_err() {
                warn!("Indicator update failed");
            }
        }
    }
}

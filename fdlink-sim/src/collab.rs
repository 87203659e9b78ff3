//! Board collaborators: tick wait and indicator output

use std::convert::Infallible;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

use crate::module::SimModule;

/// Tick wait that advances the simulated bus
pub struct SimDelay<'a> {
    module: &'a SimModule,
    real_time: bool,
}

impl<'a> SimDelay<'a> {
    pub fn new(module: &'a SimModule) -> Self {
        Self {
            module,
            real_time: false,
        }
    }

    /// Sleeps the calling thread for the requested duration as well
    pub fn real_time(mut self, enabled: bool) -> Self {
        self.real_time = enabled;
        self
    }
}

impl DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.module.advance(u64::from(ns / 1_000));
        self.module.step();
        if self.real_time {
            std::thread::sleep(Duration::from_nanos(ns.into()));
        }
    }
}

/// Indicator output recording its level
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
    writes: u32,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Number of level writes since creation
    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.high {
            log::info!("Indicator off");
        }
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        if !self.high {
            log::info!("Indicator on");
        }
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high)
    }
}

//! Loop-back exchange demo on the simulated CAN module.
//!
//! The `board` module stands in for the bring-up code: it provides the CAN module with
//! node 0 wired to node 1. Tick wait and indicator pin come from `fdlink-sim`.

pub mod board;

use anyhow::Context;
use fdlink::config::TRANSMIT_SPIN_LIMIT;
use fdlink::interrupt::InterruptController;
use fdlink::runner::{Runner, RunnerConfig};
use fdlink::session::{ExchangeSession, RxContext};
use fdlink::usecase::UseCase;
use fdlink::verify::{CommunicationStatus, StatusCell};
use fdlink_sim::{Fault, SimDelay, SimModule, SimNode, SimPin};

/// Fault names accepted by [`parse_fault`]
pub const FAULT_NAMES: [&str; 6] = [
    "stall",
    "busy",
    "corrupt-payload",
    "corrupt-id",
    "drop",
    "spurious",
];

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub cycles: u32,
    pub frames_per_cycle: u32,
    pub period_ms: u32,
    pub spin_limit: u32,
    /// Injected before the first cycle
    pub fault: Option<Fault>,
    /// Sleep for the loop period instead of only advancing the bus
    pub real_time: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            cycles: 10,
            frames_per_cycle: runner.frames_per_cycle,
            period_ms: runner.period_ms,
            spin_limit: TRANSMIT_SPIN_LIMIT,
            fault: None,
            real_time: false,
        }
    }
}

pub fn parse_fault(name: &str) -> anyhow::Result<Fault> {
    let fault = match name {
        "stall" => Fault::TransmitterStalled,
        "busy" => Fault::TransmitterBusy { steps: 3 },
        "corrupt-payload" => Fault::CorruptPayload { offset: 1 },
        "corrupt-id" => Fault::CorruptIdentifier,
        "drop" => Fault::DropFrame,
        "spurious" => Fault::SpuriousRxInterrupt,
        _ => anyhow::bail!("unknown fault {name:?}, expected one of {FAULT_NAMES:?}"),
    };
    Ok(fault)
}

/// Runs the exchange of entry `index` of `use_cases` on an enabled module.
///
/// Stops early once the status is no longer success and returns the final status.
pub fn run_use_case(
    module: &'static SimModule,
    rx: &'static RxContext<SimNode<'static>>,
    use_cases: &[UseCase],
    index: usize,
    status: &StatusCell,
    options: &RunOptions,
) -> anyhow::Result<CommunicationStatus> {
    let use_case = use_cases
        .get(index)
        .with_context(|| format!("use case {index} does not exist"))?;

    let session = ExchangeSession::new(&module, index, use_case, rx, options.spin_limit)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("failed to start use case {index}"))?;
    session.bind(module).map_err(anyhow::Error::msg)?;
    InterruptController::enable(module);

    let mut config = RunnerConfig::default();
    config.period_ms = options.period_ms;
    config.frames_per_cycle = options.frames_per_cycle;
    let delay = SimDelay::new(module).real_time(options.real_time);
    let mut runner = Runner::new(session, delay, SimPin::new(), status, config)?;

    if let Some(fault) = options.fault {
        module.inject(fault);
    }

    log::info!(
        "Use case {index}: id {:#x}, {:?}, {} bytes",
        use_case.identifier,
        use_case.frame_mode,
        runner.session().descriptor().payload_len()
    );
    for cycle in 0..options.cycles {
        let status = runner.step()?;
        log::debug!("Cycle {cycle}: {status:?}");
        if !status.is_success() {
            break;
        }
    }

    let snapshot = runner.session().snapshot();
    log::info!(
        "Use case {index}: {} frames received, {} empty drains, indicator {}",
        snapshot.receipts,
        snapshot.skipped,
        if runner.indicator().is_high() { "on" } else { "off" }
    );
    Ok(runner.status())
}

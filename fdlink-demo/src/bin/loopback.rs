//! Loop-back exchange of the selected use cases.

use anyhow::Context;
use clap::ArgAction;
use fdlink::config::LOOP_PERIOD_MS;
use fdlink::session::RxContext;
use fdlink::usecase::USE_CASES;
use fdlink::verify::StatusCell;
use fdlink_demo::{FAULT_NAMES, RunOptions, board, parse_fault, run_use_case};
use fdlink_sim::{SimModule, SimNode};
use static_cell::StaticCell;

const USE_CASE_COUNT: usize = USE_CASES.len();

static MODULES: [StaticCell<SimModule>; USE_CASE_COUNT] =
    [const { StaticCell::new() }; USE_CASE_COUNT];
static RX_CONTEXTS: [StaticCell<RxContext<SimNode<'static>>>; USE_CASE_COUNT] =
    [const { StaticCell::new() }; USE_CASE_COUNT];
static STATUS: StatusCell = StatusCell::new();

fn args() -> clap::Command {
    clap::command!()
        .arg(
            clap::Arg::new("use-case")
                .long("use-case")
                .help("Use case index, or \"all\"")
                .default_value("all")
                .action(ArgAction::Set),
        )
        .arg(
            clap::Arg::new("cycles")
                .long("cycles")
                .help("Transmit and verify cycles per use case")
                .value_parser(clap::value_parser!(u32))
                .default_value("10")
                .action(ArgAction::Set),
        )
        .arg(
            clap::Arg::new("frames")
                .long("frames")
                .help("Frames sent per cycle")
                .value_parser(clap::value_parser!(u32).range(1..))
                .default_value("1")
                .action(ArgAction::Set),
        )
        .arg(
            clap::Arg::new("period-ms")
                .long("period-ms")
                .help("Wait between transmission and verification")
                .value_parser(clap::value_parser!(u32))
                .action(ArgAction::Set),
        )
        .arg(
            clap::Arg::new("fault")
                .long("fault")
                .help("Hardware fault injected before the first cycle")
                .value_parser(FAULT_NAMES)
                .action(ArgAction::Set),
        )
        .arg(
            clap::Arg::new("real-time")
                .long("real-time")
                .help("Sleep for the loop period")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let matches = args().get_matches();

    let selected: Vec<usize> = match matches.get_one::<String>("use-case").map(String::as_str) {
        None | Some("all") => (0..USE_CASE_COUNT).collect(),
        Some(index) => vec![index.parse().context("invalid use case index")?],
    };

    let mut options = RunOptions::default();
    if let Some(cycles) = matches.get_one::<u32>("cycles") {
        options.cycles = *cycles;
    }
    if let Some(frames) = matches.get_one::<u32>("frames") {
        options.frames_per_cycle = *frames;
    }
    options.period_ms = matches
        .get_one::<u32>("period-ms")
        .copied()
        .unwrap_or(LOOP_PERIOD_MS);
    options.fault = matches
        .get_one::<String>("fault")
        .map(|name| parse_fault(name))
        .transpose()?;
    options.real_time = matches.get_flag("real-time");

    for index in selected {
        anyhow::ensure!(
            index < USE_CASE_COUNT,
            "use case {index} does not exist, expected 0..{USE_CASE_COUNT}"
        );
        let module: &'static SimModule = MODULES[index].init(board::make_module());
        module.enable();
        let rx: &'static RxContext<SimNode<'static>> = RX_CONTEXTS[index].init(RxContext::new());

        run_use_case(module, rx, &USE_CASES, index, &STATUS, &options)?;
        if !STATUS.get().is_success() {
            break;
        }
    }

    let status = STATUS.get();
    if status.is_success() {
        log::info!("Exchange succeeded");
        Ok(())
    } else {
        anyhow::bail!("exchange failed: {status:?}")
    }
}

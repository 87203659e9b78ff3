use fdlink::config::{DESTINATION_NODE, SOURCE_NODE, TRANSMIT_SPIN_LIMIT};
use fdlink::core::{FrameMode, IdLength};
use fdlink::error::ConfigurationError;
use fdlink::interrupt::{Interrupt, InterruptController, RegisterError};
use fdlink::node::InitError;
use fdlink::runner::{Runner, RunnerConfig};
use fdlink::session::{ExchangeSession, RxContext, RxPhase};
use fdlink::usecase::{USE_CASES, UseCase};
use fdlink::verify::{CommunicationStatus, StatusCell};
use fdlink_sim::{Event, KERNEL_CLOCK_HZ, SimDelay, SimModule, SimNode, SimPin, Wiring};
use std::boxed::Box;

type Session = ExchangeSession<SimNode<'static>>;

fn make_module() -> &'static SimModule {
    let module = SimModule::new(
        KERNEL_CLOCK_HZ,
        Wiring::LoopBack {
            source: SOURCE_NODE,
            destination: DESTINATION_NODE,
        },
    );
    let module: &'static SimModule = Box::leak(Box::new(module));
    module.enable();
    module
}

fn make_rx() -> &'static RxContext<SimNode<'static>> {
    Box::leak(Box::new(RxContext::new()))
}

fn start(module: &'static SimModule, index: usize) -> Session {
    let session = ExchangeSession::new(
        &module,
        index,
        &USE_CASES[index],
        make_rx(),
        TRANSMIT_SPIN_LIMIT,
    )
    .unwrap();
    session.bind(module).unwrap();
    InterruptController::enable(module);
    session
}

#[test]
fn test_all_use_cases_round_trip() {
    for index in 0..USE_CASES.len() {
        let module = make_module();
        let mut session = start(module, index);

        let sent = session.transmit().unwrap();
        let (receipts, received) = session.take_received();
        assert_eq!(receipts, 1, "use case {index}");
        assert_eq!(received, Some(sent), "use case {index}");
        assert_eq!(received.unwrap().payload().len(), session.descriptor().payload_len());
    }
}

#[test]
fn test_test_pattern() {
    let module = make_module();
    let mut session = start(module, 3);

    let sent = session.transmit().unwrap();
    let expected: Vec<u8> = (0..64).collect();
    assert_eq!(sent.payload(), expected.as_slice());
    assert_eq!(session.last_sent(), Some(&sent));

    let (_, received) = session.take_received();
    assert_eq!(received.unwrap().payload(), expected.as_slice());
}

#[test]
fn test_frame_waits_for_enabled_interrupt() {
    let module = make_module();
    let mut session =
        ExchangeSession::new(&module, 0, &USE_CASES[0], make_rx(), TRANSMIT_SPIN_LIMIT).unwrap();
    session.bind(module).unwrap();
    assert_eq!(session.rx().phase(), RxPhase::Idle);

    let sent = session.transmit().unwrap();
    assert_eq!(session.rx().phase(), RxPhase::FrameAvailable);
    assert_eq!(session.receipts(), 0);
    assert_eq!(module.fifo_level(DESTINATION_NODE), 1);

    InterruptController::enable(module);
    assert_eq!(session.rx().phase(), RxPhase::Idle);
    assert_eq!(session.receipts(), 1);
    assert_eq!(session.take_received(), (1, Some(sent)));
}

#[test]
fn test_standard_classic_cycle() {
    let module = make_module();
    let session = start(module, 0);
    let status = StatusCell::new();
    let mut runner = Runner::new(
        session,
        SimDelay::new(module),
        SimPin::new(),
        &status,
        RunnerConfig::default(),
    )
    .unwrap();
    assert!(!runner.indicator().is_high());

    assert_eq!(runner.step(), Ok(CommunicationStatus::Success));
    assert_eq!(runner.session().receipts(), 1);
    assert!(runner.indicator().is_high());

    let snapshot = runner.session().snapshot();
    assert_eq!(snapshot.phase, RxPhase::Idle);
    assert_eq!(snapshot.skipped, 0);
    let received = snapshot.frame.unwrap();
    assert_eq!(received.payload(), [0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_repeated_cycles_stay_successful() {
    let module = make_module();
    let session = start(module, 2);
    let status = StatusCell::new();
    let mut runner = Runner::new(
        session,
        SimDelay::new(module),
        SimPin::new(),
        &status,
        RunnerConfig::default(),
    )
    .unwrap();

    for _ in 0..50 {
        assert_eq!(runner.step(), Ok(CommunicationStatus::Success));
    }
    assert_eq!(runner.session().receipts(), 50);
    assert_eq!(module.fifo_level(DESTINATION_NODE), 0);
    assert_eq!(runner.status(), CommunicationStatus::Success);
}

#[test]
fn test_burst_is_fully_drained() {
    let module = make_module();
    let session = start(module, 1);
    let status = StatusCell::new();
    let mut config = RunnerConfig::default();
    config.frames_per_cycle = 4;
    let mut runner =
        Runner::new(session, SimDelay::new(module), SimPin::new(), &status, config).unwrap();

    assert_eq!(runner.step(), Ok(CommunicationStatus::Success));
    assert_eq!(runner.session().receipts(), 4);
}

#[test]
fn test_flag_cleared_before_fifo_read() {
    let module = make_module();
    let mut session = start(module, 0);
    module.clear_events();

    for _ in 0..3 {
        session.transmit().unwrap();
    }

    let events = module.events();
    let entries: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| matches!(event, Event::HandlerEnter { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(entries.len(), 3);

    for entry in entries {
        let handler = &events[entry..];
        let exit = handler
            .iter()
            .position(|event| matches!(event, Event::HandlerExit { .. }))
            .unwrap();
        let handler = &handler[..exit];
        let cleared = handler
            .iter()
            .position(|event| {
                *event
                    == Event::FlagCleared {
                        node: DESTINATION_NODE,
                        interrupt: Interrupt::RxFifo0NewMessage,
                    }
            })
            .unwrap();
        let read = handler
            .iter()
            .position(|event| matches!(event, Event::FifoRead { .. } | Event::FifoEmpty { .. }))
            .unwrap();
        assert!(cleared < read);
    }
}

#[test]
fn test_module_not_enabled() {
    let module: &'static SimModule = Box::leak(Box::new(SimModule::new(
        KERNEL_CLOCK_HZ,
        Wiring::LoopBack {
            source: SOURCE_NODE,
            destination: DESTINATION_NODE,
        },
    )));
    let result = ExchangeSession::new(&module, 0, &USE_CASES[0], make_rx(), TRANSMIT_SPIN_LIMIT);
    assert_eq!(
        result.err(),
        Some(ConfigurationError::HardwareInit(InitError::NotIdle))
    );
}

#[test]
fn test_nodes_used_once() {
    let module = make_module();
    let first = start(module, 0);

    let second = ExchangeSession::new(&module, 1, &USE_CASES[1], make_rx(), TRANSMIT_SPIN_LIMIT);
    assert_eq!(
        second.err(),
        Some(ConfigurationError::HardwareInit(InitError::NodeOccupied))
    );

    assert_eq!(
        first.bind(module),
        Err(ConfigurationError::InterruptRegistration(
            RegisterError::LineOccupied
        ))
    );
}

#[test]
fn test_receive_context_used_once() {
    let module = make_module();
    let rx = make_rx();
    let _first =
        ExchangeSession::new(&module, 0, &USE_CASES[0], rx, TRANSMIT_SPIN_LIMIT).unwrap();

    let other = make_module();
    let second = ExchangeSession::new(&other, 1, &USE_CASES[1], rx, TRANSMIT_SPIN_LIMIT);
    assert_eq!(second.err(), Some(ConfigurationError::ReceiveContextInUse));

    // The rejected session left both nodes of the other module free
    let mut retry = ExchangeSession::new(&other, 1, &USE_CASES[1], make_rx(), TRANSMIT_SPIN_LIMIT)
        .unwrap();
    retry.bind(other).unwrap();
    InterruptController::enable(other);
    let sent = retry.transmit().unwrap();
    assert_eq!(retry.take_received(), (1, Some(sent)));
}

#[test]
fn test_invalid_use_cases() {
    let module = make_module();

    let use_case = UseCase::new(0x444, IdLength::Standard, FrameMode::Classic, 16);
    let result = ExchangeSession::new(&module, 0, &use_case, make_rx(), TRANSMIT_SPIN_LIMIT);
    assert_eq!(
        result.err(),
        Some(ConfigurationError::UnsupportedDataLengthCode(16))
    );

    let use_case = UseCase::new(0x444, IdLength::Standard, FrameMode::Classic, 9);
    let result = ExchangeSession::new(&module, 0, &use_case, make_rx(), TRANSMIT_SPIN_LIMIT);
    assert_eq!(
        result.err(),
        Some(ConfigurationError::PayloadExceedsFrameMode)
    );

    let use_case = UseCase::new(0x800, IdLength::Standard, FrameMode::Classic, 8);
    let result = ExchangeSession::new(&module, 0, &use_case, make_rx(), TRANSMIT_SPIN_LIMIT);
    assert_eq!(result.err(), Some(ConfigurationError::IdentifierOutOfRange));

    // Nothing was started by the rejected use cases
    assert!(ExchangeSession::new(&module, 0, &USE_CASES[0], make_rx(), TRANSMIT_SPIN_LIMIT).is_ok());
}

use fdlink::config::{DESTINATION_NODE, SOURCE_NODE};
use fdlink_sim::{SimModule, Wiring};

/// 20 MHz crystal, PLL at 300 MHz, CAN kernel clock divided down to 80 MHz
pub use fdlink_sim::KERNEL_CLOCK_HZ;

/// CAN module in reset with the source node transmit pin wired to the destination node
pub fn make_module() -> SimModule {
    SimModule::new(
        KERNEL_CLOCK_HZ,
        Wiring::LoopBack {
            source: SOURCE_NODE,
            destination: DESTINATION_NODE,
        },
    )
}

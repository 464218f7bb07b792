//! Drives a simulated daisy chain of three dSPIN
//!
//! Run with `RUST_LOG=debug cargo run --example simulated_chain --features log,std`
//! to see the traffic.

use dspin::{
    registers,
    sim::{SimulatedChip, SimulatedLines},
    Action, ChainStartup, DaisyChain, Devices, Direction, MotorConfig, Ready, Wait,
};

type Chain = DaisyChain<SimulatedChip<3>, SimulatedLines, Ready, 3>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let chain = DaisyChain::new(SimulatedChip::<3>::new(), SimulatedLines::new());
    let mut chain: Chain = match chain.initialize()? {
        ChainStartup::Ready(chain) => chain,
        ChainStartup::ResetFailed(_) => return Err("reset sequence failed".into()),
    };

    let profile = MotorConfig {
        max_speed: 800.0,
        kval_run: 0x40,
        low_speed_optimization: true,
        ..Default::default()
    };
    chain.configure(&profile)?;
    log::info!("MAX_SPEED: {:?}", chain.read_register(registers::MAX_SPEED)?);

    // Home the first two motors against their switches
    chain.ll().bus().device_mut(0).set_switch(true);
    chain.ll().bus().device_mut(1).set_switch(true);
    chain.go_until(
        &[
            (0, (Action::Reset, Direction::Reverse, 400)),
            (1, (Action::Reset, Direction::Reverse, 400)),
        ],
        Wait::Complete,
    )?;
    log::info!("switches: {:?}", chain.switch_closed()?);

    chain.ll().lines().set_busy_polls(5);
    let mut progress = |chain: &mut Chain| {
        if let Ok(positions) = chain.read_register(registers::ABS_POS) {
            log::info!("moving: {:?}", positions);
        }
    };
    chain.go_to(&[(0, 1200), (1, -400), (2, 50)], Wait::Progress(&mut progress))?;

    chain.go_home(Devices::Only(&[2]), Wait::Complete)?;
    log::info!("positions: {:?}", chain.read_register(registers::ABS_POS)?);

    for (device, status) in chain.get_status()?.iter().enumerate() {
        log::info!("device {}: {:?}", device, status);
    }

    chain.shutdown()?;
    Ok(())
}

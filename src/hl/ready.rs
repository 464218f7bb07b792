use embedded_hal::spi::SpiDevice;

use super::{DSpin, Ready, Wait, BUSY_POLL_INTERVAL_MS};
use crate::{
    command::{
        Action, Direction, GoTo, GoToDir, GoUntil, Move, ReleaseSw, Run, SimpleOpcode, StepClock,
    },
    configs::{Config, MotorConfig},
    lines::ControlLines,
    registers::{self, Register, LSPD_OPT},
    Error,
};

impl<SPI, IO> DSpin<SPI, IO, Ready>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Reads the IC configuration
    ///
    /// Returns `None` if CONFIG holds a reserved field encoding.
    pub fn config(&mut self) -> Result<Option<Config>, Error<SPI>> {
        let value = self.read_register(registers::CONFIG)?;
        Ok(Config::from_value(value as u16))
    }

    /// Writes the IC configuration
    pub fn set_config(&mut self, config: &Config) -> Result<(), Error<SPI>> {
        self.write_register(registers::CONFIG, config.value().into())
    }

    /// Applies a complete motion profile
    pub fn configure(&mut self, config: &MotorConfig) -> Result<(), Error<SPI>> {
        for (register, value) in config.register_writes() {
            self.write_register(register, value)?;
        }
        Ok(())
    }

    /// Enables or disables the low speed optimization
    ///
    /// Only the LSPD_OPT bit of MIN_SPEED is changed.
    pub fn set_low_speed_optimization(&mut self, enabled: bool) -> Result<(), Error<SPI>> {
        let min_speed = self.min_speed()?;
        let min_speed = if enabled {
            min_speed | i64::from(LSPD_OPT)
        } else {
            min_speed & !i64::from(LSPD_OPT)
        };
        self.set_min_speed(min_speed)
    }

    /// Reads every register of the chip, in address order
    pub fn read_all_registers(
        &mut self,
    ) -> Result<[(Register, i64); registers::ALL.len()], Error<SPI>> {
        let mut values = [(registers::ABS_POS, 0); registers::ALL.len()];
        for (slot, register) in values.iter_mut().zip(registers::ALL) {
            *slot = (*register, self.read_register(*register)?);
        }
        Ok(values)
    }

    /// Runs at constant speed until told otherwise
    pub fn run(&mut self, direction: Direction, steps_per_sec: u32) -> Result<(), Error<SPI>> {
        self.exchange(Run::new(direction, steps_per_sec)?)?;
        Ok(())
    }

    /// Switches to step-clock mode
    pub fn step_clock(&mut self, direction: Direction) -> Result<(), Error<SPI>> {
        self.exchange(StepClock::new(direction))?;
        Ok(())
    }

    /// Moves a number of micro-steps
    pub fn move_steps(
        &mut self,
        direction: Direction,
        steps: u32,
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        self.exchange(Move::new(direction, steps)?)?;
        self.finish(wait)
    }

    /// Goes to an absolute position through the shortest path
    pub fn go_to(&mut self, position: i32, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.exchange(GoTo::new(position)?)?;
        self.finish(wait)
    }

    /// Goes to an absolute position in the given direction
    pub fn go_to_dir(
        &mut self,
        direction: Direction,
        position: i32,
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        self.exchange(GoToDir::new(direction, position)?)?;
        self.finish(wait)
    }

    /// Goes to the home position (zero)
    pub fn go_home(&mut self, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::GoHome)?;
        self.finish(wait)
    }

    /// Goes to the MARK position
    pub fn go_mark(&mut self, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::GoMark)?;
        self.finish(wait)
    }

    /// Runs until the switch closes
    pub fn go_until(
        &mut self,
        action: Action,
        direction: Direction,
        steps_per_sec: u32,
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        self.exchange(GoUntil::new(action, direction, steps_per_sec)?)?;
        self.finish(wait)
    }

    /// Runs at minimum speed until the switch opens
    pub fn release_switch(
        &mut self,
        action: Action,
        direction: Direction,
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        self.exchange(ReleaseSw::new(action, direction))?;
        self.finish(wait)
    }

    /// Sets the current position as home
    pub fn reset_position(&mut self) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::ResetPos)?;
        Ok(())
    }

    /// Decelerates, then stops
    pub fn soft_stop(&mut self, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::SoftStop)?;
        self.finish(wait)
    }

    /// Stops immediately
    pub fn hard_stop(&mut self) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::HardStop)?;
        Ok(())
    }

    /// Decelerates, then disables the power bridges
    pub fn soft_hiz(&mut self, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::SoftHiZ)?;
        self.finish(wait)
    }

    /// Checks whether the last motion command completed
    ///
    /// This method returns an `nb::Result` to indicate whether the motor is
    /// still moving. If you need to block until it stops, you can use
    /// [`wait_for_move_complete`](Self::wait_for_move_complete), or `nb`'s
    /// `block!` macro.
    pub fn poll_move_complete(&mut self) -> nb::Result<(), Error<SPI>> {
        if self.is_busy().map_err(nb::Error::Other)? {
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    /// Blocks until BUSY is released
    ///
    /// BUSY is sampled every [`BUSY_POLL_INTERVAL_MS`], without timeout. If
    /// provided, `progress` is called before each interval.
    pub fn wait_for_move_complete(
        &mut self,
        mut progress: Option<&mut dyn FnMut(&mut Self)>,
    ) -> Result<(), Error<SPI>> {
        loop {
            match self.poll_move_complete() {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(error)) => return Err(error),
                Err(nb::Error::WouldBlock) => (),
            }

            if let Some(progress) = progress.as_mut() {
                progress(self);
            }
            self.ll.delay_ms(BUSY_POLL_INTERVAL_MS);
        }
    }

    fn finish(&mut self, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        match wait {
            Wait::Skip => Ok(()),
            Wait::Complete => self.wait_for_move_complete(None),
            Wait::Progress(progress) => self.wait_for_move_complete(Some(progress)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        command::{opcode, ParameterError},
        configs::{StepMode, StepSel},
        sim::{SimulatedChip, SimulatedLines},
    };

    type Driver = DSpin<SimulatedChip<1>, SimulatedLines, Ready>;

    fn ready() -> Driver {
        DSpin::new(SimulatedChip::new(), SimulatedLines::new())
            .initialize()
            .unwrap()
            .ready()
            .unwrap()
    }

    #[test]
    fn move_waits_for_busy_release() {
        let mut dspin = ready();
        dspin.ll().lines().set_busy_polls(3);
        let elapsed = dspin.ll().lines().elapsed_ms();

        dspin
            .move_steps(Direction::Forward, 200, Wait::Complete)
            .unwrap();

        assert_eq!(dspin.abs_pos().unwrap(), 200);
        let lines = dspin.ll().lines();
        assert_eq!(lines.polls(), 4);
        assert_eq!(
            lines.elapsed_ms() - elapsed,
            3 * u64::from(BUSY_POLL_INTERVAL_MS)
        );
    }

    #[test]
    fn progress_is_called_while_busy() {
        let mut dspin = ready();
        dspin.ll().lines().set_busy_polls(2);

        let mut calls = 0;
        let mut progress = |_: &mut Driver| calls += 1;
        dspin
            .go_to(-1000, Wait::Progress(&mut progress))
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(dspin.abs_pos().unwrap(), -1000);
    }

    #[test]
    fn progress_can_use_the_driver() {
        let mut dspin = ready();
        dspin.ll().lines().set_busy_polls(1);

        let mut position = None;
        let mut progress = |d: &mut Driver| position = Some(d.abs_pos().unwrap());
        dspin
            .go_to_dir(Direction::Reverse, 42, Wait::Progress(&mut progress))
            .unwrap();

        assert_eq!(position, Some(42));
    }

    #[test]
    fn skip_does_not_poll() {
        let mut dspin = ready();
        dspin.ll().lines().set_busy_polls(5);

        dspin.go_home(Wait::Skip).unwrap();
        dspin.soft_stop(Wait::Skip).unwrap();

        assert_eq!(dspin.ll().lines().polls(), 0);
        assert!(matches!(
            dspin.poll_move_complete(),
            Err(nb::Error::WouldBlock)
        ));
    }

    #[test]
    fn non_waiting_commands() {
        let mut dspin = ready();
        dspin.ll().lines().set_busy_polls(5);

        dspin.run(Direction::Forward, 400).unwrap();
        assert_eq!(dspin.ll().bus().device(0).last_command(), Some(0x51));
        dspin.step_clock(Direction::Reverse).unwrap();
        assert_eq!(
            dspin.ll().bus().device(0).last_command(),
            Some(opcode::STEP_CLOCK)
        );
        dspin.hard_stop().unwrap();
        dspin.reset_position().unwrap();
        dspin.hard_hiz().unwrap();

        assert_eq!(dspin.ll().lines().polls(), 0);
    }

    #[test]
    fn switch_operations() {
        let mut dspin = ready();
        dspin.set_abs_pos(1234).unwrap();

        dspin
            .go_until(Action::Copy, Direction::Forward, 100, Wait::Complete)
            .unwrap();
        assert_eq!(dspin.mark().unwrap(), 1234);

        dspin
            .release_switch(Action::Reset, Direction::Reverse, Wait::Complete)
            .unwrap();
        assert_eq!(dspin.abs_pos().unwrap(), 0);

        dspin.go_mark(Wait::Complete).unwrap();
        assert_eq!(dspin.abs_pos().unwrap(), 1234);
        dspin.soft_hiz(Wait::default()).unwrap();
        assert!(dspin.get_status().unwrap().hiz());
    }

    #[test]
    fn invalid_parameters_send_nothing() {
        let mut dspin = ready();
        let before = dspin.ll().bus().device(0).command_count();

        assert!(matches!(
            dspin.run(Direction::Forward, 0),
            Err(Error::InvalidParameter(ParameterError::SpeedOutOfRange(0)))
        ));
        assert!(matches!(
            dspin.go_to(1 << 22, Wait::Complete),
            Err(Error::InvalidParameter(
                ParameterError::PositionOutOfRange(_)
            ))
        ));

        assert_eq!(dspin.ll().bus().device(0).command_count(), before);
    }

    #[test]
    fn configuration() {
        let mut dspin = ready();
        assert_eq!(dspin.config().unwrap(), Some(Config::default()));

        let profile = MotorConfig {
            max_speed: 2000.0,
            step_mode: StepMode {
                step_sel: StepSel::Micro16,
                ..Default::default()
            },
            ..Default::default()
        };
        dspin.configure(&profile).unwrap();

        assert_eq!(dspin.max_speed().unwrap(), 131);
        assert_eq!(dspin.step_mode().unwrap(), 0x04);

        let config = Config {
            overcurrent_shutdown: false,
            ..Config::default()
        };
        dspin.set_config(&config).unwrap();
        assert_eq!(dspin.config().unwrap(), Some(config));
    }

    #[test]
    fn low_speed_optimization_keeps_min_speed() {
        let mut dspin = ready();
        dspin.set_min_speed(0x123).unwrap();

        dspin.set_low_speed_optimization(true).unwrap();
        assert_eq!(dspin.min_speed().unwrap(), 0x1123);

        dspin.set_low_speed_optimization(false).unwrap();
        assert_eq!(dspin.min_speed().unwrap(), 0x123);
    }

    #[test]
    fn register_dump() {
        let mut dspin = ready();
        dspin.set_kval_run(0x40).unwrap();

        let values = dspin.read_all_registers().unwrap();

        assert_eq!(values.len(), registers::ALL.len());
        assert_eq!(values[0], (registers::ABS_POS, 0));
        assert!(values.contains(&(registers::KVAL_RUN, 0x40)));
        assert!(values.contains(&(registers::CONFIG, 0x2e88)));
    }
}

//! Daisy chains of dSPIN sharing one chip select
//!
//! In a daisy chain, the SDO of each chip feeds the SDI of the next one, so
//! that a chip select frame of `N` bytes hands one byte to every chip. A
//! request of several bytes is therefore sent as several frames, or columns:
//! column `i` carries byte `i` of every device's request.
//!
//! [`Transaction`] does the column framing, [`DaisyChain`] drives a whole
//! chain through the same states as the single chip [`DSpin`] driver.
//! Per-device parameters are passed as sparse `(device, parameters)` entries,
//! devices that aren't named receiving no command.
//!
//! [`DSpin`]: crate::hl::DSpin

use core::fmt;

use embedded_hal::spi::SpiDevice;

pub use frame::*;
pub use params::*;

use crate::{
    command::{
        Action, Direction, Frame, GetParam, GoTo, GoToDir, GoUntil, Move, ParameterError,
        ReleaseSw, Run, SetParam, SimpleOpcode, StepClock,
    },
    configs::MotorConfig,
    hl::{Awake, PoweredOn, Ready, Standby, Uninitialized, Wait},
    hl::{BUSY_POLL_INTERVAL_MS, STANDBY_SETTLING_MS},
    lines::ControlLines,
    ll,
    registers::{self, Register},
    status::Status,
    Error,
};

mod frame;
mod params;

/// The devices a command is sent to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Devices<'a> {
    /// Every device of the chain
    All,
    /// Only the listed device indices
    Only(&'a [usize]),
}

impl Devices<'_> {
    /// One flag per device of a chain of `N`, set for the selected ones
    pub fn mask<const N: usize>(&self) -> Result<[bool; N], ParameterError> {
        match self {
            Devices::All => Ok([true; N]),
            Devices::Only(indices) => {
                let mut mask = [false; N];
                for &index in indices.iter() {
                    let selected = mask.get_mut(index).ok_or(ParameterError::DeviceIndex {
                        index,
                        chain_length: N,
                    })?;
                    if *selected {
                        return Err(ParameterError::DuplicateDevice(index));
                    }
                    *selected = true;
                }
                Ok(mask)
            }
        }
    }
}

/// The values of a register write on a chain
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Values<const N: usize> {
    /// The same value for every device
    All(i64),
    /// One value per device, devices with `None` being left alone
    Each([Option<i64>; N]),
}

impl<const N: usize> Values<N> {
    /// One value per device, from a slice that must be `N` long
    pub fn each_from_slice(values: &[Option<i64>]) -> Result<Self, ParameterError> {
        if values.len() != N {
            return Err(ParameterError::ValueCount {
                expected: N,
                actual: values.len(),
            });
        }
        Ok(Values::Each(core::array::from_fn(|device| values[device])))
    }
}

impl<const N: usize> From<i64> for Values<N> {
    fn from(value: i64) -> Self {
        Values::All(value)
    }
}

impl<const N: usize> From<[Option<i64>; N]> for Values<N> {
    fn from(values: [Option<i64>; N]) -> Self {
        Values::Each(values)
    }
}

/// Entry point to the daisy chain driver
///
/// Uses the same states as [`DSpin`](crate::hl::DSpin). `N` is the number of
/// chips in the chain and must be at least 2; a single chip is driven through
/// [`DSpin`](crate::hl::DSpin).
pub struct DaisyChain<SPI, IO, State, const N: usize> {
    ll: ll::DSpin<SPI, IO>,
    state: State,
}

impl<SPI, IO, State, const N: usize> DaisyChain<SPI, IO, State, N> {
    /// The current state
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Gives the bus and the control lines back
    pub fn release(self) -> (SPI, IO) {
        self.ll.release()
    }
}

impl<SPI, IO, State, const N: usize> fmt::Debug for DaisyChain<SPI, IO, State, N>
where
    State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DaisyChain<{}> {{ state: {:?}, .. }}", N, self.state)
    }
}

/// Outcome of the chain startup sequence
pub enum ChainStartup<SPI, IO, const N: usize> {
    /// Every chip is ready
    Ready(DaisyChain<SPI, IO, Ready, N>),

    /// At least one chip didn't come out of reset in the expected state
    ResetFailed(DaisyChain<SPI, IO, PoweredOn, N>),
}

impl<SPI, IO, const N: usize> ChainStartup<SPI, IO, N> {
    /// Whether the startup succeeded
    pub fn is_ready(&self) -> bool {
        matches!(self, ChainStartup::Ready(_))
    }

    /// Returns the ready driver, if any
    pub fn ready(self) -> Option<DaisyChain<SPI, IO, Ready, N>> {
        match self {
            ChainStartup::Ready(chain) => Some(chain),
            ChainStartup::ResetFailed(_) => None,
        }
    }
}

impl<SPI, IO, const N: usize> fmt::Debug for ChainStartup<SPI, IO, N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainStartup::Ready(chain) => write!(f, "Ready({:?})", chain),
            ChainStartup::ResetFailed(chain) => write!(f, "ResetFailed({:?})", chain),
        }
    }
}

impl<SPI, IO, const N: usize> DaisyChain<SPI, IO, Uninitialized, N>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    const CHAIN_LENGTH_CHECK: () = assert!(N > 1, "a daisy chain needs at least two devices");

    /// Create a new instance of `DaisyChain`
    ///
    /// Requires the SPI device the chain is connected to, and the control
    /// lines shared by all its chips.
    pub fn new(spi: SPI, io: IO) -> Self {
        let () = Self::CHAIN_LENGTH_CHECK;

        DaisyChain {
            ll: ll::DSpin::new(spi, io),
            state: Uninitialized,
        }
    }

    /// Brings every chip out of reset
    pub fn power_on(mut self) -> Result<DaisyChain<SPI, IO, PoweredOn, N>, Error<SPI>> {
        debug!("power on chain of {}", N);

        self.ll.set_standby(false)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);
        self.ll.set_standby(true)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);
        self.ll.set_standby(false)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);

        Ok(DaisyChain {
            ll: self.ll,
            state: PoweredOn,
        })
    }

    /// Powers the chain on and prepares it
    pub fn initialize(self) -> Result<ChainStartup<SPI, IO, N>, Error<SPI>> {
        self.power_on()?.prepare()
    }
}

impl<SPI, IO, State, const N: usize> DaisyChain<SPI, IO, State, N>
where
    SPI: SpiDevice,
    IO: ControlLines,
    State: Awake,
{
    /// Provides direct access to the register-level API
    pub fn ll(&mut self) -> &mut ll::DSpin<SPI, IO> {
        &mut self.ll
    }

    /// Sends one optional request per device
    ///
    /// `requests` must hold exactly `N` entries. Returns the replies, `None`
    /// for devices that had no request.
    pub fn transfer(
        &mut self,
        requests: &[Option<Frame>],
    ) -> Result<[Option<Frame>; N], Error<SPI>> {
        if requests.len() != N {
            return Err(Error::ChainLength {
                expected: N,
                actual: requests.len(),
            });
        }

        let transaction = Transaction::new(core::array::from_fn(|device| requests[device]));
        self.send(&transaction)
    }

    /// Sends a prepared transaction
    pub fn send(&mut self, transaction: &Transaction<N>) -> Result<[Option<Frame>; N], Error<SPI>> {
        let ll = &mut self.ll;
        let replies = transaction.exchange(|column| ll.transfer_message(column))?;
        debug!("chain {:?} -> {:?}", transaction, replies);

        Ok(replies)
    }

    /// Sends the same request to every device
    pub fn broadcast_request(&mut self, request: Frame) -> Result<[Frame; N], Error<SPI>> {
        let replies = self.send(&Transaction::broadcast(request))?;
        Ok(replies.map(Option::unwrap_or_default))
    }

    /// Sends a parameterless command to some devices
    ///
    /// The other devices receive NOP.
    pub fn send_command(
        &mut self,
        command: SimpleOpcode,
        devices: Devices<'_>,
    ) -> Result<[Frame; N], Error<SPI>> {
        let transaction = Transaction::targeted(command.request(), devices)?;
        let replies = self.send(&transaction)?;
        Ok(replies.map(Option::unwrap_or_default))
    }

    /// Reads a register of every device
    pub fn read_register(&mut self, register: Register) -> Result<[i64; N], Error<SPI>> {
        let replies = self.broadcast_request(GetParam::new(register).render())?;
        let values = replies.map(|reply| register.decode(reply.payload()));
        debug!("read {} -> {:?}", register.name(), values);

        Ok(values)
    }

    /// Writes a register of every device, or of some of them
    ///
    /// Read-only registers are refused before anything is sent.
    pub fn write_register(
        &mut self,
        register: Register,
        values: impl Into<Values<N>>,
    ) -> Result<(), Error<SPI>> {
        match values.into() {
            Values::All(value) => {
                let request = SetParam::new(register, value)?.render();
                debug!("write {} <- {}", register.name(), value);
                self.broadcast_request(request)?;
            }
            Values::Each(values) => {
                let mut requests = [None; N];
                for (request, value) in requests.iter_mut().zip(values) {
                    if let Some(value) = value {
                        *request = Some(SetParam::new(register, value)?.render());
                    }
                }
                debug!("write {} <- {:?}", register.name(), values);
                self.send(&Transaction::new(requests))?;
            }
        }

        Ok(())
    }

    /// Reads STATUS of every device through GetStatus
    ///
    /// This resets the latched flags of every chip.
    pub fn get_status(&mut self) -> Result<[Status; N], Error<SPI>> {
        let replies = self.broadcast_request(SimpleOpcode::GetStatus.request())?;
        Ok(replies.map(|reply| Status(registers::STATUS.decode(reply.payload()) as u16)))
    }

    /// Reads STATUS of every device as a plain register
    pub fn status(&mut self) -> Result<[Status; N], Error<SPI>> {
        Ok(self
            .read_register(registers::STATUS)?
            .map(|value| Status(value as u16)))
    }

    /// Resets the latched status flags of every device
    pub fn clear_status(&mut self) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::GetStatus, Devices::All)?;
        Ok(())
    }

    /// Whether the switch input of each device is closed
    pub fn switch_closed(&mut self) -> Result<[bool; N], Error<SPI>> {
        Ok(self.status()?.map(|status| status.switch_closed()))
    }

    /// Whether the shared BUSY line reports a running command
    pub fn is_busy(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.ll.is_busy()?)
    }

    /// Disables the power bridges immediately
    pub fn hard_hiz(&mut self, devices: Devices<'_>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::HardHiZ, devices)?;
        Ok(())
    }

    /// Resets devices to their power-up conditions
    pub fn reset_device(&mut self, devices: Devices<'_>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::ResetDevice, devices)?;
        Ok(())
    }

    /// Leaves the whole chain in standby
    pub fn shutdown(mut self) -> Result<DaisyChain<SPI, IO, Standby, N>, Error<SPI>> {
        self.clear_status()?;
        self.hard_hiz(Devices::All)?;
        self.ll.set_standby(true)?;
        debug!("chain standby");

        Ok(DaisyChain {
            ll: self.ll,
            state: Standby,
        })
    }
}

impl<SPI, IO, const N: usize> DaisyChain<SPI, IO, PoweredOn, N>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Checks that every chip holds its reset configuration
    pub fn verify_reset(&mut self) -> Result<bool, Error<SPI>> {
        let expected = registers::CONFIG.reset_value();
        let mut verified = true;

        for (device, config) in self.read_register(registers::CONFIG)?.iter().enumerate() {
            if *config != expected {
                error!(
                    "device {}: CONFIG is {} after reset, expected {}",
                    device, config, expected
                );
                verified = false;
            }
        }

        Ok(verified)
    }

    /// Checks the reset state and leaves every chip idle
    pub fn prepare(mut self) -> Result<ChainStartup<SPI, IO, N>, Error<SPI>> {
        if !self.verify_reset()? {
            return Ok(ChainStartup::ResetFailed(self));
        }

        self.hard_hiz(Devices::All)?;
        self.clear_status()?;
        info!("chain of {} ready", N);

        Ok(ChainStartup::Ready(DaisyChain {
            ll: self.ll,
            state: Ready,
        }))
    }
}

impl<SPI, IO, const N: usize> DaisyChain<SPI, IO, Standby, N>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Releases STBY/RST of every chip
    pub fn wake(mut self) -> Result<DaisyChain<SPI, IO, PoweredOn, N>, Error<SPI>> {
        self.ll.set_standby(false)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);
        debug!("chain awake");

        Ok(DaisyChain {
            ll: self.ll,
            state: PoweredOn,
        })
    }
}

impl<SPI, IO, const N: usize> DaisyChain<SPI, IO, Ready, N>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Applies the same motion profile to every device
    pub fn configure(&mut self, config: &MotorConfig) -> Result<(), Error<SPI>> {
        for (register, value) in config.register_writes() {
            self.write_register(register, value)?;
        }
        Ok(())
    }

    /// Sends one optional request per device, then waits as asked
    pub fn send_requests(
        &mut self,
        requests: &[Option<Frame>],
        wait: Wait<'_, Self>,
    ) -> Result<[Option<Frame>; N], Error<SPI>> {
        let replies = self.transfer(requests)?;
        self.finish(wait)?;
        Ok(replies)
    }

    /// Runs devices at constant speed
    pub fn run(&mut self, devices: &[(usize, (Direction, u32))]) -> Result<(), Error<SPI>> {
        let (directions, speeds) = expand_parameters::<_, N>(devices)?;
        let requests = render::<N>(|device| match (directions[device], speeds[device]) {
            (Some(direction), Some(speed)) => Ok(Some(Run::new(direction, speed)?.render())),
            _ => Ok(None),
        })?;
        self.send_requests(&requests, Wait::Skip)?;
        Ok(())
    }

    /// Switches devices to step-clock mode
    pub fn step_clock(&mut self, devices: &[(usize, Direction)]) -> Result<(), Error<SPI>> {
        let requests = distribute::<_, N>(devices)?
            .map(|direction| direction.map(|direction| StepClock::new(direction).render()));
        self.send_requests(&requests, Wait::Skip)?;
        Ok(())
    }

    /// Moves devices by a number of micro-steps
    pub fn move_steps(
        &mut self,
        devices: &[(usize, (Direction, u32))],
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        let (directions, steps) = expand_parameters::<_, N>(devices)?;
        let requests = render::<N>(|device| match (directions[device], steps[device]) {
            (Some(direction), Some(steps)) => Ok(Some(Move::new(direction, steps)?.render())),
            _ => Ok(None),
        })?;
        self.send_requests(&requests, wait)?;
        Ok(())
    }

    /// Sends devices to absolute positions through the shortest path
    pub fn go_to(&mut self, devices: &[(usize, i32)], wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        let positions = distribute::<_, N>(devices)?;
        let requests = render::<N>(|device| match positions[device] {
            Some(position) => Ok(Some(GoTo::new(position)?.render())),
            None => Ok(None),
        })?;
        self.send_requests(&requests, wait)?;
        Ok(())
    }

    /// Sends devices to absolute positions in the given directions
    pub fn go_to_dir(
        &mut self,
        devices: &[(usize, (Direction, i32))],
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        let (directions, positions) = expand_parameters::<_, N>(devices)?;
        let requests = render::<N>(|device| match (directions[device], positions[device]) {
            (Some(direction), Some(position)) => {
                Ok(Some(GoToDir::new(direction, position)?.render()))
            }
            _ => Ok(None),
        })?;
        self.send_requests(&requests, wait)?;
        Ok(())
    }

    /// Runs devices until their switch closes
    pub fn go_until(
        &mut self,
        devices: &[(usize, (Action, Direction, u32))],
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        let (actions, directions, speeds) = expand_parameters::<_, N>(devices)?;
        let requests = render::<N>(|device| {
            match (actions[device], directions[device], speeds[device]) {
                (Some(action), Some(direction), Some(speed)) => {
                    Ok(Some(GoUntil::new(action, direction, speed)?.render()))
                }
                _ => Ok(None),
            }
        })?;
        self.send_requests(&requests, wait)?;
        Ok(())
    }

    /// Runs devices at minimum speed until their switch opens
    pub fn release_switch(
        &mut self,
        devices: &[(usize, (Action, Direction))],
        wait: Wait<'_, Self>,
    ) -> Result<(), Error<SPI>> {
        let (actions, directions) = expand_parameters::<_, N>(devices)?;
        let requests = render::<N>(|device| match (actions[device], directions[device]) {
            (Some(action), Some(direction)) => Ok(Some(ReleaseSw::new(action, direction).render())),
            _ => Ok(None),
        })?;
        self.send_requests(&requests, wait)?;
        Ok(())
    }

    /// Sends devices to their home position
    pub fn go_home(&mut self, devices: Devices<'_>, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::GoHome, devices)?;
        self.finish(wait)
    }

    /// Sends devices to their MARK position
    pub fn go_mark(&mut self, devices: Devices<'_>, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::GoMark, devices)?;
        self.finish(wait)
    }

    /// Sets the current position of devices as home
    pub fn reset_position(&mut self, devices: Devices<'_>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::ResetPos, devices)?;
        Ok(())
    }

    /// Decelerates devices, then stops them
    pub fn soft_stop(&mut self, devices: Devices<'_>, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::SoftStop, devices)?;
        self.finish(wait)
    }

    /// Stops devices immediately
    pub fn hard_stop(&mut self, devices: Devices<'_>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::HardStop, devices)?;
        Ok(())
    }

    /// Decelerates devices, then disables their power bridges
    pub fn soft_hiz(&mut self, devices: Devices<'_>, wait: Wait<'_, Self>) -> Result<(), Error<SPI>> {
        self.send_command(SimpleOpcode::SoftHiZ, devices)?;
        self.finish(wait)
    }

    /// Checks whether every device completed its last motion command
    pub fn poll_move_complete(&mut self) -> nb::Result<(), Error<SPI>> {
        if self.is_busy().map_err(nb::Error::Other)? {
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    /// Blocks until the shared BUSY line is released
    ///
    /// BUSY is sampled every [`BUSY_POLL_INTERVAL_MS`], without timeout.
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

/// Renders one optional request per device
fn render<const N: usize>(
    mut request: impl FnMut(usize) -> Result<Option<Frame>, ParameterError>,
) -> Result<[Option<Frame>; N], ParameterError> {
    let mut requests = [None; N];
    for (device, slot) in requests.iter_mut().enumerate() {
        *slot = request(device)?;
    }
    Ok(requests)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimulatedChip, SimulatedLines};
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    type Chain = DaisyChain<SimulatedChip<3>, SimulatedLines, Ready, 3>;

    fn ready() -> Chain {
        DaisyChain::new(SimulatedChip::new(), SimulatedLines::new())
            .initialize()
            .unwrap()
            .ready()
            .unwrap()
    }

    fn column(request: [u8; 3], reply: [u8; 3]) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(request.to_vec(), reply.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    #[test]
    fn broadcast_status_sends_three_columns() {
        let mut expectations = Vec::new();
        expectations.extend(column([0xd0; 3], [0x00; 3]));
        expectations.extend(column([0x00; 3], [0x7e, 0x7c, 0x7e]));
        expectations.extend(column([0x00; 3], [0x03, 0x03, 0x01]));
        let mut chain = DaisyChain::<_, _, PoweredOn, 3> {
            ll: ll::DSpin::new(SpiMock::new(&expectations), SimulatedLines::new()),
            state: PoweredOn,
        };

        let statuses = chain.get_status().unwrap();

        assert_eq!(statuses.map(|status| status.0), [0x7e03, 0x7c03, 0x7e01]);
        chain.ll().bus().done();
    }

    #[test]
    fn targeted_command_fills_with_nop() {
        let expectations = column([0x00, 0xb0, 0x00], [0x00; 3]);
        let mut chain = DaisyChain::<_, _, Ready, 3> {
            ll: ll::DSpin::new(SpiMock::new(&expectations), SimulatedLines::new()),
            state: Ready,
        };

        chain.soft_stop(Devices::Only(&[1]), Wait::Skip).unwrap();

        chain.ll().bus().done();
    }

    #[test]
    fn request_count_must_match_chain_length() {
        let mut chain = DaisyChain::<_, _, PoweredOn, 3> {
            ll: ll::DSpin::new(SpiMock::<u8>::new(&[]), SimulatedLines::new()),
            state: PoweredOn,
        };

        let result = chain.transfer(&[None, None]);

        assert!(matches!(
            result,
            Err(Error::ChainLength {
                expected: 3,
                actual: 2
            })
        ));
        chain.ll().bus().done();
    }

    #[test]
    fn absent_requests_are_not_sent() {
        let mut chain = DaisyChain::<_, _, PoweredOn, 3> {
            ll: ll::DSpin::new(SpiMock::<u8>::new(&[]), SimulatedLines::new()),
            state: PoweredOn,
        };

        assert_eq!(chain.transfer(&[None; 3]).unwrap(), [None; 3]);
        chain.ll().bus().done();
    }

    #[test]
    fn mixed_lengths_are_padded_on_the_wire() {
        let run = Run::new(Direction::Forward, 0x10203).unwrap().render();
        let mut expectations = Vec::new();
        expectations.extend(column([0x51, 0x00, 0xd0], [0x00; 3]));
        expectations.extend(column([0x01, 0x00, 0x00], [0x00, 0x00, 0x7e]));
        expectations.extend(column([0x02, 0x00, 0x00], [0x00, 0x00, 0x03]));
        expectations.extend(column([0x03, 0x00, 0x00], [0x00; 3]));
        let mut chain = DaisyChain::<_, _, PoweredOn, 3> {
            ll: ll::DSpin::new(SpiMock::new(&expectations), SimulatedLines::new()),
            state: PoweredOn,
        };

        let replies = chain
            .transfer(&[Some(run), None, Some(SimpleOpcode::GetStatus.request())])
            .unwrap();

        assert_eq!(replies[1], None);
        assert_eq!(replies[2].unwrap().as_bytes(), &[0x00, 0x7e, 0x03, 0x00]);
        chain.ll().bus().done();
    }

    #[test]
    fn broadcast_and_per_device_writes() {
        let mut chain = ready();

        chain.write_register(registers::MAX_SPEED, 500).unwrap();
        assert_eq!(chain.read_register(registers::MAX_SPEED).unwrap(), [500; 3]);

        chain
            .write_register(registers::ABS_POS, [Some(1), None, Some(-3)])
            .unwrap();
        assert_eq!(chain.read_register(registers::ABS_POS).unwrap(), [1, 0, -3]);

        let values = Values::<3>::each_from_slice(&[None, Some(7), None]).unwrap();
        chain.write_register(registers::MARK, values).unwrap();
        assert_eq!(chain.read_register(registers::MARK).unwrap(), [0, 7, 0]);
    }

    #[test]
    fn value_count_must_match_chain_length() {
        assert_eq!(
            Values::<3>::each_from_slice(&[Some(1)]),
            Err(ParameterError::ValueCount {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn read_only_write_is_rejected() {
        let mut chain = ready();
        let count = chain.ll().bus().device(0).command_count();

        let result = chain.write_register(registers::ADC_OUT, [None, Some(1), None]);

        assert!(matches!(
            result,
            Err(Error::InvalidParameter(ParameterError::ReadOnlyRegister(
                "ADC_OUT"
            )))
        ));
        assert_eq!(chain.ll().bus().device(0).command_count(), count);
    }

    #[test]
    fn motion_reaches_only_named_devices() {
        let mut chain = ready();
        chain.ll().lines().set_busy_polls(2);

        chain
            .go_to(&[(0, 1000), (2, -250)], Wait::Complete)
            .unwrap();
        assert_eq!(chain.read_register(registers::ABS_POS).unwrap(), [1000, 0, -250]);
        assert_eq!(chain.ll().lines().polls(), 3);

        chain
            .move_steps(&[(1, (Direction::Reverse, 40))], Wait::Skip)
            .unwrap();
        chain
            .go_to_dir(&[(2, (Direction::Forward, 10))], Wait::Skip)
            .unwrap();
        assert_eq!(chain.read_register(registers::ABS_POS).unwrap(), [1000, -40, 10]);

        chain.go_home(Devices::Only(&[0, 1]), Wait::Skip).unwrap();
        assert_eq!(chain.read_register(registers::ABS_POS).unwrap(), [0, 0, 10]);
    }

    #[test]
    fn run_and_stop() {
        let mut chain = ready();

        chain
            .run(&[(0, (Direction::Forward, 100)), (2, (Direction::Reverse, 200))])
            .unwrap();
        assert_eq!(chain.ll().bus().device(1).last_command(), Some(0xd0));
        let statuses = chain.status().unwrap();
        assert_eq!(statuses[0].direction(), Direction::Forward);
        assert_eq!(statuses[2].direction(), Direction::Reverse);
        assert!(statuses[1].hiz());

        chain.hard_stop(Devices::All).unwrap();
        assert_eq!(chain.read_register(registers::SPEED).unwrap(), [0; 3]);

        chain.soft_hiz(Devices::Only(&[2]), Wait::Skip).unwrap();
        let statuses = chain.status().unwrap();
        assert!(!statuses[0].hiz());
        assert!(statuses[2].hiz());
    }

    #[test]
    fn homing_with_switches() {
        let mut chain = ready();
        chain.ll().bus().device_mut(1).set_switch(true);
        chain.write_register(registers::ABS_POS, 300).unwrap();

        assert_eq!(chain.switch_closed().unwrap(), [false, true, false]);

        chain
            .go_until(
                &[
                    (0, (Action::Copy, Direction::Reverse, 500)),
                    (1, (Action::Reset, Direction::Reverse, 500)),
                ],
                Wait::Complete,
            )
            .unwrap();
        assert_eq!(chain.read_register(registers::MARK).unwrap(), [300, 0, 0]);
        assert_eq!(chain.read_register(registers::ABS_POS).unwrap(), [300, 0, 300]);

        chain
            .release_switch(&[(2, (Action::Reset, Direction::Forward))], Wait::Complete)
            .unwrap();
        assert_eq!(chain.read_register(registers::ABS_POS).unwrap(), [300, 0, 0]);

        chain.go_mark(Devices::Only(&[0]), Wait::Skip).unwrap();
        chain.reset_position(Devices::Only(&[0])).unwrap();
        assert_eq!(chain.read_register(registers::ABS_POS).unwrap(), [0, 0, 0]);
    }

    #[test]
    fn step_clock_on_named_devices() {
        let mut chain = ready();

        chain.step_clock(&[(1, Direction::Forward)]).unwrap();

        let statuses = chain.status().unwrap();
        assert!(!statuses[0].step_clock_mode());
        assert!(statuses[1].step_clock_mode());
    }

    #[test]
    fn invalid_parameters_are_rejected_before_the_bus() {
        let mut chain = ready();
        let count = chain.ll().bus().device(0).command_count();

        assert!(matches!(
            chain.run(&[(3, (Direction::Forward, 100))]),
            Err(Error::InvalidParameter(ParameterError::DeviceIndex { .. }))
        ));
        assert!(matches!(
            chain.go_to(&[(0, 1), (0, 2)], Wait::Skip),
            Err(Error::InvalidParameter(ParameterError::DuplicateDevice(0)))
        ));
        assert!(matches!(
            chain.hard_stop(Devices::Only(&[5])),
            Err(Error::InvalidParameter(ParameterError::DeviceIndex { .. }))
        ));
        assert_eq!(chain.ll().bus().device(0).command_count(), count);
    }

    #[test]
    fn progress_is_reported_while_busy() {
        let mut chain = ready();
        chain.ll().lines().set_busy_polls(3);
        let mut ticks = 0;
        let mut progress = |_: &mut Chain| ticks += 1;

        chain
            .soft_stop(Devices::All, Wait::Progress(&mut progress))
            .unwrap();

        assert_eq!(ticks, 3);
    }

    #[test]
    fn configuration_reaches_every_device() {
        let mut chain = ready();
        let profile = MotorConfig {
            kval_run: 0x40,
            ..Default::default()
        };

        chain.configure(&profile).unwrap();

        assert_eq!(chain.read_register(registers::KVAL_RUN).unwrap(), [0x40; 3]);
    }

    #[test]
    fn startup_fails_when_one_device_is_not_reset() {
        let mut chain = DaisyChain::<_, _, _, 3>::new(SimulatedChip::<3>::new(), SimulatedLines::new())
            .power_on()
            .unwrap();
        chain
            .ll()
            .bus()
            .device_mut(1)
            .set_register(registers::CONFIG, 0x2e80);

        let mut chain = match chain.prepare().unwrap() {
            ChainStartup::ResetFailed(chain) => chain,
            ChainStartup::Ready(_) => panic!("reset check should fail"),
        };

        chain.reset_device(Devices::Only(&[1])).unwrap();
        assert!(chain.prepare().unwrap().is_ready());
    }

    #[test]
    fn shutdown_and_wake() {
        let chain = ready().shutdown().unwrap();
        let mut chain = chain.wake().unwrap();

        assert!(!chain.ll().lines().in_standby());
        assert!(chain.prepare().unwrap().is_ready());
    }
}

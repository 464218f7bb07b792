//! In-memory stand-ins for the hardware
//!
//! [`SimulatedChip`] is an `embedded-hal` [`SpiDevice`] behaving like a
//! daisy chain of `N` dSPIN chips (a single chip being a chain of one), and
//! [`SimulatedLines`] implements [`ControlLines`] without any pin. Together
//! they allow running the drivers on a host, without hardware.
//!
//! The chip model keeps registers and STATUS flags. Motion commands complete
//! instantly: positions are updated right away and the motor is reported
//! stopped, except after Run which keeps it at constant speed.

use core::convert::Infallible;

use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

use crate::{
    command::{opcode, Action, Direction, Frame, SimpleOpcode},
    lines::ControlLines,
    registers::{self, Register},
    status::Status,
};

/// STATUS after power-up: bridges in high impedance, not busy, forward
/// direction, undervoltage latched
pub const POWER_UP_STATUS: u16 = 0x7c13;

const HIZ: u16 = 0x0001;
const SW_F: u16 = 0x0004;
const SW_EVN: u16 = 0x0008;
const DIR: u16 = 0x0010;
const MOT_STATUS: u16 = 0x0060;
const NOTPERF_CMD: u16 = 0x0080;
const WRONG_CMD: u16 = 0x0100;
const SCK_MOD: u16 = 0x8000;
// Active low alarm flags, set back to 1 by GetStatus
const ALARMS: u16 = 0x7e00;

/// A single simulated dSPIN
#[derive(Clone, Debug)]
pub struct SimulatedDevice {
    registers: [i64; 32],
    status: u16,
    opcode: u8,
    incoming: Frame,
    expected: usize,
    outgoing: Frame,
    sent: usize,
    last_command: Option<u8>,
    command_count: usize,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    /// Creates a device in its power-up state
    pub fn new() -> Self {
        let mut registers = [0; 32];
        for register in registers::ALL {
            registers[register.address() as usize] = register.reset_value();
        }

        SimulatedDevice {
            registers,
            status: POWER_UP_STATUS,
            opcode: opcode::NOP,
            incoming: Frame::new(),
            expected: 0,
            outgoing: Frame::new(),
            sent: 0,
            last_command: None,
            command_count: 0,
        }
    }

    /// Puts the device back in its power-up state
    pub fn reset(&mut self) {
        let switch = self.status & SW_F;
        *self = SimulatedDevice::new();
        self.status |= switch;
    }

    /// Current value of a register
    pub fn register(&self, register: Register) -> i64 {
        if register == registers::STATUS {
            return i64::from(self.status);
        }
        self.registers[register.address() as usize]
    }

    /// Forces the value of a register, read-only ones included
    pub fn set_register(&mut self, register: Register, value: i64) {
        let value = register.decode(register.encode(value).as_bytes());
        if register == registers::STATUS {
            self.status = value as u16;
        } else {
            self.registers[register.address() as usize] = value;
        }
    }

    /// Current STATUS, without clearing anything
    pub fn status(&self) -> Status {
        Status(self.status)
    }

    /// Opens or closes the switch input
    ///
    /// Closing it latches a switch event.
    pub fn set_switch(&mut self, closed: bool) {
        if closed {
            self.status |= SW_F | SW_EVN;
        } else {
            self.status &= !SW_F;
        }
    }

    /// The opcode of the last command received, NOPs excluded
    pub fn last_command(&self) -> Option<u8> {
        self.last_command
    }

    /// How many commands were received, NOPs excluded
    pub fn command_count(&self) -> usize {
        self.command_count
    }

    /// Shifts one byte in and returns the byte shifted out
    pub fn shift(&mut self, byte: u8) -> u8 {
        if self.sent < self.outgoing.len() {
            let out = self.outgoing.as_bytes()[self.sent];
            self.sent += 1;
            return out;
        }

        if self.incoming.len() < self.expected {
            self.incoming.push(byte);
            if self.incoming.len() == self.expected {
                self.execute();
            }
            return 0;
        }

        self.decode(byte);
        0
    }

    fn decode(&mut self, byte: u8) {
        self.opcode = byte;
        self.incoming = Frame::new();
        self.expected = 0;
        self.outgoing = Frame::new();
        self.sent = 0;

        if byte == opcode::NOP {
            return;
        }
        self.last_command = Some(byte);
        self.command_count += 1;

        match byte & 0xe0 {
            opcode::SET_PARAM => match registers::by_address(byte & 0x1f) {
                Some(register) if !register.is_read_only() => {
                    self.expected = register.byte_len()
                }
                _ => self.status |= WRONG_CMD,
            },
            opcode::GET_PARAM => match registers::by_address(byte & 0x1f) {
                Some(register) => self.outgoing = register.encode(self.register(register)),
                None => self.status |= WRONG_CMD,
            },
            _ => match parameter_len(byte) {
                Some(0) => self.execute(),
                Some(len) => self.expected = len,
                None => self.status |= WRONG_CMD,
            },
        }
    }

    fn direction(&self) -> Direction {
        if self.opcode & 0x01 != 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    fn action(&self) -> Action {
        if self.opcode & 0x08 != 0 {
            Action::Copy
        } else {
            Action::Reset
        }
    }

    fn value(&self) -> i64 {
        registers::ABS_POS.decode(self.incoming.as_bytes())
    }

    fn set_motion(&mut self, direction: Option<Direction>, running: bool) {
        self.status &= !(HIZ | MOT_STATUS | SCK_MOD);
        if running {
            self.status |= MOT_STATUS;
        }
        match direction {
            Some(Direction::Forward) => self.status |= DIR,
            Some(Direction::Reverse) => self.status &= !DIR,
            None => (),
        }
    }

    fn apply_action(&mut self) {
        let position = self.register(registers::ABS_POS);
        match self.action() {
            Action::Copy => self.set_register(registers::MARK, position),
            Action::Reset => self.set_register(registers::ABS_POS, 0),
        }
    }

    fn execute(&mut self) {
        let op = self.opcode;

        match op & 0xe0 {
            opcode::SET_PARAM => {
                if let Some(register) = registers::by_address(op & 0x1f) {
                    let value = register.decode(self.incoming.as_bytes());
                    self.set_register(register, value);
                }
                return;
            }
            opcode::GET_PARAM => return,
            _ => (),
        }

        match op {
            opcode::GO_HOME => {
                self.set_motion(None, false);
                self.set_register(registers::ABS_POS, 0);
            }
            opcode::GO_MARK => {
                self.set_motion(None, false);
                let mark = self.register(registers::MARK);
                self.set_register(registers::ABS_POS, mark);
            }
            opcode::RESET_POS => self.set_register(registers::ABS_POS, 0),
            opcode::RESET_DEVICE => self.reset(),
            opcode::SOFT_STOP | opcode::HARD_STOP => {
                self.set_motion(None, false);
                self.set_register(registers::SPEED, 0);
            }
            opcode::SOFT_HIZ | opcode::HARD_HIZ => {
                self.set_motion(None, false);
                self.set_register(registers::SPEED, 0);
                self.status |= HIZ;
            }
            opcode::GET_STATUS => {
                self.outgoing = registers::STATUS.encode(i64::from(self.status));
                self.status |= ALARMS;
                self.status &= !(SW_EVN | NOTPERF_CMD | WRONG_CMD);
            }
            _ => self.execute_parametric(),
        }
    }

    fn execute_parametric(&mut self) {
        let op = self.opcode;
        let direction = self.direction();

        if op & !0x01 == opcode::RUN {
            let speed = registers::SPEED.decode(self.incoming.as_bytes());
            self.set_motion(Some(direction), true);
            self.set_register(registers::SPEED, speed);
        } else if op & !0x01 == opcode::MOVE {
            let steps = self.value() & i64::from(registers::ABS_POS.mask());
            let delta = match direction {
                Direction::Forward => steps,
                Direction::Reverse => -steps,
            };
            let position = self.register(registers::ABS_POS) + delta;
            self.set_motion(Some(direction), false);
            self.set_register(registers::ABS_POS, position);
        } else if op == opcode::GOTO {
            let position = self.value();
            self.set_motion(None, false);
            self.set_register(registers::ABS_POS, position);
        } else if op & !0x01 == opcode::GOTO_DIR {
            let position = self.value();
            self.set_motion(Some(direction), false);
            self.set_register(registers::ABS_POS, position);
        } else if op & !0x09 == opcode::GO_UNTIL || op & !0x09 == opcode::RELEASE_SW {
            self.set_motion(Some(direction), false);
            self.apply_action();
        } else if op & !0x01 == opcode::STEP_CLOCK {
            self.set_motion(Some(direction), false);
            self.status |= SCK_MOD;
        } else {
            self.status |= NOTPERF_CMD;
        }
    }
}

/// Number of parameter bytes following an opcode, `None` if the opcode is
/// unknown
fn parameter_len(op: u8) -> Option<usize> {
    let with_direction = op & !0x01;
    let with_action = op & !0x09;

    if with_direction == opcode::RUN
        || with_direction == opcode::MOVE
        || with_direction == opcode::GOTO_DIR
        || op == opcode::GOTO
        || with_action == opcode::GO_UNTIL
    {
        Some(3)
    } else if with_direction == opcode::STEP_CLOCK
        || with_action == opcode::RELEASE_SW
        || SimpleOpcode::try_from(op).is_ok()
    {
        Some(0)
    } else {
        None
    }
}

/// A daisy chain of `N` simulated dSPIN
///
/// Within a chip select assertion, byte `k` is exchanged with device
/// `k % N`. A column of `N` bytes thus reaches every device once, and on a
/// chain of one every byte reaches the single device.
#[derive(Clone, Debug)]
pub struct SimulatedChip<const N: usize> {
    devices: [SimulatedDevice; N],
}

impl<const N: usize> Default for SimulatedChip<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SimulatedChip<N> {
    /// Creates a chain of devices in their power-up state
    pub fn new() -> Self {
        SimulatedChip {
            devices: core::array::from_fn(|_| SimulatedDevice::new()),
        }
    }

    /// Gives access to a device
    ///
    /// # Panics
    ///
    /// Panics if `index` is not smaller than `N`.
    pub fn device(&self, index: usize) -> &SimulatedDevice {
        &self.devices[index]
    }

    /// Gives mutable access to a device
    ///
    /// # Panics
    ///
    /// Panics if `index` is not smaller than `N`.
    pub fn device_mut(&mut self, index: usize) -> &mut SimulatedDevice {
        &mut self.devices[index]
    }

    /// Resets every device, as a STBY/RST pulse would
    pub fn reset(&mut self) {
        self.devices.iter_mut().for_each(SimulatedDevice::reset);
    }

    fn shift(&mut self, position: &mut usize, byte: u8) -> u8 {
        let out = self.devices[*position % N].shift(byte);
        *position += 1;
        out
    }
}

impl<const N: usize> ErrorType for SimulatedChip<N> {
    type Error = Infallible;
}

impl<const N: usize> SpiDevice for SimulatedChip<N> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut position = 0;

        for operation in operations {
            match operation {
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.shift(&mut position, 0);
                    }
                }
                Operation::Write(buffer) => {
                    for &byte in buffer.iter() {
                        self.shift(&mut position, byte);
                    }
                }
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    for i in 0..len {
                        let out = self.shift(&mut position, write.get(i).copied().unwrap_or(0));
                        if let Some(byte) = read.get_mut(i) {
                            *byte = out;
                        }
                    }
                }
                Operation::TransferInPlace(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.shift(&mut position, *byte);
                    }
                }
                Operation::DelayNs(_) => (),
            }
        }
        trace!("simulated transaction of {} bytes", position);

        Ok(())
    }
}

/// Control lines without pins
///
/// BUSY reads active for a scripted number of polls, then inactive. Delays
/// don't block: they're only accumulated.
#[derive(Clone, Debug)]
pub struct SimulatedLines {
    standby: bool,
    standby_pulses: usize,
    busy_polls: usize,
    polls: usize,
    elapsed_ms: u64,
}

impl Default for SimulatedLines {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLines {
    /// Creates the lines, STBY/RST being low
    pub fn new() -> Self {
        SimulatedLines {
            standby: true,
            standby_pulses: 0,
            busy_polls: 0,
            polls: 0,
            elapsed_ms: 0,
        }
    }

    /// Makes BUSY read active for the next `polls` polls
    pub fn set_busy_polls(&mut self, polls: usize) {
        self.busy_polls = polls;
    }

    /// Whether STBY/RST is low
    pub fn in_standby(&self) -> bool {
        self.standby
    }

    /// How many times STBY/RST went from high to low
    pub fn standby_pulses(&self) -> usize {
        self.standby_pulses
    }

    /// How many times BUSY was read
    pub fn polls(&self) -> usize {
        self.polls
    }

    /// Sum of all the requested delays
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

impl ControlLines for SimulatedLines {
    fn set_standby(&mut self, standby: bool) -> Result<(), embedded_hal::digital::ErrorKind> {
        if standby && !self.standby {
            self.standby_pulses += 1;
        }
        self.standby = standby;
        Ok(())
    }

    fn is_busy(&mut self) -> Result<bool, embedded_hal::digital::ErrorKind> {
        self.polls += 1;
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += u64::from(ms);
    }
}

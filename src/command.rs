//! The dSPIN command set
//!
//! Every command the chip understands is modelled as a payload struct holding
//! exactly the parameters it needs, and all of them are gathered in the
//! [`Command`] enum. Parameters are validated when a command is built, so
//! rendering a command into its SPI request can't fail.
//!
//! Requests are short: one opcode byte, possibly followed by up to four value
//! bytes. They are carried in [`Frame`], a fixed capacity byte buffer that is
//! also used for the chip replies.

use core::{fmt, ops::Deref};

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::registers::{self, Register, SPEED_MAX};

/// Capacity of a [`Frame`]: one opcode byte plus a 32-bit value
pub const MAX_FRAME_LEN: usize = 5;

/// A request sent to, or a reply received from, a single dSPIN
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    buf: [u8; MAX_FRAME_LEN],
    len: u8,
}

impl Frame {
    /// Creates an empty frame
    pub const fn new() -> Self {
        Frame {
            buf: [0; MAX_FRAME_LEN],
            len: 0,
        }
    }

    /// Creates a frame made of `len` zero bytes
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`MAX_FRAME_LEN`].
    pub const fn zeroed(len: usize) -> Self {
        assert!(len <= MAX_FRAME_LEN, "frame too long");

        Frame {
            buf: [0; MAX_FRAME_LEN],
            len: len as u8,
        }
    }

    /// Creates a frame holding an opcode, followed by `len - 1` zero bytes
    pub const fn with_opcode(opcode: u8, len: usize) -> Self {
        Frame::zeroed(len).with_byte(0, opcode)
    }

    /// Copies a byte slice into a new frame
    ///
    /// Returns `None` if the slice doesn't fit.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_FRAME_LEN {
            return None;
        }

        let mut frame = Frame::zeroed(bytes.len());
        frame.buf[..bytes.len()].copy_from_slice(bytes);

        Some(frame)
    }

    /// Returns a copy of the frame with the byte at `index` replaced
    pub(crate) const fn with_byte(mut self, index: usize, byte: u8) -> Self {
        self.buf[index] = byte;
        self
    }

    /// Appends the content of another frame
    ///
    /// # Panics
    ///
    /// Panics if the result doesn't fit in [`MAX_FRAME_LEN`] bytes.
    pub(crate) fn extend(mut self, other: &Frame) -> Self {
        let start = self.len();
        let end = start + other.len();
        self.buf[start..end].copy_from_slice(other.as_bytes());
        self.len = end as u8;
        self
    }

    /// Returns a copy of the frame right-padded with zeros up to `len` bytes
    ///
    /// Frames already at least `len` long are returned unchanged.
    pub fn padded(mut self, len: usize) -> Self {
        let len = len.min(MAX_FRAME_LEN);
        let cur = self.len();
        if len > cur {
            self.buf[cur..len].fill(0);
            self.len = len as u8;
        }
        self
    }

    /// Appends a byte
    ///
    /// Returns `false` if the frame is already full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len() == MAX_FRAME_LEN {
            return false;
        }

        self.buf[self.len()] = byte;
        self.len += 1;
        true
    }

    /// The number of bytes in the frame
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the frame holds no byte at all
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The frame content
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len()]
    }

    /// The frame content, mutably
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut self.buf[..len]
    }

    /// The bytes following the first one
    ///
    /// In a reply, this is the value part: the first byte is the one clocked
    /// out while the opcode was shifted in.
    pub fn payload(&self) -> &[u8] {
        self.as_bytes().get(1..).unwrap_or(&[])
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "0x{:02x}", b)?;
        }
        write!(f, "]")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Frame {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=[u8]:#x}", self.as_bytes());
    }
}

/// Opcode values
///
/// Parametric commands OR these with a register address or with direction
/// and action flags.
pub mod opcode {
    /// Do nothing
    pub const NOP: u8 = 0x00;
    /// Write a register (OR'ed with its address)
    pub const SET_PARAM: u8 = 0x00;
    /// Read a register (OR'ed with its address)
    pub const GET_PARAM: u8 = 0x20;
    /// Run at constant speed
    pub const RUN: u8 = 0x50;
    /// Switch to step-clock mode
    pub const STEP_CLOCK: u8 = 0x58;
    /// Move a number of micro-steps
    pub const MOVE: u8 = 0x40;
    /// Go to an absolute position, shortest path
    pub const GOTO: u8 = 0x60;
    /// Go to an absolute position, forced direction
    pub const GOTO_DIR: u8 = 0x68;
    /// Run until a switch closing event
    pub const GO_UNTIL: u8 = 0x82;
    /// Run at minimum speed until the switch is released
    pub const RELEASE_SW: u8 = 0x92;
    /// Go to the home position
    pub const GO_HOME: u8 = 0x70;
    /// Go to the mark position
    pub const GO_MARK: u8 = 0x78;
    /// Reset ABS_POS
    pub const RESET_POS: u8 = 0xd8;
    /// Reset the device to power-up conditions
    pub const RESET_DEVICE: u8 = 0xc0;
    /// Decelerate and stop
    pub const SOFT_STOP: u8 = 0xb0;
    /// Stop immediately
    pub const HARD_STOP: u8 = 0xb8;
    /// Decelerate, then put the bridges in high impedance
    pub const SOFT_HIZ: u8 = 0xa0;
    /// Put the bridges in high impedance immediately
    pub const HARD_HIZ: u8 = 0xa8;
    /// Read STATUS and reset its latched flags
    pub const GET_STATUS: u8 = 0xd0;

    const ALL: [u8; 18] = [
        NOP, GET_PARAM, RUN, STEP_CLOCK, MOVE, GOTO, GOTO_DIR, GO_UNTIL, RELEASE_SW, GO_HOME,
        GO_MARK, RESET_POS, RESET_DEVICE, SOFT_STOP, HARD_STOP, SOFT_HIZ, HARD_HIZ, GET_STATUS,
    ];

    /// Whether `value` is one of the base opcodes
    pub fn is_valid(value: u8) -> bool {
        ALL.contains(&value)
    }
}

/// Raised when a command or chain parameter is out of range
///
/// These errors are always detected before anything is sent on the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum ParameterError {
    /// Not one of the chip opcodes
    InvalidOpcode(u8),

    /// A frame can't be empty or longer than [`MAX_FRAME_LEN`]
    InvalidFrameLength(usize),

    /// Not a [`Direction`] raw value
    InvalidDirection(u8),

    /// Not an [`Action`] raw value
    InvalidAction(u8),

    /// Speeds must be in `1..=0x3fffff` steps/s
    SpeedOutOfRange(u32),

    /// Step counts must fit in 22 bits
    StepsOutOfRange(u32),

    /// Positions must fit in a 22-bit two's complement integer
    PositionOutOfRange(i32),

    /// Not a supported micro-stepping setting
    InvalidMicrosteps(u16),

    /// The register can't be written
    ReadOnlyRegister(&'static str),

    /// The device index is not part of the chain
    DeviceIndex {
        /// The faulty index
        index: usize,
        /// The number of devices in the chain
        chain_length: usize,
    },

    /// The same device appears twice in a parameter set
    DuplicateDevice(usize),

    /// A per-device value sequence doesn't match the chain length
    ValueCount {
        /// The number of devices in the chain
        expected: usize,
        /// The number of values provided
        actual: usize,
    },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParameterError {}

/// Move direction
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Direction {
    /// Reverse
    Reverse = 0x00,
    /// Forward
    #[default]
    Forward = 0x01,
}

impl Direction {
    /// Returns the opposite direction
    pub fn invert(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = ParameterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Direction::Reverse),
            0x01 => Ok(Direction::Forward),
            _ => Err(ParameterError::InvalidDirection(value)),
        }
    }
}

/// What GoUntil and ReleaseSW do with ABS_POS when the switch event occurs
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Action {
    /// ABS_POS is reset
    Reset = 0x00,
    /// ABS_POS is copied into MARK
    #[default]
    Copy = 0x08,
}

impl TryFrom<u8> for Action {
    type Error = ParameterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Action::Reset),
            0x08 => Ok(Action::Copy),
            _ => Err(ParameterError::InvalidAction(value)),
        }
    }
}

fn check_speed(steps_per_sec: u32) -> Result<u32, ParameterError> {
    if steps_per_sec == 0 || steps_per_sec > SPEED_MAX {
        return Err(ParameterError::SpeedOutOfRange(steps_per_sec));
    }
    Ok(steps_per_sec)
}

fn check_steps(steps: u32) -> Result<u32, ParameterError> {
    if steps > registers::ABS_POS.mask() {
        return Err(ParameterError::StepsOutOfRange(steps));
    }
    Ok(steps)
}

fn check_position(position: i32) -> Result<i32, ParameterError> {
    const LIMIT: i32 = 1 << 21;
    if !(-LIMIT..LIMIT).contains(&position) {
        return Err(ParameterError::PositionOutOfRange(position));
    }
    Ok(position)
}

fn speed_value(steps_per_sec: u32) -> Frame {
    registers::SPEED.encode(i64::from(registers::spd_calc(steps_per_sec as f32)))
}

/// The parameterless commands
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[repr(u8)]
pub enum SimpleOpcode {
    /// Go to the home position
    GoHome = opcode::GO_HOME,
    /// Go to the mark position
    GoMark = opcode::GO_MARK,
    /// Reset ABS_POS to zero
    ResetPos = opcode::RESET_POS,
    /// Reset the device to power-up conditions
    ResetDevice = opcode::RESET_DEVICE,
    /// Decelerate and stop
    SoftStop = opcode::SOFT_STOP,
    /// Stop immediately
    HardStop = opcode::HARD_STOP,
    /// Decelerate, then disable the bridges
    SoftHiZ = opcode::SOFT_HIZ,
    /// Disable the bridges immediately
    HardHiZ = opcode::HARD_HIZ,
    /// Read STATUS and reset its latched flags
    GetStatus = opcode::GET_STATUS,
}

impl SimpleOpcode {
    /// Length of the request, including the room needed for the reply
    pub const fn request_len(self) -> usize {
        match self {
            SimpleOpcode::GetStatus => 1 + registers::STATUS.byte_len(),
            _ => 1,
        }
    }

    /// The request for this command
    pub const fn request(self) -> Frame {
        Frame::with_opcode(self as u8, self.request_len())
    }
}

impl TryFrom<u8> for SimpleOpcode {
    type Error = ParameterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            opcode::GO_HOME => SimpleOpcode::GoHome,
            opcode::GO_MARK => SimpleOpcode::GoMark,
            opcode::RESET_POS => SimpleOpcode::ResetPos,
            opcode::RESET_DEVICE => SimpleOpcode::ResetDevice,
            opcode::SOFT_STOP => SimpleOpcode::SoftStop,
            opcode::HARD_STOP => SimpleOpcode::HardStop,
            opcode::SOFT_HIZ => SimpleOpcode::SoftHiZ,
            opcode::HARD_HIZ => SimpleOpcode::HardHiZ,
            opcode::GET_STATUS => SimpleOpcode::GetStatus,
            _ => return Err(ParameterError::InvalidOpcode(value)),
        })
    }
}

/// A do-nothing request, used as filler in daisy chain transactions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Nop {
    len: u8,
}

impl Nop {
    /// Creates a NOP request of `len` bytes
    pub fn new(len: usize) -> Result<Self, ParameterError> {
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(ParameterError::InvalidFrameLength(len));
        }
        Ok(Nop { len: len as u8 })
    }

    /// Renders the request
    pub const fn render(&self) -> Frame {
        Frame::zeroed(self.len as usize)
    }
}

/// Writes a register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct SetParam {
    register: Register,
    value: i64,
}

impl SetParam {
    /// Creates the command, refusing read-only registers
    pub fn new(register: Register, value: i64) -> Result<Self, ParameterError> {
        if register.is_read_only() {
            return Err(ParameterError::ReadOnlyRegister(register.name()));
        }
        Ok(SetParam { register, value })
    }

    /// The written register
    pub fn register(&self) -> Register {
        self.register
    }

    /// The written value
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Renders the request
    pub fn render(&self) -> Frame {
        Frame::with_opcode(opcode::SET_PARAM | self.register.address(), 1)
            .extend(&self.register.encode(self.value))
    }
}

/// Reads a register
///
/// The request carries a zero placeholder as large as the register, during
/// which the chip shifts the register content out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct GetParam {
    register: Register,
}

impl GetParam {
    /// Creates the command
    pub fn new(register: Register) -> Self {
        GetParam { register }
    }

    /// The read register
    pub fn register(&self) -> Register {
        self.register
    }

    /// Renders the request
    pub fn render(&self) -> Frame {
        Frame::with_opcode(
            opcode::GET_PARAM | self.register.address(),
            1 + self.register.byte_len(),
        )
    }
}

/// Runs at constant speed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Run {
    direction: Direction,
    steps_per_sec: u32,
}

impl Run {
    /// Creates the command; the speed is in steps/s, micro-stepping included
    pub fn new(direction: Direction, steps_per_sec: u32) -> Result<Self, ParameterError> {
        Ok(Run {
            direction,
            steps_per_sec: check_speed(steps_per_sec)?,
        })
    }

    /// Renders the request
    pub fn render(&self) -> Frame {
        Frame::with_opcode(opcode::RUN | self.direction as u8, 1)
            .extend(&speed_value(self.steps_per_sec))
    }
}

/// Switches to step-clock mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct StepClock {
    direction: Direction,
}

impl StepClock {
    /// Creates the command
    pub fn new(direction: Direction) -> Self {
        StepClock { direction }
    }

    /// Renders the request
    pub const fn render(&self) -> Frame {
        Frame::with_opcode(opcode::STEP_CLOCK | self.direction as u8, 1)
    }
}

/// Moves a number of micro-steps from the current position
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Move {
    direction: Direction,
    steps: u32,
}

impl Move {
    /// Creates the command
    pub fn new(direction: Direction, steps: u32) -> Result<Self, ParameterError> {
        Ok(Move {
            direction,
            steps: check_steps(steps)?,
        })
    }

    /// Renders the request
    pub fn render(&self) -> Frame {
        Frame::with_opcode(opcode::MOVE | self.direction as u8, 1)
            .extend(&registers::ABS_POS.encode(i64::from(self.steps)))
    }
}

/// Goes to an absolute position through the shortest path
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct GoTo {
    position: i32,
}

impl GoTo {
    /// Creates the command
    pub fn new(position: i32) -> Result<Self, ParameterError> {
        Ok(GoTo {
            position: check_position(position)?,
        })
    }

    /// Renders the request
    pub fn render(&self) -> Frame {
        Frame::with_opcode(opcode::GOTO, 1)
            .extend(&registers::ABS_POS.encode(i64::from(self.position)))
    }
}

/// Goes to an absolute position in a forced direction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct GoToDir {
    direction: Direction,
    position: i32,
}

impl GoToDir {
    /// Creates the command
    pub fn new(direction: Direction, position: i32) -> Result<Self, ParameterError> {
        Ok(GoToDir {
            direction,
            position: check_position(position)?,
        })
    }

    /// Renders the request
    pub fn render(&self) -> Frame {
        Frame::with_opcode(opcode::GOTO_DIR | self.direction as u8, 1)
            .extend(&registers::ABS_POS.encode(i64::from(self.position)))
    }
}

/// Runs until the switch closes, then applies the action
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct GoUntil {
    action: Action,
    direction: Direction,
    steps_per_sec: u32,
}

impl GoUntil {
    /// Creates the command
    pub fn new(
        action: Action,
        direction: Direction,
        steps_per_sec: u32,
    ) -> Result<Self, ParameterError> {
        Ok(GoUntil {
            action,
            direction,
            steps_per_sec: check_speed(steps_per_sec)?,
        })
    }

    /// Renders the request
    pub fn render(&self) -> Frame {
        Frame::with_opcode(
            opcode::GO_UNTIL | self.direction as u8 | self.action as u8,
            1,
        )
        .extend(&speed_value(self.steps_per_sec))
    }
}

/// Runs at minimum speed until the switch opens, then applies the action
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct ReleaseSw {
    action: Action,
    direction: Direction,
}

impl ReleaseSw {
    /// Creates the command
    pub fn new(action: Action, direction: Direction) -> Self {
        ReleaseSw { action, direction }
    }

    /// Renders the request
    pub const fn render(&self) -> Frame {
        Frame::with_opcode(
            opcode::RELEASE_SW | self.direction as u8 | self.action as u8,
            1,
        )
    }
}

/// Any dSPIN command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Command {
    /// Filler
    Nop(Nop),
    /// Register write
    SetParam(SetParam),
    /// Register read
    GetParam(GetParam),
    /// Parameterless command
    Simple(SimpleOpcode),
    /// Constant speed run
    Run(Run),
    /// Step-clock mode
    StepClock(StepClock),
    /// Relative move
    Move(Move),
    /// Absolute move
    GoTo(GoTo),
    /// Absolute move with forced direction
    GoToDir(GoToDir),
    /// Run until switch closes
    GoUntil(GoUntil),
    /// Run until switch opens
    ReleaseSw(ReleaseSw),
}

impl Command {
    /// Renders the SPI request of the command
    pub fn render(&self) -> Frame {
        match self {
            Command::Nop(c) => c.render(),
            Command::SetParam(c) => c.render(),
            Command::GetParam(c) => c.render(),
            Command::Simple(c) => c.request(),
            Command::Run(c) => c.render(),
            Command::StepClock(c) => c.render(),
            Command::Move(c) => c.render(),
            Command::GoTo(c) => c.render(),
            Command::GoToDir(c) => c.render(),
            Command::GoUntil(c) => c.render(),
            Command::ReleaseSw(c) => c.render(),
        }
    }

    /// Whether the command is sent one byte per chip select cycle
    ///
    /// Only the fixed, parameterless commands are; everything else keeps the
    /// chip selected for the whole request.
    pub fn is_bytewise(&self) -> bool {
        matches!(self, Command::Nop(_) | Command::Simple(_))
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident,)*) => {
        $(
            impl From<$variant> for Command {
                fn from(command: $variant) -> Self {
                    Command::$variant(command)
                }
            }
        )*
    };
}

impl_from_payload! {
    Nop, SetParam, GetParam, Run, StepClock, Move, GoTo, GoToDir, GoUntil, ReleaseSw,
}

impl From<SimpleOpcode> for Command {
    fn from(command: SimpleOpcode) -> Self {
        Command::Simple(command)
    }
}

/// A one byte NOP
pub const NOP_1: Command = Command::Nop(Nop { len: 1 });
/// A two bytes NOP
pub const NOP_2: Command = Command::Nop(Nop { len: 2 });
/// A three bytes NOP
pub const NOP_3: Command = Command::Nop(Nop { len: 3 });
/// A four bytes NOP
pub const NOP_4: Command = Command::Nop(Nop { len: 4 });

/// Request of [`NOP_1`]
pub const NOP_1_REQUEST: Frame = Frame::zeroed(1);
/// Request of [`NOP_2`]
pub const NOP_2_REQUEST: Frame = Frame::zeroed(2);
/// Request of [`NOP_3`]
pub const NOP_3_REQUEST: Frame = Frame::zeroed(3);
/// Request of [`NOP_4`]
pub const NOP_4_REQUEST: Frame = Frame::zeroed(4);

/// GoHome request
pub const GO_HOME_REQUEST: Frame = SimpleOpcode::GoHome.request();
/// GoMark request
pub const GO_MARK_REQUEST: Frame = SimpleOpcode::GoMark.request();
/// ResetPos request
pub const RESET_POS_REQUEST: Frame = SimpleOpcode::ResetPos.request();
/// ResetDevice request
pub const RESET_DEVICE_REQUEST: Frame = SimpleOpcode::ResetDevice.request();
/// SoftStop request
pub const SOFT_STOP_REQUEST: Frame = SimpleOpcode::SoftStop.request();
/// HardStop request
pub const HARD_STOP_REQUEST: Frame = SimpleOpcode::HardStop.request();
/// SoftHiZ request
pub const SOFT_HIZ_REQUEST: Frame = SimpleOpcode::SoftHiZ.request();
/// HardHiZ request
pub const HARD_HIZ_REQUEST: Frame = SimpleOpcode::HardHiZ.request();
/// GetStatus request
pub const GET_STATUS_REQUEST: Frame = SimpleOpcode::GetStatus.request();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{ABS_POS, CONFIG, MAX_SPEED, STATUS};

    #[test]
    fn set_and_get_param() {
        let set = SetParam::new(MAX_SPEED, 500).unwrap();
        assert_eq!(set.render().as_bytes(), &[0x07, 0x01, 0xf4]);

        let get = GetParam::new(CONFIG);
        assert_eq!(get.render().as_bytes(), &[0x38, 0x00, 0x00]);

        let get = GetParam::new(ABS_POS);
        assert_eq!(get.render().as_bytes(), &[0x21, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn read_only_registers_are_refused() {
        assert_eq!(
            SetParam::new(STATUS, 0),
            Err(ParameterError::ReadOnlyRegister("STATUS"))
        );
    }

    #[test]
    fn opcode_and_flags_are_combined() {
        let run = Run::new(Direction::Forward, 1).unwrap();
        assert_eq!(run.render().as_bytes(), &[0x51, 0x00, 0x00, 0x43]);

        let run = Run::new(Direction::Reverse, 1).unwrap();
        assert_eq!(run.render().as_bytes()[0], 0x50);

        let go_until = GoUntil::new(Action::Copy, Direction::Forward, 1).unwrap();
        assert_eq!(go_until.render().as_bytes()[0], 0x8b);

        let go_until = GoUntil::new(Action::Reset, Direction::Reverse, 1).unwrap();
        assert_eq!(go_until.render().as_bytes()[0], 0x82);

        let release = ReleaseSw::new(Action::Copy, Direction::Reverse);
        assert_eq!(release.render().as_bytes(), &[0x9a]);

        assert_eq!(
            StepClock::new(Direction::Forward).render().as_bytes(),
            &[0x59]
        );
    }

    #[test]
    fn positions_and_steps() {
        let mv = Move::new(Direction::Reverse, 0x1234).unwrap();
        assert_eq!(mv.render().as_bytes(), &[0x40, 0x00, 0x12, 0x34]);

        let go_to = GoTo::new(-1).unwrap();
        assert_eq!(go_to.render().as_bytes(), &[0x60, 0x3f, 0xff, 0xff]);

        let go_to_dir = GoToDir::new(Direction::Forward, 200).unwrap();
        assert_eq!(go_to_dir.render().as_bytes(), &[0x69, 0x00, 0x00, 0xc8]);
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        assert_eq!(
            Run::new(Direction::Forward, 0),
            Err(ParameterError::SpeedOutOfRange(0))
        );
        assert_eq!(
            GoUntil::new(Action::Copy, Direction::Forward, SPEED_MAX + 1),
            Err(ParameterError::SpeedOutOfRange(SPEED_MAX + 1))
        );
        assert!(Run::new(Direction::Forward, SPEED_MAX).is_ok());
        assert_eq!(
            Move::new(Direction::Forward, 0x40_0000),
            Err(ParameterError::StepsOutOfRange(0x40_0000))
        );
        assert_eq!(
            GoTo::new(1 << 21),
            Err(ParameterError::PositionOutOfRange(1 << 21))
        );
        assert!(GoTo::new(-(1 << 21)).is_ok());
        assert_eq!(Nop::new(0), Err(ParameterError::InvalidFrameLength(0)));
        assert_eq!(
            Nop::new(MAX_FRAME_LEN + 1),
            Err(ParameterError::InvalidFrameLength(MAX_FRAME_LEN + 1))
        );
        assert_eq!(
            Direction::try_from(2),
            Err(ParameterError::InvalidDirection(2))
        );
        assert_eq!(Action::try_from(1), Err(ParameterError::InvalidAction(1)));
        assert_eq!(
            SimpleOpcode::try_from(0x51),
            Err(ParameterError::InvalidOpcode(0x51))
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let commands: [Command; 5] = [
            Run::new(Direction::Forward, 1234).unwrap().into(),
            GoTo::new(-4321).unwrap().into(),
            SetParam::new(CONFIG, 0x2e88).unwrap().into(),
            SimpleOpcode::GetStatus.into(),
            NOP_3,
        ];

        for command in commands.iter() {
            assert_eq!(command.render(), command.render());
        }
    }

    #[test]
    fn prebuilt_requests() {
        assert_eq!(NOP_4_REQUEST.as_bytes(), &[0, 0, 0, 0]);
        assert_eq!(NOP_2.render(), NOP_2_REQUEST);
        assert_eq!(GET_STATUS_REQUEST.as_bytes(), &[0xd0, 0x00, 0x00]);
        assert_eq!(HARD_HIZ_REQUEST.as_bytes(), &[0xa8]);
        assert_eq!(
            Command::from(SimpleOpcode::GoHome).render(),
            GO_HOME_REQUEST
        );
        assert!(opcode::is_valid(opcode::GO_UNTIL));
        assert!(!opcode::is_valid(0x51));
    }

    #[test]
    fn frame_helpers() {
        let frame = Frame::from_slice(&[0x21, 0x3f]).unwrap();
        assert_eq!(frame.padded(4).as_bytes(), &[0x21, 0x3f, 0x00, 0x00]);
        assert_eq!(frame.padded(1), frame);
        assert_eq!(frame.payload(), &[0x3f]);
        assert!(Frame::from_slice(&[0; MAX_FRAME_LEN + 1]).is_none());

        let mut frame = Frame::new();
        assert!(frame.is_empty());
        for i in 0..MAX_FRAME_LEN as u8 {
            assert!(frame.push(i));
        }
        assert!(!frame.push(0xff));
        assert_eq!(frame.len(), MAX_FRAME_LEN);
    }

    #[test]
    fn direction_invert() {
        assert_eq!(Direction::Forward.invert(), Direction::Reverse);
        assert_eq!(Direction::Reverse.invert(), Direction::Forward);
    }
}

//! Decoding of the STATUS register
//!
//! Some of the STATUS flags are active low on the chip. The accessors below
//! hide that and always return `true` when the condition they name is
//! present.

use core::fmt;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::command::Direction;

/// Motor activity, as reported by the MOT_STATUS field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum MotorStatus {
    /// Motor stopped
    Stopped,
    /// Accelerating
    Accelerating,
    /// Decelerating
    Decelerating,
    /// Running at constant speed
    ConstantSpeed,
}

/// The content of the STATUS register
#[derive(Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Status(pub u16);

impl Status {
    const HIZ: u16 = 0x0001;
    const BUSY: u16 = 0x0002;
    const SW_F: u16 = 0x0004;
    const SW_EVN: u16 = 0x0008;
    const DIR: u16 = 0x0010;
    const MOT_STATUS: u16 = 0x0060;
    const NOTPERF_CMD: u16 = 0x0080;
    const WRONG_CMD: u16 = 0x0100;
    const UVLO: u16 = 0x0200;
    const TH_WRN: u16 = 0x0400;
    const TH_SD: u16 = 0x0800;
    const OCD: u16 = 0x1000;
    const STEP_LOSS_A: u16 = 0x2000;
    const STEP_LOSS_B: u16 = 0x4000;
    const SCK_MOD: u16 = 0x8000;

    /// Builds the status from the two bytes of a GetStatus reply
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Status(u16::from_be_bytes(bytes))
    }

    fn is_set(&self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    /// The bridges are in high impedance
    pub fn hiz(&self) -> bool {
        self.is_set(Self::HIZ)
    }

    /// A command is being executed (BUSY is active low)
    pub fn busy(&self) -> bool {
        !self.is_set(Self::BUSY)
    }

    /// The switch input is closed
    pub fn switch_closed(&self) -> bool {
        self.is_set(Self::SW_F)
    }

    /// A switch turn-on event occurred since the last status read
    pub fn switch_event(&self) -> bool {
        self.is_set(Self::SW_EVN)
    }

    /// Current motor direction
    pub fn direction(&self) -> Direction {
        if self.is_set(Self::DIR) {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Current motor activity
    pub fn motor_status(&self) -> MotorStatus {
        match (self.0 & Self::MOT_STATUS) >> 5 {
            0 => MotorStatus::Stopped,
            1 => MotorStatus::Accelerating,
            2 => MotorStatus::Decelerating,
            _ => MotorStatus::ConstantSpeed,
        }
    }

    /// The last command couldn't be performed
    pub fn command_not_performed(&self) -> bool {
        self.is_set(Self::NOTPERF_CMD)
    }

    /// The last command doesn't exist
    pub fn wrong_command(&self) -> bool {
        self.is_set(Self::WRONG_CMD)
    }

    /// Undervoltage lockout or reset event (UVLO is active low)
    pub fn undervoltage(&self) -> bool {
        !self.is_set(Self::UVLO)
    }

    /// Thermal warning (active low)
    pub fn thermal_warning(&self) -> bool {
        !self.is_set(Self::TH_WRN)
    }

    /// Thermal shutdown (active low)
    pub fn thermal_shutdown(&self) -> bool {
        !self.is_set(Self::TH_SD)
    }

    /// Overcurrent (active low)
    pub fn overcurrent(&self) -> bool {
        !self.is_set(Self::OCD)
    }

    /// Stall detected on bridge A (active low)
    pub fn step_loss_a(&self) -> bool {
        !self.is_set(Self::STEP_LOSS_A)
    }

    /// Stall detected on bridge B (active low)
    pub fn step_loss_b(&self) -> bool {
        !self.is_set(Self::STEP_LOSS_B)
    }

    /// The device runs in step-clock mode
    pub fn step_clock_mode(&self) -> bool {
        self.is_set(Self::SCK_MOD)
    }

    /// Whether any alarm condition is present
    pub fn has_alarm(&self) -> bool {
        self.undervoltage()
            || self.thermal_warning()
            || self.thermal_shutdown()
            || self.overcurrent()
            || self.step_loss_a()
            || self.step_loss_b()
    }
}

impl From<u16> for Status {
    fn from(value: u16) -> Self {
        Status(value)
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Status")
            .field("raw", &format_args!("0x{:04x}", self.0))
            .field("hiz", &self.hiz())
            .field("busy", &self.busy())
            .field("switch_closed", &self.switch_closed())
            .field("switch_event", &self.switch_event())
            .field("direction", &self.direction())
            .field("motor_status", &self.motor_status())
            .field("command_not_performed", &self.command_not_performed())
            .field("wrong_command", &self.wrong_command())
            .field("undervoltage", &self.undervoltage())
            .field("thermal_warning", &self.thermal_warning())
            .field("thermal_shutdown", &self.thermal_shutdown())
            .field("overcurrent", &self.overcurrent())
            .field("step_loss_a", &self.step_loss_a())
            .field("step_loss_b", &self.step_loss_b())
            .field("step_clock_mode", &self.step_clock_mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_device_after_reset() {
        // HiZ, not busy, UVLO latched, no other alarm
        let status = Status(0x7c03);

        assert!(status.hiz());
        assert!(!status.busy());
        assert!(status.undervoltage());
        assert!(!status.thermal_warning());
        assert!(!status.overcurrent());
        assert!(!status.step_loss_a());
        assert!(status.has_alarm());
        assert_eq!(status.motor_status(), MotorStatus::Stopped);
        assert_eq!(status.direction(), Direction::Reverse);
    }

    #[test]
    fn running_forward() {
        let status = Status(0x7e70);

        assert!(!status.hiz());
        assert!(status.busy());
        assert!(!status.has_alarm());
        assert_eq!(status.motor_status(), MotorStatus::ConstantSpeed);
        assert_eq!(status.direction(), Direction::Forward);
    }

    #[test]
    fn switch_and_command_flags() {
        let status = Status::from_bytes([0x7f, 0x8e]);

        assert!(status.switch_closed());
        assert!(status.switch_event());
        assert!(status.command_not_performed());
        assert!(status.wrong_command());
        assert!(!status.step_clock_mode());
        assert_eq!(u16::from(status), 0x7f8e);
    }
}

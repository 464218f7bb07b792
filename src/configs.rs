//! Typed views of the configuration registers
//!
//! This module houses the datastructures that describe how a motor is
//! driven: the CONFIG register fields, the step mode, the overcurrent
//! threshold, the alarm mask, and [`MotorConfig`] which gathers a complete
//! motion profile that can be written in one go.

use core::ops::BitOr;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::{
    command::ParameterError,
    registers::{self, Register},
};

/// The IC configuration, as held by the CONFIG register
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Clock source
    pub oscillator: OscillatorSelect,
    /// What a switch closing event does
    pub switch_mode: SwitchMode,
    /// Motor supply voltage compensation
    pub voltage_compensation: bool,
    /// Whether an overcurrent event turns the bridges off
    pub overcurrent_shutdown: bool,
    /// Output slew rate
    pub slew_rate: SlewRate,
    /// PWM frequency multiplication factor
    pub pwm_multiplier: PwmMultiplier,
    /// PWM frequency division factor
    pub pwm_divisor: PwmDivisor,
}

impl Config {
    const OSC_SEL: u16 = 0x000f;
    const SW_MODE: u16 = 0x0010;
    const EN_VSCOMP: u16 = 0x0020;
    const OC_SD: u16 = 0x0080;
    const POW_SR_SHIFT: u16 = 8;
    const F_PWM_DEC_SHIFT: u16 = 10;
    const F_PWM_INT_SHIFT: u16 = 13;

    /// The register value for this configuration
    pub fn value(&self) -> u16 {
        let mut value = self.oscillator as u16 | self.switch_mode as u16;
        if self.voltage_compensation {
            value |= Self::EN_VSCOMP;
        }
        if self.overcurrent_shutdown {
            value |= Self::OC_SD;
        }
        value
            | (self.slew_rate as u16) << Self::POW_SR_SHIFT
            | (self.pwm_multiplier as u16) << Self::F_PWM_DEC_SHIFT
            | (self.pwm_divisor as u16) << Self::F_PWM_INT_SHIFT
    }

    /// Decodes a CONFIG register value
    ///
    /// Returns `None` if a field holds one of the reserved encodings.
    pub fn from_value(value: u16) -> Option<Self> {
        Some(Config {
            oscillator: OscillatorSelect::from_bits(value & Self::OSC_SEL)?,
            switch_mode: if value & Self::SW_MODE != 0 {
                SwitchMode::User
            } else {
                SwitchMode::HardStop
            },
            voltage_compensation: value & Self::EN_VSCOMP != 0,
            overcurrent_shutdown: value & Self::OC_SD != 0,
            slew_rate: SlewRate::from_bits((value >> Self::POW_SR_SHIFT) & 0x3)?,
            pwm_multiplier: PwmMultiplier::from_bits((value >> Self::F_PWM_DEC_SHIFT) & 0x7)?,
            pwm_divisor: PwmDivisor::from_bits((value >> Self::F_PWM_INT_SHIFT) & 0x7)?,
        })
    }
}

impl Default for Config {
    /// The chip configuration after a reset (0x2e88)
    fn default() -> Self {
        Config {
            oscillator: OscillatorSelect::Internal16MhzOscout2Mhz,
            switch_mode: SwitchMode::HardStop,
            voltage_compensation: false,
            overcurrent_shutdown: true,
            slew_rate: SlewRate::V290,
            pwm_multiplier: PwmMultiplier::X1,
            pwm_divisor: PwmDivisor::Div2,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Clock source and OSCOUT setting
pub enum OscillatorSelect {
    /// Internal 16MHz oscillator, OSCOUT unused
    Internal16Mhz = 0x0,
    /// Internal oscillator, 2MHz on OSCOUT
    Internal16MhzOscout2Mhz = 0x8,
    /// Internal oscillator, 4MHz on OSCOUT
    Internal16MhzOscout4Mhz = 0x9,
    /// Internal oscillator, 8MHz on OSCOUT
    Internal16MhzOscout8Mhz = 0xa,
    /// Internal oscillator, 16MHz on OSCOUT
    Internal16MhzOscout16Mhz = 0xb,
    /// 8MHz crystal
    ExternalCrystal8Mhz = 0x4,
    /// 16MHz crystal
    ExternalCrystal16Mhz = 0x5,
    /// 24MHz crystal
    ExternalCrystal24Mhz = 0x6,
    /// 32MHz crystal
    ExternalCrystal32Mhz = 0x7,
    /// 8MHz external clock, inverted on OSCOUT
    ExternalClock8MhzOscoutInverted = 0xc,
    /// 16MHz external clock, inverted on OSCOUT
    ExternalClock16MhzOscoutInverted = 0xd,
    /// 24MHz external clock, inverted on OSCOUT
    ExternalClock24MhzOscoutInverted = 0xe,
    /// 32MHz external clock, inverted on OSCOUT
    ExternalClock32MhzOscoutInverted = 0xf,
}

impl OscillatorSelect {
    fn from_bits(bits: u16) -> Option<Self> {
        use OscillatorSelect::*;

        Some(match bits {
            0x0 => Internal16Mhz,
            0x8 => Internal16MhzOscout2Mhz,
            0x9 => Internal16MhzOscout4Mhz,
            0xa => Internal16MhzOscout8Mhz,
            0xb => Internal16MhzOscout16Mhz,
            0x4 => ExternalCrystal8Mhz,
            0x5 => ExternalCrystal16Mhz,
            0x6 => ExternalCrystal24Mhz,
            0x7 => ExternalCrystal32Mhz,
            0xc => ExternalClock8MhzOscoutInverted,
            0xd => ExternalClock16MhzOscoutInverted,
            0xe => ExternalClock24MhzOscoutInverted,
            0xf => ExternalClock32MhzOscoutInverted,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Reaction to the switch input
pub enum SwitchMode {
    /// A switch closing event stops the motor
    HardStop = 0x00,
    /// Switch events are only reported
    User = 0x10,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Output slew rate, in V/µs
pub enum SlewRate {
    /// 180V/µs
    V180 = 0b00,
    /// 290V/µs
    V290 = 0b10,
    /// 530V/µs
    V530 = 0b11,
}

impl SlewRate {
    fn from_bits(bits: u16) -> Option<Self> {
        Some(match bits {
            0b00 => SlewRate::V180,
            0b10 => SlewRate::V290,
            0b11 => SlewRate::V530,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// PWM frequency multiplication factor (F_PWM_DEC)
pub enum PwmMultiplier {
    /// × 0.625
    X0_625 = 0,
    /// × 0.75
    X0_75 = 1,
    /// × 0.875
    X0_875 = 2,
    /// × 1
    X1 = 3,
    /// × 1.25
    X1_25 = 4,
    /// × 1.5
    X1_5 = 5,
    /// × 1.75
    X1_75 = 6,
    /// × 2
    X2 = 7,
}

impl PwmMultiplier {
    fn from_bits(bits: u16) -> Option<Self> {
        use PwmMultiplier::*;

        [X0_625, X0_75, X0_875, X1, X1_25, X1_5, X1_75, X2]
            .get(bits as usize)
            .copied()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// PWM frequency division factor (F_PWM_INT)
pub enum PwmDivisor {
    /// ÷ 1
    Div1 = 0,
    /// ÷ 2
    Div2 = 1,
    /// ÷ 3
    Div3 = 2,
    /// ÷ 4
    Div4 = 3,
    /// ÷ 5
    Div5 = 4,
    /// ÷ 6
    Div6 = 5,
    /// ÷ 7
    Div7 = 6,
}

impl PwmDivisor {
    fn from_bits(bits: u16) -> Option<Self> {
        use PwmDivisor::*;

        [Div1, Div2, Div3, Div4, Div5, Div6, Div7]
            .get(bits as usize)
            .copied()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Micro-stepping resolution (STEP_SEL)
pub enum StepSel {
    /// Full step
    Full = 0,
    /// Half step
    Half = 1,
    /// 1/4 micro-step
    Micro4 = 2,
    /// 1/8 micro-step
    Micro8 = 3,
    /// 1/16 micro-step
    Micro16 = 4,
    /// 1/32 micro-step
    Micro32 = 5,
    /// 1/64 micro-step
    Micro64 = 6,
    /// 1/128 micro-step
    Micro128 = 7,
}

impl Default for StepSel {
    fn default() -> Self {
        StepSel::Micro128
    }
}

impl StepSel {
    /// Selects the setting for a number of micro-steps per full step
    pub fn from_microsteps(microsteps: u16) -> Result<Self, ParameterError> {
        use StepSel::*;

        Ok(match microsteps {
            1 => Full,
            2 => Half,
            4 => Micro4,
            8 => Micro8,
            16 => Micro16,
            32 => Micro32,
            64 => Micro64,
            128 => Micro128,
            _ => return Err(ParameterError::InvalidMicrosteps(microsteps)),
        })
    }

    /// Number of micro-steps per full step
    pub fn microsteps(&self) -> u16 {
        1 << *self as u16
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Frequency of the BUSY/SYNC output in SYNC mode, relative to full steps
pub enum SyncSelect {
    /// Half the full-step frequency
    #[default]
    Half = 0x00,
    /// Full-step frequency
    X1 = 0x10,
    /// Twice the full-step frequency
    X2 = 0x20,
    /// 4 times
    X4 = 0x30,
    /// 8 times
    X8 = 0x40,
    /// 16 times
    X16 = 0x50,
    /// 32 times
    X32 = 0x60,
    /// 64 times
    X64 = 0x70,
}

/// The STEP_MODE register
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepMode {
    /// Micro-stepping resolution
    pub step_sel: StepSel,
    /// Turns the BUSY output into a SYNC output
    pub sync_enable: bool,
    /// SYNC output frequency
    pub sync_sel: SyncSelect,
}

impl StepMode {
    const SYNC_EN: u8 = 0x80;

    /// The register value for this step mode
    pub fn value(&self) -> u8 {
        let sync = if self.sync_enable { Self::SYNC_EN } else { 0 };
        self.step_sel as u8 | self.sync_sel as u8 | sync
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
/// Overcurrent detection threshold, in mA
pub enum OverCurrentThreshold {
    Ma375 = 0x0,
    Ma750 = 0x1,
    Ma1125 = 0x2,
    Ma1500 = 0x3,
    Ma1875 = 0x4,
    Ma2250 = 0x5,
    Ma2625 = 0x6,
    Ma3000 = 0x7,
    Ma3375 = 0x8,
    Ma3750 = 0x9,
    Ma4125 = 0xa,
    Ma4500 = 0xb,
    Ma4875 = 0xc,
    Ma5250 = 0xd,
    Ma5625 = 0xe,
    Ma6000 = 0xf,
}

impl Default for OverCurrentThreshold {
    fn default() -> Self {
        OverCurrentThreshold::Ma3375
    }
}

impl OverCurrentThreshold {
    /// The threshold current, in mA
    pub fn milliamps(&self) -> u16 {
        (*self as u16 + 1) * 375
    }
}

/// The alarms that drive the FLAG output (ALARM_EN)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlarmEnable(pub u8);

impl AlarmEnable {
    /// No alarm
    pub const NONE: Self = AlarmEnable(0x00);
    /// Overcurrent
    pub const OVERCURRENT: Self = AlarmEnable(0x01);
    /// Thermal shutdown
    pub const THERMAL_SHUTDOWN: Self = AlarmEnable(0x02);
    /// Thermal warning
    pub const THERMAL_WARNING: Self = AlarmEnable(0x04);
    /// Undervoltage
    pub const UNDERVOLTAGE: Self = AlarmEnable(0x08);
    /// Stall on bridge A
    pub const STALL_A: Self = AlarmEnable(0x10);
    /// Stall on bridge B
    pub const STALL_B: Self = AlarmEnable(0x20);
    /// Switch turn-on event
    pub const SWITCH_TURN_ON: Self = AlarmEnable(0x40);
    /// Wrong or non performable command
    pub const WRONG_OR_NOT_PERFORMED_COMMAND: Self = AlarmEnable(0x80);
    /// Every alarm
    pub const ALL: Self = AlarmEnable(0xff);

    /// Whether all the alarms of `other` are enabled
    pub fn contains(&self, other: AlarmEnable) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for AlarmEnable {
    fn default() -> Self {
        AlarmEnable::ALL
    }
}

impl BitOr for AlarmEnable {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        AlarmEnable(self.0 | rhs.0)
    }
}

/// A complete motion profile
///
/// Speeds are in steps/s and accelerations in steps/s², micro-stepping
/// included. They're converted to register values when written.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorConfig {
    /// Acceleration
    pub acceleration: f32,
    /// Deceleration
    pub deceleration: f32,
    /// Maximum speed
    pub max_speed: f32,
    /// Minimum speed
    pub min_speed: f32,
    /// Speed above which the motor switches to full step
    pub full_step_speed: f32,
    /// Holding KVAL
    pub kval_hold: u8,
    /// Constant speed KVAL
    pub kval_run: u8,
    /// Acceleration KVAL
    pub kval_acc: u8,
    /// Deceleration KVAL
    pub kval_dec: u8,
    /// Micro-stepping
    pub step_mode: StepMode,
    /// Overcurrent threshold
    pub overcurrent_threshold: OverCurrentThreshold,
    /// Stall detection threshold, in 31.25mA steps
    pub stall_threshold: u8,
    /// Low speed optimization (LSPD_OPT bit of MIN_SPEED)
    pub low_speed_optimization: bool,
    /// Enabled alarms
    pub alarms: AlarmEnable,
    /// IC configuration
    pub config: Config,
}

impl Default for MotorConfig {
    /// Values close to the chip reset values
    fn default() -> Self {
        MotorConfig {
            acceleration: 1000.0,
            deceleration: 1000.0,
            max_speed: 1000.0,
            min_speed: 0.0,
            full_step_speed: 600.0,
            kval_hold: 0x29,
            kval_run: 0x29,
            kval_acc: 0x29,
            kval_dec: 0x29,
            step_mode: StepMode::default(),
            overcurrent_threshold: OverCurrentThreshold::default(),
            stall_threshold: 0x40,
            low_speed_optimization: false,
            alarms: AlarmEnable::default(),
            config: Config::default(),
        }
    }
}

impl MotorConfig {
    /// Number of register writes needed to apply the profile
    pub const REGISTER_COUNT: usize = 14;

    /// The register writes applying the profile, in the order they should
    /// be performed
    pub fn register_writes(&self) -> [(Register, i64); Self::REGISTER_COUNT] {
        let mut min_speed = registers::min_spd_calc(self.min_speed);
        if self.low_speed_optimization {
            min_speed |= registers::LSPD_OPT;
        }

        [
            (registers::ACC, registers::acc_calc(self.acceleration).into()),
            (registers::DEC, registers::dec_calc(self.deceleration).into()),
            (registers::MAX_SPEED, registers::max_spd_calc(self.max_speed).into()),
            (registers::MIN_SPEED, min_speed.into()),
            (registers::FS_SPD, registers::fs_spd_calc(self.full_step_speed).into()),
            (registers::KVAL_HOLD, self.kval_hold.into()),
            (registers::KVAL_RUN, self.kval_run.into()),
            (registers::KVAL_ACC, self.kval_acc.into()),
            (registers::KVAL_DEC, self.kval_dec.into()),
            (registers::STEP_MODE, self.step_mode.value().into()),
            (registers::OCD_TH, (self.overcurrent_threshold as u8).into()),
            (registers::STALL_TH, self.stall_threshold.into()),
            (registers::ALARM_EN, self.alarms.0.into()),
            (registers::CONFIG, self.config.value().into()),
        ]
    }
}

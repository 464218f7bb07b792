//! Register catalog and value codec
//!
//! The dSPIN exposes a flat space of 5-bit addressed registers, each with its
//! own bit width (anything from 4 to 22 bits on the L6470). Values travel on
//! the wire MSB first, using the minimum number of whole bytes able to hold
//! the register width.
//!
//! The catalog is a set of constant [`Register`] descriptors. They are plain
//! `Copy` values, so they can be passed around freely and shared by every
//! device of a daisy chain.
//!
//! **NOTE**: Values passed to [`Register::encode`] are silently truncated to
//! the register width. Negative values keep their two's complement bit
//! pattern, which is exactly how the chip expects signed registers to be
//! written.

use core::fmt;

#[allow(unused_imports)]
use num_traits::float::FloatCore;

use crate::command::Frame;

/// Describes a dSPIN register
#[derive(Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register {
    name: &'static str,
    address: u8,
    width: u8,
    signed: bool,
    reset_value: i64,
    read_only: bool,
}

impl Register {
    /// Creates a register descriptor
    ///
    /// # Panics
    ///
    /// Panics if `address` doesn't fit in 5 bits or if `width` is not in
    /// `1..=32`. When used to define a constant, this turns into a compile
    /// time error.
    pub const fn new(
        name: &'static str,
        address: u8,
        width: u8,
        signed: bool,
        reset_value: i64,
        read_only: bool,
    ) -> Self {
        assert!(address <= 0x1f, "register address must fit in 5 bits");
        assert!(width >= 1 && width <= 32, "register width must be in 1..=32");

        Register {
            name,
            address,
            width,
            signed,
            reset_value,
            read_only,
        }
    }

    /// The register name, as used in the datasheet
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The 5-bit register address
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// The register width, in bits
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Whether the content is a two's complement signed integer
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// The register content after a chip reset
    pub const fn reset_value(&self) -> i64 {
        self.reset_value
    }

    /// Whether the register can only be read
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of bytes used to carry a value of this register on the wire
    pub const fn byte_len(&self) -> usize {
        (self.width as usize + 7) / 8
    }

    /// The mask selecting the register bits, which is also the largest
    /// unsigned value the register can hold
    pub const fn mask(&self) -> u32 {
        u32::MAX >> (32 - self.width as u32)
    }

    /// Encodes a value into its MSB first wire representation
    ///
    /// The returned frame is always `byte_len()` long.
    pub const fn encode(&self, value: i64) -> Frame {
        let len = self.byte_len();
        let mut frame = Frame::zeroed(len);

        if value == 0 {
            return frame;
        }

        let mut value = (value as u64) & self.mask() as u64;
        let mut i = len;
        while i > 0 {
            i -= 1;
            frame = frame.with_byte(i, (value & 0xff) as u8);
            value >>= 8;
        }

        frame
    }

    /// Decodes a register value from its MSB first wire representation
    ///
    /// Signed registers are sign-extended from bit `width - 1`.
    pub fn decode(&self, bytes: &[u8]) -> i64 {
        let raw = bytes
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
            & u64::from(self.mask());

        if self.signed && raw & (1 << (self.width - 1)) != 0 {
            raw as i64 - (1i64 << self.width)
        } else {
            raw as i64
        }
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}(0x{:02x}, {} bits{}{})",
            self.name,
            self.address,
            self.width,
            if self.signed { ", signed" } else { "" },
            if self.read_only { ", ro" } else { "" },
        )
    }
}

/// Generates the register catalog
macro_rules! impl_registers {
    (
        $(
            #[$doc:meta]
            $name:ident, $address:expr, $width:expr, $signed:expr, $reset:expr, $ro:expr;
        )*
    ) => {
        $(
            #[$doc]
            pub const $name: Register =
                Register::new(stringify!($name), $address, $width, $signed, $reset, $ro);
        )*

        /// Every register of the chip, in address order
        pub const ALL: &[Register] = &[$($name,)*];
    };
}

impl_registers! {
    /// Current absolute position
    ABS_POS,    0x01, 22, true,  0x000000, false;
    /// Electrical position (step and micro-step)
    EL_POS,     0x02,  9, false, 0x000,    false;
    /// Mark position
    MARK,       0x03, 22, false, 0x000000, false;
    /// Current speed
    SPEED,      0x04, 20, false, 0x00000,  true;
    /// Acceleration
    ACC,        0x05, 12, false, 0x08a,    false;
    /// Deceleration
    DEC,        0x06, 12, false, 0x08a,    false;
    /// Maximum speed
    MAX_SPEED,  0x07, 10, false, 0x041,    false;
    /// Minimum speed, with the low speed optimization flag in bit 12
    MIN_SPEED,  0x08, 13, false, 0x000,    false;
    /// Holding KVAL
    KVAL_HOLD,  0x09,  8, false, 0x29,     false;
    /// Constant speed KVAL
    KVAL_RUN,   0x0a,  8, false, 0x29,     false;
    /// Acceleration starting KVAL
    KVAL_ACC,   0x0b,  8, false, 0x29,     false;
    /// Deceleration starting KVAL
    KVAL_DEC,   0x0c,  8, false, 0x29,     false;
    /// Intersect speed
    INT_SPD,    0x0d, 14, false, 0x0408,   false;
    /// Start slope
    ST_SLP,     0x0e,  8, false, 0x19,     false;
    /// Acceleration final slope
    FN_SLP_ACC, 0x0f,  8, false, 0x29,     false;
    /// Deceleration final slope
    FN_SLP_DEC, 0x10,  8, false, 0x29,     false;
    /// Thermal compensation factor
    K_THERM,    0x11,  4, false, 0x0,      false;
    /// ADC output
    ADC_OUT,    0x12,  5, false, 0x00,     true;
    /// Overcurrent threshold
    OCD_TH,     0x13,  4, false, 0x8,      false;
    /// Stall detection threshold
    STALL_TH,   0x14,  7, false, 0x40,     false;
    /// Full-step speed
    FS_SPD,     0x15, 10, false, 0x027,    false;
    /// Step mode
    STEP_MODE,  0x16,  8, false, 0x07,     false;
    /// Alarm enables
    ALARM_EN,   0x17,  8, false, 0xff,     false;
    /// IC configuration
    CONFIG,     0x18, 16, false, 0x2e88,   false;
    /// Status
    STATUS,     0x19, 16, false, 0x0000,   true;
}

/// Looks a register up by its datasheet name
pub fn by_name(name: &str) -> Option<Register> {
    ALL.iter().copied().find(|r| r.name == name)
}

/// Looks a register up by its address
pub fn by_address(address: u8) -> Option<Register> {
    ALL.iter().copied().find(|r| r.address == address)
}

/// Largest raw MIN_SPEED value; bit 12 of the register is LSPD_OPT
pub const MIN_SPEED_MASK: u32 = 0x0fff;

/// The low speed optimization bit of MIN_SPEED
pub const LSPD_OPT: u32 = 0x1000;

/// Largest speed accepted by the motion commands, in steps/s
pub const SPEED_MAX: u32 = 0x3f_ffff;

fn scale(value: f32, factor: f64, offset: f64, max: u32) -> u32 {
    let raw = (f64::from(value).abs() * factor - offset).floor();

    if raw <= 0.0 {
        0
    } else if raw >= f64::from(max) {
        max
    } else {
        raw as u32
    }
}

/// Converts an acceleration in steps/s² into an ACC register value
pub fn acc_calc(steps_per_sec_per_sec: f32) -> u32 {
    scale(steps_per_sec_per_sec, 0.137438, 0.0, ACC.mask())
}

/// Converts a deceleration in steps/s² into a DEC register value
pub fn dec_calc(steps_per_sec_per_sec: f32) -> u32 {
    scale(steps_per_sec_per_sec, 0.137438, 0.0, DEC.mask())
}

/// Converts a speed in steps/s into a MAX_SPEED register value
pub fn max_spd_calc(steps_per_sec: f32) -> u32 {
    scale(steps_per_sec, 0.065536, 0.0, MAX_SPEED.mask())
}

/// Converts a speed in steps/s into a MIN_SPEED register value
///
/// The result never touches the LSPD_OPT bit.
pub fn min_spd_calc(steps_per_sec: f32) -> u32 {
    scale(steps_per_sec, 4.1943, 0.0, MIN_SPEED_MASK)
}

/// Converts a speed in steps/s into a FS_SPD register value
pub fn fs_spd_calc(steps_per_sec: f32) -> u32 {
    scale(steps_per_sec, 0.065536, 0.5, FS_SPD.mask())
}

/// Converts a speed in steps/s into an INT_SPD register value
pub fn int_spd_calc(steps_per_sec: f32) -> u32 {
    scale(steps_per_sec, 4.1943, 0.0, INT_SPD.mask())
}

/// Converts a speed in steps/s into a SPEED register value, as used by the
/// Run and GoUntil commands
pub fn spd_calc(steps_per_sec: f32) -> u32 {
    scale(steps_per_sec, 67.106, 0.0, SPEED.mask())
}

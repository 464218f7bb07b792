//! Control lines of a dSPIN
//!
//! Besides the SPI bus, the driver uses two signals: the STBY/RST output,
//! which holds the chip in reset while low, and the open-drain BUSY output of
//! the chip, which is low while a motion command is running. It also needs a
//! way to wait between polls.
//!
//! All devices of a daisy chain share these lines.

use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorKind, InputPin, OutputPin},
};

/// Access to the STBY/RST and BUSY lines, and to a delay source
pub trait ControlLines {
    /// Drives STBY/RST: `true` puts the chip in standby (line low)
    fn set_standby(&mut self, standby: bool) -> Result<(), ErrorKind>;

    /// Whether the BUSY line signals a running command
    fn is_busy(&mut self) -> Result<bool, ErrorKind>;

    /// Blocks for the given number of milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Puts the chip in standby
    fn standby(&mut self) -> Result<(), ErrorKind> {
        self.set_standby(true)
    }

    /// Releases the chip from standby
    fn awake(&mut self) -> Result<(), ErrorKind> {
        self.set_standby(false)
    }
}

/// [`ControlLines`] on top of `embedded-hal` pins and delay
pub struct GpioLines<STBY, BUSY, D> {
    standby: STBY,
    busy: BUSY,
    delay: D,
}

impl<STBY, BUSY, D> GpioLines<STBY, BUSY, D>
where
    STBY: OutputPin,
    BUSY: InputPin,
    D: DelayNs,
{
    /// Bundles the STBY/RST output, the BUSY input and a delay
    ///
    /// The pins must already be configured in the right mode.
    pub fn new(standby: STBY, busy: BUSY, delay: D) -> Self {
        GpioLines {
            standby,
            busy,
            delay,
        }
    }

    /// Gives the pins and the delay back
    pub fn release(self) -> (STBY, BUSY, D) {
        (self.standby, self.busy, self.delay)
    }
}

impl<STBY, BUSY, D> ControlLines for GpioLines<STBY, BUSY, D>
where
    STBY: OutputPin,
    BUSY: InputPin,
    D: DelayNs,
{
    fn set_standby(&mut self, standby: bool) -> Result<(), ErrorKind> {
        if standby {
            self.standby.set_low().map_err(|e| e.kind())
        } else {
            self.standby.set_high().map_err(|e| e.kind())
        }
    }

    fn is_busy(&mut self) -> Result<bool, ErrorKind> {
        self.busy.is_low().map_err(|e| e.kind())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms)
    }
}

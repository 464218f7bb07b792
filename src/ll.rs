//! Low-level interface to the dSPIN
//!
//! This module moves raw requests over the bus and drives the control lines.
//! It knows nothing about the chip state; the [high-level interface] builds
//! on it, and so does the [daisy chain] driver.
//!
//! Two chip select framings are used:
//!
//! - bytewise: every byte gets its own chip select pulse, which is how the
//!   chip expects the fixed one-byte opcodes and their replies;
//! - held: chip select stays asserted for the whole buffer, as needed by
//!   multi-byte parametric commands and by daisy chain columns.
//!
//! [high-level interface]: ../hl/index.html
//! [daisy chain]: ../chain/index.html

use core::fmt;

use embedded_hal::{
    digital::ErrorKind,
    spi::{self, SpiDevice},
};

use crate::{
    command::{Command, Frame},
    lines::ControlLines,
};

/// Entry point to the dSPIN driver's low-level API
///
/// Please consider using [hl::DSpin] instead.
///
/// [hl::DSpin]: ../hl/struct.DSpin.html
pub struct DSpin<SPI, IO> {
    spi: SPI,
    io: IO,
}

impl<SPI, IO> DSpin<SPI, IO> {
    /// Create a new instance of `DSpin`
    ///
    /// Requires the SPI device the chip (or the chain) is connected to, and
    /// its control lines.
    pub fn new(spi: SPI, io: IO) -> Self {
        DSpin { spi, io }
    }

    /// Allow access to the SPI bus
    pub fn bus(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Allow access to the control lines
    pub fn lines(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Gives the bus and the control lines back
    pub fn release(self) -> (SPI, IO) {
        (self.spi, self.io)
    }
}

impl<SPI, IO> DSpin<SPI, IO>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Exchanges a buffer, with a chip select pulse per byte
    pub fn transfer_bytewise(&mut self, buffer: &mut [u8]) -> Result<(), Error<SPI>> {
        for byte in buffer.iter_mut() {
            self.spi
                .transfer_in_place(core::slice::from_mut(byte))
                .map_err(Error::Spi)?;
        }
        Ok(())
    }

    /// Exchanges a buffer, keeping chip select asserted all along
    pub fn transfer_message(&mut self, buffer: &mut [u8]) -> Result<(), Error<SPI>> {
        self.spi.transfer_in_place(buffer).map_err(Error::Spi)
    }

    /// Sends a command and returns the bytes clocked out by the chip
    ///
    /// The reply has the length of the request. Its first byte is the one
    /// received while the opcode was sent and carries no information.
    pub fn exchange(&mut self, command: &Command) -> Result<Frame, Error<SPI>> {
        let request = command.render();
        let mut reply = request;

        if command.is_bytewise() {
            self.transfer_bytewise(reply.as_mut_bytes())?;
        } else {
            self.transfer_message(reply.as_mut_bytes())?;
        }

        trace!("exchange {:?} -> {:?}", request, reply);
        Ok(reply)
    }

    /// Drives STBY/RST
    pub fn set_standby(&mut self, standby: bool) -> Result<(), Error<SPI>> {
        self.io.set_standby(standby).map_err(Error::Lines)
    }

    /// Reads the BUSY line
    pub fn is_busy(&mut self) -> Result<bool, Error<SPI>> {
        self.io.is_busy().map_err(Error::Lines)
    }

    /// Waits for the given number of milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.io.delay_ms(ms)
    }
}

/// An error that can occur when talking to the chip
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// SPI error occured during a transfer
    Spi(SPI::Error),

    /// Error occured while using the STBY/RST or BUSY line
    Lines(ErrorKind),
}

// We can't derive this implementation, as the compiler will complain that the
// associated error type doesn't implement `Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::Lines(error) => write!(f, "Lines({:?})", error),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(_) => defmt::write!(f, "Spi()"),
            Error::Lines(_) => defmt::write!(f, "Lines()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::{GetParam, Run, SimpleOpcode, NOP_2},
        registers,
        sim::SimulatedLines,
        Direction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    #[test]
    fn simple_commands_are_sent_bytewise() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0xd0], vec![0x00]),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x00], vec![0x7e]),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x00], vec![0x03]),
            SpiTransaction::transaction_end(),
        ];
        let spi = SpiMock::new(&expectations);
        let mut dspin = DSpin::new(spi, SimulatedLines::new());

        let reply = dspin.exchange(&SimpleOpcode::GetStatus.into()).unwrap();
        assert_eq!(reply.as_bytes(), &[0x00, 0x7e, 0x03]);
        assert_eq!(reply.payload(), &[0x7e, 0x03]);

        dspin.bus().done();
    }

    #[test]
    fn nop_is_sent_bytewise() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x00], vec![0x00]),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x00], vec![0x00]),
            SpiTransaction::transaction_end(),
        ];
        let spi = SpiMock::new(&expectations);
        let mut dspin = DSpin::new(spi, SimulatedLines::new());

        dspin.exchange(&NOP_2).unwrap();

        dspin.bus().done();
    }

    #[test]
    fn parametric_commands_hold_chip_select() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(
                vec![0x51, 0x00, 0x00, 0x43],
                vec![0x00, 0x00, 0x00, 0x00],
            ),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x27, 0x00, 0x00], vec![0x00, 0x01, 0xf4]),
            SpiTransaction::transaction_end(),
        ];
        let spi = SpiMock::new(&expectations);
        let mut dspin = DSpin::new(spi, SimulatedLines::new());

        let run = Run::new(Direction::Forward, 1).unwrap();
        dspin.exchange(&run.into()).unwrap();

        let reply = dspin
            .exchange(&GetParam::new(registers::MAX_SPEED).into())
            .unwrap();
        assert_eq!(registers::MAX_SPEED.decode(reply.payload()), 500);

        dspin.bus().done();
    }

    #[test]
    fn control_lines_are_forwarded() {
        let spi = SpiMock::<u8>::new(&[]);
        let mut dspin = DSpin::new(spi, SimulatedLines::new());

        dspin.set_standby(true).unwrap();
        assert!(dspin.lines().in_standby());
        dspin.set_standby(false).unwrap();
        assert!(!dspin.lines().in_standby());

        dspin.lines().set_busy_polls(1);
        assert!(dspin.is_busy().unwrap());
        assert!(!dspin.is_busy().unwrap());

        dspin.delay_ms(3);
        assert_eq!(dspin.lines().elapsed_ms(), 3);

        let (mut spi, _) = dspin.release();
        spi.done();
    }
}

use embedded_hal::spi::SpiDevice;

use super::{DSpin, PoweredOn, Ready, Startup};
use crate::{lines::ControlLines, registers, Error};

impl<SPI, IO> DSpin<SPI, IO, PoweredOn>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Checks that the chip holds its reset configuration
    ///
    /// CONFIG is compared to its reset value. A mismatch means the chip
    /// wasn't reset, or doesn't answer properly.
    pub fn verify_reset(&mut self) -> Result<bool, Error<SPI>> {
        let config = self.read_register(registers::CONFIG)?;
        let expected = registers::CONFIG.reset_value();

        if config != expected {
            error!("CONFIG is {} after reset, expected {}", config, expected);
            return Ok(false);
        }

        Ok(true)
    }

    /// Checks the reset state and leaves the chip idle
    ///
    /// On success the bridges are in high impedance and the latched status
    /// flags are cleared. If the reset check fails, nothing else is sent and
    /// the driver is handed back as is.
    pub fn prepare(mut self) -> Result<Startup<SPI, IO>, Error<SPI>> {
        if !self.verify_reset()? {
            return Ok(Startup::ResetFailed(self));
        }

        self.hard_hiz()?;
        self.clear_status()?;
        info!("ready");

        Ok(Startup::Ready(DSpin {
            ll: self.ll,
            state: Ready,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        hl::Uninitialized,
        sim::{SimulatedChip, SimulatedLines},
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn bytewise(byte: u8, reply: u8) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![byte], vec![reply]),
            SpiTransaction::transaction_end(),
        ]
    }

    #[test]
    fn prepare_wire_sequence() {
        let mut expectations = vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x38, 0x00, 0x00], vec![0x00, 0x2e, 0x88]),
            SpiTransaction::transaction_end(),
        ];
        expectations.extend(bytewise(0xa8, 0x00));
        expectations.extend(bytewise(0xd0, 0x00));
        expectations.extend(bytewise(0x00, 0x7c));
        expectations.extend(bytewise(0x00, 0x03));
        let spi = SpiMock::new(&expectations);

        let dspin = DSpin::<_, _, Uninitialized>::new(spi, SimulatedLines::new());
        let startup = dspin.power_on().unwrap().prepare().unwrap();

        let mut dspin = startup.ready().unwrap();
        dspin.ll().bus().done();
    }

    #[test]
    fn unexpected_config_is_reported() {
        let mut chip = SimulatedChip::<1>::new();
        chip.device_mut(0).set_register(registers::CONFIG, 0x2e89);
        let dspin = DSpin::new(chip, SimulatedLines::new());

        let mut dspin = dspin.power_on().unwrap();
        assert!(!dspin.verify_reset().unwrap());

        let startup = dspin.prepare().unwrap();
        assert!(!startup.is_ready());

        let mut dspin = match startup {
            Startup::ResetFailed(dspin) => dspin,
            Startup::Ready(_) => unreachable!(),
        };
        // Only the two CONFIG reads reached the chip
        assert_eq!(dspin.ll().bus().device(0).command_count(), 2);

        // A software reset brings the chip back to a known state
        dspin.reset_device().unwrap();
        assert!(dspin.prepare().unwrap().is_ready());
    }

    #[test]
    fn prepare_leaves_chip_idle() {
        let dspin = DSpin::new(SimulatedChip::<1>::new(), SimulatedLines::new());

        let mut dspin = dspin.initialize().unwrap().ready().unwrap();

        let status = dspin.ll().bus().device(0).status();
        assert!(status.hiz());
        assert!(!status.undervoltage());
        assert_eq!(
            dspin.ll().bus().device(0).last_command(),
            Some(crate::command::opcode::GET_STATUS)
        );
    }
}

use embedded_hal::spi::SpiDevice;

use super::{DSpin, PoweredOn, Startup, Uninitialized, STANDBY_SETTLING_MS};
use crate::{ll, lines::ControlLines, Error};

impl<SPI, IO> DSpin<SPI, IO, Uninitialized>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Create a new instance of `DSpin`
    ///
    /// Requires the SPI device the chip is connected to, and its control
    /// lines. Nothing is sent until [`power_on`](Self::power_on) is called.
    pub fn new(spi: SPI, io: IO) -> Self {
        DSpin {
            ll: ll::DSpin::new(spi, io),
            state: Uninitialized,
        }
    }

    /// Brings the chip out of reset
    ///
    /// STBY/RST is pulsed low, so that the chip always goes through a reset
    /// whatever its previous state.
    pub fn power_on(mut self) -> Result<DSpin<SPI, IO, PoweredOn>, Error<SPI>> {
        debug!("power on");

        self.ll.set_standby(false)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);
        self.ll.set_standby(true)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);
        self.ll.set_standby(false)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);

        Ok(DSpin {
            ll: self.ll,
            state: PoweredOn,
        })
    }

    /// Powers the chip on and prepares it
    ///
    /// Shorthand for [`power_on`](Self::power_on) followed by
    /// [`prepare`](DSpin::prepare).
    pub fn initialize(self) -> Result<Startup<SPI, IO>, Error<SPI>> {
        self.power_on()?.prepare()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimulatedChip, SimulatedLines};

    #[test]
    fn power_on_pulses_reset() {
        let dspin = DSpin::new(SimulatedChip::<1>::new(), SimulatedLines::new());

        let mut dspin = dspin.power_on().unwrap();

        let lines = dspin.ll().lines();
        assert!(!lines.in_standby());
        assert_eq!(lines.standby_pulses(), 1);
        assert_eq!(lines.elapsed_ms(), 3 * u64::from(STANDBY_SETTLING_MS));
        assert_eq!(dspin.ll().bus().device(0).command_count(), 0);
    }

    #[test]
    fn initialize_reaches_ready() {
        let dspin = DSpin::new(SimulatedChip::<1>::new(), SimulatedLines::new());

        let startup = dspin.initialize().unwrap();

        assert!(startup.is_ready());
    }
}

use embedded_hal::spi::SpiDevice;

use super::{DSpin, PoweredOn, Standby, STANDBY_SETTLING_MS};
use crate::{lines::ControlLines, Error};

impl<SPI, IO> DSpin<SPI, IO, Standby>
where
    SPI: SpiDevice,
    IO: ControlLines,
{
    /// Releases STBY/RST
    ///
    /// The chip comes back with its reset configuration, and needs to be
    /// [prepared](DSpin::prepare) again.
    pub fn wake(mut self) -> Result<DSpin<SPI, IO, PoweredOn>, Error<SPI>> {
        self.ll.set_standby(false)?;
        self.ll.delay_ms(STANDBY_SETTLING_MS);
        debug!("awake");

        Ok(DSpin {
            ll: self.ll,
            state: PoweredOn,
        })
    }
}

#[cfg(test)]
mod test {
    use crate::{
        hl::DSpin,
        sim::{SimulatedChip, SimulatedLines},
    };

    #[test]
    fn shutdown_and_wake() {
        let dspin = DSpin::new(SimulatedChip::<1>::new(), SimulatedLines::new())
            .initialize()
            .unwrap()
            .ready()
            .unwrap();

        let dspin = dspin.shutdown().unwrap();
        let mut dspin = dspin.wake().unwrap();

        assert!(!dspin.ll().lines().in_standby());
        assert!(dspin.prepare().unwrap().is_ready());
    }
}

use core::fmt;
use core::fmt::{Display, Formatter};

use embedded_hal::spi;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::{command::ParameterError, ll};

/// An error that can occur when driving one or several dSPIN
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occured while using the bus or the control lines
    Bus(ll::Error<SPI>),

    /// A command parameter was rejected before anything was sent
    InvalidParameter(ParameterError),

    /// The number of per-device requests doesn't match the chain length
    ChainLength {
        /// Number of devices in the chain
        expected: usize,
        /// Number of requests provided
        actual: usize,
    },
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        Error::Bus(error)
    }
}

impl<SPI> From<ParameterError> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ParameterError) -> Self {
        Error::InvalidParameter(error)
    }
}

impl<SPI> Display for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<SPI> std::error::Error for Error<SPI> where SPI: spi::ErrorType {}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `ll::Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bus(error) => write!(f, "Bus({:?})", error),
            Error::InvalidParameter(error) => write!(f, "InvalidParameter({:?})", error),
            Error::ChainLength { expected, actual } => write!(
                f,
                "ChainLength {{ expected: {:?}, actual: {:?} }}",
                expected, actual
            ),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Bus(error) => defmt::write!(f, "Bus({:?})", error),
            Error::InvalidParameter(error) => defmt::write!(f, "InvalidParameter({:?})", error),
            Error::ChainLength { expected, actual } => defmt::write!(
                f,
                "ChainLength {{ expected: {:?}, actual: {:?} }}",
                expected,
                actual
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use embedded_hal_mock::eh1::spi::Mock as SpiMock;

    #[test]
    fn parameter_errors_convert() {
        let error: Error<SpiMock<u8>> = ParameterError::SpeedOutOfRange(0).into();

        assert!(matches!(
            error,
            Error::InvalidParameter(ParameterError::SpeedOutOfRange(0))
        ));
    }

    #[test]
    fn debug_output() {
        let error = Error::<SpiMock<u8>>::ChainLength {
            expected: 3,
            actual: 2,
        };

        assert_eq!(
            format!("{:?}", error),
            "ChainLength { expected: 3, actual: 2 }"
        );
        assert_eq!(format!("{}", error), format!("{:?}", error));
    }
}

//! High-level interface to a single dSPIN
//!
//! The entry point to this API is the [DSpin] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to the dSPIN. This is the
//! recommended way to drive a chip wired on its own, unless you need the
//! greater flexibility provided by the [register-level interface]. Chips
//! sharing a bus in a daisy chain are driven through the [chain] module
//! instead.
//!
//! [register-level interface]: ../ll/index.html
//! [chain]: ../chain/index.html

use core::fmt;

#[allow(unused_imports)]
pub use awake::*;
pub use error::*;
#[allow(unused_imports)]
pub use powered_on::*;
#[allow(unused_imports)]
pub use ready::*;
#[allow(unused_imports)]
pub use standby::*;
pub use state_impls::*;
#[allow(unused_imports)]
pub use uninitialized::*;

use crate::ll;

mod awake;
mod error;
mod powered_on;
mod ready;
mod standby;
mod state_impls;
mod uninitialized;

/// Interval between two BUSY polls while waiting for a motion to complete
pub const BUSY_POLL_INTERVAL_MS: u32 = 100;

/// Settling time after a STBY/RST transition
pub const STANDBY_SETTLING_MS: u32 = 1;

/// Entry point to the dSPIN driver API
///
/// The driver is a state machine, the state being encoded in the `State`
/// type parameter:
///
/// - [`Uninitialized`]: just created, the chip may be held in reset;
/// - [`PoweredOn`]: out of reset, but the reset state hasn't been checked;
/// - [`Ready`]: checked and idle, ready to move;
/// - [`Standby`]: held in reset after a shutdown.
pub struct DSpin<SPI, IO, State> {
    ll: ll::DSpin<SPI, IO>,
    state: State,
}

impl<SPI, IO, State> DSpin<SPI, IO, State> {
    /// The current state
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Gives the bus and the control lines back
    pub fn release(self) -> (SPI, IO) {
        self.ll.release()
    }
}

// Can't be derived without putting requirements on `SPI` and `IO`.
impl<SPI, IO, State> fmt::Debug for DSpin<SPI, IO, State>
where
    State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DSpin {{ state: ")?;
        self.state.fmt(f)?;
        write!(f, ", .. }}")?;

        Ok(())
    }
}

/// How a motion command waits for the motor to stop
pub enum Wait<'a, T> {
    /// Return once the command is sent
    Skip,

    /// Block until BUSY is released
    Complete,

    /// Block until BUSY is released, calling the closure before every poll
    /// interval
    Progress(&'a mut dyn FnMut(&mut T)),
}

impl<'a, T> Default for Wait<'a, T> {
    fn default() -> Self {
        Wait::Complete
    }
}

/// Outcome of the startup sequence
///
/// A chip whose registers don't hold their reset values after power-on is
/// probably not wired correctly, or wasn't actually reset. This is reported
/// as a regular outcome, so that the caller decides what to do with it.
pub enum Startup<SPI, IO> {
    /// The chip is ready
    Ready(DSpin<SPI, IO, Ready>),

    /// The chip didn't come out of reset in the expected state
    ResetFailed(DSpin<SPI, IO, PoweredOn>),
}

impl<SPI, IO> Startup<SPI, IO> {
    /// Whether the startup succeeded
    pub fn is_ready(&self) -> bool {
        matches!(self, Startup::Ready(_))
    }

    /// Returns the ready driver, if any
    pub fn ready(self) -> Option<DSpin<SPI, IO, Ready>> {
        match self {
            Startup::Ready(dspin) => Some(dspin),
            Startup::ResetFailed(_) => None,
        }
    }
}

impl<SPI, IO> fmt::Debug for Startup<SPI, IO> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Startup::Ready(dspin) => write!(f, "Ready({:?})", dspin),
            Startup::ResetFailed(dspin) => write!(f, "ResetFailed({:?})", dspin),
        }
    }
}

//! Driver crate for the dSPIN (L6470) stepper motor controller
//!
//! A chip wired on its own is best driven through the [high-level interface].
//! Chips sharing a chip select in a daisy chain are driven through the
//! [chain] module. If you require a higher degree of flexibility, you can use
//! the [register-level interface] and the [command] model directly.
//!
//! This driver is built on top of [`embedded-hal`], which means it is portable
//! and can be used on any platform that implements the `embedded-hal` API.
//! The [sim] module provides simulated chips and control lines, to try the
//! driver without hardware.
//!
//! [high-level interface]: hl/index.html
//! [register-level interface]: ll/index.html
//! [chain]: chain/index.html
//! [command]: command/index.html
//! [sim]: sim/index.html
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod chain;
pub mod command;
pub mod configs;
pub mod hl;
pub mod lines;
pub mod ll;
pub mod registers;
pub mod sim;
pub mod status;

/// Redirection of nb::block
pub mod block {
    pub use nb::block;
}

pub use crate::{
    block::block,
    chain::{ChainStartup, DaisyChain, Devices, Values},
    command::{Action, Command, Direction, Frame, ParameterError},
    configs::{Config, MotorConfig},
    hl::{DSpin, Error, PoweredOn, Ready, Standby, Startup, Uninitialized, Wait},
    lines::{ControlLines, GpioLines},
    registers::Register,
    status::Status,
};

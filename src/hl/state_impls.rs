//! State types of the [`DSpin`](super::DSpin) driver

/// Indicates that the `DSpin` instance is not initialized yet
#[derive(Debug)]
pub struct Uninitialized;

/// Indicates that the chip is out of reset, but its state wasn't checked
#[derive(Debug)]
pub struct PoweredOn;

/// Indicates that the `DSpin` instance is ready to be used
#[derive(Debug)]
pub struct Ready;

/// Indicates that the chip is held in reset through STBY/RST
#[derive(Debug)]
pub struct Standby;

/// Any state in which the chip answers on the bus
pub trait Awake {}

impl Awake for PoweredOn {}
impl Awake for Ready {}

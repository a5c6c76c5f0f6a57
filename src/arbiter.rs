/*!
    direction control of the half-duplex bus

    local transmit and local receive exclude each other on the shared line: receiving while transmitting would capture our own echo, and switching to receive before the last byte left the shifter would cut it.
*/

use embedded_io::Write;
use log::*;


/// current use of the bus by the bridge
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// receiver and its interrupt enabled, transmitter disabled
    Receive,
    /// transmitter enabled, receiver and its interrupt disabled
    Transmit,
}

/**
    uart driving the actuator bus

    [Write::write] must block until the transmitter accepted the bytes, and [Write::flush] until they are all physically sent.
*/
pub trait BusPort: Write {
    /// enable one side of the uart and disable the other, along with the matching interrupts and line driver
    fn set_direction(&mut self, direction: Direction);
    /// reconfigure the line speed
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), Self::Error>;
    /// called repeatedly while busy-waiting for bus bytes
    fn idle(&mut self) {
        core::hint::spin_loop();
    }
}


/// owns the bus port and tracks which direction it is set to
pub struct Arbiter<P> {
    port: P,
    direction: Direction,
}
impl<P: BusPort> Arbiter<P> {
    /// take control of the port, listening by default
    pub fn new(mut port: P) -> Self {
        port.set_direction(Direction::Receive);
        Self {port, direction: Direction::Receive}
    }
    pub fn direction(&self) -> Direction {self.direction}
    pub fn port(&mut self) -> &mut P {&mut self.port}
    pub fn into_port(self) -> P {self.port}

    /// stop listening and enable the transmitter
    pub fn switch_to_transmit(&mut self) {
        if self.direction != Direction::Transmit {
            trace!("bus to transmit");
            self.port.set_direction(Direction::Transmit);
            self.direction = Direction::Transmit;
        }
    }
    /// wait for all pending bytes to leave, then listen again
    pub fn switch_to_receive(&mut self) -> Result<(), P::Error> {
        if self.direction != Direction::Receive {
            self.port.flush()?;
            trace!("bus to receive");
            self.port.set_direction(Direction::Receive);
            self.direction = Direction::Receive;
        }
        Ok(())
    }
    /// send bytes on the bus, taking the line if needed
    pub fn transmit(&mut self, bytes: &[u8]) -> Result<(), P::Error> {
        if bytes.is_empty()
            {return Ok(())}
        self.switch_to_transmit();
        self.port.write_all(bytes)
    }
    /// return to listening if the line was left in transmit
    pub fn settle(&mut self) -> Result<(), P::Error> {
        self.switch_to_receive()
    }
}


/**
    uart clock divisor for a baud rate

    the double speed mode halves the receiver oversampling, making it more sensitive to clock mismatch, so it is only used when it lands strictly closer to the requested rate.
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Divisor {
    /// value of the baud rate register
    pub value: u16,
    /// whether the double speed mode is enabled
    pub double_speed: bool,
}
impl Divisor {
    pub fn for_baud(clock: u32, baud: u32) -> Self {
        let baud = baud.max(1);
        let normal = Self::register(clock, baud, 16);
        let double = Self::register(clock, baud, 8);
        let normal_error = baud.abs_diff(Self::actual(clock, normal, 16));
        let double_error = baud.abs_diff(Self::actual(clock, double, 8));
        if normal_error <= double_error
            {Self {value: normal, double_speed: false}}
        else
            {Self {value: double, double_speed: true}}
    }
    /// baud rate actually produced by this divisor
    pub fn baud(&self, clock: u32) -> u32 {
        Self::actual(clock, self.value, if self.double_speed {8} else {16})
    }
    fn register(clock: u32, baud: u32, samples: u32) -> u16 {
        let value = ((clock / samples + baud / 2) / baud).saturating_sub(1);
        u16::try_from(value).unwrap_or(u16::MAX)
    }
    fn actual(clock: u32, value: u16, samples: u32) -> u32 {
        clock / (samples * (u32::from(value) + 1))
    }
}

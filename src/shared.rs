use log::*;

use crate::{
    diverter::{Diverter, Sink},
    egress::EgressQueue,
    timers::Timers,
    };


/**
    state shared between the service loop and the interrupt handlers

    it is meant to live in a `static`, the interrupt handlers calling [Shared::on_tick] and [Shared::on_bus_byte] while the service loop holds a reference in its [Bridge](crate::bridge::Bridge).

    ```ignore
    static SHARED: Shared = Shared::new();

    #[interrupt]
    fn TIMER0_COMPA() {SHARED.on_tick()}
    #[interrupt]
    fn USART1_RX() {SHARED.on_bus_byte(uart_data())}
    ```
*/
pub struct Shared {
    /// bytes waiting to be sent to the host
    pub egress: EgressQueue,
    /// receive, send and bus counters
    pub timers: Timers,
    /// destination of the bytes received from the bus
    pub diverter: Diverter,
}
impl Shared {
    pub const fn new() -> Self {
        Self {
            egress: EgressQueue::new(),
            timers: Timers::new(),
            diverter: Diverter::new(),
        }
    }

    /// periodic tick handler
    pub fn on_tick(&self) {
        self.timers.tick();
    }
    /// bus receive handler
    pub fn on_bus_byte(&self, byte: u8) {
        match self.diverter.sink() {
            Sink::PassThrough => {
                if self.to_host(byte).is_err() {
                    error!("host queue overrun, bus byte dropped");
                }
            },
            Sink::Capture => {
                self.diverter.capture(byte);
                self.timers.reset_bus();
            },
        }
    }

    /// queue a byte for the host
    pub fn to_host(&self, byte: u8) -> Result<(), u8> {
        self.egress.push(byte)?;
        self.timers.reset_send();
        Ok(())
    }
    /// queue bytes for the host, nothing is queued if they don't all fit
    pub fn to_host_all(&self, bytes: &[u8]) -> Result<(), ()> {
        self.egress.extend(bytes)?;
        self.timers.reset_send();
        Ok(())
    }
}
impl Default for Shared {
    fn default() -> Self {Self::new()}
}

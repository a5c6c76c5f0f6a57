use core::cell::{Cell, RefCell};
use critical_section::Mutex;
use log::*;

use crate::protocol::CAPTURE_CAPACITY;


/// destination of the bytes received from the bus
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sink {
    /// bytes go straight to the host
    PassThrough,
    /// bytes are kept for a local transaction
    Capture,
}

/**
    routes bytes received from the bus, from the receive interrupt

    the service loop selects the sink with [Diverter::divert] for the duration of a local transaction, the receive interrupt only reads it.
*/
pub struct Diverter {
    sink: Mutex<Cell<Sink>>,
    buffer: Mutex<RefCell<heapless::Vec<u8, CAPTURE_CAPACITY>>>,
}
impl Diverter {
    pub const fn new() -> Self {
        Self {
            sink: Mutex::new(Cell::new(Sink::PassThrough)),
            buffer: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }
    pub fn sink(&self) -> Sink {
        critical_section::with(|cs| self.sink.borrow(cs).get())
    }
    /**
        start capturing bus bytes, with an empty capture buffer

        bytes return to the host once the returned guard is dropped
    */
    pub fn divert(&self) -> Capture<'_> {
        critical_section::with(|cs| {
            self.buffer.borrow_ref_mut(cs).clear();
            self.sink.borrow(cs).set(Sink::Capture);
        });
        debug!("diverting bus to local capture");
        Capture {diverter: self}
    }
    /// keep a byte received while capturing, bytes beyond the buffer capacity are lost
    pub(crate) fn capture(&self, byte: u8) {
        critical_section::with(|cs| {
            if self.buffer.borrow_ref_mut(cs).push(byte).is_err() {
                warn!("capture buffer overflow, byte dropped");
            }
        })
    }
}
impl Default for Diverter {
    fn default() -> Self {Self::new()}
}


/// ongoing capture of bus bytes, see [Diverter::divert]
pub struct Capture<'d> {
    diverter: &'d Diverter,
}
impl Capture<'_> {
    /// number of bytes captured so far
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.diverter.buffer.borrow_ref(cs).len())
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// forget captured bytes, to start a new exchange
    pub fn clear(&self) {
        critical_section::with(|cs| self.diverter.buffer.borrow_ref_mut(cs).clear())
    }
    /// give access to the captured bytes while the receive interrupt is held off
    pub fn inspect<R>(&self, inspection: impl FnOnce(&[u8]) -> R) -> R {
        critical_section::with(|cs| inspection(self.diverter.buffer.borrow_ref(cs).as_slice()))
    }
}
impl Drop for Capture<'_> {
    fn drop(&mut self) {
        critical_section::with(|cs| self.diverter.sink.borrow(cs).set(Sink::PassThrough));
        debug!("bus back to pass-through");
    }
}

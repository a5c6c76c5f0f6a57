use core::cell::Cell;
use critical_section::Mutex;


/// the three counters advanced by the tick source
#[derive(Copy, Clone, Default, Debug)]
struct Counters {
    receive: u8,
    send: u8,
    bus: u8,
}

/**
    free-running counters shared between the tick interrupt and the service loop

    counters saturate instead of wrapping, so a counter left alone for long always compares above any threshold
*/
pub struct Timers {
    counters: Mutex<Cell<Counters>>,
}
impl Timers {
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(Cell::new(Counters {receive: 0, send: 0, bus: 0})),
        }
    }

    /// advance all counters, called from the tick interrupt
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let cell = self.counters.borrow(cs);
            let mut counters = cell.get();
            counters.receive = counters.receive.saturating_add(1);
            counters.send = counters.send.saturating_add(1);
            counters.bus = counters.bus.saturating_add(1);
            cell.set(counters);
        })
    }

    fn update(&self, change: impl FnOnce(&mut Counters)) {
        critical_section::with(|cs| {
            let cell = self.counters.borrow(cs);
            let mut counters = cell.get();
            change(&mut counters);
            cell.set(counters);
        })
    }
    fn get(&self) -> Counters {
        critical_section::with(|cs| self.counters.borrow(cs).get())
    }

    /// ticks since the inbound parser last advanced
    pub fn receive(&self) -> u8 {self.get().receive}
    /// ticks since a byte was last queued or flushed toward the host
    pub fn send(&self) -> u8 {self.get().send}
    /// ticks since the last byte was diverted from the bus
    pub fn bus(&self) -> u8 {self.get().bus}

    pub fn reset_receive(&self) {self.update(|c| c.receive = 0)}
    pub fn reset_send(&self) {self.update(|c| c.send = 0)}
    pub fn reset_bus(&self) {self.update(|c| c.bus = 0)}
}
impl Default for Timers {
    fn default() -> Self {Self::new()}
}

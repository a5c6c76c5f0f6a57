/*!
    bridge running on a regular computer, with the bus behind a usb serial adapter

    the interrupt handlers of a microcontroller are replaced by threads: one reading the bus, one ticking the timers.

    ```ignore
    static SHARED: Shared = Shared::new();

    let bus = SerialBus::open("/dev/ttyUSB0", 1_000_000, &SHARED)?;
    let _ticker = spawn_ticker(&SHARED, Duration::from_micros(20));
    let mut bridge = Bridge::new(&SHARED, bus, RegisterTable::<64>::new(0xFFFF, 1, DEFAULT_ID), SyncReader, Exit);
    loop {
        bridge.service(&mut host)?;
    }
    ```
*/

use std::{
    io,
    path::Path,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    thread::{self, JoinHandle},
    time::Duration,
    };
use serial2::{SerialPort, CharSize, StopBits, Parity, Settings};
use log::*;

use crate::{
    arbiter::{BusPort, Direction},
    shared::Shared,
    };


/**
    actuator bus behind a serial device

    received bytes are fed to [Shared::on_bus_byte] by a background thread, except while transmitting: half-duplex adapters hear their own transmission.
*/
pub struct SerialBus {
    port: SerialPort,
    transmitting: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}
impl SerialBus {
    /// open the serial device in 8N1 at the given rate and start listening
    pub fn open(path: impl AsRef<Path>, rate: u32, shared: &'static Shared) -> io::Result<Self> {
        let mut port = SerialPort::open(path, |mut settings: Settings| {
                settings.set_raw();
                settings.set_baud_rate(rate)?;
                settings.set_char_size(CharSize::Bits8);
                settings.set_stop_bits(StopBits::One);
                settings.set_parity(Parity::None);
                Ok(settings)
                })?;
        port.set_read_timeout(Duration::from_millis(10))?;
        let receive = port.try_clone()?;
        let transmitting = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let reader = {
            let transmitting = transmitting.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut buffer = [0; 64];
                while running.load(Ordering::Relaxed) {
                    match receive.read(&mut buffer) {
                        Ok(count) => {
                            if transmitting.load(Ordering::Acquire)
                                {continue}
                            for &byte in &buffer[.. count] {
                                shared.on_bus_byte(byte);
                            }
                        },
                        Err(error) if error.kind() == io::ErrorKind::TimedOut => {},
                        Err(error) => {
                            error!("bus reader stopped: {}", error);
                            break;
                        },
                    }
                }
            })
        };
        Ok(Self {
            port,
            transmitting,
            running,
            reader: Some(reader),
        })
    }
}
impl Drop for SerialBus {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl embedded_io::ErrorType for SerialBus {
    type Error = io::Error;
}
impl embedded_io::Write for SerialBus {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.port.write(buf)
    }
    fn flush(&mut self) -> Result<(), io::Error> {
        // returns once the bytes left the adapter
        self.port.flush()
    }
}
impl BusPort for SerialBus {
    fn set_direction(&mut self, direction: Direction) {
        self.transmitting.store(direction == Direction::Transmit, Ordering::Release);
    }
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), io::Error> {
        let mut settings = self.port.get_configuration()?;
        settings.set_baud_rate(baud)?;
        self.port.set_configuration(&settings)
    }
    fn idle(&mut self) {
        thread::yield_now();
    }
}


/// thread ticking the timers at the given period, stopped when the handle is dropped
pub struct Ticker {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}
impl Drop for Ticker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/**
    replace the timer interrupt by a thread

    the sleep granularity of the system makes the ticks longer than requested, timeouts are then only upper bounds
*/
pub fn spawn_ticker(shared: &'static Shared, period: Duration) -> Ticker {
    let running = Arc::new(AtomicBool::new(true));
    let thread = {
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                thread::sleep(period);
                shared.on_tick();
            }
        })
    };
    Ticker {running, thread: Some(thread)}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_advances_timers() {
        static SHARED: Shared = Shared::new();
        let ticker = spawn_ticker(&SHARED, Duration::from_micros(50));
        while SHARED.timers.receive() < 3 {
            thread::yield_now();
        }
        drop(ticker);
        let stopped = SHARED.timers.receive();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(SHARED.timers.receive(), stopped);
    }
}

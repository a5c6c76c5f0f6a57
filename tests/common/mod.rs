#![allow(dead_code)]

use std::{
    collections::VecDeque,
    convert::Infallible,
    vec::Vec,
    };

use axbridge::{
    protocol::{checksum, status_bytes, sum},
    arbiter::{BusPort, Direction},
    host::HostTransport,
    lifecycle::{Lifecycle, Restart},
    registers::RegisterTable,
    Bridge, Shared, StatusError, SyncReader,
    };


pub type TestBridge = Bridge<'static, Bus, RegisterTable<64>, SyncReader, Restarts>;

/// bridge answering as `device`, with the given servos on its bus
pub fn bridge(device: u8, servos: Vec<Servo>) -> TestBridge {
    let _ = env_logger::builder().is_test(true).try_init();
    // every test gets its own state, as a firmware would get its static
    let shared: &'static Shared = Box::leak(Box::new(Shared::new()));
    Bridge::new(
        shared,
        Bus::new(shared, servos),
        RegisterTable::new(0x0BAD, 1, device),
        SyncReader,
        Restarts::default(),
        )
}

/// let the tick interrupt fire
pub fn wait(shared: &Shared, ticks: usize) {
    for _ in 0 .. ticks {
        shared.on_tick();
    }
}

/// instruction packet with a valid checksum
pub fn packet(id: u8, instruction: u8, parameters: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFF, id, parameters.len() as u8 + 2, instruction];
    bytes.extend_from_slice(parameters);
    bytes.push(checksum(&bytes[2 ..]));
    bytes
}

/// status packet as the bridge or a servo sends it
pub fn status(id: u8, error: StatusError, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    status_bytes(id, error, payload, |byte| bytes.push(byte));
    bytes
}


/// usb side, frames of a fixed size
pub struct Host {
    pub incoming: VecDeque<u8>,
    pub connected: bool,
    pub ready: bool,
    pub frame_size: usize,
    pub current: Vec<u8>,
    pub frames: Vec<Vec<u8>>,
}
impl Host {
    pub fn new(frame_size: usize) -> Self {
        Self {
            incoming: VecDeque::new(),
            connected: true,
            ready: true,
            frame_size,
            current: Vec::new(),
            frames: Vec::new(),
        }
    }
    pub fn send(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes);
    }
    /// everything committed so far, frames concatenated
    pub fn received(&self) -> Vec<u8> {
        self.frames.concat()
    }
}
impl HostTransport for Host {
    fn is_connected(&self) -> bool {self.connected}
    fn bytes_available(&self) -> usize {self.incoming.len()}
    fn receive_byte(&mut self) -> Option<u8> {self.incoming.pop_front()}
    fn is_write_ready(&self) -> bool {self.ready}
    fn write_byte(&mut self, byte: u8) {
        assert!(self.current.len() < self.frame_size, "frame overfilled");
        self.current.push(byte);
    }
    fn commit_frame(&mut self) {
        self.frames.push(std::mem::take(&mut self.current));
    }
    fn frame_size(&self) -> usize {self.frame_size}
}


/// simulated device on the bus, answering register reads
pub struct Servo {
    pub id: u8,
    pub registers: [u8; 64],
    pub error: StatusError,
    pub silent: bool,
}
impl Servo {
    pub fn new(id: u8) -> Self {
        let mut registers = [0; 64];
        for (address, value) in registers.iter_mut().enumerate() {
            *value = id.wrapping_mul(16).wrapping_add(address as u8);
        }
        Self {id, registers, error: StatusError::none(), silent: false}
    }
}

/**
    actuator bus with simulated servos

    bytes written are recorded, and read requests are answered through the receive interrupt once the transmission is drained
*/
pub struct Bus {
    shared: &'static Shared,
    pub servos: Vec<Servo>,
    /// every byte transmitted since the start
    pub sent: Vec<u8>,
    /// bytes transmitted since the last drain
    pending: Vec<u8>,
    pub direction: Direction,
    pub baud: Option<u32>,
}
impl Bus {
    pub fn new(shared: &'static Shared, servos: Vec<Servo>) -> Self {
        Self {
            shared,
            servos,
            sent: Vec::new(),
            pending: Vec::new(),
            direction: Direction::Receive,
            baud: None,
        }
    }
    fn answer_pending(&mut self) {
        let bytes = std::mem::take(&mut self.pending);
        let mut rest = bytes.as_slice();
        while let Some(start) = rest.windows(2).position(|pair| pair == [0xFF, 0xFF]) {
            let packet = &rest[start ..];
            if packet.len() < 6
                {break}
            let end = usize::from(packet[3]) + 4;
            if packet.len() < end
                {break}
            let (id, instruction, parameters) = (packet[2], packet[4], &packet[5 .. end - 1]);
            if instruction == 0x02 && parameters.len() == 2 && sum(&packet[2 .. end]) == 0xFF {
                let (address, length) = (usize::from(parameters[0]), usize::from(parameters[1]));
                if let Some(servo) = self.servos.iter().find(|servo| servo.id == id && ! servo.silent) {
                    let shared = self.shared;
                    status_bytes(id, servo.error, &servo.registers[address ..][.. length], |byte| shared.on_bus_byte(byte));
                }
            }
            rest = &packet[end ..];
        }
    }
}
impl embedded_io::ErrorType for Bus {
    type Error = Infallible;
}
impl embedded_io::Write for Bus {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        assert_eq!(self.direction, Direction::Transmit, "writing while listening");
        self.sent.extend_from_slice(buf);
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
impl BusPort for Bus {
    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        // the servos answer once the line is released
        if direction == Direction::Receive {
            self.answer_pending();
        }
    }
    fn set_baud_rate(&mut self, baud: u32) -> Result<(), Infallible> {
        self.baud = Some(baud);
        Ok(())
    }
    fn idle(&mut self) {
        self.shared.on_tick();
    }
}


/// records restart requests instead of restarting
#[derive(Default)]
pub struct Restarts(pub Vec<Restart>);
impl Lifecycle for Restarts {
    fn restart(&mut self, mode: Restart) {
        self.0.push(mode);
    }
}

/*!
    wire format of the actuator bus

    every packet on the bus, instruction or status, has the same shape:

    ```text
    0xFF 0xFF id length instruction|error parameters... checksum
    ```

    where `length` counts the parameters plus 2, and `checksum` is the bitwise complement of the byte sum of everything between the sync marker and itself.
*/

use bilge::prelude::*;


/// frame marker, sent twice at the start of every packet
pub const SYNC: u8 = 0xFF;
/// identifier addressing all devices on the bus
pub const BROADCAST: u8 = 0xFE;
/// identifier this bridge answers to unless configured otherwise
pub const DEFAULT_ID: u8 = 0xFD;

/// maximum number of devices polled by one aggregated read
pub const MAX_SYNC_READ_DEVICES: usize = 32;
/// size of the scratch buffer holding an inbound frame, enough for the longest aggregated read request
pub const SCRATCH: usize = MAX_SYNC_READ_DEVICES + 8;
/// size of the buffer capturing device replies during a local transaction
pub const CAPTURE_CAPACITY: usize = 128;
/// maximum size of a status packet sent back to the host
pub const MAX_REPLY: usize = 250;
/// bytes of a status packet that are not payload: 2 sync, id, length, error, checksum
pub const STATUS_OVERHEAD: usize = 6;
/// size of the queue buffering bytes for the host, must hold the biggest reply
pub const EGRESS_CAPACITY: usize = 256;

/// payload of the biggest status packet
pub type Reply = heapless::Vec<u8, { MAX_REPLY - STATUS_OVERHEAD }>;


/// instruction codes understood by the bus devices and by this bridge
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// check a device is present
    Ping = 0x01,
    /// read a range of registers
    Read = 0x02,
    /// write a range of registers
    Write = 0x03,
    /// register a write to be applied on next action
    RegWrite = 0x04,
    /// apply registered writes
    Action = 0x05,
    /// restore factory settings and restart
    Reset = 0x06,
    /// restart into the firmware update mode (bridge only)
    Bootload = 0x08,
    /// write the same registers on multiple devices
    SyncWrite = 0x83,
    /// read the same registers on multiple devices in one transaction (bridge only)
    SyncRead = 0x84,
    #[fallback]
    Unknown = 0xFF,
}

/// error byte of a status packet, every bit flags a different problem
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Default)]
pub struct StatusError {
    /// supply voltage out of operating range
    pub input_voltage: bool,
    /// goal position out of angle limits
    pub angle_limit: bool,
    /// internal temperature too high
    pub overheating: bool,
    /// requested value or size out of range
    pub range: bool,
    /// received packet checksum did not match
    pub checksum: bool,
    /// load exceeds the configured torque
    pub overload: bool,
    /// instruction is undefined or not allowed
    pub instruction: bool,
    _reserved: u1,
}
impl StatusError {
    pub fn none() -> Self {
        Self::from(0u8)
    }
    pub fn range_error() -> Self {
        let mut error = Self::none();
        error.set_range(true);
        error
    }
    pub fn is_none(&self) -> bool {
        u8::from(*self) == 0
    }
}


/// byte sum of the given bytes, modulo 256
pub fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}
/// checksum byte to append after the given frame content (id, length, instruction, parameters)
pub fn checksum(content: &[u8]) -> u8 {
    !sum(content)
}

/// a validated inbound packet, stripped of its sync marker, length and checksum
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub id: u8,
    pub instruction: Instruction,
    pub parameters: heapless::Vec<u8, SCRATCH>,
}

/**
    call `emit` on every byte of a status packet

    the caller is responsible for `payload` fitting in [MAX_REPLY]
*/
pub fn status_bytes(id: u8, error: StatusError, payload: &[u8], mut emit: impl FnMut(u8)) {
    // payload length is bounded by the reply buffers, so it fits a byte
    let length = (payload.len() + 2) as u8;
    let error = u8::from(error);
    emit(SYNC);
    emit(SYNC);
    emit(id);
    emit(length);
    emit(error);
    for &byte in payload {
        emit(byte);
    }
    emit(!(sum(&[id, length, error]).wrapping_add(sum(payload))));
}

/// build an instruction packet into `dst`, returning its size
pub fn instruction_bytes<const N: usize>(id: u8, instruction: Instruction, parameters: &[u8], dst: &mut heapless::Vec<u8, N>) -> Result<usize, &'static str> {
    let length = u8::try_from(parameters.len() + 2) .map_err(|_| "too many parameters for a packet")?;
    let instruction = u8::from(instruction);
    dst.clear();
    dst.extend_from_slice(&[SYNC, SYNC, id, length, instruction])
        .map_err(|_| "packet does not fit buffer")?;
    dst.extend_from_slice(parameters)
        .map_err(|_| "packet does not fit buffer")?;
    dst.push(!(sum(&[id, length, instruction]).wrapping_add(sum(parameters))))
        .map_err(|_| "packet does not fit buffer")?;
    Ok(dst.len())
}

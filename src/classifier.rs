/*!
    inbound packet classifier

    consumes the host byte stream one byte at a time and decides, as early as possible, whether bytes belong to a packet the bridge must handle itself or can be relayed to the bus untouched.

    bytes that may belong to a local packet are held in a scratch buffer until the decision is known. They are never lost: a rejected or abandoned packet is relayed to the bus as plain data, and the devices' own checksum will reject it if it is garbage. The only exception is the parameters of a packet addressed to the bridge with an out-of-range length, which are answered with a range error instead.
*/

use log::*;

use crate::protocol::{
    SYNC, BROADCAST, SCRATCH, MAX_SYNC_READ_DEVICES,
    Instruction, Packet,
    };


/// bytes to forward to the bus, in order
pub type Relay = heapless::Vec<u8, SCRATCH>;

/// outcome of consuming one byte
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// the byte is held until the packet is decided
    Buffered,
    /// these bytes must go to the bus now
    PassThrough(Relay),
    /// a complete valid packet to handle locally, nothing goes to the bus
    Frame(Packet),
    /// the packet was refused, the relayed bytes must go to the bus
    Rejected(Rejected),
}

/// refused packet
#[derive(Clone, Debug, PartialEq)]
pub struct Rejected {
    pub reason: Reject,
    /// identifier read before rejection, if any
    pub id: Option<u8>,
    /// bytes that were held and must now go to the bus
    pub relay: Relay,
}

/// cause of a packet rejection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reject {
    /// a sync byte was expected
    Sync,
    /// declared length out of the accepted range
    Length,
    /// instruction not handled locally
    Instruction,
    /// checksum mismatch
    Checksum,
    /// packet longer than the scratch buffer
    Overflow,
}

/// parser state, each carrying what was learned of the packet so far
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    SeekFirstSync,
    SeekSecondSync,
    ReadId,
    ReadLength {id: u8},
    ReadInstruction {id: u8, length: u8},
    ResetConfirm {length: u8},
    BootloadConfirm {length: u8},
    PingConfirm {length: u8},
    CollectParameters {
        id: u8,
        instruction: Instruction,
        /// running byte sum including id, length and instruction
        checksum: u8,
        /// bytes left, checksum included
        remaining: u8,
    },
    RelayRemainder {
        /// bytes left in the packet
        remaining: u8,
    },
    /// parameters of a refused packet addressed to us, dropped
    DiscardRemainder {
        remaining: u8,
    },
}

/// byte-level state machine splitting the host stream into local packets and bus traffic
pub struct Classifier {
    device: u8,
    state: State,
    /// raw bytes of the packet in progress, sync marker included
    scratch: Relay,
}
impl Classifier {
    /// classifier answering to the given device id
    pub fn new(device: u8) -> Self {
        Self {
            device,
            state: State::SeekFirstSync,
            scratch: Relay::new(),
        }
    }
    pub fn device(&self) -> u8 {self.device}
    pub fn set_device(&mut self, device: u8) {self.device = device}
    pub fn state(&self) -> State {self.state}
    /// whether no packet is in progress
    pub fn is_idle(&self) -> bool {
        self.state == State::SeekFirstSync
    }

    /// advance the state machine by one byte
    pub fn consume(&mut self, byte: u8) -> Action {
        match self.state {
            State::SeekFirstSync => {
                if byte == SYNC {
                    self.scratch.clear();
                    self.hold(byte);
                    self.state = State::SeekSecondSync;
                    Action::Buffered
                }
                else {
                    Action::PassThrough(relay(&[byte]))
                }
            },
            State::SeekSecondSync => {
                self.hold(byte);
                if byte == SYNC {
                    self.state = State::ReadId;
                    Action::Buffered
                }
                else {
                    self.reject(Reject::Sync, None)
                }
            },
            State::ReadId => {
                if byte == SYNC {
                    // third sync in a row: the oldest one cannot start this packet, let it go
                    Action::PassThrough(relay(&[SYNC]))
                }
                else {
                    self.hold(byte);
                    self.state = State::ReadLength {id: byte};
                    Action::Buffered
                }
            },
            State::ReadLength {id} => {
                self.hold(byte);
                let length = byte;
                if id == self.device || id == BROADCAST {
                    if length > 1 && usize::from(length) < MAX_SYNC_READ_DEVICES + 4 {
                        self.state = State::ReadInstruction {id, length};
                        Action::Buffered
                    }
                    else {
                        debug!("packet length {} out of range", length);
                        let action = self.reject(Reject::Length, Some(id));
                        // the range error answers for the whole packet, its parameters never reach the bus
                        if length != 0 && self.is_idle() {
                            self.state = State::DiscardRemainder {remaining: length};
                        }
                        action
                    }
                }
                else {
                    // someone else's packet, count its bytes through without interpreting them
                    let prefix = core::mem::take(&mut self.scratch);
                    self.state = if length == 0
                        {State::SeekFirstSync}
                    else
                        {State::RelayRemainder {remaining: length}};
                    Action::PassThrough(prefix)
                }
            },
            State::ReadInstruction {id, length} => {
                self.hold(byte);
                let instruction = Instruction::from(byte);
                let seed = id.wrapping_add(length).wrapping_add(byte);
                let collect = State::CollectParameters {
                    id,
                    instruction,
                    checksum: seed,
                    // parameters plus checksum
                    remaining: length - 1,
                    };
                match instruction {
                    Instruction::SyncRead => {
                        self.state = collect;
                        Action::Buffered
                    },
                    Instruction::Read | Instruction::Write if id == self.device => {
                        self.state = collect;
                        Action::Buffered
                    },
                    Instruction::Ping if id == self.device => {
                        self.state = State::PingConfirm {length};
                        Action::Buffered
                    },
                    Instruction::Reset if id == self.device => {
                        self.state = State::ResetConfirm {length};
                        Action::Buffered
                    },
                    Instruction::Bootload if id == self.device => {
                        self.state = State::BootloadConfirm {length};
                        Action::Buffered
                    },
                    _ => self.reject(Reject::Instruction, Some(id)),
                }
            },
            State::PingConfirm {length} => self.confirm(byte, length, Instruction::Ping),
            State::ResetConfirm {length} => self.confirm(byte, length, Instruction::Reset),
            State::BootloadConfirm {length} => self.confirm(byte, length, Instruction::Bootload),
            State::CollectParameters {id, instruction, checksum, remaining} => {
                if self.scratch.push(byte).is_err() {
                    // unreachable with the length bound, refuse rather than overrun
                    return self.reject(Reject::Overflow, Some(id));
                }
                let checksum = checksum.wrapping_add(byte);
                let remaining = remaining - 1;
                if remaining > 0 {
                    self.state = State::CollectParameters {id, instruction, checksum, remaining};
                    return Action::Buffered
                }
                if checksum != 0xFF {
                    debug!("checksum mismatch for {:?} to {}", instruction, id);
                    return self.reject(Reject::Checksum, Some(id));
                }
                // parameters sit between the 5 bytes header and the checksum
                let end = self.scratch.len() - 1;
                let parameters = heapless::Vec::from_slice(&self.scratch[5 .. end])
                    .unwrap_or_default();
                self.reset();
                Action::Frame(Packet {id, instruction, parameters})
            },
            State::RelayRemainder {remaining} => {
                let remaining = remaining - 1;
                self.state = if remaining == 0
                    {State::SeekFirstSync}
                else
                    {State::RelayRemainder {remaining}};
                Action::PassThrough(relay(&[byte]))
            },
            State::DiscardRemainder {remaining} => {
                let remaining = remaining - 1;
                self.state = if remaining == 0
                    {State::SeekFirstSync}
                else
                    {State::DiscardRemainder {remaining}};
                Action::Buffered
            },
        }
    }

    /**
        give up the packet in progress

        returns the held bytes, to be relayed to the bus as plain data
    */
    pub fn abandon(&mut self) -> Relay {
        if ! self.is_idle() {
            debug!("abandon incomplete packet in state {:?}", self.state);
        }
        self.state = State::SeekFirstSync;
        core::mem::take(&mut self.scratch)
    }

    /// validate the single checksum byte ending a fixed-shape packet
    fn confirm(&mut self, byte: u8, length: u8, instruction: Instruction) -> Action {
        self.hold(byte);
        let device = self.device;
        let sum = device
            .wrapping_add(length)
            .wrapping_add(u8::from(instruction))
            .wrapping_add(byte);
        if length != 2 || sum != 0xFF {
            return self.reject(Reject::Checksum, Some(device));
        }
        self.reset();
        Action::Frame(Packet {
            id: device,
            instruction,
            parameters: heapless::Vec::new(),
            })
    }

    /// keep a byte of the packet in progress
    fn hold(&mut self, byte: u8) {
        // states before parameter collection hold at most 6 bytes, far below the scratch size
        let _ = self.scratch.push(byte);
    }
    fn reset(&mut self) {
        self.scratch.clear();
        self.state = State::SeekFirstSync;
    }

    /**
        refuse the packet in progress and realign on the next possible packet

        a sync byte ending the held bytes may start the next packet, so it is kept as its first byte
    */
    fn reject(&mut self, reason: Reject, id: Option<u8>) -> Action {
        let mut relay = core::mem::take(&mut self.scratch);
        if relay.len() > 1 && relay.last() == Some(&SYNC) {
            relay.pop();
            self.hold(SYNC);
            self.state = State::SeekSecondSync;
        }
        else {
            self.state = State::SeekFirstSync;
        }
        Action::Rejected(Rejected {reason, id, relay})
    }
}

fn relay(bytes: &[u8]) -> Relay {
    // callers never relay more than the scratch size
    Relay::from_slice(bytes).unwrap_or_default()
}

/*!
    local registers of the bridge

    the bridge answers single-register reads and writes addressed to its own id from a small register table. Only the registers the relay core depends on are standardized here, the rest of the table belongs to the [RegisterStore] implementation.

    each standard register is described by a serializable data type and a constant of type [Register] defining its position in the table.
*/

use core::marker::PhantomData;
use packbytes::{FromBytes, ToBytes, ByteArray};

use crate::protocol::StatusError;


/**
    a register is a typed pointer in the bridge register table

    it only holds the address of the starting byte of the referenced value, hence can be created, copied or destroyed at no cost
*/
#[derive(PartialEq, Hash)]
pub struct Register<T> {
    addr: u8,
    ty: PhantomData<T>,
}
impl<T> Register<T> {
    /// create a register from its starting byte
    pub const fn new(address: u8) -> Self {
        Self{addr: address, ty: PhantomData}
    }
    /// starting byte in the table
    pub const fn address(&self) -> u8 {self.addr}
}
impl<T: FromBytes> Register<T> {
    pub const fn size(&self) -> usize {T::Bytes::SIZE}
}
impl<T> Clone for Register<T> {
    fn clone(&self) -> Self {
        Self::new(self.address())
    }
}
impl<T> Copy for Register<T> {}


/// model number reported to the host
pub const MODEL_NUMBER: Register<u16> = Register::new(0x00);
/// firmware version reported to the host
pub const FIRMWARE_VERSION: Register<u8> = Register::new(0x02);
/// bus identifier of the bridge
pub const ID: Register<u8> = Register::new(0x03);
/// timing parameters of the relay, in ticks of the timer service
pub const TIMEOUTS: Register<Timeouts> = Register::new(0x0C);

/// start of the writable part of the table, registers below are read-only
pub const WRITABLE: u8 = 0x0C;


/// timing parameters of the relay, stored contiguously
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, PartialEq)]
pub struct Timeouts {
    /// how long the aggregated read waits for each device reply
    pub reply: u8,
    /// how long a partial buffer may wait before being flushed to the host
    pub send: u8,
    /// how long the packet parser waits for the next byte of a frame
    pub receive: u8,
}
impl Default for Timeouts {
    fn default() -> Self {
        // ticks of 20us
        Self {
            reply: 50,
            send: 50,
            receive: 100,
        }
    }
}


/**
    storage behind the local registers

    implementations may back it with non-volatile memory, the relay core only relies on this contract
*/
pub trait RegisterStore {
    /// copy registers starting at `address` into `data`
    fn read(&mut self, address: u8, data: &mut [u8]) -> Result<(), StatusError>;
    /// overwrite registers starting at `address` with `data`
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), StatusError>;
    /// restore the persisted configuration to factory values
    fn erase(&mut self);

    /// get the current register's value
    fn get<T: FromBytes>(&mut self, register: Register<T>) -> Result<T, StatusError> {
        let mut dst = T::Bytes::zeroed();
        self.read(register.address(), dst.as_mut())?;
        Ok(T::from_le_bytes(dst))
    }
    /// set the given register's value
    fn set<T: ToBytes>(&mut self, register: Register<T>, value: T) -> Result<(), StatusError> {
        let src = value.to_le_bytes();
        self.write(register.address(), src.as_ref())
    }
}


/**
    register table held in memory

    registers below [WRITABLE] are read-only to the host, erasing restores the values the table was created with
*/
pub struct RegisterTable<const MEM: usize> {
    buffer: [u8; MEM],
    factory: [u8; MEM],
}
impl<const MEM: usize> RegisterTable<MEM> {
    /// table holding the standard registers with their default values
    pub fn new(model: u16, firmware: u8, id: u8) -> Self {
        let mut table = Self {buffer: [0; MEM], factory: [0; MEM]};
        table.place(MODEL_NUMBER, model);
        table.place(FIRMWARE_VERSION, firmware);
        table.place(ID, id);
        table.place(TIMEOUTS, Timeouts::default());
        table.factory = table.buffer;
        table
    }
    /// set a register regardless of access rights, registers beyond the table are left out
    fn place<T: ToBytes>(&mut self, register: Register<T>, value: T) {
        let src = value.to_le_bytes();
        if let Ok(range) = Self::range(register.address(), T::Bytes::SIZE) {
            self.buffer[range].copy_from_slice(src.as_ref());
        }
    }
    fn range(address: u8, size: usize) -> Result<core::ops::Range<usize>, StatusError> {
        let start = usize::from(address);
        let end = start.checked_add(size).filter(|&end| end <= MEM)
            .ok_or(StatusError::range_error())?;
        Ok(start .. end)
    }
}
impl<const MEM: usize> RegisterStore for RegisterTable<MEM> {
    fn read(&mut self, address: u8, data: &mut [u8]) -> Result<(), StatusError> {
        let range = Self::range(address, data.len())?;
        data.copy_from_slice(&self.buffer[range]);
        Ok(())
    }
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), StatusError> {
        if address < WRITABLE {
            return Err(StatusError::range_error());
        }
        let range = Self::range(address, data.len())?;
        self.buffer[range].copy_from_slice(data);
        Ok(())
    }
    fn erase(&mut self) {
        self.buffer = self.factory;
    }
}

/*!
    local handling of the packets addressed to the bridge itself

    packets reaching the dispatcher are complete and checksum-valid. They either get answered directly with a status packet, delegated to the register store or the bus transaction, or end the current execution (reset and bootload).
*/

use log::*;

use crate::{
    arbiter::{Arbiter, BusPort},
    config::Config,
    error::{Error, EgressFull},
    lifecycle::{Lifecycle, Restart},
    protocol::{
        Instruction, Packet, Reply, StatusError,
        MAX_REPLY, CAPTURE_CAPACITY, STATUS_OVERHEAD,
        status_bytes,
        },
    registers::RegisterStore,
    shared::Shared,
    };


/// aggregated read requested by the host
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncRead<'p> {
    /// first register to read on every device
    pub start: u8,
    /// number of registers to read on every device
    pub length: u8,
    /// devices to poll, in reply order
    pub ids: &'p [u8],
}

/**
    executor of the aggregated read

    it owns the bus for the whole poll: direction switching, capture of the replies and waiting for them.
*/
pub trait BusTransaction<P: BusPort> {
    /**
        poll every requested device, appending their payloads to `reply`

        returns the error flags to report to the host. [Error::Reply] means a device did not answer properly and no status must be sent.
    */
    fn sync_read(&mut self,
            arbiter: &mut Arbiter<P>,
            shared: &Shared,
            config: &Config,
            request: &SyncRead<'_>,
            reply: &mut Reply,
            ) -> Result<StatusError, Error<P::Error>>;
}

/// what the dispatcher did with a packet
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// a status packet was queued for the host
    Answered,
    /// nothing was sent back
    Silent,
    /// registers were written, configuration must be reloaded
    Reconfigured,
    /// the bridge was asked to restart
    Restarted(Restart),
}

/// collaborators of the local instructions
pub struct Dispatcher<S, X, L> {
    pub registers: S,
    pub transaction: X,
    pub lifecycle: L,
}
impl<S: RegisterStore, X, L: Lifecycle> Dispatcher<S, X, L> {
    pub fn new(registers: S, transaction: X, lifecycle: L) -> Self {
        Self {registers, transaction, lifecycle}
    }

    /// execute a packet addressed to the bridge
    pub fn dispatch<P: BusPort>(&mut self,
            packet: &Packet,
            arbiter: &mut Arbiter<P>,
            shared: &Shared,
            config: &Config,
            ) -> Result<Outcome, Error<P::Error>>
    where X: BusTransaction<P>
    {
        debug!("dispatch {:?} from {}", packet.instruction, packet.id);
        let device = config.device;
        match packet.instruction {
            Instruction::Ping => {
                answer(shared, device, StatusError::none(), &[])?;
                Ok(Outcome::Answered)
            },
            Instruction::Reset => {
                info!("reset requested, erasing configuration");
                self.registers.erase();
                self.lifecycle.restart(Restart::Application);
                Ok(Outcome::Restarted(Restart::Application))
            },
            Instruction::Bootload => {
                info!("bootloader requested");
                self.lifecycle.restart(Restart::Bootloader);
                Ok(Outcome::Restarted(Restart::Bootloader))
            },
            Instruction::Read => {
                let &[address, length] = packet.parameters.as_slice()
                    else {return range_error(shared, device)};
                let mut data = Reply::new();
                if data.resize_default(usize::from(length)).is_err()
                    {return range_error(shared, device)}
                match self.registers.read(address, &mut data) {
                    Ok(()) => answer(shared, device, StatusError::none(), &data)?,
                    Err(error) => answer(shared, device, error, &[])?,
                }
                Ok(Outcome::Answered)
            },
            Instruction::Write => {
                let [address, data @ ..] = packet.parameters.as_slice()
                    else {return range_error(shared, device)};
                if data.is_empty()
                    {return range_error(shared, device)}
                match self.registers.write(*address, data) {
                    Ok(()) => {
                        answer(shared, device, StatusError::none(), &[])?;
                        Ok(Outcome::Reconfigured)
                    },
                    Err(error) => {
                        answer(shared, device, error, &[])?;
                        Ok(Outcome::Answered)
                    },
                }
            },
            Instruction::SyncRead => {
                let [start, length, ids @ ..] = packet.parameters.as_slice()
                    else {return range_error(shared, device)};
                let request = SyncRead {start: *start, length: *length, ids};
                if ! sync_read_fits(&request) {
                    debug!("aggregated read of {} bytes on {} devices refused", length, ids.len());
                    return range_error(shared, device);
                }
                let mut reply = Reply::new();
                match self.transaction.sync_read(arbiter, shared, config, &request, &mut reply) {
                    Ok(error) => {
                        answer(shared, device, error, &reply)?;
                        Ok(Outcome::Answered)
                    },
                    Err(Error::Reply(problem)) => {
                        warn!("aggregated read aborted: {}", problem);
                        Ok(Outcome::Silent)
                    },
                    Err(error) => Err(error),
                }
            },
            instruction => {
                // the classifier never hands over other instructions
                warn!("no local handling for {:?}", instruction);
                Ok(Outcome::Silent)
            },
        }
    }
}

/**
    whether an aggregated read can be served

    every device reply must fit the capture buffer, and all payloads together must fit one status packet
*/
pub fn sync_read_fits(request: &SyncRead<'_>) -> bool {
    let length = usize::from(request.length);
    length != 0
        && length <= CAPTURE_CAPACITY - STATUS_OVERHEAD
        && length * request.ids.len() <= MAX_REPLY - STATUS_OVERHEAD
}

/**
    queue a status packet for the host

    the packet is queued whole or not at all, a payload longer than a reply can hold is never queued
*/
pub fn answer(shared: &Shared, id: u8, error: StatusError, payload: &[u8]) -> Result<(), EgressFull> {
    let mut packet = heapless::Vec::<u8, MAX_REPLY>::new();
    let mut fits = true;
    status_bytes(id, error, payload, |byte| fits &= packet.push(byte).is_ok());
    if ! fits
        {return Err(EgressFull)}
    shared.to_host_all(&packet).map_err(|_| EgressFull)
}

fn range_error<E: core::fmt::Debug>(shared: &Shared, device: u8) -> Result<Outcome, Error<E>> {
    answer(shared, device, StatusError::range_error(), &[])?;
    Ok(Outcome::Answered)
}

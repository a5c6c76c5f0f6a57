/*!
    aggregated read executed by the bridge itself

    the host sends one request, the bridge polls every device with a single-register read and answers with one status packet holding all the payloads in request order. This saves the host the round trip latency of its link for every device.
*/

use log::*;

use crate::{
    arbiter::{Arbiter, BusPort},
    config::Config,
    dispatch::{BusTransaction, SyncRead},
    error::Error,
    protocol::{
        Instruction, Reply, StatusError,
        SYNC, STATUS_OVERHEAD,
        instruction_bytes, sum,
        },
    shared::Shared,
    };


/// polls devices one after the other, waiting for each reply before the next request
#[derive(Copy, Clone, Default, Debug)]
pub struct SyncReader;

impl<P: BusPort> BusTransaction<P> for SyncReader {
    fn sync_read(&mut self,
            arbiter: &mut Arbiter<P>,
            shared: &Shared,
            config: &Config,
            request: &SyncRead<'_>,
            reply: &mut Reply,
            ) -> Result<StatusError, Error<P::Error>>
    {
        // device replies stay local until the poll ends, even on error
        let capture = shared.diverter.divert();
        let expected = usize::from(request.length) + STATUS_OVERHEAD;
        let mut flags = 0;
        let mut packet = heapless::Vec::<u8, 8>::new();

        for &id in request.ids {
            instruction_bytes(id, Instruction::Read, &[request.start, request.length], &mut packet)
                .map_err(Error::Reply)?;
            capture.clear();
            arbiter.transmit(&packet).map_err(Error::Bus)?;
            arbiter.switch_to_receive().map_err(Error::Bus)?;
            shared.timers.reset_bus();

            // the bus timer restarts on every received byte, so this only expires on silence
            while capture.len() < expected && shared.timers.bus() <= config.reply_timeout {
                arbiter.port().idle();
            }
            let error = capture.inspect(|bytes| extract(bytes, id, request.length, reply))
                .map_err(Error::Reply)?;
            if ! error.is_none() {
                debug!("device {} reports {:?}", id, error);
            }
            flags |= u8::from(error);
        }
        Ok(StatusError::from(flags))
    }
}

/// check a device reply and append its payload
fn extract(bytes: &[u8], id: u8, length: u8, reply: &mut Reply) -> Result<StatusError, &'static str> {
    let expected = usize::from(length) + STATUS_OVERHEAD;
    if bytes.is_empty()
        {return Err("device did not answer")}
    if bytes.len() < expected
        {return Err("device reply is truncated")}
    let packet = &bytes[.. expected];
    if packet[0] != SYNC || packet[1] != SYNC
        {return Err("device reply is not a packet")}
    if packet[2] != id
        {return Err("reply from an unexpected device")}
    if packet[3] != length + 2
        {return Err("device reply has unexpected length")}
    if sum(&packet[2 ..]) != 0xFF
        {return Err("device reply checksum mismatch")}
    reply.extend_from_slice(&packet[5 .. expected - 1])
        .map_err(|_| "aggregated reply does not fit")?;
    Ok(StatusError::from(packet[4]))
}

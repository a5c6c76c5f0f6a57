/*!
    service loop of the bridge

    [Bridge::service] is meant to be called repeatedly from the main loop, interleaved with the host transport's own housekeeping. Each call consumes everything the host sent so far, relays or executes it, then gives the host queue a chance to be flushed.
*/

use log::*;

use crate::{
    arbiter::{Arbiter, BusPort},
    classifier::{Action, Classifier, Reject, Rejected},
    config::Config,
    dispatch::{answer, BusTransaction, Dispatcher, Outcome},
    egress::{Flush, Flusher},
    error::Error,
    host::HostTransport,
    lifecycle::{BootloadTrigger, Lifecycle, Restart},
    protocol::StatusError,
    registers::RegisterStore,
    shared::Shared,
    };


/// the relay core, driving the bus from the host stream
pub struct Bridge<'s, P, S, X, L> {
    shared: &'s Shared,
    classifier: Classifier,
    arbiter: Arbiter<P>,
    dispatcher: Dispatcher<S, X, L>,
    flusher: Flusher,
    config: Config,
    trigger: BootloadTrigger,
}

impl<'s, P, S, X, L> Bridge<'s, P, S, X, L>
where
    P: BusPort,
    S: RegisterStore,
    X: BusTransaction<P>,
    L: Lifecycle,
{
    /**
        assemble the bridge, reading its configuration from the register store

        an unreadable store leaves the bridge on factory defaults
    */
    pub fn new(shared: &'s Shared, port: P, mut registers: S, transaction: X, lifecycle: L) -> Self {
        let config = Config::load(&mut registers).unwrap_or_else(|error| {
            warn!("cannot read configuration, using defaults: {:?}", error);
            Config::default()
            });
        info!("bridge answering as device {}", config.device);
        Self {
            shared,
            classifier: Classifier::new(config.device),
            arbiter: Arbiter::new(port),
            dispatcher: Dispatcher::new(registers, transaction, lifecycle),
            flusher: Flusher::new(),
            config,
            trigger: BootloadTrigger::new(),
        }
    }

    pub fn config(&self) -> &Config {&self.config}
    pub fn shared(&self) -> &'s Shared {self.shared}
    pub fn classifier(&self) -> &Classifier {&self.classifier}
    pub fn arbiter(&mut self) -> &mut Arbiter<P> {&mut self.arbiter}
    pub fn dispatcher(&mut self) -> &mut Dispatcher<S, X, L> {&mut self.dispatcher}

    /// one cycle of the service loop
    pub fn service<H: HostTransport>(&mut self, host: &mut H) -> Result<Flush, Error<P::Error>> {
        if ! host.is_connected()
            {return Ok(Flush::Idle)}

        while host.bytes_available() > 0 {
            let Some(byte) = host.receive_byte()
                else {break};
            self.shared.timers.reset_receive();
            let action = self.classifier.consume(byte);
            self.handle(action)?;
        }
        // a truncated packet must not hold the parser forever
        if ! self.classifier.is_idle() && self.shared.timers.receive() > self.config.receive_timeout {
            let relay = self.classifier.abandon();
            self.arbiter.transmit(&relay).map_err(Error::Bus)?;
        }
        self.arbiter.settle().map_err(Error::Bus)?;

        Ok(self.flusher.try_flush(host, &self.shared.egress, &self.shared.timers, self.config.send_timeout))
    }

    fn handle(&mut self, action: Action) -> Result<(), Error<P::Error>> {
        match action {
            Action::Buffered => Ok(()),
            Action::PassThrough(relay) => self.arbiter.transmit(&relay).map_err(Error::Bus),
            Action::Rejected(Rejected {reason, relay, ..}) => {
                trace!("packet rejected: {:?}", reason);
                self.arbiter.transmit(&relay).map_err(Error::Bus)?;
                // length rejections only happen on packets addressed to us or broadcast
                if reason == Reject::Length {
                    if let Err(error) = answer(self.shared, self.config.device, StatusError::range_error(), &[]) {
                        warn!("range error not reported: {}", error);
                    }
                }
                Ok(())
            },
            Action::Frame(packet) => {
                let outcome = self.dispatcher.dispatch(&packet, &mut self.arbiter, self.shared, &self.config);
                match outcome {
                    Ok(Outcome::Reconfigured) | Ok(Outcome::Restarted(Restart::Application)) => {
                        self.config.reload(&mut self.dispatcher.registers);
                        self.classifier.set_device(self.config.device);
                        Ok(())
                    },
                    Ok(_) => Ok(()),
                    Err(Error::EgressFull(error)) => {
                        warn!("answer to {:?} dropped: {}", packet.instruction, error);
                        Ok(())
                    },
                    Err(error) => Err(error),
                }
            },
        }
    }

    /**
        the host changed the line speed of its link

        the bus follows the host speed, except for the speed reserved to the bootloader request
    */
    pub fn line_coding_changed(&mut self, baud: u32) -> Result<(), Error<P::Error>> {
        self.trigger.line_coding(baud);
        if baud == BootloadTrigger::BAUD
            {return Ok(())}
        debug!("bus speed set to {}", baud);
        self.arbiter.port().set_baud_rate(baud).map_err(Error::Bus)
    }
    /// the host changed the control lines of its link
    pub fn control_lines_changed(&mut self, dtr: bool) {
        if let Some(mode) = self.trigger.control_lines(dtr) {
            self.dispatcher.lifecycle.restart(mode);
        }
    }
}

use log::*;

use crate::{
    protocol::{DEFAULT_ID, StatusError},
    registers::{self, RegisterStore, Timeouts},
    };


/**
    parameters of the relay

    they are read from the register store when the bridge starts and after every local write, never in between
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// identifier the bridge answers to
    pub device: u8,
    /// ticks the parser waits for the next byte of a packet before giving it up
    pub receive_timeout: u8,
    /// ticks a partial buffer waits before being flushed to the host
    pub send_timeout: u8,
    /// ticks the aggregated read waits for a device reply
    pub reply_timeout: u8,
}
/**
    longest timeout the relay honors

    the timers saturate at `u8::MAX`, so a threshold must stay below it to ever be exceeded
*/
pub const MAX_TIMEOUT: u8 = u8::MAX - 1;

impl Default for Config {
    fn default() -> Self {
        let timeouts = Timeouts::default();
        Self {
            device: DEFAULT_ID,
            receive_timeout: timeouts.receive,
            send_timeout: timeouts.send,
            reply_timeout: timeouts.reply,
        }
    }
}
impl Config {
    /// read the relay parameters from the register store
    pub fn load(store: &mut impl RegisterStore) -> Result<Self, StatusError> {
        let device = store.get(registers::ID)?;
        let timeouts = store.get(registers::TIMEOUTS)?;
        Ok(Self {
            device,
            receive_timeout: timeouts.receive.min(MAX_TIMEOUT),
            send_timeout: timeouts.send.min(MAX_TIMEOUT),
            reply_timeout: timeouts.reply.min(MAX_TIMEOUT),
        })
    }
    /// refresh from the register store, keeping current values if it cannot be read
    pub fn reload(&mut self, store: &mut impl RegisterStore) {
        match Self::load(store) {
            Ok(config) => {
                if config != *self {
                    debug!("configuration changed: {:?}", config);
                }
                *self = config;
            },
            Err(error) => warn!("cannot read configuration, keeping previous: {:?}", error),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::RegisterTable;

    #[test]
    fn load_and_reload() {
        let mut table = RegisterTable::<24>::new(0, 1, 7);
        let mut config = Config::load(&mut table).unwrap();
        assert_eq!(config, Config {device: 7, .. Config::default()});

        table.set(registers::TIMEOUTS, Timeouts {reply: 1, send: 2, receive: 3}).unwrap();
        // not read through
        assert_eq!(config.send_timeout, Timeouts::default().send);
        config.reload(&mut table);
        assert_eq!(config, Config {device: 7, reply_timeout: 1, send_timeout: 2, receive_timeout: 3});
    }

    #[test]
    fn timeouts_stay_below_saturation() {
        let mut table = RegisterTable::<24>::new(0, 1, 7);
        table.set(registers::TIMEOUTS, Timeouts {reply: 255, send: 255, receive: 254}).unwrap();
        let config = Config::load(&mut table).unwrap();
        assert_eq!(config.reply_timeout, MAX_TIMEOUT);
        assert_eq!(config.send_timeout, MAX_TIMEOUT);
        assert_eq!(config.receive_timeout, 254);
    }

    #[test]
    fn reload_keeps_values_on_failure() {
        // too small to hold the timeouts
        let mut table = RegisterTable::<8>::new(0, 1, 7);
        let mut config = Config::default();
        assert!(Config::load(&mut table).is_err());
        config.reload(&mut table);
        assert_eq!(config, Config::default());
    }
}

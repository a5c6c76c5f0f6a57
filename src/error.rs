use thiserror::Error;


/// error raised while servicing the bridge
#[derive(Error, Debug)]
pub enum Error<E: core::fmt::Debug> {
    #[error("problem with uart bus: {0:?}")]
    Bus(E),
    #[error("host queue is full")]
    EgressFull(#[from] EgressFull),
    #[error("problem with a device reply: {0}")]
    Reply(&'static str),
}

/// the host queue cannot take a whole packet
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("host queue cannot take the packet")]
pub struct EgressFull;

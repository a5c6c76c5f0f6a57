/*!
    packet-aware relay between a host serial link and a half-duplex dynamixel-style actuator bus

    bytes from the host are relayed to the bus as they come, except packets addressed to the bridge itself, which are held until complete and executed locally. Bytes from the bus are queued back to the host from the receive interrupt.

    the crate is `no_std` and leaves the hardware to implementations of [HostTransport], [BusPort], [RegisterStore] and [Lifecycle]. The `hosted` feature provides a bus port over a serial device for running on a computer.
*/
#![no_std]
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod protocol;
pub mod registers;
pub mod timers;
pub mod host;
pub mod egress;
pub mod diverter;
pub mod shared;
pub mod arbiter;
pub mod classifier;
pub mod dispatch;
pub mod sync_read;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod bridge;
#[cfg(feature = "hosted")]
pub mod hosted;

pub use protocol::{Instruction, Packet, StatusError, BROADCAST, DEFAULT_ID};
pub use registers::{RegisterStore, RegisterTable};
pub use host::HostTransport;
pub use arbiter::{Arbiter, BusPort, Direction};
pub use shared::Shared;
pub use dispatch::BusTransaction;
pub use sync_read::SyncReader;
pub use config::Config;
pub use error::Error;
pub use lifecycle::{Lifecycle, Restart};
pub use bridge::Bridge;

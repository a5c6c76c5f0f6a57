use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Deque;
use log::*;

use crate::{
    host::HostTransport,
    protocol::EGRESS_CAPACITY,
    timers::Timers,
    };


/**
    bytes waiting to be sent to the host

    filled both from the bus receive interrupt and from the service loop, emptied by the service loop only. Every access runs in a critical section.
*/
pub struct EgressQueue {
    queue: Mutex<RefCell<Deque<u8, EGRESS_CAPACITY>>>,
}
impl EgressQueue {
    pub const fn new() -> Self {
        Self {queue: Mutex::new(RefCell::new(Deque::new()))}
    }
    /// append a byte, giving it back if the queue is full
    pub fn push(&self, byte: u8) -> Result<(), u8> {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).push_back(byte))
    }
    /// append a slice, nothing is queued if it doesn't fit entirely
    pub fn extend(&self, bytes: &[u8]) -> Result<(), ()> {
        critical_section::with(|cs| {
            let mut queue = self.queue.borrow_ref_mut(cs);
            if EGRESS_CAPACITY - queue.len() < bytes.len()
                {return Err(())}
            for &byte in bytes {
                queue.push_back(byte).map_err(|_| ())?;
            }
            Ok(())
        })
    }
    pub fn pop(&self) -> Option<u8> {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).pop_front())
    }
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).len())
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl Default for EgressQueue {
    fn default() -> Self {Self::new()}
}


/// what a flush attempt sent to the host
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flush {
    /// nothing to send, or not the time to send it
    Idle,
    /// a frame carrying that many bytes
    Frame(usize),
    /// an empty frame ending a transfer
    Empty,
}

/// decides when queued bytes are pushed to the host
#[derive(Default, Debug)]
pub struct Flusher {
    /// the last frame was full, an empty one must follow to end the transfer
    empty_owed: bool,
}
impl Flusher {
    pub const fn new() -> Self {
        Self {empty_owed: false}
    }
    pub fn empty_owed(&self) -> bool {self.empty_owed}

    /**
        send at most one frame to the host

        a frame is sent when the queue holds at least a full frame, or when no byte was queued nor flushed for more than `timeout` ticks of the send timer
    */
    pub fn try_flush<H: HostTransport>(&mut self, host: &mut H, queue: &EgressQueue, timers: &Timers, timeout: u8) -> Flush {
        if ! host.is_write_ready()
            {return Flush::Idle}

        let count = queue.len();
        let frame = host.frame_size();
        if count > 0 {
            if count < frame && timers.send() <= timeout
                {return Flush::Idle}
            timers.reset_send();

            let mut written = 0;
            while written < frame {
                let Some(byte) = queue.pop()
                    else {break};
                host.write_byte(byte);
                written += 1;
            }
            // a full frame cannot tell the host whether more is coming
            self.empty_owed = written == frame;
            host.commit_frame();
            trace!("flushed {} bytes to host", written);
            Flush::Frame(written)
        }
        else if self.empty_owed {
            self.empty_owed = false;
            host.commit_frame();
            Flush::Empty
        }
        else {
            Flush::Idle
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    struct Frames {
        current: Vec<u8>,
        committed: Vec<Vec<u8>>,
        ready: bool,
    }
    impl HostTransport for Frames {
        fn is_connected(&self) -> bool {true}
        fn bytes_available(&self) -> usize {0}
        fn receive_byte(&mut self) -> Option<u8> {None}
        fn is_write_ready(&self) -> bool {self.ready}
        fn write_byte(&mut self, byte: u8) {self.current.push(byte)}
        fn commit_frame(&mut self) {self.committed.push(core::mem::take(&mut self.current))}
        fn frame_size(&self) -> usize {8}
    }
    fn frames() -> Frames {
        Frames {current: Vec::new(), committed: Vec::new(), ready: true}
    }

    #[test]
    fn partial_waits_for_timeout() {
        let (queue, timers, mut flusher, mut host) = (EgressQueue::new(), Timers::new(), Flusher::new(), frames());
        queue.extend(&[1, 2, 3]).unwrap();
        timers.reset_send();
        for _ in 0 .. 4 {
            timers.tick();
            assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 4), Flush::Idle);
        }
        timers.tick();
        assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 4), Flush::Frame(3));
        assert_eq!(host.committed, [[1, 2, 3]]);
        assert_eq!(timers.send(), 0);
        assert!(! flusher.empty_owed());
    }

    #[test]
    fn full_frame_owes_empty() {
        let (queue, timers, mut flusher, mut host) = (EgressQueue::new(), Timers::new(), Flusher::new(), frames());
        queue.extend(&[7; 8]).unwrap();
        assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 200), Flush::Frame(8));
        assert!(flusher.empty_owed());
        assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 200), Flush::Empty);
        assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 200), Flush::Idle);
        assert_eq!(host.committed.len(), 2);
        assert!(host.committed[1].is_empty());
    }

    #[test]
    fn one_frame_per_attempt() {
        let (queue, timers, mut flusher, mut host) = (EgressQueue::new(), Timers::new(), Flusher::new(), frames());
        queue.extend(&[1; 11]).unwrap();
        assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 200), Flush::Frame(8));
        assert_eq!(queue.len(), 3);
        // the remainder is partial, it waits
        assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 200), Flush::Idle);
        assert!(flusher.empty_owed());
    }

    #[test]
    fn not_ready() {
        let (queue, timers, mut flusher, mut host) = (EgressQueue::new(), Timers::new(), Flusher::new(), frames());
        host.ready = false;
        queue.extend(&[1; 8]).unwrap();
        assert_eq!(flusher.try_flush(&mut host, &queue, &timers, 0), Flush::Idle);
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn extend_is_all_or_nothing() {
        let queue = EgressQueue::new();
        queue.extend(&[0; EGRESS_CAPACITY - 2]).unwrap();
        assert!(queue.extend(&[0; 3]).is_err());
        assert_eq!(queue.len(), EGRESS_CAPACITY - 2);
        assert!(queue.push(1).is_ok());
    }
}

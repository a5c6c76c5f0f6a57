mod common;

use axbridge::{
    config::MAX_TIMEOUT,
    registers,
    StatusError, BROADCAST,
    };
use common::*;


fn servos(ids: &[u8]) -> Vec<Servo> {
    ids.iter().map(|&id| Servo::new(id)).collect()
}

/// service the request, then let the reply out
fn exchange(bridge: &mut TestBridge, host: &mut Host, request: &[u8]) -> Vec<u8> {
    host.frames.clear();
    host.send(request);
    bridge.service(host).unwrap();
    wait(bridge.shared(), 51);
    bridge.service(host).unwrap();
    host.received()
}

#[test]
fn aggregated_in_request_order() {
    let mut bridge = bridge(1, servos(&[3, 4, 5]));
    let mut host = Host::new(64);

    let reply = exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x04, 0x02, 5, 3, 4]));
    assert_eq!(reply, status(1, StatusError::none(), &[0x54, 0x55, 0x34, 0x35, 0x44, 0x45]));
    // one read per device, in order
    let polls = [
        packet(5, 0x02, &[0x04, 0x02]),
        packet(3, 0x02, &[0x04, 0x02]),
        packet(4, 0x02, &[0x04, 0x02]),
        ].concat();
    assert_eq!(bridge.arbiter().port().sent, polls);
}

#[test]
fn broadcast_request_answered_by_bridge() {
    let mut bridge = bridge(1, servos(&[3]));
    let mut host = Host::new(64);
    let reply = exchange(&mut bridge, &mut host, &packet(BROADCAST, 0x84, &[0x00, 0x01, 3]));
    assert_eq!(reply, status(1, StatusError::none(), &[0x30]));
}

#[test]
fn device_errors_combined() {
    let mut servos = servos(&[3, 4, 5]);
    servos[0].error = StatusError::from(0x04u8);
    servos[2].error = StatusError::from(0x20u8);
    let mut bridge = bridge(1, servos);
    let mut host = Host::new(64);

    let reply = exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x10, 0x01, 3, 4, 5]));
    assert_eq!(reply, status(1, StatusError::from(0x24u8), &[0x40, 0x50, 0x60]));
}

#[test]
fn silent_device_aborts_without_answer() {
    let mut servos = servos(&[3, 4]);
    servos[1].silent = true;
    let mut bridge = bridge(1, servos);
    let mut host = Host::new(64);

    let reply = exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x04, 0x02, 3, 4]));
    assert!(reply.is_empty());
    assert!(bridge.shared().egress.is_empty());

    // bus replies flow to the host again
    let request = packet(3, 0x02, &[0x00, 0x01]);
    let reply = exchange(&mut bridge, &mut host, &request);
    assert_eq!(reply, status(3, StatusError::none(), &[0x30]));
}

#[test]
fn oversized_requests_refused() {
    let mut bridge = bridge(1, servos(&[3, 4, 5, 6]));
    let mut host = Host::new(64);
    let refused = status(1, StatusError::range_error(), &[]);

    // nothing to read
    assert_eq!(exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x00, 0x00, 3])), refused);
    // a device reply would not fit the capture buffer
    assert_eq!(exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x00, 123, 3])), refused);
    // the aggregated reply would not fit a status packet
    assert_eq!(exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x00, 62, 3, 4, 5, 6])), refused);
    // malformed
    assert_eq!(exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x00])), refused);
    // no device was polled
    assert!(bridge.arbiter().port().sent.is_empty());
}

#[test]
fn longest_reply_timeout_still_expires() {
    let mut servos = servos(&[3]);
    servos[0].silent = true;
    let mut bridge = bridge(1, servos);
    let mut host = Host::new(64);
    exchange(&mut bridge, &mut host, &packet(1, 0x03, &[registers::TIMEOUTS.address(), 255, 50, 100]));
    assert_eq!(bridge.config().reply_timeout, MAX_TIMEOUT);

    // the poll gives up on the silent device instead of waiting forever
    let reply = exchange(&mut bridge, &mut host, &packet(1, 0x84, &[0x04, 0x02, 3]));
    assert!(reply.is_empty());
    assert!(bridge.shared().egress.is_empty());
}
